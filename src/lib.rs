// Public API of the AutoScript interpreter (lexer -> preprocessor -> VM)

pub mod common;
pub mod lexer;
pub mod preprocessor;
pub mod vm;

pub use common::{error::LangError, value::Value};
pub use vm::Vm;

/// Runs `source` as a script located in the working directory and returns
/// the finished VM so callers can inspect output and variables
pub fn run(source: &str) -> Result<Vm, LangError> {
    let mut vm = Vm::new(vm::cli::INTERNAL_SCRIPT_PATH, source)?;
    vm.run()?;
    Ok(vm)
}

/// Loads and runs a script file; includes resolve relative to it
pub fn run_file(path: impl AsRef<std::path::Path>) -> Result<Vm, LangError> {
    let mut vm = Vm::from_file(path)?;
    vm.run()?;
    Ok(vm)
}
