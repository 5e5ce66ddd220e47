// Main entry point for the AutoScript interpreter

use std::env;
use std::fs;
use std::process;

use anyhow::{Context, Result};

use autoscript::common::debug;
use autoscript::lexer::Lexer;
use autoscript::vm::cli::{self, CliArgs, RunConfig};
use autoscript::Vm;

/// Runs one script and returns its exit code
fn run_script(vm: &mut Vm) -> Result<i32> {
    vm.run()?;
    Ok(vm.exit_code())
}

fn load_script(path: &str) -> Result<Vm> {
    let bytes = fs::read(path).with_context(|| format!("cannot read script '{}'", path))?;
    let tokens = Lexer::from_bytes(&bytes).tokenize()?;
    Ok(Vm::from_tokens(path, tokens))
}

fn run_batch(config: RunConfig) -> i32 {
    debug::set_debug(config.debug);
    debug::set_error_to_stdout(config.error_stdout);

    let internal = config.scripts.is_empty();
    let scripts = if internal {
        vec![cli::INTERNAL_SCRIPT_PATH.to_string()]
    } else {
        config.scripts
    };

    let mut status = 0;
    for path in scripts {
        let vm = if internal {
            Vm::new(&path, cli::INTERNAL_SCRIPT).map_err(Into::into)
        } else {
            load_script(&path)
        };
        match vm.and_then(|mut vm| run_script(&mut vm)) {
            Ok(code) => status = code,
            Err(e) => {
                // Report and keep going with the next script
                debug::write_error_stream(&format!("{}: {:#}\n", path, e));
                status = 1;
            }
        }
    }
    status
}

fn main() {
    let args: Vec<String> = env::args().collect();

    let status = match cli::parse_args(args) {
        Ok(CliArgs::Help) => {
            cli::print_help();
            0
        }
        Ok(CliArgs::Version) => {
            cli::print_version();
            0
        }
        Ok(CliArgs::Run(config)) => run_batch(config),
        Err(message) => {
            eprintln!("{}", message);
            2
        }
    };

    process::exit(status);
}
