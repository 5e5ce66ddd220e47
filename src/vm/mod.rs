pub mod vm;
pub mod scope;
pub mod handles;

pub mod natives;

pub mod operations;
pub mod evaluator;
pub mod control;
pub mod calls;
pub mod macros;

// CLI
pub mod cli;

pub use vm::{DeclScope, Flow, StepResult, SuspendHandle, Vm, VmState, MAX_CALL_DEPTH};
pub use handles::{HandleTable, HeapObject};

// Re-export public APIs
pub use cli::{parse_args, print_help, print_version, version, CliArgs, RunConfig, INTERNAL_SCRIPT, INTERNAL_SCRIPT_PATH};
