pub mod blocks;
pub mod preprocessor;
pub mod program;

pub use preprocessor::Preprocessor;
pub use program::{CallId, CallSite, ForLoop, LoopId, LoopKind, Param, Program, TokenBlock, UserFunction};
