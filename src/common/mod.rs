pub mod debug;
pub mod error;
pub mod value;
