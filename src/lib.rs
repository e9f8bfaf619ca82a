pub mod cli;
pub mod compiler;
pub mod diagnostics;

pub use cli::*;
pub use compiler::pipeline::{compile, Compilation, Failure, Stage};
pub use compiler::{CompileError, StringId, StringTable, Target};
