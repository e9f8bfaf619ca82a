use super::{CompileError, CompilerError};

/// Logs the parse function being entered and the token it is looking at.
macro_rules! trace_parse {
    ($parser:expr) => {
        log::trace!("{} <- {:?}", stdext::function_name!(), $parser.stream.peeked())
    };
}

mod declarator;
mod error;
mod tokenstream;

pub mod parser;

pub use error::ParserError;
pub use parser::parse;

pub(crate) type ParserResult<T> = Result<T, CompileError>;

/// Builds a failed [`ParserResult`] at the given line.
pub(crate) fn fail<T>(line: u32, e: ParserError) -> ParserResult<T> {
    Err(CompilerError::new(line, e).into())
}
