mod error;

pub(crate) mod lexer;
pub mod tokens;

pub use error::LexerError;
pub use lexer::{Lexer, SourceLine, DEFAULT_CONTEXT_LINES};

use super::CompilerError;

pub type LexerResult<T> = Result<T, CompilerError<LexerError>>;
