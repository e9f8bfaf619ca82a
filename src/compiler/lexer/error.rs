use crate::compiler::{CompilerDisplay, CompilerDisplayError, StringTable};

/// Errors which can be encountered while tokenizing the declaration source
#[derive(Clone, PartialEq, Debug)]
pub enum LexerError {
    UnexpectedCharacter(char),
    UnterminatedLiteral(char),
    UnterminatedComment,
    InvalidNumber(String),
}

impl CompilerDisplay for LexerError {
    fn fmt(&self, _: &StringTable) -> Result<String, CompilerDisplayError> {
        use LexerError::*;
        let msg = match self {
            UnexpectedCharacter(c) => format!("Unexpected character {:?}", c),
            UnterminatedLiteral(q) => format!("Missing closing {} on literal", q),
            UnterminatedComment => "Block comment is never closed".into(),
            InvalidNumber(text) => format!("Invalid numeric constant {}", text),
        };

        Ok(msg)
    }
}
