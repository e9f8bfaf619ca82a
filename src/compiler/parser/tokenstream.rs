use crate::compiler::lexer::tokens::{Lex, Token};
use crate::compiler::lexer::Lexer;
use crate::compiler::StringId;

use super::{fail, ParserError, ParserResult};

/// Feeds tokens from the [`Lexer`] to the parser with room for exactly one
/// token of lookahead.
pub struct TokenStream<'a, 'st> {
    lexer: &'a mut Lexer<'st>,
    peeked: Option<Token>,
}

impl<'a, 'st> TokenStream<'a, 'st> {
    pub fn new(lexer: &'a mut Lexer<'st>) -> TokenStream<'a, 'st> {
        TokenStream {
            lexer,
            peeked: None,
        }
    }

    pub fn next(&mut self) -> ParserResult<Token> {
        match self.peeked.take() {
            Some(t) => Ok(t),
            None => Ok(self.lexer.next_token()?),
        }
    }

    pub fn peek(&mut self) -> ParserResult<Token> {
        match self.peeked {
            Some(t) => Ok(t),
            None => {
                let t = self.lexer.next_token()?;
                self.peeked = Some(t);
                Ok(t)
            }
        }
    }

    /// The token that has already been read ahead, if any.  Never touches
    /// the lexer.
    pub fn peeked(&self) -> Option<&Token> {
        self.peeked.as_ref()
    }

    /// Where the lexer stands in the source.  `None` while a token is held
    /// in lookahead, since the lexer has then moved past it.
    pub fn position(&self) -> Option<usize> {
        match self.peeked {
            Some(_) => None,
            None => Some(self.lexer.position()),
        }
    }

    pub fn source_text(&self, start: usize, end: usize) -> String {
        self.lexer.slice(start, end)
    }

    pub fn test_punct(&mut self, c: char) -> ParserResult<bool> {
        Ok(self.peek()?.sym.is_punct(c))
    }

    pub fn next_if_punct(&mut self, c: char) -> ParserResult<Option<Token>> {
        if self.test_punct(c)? {
            self.next().map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn next_if_id(&mut self) -> ParserResult<Option<(StringId, u32)>> {
        match self.peek()? {
            Token {
                sym: Lex::Identifier(id),
                line,
            } => {
                self.next()?;
                Ok(Some((id, line)))
            }
            _ => Ok(None),
        }
    }

    pub fn next_must_be(&mut self, c: char) -> ParserResult<Token> {
        let token = self.next()?;
        if token.sym.is_punct(c) {
            Ok(token)
        } else if token.is_eof() {
            fail(token.line, ParserError::UnexpectedEof)
        } else {
            fail(token.line, ParserError::ExpectedButFound(c, token.sym))
        }
    }
}
