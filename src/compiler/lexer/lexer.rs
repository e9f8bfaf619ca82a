use std::collections::VecDeque;

use log::trace;

use crate::compiler::StringTable;
use crate::err;

use super::LexerResult;
use super::{
    tokens::{Lex, NumberKind, NumberLiteral, Suffix, Token},
    LexerError,
};

/// How many trailing source lines are remembered for diagnostics when the
/// caller does not ask for a specific depth.
pub const DEFAULT_CONTEXT_LINES: usize = 5;

/// One physical line of the source, used to reprint context under a
/// syntax or semantic error.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceLine {
    pub number: u32,
    pub text: String,
}

struct LexerBranch<'a, 'st> {
    lexer: &'a mut Lexer<'st>,
    index: usize,
}

impl<'a, 'st> LexerBranch<'a, 'st> {
    fn from(l: &'a mut Lexer<'st>) -> LexerBranch<'a, 'st> {
        LexerBranch {
            index: l.index,
            lexer: l,
        }
    }

    /// Merges this branch back into it's source Lexer.  Merging has the effect
    /// of accepting the current branch as correct and updating the source lexer
    /// to match the cursor state of the branch.  Returns the text that the
    /// branch consumed.
    fn merge(mut self) -> Option<String> {
        let s = self.cut();
        if s.is_some() {
            self.lexer.index = self.index;
        }
        s
    }

    /// Copies the text from the source cursor up to the branch cursor without
    /// moving the source.
    fn cut(&self) -> Option<String> {
        if self.index == self.lexer.index {
            None
        } else {
            Some(self.lexer.chars[self.lexer.index..self.index].iter().collect())
        }
    }

    /// Advances the cursor one character and returns the character that was
    /// pointed to by the cursor before the advance.  Returns None if the cursor
    /// was already at the end of the stream.
    fn next(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.index += 1;
        Some(c)
    }

    /// Advances the cursor one character, if the next character satisfies the
    /// given test.
    fn next_if(&mut self, test: impl Fn(char) -> bool) -> bool {
        match self.peek() {
            Some(c) if test(c) => {
                self.index += 1;
                true
            }
            _ => false,
        }
    }

    fn next_while(&mut self, test: impl Fn(char) -> bool) -> usize {
        let start = self.index;
        while self.next_if(&test) {}
        self.index - start
    }

    fn peek(&self) -> Option<char> {
        self.lexer.chars.get(self.index).copied()
    }

    fn peek_at(&self, i: usize) -> Option<char> {
        self.lexer.chars.get(self.index + i).copied()
    }
}

/// Pulls tokens one at a time out of preprocessed declaration source.
///
/// Besides the cursor, the lexer keeps a ring buffer of the starting positions
/// of the last few lines it has walked so that an error raised while parsing
/// can be shown with the source that surrounds it.
pub struct Lexer<'a> {
    chars: Vec<char>,
    index: usize,
    line: u32,
    at_line_start: bool,
    line_starts: VecDeque<(u32, usize)>,
    context_depth: usize,
    string_table: &'a StringTable,
}

impl<'a> Lexer<'a> {
    pub fn new(text: &str, string_table: &'a StringTable) -> Lexer<'a> {
        Self::with_context_depth(text, string_table, DEFAULT_CONTEXT_LINES)
    }

    pub fn with_context_depth(
        text: &str,
        string_table: &'a StringTable,
        context_depth: usize,
    ) -> Lexer<'a> {
        let mut line_starts = VecDeque::with_capacity(context_depth.max(1));
        line_starts.push_back((1, 0));
        Lexer {
            chars: text.chars().collect(),
            index: 0,
            line: 1,
            at_line_start: true,
            line_starts,
            context_depth: context_depth.max(1),
            string_table,
        }
    }

    /// The line the cursor is currently on.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Character offset of the cursor, just past the last token read.
    pub fn position(&self) -> usize {
        self.index
    }

    /// The source text between two cursor positions, exactly as written.
    pub fn slice(&self, start: usize, end: usize) -> String {
        let end = end.min(self.chars.len());
        let start = start.min(end);
        self.chars[start..end].iter().collect()
    }

    /// Reads every remaining token up to, but not including, the end of file.
    pub fn tokenize(&mut self) -> LexerResult<Vec<Token>> {
        let mut tokens = vec![];
        loop {
            let token = self.next_token()?;
            if token.is_eof() {
                break;
            }
            tokens.push(token);
        }
        Ok(tokens)
    }

    /// Returns the next token in the source. Once the end of the text is reached
    /// every further call returns an [`Lex::Eof`] token.
    pub fn next_token(&mut self) -> LexerResult<Token> {
        self.consume_trivia()?;
        let line = self.line;

        let sym = match self.current_char() {
            None => Lex::Eof,
            Some(c) => {
                self.at_line_start = false;
                if let Some(number) = self.consume_number()? {
                    Lex::Number(number)
                } else if let Some(id) = self.consume_identifier() {
                    Lex::Identifier(id)
                } else if c == '"' || c == '\'' {
                    self.consume_quoted(c)?
                } else if c.is_ascii_punctuation() {
                    self.bump();
                    Lex::Punct(c)
                } else {
                    return err!(line, LexerError::UnexpectedCharacter(c));
                }
            }
        };

        trace!("L{}: {:?}", line, sym);
        Ok(Token::new(line, sym))
    }

    /// The last few source lines, oldest first, ending with the line the
    /// cursor is on.
    pub fn context(&self) -> Vec<SourceLine> {
        self.line_starts
            .iter()
            .map(|(number, start)| SourceLine {
                number: *number,
                text: self.chars[*start..]
                    .iter()
                    .take_while(|c| **c != '\n')
                    .collect(),
            })
            .collect()
    }

    /// Advances the cursor by one character, keeping the line ring buffer
    /// up to date.
    fn bump(&mut self) -> Option<char> {
        let c = self.current_char()?;
        self.index += 1;
        if c == '\n' {
            self.line += 1;
            self.at_line_start = true;
            if self.line_starts.len() == self.context_depth {
                self.line_starts.pop_front();
            }
            self.line_starts.push_back((self.line, self.index));
        }
        Some(c)
    }

    /// Skips whitespace, comments, and preprocessor line markers
    /// (`# 1 "file.h"`) that a host preprocessor leaves behind.
    fn consume_trivia(&mut self) -> LexerResult<()> {
        while let Some(c) = self.current_char() {
            if c == '\n' {
                self.bump();
            } else if c.is_whitespace() {
                self.bump();
            } else if c == '#' && self.at_line_start {
                self.consume_to_line_end();
            } else if c == '/' && self.char_at(1) == Some('/') {
                self.consume_to_line_end();
            } else if c == '/' && self.char_at(1) == Some('*') {
                let line = self.line;
                self.bump();
                self.bump();
                loop {
                    match self.bump() {
                        Some('*') if self.current_char() == Some('/') => {
                            self.bump();
                            break;
                        }
                        Some(_) => (),
                        None => return err!(line, LexerError::UnterminatedComment),
                    }
                }
            } else {
                break;
            }
        }
        Ok(())
    }

    fn consume_to_line_end(&mut self) {
        while let Some(c) = self.current_char() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn consume_identifier(&mut self) -> Option<crate::compiler::StringId> {
        let mut branch = LexerBranch::from(self);
        if branch.next_if(|c| c.is_ascii_alphabetic() || c == '_' || c == '$') {
            branch.next_while(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
        }

        let text = branch.merge()?;
        Some(self.string_table.insert(text))
    }

    /// Classifies a numeric constant one character at a time: the prefix
    /// decides hex or octal, a `.` or exponent promotes it to a float, and
    /// any trailing `u`/`l`/`f` letters are collected as the suffix.
    fn consume_number(&mut self) -> LexerResult<Option<NumberLiteral>> {
        let line = self.line;
        let mut branch = LexerBranch::from(self);

        let starts_number = match branch.peek() {
            Some(c) if c.is_ascii_digit() => true,
            Some('.') => branch.peek_at(1).map_or(false, |c| c.is_ascii_digit()),
            _ => false,
        };
        if !starts_number {
            return Ok(None);
        }

        let mut kind = NumberKind::Decimal;
        if branch.peek() == Some('0') && matches!(branch.peek_at(1), Some('x') | Some('X')) {
            branch.next();
            branch.next();
            kind = NumberKind::Hex;
            if branch.next_while(|c| c.is_ascii_hexdigit()) == 0 {
                let text = branch.cut().unwrap_or_default();
                return err!(line, LexerError::InvalidNumber(text));
            }
        } else {
            let leading_zero = branch.peek() == Some('0');
            let digits = branch.next_while(|c| c.is_ascii_digit());
            if leading_zero && digits > 1 {
                kind = NumberKind::Octal;
            }

            if branch.next_if(|c| c == '.') {
                kind = NumberKind::Float;
                branch.next_while(|c| c.is_ascii_digit());
            }

            let has_exponent = matches!(branch.peek(), Some('e') | Some('E'))
                && match branch.peek_at(1) {
                    Some('+') | Some('-') => branch.peek_at(2).map_or(false, |c| c.is_ascii_digit()),
                    Some(c) => c.is_ascii_digit(),
                    None => false,
                };
            if has_exponent {
                kind = NumberKind::Float;
                branch.next();
                branch.next_if(|c| c == '+' || c == '-');
                branch.next_while(|c| c.is_ascii_digit());
            }
        }

        let mut suffix = Suffix::default();
        loop {
            match branch.peek() {
                Some('u') | Some('U') if !suffix.unsigned && kind != NumberKind::Float => {
                    suffix.unsigned = true;
                }
                Some('l') | Some('L') if suffix.long < 2 => suffix.long += 1,
                Some('f') | Some('F') if kind == NumberKind::Float && !suffix.float => {
                    suffix.float = true;
                }
                _ => break,
            }
            branch.next();
        }

        // A number must end at a delimiter; `12abc` is not a valid constant
        let trailing = branch.peek().map_or(false, |c| c.is_ascii_alphanumeric() || c == '_');
        if trailing {
            branch.next_while(|c| c.is_ascii_alphanumeric() || c == '_');
            let text = branch.cut().unwrap_or_default();
            return err!(line, LexerError::InvalidNumber(text));
        }

        let text = branch.merge().unwrap_or_default();
        if kind == NumberKind::Octal && text.chars().any(|c| c == '8' || c == '9') {
            return err!(line, LexerError::InvalidNumber(text));
        }

        Ok(Some(NumberLiteral {
            text: self.string_table.insert(text),
            kind,
            suffix,
        }))
    }

    /// Consumes a string or character literal. The stored text excludes the
    /// quotes but keeps escape sequences as written.
    fn consume_quoted(&mut self, quote: char) -> LexerResult<Lex> {
        let line = self.line;
        self.bump();

        let mut text = String::new();
        loop {
            match self.current_char() {
                None | Some('\n') => return err!(line, LexerError::UnterminatedLiteral(quote)),
                Some(c) if c == quote => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    self.bump();
                    text.push('\\');
                    match self.bump() {
                        Some(e) => text.push(e),
                        None => return err!(line, LexerError::UnterminatedLiteral(quote)),
                    }
                }
                Some(c) => {
                    self.bump();
                    text.push(c);
                }
            }
        }

        let id = self.string_table.insert(text);
        Ok(if quote == '"' {
            Lex::StringLiteral(id)
        } else {
            Lex::CharLiteral(id)
        })
    }

    fn current_char(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    fn char_at(&self, i: usize) -> Option<char> {
        self.chars.get(self.index + i).copied()
    }
}
