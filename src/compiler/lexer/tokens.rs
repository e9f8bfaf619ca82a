use crate::compiler::{CompilerDisplay, CompilerDisplayError, StringId, StringTable};

/// The syntactic form of a numeric literal, decided while the lexer walks
/// its characters.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum NumberKind {
    Decimal,
    Octal,
    Hex,
    Float,
}

/// Type suffixes that were attached to a numeric literal (`10UL`, `1.5f`).
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Suffix {
    pub unsigned: bool,
    pub long: u8,
    pub float: bool,
}

/// A numeric literal.  `text` is the literal exactly as it appeared in the
/// source, suffix included.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NumberLiteral {
    pub text: StringId,
    pub kind: NumberKind,
    pub suffix: Suffix,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Lex {
    Identifier(StringId),
    Number(NumberLiteral),
    StringLiteral(StringId),
    CharLiteral(StringId),
    Punct(char),
    Eof,
}

impl Lex {
    pub fn get_str(&self) -> Option<StringId> {
        match self {
            Lex::Identifier(s) | Lex::StringLiteral(s) | Lex::CharLiteral(s) => Some(*s),
            Lex::Number(n) => Some(n.text),
            _ => None,
        }
    }

    pub fn is_punct(&self, c: char) -> bool {
        matches!(self, Lex::Punct(p) if *p == c)
    }
}

impl CompilerDisplay for Lex {
    fn fmt(&self, st: &StringTable) -> Result<String, CompilerDisplayError> {
        use Lex::*;
        Ok(match self {
            Identifier(id) => format!("identifier {}", st.get(*id)?),
            Number(n) => format!("number {}", st.get(n.text)?),
            StringLiteral(s) => format!("string literal \"{}\"", st.get(*s)?),
            CharLiteral(s) => format!("character literal '{}'", st.get(*s)?),
            Punct(c) => format!("'{}'", c),
            Eof => "end of file".into(),
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Token {
    pub line: u32,
    pub sym: Lex,
}

impl Token {
    pub fn new(line: u32, sym: Lex) -> Token {
        Token { line, sym }
    }

    pub fn is_eof(&self) -> bool {
        self.sym == Lex::Eof
    }

    /// Renders the token the way it was spelled in the source, which is what
    /// gets pasted into a generated C program when a dimension must be evaluated by
    /// the host toolchain.
    pub fn text(&self, st: &StringTable) -> Result<String, CompilerDisplayError> {
        Ok(match self.sym {
            Lex::Identifier(id) => st.get(id)?,
            Lex::Number(n) => st.get(n.text)?,
            Lex::StringLiteral(s) => format!("\"{}\"", st.get(s)?),
            Lex::CharLiteral(s) => format!("'{}'", st.get(s)?),
            Lex::Punct(c) => c.to_string(),
            Lex::Eof => String::new(),
        })
    }
}

impl CompilerDisplay for Token {
    fn fmt(&self, st: &StringTable) -> Result<String, CompilerDisplayError> {
        Ok(format!("L{}: {}", self.line, self.sym.fmt(st)?))
    }
}
