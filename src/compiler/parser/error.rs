use crate::compiler::{
    lexer::tokens::Lex, CompilerDisplay, CompilerDisplayError, StringId, StringTable,
};

/// Compiler errors that happen within the Parser stage of compilation.
#[derive(Clone, Debug, PartialEq)]
pub enum ParserError {
    UnexpectedEof,
    ExpectedButFound(char, Lex),
    ExpectedTypeSpecifier(Lex),
    DeclaratorExpectedIdentifier(Lex),
    UnknownType(StringId),
    SignedAndUnsigned,
    ConflictingSpecifiers,
    UnknownUnsignedType(String),
    UnsupportedBaseType(String),
    AnonymousTagWithoutBody(&'static str),
    DuplicateDefinition(String),
    IncompleteField(String),
    VoidField(StringId),
    BitFieldUnsupported(StringId),
    ArrayExpectedSize,
    InvalidArrayDimension(String),
}

impl ParserError {
    /// Errors about what the declarations mean rather than how they are
    /// written.
    pub fn is_semantic(&self) -> bool {
        matches!(
            self,
            ParserError::DuplicateDefinition(_)
                | ParserError::IncompleteField(_)
                | ParserError::VoidField(_)
                | ParserError::UnknownType(_)
        )
    }
}

impl CompilerDisplay for ParserError {
    /// Format a ParserError into a human readable message and replace any [`StringId`]s
    /// with their respective string values.
    fn fmt(&self, st: &StringTable) -> Result<String, CompilerDisplayError> {
        let msg = match self {
            ParserError::UnexpectedEof => "Unexpected end of file".into(),
            ParserError::ExpectedButFound(expected, actual) => {
                format!("Expected '{}', but found {}", expected, actual.fmt(st)?)
            }
            ParserError::ExpectedTypeSpecifier(actual) => {
                format!("Expected a type, but found {}", actual.fmt(st)?)
            }
            ParserError::DeclaratorExpectedIdentifier(actual) => {
                format!("Expected identifier in declarator, but found {}", actual.fmt(st)?)
            }
            ParserError::UnknownType(sid) => format!("Unknown type name {}", sid.fmt(st)?),
            ParserError::SignedAndUnsigned => "Both signed and unsigned in one type".into(),
            ParserError::ConflictingSpecifiers => "Conflicting type specifiers".into(),
            ParserError::UnknownUnsignedType(name) => format!("There is no type {}", name),
            ParserError::UnsupportedBaseType(name) => {
                format!("{} has no portable representation", name)
            }
            ParserError::AnonymousTagWithoutBody(kw) => {
                format!("Expected a name or a body after {}", kw)
            }
            ParserError::DuplicateDefinition(name) => format!("{} is already defined", name),
            ParserError::IncompleteField(name) => {
                format!("Field has incomplete type {}", name)
            }
            ParserError::VoidField(field) => format!("Field {} is declared void", field.fmt(st)?),
            ParserError::BitFieldUnsupported(field) => {
                format!("Bit-field {} cannot be described", field.fmt(st)?)
            }
            ParserError::ArrayExpectedSize => "Array dimension is missing".into(),
            ParserError::InvalidArrayDimension(dim) => format!("Invalid array dimension {}", dim),
        };
        Ok(msg)
    }
}
