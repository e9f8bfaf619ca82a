use std::fmt::Display;

use super::constexpr::ToolchainError;
use super::emitter::EmitError;
use super::layout::LayoutError;
use super::lexer::LexerError;
use super::parser::ParserError;
use super::stringtable::{StringTable, StringTableError};
use super::types::KeyListError;
use crate::cli::{ERR_INTERNAL, ERR_IO, ERR_LEXER, ERR_SEMANTIC, ERR_SYNTAX, ERR_TOOLCHAIN};

/// Represents all errors that are generated from within the Compiler
/// module and its submodules.
///
/// This type captures common metadata which is necessarily present for
/// all errors which are caused by input source code.  E.g. the line #
/// that the error occurs on. This also handles formatting all error messages
/// with the universal metadata along with the inner metadata.
///
/// The inner error allows metadata which is specific to a pass within
/// the compiler. E.g., the errors themselves are pass specific and
/// are stored in the `inner` field.  A line of `0` means the error is not
/// tied to a location in the source (e.g. an unresolved key name).
#[derive(Clone, Debug, PartialEq)]
pub struct CompilerError<IE: CompilerDisplay> {
    line: u32,
    inner: IE,
}

impl<IE> CompilerError<IE>
where
    IE: CompilerDisplay,
{
    pub fn new(line: u32, inner: IE) -> Self {
        CompilerError { line, inner }
    }

    pub fn inner(&self) -> &IE {
        &self.inner
    }

    pub fn take(self) -> (u32, IE) {
        (self.line, self.inner)
    }

    pub fn line(&self) -> u32 {
        self.line
    }
}

impl<IE> CompilerDisplay for CompilerError<IE>
where
    IE: CompilerDisplay,
{
    fn fmt(&self, st: &StringTable) -> Result<String, CompilerDisplayError> {
        let inner = self.inner.fmt(st)?;
        if self.line == 0 {
            Ok(inner)
        } else {
            Ok(format!("L{}: {}", self.line, inner))
        }
    }
}

/// Formats a compiler value into a human readable message, resolving any
/// [`StringId`](super::StringId)s through the [`StringTable`].
pub trait CompilerDisplay {
    fn fmt(&self, st: &StringTable) -> Result<String, CompilerDisplayError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompilerDisplayError {
    StringIdNotFound,
}

impl Display for CompilerDisplayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompilerDisplayError::StringIdNotFound => f.write_str("StringId not found"),
        }
    }
}

impl From<StringTableError> for CompilerDisplayError {
    fn from(ste: StringTableError) -> Self {
        match ste {
            StringTableError::NotFound => CompilerDisplayError::StringIdNotFound,
        }
    }
}

/// Builds an `Err` holding a [`CompilerError`] at the given line.
#[macro_export]
macro_rules! err {
    ($line:expr, $kind:expr) => {
        Err($crate::compiler::CompilerError::new($line, $kind))
    };
}

/// Any error that ends a compilation, tagged with the pass that raised it.
#[derive(Clone, Debug, PartialEq)]
pub enum CompileError {
    /// A file could not be read or written.
    Io(String, String),
    Keys(CompilerError<KeyListError>),
    Lexer(CompilerError<LexerError>),
    Parser(CompilerError<ParserError>),
    Toolchain(CompilerError<ToolchainError>),
    Layout(CompilerError<LayoutError>),
    Emit(CompilerError<EmitError>),
}

impl CompileError {
    /// The process exit code the driver reports this error with.
    pub fn exit_code(&self) -> i32 {
        match self {
            CompileError::Io(..) => ERR_IO,
            CompileError::Lexer(_) => ERR_LEXER,
            CompileError::Keys(e) => match e.inner() {
                KeyListError::InvalidEntry(_) => ERR_SYNTAX,
                KeyListError::Duplicate(_) => ERR_SEMANTIC,
            },
            CompileError::Parser(e) if e.inner().is_semantic() => ERR_SEMANTIC,
            CompileError::Parser(_) => ERR_SYNTAX,
            CompileError::Toolchain(_) => ERR_TOOLCHAIN,
            CompileError::Layout(_) => ERR_SEMANTIC,
            CompileError::Emit(e) if e.inner().is_internal() => ERR_INTERNAL,
            CompileError::Emit(_) => ERR_SEMANTIC,
        }
    }

    /// Errors found while reading the source, which are reported with the
    /// last few source lines.
    pub fn shows_context(&self) -> bool {
        matches!(self, CompileError::Lexer(_) | CompileError::Parser(_))
    }
}

impl CompilerDisplay for CompileError {
    fn fmt(&self, st: &StringTable) -> Result<String, CompilerDisplayError> {
        match self {
            CompileError::Io(path, e) => Ok(format!("{}: {}", path, e)),
            CompileError::Keys(e) => Ok(format!("Key list: {}", e.fmt(st)?)),
            CompileError::Lexer(e) => e.fmt(st),
            CompileError::Parser(e) => e.fmt(st),
            CompileError::Toolchain(e) => e.fmt(st),
            CompileError::Layout(e) => e.fmt(st),
            CompileError::Emit(e) => e.fmt(st),
        }
    }
}

macro_rules! compile_error_from {
    ($($variant:ident($inner:ty)),*) => {
        $(
            impl From<CompilerError<$inner>> for CompileError {
                fn from(e: CompilerError<$inner>) -> Self {
                    CompileError::$variant(e)
                }
            }
        )*
    };
}

compile_error_from!(
    Keys(KeyListError),
    Lexer(LexerError),
    Parser(ParserError),
    Toolchain(ToolchainError),
    Layout(LayoutError),
    Emit(EmitError)
);
