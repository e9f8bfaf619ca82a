use serde::Serialize;

use super::lexer::DEFAULT_CONTEXT_LINES;
use super::types::{KeyRegistry, TypeRegistry, TypeTable};
use super::{StringTable, Target};

/// Settings for a single compilation that are independent of the input
/// files.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CompilerOptions {
    pub target: Target,
    /// Prepended to every emitted C symbol.
    pub prefix: String,
    /// Inline structs that only one field refers to.
    pub optimize: bool,
    /// How many source lines to show with a lexical or syntax error.
    pub context_lines: usize,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        CompilerOptions {
            target: Target::default(),
            prefix: String::new(),
            optimize: true,
            context_lines: DEFAULT_CONTEXT_LINES,
        }
    }
}

/// Everything the passes share: the type graph, the names bound into it, the
/// requested keys, and the counters used while laying the table out.
#[derive(Debug)]
pub struct CompileContext {
    pub options: CompilerOptions,
    pub table: TypeTable,
    pub registry: TypeRegistry,
    pub keys: KeyRegistry,
    /// Next free cell in the descriptor table.
    pub next_offset: u64,
    /// Next free slot in the union conversion jump table.
    pub next_jump: u32,
}

impl CompileContext {
    pub fn new(options: CompilerOptions, keys: KeyRegistry, st: &StringTable) -> CompileContext {
        let mut table = TypeTable::new(options.target);
        let registry = TypeRegistry::with_builtins(&mut table, st);
        CompileContext {
            options,
            table,
            registry,
            keys,
            next_offset: 0,
            next_jump: 0,
        }
    }

    pub fn target(&self) -> Target {
        self.options.target
    }
}
