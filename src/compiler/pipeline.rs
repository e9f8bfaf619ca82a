use log::info;

use super::constexpr::ConstantEvaluator;
use super::context::{CompileContext, CompilerOptions};
use super::emitter::{self, DescriptorTable};
use super::layout;
use super::lexer::{Lexer, SourceLine};
use super::optimizer;
use super::parser;
use super::types::KeyRegistry;
use super::{CompileError, StringTable};

/// The last pass a compilation runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Lexer,
    Parser,
    Layout,
    Emit,
}

impl Stage {
    pub fn parse(s: &str) -> Option<Stage> {
        match s {
            "lexer" => Some(Stage::Lexer),
            "parser" => Some(Stage::Parser),
            "layout" => Some(Stage::Layout),
            "emit" => Some(Stage::Emit),
            _ => None,
        }
    }
}

/// The state left behind by a successful compilation.
#[derive(Debug)]
pub struct Compilation {
    /// `None` if the run stopped before the parser built a graph.
    pub context: Option<CompileContext>,
    /// `None` if the run stopped before emission.
    pub table: Option<DescriptorTable>,
}

/// A failed compilation: the error and the source lines read just before it.
#[derive(Debug)]
pub struct Failure {
    pub error: CompileError,
    pub context: Vec<SourceLine>,
}

impl<E: Into<CompileError>> From<E> for Failure {
    fn from(e: E) -> Self {
        Failure {
            error: e.into(),
            context: vec![],
        }
    }
}

/// Runs every pass over `source` in order, up to and including `stop_after`.
/// Each pass finishes before the next one starts.
pub fn compile(
    source: &str,
    keys: KeyRegistry,
    options: CompilerOptions,
    st: &StringTable,
    evaluator: &dyn ConstantEvaluator,
    stop_after: Stage,
) -> Result<Compilation, Failure> {
    let optimize = options.optimize;
    let mut lexer = Lexer::with_context_depth(source, st, options.context_lines);

    if stop_after == Stage::Lexer {
        let tokens = lexer.tokenize().map_err(|e| Failure {
            error: e.into(),
            context: lexer.context(),
        })?;
        info!("Lexed {} tokens", tokens.len());
        return Ok(Compilation {
            context: None,
            table: None,
        });
    }

    let mut ctx = CompileContext::new(options, keys, st);
    if let Err(error) = parser::parse(&mut lexer, &mut ctx, st, evaluator) {
        return Err(Failure {
            error,
            context: lexer.context(),
        });
    }
    info!("Parsed {} type nodes", ctx.table.len());

    if stop_after == Stage::Parser {
        return Ok(Compilation {
            context: Some(ctx),
            table: None,
        });
    }

    layout::resolve_keys(&mut ctx, st)?;
    if optimize {
        optimizer::optimize(&mut ctx.table);
    }
    layout::assign_offsets(&mut ctx, st)?;

    if stop_after == Stage::Layout {
        return Ok(Compilation {
            context: Some(ctx),
            table: None,
        });
    }

    let table = emitter::emit(&mut ctx, st)?;
    Ok(Compilation {
        context: Some(ctx),
        table: Some(table),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{ERR_LEXER, ERR_SEMANTIC, ERR_SYNTAX, ERR_TOOLCHAIN};
    use crate::compiler::constexpr::tests::MockEvaluator;
    use crate::compiler::emitter::{write_table, CHeaderNames, Cell, SymbolKind};
    use crate::compiler::layout::LayoutError;
    use crate::compiler::types::parse_key_list;

    const PACKET: &str = "
        typedef unsigned int u32;
        struct header { u32 magic; short version; };
        struct packet {
            struct header hdr;
            union { int code; double value; } payload;
            char data[N];
        };
    ";

    fn run(
        source: &str,
        keys: &str,
        optimize: bool,
        stop_after: Stage,
        st: &StringTable,
    ) -> Result<Compilation, Failure> {
        let keys = parse_key_list(keys, st).unwrap();
        let options = CompilerOptions {
            optimize,
            ..CompilerOptions::default()
        };
        let evaluator = MockEvaluator::new(&[("N", 16)]);
        compile(source, keys, options, st, &evaluator, stop_after)
    }

    fn table(source: &str, keys: &str, optimize: bool, st: &StringTable) -> DescriptorTable {
        run(source, keys, optimize, Stage::Emit, st)
            .unwrap()
            .table
            .unwrap()
    }

    fn failure(result: Result<Compilation, Failure>) -> Failure {
        match result {
            Err(f) => f,
            Ok(_) => panic!("Expected the compilation to fail"),
        }
    }

    fn key_length(table: &DescriptorTable, name: &str) -> Cell {
        let symbol = table
            .symbols
            .iter()
            .find(|s| s.name == name && s.kind == SymbolKind::Key)
            .unwrap();
        table.cells[symbol.offset as usize]
    }

    #[test]
    fn end_to_end() {
        let st = StringTable::new();
        let table = table(PACKET, "packet", true, &st);

        let names: Vec<&str> = table.symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["packet", "packet_payload_0", "packet_payload_1"]);
        assert_eq!(table.jump_slots.len(), 1);
        assert_eq!(table.jump_slots[0].union, "packet_payload");
        assert_eq!(key_length(&table, "packet"), Cell::Length(32));

        let packed = table.packed().unwrap();
        assert_eq!(packed.len(), table.cells.len());
    }

    #[test]
    fn trivial_struct() {
        let st = StringTable::new();
        let table = table("struct t { int a; void *p; char c[3]; };", "t", true, &st);
        assert_eq!(
            table.cells,
            vec![
                Cell::Length(24),
                Cell::Field {
                    count: 1,
                    code: 'i',
                    last: false
                },
                Cell::Field {
                    count: 1,
                    code: 'p',
                    last: false
                },
                Cell::Field {
                    count: 3,
                    code: 'c',
                    last: true
                },
            ]
        );
        assert_eq!(table.symbols.len(), 1);
        assert!(table.jump_slots.is_empty());
    }

    #[test]
    fn inlined_fields_join_the_run_before_them() {
        let st = StringTable::new();
        let source = "struct pair { int b; int c; };\nstruct triple { int a; struct pair s; };";
        let table = table(source, "struct triple", true, &st);
        assert_eq!(
            table.cells,
            vec![
                Cell::Length(12),
                Cell::Field {
                    count: 3,
                    code: 'i',
                    last: true
                },
            ]
        );
    }

    #[test]
    fn struct_refs_point_backwards() {
        let st = StringTable::new();
        let table = table(PACKET, "packet", false, &st);
        let mut refs = 0;
        for (i, cell) in table.cells.iter().enumerate() {
            if let Cell::StructRef(target) = cell {
                assert!((*target as usize) < i);
                assert!(matches!(table.cells[*target as usize], Cell::Length(_)));
                refs += 1;
            }
        }
        assert_eq!(refs, 1);
    }

    #[test]
    fn inlining_keeps_lengths_and_saves_cells() {
        let st = StringTable::new();
        let optimized = table(PACKET, "packet", true, &st);
        let st = StringTable::new();
        let plain = table(PACKET, "packet", false, &st);

        assert_eq!(key_length(&optimized, "packet"), key_length(&plain, "packet"));
        assert!(optimized.cells.len() < plain.cells.len());
        assert!(plain.starts.iter().any(|(_, name)| name == "header"));
        assert!(!optimized.starts.iter().any(|(_, name)| name == "header"));
    }

    #[test]
    fn key_structs_are_never_inlined() {
        let st = StringTable::new();
        let table = table(PACKET, "packet, struct header", true, &st);
        assert!(table.starts.iter().any(|(_, name)| name == "header"));
        assert!(table.symbols.iter().any(|s| s.name == "header"));
    }

    #[test]
    fn output_is_deterministic() {
        let names = CHeaderNames::new("", "desc_offsets.h");
        let first = {
            let st = StringTable::new();
            write_table(&table(PACKET, "packet, struct header", true, &st), &names).unwrap()
        };
        let second = {
            let st = StringTable::new();
            write_table(&table(PACKET, "packet, struct header", true, &st), &names).unwrap()
        };
        assert_eq!(first, second);
    }

    #[test]
    fn every_missing_key_is_reported() {
        let st = StringTable::new();
        let f = failure(run(PACKET, "packet, ghost\nstruct nowhere", true, Stage::Emit, &st));
        match &f.error {
            CompileError::Layout(e) => assert_eq!(
                *e.inner(),
                LayoutError::MissingKeys(vec!["ghost".into(), "struct nowhere".into()])
            ),
            e => panic!("Expected a layout error, got {:?}", e),
        }
        assert_eq!(f.error.exit_code(), ERR_SEMANTIC);
        assert!(!f.error.shows_context());
    }

    #[test]
    fn stopping_early() {
        let st = StringTable::new();
        let c = run(PACKET, "packet", true, Stage::Lexer, &st).unwrap();
        assert!(c.context.is_none() && c.table.is_none());

        let st = StringTable::new();
        let c = run(PACKET, "packet", true, Stage::Parser, &st).unwrap();
        let ctx = c.context.unwrap();
        assert!(c.table.is_none());
        assert!(ctx.keys.iter().all(|k| k.node.is_none()));

        let st = StringTable::new();
        let c = run(PACKET, "packet", true, Stage::Layout, &st).unwrap();
        let ctx = c.context.unwrap();
        assert!(c.table.is_none());
        let packet = ctx.keys.iter().next().unwrap().node.unwrap();
        assert!(ctx.table.get(packet).offset.is_some());
    }

    #[test]
    fn input_errors_carry_source_context() {
        let st = StringTable::new();
        let f = failure(run("struct a { int x; };\n/* never closed", "a", true, Stage::Emit, &st));
        assert_eq!(f.error.exit_code(), ERR_LEXER);
        assert!(f.error.shows_context());
        assert_eq!(f.context.last().map(|l| l.number), Some(2));

        let st = StringTable::new();
        let f = failure(run("struct a { int x }", "a", true, Stage::Emit, &st));
        assert_eq!(f.error.exit_code(), ERR_SYNTAX);
        assert!(!f.context.is_empty());

        let st = StringTable::new();
        let f = failure(run("struct a { int x[M]; };", "a", true, Stage::Emit, &st));
        assert_eq!(f.error.exit_code(), ERR_TOOLCHAIN);
    }
}
