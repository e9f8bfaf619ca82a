/**
 * The Compiler takes preprocessed C declarations and the list of type names
 * the user wants to exchange, and produces the tables a runtime converter
 * needs to move values of those types between machines.
 *
 * Compilation is a fixed sequence of passes, each of which runs to
 * completion before the next one starts:
 * 1. The lexer turns the source text into tokens, keeping a short history of
 * source lines for error reports.
 * 2. The parser reads declarations into the type graph held by the
 * `CompileContext`: one node per struct, union, union member, enum, and
 * derived typedef, with every field recorded as an item on its container.
 * Array dimensions that are not literals are computed by the host toolchain.
 * 3. The requested keys are bound to their nodes.  Every name that cannot be
 * bound is reported at once.
 * 4. The optimizer splices structs that only one field embeds into that
 * field's container.
 * 5. The layout assigner gives every node reachable from a key its offset in
 * the descriptor table, dependencies first, and names anonymous nodes.
 * 6. The emitter writes the descriptor table, the offset header, and the
 * union jump table.
 *
 * Errors in passes 1 through 5 are caused by the input.  An error raised by
 * the emitter about a missing offset or name means an earlier pass has a bug.
 */
mod error;
mod stringtable;

pub mod constexpr;
pub mod context;
pub mod emitter;
pub mod layout;
pub mod lexer;
pub mod optimizer;
pub mod parser;
pub mod pipeline;
pub mod source;
pub mod target;
pub mod types;

pub use error::{CompileError, CompilerDisplay, CompilerDisplayError, CompilerError};
pub use stringtable::{StringId, StringTable, StringTableError};
pub use target::Target;
