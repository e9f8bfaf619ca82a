//! Turns the laid out type graph into the descriptor table, the offset
//! header, and the union conversion jump table.

mod cell;
mod json;
mod jump;
mod tests;
mod writer;

use std::collections::HashSet;

use log::debug;
use serde::Serialize;

use super::context::CompileContext;
use super::types::{ElementKind, TypeId};
use super::{CompilerDisplay, CompilerDisplayError, CompilerError, StringTable, Target};
use crate::err;

pub use cell::Cell;
pub use json::to_json;
pub use jump::{ConverterRegistry, UnionConverter};
pub use writer::{write_header, write_table, CHeaderNames, OFFSET_MARK};

pub type EmitResult<T> = Result<T, CompilerError<EmitError>>;

#[derive(Clone, Debug, PartialEq)]
pub enum EmitError {
    /// Two exported constants would share a name.
    DuplicateSymbol(String),
    /// A value does not fit in a cell of the target, or an offset collides
    /// with the offset marker bit.
    CellOverflow(String, u64),
    PoisonedFunction(String),
    UnknownJumpSlot(u32),
    UnknownUnion(String),
    Serialize(String),
    /// A reachable node was never given an offset.
    Unassigned(TypeId),
    /// A reachable node was never given a name.
    Unnamed(TypeId),
    /// The cells written so far do not end where the next node's offset says
    /// they should.
    OffsetMismatch {
        node: TypeId,
        expected: u64,
        actual: u64,
    },
}

impl EmitError {
    /// Errors that can only come from a bug in an earlier pass.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            EmitError::Unassigned(_)
                | EmitError::Unnamed(_)
                | EmitError::OffsetMismatch { .. }
                | EmitError::Serialize(_)
        )
    }
}

impl CompilerDisplay for EmitError {
    fn fmt(&self, _: &StringTable) -> Result<String, CompilerDisplayError> {
        Ok(match self {
            EmitError::DuplicateSymbol(name) => format!("Constant {} is exported twice", name),
            EmitError::CellOverflow(what, value) => {
                format!("{} ({}) does not fit in a descriptor cell", what, value)
            }
            EmitError::PoisonedFunction(name) => {
                format!("{} contains a function, which cannot be described", name)
            }
            EmitError::UnknownJumpSlot(index) => format!("There is no jump table slot {}", index),
            EmitError::UnknownUnion(name) => format!("No union named {} needs a converter", name),
            EmitError::Serialize(e) => format!("Could not serialize the table: {}", e),
            EmitError::Unassigned(id) => format!("Internal: node {} has no offset", id),
            EmitError::Unnamed(id) => format!("Internal: node {} has no name", id),
            EmitError::OffsetMismatch {
                node,
                expected,
                actual,
            } => format!(
                "Internal: node {} was laid out at {} but written at {}",
                node, expected, actual
            ),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum SymbolKind {
    Key,
    UnionMember,
}

/// A constant exported through the offset header.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Symbol {
    pub name: String,
    pub offset: u64,
    pub kind: SymbolKind,
}

/// A jump table slot and the union whose conversion function fills it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct JumpSlot {
    pub index: u32,
    pub union: String,
}

/// Everything the emitter produces for one compilation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DescriptorTable {
    pub target: Target,
    pub cells: Vec<Cell>,
    /// The node that starts at each offset, for comments in the C output.
    pub starts: Vec<(u64, String)>,
    pub symbols: Vec<Symbol>,
    pub jump_slots: Vec<JumpSlot>,
}

impl DescriptorTable {
    /// The cells in their packed form, checked against the target's cell
    /// width.
    pub fn packed(&self) -> EmitResult<Vec<u64>> {
        let max = self.target.cell_max();
        self.cells
            .iter()
            .enumerate()
            .map(|(i, c)| match c.pack() {
                Some(v) if v <= max => Ok(v),
                v => err!(
                    0,
                    EmitError::CellOverflow(
                        format!("cell {} ({})", i, c.describe()),
                        v.unwrap_or(u64::MAX)
                    )
                ),
            })
            .collect()
    }
}

/// Writes out every node reachable from the keys.  Offsets must already be
/// assigned.
pub fn emit(ctx: &mut CompileContext, st: &StringTable) -> EmitResult<DescriptorTable> {
    let roots: Vec<(TypeId, String)> = ctx
        .keys
        .iter()
        .filter_map(|k| k.node.map(|n| (n, st.get(k.name).unwrap_or_default())))
        .collect();

    let mut emitter = Emitter {
        ctx,
        st,
        cells: vec![],
        starts: vec![],
        members: vec![],
        jump_slots: vec![],
    };

    for (root, _) in &roots {
        emitter.node(*root)?;
    }

    let mut symbols = vec![];
    for (root, name) in roots {
        symbols.push(Symbol {
            name,
            offset: emitter.offset_of(root)?,
            kind: SymbolKind::Key,
        });
    }
    for member in emitter.members.clone() {
        symbols.push(Symbol {
            name: emitter.name_of(member)?,
            offset: emitter.offset_of(member)?,
            kind: SymbolKind::UnionMember,
        });
    }

    let mut seen = HashSet::new();
    for s in &symbols {
        if !seen.insert(s.name.as_str()) {
            return err!(0, EmitError::DuplicateSymbol(s.name.clone()));
        }
        if s.offset >= OFFSET_MARK {
            return err!(0, EmitError::CellOverflow(s.name.clone(), s.offset));
        }
    }

    let mut jump_slots = emitter.jump_slots;
    jump_slots.sort_by_key(|s| s.index);

    debug!(
        "Emitted {} cells, {} constants, {} jump slots",
        emitter.cells.len(),
        symbols.len(),
        jump_slots.len()
    );

    let table = DescriptorTable {
        target: emitter.ctx.target(),
        cells: emitter.cells,
        starts: emitter.starts,
        symbols,
        jump_slots,
    };
    table.packed()?;
    Ok(table)
}

struct Emitter<'a> {
    ctx: &'a mut CompileContext,
    st: &'a StringTable,
    cells: Vec<Cell>,
    starts: Vec<(u64, String)>,
    /// Union members in the order they were written.
    members: Vec<TypeId>,
    jump_slots: Vec<JumpSlot>,
}

impl<'a> Emitter<'a> {
    fn node(&mut self, id: TypeId) -> EmitResult<()> {
        if self.ctx.table.get(id).emitted {
            return Ok(());
        }
        // Set before recursing, so a shared dependency is written once.
        self.ctx.table.get_mut(id).emitted = true;

        let node = self.ctx.table.get(id).clone();
        if node.is_union() {
            for member in &node.members {
                self.node(*member)?;
                self.members.push(*member);
            }
        } else {
            for item in &node.items {
                if let Some(link) = item.kind.link() {
                    self.node(link)?;
                }
            }
        }

        let name = self.name_of(id)?;
        let offset = self.offset_of(id)?;
        let actual = self.cells.len() as u64;
        if actual != offset {
            return err!(
                node.line,
                EmitError::OffsetMismatch {
                    node: id,
                    expected: offset,
                    actual
                }
            );
        }

        self.starts.push((offset, name.clone()));
        self.cells.push(Cell::Length(node.length));

        if node.is_union() {
            let index = node.jump_index.ok_or_else(|| {
                CompilerError::new(node.line, EmitError::Unassigned(id))
            })?;
            self.jump_slots.push(JumpSlot { index, union: name });
            return Ok(());
        }

        let last = node.items.len().saturating_sub(1);
        for (i, item) in node.items.iter().enumerate() {
            self.cells.push(Cell::Field {
                count: item.count,
                code: item.kind.code(),
                last: i == last,
            });

            match item.kind {
                ElementKind::StructLink(t) => {
                    let target = self.offset_of(t)?;
                    self.cells.push(Cell::StructRef(target));
                }
                ElementKind::UnionLink(t) => {
                    let u = self.ctx.table.get(t);
                    let index = u
                        .jump_index
                        .ok_or_else(|| CompilerError::new(node.line, EmitError::Unassigned(t)))?;
                    self.cells.push(Cell::UnionRef {
                        index,
                        align: u.align,
                    });
                }
                ElementKind::Function => {
                    return err!(node.line, EmitError::PoisonedFunction(name));
                }
                _ => (),
            }
        }
        Ok(())
    }

    fn offset_of(&self, id: TypeId) -> EmitResult<u64> {
        match self.ctx.table.get(id).offset {
            Some(offset) => Ok(offset),
            None => err!(self.ctx.table.get(id).line, EmitError::Unassigned(id)),
        }
    }

    fn name_of(&self, id: TypeId) -> EmitResult<String> {
        match self.ctx.table.get(id).name {
            Some(name) => Ok(self.st.get(name).unwrap_or_default()),
            None => err!(self.ctx.table.get(id).line, EmitError::Unnamed(id)),
        }
    }
}
