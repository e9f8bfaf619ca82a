use serde::Serialize;

use super::{DescriptorTable, EmitError, EmitResult};
use crate::compiler::CompilerError;

#[derive(Serialize)]
struct Dump<'a> {
    #[serde(flatten)]
    table: &'a DescriptorTable,
    packed: Vec<u64>,
}

/// The descriptor table as pretty printed JSON: the tagged cells next to
/// their packed values, the exported constants, and the jump table slots.
pub fn to_json(table: &DescriptorTable) -> EmitResult<String> {
    let packed = table.packed()?;
    serde_json::to_string_pretty(&Dump { table, packed })
        .map_err(|e| CompilerError::new(0, EmitError::Serialize(e.to_string())))
}
