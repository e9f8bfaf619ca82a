use serde::Serialize;

/// One entry of the descriptor table.  The runtime reads the packed form
/// produced by [`Cell::pack`]; everything before that works on this enum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Cell {
    /// Byte length of the node that starts here.
    Length(u64),
    /// `count` consecutive elements of the kind named by `code`.  `last` marks
    /// the final field of a node.
    Field { count: u64, code: char, last: bool },
    /// Offset of the table a struct link points at.
    StructRef(u64),
    /// Jump table slot of the union a union link points at, and the union's
    /// alignment.
    UnionRef { index: u32, align: u64 },
}

impl Cell {
    /// The legacy packed value of the cell, or `None` if it does not fit in
    /// 64 bits.
    pub fn pack(&self) -> Option<u64> {
        match *self {
            Cell::Length(n) | Cell::StructRef(n) => Some(n),
            Cell::Field { count, code, last } => {
                let code = if last {
                    code.to_ascii_uppercase()
                } else {
                    code
                };
                shift(count).map(|c| c | code as u64)
            }
            Cell::UnionRef { index, align } => shift(index as u64).map(|i| i | align),
        }
    }

    /// A short description for the comment next to the cell in the C table.
    pub fn describe(&self) -> String {
        match *self {
            Cell::Length(n) => format!("length {}", n),
            Cell::Field { count, code, last } => format!(
                "{} x {}{}",
                count,
                code_name(code),
                if last { ", last" } else { "" }
            ),
            Cell::StructRef(o) => format!("-> {}", o),
            Cell::UnionRef { index, align } => format!("jump {} align {}", index, align),
        }
    }
}

fn shift(value: u64) -> Option<u64> {
    if value.leading_zeros() < 8 {
        None
    } else {
        Some(value << 8)
    }
}

fn code_name(code: char) -> &'static str {
    match code {
        'p' => "pointer",
        'f' => "function",
        's' => "struct",
        'u' => "union",
        'e' => "enum",
        'c' => "int8",
        'h' => "int16",
        'i' => "int32",
        'l' => "int64",
        'r' => "float32",
        'd' => "float64",
        _ => "?",
    }
}
