//! The machine model the layout is computed for.  Lengths in the descriptor
//! table are byte sizes on the target, and the target also decides how wide
//! each emitted cell is.

use serde::Serialize;

use super::types::ElementKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Target {
    /// ILP32: 4 byte pointers and longs, 8 byte scalars aligned to 4.
    Bits32,
    /// LP64: 8 byte pointers and longs, natural alignment throughout.
    Bits64,
}

impl Default for Target {
    fn default() -> Self {
        Target::Bits64
    }
}

impl Target {
    pub fn parse(s: &str) -> Option<Target> {
        match s {
            "32" => Some(Target::Bits32),
            "64" => Some(Target::Bits64),
            _ => None,
        }
    }

    pub fn pointer_size(self) -> u64 {
        match self {
            Target::Bits32 => 4,
            Target::Bits64 => 8,
        }
    }

    /// The fixed width scalar that a C `long` becomes on this target.
    pub fn long_kind(self) -> ElementKind {
        match self {
            Target::Bits32 => ElementKind::Int32,
            Target::Bits64 => ElementKind::Int64,
        }
    }

    /// Byte size of a single scalar element.  Links are sized by the node
    /// they point at, so they are not answered here.
    pub fn scalar_size(self, kind: ElementKind) -> Option<u64> {
        use ElementKind::*;
        match kind {
            Pointer => Some(self.pointer_size()),
            Function => Some(0),
            Enum => Some(4),
            Int8 => Some(1),
            Int16 => Some(2),
            Int32 | Float32 => Some(4),
            Int64 | Float64 => Some(8),
            StructLink(_) | UnionLink(_) => None,
        }
    }

    pub fn scalar_align(self, kind: ElementKind) -> Option<u64> {
        use ElementKind::*;
        match (self, kind) {
            (Target::Bits32, Int64) | (Target::Bits32, Float64) => Some(4),
            (_, Function) => Some(1),
            _ => self.scalar_size(kind),
        }
    }

    /// Largest value a single descriptor cell can hold.
    pub fn cell_max(self) -> u64 {
        match self {
            Target::Bits32 => u32::MAX as u64,
            Target::Bits64 => u64::MAX,
        }
    }

    /// The C type used for descriptor cells in the emitted table.
    pub fn cell_type(self) -> &'static str {
        match self {
            Target::Bits32 => "unsigned int",
            Target::Bits64 => "unsigned long long",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eight_byte_scalars_align_to_four_on_32_bit() {
        assert_eq!(Target::Bits32.scalar_size(ElementKind::Float64), Some(8));
        assert_eq!(Target::Bits32.scalar_align(ElementKind::Float64), Some(4));
        assert_eq!(Target::Bits64.scalar_align(ElementKind::Int64), Some(8));
        assert_eq!(Target::Bits32.pointer_size(), 4);
        assert_eq!(Target::Bits64.long_kind(), ElementKind::Int64);
    }
}
