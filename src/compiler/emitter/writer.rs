use super::{DescriptorTable, EmitResult};

/// Set on every exported offset so client code can tell a table offset from
/// an ordinary small integer.
pub const OFFSET_MARK: u64 = 0x8000_0000;

/// The C identifiers the generated files define and refer to.
#[derive(Clone, Debug, PartialEq)]
pub struct CHeaderNames {
    pub prefix: String,
    pub table: String,
    pub jump: String,
    pub convert_fn: String,
    /// File name the table source uses to include the header.
    pub header_file: String,
}

impl CHeaderNames {
    pub fn new(prefix: &str, header_file: &str) -> CHeaderNames {
        CHeaderNames {
            prefix: prefix.into(),
            table: format!("{}desc_table", prefix),
            jump: format!("{}desc_jump", prefix),
            convert_fn: format!("{}convert_fn", prefix),
            header_file: header_file.into(),
        }
    }

    /// The conversion function the runtime must supply for a union.
    pub fn converter(&self, union: &str) -> String {
        format!("{}convert_{}", self.prefix, union)
    }

    fn guard(&self) -> String {
        self.header_file
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect()
    }
}

/// The C source of the descriptor table and the jump table.
pub fn write_table(table: &DescriptorTable, names: &CHeaderNames) -> EmitResult<String> {
    let packed = table.packed()?;
    let mut out = String::new();

    out.push_str("/* Descriptor table generated by typedescc.  Do not edit. */\n");
    out.push_str(&format!("#include \"{}\"\n\n", names.header_file));

    out.push_str(&format!(
        "const {} {}[] = {{\n",
        table.target.cell_type(),
        names.table
    ));
    if packed.is_empty() {
        out.push_str("    0\n");
    }
    let mut starts = table.starts.iter().peekable();
    for (i, (cell, value)) in table.cells.iter().zip(packed.iter()).enumerate() {
        if let Some((_, name)) = starts.next_if(|(o, _)| *o == i as u64) {
            out.push_str(&format!("    /* {}: {} */\n", i, name));
        }
        out.push_str(&format!("    {:#x}u, /* {} */\n", value, cell.describe()));
    }
    out.push_str("};\n\n");

    out.push_str("#ifdef TYPEDESC_MESSAGING\n");
    for slot in &table.jump_slots {
        out.push_str(&format!("extern int {}();\n", names.converter(&slot.union)));
    }
    out.push_str(&format!("{} {}[] = {{\n", names.convert_fn, names.jump));
    if table.jump_slots.is_empty() {
        out.push_str("    0\n");
    }
    for slot in &table.jump_slots {
        out.push_str(&format!(
            "    {}, /* {} */\n",
            names.converter(&slot.union),
            slot.index
        ));
    }
    out.push_str("};\n#else\n");
    out.push_str(&format!("{} {}[] = {{ 0 }};\n", names.convert_fn, names.jump));
    out.push_str("#endif\n");

    Ok(out)
}

/// The C header holding one marked offset constant per exported name.
pub fn write_header(table: &DescriptorTable, names: &CHeaderNames) -> String {
    let guard = names.guard();
    let mut out = String::new();

    out.push_str(&format!(
        "/* Offsets into {} generated by typedescc.  Do not edit. */\n",
        names.table
    ));
    out.push_str(&format!("#ifndef {}\n#define {}\n\n", guard, guard));
    out.push_str(&format!("#define TYPEDESC_OFFSET_MARK {:#x}u\n\n", OFFSET_MARK));

    for s in &table.symbols {
        out.push_str(&format!(
            "#define {}{} (TYPEDESC_OFFSET_MARK | {}u)\n",
            names.prefix, s.name, s.offset
        ));
    }

    out.push_str(&format!("\ntypedef int (*{})();\n\n", names.convert_fn));
    out.push_str(&format!(
        "extern const {} {}[];\n",
        table.target.cell_type(),
        names.table
    ));
    out.push_str(&format!("extern {} {}[];\n", names.convert_fn, names.jump));
    out.push_str(&format!("\n#endif /* {} */\n", guard));
    out
}
