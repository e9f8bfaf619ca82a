use log::debug;

use crate::compiler::{CompilerDisplay, CompilerDisplayError, CompilerError, StringTable};
use crate::err;

use super::registry::{tag_name, KeyRecord, KeyRegistry, Qualifier};

#[derive(Clone, Debug, PartialEq)]
pub enum KeyListError {
    InvalidEntry(String),
    Duplicate(String),
}

impl CompilerDisplay for KeyListError {
    fn fmt(&self, _: &StringTable) -> Result<String, CompilerDisplayError> {
        Ok(match self {
            KeyListError::InvalidEntry(e) => format!("Invalid key entry `{}`", e),
            KeyListError::Duplicate(e) => format!("Key `{}` is listed more than once", e),
        })
    }
}

/// Reads the list of requested key names.  Entries are separated by commas or
/// newlines, and each is a type name optionally preceded by `struct`, `union`
/// or `enum`.  `#` starts a comment that runs to the end of the line.
pub fn parse_key_list(
    text: &str,
    st: &StringTable,
) -> Result<KeyRegistry, CompilerError<KeyListError>> {
    let mut keys = KeyRegistry::new();

    for (ln, line) in text.lines().enumerate() {
        let line_no = ln as u32 + 1;
        let line = match line.find('#') {
            Some(i) => &line[..i],
            None => line,
        };

        for entry in line.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let words: Vec<&str> = entry.split_whitespace().collect();
            let (qualifier, name) = match words.as_slice() {
                [name] => (Qualifier::Plain, *name),
                ["struct", name] => (Qualifier::Struct, *name),
                ["union", name] => (Qualifier::Union, *name),
                ["enum", name] => (Qualifier::Enum, *name),
                _ => return err!(line_no, KeyListError::InvalidEntry(entry.into())),
            };

            if !is_identifier(name) {
                return err!(line_no, KeyListError::InvalidEntry(entry.into()));
            }

            let name = st.insert(name.into());
            let lookup = match qualifier.keyword() {
                Some(kw) => tag_name(st, kw, name),
                None => name,
            };

            keys.insert(KeyRecord {
                name,
                qualifier,
                lookup,
                node: None,
                line: line_no,
            })
            .or_else(|_| err!(line_no, KeyListError::Duplicate(entry.into())))?;
        }
    }

    debug!("Read {} key names", keys.len());
    Ok(keys)
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
