use std::{cell::RefCell, collections::HashMap, fmt::Display};

use super::{CompilerDisplay, CompilerDisplayError};

#[derive(Debug)]
pub enum StringTableError {
    NotFound,
}

impl Display for StringTableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StringTableError::NotFound => f.write_str("StringId Not Found"),
        }
    }
}

/**
Stores a table of all distinct strings read from the source file and the key
list.  The type graph and the tokens use IDs which map back to the distinct
string in the string table.

The user can add a string to the string table and will be given the
unique ID for that string in return.  If the string already exists in the
table, then the ID for that string will be returned.  If the string does not
exist in the table, then it will be added and a new ID assigned to that string
value.

The user can provide a string ID and get the associated string value
in return.
 */
#[derive(Debug, Default)]
pub struct StringTable {
    /// Table mapping raw strings to their [`StringId`]s. Used for converting
    /// strings read from source code into their [`StringId`].
    table: RefCell<HashMap<String, StringId>>,

    /// Every interned string, indexed by its [`StringId`].
    strings: RefCell<Vec<String>>,
}

impl StringTable {
    pub fn new() -> StringTable {
        StringTable {
            table: RefCell::new(HashMap::new()),
            strings: RefCell::new(vec![]),
        }
    }

    /// Inserts a string into the table and returns the assigned ID for that
    /// string value.  If the string is already in the table, then this will
    /// simply return the already assigned ID for that string. Otherwise, it
    /// will add the string to the table and assign it a unique ID.
    pub fn insert(&self, s: String) -> StringId {
        let mut table = self.table.borrow_mut();
        if let Some(id) = table.get(&s) {
            return *id;
        }

        let mut strings = self.strings.borrow_mut();
        let id = StringId(strings.len() as u32);
        strings.push(s.clone());
        table.insert(s, id);
        id
    }

    /// Search the string table for the given string and, if found, return the
    /// associated [`StringId`]. If not found, then return [`None`](Option::None).
    pub fn find(&self, s: &str) -> Option<StringId> {
        let table = self.table.borrow();
        table.get(s).copied()
    }

    /// Given an ID, if it is assigned to a string, then return the associated
    /// string, otherwise, return an error.
    pub fn get(&self, id: StringId) -> Result<String, StringTableError> {
        self.strings
            .borrow()
            .get(id.0 as usize)
            .cloned()
            .ok_or(StringTableError::NotFound)
    }
}

#[derive(Clone, Copy, PartialEq, Debug, Default, Hash, Eq, PartialOrd, Ord)]
pub struct StringId(u32);

impl StringId {
    /// Create a new String ID and initialize it to 0
    pub fn new() -> StringId {
        Self::default()
    }
}

impl CompilerDisplay for StringId {
    fn fmt(&self, st: &StringTable) -> Result<String, CompilerDisplayError> {
        st.get(*self).map_err(|e| e.into())
    }
}

impl std::fmt::Display for StringId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{}", self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_returns_same_id_for_same_string() {
        let table = StringTable::new();
        let a = table.insert("foo".into());
        let b = table.insert("bar".into());
        let c = table.insert("foo".into());
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(table.get(b).unwrap(), "bar");
        assert_eq!(table.find("foo"), Some(a));
        assert_eq!(table.find("baz"), None);
    }
}
