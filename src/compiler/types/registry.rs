//! Name lookup for the type graph.
//!
//! The [`TypeRegistry`] maps every type name the parser has seen (built in
//! types, `struct`/`union`/`enum` tags, and typedef names) to its node.  The
//! [`KeyRegistry`] holds the names the user asked to export.  Both are plain
//! hash maps: passes run one after another and none of them inserts names
//! while another pass is walking the registry.

use std::collections::HashMap;

use crate::compiler::{StringId, StringTable};

use super::typetable::{ElementKind, NodeKind, NodeState, TypeId, TypeTable};

/// The spelling of every built in type, as the parser synthesizes it from the
/// specifier keywords.
const BUILTINS: &[&str] = &[
    "char",
    "signed char",
    "unsigned char",
    "short",
    "unsigned short",
    "int",
    "unsigned int",
    "long",
    "unsigned long",
    "long long",
    "unsigned long long",
    "float",
    "double",
    "long double",
    "_Bool",
    "void",
    "__builtin_va_list",
];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TypeNameRecord {
    pub node: TypeId,
    pub builtin: bool,
}

#[derive(Debug, Default)]
pub struct TypeRegistry {
    names: HashMap<StringId, TypeNameRecord>,
}

impl TypeRegistry {
    pub fn new() -> TypeRegistry {
        TypeRegistry {
            names: HashMap::new(),
        }
    }

    /// Creates a registry holding a node for every built in type of the
    /// table's target.  `long double` has no element code; its node is left
    /// incomplete so that pointers to it and prototypes returning it parse,
    /// while a field of that type is refused.
    pub fn with_builtins(table: &mut TypeTable, st: &StringTable) -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        let target = table.target();

        for name in BUILTINS {
            let el = match *name {
                "char" | "signed char" | "unsigned char" | "_Bool" => Some(ElementKind::Int8),
                "short" | "unsigned short" => Some(ElementKind::Int16),
                "int" | "unsigned int" => Some(ElementKind::Int32),
                "long" | "unsigned long" => Some(target.long_kind()),
                "long long" | "unsigned long long" => Some(ElementKind::Int64),
                "float" => Some(ElementKind::Float32),
                "double" => Some(ElementKind::Float64),
                "__builtin_va_list" => Some(ElementKind::Pointer),
                _ => None,
            };

            let sid = st.insert((*name).into());
            let node = match el {
                Some(el) => table.add_scalar(NodeKind::Base, Some(sid), el),
                None if *name == "long double" => {
                    table.add(NodeKind::Base, Some(sid), NodeState::Incomplete, 0)
                }
                None => {
                    let id = table.add(NodeKind::Base, Some(sid), NodeState::Defining, 0);
                    table.finish(id);
                    id
                }
            };

            registry
                .names
                .insert(sid, TypeNameRecord { node, builtin: true });
        }

        registry
    }

    pub fn lookup(&self, name: StringId) -> Option<TypeId> {
        self.names.get(&name).map(|r| r.node)
    }

    pub fn record(&self, name: StringId) -> Option<&TypeNameRecord> {
        self.names.get(&name)
    }

    pub fn is_builtin(&self, name: StringId) -> bool {
        self.names.get(&name).map_or(false, |r| r.builtin)
    }

    /// Binds `name` to `node`.  Built in names cannot be rebound; an attempt
    /// to do so is ignored.
    pub fn insert(&mut self, name: StringId, node: TypeId) {
        if self.is_builtin(name) {
            return;
        }
        self.names
            .insert(name, TypeNameRecord { node, builtin: false });
    }
}

/// How the user qualified a requested name in the key list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Qualifier {
    Plain,
    Struct,
    Union,
    Enum,
}

impl Qualifier {
    pub fn keyword(self) -> Option<&'static str> {
        match self {
            Qualifier::Plain => None,
            Qualifier::Struct => Some("struct"),
            Qualifier::Union => Some("union"),
            Qualifier::Enum => Some("enum"),
        }
    }
}

/// Interns the registry spelling of a tag, e.g. `struct foo`.
pub fn tag_name(st: &StringTable, keyword: &str, name: StringId) -> StringId {
    let name = st.get(name).unwrap_or_default();
    st.insert(format!("{} {}", keyword, name))
}

#[derive(Clone, Debug, PartialEq)]
pub struct KeyRecord {
    /// The bare name, which also names the offset constant.
    pub name: StringId,
    pub qualifier: Qualifier,
    /// The name as it is spelled in the [`TypeRegistry`].
    pub lookup: StringId,
    pub node: Option<TypeId>,
    pub line: u32,
}

/// The user requested names, kept in the order they were listed so that the
/// output does not depend on hashing.
#[derive(Debug, Default)]
pub struct KeyRegistry {
    keys: Vec<KeyRecord>,
    index: HashMap<StringId, usize>,
}

impl KeyRegistry {
    pub fn new() -> KeyRegistry {
        KeyRegistry::default()
    }

    /// Adds a key.  If a key with the same spelling already exists the new
    /// record is handed back as the error.
    pub fn insert(&mut self, record: KeyRecord) -> Result<(), KeyRecord> {
        if self.index.contains_key(&record.lookup) {
            return Err(record);
        }
        self.index.insert(record.lookup, self.keys.len());
        self.keys.push(record);
        Ok(())
    }

    pub fn lookup(&self, name: StringId) -> Option<&KeyRecord> {
        self.index.get(&name).map(|i| &self.keys[*i])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, KeyRecord> {
        self.keys.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, KeyRecord> {
        self.keys.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
