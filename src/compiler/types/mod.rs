//! The data model shared by every pass: the type graph arena, the name
//! registries, and the list of requested key names.

mod keys;
mod registry;
mod typetable;

pub use keys::{parse_key_list, KeyListError};
pub use registry::{tag_name, KeyRecord, KeyRegistry, Qualifier, TypeNameRecord, TypeRegistry};
pub use typetable::{
    align_up, ElementKind, Item, ItemLayout, NodeKind, NodeState, TypeId, TypeNode, TypeTable,
};
