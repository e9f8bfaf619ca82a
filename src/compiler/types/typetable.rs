//! The type graph.  Every type the parser encounters becomes a [`TypeNode`]
//! stored in a [`TypeTable`] and is referred to by its [`TypeId`].  Nodes are
//! never removed from the table; the optimizer marks the ones it inlines as
//! removed instead, so every `TypeId` handed out stays valid for the whole
//! compilation.

use serde::Serialize;

use crate::compiler::{StringId, Target};

/// Handle to a node in the [`TypeTable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TypeId(u32);

impl TypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a single element of an [`Item`] is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementKind {
    Pointer,
    /// A function type.  Recorded so that a request to describe it fails
    /// instead of silently producing garbage.
    Function,
    StructLink(TypeId),
    UnionLink(TypeId),
    Enum,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
}

impl ElementKind {
    /// The node this element embeds, if it is a link.
    pub fn link(self) -> Option<TypeId> {
        match self {
            ElementKind::StructLink(id) | ElementKind::UnionLink(id) => Some(id),
            _ => None,
        }
    }

    /// The letter the runtime converter uses for this kind.  The last field of
    /// a node is marked by emitting the upper case form.
    pub fn code(self) -> char {
        use ElementKind::*;
        match self {
            Pointer => 'p',
            Function => 'f',
            StructLink(_) => 's',
            UnionLink(_) => 'u',
            Enum => 'e',
            Int8 => 'c',
            Int16 => 'h',
            Int32 => 'i',
            Int64 => 'l',
            Float32 => 'r',
            Float64 => 'd',
        }
    }
}

/// One field run of a node: `count` consecutive elements of the same kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Item {
    pub count: u64,
    pub kind: ElementKind,
}

impl Item {
    pub fn new(count: u64, kind: ElementKind) -> Item {
        Item { count, kind }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum NodeKind {
    Base,
    Struct,
    Union,
    UnionMember,
    Enum,
    Typedef,
}

/// Where a node is in its definition.  A tag that has only been referenced
/// is `Incomplete`, a node whose body is being parsed is `Defining`, and a
/// node whose body has been closed is `Defined`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum NodeState {
    Incomplete,
    Defining,
    Defined,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeNode {
    /// Stable name of the node.  Anonymous nodes get one synthesized during
    /// layout assignment.
    pub name: Option<StringId>,
    /// The first declarator that used an anonymous node; becomes the tail of
    /// its synthesized name.
    pub fragment: Option<StringId>,
    pub kind: NodeKind,
    pub state: NodeState,
    pub is_key: bool,
    pub items: Vec<Item>,
    /// Member nodes of a union.  Always empty for every other kind.
    pub members: Vec<TypeId>,
    /// Byte length.  While a node is being defined this is the end of the last
    /// field; closing the node rounds it up to `align`.
    pub length: u64,
    pub align: u64,
    /// Number of items in other nodes that link to this node.
    pub refs: u32,
    pub offset: Option<u64>,
    pub jump_index: Option<u32>,
    pub renamed: bool,
    pub emitted: bool,
    pub removed: bool,
    pub line: u32,
}

impl TypeNode {
    fn new(kind: NodeKind, name: Option<StringId>, state: NodeState, line: u32) -> TypeNode {
        TypeNode {
            name,
            fragment: None,
            kind,
            state,
            is_key: false,
            items: vec![],
            members: vec![],
            length: 0,
            align: 1,
            refs: 0,
            offset: None,
            jump_index: None,
            renamed: false,
            emitted: false,
            removed: false,
            line,
        }
    }

    pub fn is_defined(&self) -> bool {
        self.state == NodeState::Defined
    }

    pub fn is_union(&self) -> bool {
        self.kind == NodeKind::Union
    }

    /// `void` is the only base type without a field.
    pub fn is_void(&self) -> bool {
        self.kind == NodeKind::Base && self.items.is_empty()
    }

    /// Number of descriptor cells this node occupies once emitted: a length
    /// cell, one cell per item, and one extra cell after every link.
    pub fn cell_count(&self) -> u64 {
        if self.is_union() {
            return 1;
        }

        1 + self
            .items
            .iter()
            .map(|i| if i.kind.link().is_some() { 2 } else { 1 })
            .sum::<u64>()
    }
}

/// Start offset of every item of a node, plus where the last one ends.
#[derive(Clone, Debug, PartialEq)]
pub struct ItemLayout {
    pub offsets: Vec<u64>,
    pub end: u64,
    pub align: u64,
}

/// Arena that owns every [`TypeNode`] in a compilation.
#[derive(Debug)]
pub struct TypeTable {
    nodes: Vec<TypeNode>,
    target: Target,
}

impl TypeTable {
    pub fn new(target: Target) -> TypeTable {
        TypeTable {
            nodes: vec![],
            target,
        }
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: TypeId) -> &TypeNode {
        &self.nodes[id.index()]
    }

    pub fn get_mut(&mut self, id: TypeId) -> &mut TypeNode {
        &mut self.nodes[id.index()]
    }

    /// Every node id in creation order.
    pub fn ids(&self) -> impl Iterator<Item = TypeId> {
        (0..self.nodes.len() as u32).map(TypeId)
    }

    pub fn add(
        &mut self,
        kind: NodeKind,
        name: Option<StringId>,
        state: NodeState,
        line: u32,
    ) -> TypeId {
        self.nodes.push(TypeNode::new(kind, name, state, line));
        TypeId(self.nodes.len() as u32 - 1)
    }

    /// Adds a fully defined node holding exactly one scalar element.  Used
    /// for the built in types and for enums.
    pub fn add_scalar(&mut self, kind: NodeKind, name: Option<StringId>, el: ElementKind) -> TypeId {
        let id = self.add(kind, name, NodeState::Defining, 0);
        self.append_item(id, Item::new(1, el));
        self.finish(id);
        id
    }

    pub fn element_size(&self, kind: ElementKind) -> u64 {
        match kind.link() {
            Some(id) => self.get(id).length,
            None => self.target.scalar_size(kind).unwrap_or(0),
        }
    }

    pub fn element_align(&self, kind: ElementKind) -> u64 {
        match kind.link() {
            Some(id) => self.get(id).align,
            None => self.target.scalar_align(kind).unwrap_or(1),
        }
    }

    /// Appends an item to a node that is being defined.  An item of the same
    /// kind as the node's last item is merged into it by adding the counts.
    /// Returns `true` if the item was merged.
    pub fn append_item(&mut self, id: TypeId, item: Item) -> bool {
        let size = self.element_size(item.kind);
        let align = self.element_align(item.kind);

        let node = &mut self.nodes[id.index()];
        node.length = align_up(node.length, align) + size * item.count;
        node.align = node.align.max(align);

        let merged = match node.items.last_mut() {
            Some(last) if last.kind == item.kind => {
                last.count += item.count;
                true
            }
            _ => {
                node.items.push(item);
                false
            }
        };

        if !merged {
            if let Some(target) = item.kind.link() {
                self.nodes[target.index()].refs += 1;
            }
        }
        merged
    }

    /// Attaches a member node to a union, widening the union to fit it.
    pub fn add_member(&mut self, union: TypeId, member: TypeId) {
        let (length, align) = {
            let m = self.get(member);
            (m.length, m.align)
        };
        let node = &mut self.nodes[union.index()];
        node.members.push(member);
        node.length = node.length.max(length);
        node.align = node.align.max(align);
    }

    /// Closes the definition of a node, padding its length out to its
    /// alignment.
    pub fn finish(&mut self, id: TypeId) {
        let node = &mut self.nodes[id.index()];
        node.length = align_up(node.length, node.align);
        node.state = NodeState::Defined;
    }

    /// Lays a list of items out in order using the target's alignment rules.
    pub fn layout(&self, items: &[Item]) -> ItemLayout {
        let mut offsets = Vec::with_capacity(items.len());
        let mut end = 0;
        let mut align = 1;
        for item in items {
            let a = self.element_align(item.kind);
            let start = align_up(end, a);
            offsets.push(start);
            end = start + self.element_size(item.kind) * item.count;
            align = align.max(a);
        }
        ItemLayout {
            offsets,
            end,
            align,
        }
    }
}

pub fn align_up(value: u64, align: u64) -> u64 {
    if align <= 1 {
        value
    } else {
        (value + align - 1) / align * align
    }
}
