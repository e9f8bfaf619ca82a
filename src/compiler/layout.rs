//! Key resolution and offset assignment.
//!
//! Every node reachable from a key gets the index of its first cell in the
//! descriptor table.  Nodes are visited in post-order so a node's
//! dependencies always sit at lower offsets than the node itself, and a node
//! that already has an offset is never visited again.

use log::{debug, trace};

use super::context::CompileContext;
use super::types::{ElementKind, Qualifier, TypeId, TypeRegistry, TypeTable};
use super::{CompilerDisplay, CompilerDisplayError, CompilerError, StringId, StringTable};
use crate::err;

pub type LayoutResult<T> = Result<T, CompilerError<LayoutError>>;

#[derive(Clone, Debug, PartialEq)]
pub enum LayoutError {
    /// Every requested name that is unknown or never completely defined.
    MissingKeys(Vec<String>),
    /// A function type is reachable from a key.
    PoisonedFunction(String),
    /// A struct without fields or a union without members is reachable from
    /// a key.
    EmptyType(String),
}

impl CompilerDisplay for LayoutError {
    fn fmt(&self, _: &StringTable) -> Result<String, CompilerDisplayError> {
        Ok(match self {
            LayoutError::MissingKeys(names) => {
                format!("Undefined key types: {}", names.join(", "))
            }
            LayoutError::PoisonedFunction(name) => {
                format!("{} contains a function, which cannot be described", name)
            }
            LayoutError::EmptyType(name) => format!("{} has no fields", name),
        })
    }
}

/// Binds every key to its node and marks the node as a key.  All names that
/// cannot be bound are reported together.
///
/// A bare key that is not a typedef name falls back to the `struct`, `union`
/// or `enum` tag of the same name when exactly one of them is defined.
pub fn resolve_keys(ctx: &mut CompileContext, st: &StringTable) -> LayoutResult<()> {
    let CompileContext {
        keys,
        registry,
        table,
        ..
    } = ctx;

    let mut missing = vec![];
    for key in keys.iter_mut() {
        let found = match registry.lookup(key.lookup) {
            None if key.qualifier == Qualifier::Plain => sole_tag(registry, table, st, key.name),
            found => found,
        };
        match found {
            Some(node) if table.get(node).is_defined() => {
                key.node = Some(node);
                table.get_mut(node).is_key = true;
            }
            _ => missing.push(st.get(key.lookup).unwrap_or_default()),
        }
    }

    if !missing.is_empty() {
        return err!(0, LayoutError::MissingKeys(missing));
    }

    debug!("Resolved {} keys", keys.len());
    Ok(())
}

fn sole_tag(
    registry: &TypeRegistry,
    table: &TypeTable,
    st: &StringTable,
    name: StringId,
) -> Option<TypeId> {
    let name = st.get(name).ok()?;
    let defined: Vec<TypeId> = ["struct", "union", "enum"]
        .iter()
        .filter_map(|kw| st.find(&format!("{} {}", kw, name)))
        .filter_map(|tag| registry.lookup(tag))
        .filter(|node| table.get(*node).is_defined())
        .collect();

    match defined.as_slice() {
        [node] => {
            trace!("Key {} resolved to its tag", name);
            Some(*node)
        }
        _ => None,
    }
}

/// Assigns an offset to every node reachable from the resolved keys.  Calling
/// this again after it succeeded assigns nothing new.
pub fn assign_offsets(ctx: &mut CompileContext, st: &StringTable) -> LayoutResult<()> {
    let roots: Vec<TypeId> = ctx.keys.iter().filter_map(|k| k.node).collect();

    let mut assigner = Assigner {
        table: &mut ctx.table,
        st,
        next_offset: ctx.next_offset,
        next_jump: ctx.next_jump,
    };
    for root in roots {
        assigner.visit(root, None)?;
    }

    let (next_offset, next_jump) = (assigner.next_offset, assigner.next_jump);
    ctx.next_offset = next_offset;
    ctx.next_jump = next_jump;

    debug!(
        "Descriptor table holds {} cells and {} jump slots",
        next_offset, next_jump
    );
    Ok(())
}

struct Assigner<'a> {
    table: &'a mut TypeTable,
    st: &'a StringTable,
    next_offset: u64,
    next_jump: u32,
}

impl<'a> Assigner<'a> {
    fn visit(&mut self, id: TypeId, parent: Option<StringId>) -> LayoutResult<()> {
        if self.table.get(id).offset.is_some() {
            return Ok(());
        }

        let name = self.name(id, parent);
        let node = self.table.get(id);
        let line = node.line;

        if node.is_union() {
            let members = node.members.clone();
            if members.is_empty() {
                return err!(line, LayoutError::EmptyType(self.spell(name)));
            }

            for (i, member) in members.into_iter().enumerate() {
                if !self.table.get(member).renamed {
                    let member_name = self.st.insert(format!("{}_{}", self.spell(name), i));
                    let m = self.table.get_mut(member);
                    m.name = Some(member_name);
                    m.renamed = true;
                }
                self.visit(member, Some(name))?;
            }

            let n = self.table.get_mut(id);
            if n.jump_index.is_none() {
                n.jump_index = Some(self.next_jump);
                self.next_jump += 1;
            }
        } else {
            let items = node.items.clone();
            if items.is_empty() {
                return err!(line, LayoutError::EmptyType(self.spell(name)));
            }

            for item in items {
                match item.kind {
                    ElementKind::Function => {
                        return err!(line, LayoutError::PoisonedFunction(self.spell(name)))
                    }
                    ElementKind::StructLink(t) | ElementKind::UnionLink(t) => {
                        self.visit(t, Some(name))?
                    }
                    _ => (),
                }
            }
        }

        let n = self.table.get_mut(id);
        n.offset = Some(self.next_offset);
        self.next_offset += n.cell_count();
        trace!(
            "{} {} at offset {}",
            id,
            self.spell(name),
            self.next_offset - self.table.get(id).cell_count()
        );
        Ok(())
    }

    /// The node's stable name.  A node without one is named after the node
    /// that first reached it and the declarator that first used it; this
    /// happens once, whichever path reaches the node first.
    fn name(&mut self, id: TypeId, parent: Option<StringId>) -> StringId {
        let node = self.table.get(id);
        if let Some(name) = node.name {
            return name;
        }

        let fragment = node
            .fragment
            .map_or_else(|| "anon".to_string(), |f| self.spell(f));
        let name = match parent {
            Some(parent) => self.st.insert(format!("{}_{}", self.spell(parent), fragment)),
            None => self.st.insert(fragment),
        };

        let n = self.table.get_mut(id);
        n.name = Some(name);
        n.renamed = true;
        name
    }

    fn spell(&self, id: StringId) -> String {
        self.st.get(id).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::context::CompilerOptions;
    use crate::compiler::types::{parse_key_list, Item, NodeKind, NodeState};

    fn context(keys: &str, st: &StringTable) -> CompileContext {
        CompileContext::new(
            CompilerOptions::default(),
            parse_key_list(keys, st).unwrap(),
            st,
        )
    }

    fn define(ctx: &mut CompileContext, st: &StringTable, kind: NodeKind, name: Option<&str>, items: &[Item]) -> TypeId {
        let name = name.map(|n| st.insert(n.into()));
        let id = ctx.table.add(kind, name, NodeState::Defining, 1);
        for item in items {
            ctx.table.append_item(id, *item);
        }
        ctx.table.finish(id);
        if let Some(name) = name {
            ctx.registry.insert(name, id);
        }
        id
    }

    fn union_of(ctx: &mut CompileContext, kinds: &[ElementKind]) -> TypeId {
        let union = ctx.table.add(NodeKind::Union, None, NodeState::Defining, 1);
        for el in kinds {
            let m = ctx.table.add(NodeKind::UnionMember, None, NodeState::Defining, 1);
            ctx.table.append_item(m, Item::new(1, *el));
            ctx.table.finish(m);
            ctx.table.add_member(union, m);
        }
        ctx.table.finish(union);
        union
    }

    #[test]
    fn every_missing_key_is_reported() {
        let st = StringTable::new();
        let mut ctx = context("present\nabsent, struct gone\nforward", &st);
        define(&mut ctx, &st, NodeKind::Struct, Some("present"), &[Item::new(1, ElementKind::Int32)]);
        let fwd = st.insert("forward".into());
        let node = ctx.table.add(NodeKind::Struct, Some(fwd), NodeState::Incomplete, 3);
        ctx.registry.insert(fwd, node);

        let err = resolve_keys(&mut ctx, &st).unwrap_err();
        assert_eq!(
            *err.inner(),
            LayoutError::MissingKeys(vec!["absent".into(), "struct gone".into(), "forward".into()])
        );
    }

    #[test]
    fn bare_keys_fall_back_to_a_single_tag() {
        let st = StringTable::new();
        let mut ctx = context("point, both, alias", &st);
        let point = define(&mut ctx, &st, NodeKind::Struct, Some("struct point"), &[Item::new(2, ElementKind::Int32)]);
        define(&mut ctx, &st, NodeKind::Struct, Some("struct both"), &[Item::new(1, ElementKind::Int8)]);
        define(&mut ctx, &st, NodeKind::Union, Some("union both"), &[Item::new(1, ElementKind::Int8)]);
        define(&mut ctx, &st, NodeKind::Struct, Some("struct alias"), &[Item::new(1, ElementKind::Int16)]);
        let alias = define(&mut ctx, &st, NodeKind::Typedef, Some("alias"), &[Item::new(1, ElementKind::Int64)]);

        let err = resolve_keys(&mut ctx, &st).unwrap_err();
        assert_eq!(*err.inner(), LayoutError::MissingKeys(vec!["both".into()]));
        assert_eq!(ctx.keys.iter().next().unwrap().node, Some(point));
        assert!(ctx.table.get(point).is_key);
        assert_eq!(ctx.keys.iter().nth(2).unwrap().node, Some(alias));
    }

    #[test]
    fn dependencies_come_first_and_offsets_are_stable() {
        let st = StringTable::new();
        let mut ctx = context("outer", &st);
        let inner = define(&mut ctx, &st, NodeKind::Struct, Some("inner"), &[Item::new(1, ElementKind::Int64)]);
        let outer = define(
            &mut ctx,
            &st,
            NodeKind::Struct,
            Some("outer"),
            &[
                Item::new(1, ElementKind::Int8),
                Item::new(1, ElementKind::StructLink(inner)),
            ],
        );

        resolve_keys(&mut ctx, &st).unwrap();
        assign_offsets(&mut ctx, &st).unwrap();

        assert_eq!(ctx.table.get(inner).offset, Some(0));
        assert_eq!(ctx.table.get(outer).offset, Some(2));
        assert_eq!(ctx.next_offset, 2 + 4);

        assign_offsets(&mut ctx, &st).unwrap();
        assert_eq!(ctx.table.get(inner).offset, Some(0));
        assert_eq!(ctx.table.get(outer).offset, Some(2));
        assert_eq!(ctx.next_offset, 6);
    }

    #[test]
    fn anonymous_nodes_are_named_after_parent_and_fragment() {
        let st = StringTable::new();
        let mut ctx = context("msg", &st);
        let union = union_of(&mut ctx, &[ElementKind::Int32, ElementKind::Float64]);
        ctx.table.get_mut(union).fragment = Some(st.insert("body".into()));
        let msg = define(
            &mut ctx,
            &st,
            NodeKind::Struct,
            Some("msg"),
            &[
                Item::new(1, ElementKind::Int32),
                Item::new(1, ElementKind::UnionLink(union)),
            ],
        );

        resolve_keys(&mut ctx, &st).unwrap();
        assign_offsets(&mut ctx, &st).unwrap();

        let names: Vec<String> = [union, ctx.table.get(union).members[0], ctx.table.get(union).members[1]]
            .iter()
            .map(|id| st.get(ctx.table.get(*id).name.unwrap()).unwrap())
            .collect();
        assert_eq!(names, vec!["msg_body", "msg_body_0", "msg_body_1"]);
        assert_eq!(ctx.table.get(union).jump_index, Some(0));

        // members, then the union, then the key
        assert_eq!(ctx.table.get(ctx.table.get(union).members[0]).offset, Some(0));
        assert_eq!(ctx.table.get(union).offset, Some(4));
        assert_eq!(ctx.table.get(msg).offset, Some(5));
    }

    #[test]
    fn unrelated_unions_get_distinct_jump_slots_in_visit_order() {
        let st = StringTable::new();
        let mut ctx = context("a, b", &st);
        let u1 = union_of(&mut ctx, &[ElementKind::Int8, ElementKind::Int16]);
        let u2 = union_of(&mut ctx, &[ElementKind::Pointer, ElementKind::Int64]);
        define(&mut ctx, &st, NodeKind::Struct, Some("a"), &[Item::new(1, ElementKind::UnionLink(u2))]);
        define(&mut ctx, &st, NodeKind::Struct, Some("b"), &[Item::new(2, ElementKind::UnionLink(u1))]);

        resolve_keys(&mut ctx, &st).unwrap();
        assign_offsets(&mut ctx, &st).unwrap();

        assert_eq!(ctx.table.get(u2).jump_index, Some(0));
        assert_eq!(ctx.table.get(u1).jump_index, Some(1));
        assert_eq!(ctx.next_jump, 2);
    }

    #[test]
    fn function_fields_are_rejected() {
        let st = StringTable::new();
        let mut ctx = context("handler", &st);
        define(
            &mut ctx,
            &st,
            NodeKind::Struct,
            Some("handler"),
            &[Item::new(1, ElementKind::Int32), Item::new(1, ElementKind::Function)],
        );

        resolve_keys(&mut ctx, &st).unwrap();
        let err = assign_offsets(&mut ctx, &st).unwrap_err();
        assert_eq!(*err.inner(), LayoutError::PoisonedFunction("handler".into()));
    }

    #[test]
    fn empty_struct_is_rejected() {
        let st = StringTable::new();
        let mut ctx = context("nothing", &st);
        define(&mut ctx, &st, NodeKind::Struct, Some("nothing"), &[]);

        resolve_keys(&mut ctx, &st).unwrap();
        let err = assign_offsets(&mut ctx, &st).unwrap_err();
        assert_eq!(*err.inner(), LayoutError::EmptyType("nothing".into()));
    }
}
