//! Removes one level of indirection for every struct that only a single
//! field embeds, by splicing the struct's items straight into that field's
//! container.
//!
//! A splice is only committed when it leaves every byte where it was: the
//! container's item offsets and total length are recomputed with the spliced
//! items and compared against the original layout.  Tail padding inside the
//! inlined struct is the usual reason a splice is refused.  A committed splice
//! merges equal neighbours at its edges, just as items are merged while a
//! struct is parsed.

use log::{debug, info};

use super::types::{align_up, ElementKind, Item, NodeKind, TypeId, TypeTable};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OptimizeStats {
    /// Structs spliced into their only container.
    pub inlined: usize,
    /// Containers that took over the members of the single union they held.
    pub adopted: usize,
    /// Splices refused because they would move a field.
    pub rejected: usize,
}

/// Runs the optimizer over every node of the table.  Running it a second
/// time changes nothing.
pub fn optimize(table: &mut TypeTable) -> OptimizeStats {
    let mut stats = OptimizeStats::default();

    for id in table.ids().collect::<Vec<_>>() {
        let node = table.get(id);
        if node.removed || !node.is_defined() {
            continue;
        }

        match node.kind {
            NodeKind::Struct | NodeKind::UnionMember => {
                inline_links(table, id, &mut stats);
                if node_is_struct(table, id) && adopt_union(table, id) {
                    stats.adopted += 1;
                }
            }
            _ => (),
        }
    }

    info!(
        "Optimizer inlined {} structs, adopted {} unions, kept {} splices that would move fields",
        stats.inlined, stats.adopted, stats.rejected
    );
    stats
}

fn node_is_struct(table: &TypeTable, id: TypeId) -> bool {
    table.get(id).kind == NodeKind::Struct
}

fn inline_links(table: &mut TypeTable, container: TypeId, stats: &mut OptimizeStats) {
    let mut k = 0;
    while k < table.get(container).items.len() {
        let item = table.get(container).items[k];
        if let Some(target) = inlinable(table, container, item) {
            if splice(table, container, k, target) {
                stats.inlined += 1;
                // Look at the first spliced item again so chains flatten.
                continue;
            }
            stats.rejected += 1;
        }
        k += 1;
    }
}

/// The struct an item could be replaced with, if any.
fn inlinable(table: &TypeTable, container: TypeId, item: Item) -> Option<TypeId> {
    let target = match item.kind {
        ElementKind::StructLink(t) if item.count == 1 => t,
        _ => return None,
    };

    let t = table.get(target);
    let eligible = target != container
        && t.kind == NodeKind::Struct
        && t.refs <= 1
        && !t.is_key
        && !t.removed
        && t.is_defined()
        && !t.items.is_empty();

    if eligible {
        Some(target)
    } else {
        None
    }
}

/// Replaces item `k` of `container` with the items of `target`.  Returns
/// `false`, leaving both nodes untouched, if the layout would change.
fn splice(table: &mut TypeTable, container: TypeId, k: usize, target: TypeId) -> bool {
    let c = table.get(container);
    let t = table.get(target);

    let mut items = Vec::with_capacity(c.items.len() + t.items.len() - 1);
    items.extend_from_slice(&c.items[..k]);
    items.extend_from_slice(&t.items);
    items.extend_from_slice(&c.items[k + 1..]);

    let before = table.layout(&c.items);
    let inner = table.layout(&t.items);
    let after = table.layout(&items);

    let base = before.offsets[k];
    let expected: Vec<u64> = before.offsets[..k]
        .iter()
        .copied()
        .chain(inner.offsets.iter().map(|o| base + o))
        .chain(before.offsets[k + 1..].iter().copied())
        .collect();

    if after.offsets != expected || align_up(after.end, c.align) != c.length {
        debug!(
            "Not inlining {} into {}: fields would move",
            target, container
        );
        return false;
    }

    debug!("Inlining {} into {} at item {}", target, container, k);
    let (items, released) = coalesce(items);
    for link in released {
        let node = table.get_mut(link);
        node.refs = node.refs.saturating_sub(1);
    }
    table.get_mut(container).items = items;
    table.get_mut(target).removed = true;
    true
}

/// Merges runs of items of the same kind.  Returns the merged list and, for
/// every link item folded into its neighbour, the node it pointed at.
fn coalesce(items: Vec<Item>) -> (Vec<Item>, Vec<TypeId>) {
    let mut merged: Vec<Item> = Vec::with_capacity(items.len());
    let mut released = vec![];
    for item in items {
        match merged.last_mut() {
            Some(last) if last.kind == item.kind => {
                last.count += item.count;
                released.extend(item.kind.link());
            }
            _ => merged.push(item),
        }
    }
    (merged, released)
}

/// A struct whose only field is a single union becomes that union.
fn adopt_union(table: &mut TypeTable, container: TypeId) -> bool {
    let c = table.get(container);
    let union = match c.items.as_slice() {
        [Item {
            count: 1,
            kind: ElementKind::UnionLink(u),
        }] => *u,
        _ => return false,
    };

    let u = table.get(union);
    if u.refs > 1 || u.is_key || u.removed || c.length != u.length || c.align != u.align {
        return false;
    }

    debug!("{} adopts the members of {}", container, union);
    let members = u.members.clone();
    let n = table.get_mut(container);
    n.kind = NodeKind::Union;
    n.items.clear();
    n.members = members;
    table.get_mut(union).removed = true;

    // Fields that embedded the container now embed a union.
    for id in table.ids().collect::<Vec<_>>() {
        for item in table.get_mut(id).items.iter_mut() {
            if item.kind == ElementKind::StructLink(container) {
                item.kind = ElementKind::UnionLink(container);
            }
        }
    }
    true
}
