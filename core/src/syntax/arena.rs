//! Index-addressed node storage.

use hashbrown::HashMap;

use super::{Indexer, Node, NodeId, NodeKind};
use crate::diagnostics::Span;

/// Node storage for one top-level statement.
///
/// Nodes are never freed individually; rewrites detach subtrees and leave
/// them unreachable, which keeps every [`NodeId`] stable for the lifetime
/// of the statement. The mutators below maintain the parent/child links in
/// both directions so passes cannot leave the tree inconsistent.
#[derive(Debug, Default)]
pub struct NodeArena {
    nodes: Vec<Node>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn alloc_kind(&mut self, kind: NodeKind, span: Span) -> NodeId {
        self.alloc(Node::new(kind, span))
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.nodes[id.index()].kind
    }

    // === Structural mutators ===

    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.index()].parent = Some(parent);
        self.nodes[parent.index()].children.push(child);
    }

    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.nodes[child.index()].parent = Some(parent);
        self.nodes[parent.index()].children.insert(index, child);
    }

    /// Remove the child at `index`, leaving it parentless.
    pub fn remove_child(&mut self, parent: NodeId, index: usize) -> NodeId {
        let child = self.nodes[parent.index()].children.remove(index);
        self.nodes[child.index()].parent = None;
        child
    }

    /// Swap `old` for `new` in `old`'s position under `parent`.
    pub fn replace_child(&mut self, parent: NodeId, old: NodeId, new: NodeId) {
        let pos = self.child_position(parent, old);
        self.nodes[parent.index()].children[pos] = new;
        self.nodes[new.index()].parent = Some(parent);
        self.nodes[old.index()].parent = None;
    }

    /// Detach `child` from its parent, if it has one.
    pub fn detach(&mut self, child: NodeId) {
        if let Some(parent) = self.nodes[child.index()].parent.take() {
            self.nodes[parent.index()].children.retain(|&c| c != child);
        }
    }

    /// Replace `range` of `parent`'s children with `replacement`, returning
    /// the removed ids (now parentless).
    pub fn splice_children(
        &mut self,
        parent: NodeId,
        range: core::ops::Range<usize>,
        replacement: Vec<NodeId>,
    ) -> Vec<NodeId> {
        for &child in &replacement {
            self.nodes[child.index()].parent = Some(parent);
        }
        let removed: Vec<NodeId> = self.nodes[parent.index()]
            .children
            .splice(range, replacement)
            .collect();
        for &child in &removed {
            self.nodes[child.index()].parent = None;
        }
        removed
    }

    pub fn add_dependency(&mut self, node: NodeId, dep: NodeId) {
        self.nodes[dep.index()].parent = None;
        self.nodes[node.index()].dependencies.push(dep);
    }

    pub fn child_position(&self, parent: NodeId, child: NodeId) -> usize {
        self.nodes[parent.index()]
            .children
            .iter()
            .position(|&c| c == child)
            .unwrap_or_else(|| {
                unreachable!("node {child:?} is not a child of {parent:?}")
            })
    }

    // === Subtree copying ===

    /// Deep-copy the subtree rooted at `root` within this arena. The copy's
    /// root is parentless.
    pub fn clone_subtree(&mut self, root: NodeId) -> NodeId {
        let mut map = HashMap::new();
        let new_root = Self::copy_rec(&mut self.nodes, None, root, &mut map);
        Self::fix_links(&mut self.nodes, &map);
        new_root
    }

    /// Deep-copy a subtree out of `src` into this arena, e.g. when inlining
    /// a function body into a call site's statement.
    pub fn import_subtree(&mut self, src: &NodeArena, root: NodeId) -> NodeId {
        let mut map = HashMap::new();
        let new_root = Self::copy_rec(&mut self.nodes, Some(&src.nodes), root, &mut map);
        Self::fix_links(&mut self.nodes, &map);
        new_root
    }

    fn copy_rec(
        dst: &mut Vec<Node>,
        src: Option<&[Node]>,
        id: NodeId,
        map: &mut HashMap<NodeId, NodeId>,
    ) -> NodeId {
        let mut node = match src {
            Some(nodes) => nodes[id.index()].clone(),
            None => dst[id.index()].clone(),
        };
        node.parent = None;
        let children = core::mem::take(&mut node.children);
        let deps = core::mem::take(&mut node.dependencies);
        let indexers = core::mem::take(&mut node.indexers);
        let new_id = NodeId(dst.len() as u32);
        dst.push(node);
        map.insert(id, new_id);
        for child in children {
            let new_child = Self::copy_rec(dst, src, child, map);
            dst[new_child.index()].parent = Some(new_id);
            dst[new_id.index()].children.push(new_child);
        }
        for dep in deps {
            let new_dep = Self::copy_rec(dst, src, dep, map);
            dst[new_id.index()].dependencies.push(new_dep);
        }
        for indexer in indexers {
            let indexer = match indexer {
                Indexer::Component(c) => Indexer::Component(c),
                Indexer::Dynamic(expr) => Indexer::Dynamic(Self::copy_rec(dst, src, expr, map)),
            };
            dst[new_id.index()].indexers.push(indexer);
        }
        new_id
    }

    /// Rewrite push/pop links that point inside the copied subtree.
    fn fix_links(nodes: &mut [Node], map: &HashMap<NodeId, NodeId>) {
        for &new_id in map.values() {
            let node = &mut nodes[new_id.index()];
            if let Some(p) = node.linked_push {
                node.linked_push = map.get(&p).copied();
            }
            if let Some(p) = node.linked_pop {
                node.linked_pop = map.get(&p).copied();
            }
        }
    }

    // === Traversal ===

    /// Children and dependencies of the subtree at `root` in post order,
    /// dependencies before the nodes that require them.
    pub fn post_order(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.post_order_into(root, &mut out);
        out
    }

    fn post_order_into(&self, id: NodeId, out: &mut Vec<NodeId>) {
        let node = &self.nodes[id.index()];
        for &dep in &node.dependencies {
            self.post_order_into(dep, out);
        }
        for &child in &node.children {
            self.post_order_into(child, out);
        }
        out.push(id);
    }
}
