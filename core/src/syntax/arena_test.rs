use pretty_assertions::assert_eq;

use super::*;
use crate::diagnostics::Span;

fn leaf(arena: &mut NodeArena, text: &str) -> NodeId {
    arena.alloc(Node::leaf(NodeKind::Param, text, Span::default()))
}

#[test]
fn child_links_stay_consistent() {
    let mut arena = NodeArena::new();
    let root = arena.alloc_kind(NodeKind::Root, Span::default());
    let a = leaf(&mut arena, "a");
    let b = leaf(&mut arena, "b");
    arena.add_child(root, a);
    arena.insert_child(root, 0, b);

    assert_eq!(arena.children(root), &[b, a]);
    assert_eq!(arena.get(a).parent, Some(root));

    arena.detach(b);
    assert_eq!(arena.children(root), &[a]);
    assert_eq!(arena.get(b).parent, None);
}

#[test]
fn replace_child_keeps_position() {
    let mut arena = NodeArena::new();
    let root = arena.alloc_kind(NodeKind::Compound, Span::default());
    let a = leaf(&mut arena, "a");
    let op = arena.alloc(Node::leaf(NodeKind::Operation, "+", Span::default()));
    let b = leaf(&mut arena, "b");
    for id in [a, op, b] {
        arena.add_child(root, id);
    }
    let call = arena.alloc_kind(NodeKind::Call, Span::default());
    arena.replace_child(root, op, call);
    assert_eq!(arena.children(root), &[a, call, b]);
    assert_eq!(arena.get(op).parent, None);
}

#[test]
fn splice_extracts_a_run() {
    let mut arena = NodeArena::new();
    let root = arena.alloc_kind(NodeKind::Compound, Span::default());
    let ids: Vec<NodeId> = ["a", "*", "b", "+", "c"]
        .iter()
        .map(|t| {
            let kind = if t.len() == 1 && !t.chars().next().unwrap().is_alphanumeric() {
                NodeKind::Operation
            } else {
                NodeKind::Param
            };
            arena.alloc(Node::leaf(kind, *t, Span::default()))
        })
        .collect();
    for &id in &ids {
        arena.add_child(root, id);
    }
    let sub = arena.alloc_kind(NodeKind::Compound, Span::default());
    let removed = arena.splice_children(root, 0..3, vec![sub]);
    assert_eq!(removed, ids[0..3].to_vec());
    assert_eq!(arena.children(root).len(), 3);
    assert_eq!(arena.children(root)[0], sub);
    assert_eq!(arena.get(sub).parent, Some(root));
}

#[test]
fn clone_subtree_is_deep_and_detached() {
    let mut arena = NodeArena::new();
    let call = arena.alloc_kind(NodeKind::Call, Span::default());
    let x = leaf(&mut arena, "x");
    arena.add_child(call, x);
    let root = arena.alloc_kind(NodeKind::Root, Span::default());
    arena.add_child(root, call);

    let copy = arena.clone_subtree(call);
    assert_eq!(arena.get(copy).parent, None);
    assert_eq!(arena.children(copy).len(), 1);
    let copy_child = arena.children(copy)[0];
    assert_ne!(copy_child, x);
    assert_eq!(arena.get(copy_child).text, "x");

    // Mutating the copy leaves the original alone.
    arena.get_mut(copy_child).text = "y".into();
    assert_eq!(arena.get(x).text, "x");
}

#[test]
fn import_subtree_copies_dependencies() {
    let mut src = NodeArena::new();
    let body = src.alloc_kind(NodeKind::Call, Span::default());
    let pre = src.alloc_kind(NodeKind::Assign, Span::default());
    let t = leaf(&mut src, "t");
    src.add_child(pre, t);
    src.add_dependency(body, pre);

    let mut dst = NodeArena::new();
    let imported = dst.import_subtree(&src, body);
    assert_eq!(dst.get(imported).dependencies.len(), 1);
    let dep = dst.get(imported).dependencies[0];
    assert_eq!(dst.kind(dep), NodeKind::Assign);
    assert_eq!(dst.get(dst.children(dep)[0]).text, "t");
}

#[test]
fn post_order_visits_dependencies_first() {
    let mut arena = NodeArena::new();
    let root = arena.alloc_kind(NodeKind::While, Span::default());
    let cond = arena.alloc_kind(NodeKind::Condition, Span::default());
    let init = arena.alloc_kind(NodeKind::Assign, Span::default());
    arena.add_child(root, cond);
    arena.add_dependency(root, init);

    let order = arena.post_order(root);
    assert_eq!(order, vec![init, cond, root]);
}
