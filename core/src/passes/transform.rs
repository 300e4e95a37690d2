//! Desugaring stage.
//!
//! Pure tree rewriting, applied per statement in source order:
//! `switch` becomes an if-chain sharing one end label, `for` becomes a
//! `while` with its initializer as a dependency, inline-function calls are
//! substituted by deep clones of their bodies, indexers are classified into
//! the fixed index operations, equal-component vector literals become
//! `expand` calls, and zero-valued assignments become `zero` calls.
//! Substituted bodies are re-transformed recursively since they may contain
//! any of the above.

use ecow::EcoString;
use smallvec::SmallVec;

use crate::context::Context;
use crate::errors::CompileError;
use crate::syntax::{Indexer, Node, NodeArena, NodeId, NodeKind};

/// Inline expansion depth cap; exceeding it means (mutual) recursion.
const MAX_INLINE_DEPTH: u32 = 8;

pub fn run(ctx: &mut Context) {
    let mut statements = core::mem::take(&mut ctx.statements);
    for stmt in &mut statements {
        transform_list(ctx, &mut stmt.arena, stmt.root, 0);
    }
    ctx.statements = statements;
}

/// Transform every statement in `parent`'s child list, tracking splices.
fn transform_list(ctx: &Context, arena: &mut NodeArena, parent: NodeId, depth: u32) {
    let mut remaining = arena.children(parent).len();
    let mut pos = 0usize;
    while remaining > 0 {
        let used = transform_stmt(ctx, arena, parent, pos, depth);
        pos += used;
        remaining -= 1;
    }
}

/// Transform the statement at `parent`/`index`. Returns how many fully
/// transformed nodes now occupy that slot (a switch or a statement-position
/// inline call expands to several).
fn transform_stmt(
    ctx: &Context,
    arena: &mut NodeArena,
    parent: NodeId,
    index: usize,
    depth: u32,
) -> usize {
    let node = arena.children(parent)[index];
    match arena.kind(node) {
        NodeKind::Switch => {
            let seq = rewrite_switch(ctx, arena, node);
            let count = seq.len();
            arena.splice_children(parent, index..index + 1, seq);
            let mut remaining = count;
            let mut pos = index;
            let mut total = 0usize;
            while remaining > 0 {
                let used = transform_stmt(ctx, arena, parent, pos, depth);
                pos += used;
                total += used;
                remaining -= 1;
            }
            total
        }
        NodeKind::For => {
            let while_node = rewrite_for(arena, node);
            arena.splice_children(parent, index..index + 1, vec![while_node]);
            transform_stmt(ctx, arena, parent, index, depth)
        }
        NodeKind::While => {
            let deps = arena.get(node).dependencies.clone();
            for dep in deps {
                transform_dep(ctx, arena, dep, depth);
            }
            let kids: Vec<NodeId> = arena.children(node).to_vec();
            transform_condition(ctx, arena, kids[0], depth);
            transform_list(ctx, arena, kids[1], depth);
            1
        }
        NodeKind::If => {
            let kids: Vec<NodeId> = arena.children(node).to_vec();
            transform_condition(ctx, arena, kids[0], depth);
            transform_list(ctx, arena, kids[1], depth);
            if let Some(&els) = kids.get(2) {
                transform_list(ctx, arena, els, depth);
            }
            1
        }
        NodeKind::Assign => {
            transform_assign(ctx, arena, node, depth);
            1
        }
        NodeKind::Call => {
            let name = arena.get(node).text.clone();
            if ctx.inline_fns.contains_key(&name) {
                return inline_call_statement(ctx, arena, parent, index, depth);
            }
            transform_call_args(ctx, arena, node, depth);
            1
        }
        NodeKind::JumpTo | NodeKind::Label => 1,
        other => {
            tracing::debug!(?other, "unexpected statement kind survives to transform");
            1
        }
    }
}

/// Dependencies hold plain statements; loop initializers are assignments
/// and inlined pre-return statements were already transformed at their
/// substitution site, so splicing kinds cannot appear here.
fn transform_dep(ctx: &Context, arena: &mut NodeArena, dep: NodeId, depth: u32) {
    match arena.kind(dep) {
        NodeKind::Assign => transform_assign(ctx, arena, dep, depth),
        NodeKind::Call => transform_call_args(ctx, arena, dep, depth),
        _ => {}
    }
}

fn transform_condition(ctx: &Context, arena: &mut NodeArena, cond: NodeId, depth: u32) {
    let expr = arena.children(cond)[0];
    transform_expr(ctx, arena, expr, depth);
}

// === switch / for ===

/// `switch` becomes a chain of ifs comparing the subject per case, each
/// case body ending in a jump to a shared end label; the default body is
/// the chain's tail.
fn rewrite_switch(ctx: &Context, arena: &mut NodeArena, node: NodeId) -> Vec<NodeId> {
    let span = arena.get(node).span;
    let kids: Vec<NodeId> = arena.children(node).to_vec();
    if kids.len() < 2 {
        ctx.diags
            .error(CompileError::MalformedSwitch.to_string(), span);
        return Vec::new();
    }
    let subject = kids[0];
    arena.detach(subject);
    let end = ctx.alloc_label();
    let mut seq: Vec<NodeId> = Vec::new();

    for &arm in &kids[1..] {
        match arena.kind(arm) {
            NodeKind::Case => {
                let value = arena.children(arm)[0];
                let then = arena.children(arm)[1];
                arena.detach(value);
                arena.detach(then);

                let subj = arena.clone_subtree(subject);
                let eq = arena.alloc(Node::leaf(NodeKind::Call, "eq", span));
                arena.add_child(eq, subj);
                arena.add_child(eq, value);
                let cond = arena.alloc_kind(NodeKind::Condition, span);
                arena.add_child(cond, eq);

                let mut jump = Node::new(NodeKind::JumpTo, span);
                jump.label = Some(end);
                let jump = arena.alloc(jump);
                arena.add_child(then, jump);

                let if_node = arena.alloc_kind(NodeKind::If, span);
                arena.add_child(if_node, cond);
                arena.add_child(if_node, then);
                seq.push(if_node);
            }
            NodeKind::Default => {
                let then = arena.children(arm)[0];
                let body: Vec<NodeId> = arena.children(then).to_vec();
                for stmt in body {
                    arena.detach(stmt);
                    seq.push(stmt);
                }
            }
            _ => {}
        }
    }
    let mut label = Node::new(NodeKind::Label, span);
    label.label = Some(end);
    seq.push(arena.alloc(label));
    seq
}

/// `for(init; cond; iter) { body }` becomes a while loop: `init` turns
/// into a dependency of the loop node and `iter` into the body's last
/// statement.
fn rewrite_for(arena: &mut NodeArena, node: NodeId) -> NodeId {
    let span = arena.get(node).span;
    let kids: Vec<NodeId> = arena.children(node).to_vec();
    let (init, cond, iter, body) = (kids[0], kids[1], kids[2], kids[3]);
    for k in kids {
        arena.detach(k);
    }
    arena.add_child(body, iter);
    let while_node = arena.alloc_kind(NodeKind::While, span);
    arena.add_child(while_node, cond);
    arena.add_child(while_node, body);
    arena.add_dependency(while_node, init);
    while_node
}

// === assignments ===

fn transform_assign(ctx: &Context, arena: &mut NodeArena, node: NodeId, depth: u32) {
    let target = arena.children(node)[0];
    let value = arena.children(node)[1];

    // Fold the target's single indexer into the assignment itself.
    let indexers: SmallVec<[Indexer; 1]> = core::mem::take(&mut arena.get_mut(target).indexers);
    let mut indexed = false;
    if let Some(&indexer) = indexers.first() {
        indexed = true;
        match indexer {
            Indexer::Component(c) => arena.get_mut(node).comp = Some(c),
            Indexer::Dynamic(expr) => {
                let expr = transform_expr(ctx, arena, expr, depth);
                arena.insert_child(node, 1, expr);
            }
        }
    }

    // Zero-valued whole-variable assignment turns into a zero fill, which
    // is cheaper for the VM than materializing a zero and copying it.
    if !indexed
        && let Some(width) = zero_width(ctx, arena, value)
    {
        let span = arena.get(value).span;
        let mut zero = Node::leaf(NodeKind::Call, "zero", span);
        zero.vector_size = width;
        let zero = arena.alloc(zero);
        arena.replace_child(node, value, zero);
        return;
    }

    transform_expr(ctx, arena, value, depth);
}

/// Component count of a compile-time zero expression, or `None`.
fn zero_width(ctx: &Context, arena: &NodeArena, node: NodeId) -> Option<u8> {
    fn is_zero_leaf(ctx: &Context, node: &Node) -> bool {
        if node.kind != NodeKind::Param || !node.indexers.is_empty() {
            return false;
        }
        let value = node
            .text
            .parse::<f32>()
            .ok()
            .or_else(|| ctx.resolve_define(&node.text));
        value.is_some_and(|v| v.abs() <= ctx.options.constant_epsilon)
    }

    let node = arena.get(node);
    match node.kind {
        NodeKind::Param => is_zero_leaf(ctx, node).then_some(1),
        NodeKind::Compound => {
            let kids = &node.children;
            if kids.is_empty() || kids.len() > 4 {
                return None;
            }
            if kids.len() == 1 {
                return zero_width(ctx, arena, kids[0]);
            }
            kids.iter()
                .all(|&k| is_zero_leaf(ctx, arena.get(k)))
                .then_some(kids.len() as u8)
        }
        _ => None,
    }
}

// === expressions ===

/// Transform an expression subtree. Returns the (possibly new) root; when
/// the input node was attached, the new root has already taken its place
/// under the parent, so attached callers may ignore the return value.
fn transform_expr(ctx: &Context, arena: &mut NodeArena, node: NodeId, depth: u32) -> NodeId {
    let mut node = node;
    match arena.kind(node) {
        NodeKind::Call => {
            let name = arena.get(node).text.clone();
            if ctx.inline_fns.contains_key(&name) {
                node = inline_call_expr(ctx, arena, node, depth);
            } else {
                transform_call_args(ctx, arena, node, depth);
            }
        }
        NodeKind::Compound => {
            let kids: Vec<NodeId> = arena.children(node).to_vec();
            for kid in kids {
                transform_expr(ctx, arena, kid, depth);
            }
            node = fold_expand(ctx, arena, node);
        }
        _ => {}
    }
    hoist_indexers(ctx, arena, node, depth)
}

fn transform_call_args(ctx: &Context, arena: &mut NodeArena, call: NodeId, depth: u32) {
    let kids: Vec<NodeId> = arena.children(call).to_vec();
    for kid in kids {
        transform_expr(ctx, arena, kid, depth);
    }
}

/// A compound of 2-4 identical leaves is a uniform vector literal and
/// lowers to a single `expand` call over one copy of the leaf.
fn fold_expand(ctx: &Context, arena: &mut NodeArena, node: NodeId) -> NodeId {
    let kids: Vec<NodeId> = arena.children(node).to_vec();
    if kids.len() < 2 {
        return node;
    }
    let identical = kids.iter().all(|&k| {
        let n = arena.get(k);
        n.kind == NodeKind::Param
            && n.indexers.is_empty()
            && n.text == arena.get(kids[0]).text
    });
    if !identical {
        return node;
    }
    let span = arena.get(node).span;
    if kids.len() > 4 {
        ctx.diags
            .error(CompileError::VectorTooWide(kids.len()).to_string(), span);
        return node;
    }
    let name = ecow::eco_format!("expand{}", kids.len());
    let call = arena.alloc(Node::leaf(NodeKind::Call, name, span));
    let first = kids[0];
    arena.detach(first);
    for &k in &kids[1..] {
        arena.detach(k);
    }
    arena.add_child(call, first);
    // Take the compound's place under its parent, if it has one.
    if let Some(parent) = arena.get(node).parent {
        arena.replace_child(parent, node, call);
    }
    call
}

/// Expression-position indexers wrap their subject in one of the fixed
/// index calls; chained indexers nest outward.
fn hoist_indexers(ctx: &Context, arena: &mut NodeArena, node: NodeId, depth: u32) -> NodeId {
    let indexers: SmallVec<[Indexer; 1]> = core::mem::take(&mut arena.get_mut(node).indexers);
    let mut current = node;
    for indexer in indexers {
        let span = arena.get(current).span;
        let parent = arena.get(current).parent;
        let (name, index_expr): (EcoString, Option<NodeId>) = match indexer {
            Indexer::Component(c) => (ecow::eco_format!("idx{c}"), None),
            Indexer::Dynamic(expr) => {
                let expr = transform_expr(ctx, arena, expr, depth);
                ("idxv".into(), Some(expr))
            }
        };
        let call = arena.alloc(Node::leaf(NodeKind::Call, name, span));
        if let Some(parent) = parent {
            arena.replace_child(parent, current, call);
        } else {
            arena.detach(current);
        }
        arena.add_child(call, current);
        if let Some(expr) = index_expr {
            arena.add_child(call, expr);
        }
        current = call;
    }
    current
}

// === inline functions ===

/// Substitute an expression-position inline call. The call node is
/// replaced by the (remapped) return expression; pre-return body
/// statements ride along as dependencies.
fn inline_call_expr(ctx: &Context, arena: &mut NodeArena, call: NodeId, depth: u32) -> NodeId {
    let Some((result, deps)) = substitute(ctx, arena, call, depth) else {
        return call;
    };
    // Indexers on the call itself now apply to the substituted expression.
    let indexers = core::mem::take(&mut arena.get_mut(call).indexers);
    arena.get_mut(result).indexers.extend(indexers);
    if let Some(parent) = arena.get(call).parent {
        arena.replace_child(parent, call, result);
    }
    let root = transform_expr(ctx, arena, result, depth + 1);
    for dep in deps {
        transform_dep(ctx, arena, dep, depth + 1);
        arena.add_dependency(root, dep);
    }
    root
}

/// Statement-position inline call: the result is discarded, so only the
/// pre-return statements and a call-shaped return expression survive.
fn inline_call_statement(
    ctx: &Context,
    arena: &mut NodeArena,
    parent: NodeId,
    index: usize,
    depth: u32,
) -> usize {
    let call = arena.children(parent)[index];
    let span = arena.get(call).span;
    let Some((result, deps)) = substitute(ctx, arena, call, depth) else {
        arena.splice_children(parent, index..index + 1, Vec::new());
        return 0;
    };
    let mut seq = deps;
    if arena.kind(result) == NodeKind::Call {
        seq.push(result);
    } else {
        ctx.diags.warning(
            "result of inline call is discarded in statement position",
            span,
        );
    }
    let count = seq.len();
    arena.splice_children(parent, index..index + 1, seq);
    let mut remaining = count;
    let mut pos = index;
    let mut total = 0usize;
    while remaining > 0 {
        let used = transform_stmt(ctx, arena, parent, pos, depth + 1);
        pos += used;
        total += used;
        remaining -= 1;
    }
    total
}

/// Clone an inline function's body into the caller's arena with formals
/// remapped to the call's arguments. Returns the return expression and
/// the pre-return statements.
fn substitute(
    ctx: &Context,
    arena: &mut NodeArena,
    call: NodeId,
    depth: u32,
) -> Option<(NodeId, Vec<NodeId>)> {
    let name = arena.get(call).text.clone();
    let span = arena.get(call).span;
    let f = &ctx.inline_fns[&name];

    if depth >= MAX_INLINE_DEPTH {
        ctx.diags
            .error(CompileError::RecursiveInline(name).to_string(), span);
        return None;
    }
    let args: Vec<NodeId> = arena.children(call).to_vec();
    if args.len() != f.params.len() {
        ctx.diags.error(
            CompileError::ArityMismatch {
                name,
                min: f.params.len() as u8,
                max: f.params.len() as u8,
                found: args.len() as u8,
            }
            .to_string(),
            span,
        );
        return None;
    }
    for &arg in &args {
        arena.detach(arg);
    }

    let imported: Vec<NodeId> = f
        .body
        .iter()
        .map(|&b| arena.import_subtree(&f.arena, b))
        .collect();
    let (&ret, pre) = imported.split_last()?;
    let result = arena.children(ret)[1];
    arena.detach(result);

    let mut mapped = Vec::with_capacity(pre.len() + 1);
    for &stmt in pre {
        mapped.push(remap_formals(ctx, arena, stmt, f, &args));
    }
    let result = remap_formals(ctx, arena, result, f, &args);
    Some((result, mapped))
}

/// Replace formal-parameter leaves with clones of the actual arguments.
/// Any other bare identifier inside an inline body is a declaration error:
/// bodies may not reference or introduce variables.
fn remap_formals(
    ctx: &Context,
    arena: &mut NodeArena,
    node: NodeId,
    f: &crate::context::InlineFn,
    args: &[NodeId],
) -> NodeId {
    if arena.kind(node) == NodeKind::Param {
        let text = arena.get(node).text.clone();
        if let Some(i) = f.params.iter().position(|p| *p == text) {
            let clone = arena.clone_subtree(args[i]);
            // Chained indexers on the formal carry over to the clone.
            let indexers = core::mem::take(&mut arena.get_mut(node).indexers);
            arena.get_mut(clone).indexers.extend(indexers);
            if let Some(parent) = arena.get(node).parent {
                arena.replace_child(parent, node, clone);
            }
            return clone;
        }
        let named = text == "return"
            || text.starts_with(|c: char| c.is_ascii_digit())
            || ctx.resolve_define(&text).is_some();
        if !named {
            let span = arena.get(node).span;
            ctx.diags.error(
                CompileError::InlineVarDeclaration {
                    fun: f.name.clone(),
                    name: text,
                }
                .to_string(),
                span,
            );
        }
        return node;
    }
    let kids: Vec<NodeId> = arena.children(node).to_vec();
    for kid in kids {
        remap_formals(ctx, arena, kid, f, args);
    }
    let indexers = arena.get(node).indexers.clone();
    for indexer in indexers {
        if let Indexer::Dynamic(expr) = indexer {
            remap_formals(ctx, arena, expr, f, args);
        }
    }
    node
}
