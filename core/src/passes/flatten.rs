//! Push/pop linearization.
//!
//! The VM evaluates one opcode at a time against a value stack, so nested
//! calls cannot stay nested. Each call in operand position is split into a
//! detached [`NodeKind::Push`] statement and a [`NodeKind::Pop`] placeholder
//! left in its place, one nesting level per pass. The pushes are then woven
//! back into the statement lists right before their consumers, ordered so
//! the leftmost operand sits on top of the stack. The worst-case stack
//! depth is recorded for the packager's region check.

use crate::context::Context;
use crate::errors::CompileError;
use crate::registry::FuncCode;
use crate::syntax::{NodeArena, NodeId, NodeKind};
use crate::vars::DataKind;

/// Nesting deeper than this many levels does not occur in sane scripts;
/// the pass loop treats it as a structural failure instead of spinning.
const MAX_PASSES: u32 = 10;

pub fn run(ctx: &mut Context) {
    let mut statements = core::mem::take(&mut ctx.statements);
    for stmt in &mut statements {
        flatten_statement(ctx, stmt);
    }
    // Depth accounting stays sequential; the stack threads through the
    // whole program.
    let mut depth = 0usize;
    let mut max_depth = 0usize;
    for stmt in &statements {
        measure_list(&stmt.arena, stmt.root, &mut depth, &mut max_depth);
    }
    ctx.statements = statements;
    ctx.max_stack_slots = max_depth;
}

fn flatten_statement(ctx: &Context, stmt: &mut crate::context::Statement) {
    let mut passes = 0u32;
    loop {
        let mut found = Vec::new();
        collect_candidates(ctx, &stmt.arena, stmt.root, &mut found);
        if found.is_empty() {
            break;
        }
        passes += 1;
        if passes > MAX_PASSES {
            let span = stmt.arena.get(stmt.root).span;
            ctx.diags
                .error(CompileError::UnresolvableNesting(passes).to_string(), span);
            break;
        }
        for (parent, child) in found {
            wrap(&mut stmt.arena, parent, child);
        }
    }
    place_list(&mut stmt.arena, stmt.root);
    check_placed(ctx, &stmt.arena);
}

/// True for nodes that must move onto the stack before their consumer
/// runs: pushable calls and raw cdata references.
fn wrappable(ctx: &Context, arena: &NodeArena, id: NodeId) -> bool {
    let n = arena.get(id);
    match n.kind {
        NodeKind::Call => n
            .func
            .is_some_and(|f| !matches!(ctx.registry.get(f).code, FuncCode::Zero)),
        NodeKind::Cdata => n
            .var
            .is_some_and(|v| ctx.vars.get(v).kind == DataKind::BlobRaw),
        _ => false,
    }
}

/// Operand-position children, innermost first: a call qualifies only once
/// its own operands are already flat.
fn collect_candidates(
    ctx: &Context,
    arena: &NodeArena,
    node: NodeId,
    out: &mut Vec<(NodeId, NodeId)>,
) {
    for &dep in &arena.get(node).dependencies {
        collect_candidates(ctx, arena, dep, out);
    }
    for &kid in arena.children(node) {
        collect_candidates(ctx, arena, kid, out);
    }
    let operands: &[NodeId] = match arena.kind(node) {
        NodeKind::Call | NodeKind::Condition => arena.children(node),
        NodeKind::Assign => &arena.children(node)[1..],
        _ => &[],
    };
    for &kid in operands {
        let flat = arena
            .children(kid)
            .iter()
            .all(|&c| !wrappable(ctx, arena, c));
        if wrappable(ctx, arena, kid) && flat {
            out.push((node, kid));
        }
    }
}

fn wrap(arena: &mut NodeArena, parent: NodeId, child: NodeId) {
    let src = arena.get(child);
    let span = src.span;
    let width = src.vector_size;
    let pop = arena.alloc_kind(NodeKind::Pop, span);
    arena.get_mut(pop).vector_size = width;
    arena.get_mut(pop).is_vector = width > 1;
    arena.replace_child(parent, child, pop);
    let push = arena.alloc_kind(NodeKind::Push, span);
    arena.get_mut(push).vector_size = width;
    arena.get_mut(push).is_vector = width > 1;
    arena.add_child(push, child);
    arena.get_mut(push).linked_pop = Some(pop);
    arena.get_mut(pop).linked_push = Some(push);
}

/// Weave detached pushes back in front of their consumers, list by list.
fn place_list(arena: &mut NodeArena, list: NodeId) {
    let mut idx = 0;
    while idx < arena.children(list).len() {
        let stmt = arena.children(list)[idx];
        place_stmt(arena, list, stmt);
        match arena.kind(stmt) {
            NodeKind::If => {
                let kids: Vec<NodeId> = arena.children(stmt).to_vec();
                place_cond(arena, kids[0]);
                place_list(arena, kids[1]);
                if let Some(&els) = kids.get(2) {
                    place_list(arena, els);
                }
            }
            NodeKind::While => {
                let kids: Vec<NodeId> = arena.children(stmt).to_vec();
                place_cond(arena, kids[0]);
                place_list(arena, kids[1]);
            }
            _ => {}
        }
        idx = arena.child_position(list, stmt) + 1;
    }
}

/// Condition nodes double as a list: the pushes land before the final
/// operand so loops can re-evaluate them every iteration.
fn place_cond(arena: &mut NodeArena, cond: NodeId) {
    if let Some(&expr) = arena.children(cond).last() {
        place_stmt(arena, cond, expr);
    }
}

fn place_stmt(arena: &mut NodeArena, list: NodeId, stmt: NodeId) {
    let mut pops = Vec::new();
    collect_pops_rev(arena, stmt, &mut pops);
    for pop in pops {
        let Some(push) = arena.get(pop).linked_push else {
            continue;
        };
        if arena.get(push).parent.is_some() {
            continue;
        }
        let pos = arena.child_position(list, stmt);
        arena.insert_child(list, pos, push);
        place_stmt(arena, list, push);
    }
}

/// Pops in reverse consumption order: the statement's own operands right
/// to left, then its dependencies last to first. Nested statement lists
/// place their own pops.
fn collect_pops_rev(arena: &NodeArena, node: NodeId, out: &mut Vec<NodeId>) {
    match arena.kind(node) {
        NodeKind::Pop => {
            out.push(node);
            return;
        }
        NodeKind::Condition | NodeKind::Then | NodeKind::Else | NodeKind::WhileBody => return,
        _ => {}
    }
    for &kid in arena.children(node).iter().rev() {
        collect_pops_rev(arena, kid, out);
    }
    for &dep in arena.get(node).dependencies.iter().rev() {
        collect_pops_rev(arena, dep, out);
    }
}

fn check_placed(ctx: &Context, arena: &NodeArena) {
    for i in 0..arena.len() {
        let id = NodeId(i as u32);
        let n = arena.get(id);
        if n.kind == NodeKind::Push && n.parent.is_none() {
            ctx.diags
                .error(CompileError::UnplacedPush.to_string(), n.span);
        }
    }
}

// === Stack depth accounting ===

fn pop_slots(arena: &NodeArena, node: NodeId) -> usize {
    let mut pops = Vec::new();
    collect_pops_rev(arena, node, &mut pops);
    pops.iter()
        .map(|&p| arena.get(p).vector_size.max(1) as usize)
        .sum()
}

fn measure_list(arena: &NodeArena, list: NodeId, depth: &mut usize, max: &mut usize) {
    let kids: Vec<NodeId> = arena.children(list).to_vec();
    for stmt in kids {
        match arena.kind(stmt) {
            NodeKind::Push => {
                *depth = depth.saturating_sub(pop_slots(arena, stmt));
                *depth += arena.get(stmt).vector_size.max(1) as usize;
                *max = (*max).max(*depth);
            }
            NodeKind::If | NodeKind::While => {
                let saved = *depth;
                let inner: Vec<NodeId> = arena.children(stmt).to_vec();
                measure_list(arena, inner[0], depth, max);
                // The condition value itself transits the stack.
                *max = (*max).max(*depth + 1);
                *depth = saved;
                for &body in &inner[1..] {
                    measure_list(arena, body, depth, max);
                    *depth = saved;
                }
            }
            _ => {
                *max = (*max).max(*depth);
                *depth = depth.saturating_sub(pop_slots(arena, stmt));
            }
        }
    }
}
