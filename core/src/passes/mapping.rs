//! Identifier and constant mapping.
//!
//! Every leaf left by the arithmetic stage is classified here: assignment
//! targets may create variables (first write), numeric literals and
//! resolved defines become constant opcodes or materialized constant slots,
//! and everything else must name an existing variable or cdata blob. Calls
//! get their registry binding. Any unresolved name is a hard error.

use crate::context::Context;
use crate::errors::CompileError;
use crate::opcode;
use crate::syntax::{Node, NodeArena, NodeId, NodeKind};
use crate::vars::DataKind;

pub fn run(ctx: &mut Context) {
    // Always sequential: variable ids are handed out in program order and
    // the packaged image depends on that order being reproducible.
    let mut statements = core::mem::take(&mut ctx.statements);
    for stmt in &mut statements {
        map_node(ctx, &mut stmt.arena, stmt.root);
    }
    ctx.statements = statements;
}

fn map_node(ctx: &Context, arena: &mut NodeArena, node: NodeId) {
    let deps = arena.get(node).dependencies.clone();
    for dep in deps {
        map_node(ctx, arena, dep);
    }
    match arena.kind(node) {
        NodeKind::Assign => {
            let kids: Vec<NodeId> = arena.children(node).to_vec();
            map_target(ctx, arena, kids[0]);
            for &kid in &kids[1..] {
                map_node(ctx, arena, kid);
            }
        }
        NodeKind::Call => {
            let kids: Vec<NodeId> = arena.children(node).to_vec();
            for kid in kids {
                map_node(ctx, arena, kid);
            }
            if arena.get(node).func.is_none() {
                let n = arena.get(node);
                match ctx.registry.lookup(&n.text) {
                    Some(func) => arena.get_mut(node).func = Some(func),
                    None => ctx.diags.error(
                        CompileError::UnknownFunction(n.text.clone()).to_string(),
                        n.span,
                    ),
                }
            }
        }
        NodeKind::Param => map_param(ctx, arena, node),
        NodeKind::JumpTo | NodeKind::Label => {}
        _ => {
            let kids: Vec<NodeId> = arena.children(node).to_vec();
            for kid in kids {
                map_node(ctx, arena, kid);
            }
        }
    }
}

/// Assignment targets resolve against the variable table only; the first
/// write creates the variable with its width still open.
fn map_target(ctx: &Context, arena: &mut NodeArena, node: NodeId) {
    let n = arena.get(node);
    let text = n.text.clone();
    let span = n.span;
    if ctx.resolve_define(&text).is_some() {
        ctx.diags.error(
            ecow::eco_format!("cannot assign to constant '{text}'"),
            span,
        );
        return;
    }
    if let Some(existing) = ctx.vars.lookup(&text) {
        if ctx.vars.get(existing).kind != DataKind::Number {
            ctx.diags
                .error(ecow::eco_format!("cannot assign to cdata '{text}'"), span);
            return;
        }
    }
    let (id, _created) = ctx.vars.get_or_create(text);
    arena.get_mut(node).var = Some(id);
}

fn map_param(ctx: &Context, arena: &mut NodeArena, node: NodeId) {
    let n = arena.get(node);
    let text = n.text.clone();
    let span = n.span;
    let numeric = n.is_constant
        || text
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit() || c == '.');
    if numeric {
        match text.parse::<f32>() {
            Ok(value) => attach_constant(ctx, arena, node, value),
            Err(_) => ctx.diags.error(
                CompileError::Parse(ecow::eco_format!("bad number '{text}'")).to_string(),
                span,
            ),
        }
        return;
    }
    if let Some(value) = ctx.resolve_define(&text) {
        attach_constant(ctx, arena, node, value);
        return;
    }
    match ctx.vars.lookup(&text) {
        Some(id) => {
            ctx.vars.retain(id);
            let n = arena.get_mut(node);
            n.var = Some(id);
            if ctx.vars.get(id).kind != DataKind::Number {
                n.kind = NodeKind::Cdata;
            }
        }
        None => ctx.diags.error(
            CompileError::UndefinedIdentifier(text).to_string(),
            span,
        ),
    }
}

/// Bind a constant leaf. Negative values are stored positive and wrapped in
/// a `neg` call so the fixed constant opcodes stay applicable. Values with
/// a dedicated opcode never touch the data segment.
fn attach_constant(ctx: &Context, arena: &mut NodeArena, node: NodeId, value: f32) {
    let mut value = value;
    if value < 0.0 {
        if let Some(parent) = arena.get(node).parent {
            value = -value;
            let span = arena.get(node).span;
            let mut call = Node::leaf(NodeKind::Call, "neg", span);
            call.func = ctx.registry.lookup("neg");
            call.dependencies = core::mem::take(&mut arena.get_mut(node).dependencies);
            let call = arena.alloc(call);
            arena.replace_child(parent, node, call);
            arena.add_child(call, node);
        }
    }
    let n = arena.get_mut(node);
    n.is_constant = true;
    if let Some(op) = opcode::const_op_for(value, ctx.options.constant_epsilon) {
        n.const_op = Some(op);
    } else {
        n.var = Some(
            ctx.vars
                .find_or_create_constant(value, ctx.options.constant_epsilon),
        );
    }
}
