//! Vector width inference.
//!
//! Walks every statement in program order, computing a width for each
//! expression node and fixing variable widths at their first write. Calls
//! check arity and operand widths against the registry; conditions and
//! index expressions must come out scalar. Afterwards the i/o bindings are
//! validated: every output needs at least one write, and an input nobody
//! reads only earns a warning.

use crate::context::Context;
use crate::errors::CompileError;
use crate::registry::FuncCode;
use crate::syntax::{NodeArena, NodeId, NodeKind};

pub fn run(ctx: &mut Context) {
    let mut statements = core::mem::take(&mut ctx.statements);
    for stmt in &mut statements {
        infer_stmt(ctx, &mut stmt.arena, stmt.root);
    }
    ctx.statements = statements;
    check_io(ctx);
    ctx.check_io_blocks();
}

fn infer_stmt(ctx: &Context, arena: &mut NodeArena, node: NodeId) {
    let deps = arena.get(node).dependencies.clone();
    for dep in deps {
        infer_stmt(ctx, arena, dep);
    }
    match arena.kind(node) {
        NodeKind::Root | NodeKind::Then | NodeKind::Else | NodeKind::WhileBody => {
            let kids: Vec<NodeId> = arena.children(node).to_vec();
            for kid in kids {
                infer_stmt(ctx, arena, kid);
            }
        }
        NodeKind::If | NodeKind::While => {
            let kids: Vec<NodeId> = arena.children(node).to_vec();
            let expr = arena.children(kids[0])[0];
            let w = infer_expr(ctx, arena, expr, 0);
            if w != 1 {
                let span = arena.get(expr).span;
                ctx.diags
                    .error(CompileError::ConditionNotScalar(w).to_string(), span);
            }
            for &kid in &kids[1..] {
                infer_stmt(ctx, arena, kid);
            }
        }
        NodeKind::Assign => infer_assign(ctx, arena, node),
        NodeKind::Call => {
            infer_expr(ctx, arena, node, 0);
        }
        _ => {}
    }
}

fn infer_assign(ctx: &Context, arena: &mut NodeArena, node: NodeId) {
    let kids: Vec<NodeId> = arena.children(node).to_vec();
    let target = kids[0];
    let span = arena.get(node).span;
    let tvar = arena.get(target).var;
    let mut target_width = tvar.map_or(0, |v| ctx.vars.width(v));
    let comp = arena.get(node).comp;
    let indexed = comp.is_some() || kids.len() == 3;
    let value = *kids.last().unwrap_or(&target);

    if indexed {
        if kids.len() == 3 {
            let iw = infer_expr(ctx, arena, kids[1], 0);
            if iw != 1 {
                ctx.diags
                    .error(CompileError::ConditionNotScalar(iw).to_string(), span);
            }
        }
        let vw = infer_expr(ctx, arena, value, 1);
        let name = arena.get(target).text.clone();
        if target_width == 0 {
            ctx.diags.error(
                ecow::eco_format!("'{name}' is indexed before it is assigned"),
                span,
            );
            return;
        }
        if vw != 1 {
            ctx.diags.error(
                CompileError::AssignWidthMismatch {
                    name: name.clone(),
                    expected: 1,
                    found: vw,
                }
                .to_string(),
                span,
            );
        }
        if let Some(c) = comp {
            if c >= target_width {
                ctx.diags.error(
                    CompileError::IndexOutOfRange {
                        name,
                        comp: c,
                        width: target_width,
                    }
                    .to_string(),
                    span,
                );
            }
        }
        arena.get_mut(node).vector_size = 1;
        return;
    }

    let vw = infer_expr(ctx, arena, value, target_width);
    if target_width == 0 {
        if let Some(var) = tvar {
            target_width = vw.max(1);
            ctx.vars.set_width(var, target_width);
        }
    } else if vw != target_width {
        ctx.diags.error(
            CompileError::AssignWidthMismatch {
                name: arena.get(target).text.clone(),
                expected: target_width,
                found: vw,
            }
            .to_string(),
            span,
        );
    }
    let n = arena.get_mut(node);
    n.vector_size = target_width;
    n.is_vector = target_width > 1;
}

/// Compute and record one expression's width. `hint` is the destination
/// width, used by zero-fills whose own size is otherwise open.
fn infer_expr(ctx: &Context, arena: &mut NodeArena, node: NodeId, hint: u8) -> u8 {
    let deps = arena.get(node).dependencies.clone();
    for dep in deps {
        infer_stmt(ctx, arena, dep);
    }
    let width = match arena.kind(node) {
        NodeKind::Param => {
            let n = arena.get(node);
            if n.is_constant || n.const_op.is_some() {
                1
            } else if let Some(var) = n.var {
                let w = ctx.vars.width(var);
                if w == 0 {
                    ctx.diags.error(
                        ecow::eco_format!("'{}' is read before it is assigned", n.text),
                        n.span,
                    );
                    1
                } else {
                    w
                }
            } else {
                1
            }
        }
        NodeKind::Cdata => 1,
        NodeKind::Call => infer_call(ctx, arena, node, hint),
        _ => 1,
    };
    let n = arena.get_mut(node);
    n.vector_size = width;
    n.is_vector = width > 1;
    width
}

fn infer_call(ctx: &Context, arena: &mut NodeArena, node: NodeId, hint: u8) -> u8 {
    let Some(func) = arena.get(node).func else {
        return 1;
    };
    let desc = ctx.registry.get(func).clone();
    let span = arena.get(node).span;
    let kids: Vec<NodeId> = arena.children(node).to_vec();

    if let FuncCode::Zero = desc.code {
        let preset = arena.get(node).vector_size;
        return if hint > 0 {
            hint
        } else if preset > 0 {
            preset
        } else {
            1
        };
    }

    let mut widths = Vec::with_capacity(kids.len());
    for &kid in &kids {
        widths.push(infer_expr(ctx, arena, kid, 0));
    }

    let argc = kids.len();
    if argc < desc.min_args as usize || argc > desc.max_args as usize {
        ctx.diags.error(
            CompileError::ArityMismatch {
                name: desc.name.clone(),
                min: desc.min_args,
                max: desc.max_args,
                found: argc as u8,
            }
            .to_string(),
            span,
        );
        return desc.returns_width.max(1);
    }

    // Component reads bound-check against the operand, not the registry.
    if let Some(comp) = component_index(&desc.name) {
        if comp >= widths[0] {
            ctx.diags.error(
                CompileError::IndexOutOfRange {
                    name: arena.get(kids[0]).text.clone(),
                    comp,
                    width: widths[0],
                }
                .to_string(),
                span,
            );
        }
        return 1;
    }

    if desc.accepts_width != 0 {
        for &w in &widths {
            if w != desc.accepts_width {
                ctx.diags.error(
                    CompileError::WidthMismatch {
                        name: desc.name.clone(),
                        expected: desc.accepts_width,
                        found: w,
                    }
                    .to_string(),
                    span,
                );
            }
        }
    } else {
        // Any uniform width, with scalars broadcasting.
        let wide = widths.iter().copied().find(|&w| w > 1);
        if let Some(expected) = wide {
            for &w in &widths {
                if w != 1 && w != expected {
                    ctx.diags.error(
                        CompileError::WidthMismatch {
                            name: desc.name.clone(),
                            expected,
                            found: w,
                        }
                        .to_string(),
                        span,
                    );
                }
            }
        }
    }

    if desc.returns_width != 0 {
        desc.returns_width
    } else {
        widths.iter().copied().max().unwrap_or(1)
    }
}

fn component_index(name: &str) -> Option<u8> {
    match name {
        "idx0" => Some(0),
        "idx1" => Some(1),
        "idx2" => Some(2),
        "idx3" => Some(3),
        _ => None,
    }
}

/// I/o bookkeeping after inference: outputs must be written, idle inputs
/// are worth a warning.
fn check_io(ctx: &Context) {
    for mapping in &ctx.io_outputs {
        if ctx.vars.ref_count(mapping.var) < 2 {
            ctx.diags.error(
                CompileError::OutputNeverComputed(mapping.name.clone()).to_string(),
                mapping.span,
            );
        }
    }
    for mapping in &ctx.io_inputs {
        if ctx.vars.ref_count(mapping.var) < 2 {
            ctx.diags.warning(
                ecow::eco_format!("input '{}' is never read", mapping.name),
                mapping.span,
            );
        }
    }
}
