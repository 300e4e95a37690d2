//! Statement lowering.
//!
//! Turns the flattened statement trees into a tagged instruction stream.
//! By this point every call argument is a plain operand byte: a constant
//! opcode, a biased variable reference or [`OP_STACK`]. Control flow lowers
//! to absolute jumps against labels resolved later.

use tracing::trace;

use crate::context::Context;
use crate::emit::instruction::{InstructionList, Op, Tag};
use crate::opcode::*;
use crate::registry::FuncCode;
use crate::syntax::{LabelId, NodeArena, NodeId, NodeKind};

pub fn lower(ctx: &Context) -> InstructionList {
    let mut out = InstructionList::default();
    for (i, stmt) in ctx.statements.iter().enumerate() {
        trace!(statement = i, "lowering");
        lower_list(ctx, &stmt.arena, stmt.root, &mut out);
    }
    out
}

fn lower_list(ctx: &Context, arena: &NodeArena, list: NodeId, out: &mut InstructionList) {
    for &stmt in arena.children(list) {
        lower_stmt(ctx, arena, stmt, out);
    }
}

fn lower_stmt(ctx: &Context, arena: &NodeArena, node: NodeId, out: &mut InstructionList) {
    for &dep in &arena.get(node).dependencies {
        lower_stmt(ctx, arena, dep, out);
    }
    match arena.kind(node) {
        NodeKind::Push => lower_push(ctx, arena, node, out),
        NodeKind::Assign => lower_assign(ctx, arena, node, out),
        NodeKind::Call => lower_call(ctx, arena, node, false, out),
        NodeKind::If => lower_if(ctx, arena, node, out),
        NodeKind::While => lower_while(ctx, arena, node, out),
        NodeKind::JumpTo => {
            if let Some(label) = arena.get(node).label {
                emit_jump(out, OP_JUMP, label);
            }
        }
        NodeKind::Label => {
            if let Some(label) = arena.get(node).label {
                emit_label(out, label);
            }
        }
        _ => {}
    }
}

/// The operand byte for a flattened leaf.
fn operand_byte(arena: &NodeArena, id: NodeId) -> u8 {
    let n = arena.get(id);
    if n.kind == NodeKind::Pop {
        return OP_STACK;
    }
    if let Some(op) = n.const_op {
        return op;
    }
    if let Some(var) = n.var {
        return VAR_BIAS + var.0 as u8;
    }
    OP_NOP
}

fn lower_push(ctx: &Context, arena: &NodeArena, node: NodeId, out: &mut InstructionList) {
    let inner = arena.children(node)[0];
    match arena.kind(inner) {
        NodeKind::Call => lower_call(ctx, arena, inner, true, out),
        NodeKind::Cdata => {
            // Raw blob: push the code offset of its marker.
            let Some(var) = arena.get(inner).var else {
                return;
            };
            out.push(OP_CDATA_REF);
            let mut lo = Op::tagged(0, Tag::ConstRef(var));
            lo.tags.push(Tag::OffsetMarker);
            out.push_op(lo);
            out.push_tagged(0, Tag::OffsetMarker);
        }
        _ => {
            out.push(OP_PUSH);
            out.push(operand_byte(arena, inner));
        }
    }
}

fn lower_call(
    ctx: &Context,
    arena: &NodeArena,
    node: NodeId,
    push: bool,
    out: &mut InstructionList,
) {
    let Some(func) = arena.get(node).func else {
        return;
    };
    let args = arena.children(node);
    match ctx.registry.get(func).code {
        FuncCode::Op { base } => {
            let op = if push { base + PUSH_VARIANT } else { base };
            out.push(op);
            if is_variadic(base) {
                out.push_tagged(args.len() as u8, Tag::OffsetMarker);
            }
            for &arg in args {
                out.push(operand_byte(arena, arg));
            }
        }
        FuncCode::Ext { id } => {
            out.push(if push { OP_EXT_PUSH } else { OP_EXT });
            let [lo, hi] = id.to_le_bytes();
            out.push_tagged(lo, Tag::OffsetMarker);
            out.push_tagged(hi, Tag::OffsetMarker);
            for &arg in args {
                out.push(operand_byte(arena, arg));
            }
        }
        // A bare zero-fill without a destination has no effect.
        FuncCode::Zero => {}
    }
}

fn lower_assign(ctx: &Context, arena: &NodeArena, node: NodeId, out: &mut InstructionList) {
    let kids = arena.children(node);
    let Some(var) = arena.get(kids[0]).var else {
        return;
    };
    let dst = VAR_BIAS + var.0 as u8;
    let value = *kids.last().unwrap_or(&kids[0]);

    let zero_fill = arena.kind(value) == NodeKind::Call
        && arena
            .get(value)
            .func
            .is_some_and(|f| matches!(ctx.registry.get(f).code, FuncCode::Zero));
    if zero_fill {
        out.push(OP_MOV_ZERO);
        out.push(dst);
        return;
    }

    if let Some(comp) = arena.get(node).comp {
        out.push(OP_MOV_IDX0 + comp);
        out.push(dst);
        out.push(operand_byte(arena, value));
    } else if kids.len() == 3 {
        out.push(OP_MOV_IDXV);
        out.push(dst);
        out.push(operand_byte(arena, kids[1]));
        out.push(operand_byte(arena, value));
    } else {
        out.push(OP_MOV);
        out.push(dst);
        out.push(operand_byte(arena, value));
    }
}

/// Emit a condition's pushes and leave its truth value on the stack.
fn lower_cond(ctx: &Context, arena: &NodeArena, cond: NodeId, out: &mut InstructionList) {
    let kids = arena.children(cond);
    let Some((&expr, pushes)) = kids.split_last() else {
        return;
    };
    for &p in pushes {
        lower_stmt(ctx, arena, p, out);
    }
    if arena.kind(expr) != NodeKind::Pop {
        out.push(OP_PUSH);
        out.push(operand_byte(arena, expr));
    }
}

fn lower_if(ctx: &Context, arena: &NodeArena, node: NodeId, out: &mut InstructionList) {
    let kids = arena.children(node);
    let has_else = kids.len() > 2;
    lower_cond(ctx, arena, kids[0], out);
    let skip = ctx.alloc_label();
    emit_jump(out, OP_JUMP_IF_NOT, skip);
    lower_list(ctx, arena, kids[1], out);
    if has_else {
        let end = ctx.alloc_label();
        emit_jump(out, OP_JUMP, end);
        emit_label(out, skip);
        lower_list(ctx, arena, kids[2], out);
        emit_label(out, end);
    } else {
        emit_label(out, skip);
    }
}

fn lower_while(ctx: &Context, arena: &NodeArena, node: NodeId, out: &mut InstructionList) {
    let kids = arena.children(node);
    let top = ctx.alloc_label();
    let end = ctx.alloc_label();
    emit_label(out, top);
    // Condition pushes re-run on every iteration.
    lower_cond(ctx, arena, kids[0], out);
    emit_jump(out, OP_JUMP_IF_NOT, end);
    lower_list(ctx, arena, kids[1], out);
    emit_jump(out, OP_JUMP, top);
    emit_label(out, end);
}

fn emit_jump(out: &mut InstructionList, op: u8, label: LabelId) {
    out.push(op);
    let mut lo = Op::tagged(0, Tag::JumpRef(label));
    lo.tags.push(Tag::OffsetMarker);
    out.push_op(lo);
    out.push_tagged(0, Tag::OffsetMarker);
}

fn emit_label(out: &mut InstructionList, label: LabelId) {
    let mut op = Op::tagged(OP_NOP, Tag::LabelTarget(label));
    op.tags.push(Tag::Removed);
    out.push_op(op);
}
