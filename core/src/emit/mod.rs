//! Bytecode emission: lowering, offset resolution and packaging.

pub mod instruction;
pub mod lower;
pub mod package;
pub mod resolve;

#[cfg(test)]
mod emit_test;

pub use package::{package, PackagedProgram, CODE_CAPACITY, DATA_SLOTS};

use crate::context::Context;
use crate::emit::instruction::{Op, Tag};
use crate::opcode::{OP_CDATA, OP_END};
use crate::vars::{DataKind, VarId};

/// Lower every statement, terminate the stream and append the raw cdata
/// blobs behind the end marker, then resolve all offsets.
pub fn assemble(ctx: &Context) -> resolve::Resolved {
    let mut list = lower::lower(ctx);
    list.push(OP_END);
    for (i, var) in ctx.vars.snapshot().into_iter().enumerate() {
        if var.kind != DataKind::BlobRaw {
            continue;
        }
        list.push_op(Op::tagged(OP_CDATA, Tag::ConstDef(VarId(i as u16))));
        let [lo, hi] = (var.payload.len() as u16).to_le_bytes();
        list.push_tagged(lo, Tag::OffsetMarker);
        list.push_tagged(hi, Tag::OffsetMarker);
        for byte in var.payload {
            list.push_tagged(byte, Tag::OffsetMarker);
        }
    }
    resolve::resolve(ctx, list)
}
