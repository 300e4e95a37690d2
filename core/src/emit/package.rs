//! Final packaging.
//!
//! Produces the fixed-size image the VM maps directly: one code segment,
//! one f32 data segment and a meta byte per data slot. Variable-reference
//! bytes still carry table ids at this point; the packager rewrites them to
//! biased slot offsets with a skip counter so hardcoded operand data is
//! never touched, then re-scans the stream to prove it.

use static_assertions::const_assert;
use static_assertions::const_assert_eq;

use crate::context::Context;
use crate::diagnostics::Span;
use crate::emit::resolve::Resolved;
use crate::errors::CompileError;
use crate::opcode::{self, VAR_BIAS};
use crate::vars::DataKind;

/// Code segment capacity; jump offsets are 16 bits.
pub const CODE_CAPACITY: usize = 65536;
/// Data segment slots; slot references are biased bytes.
pub const DATA_SLOTS: usize = 128;

const_assert!(CODE_CAPACITY <= u16::MAX as usize + 1);
const_assert_eq!(DATA_SLOTS, VAR_BIAS as usize);

/// The VM-ready image.
#[derive(Debug)]
pub struct PackagedProgram {
    pub code: [u8; CODE_CAPACITY],
    pub code_len: usize,
    pub data: [f32; DATA_SLOTS],
    pub data_count: usize,
    /// Per-slot descriptor at each variable's first slot: data kind in the
    /// high nibble, component or slot count in the low nibble.
    pub meta: [u8; DATA_SLOTS],
}

pub fn package(ctx: &Context, resolved: &Resolved) -> Option<Box<PackagedProgram>> {
    if resolved.code.len() > CODE_CAPACITY {
        ctx.diags.error(
            CompileError::CodeOverflow(resolved.code.len()).to_string(),
            Span::default(),
        );
        return None;
    }

    let mut out = Box::new(PackagedProgram {
        code: [0; CODE_CAPACITY],
        code_len: resolved.code.len(),
        data: [0.0; DATA_SLOTS],
        data_count: 0,
        meta: [0; DATA_SLOTS],
    });

    // Recompute the slot layout and cross-check the table fixed in cleanup;
    // a mismatch means a stage moved a variable after slot assignment.
    let vars = ctx.vars.snapshot();
    let mut slot = 0usize;
    for (i, var) in vars.iter().enumerate() {
        let expected = ctx.offset_table.get(i).copied().flatten();
        match var.kind {
            DataKind::BlobRaw => {
                if expected.is_some() {
                    ctx.diags.error(
                        ecow::eco_format!("raw blob '{}' was assigned a data slot", var.name),
                        Span::default(),
                    );
                    return None;
                }
                continue;
            }
            DataKind::Number => {
                if expected != Some(slot as u8) {
                    ctx.diags.error(
                        CompileError::OffsetMismatch {
                            slot: i as u8,
                            expected: expected.unwrap_or(0),
                            found: slot as u8,
                        }
                        .to_string(),
                        Span::default(),
                    );
                    return None;
                }
                let width = var.width.max(1) as usize;
                if slot + width > DATA_SLOTS {
                    ctx.diags.error(
                        CompileError::DataOverflow(slot + width).to_string(),
                        Span::default(),
                    );
                    return None;
                }
                for (c, value) in var.values.iter().enumerate().take(width) {
                    out.data[slot + c] = *value;
                }
                out.meta[slot] = (var.kind.meta_tag() << 4) | var.width.max(1).min(15);
                slot += width;
            }
            _ => {
                if expected != Some(slot as u8) {
                    ctx.diags.error(
                        CompileError::OffsetMismatch {
                            slot: i as u8,
                            expected: expected.unwrap_or(0),
                            found: slot as u8,
                        }
                        .to_string(),
                        Span::default(),
                    );
                    return None;
                }
                let slots = var.payload.len().div_ceil(4);
                if slot + slots > DATA_SLOTS {
                    ctx.diags.error(
                        CompileError::DataOverflow(slot + slots).to_string(),
                        Span::default(),
                    );
                    return None;
                }
                for (c, chunk) in var.payload.chunks(4).enumerate() {
                    let mut bytes = [0u8; 4];
                    bytes[..chunk.len()].copy_from_slice(chunk);
                    out.data[slot + c] = f32::from_le_bytes(bytes);
                }
                out.meta[slot] = (var.kind.meta_tag() << 4) | (slots as u8).min(15);
                slot += slots;
            }
        }
    }
    out.data_count = slot;

    let have = DATA_SLOTS - out.data_count;
    if ctx.max_stack_slots > have {
        ctx.diags.error(
            CompileError::StackRegionTooSmall {
                need: ctx.max_stack_slots,
                have,
            }
            .to_string(),
            Span::default(),
        );
        return None;
    }

    // Copy the code, rewriting table ids to slot offsets. The skip counter
    // keeps hardcoded operand bytes out of the rewrite.
    let src = &resolved.code;
    let mut i = 0usize;
    while i < src.len() {
        let byte = src[i];
        if opcode::is_var_ref(byte) {
            let id = (byte - VAR_BIAS) as usize;
            match ctx.offset_table.get(id).copied().flatten() {
                Some(offset) => out.code[i] = VAR_BIAS + offset,
                None => {
                    ctx.diags.error(
                        ecow::eco_format!("reference to unplaced variable id {id}"),
                        Span::default(),
                    );
                    return None;
                }
            }
            i += 1;
            continue;
        }
        out.code[i] = byte;
        let peek = (i + 3 <= src.len()).then(|| [src[i + 1], src[i + 2]]);
        let skip = opcode::operand_bytes_after(byte, peek);
        out.code[i + 1..][..skip.min(src.len() - i - 1)]
            .copy_from_slice(&src[i + 1..][..skip.min(src.len() - i - 1)]);
        i += 1 + skip;
    }

    // The reference scan must agree with what lowering marked as hardcoded.
    if opcode::operand_positions(&out.code[..out.code_len]) != resolved.hardcoded {
        ctx.diags.error(
            "packaged stream disagrees with the lowering's operand map",
            Span::default(),
        );
        return None;
    }

    Some(out)
}
