//! Jump and cdata-offset resolution.
//!
//! Two passes over the tagged stream: the first assigns final byte offsets
//! (pseudo-ops count as zero width) and records where every label and blob
//! lands; the second drops the pseudo-ops and patches each placeholder
//! pair with an absolute little-endian offset. Targets that fall outside
//! the final stream are compiler bugs and reported as fatal.

use hashbrown::HashMap;

use crate::context::Context;
use crate::emit::instruction::{InstructionList, Tag};
use crate::errors::CompileError;
use crate::diagnostics::Span;
use crate::syntax::LabelId;
use crate::vars::VarId;

/// Final code bytes plus the positions holding hardcoded operand data.
pub struct Resolved {
    pub code: Vec<u8>,
    pub hardcoded: Vec<usize>,
}

pub fn resolve(ctx: &Context, list: InstructionList) -> Resolved {
    let mut labels: HashMap<LabelId, usize> = HashMap::new();
    let mut blobs: HashMap<VarId, usize> = HashMap::new();
    let mut pos = 0usize;
    for op in &list.ops {
        for tag in &op.tags {
            match *tag {
                Tag::LabelTarget(label) => {
                    labels.insert(label, pos);
                }
                Tag::ConstDef(var) => {
                    blobs.insert(var, pos);
                }
                _ => {}
            }
        }
        if !op.is_removed() {
            pos += 1;
        }
    }
    let code_len = pos;

    let mut code = Vec::with_capacity(code_len);
    let mut hardcoded = Vec::new();
    let mut patch_hi: Option<u8> = None;
    for op in &list.ops {
        if op.is_removed() {
            continue;
        }
        let mut byte = op.byte;
        if let Some(hi) = patch_hi.take() {
            byte = hi;
        }
        for tag in &op.tags {
            let target = match *tag {
                Tag::JumpRef(label) => match labels.get(&label) {
                    Some(&t) => t,
                    None => {
                        ctx.diags.error(
                            CompileError::UnresolvedLabel(label.0).to_string(),
                            Span::default(),
                        );
                        continue;
                    }
                },
                Tag::ConstRef(var) => match blobs.get(&var) {
                    Some(&t) => t,
                    None => {
                        ctx.diags.error(
                            ecow::eco_format!(
                                "cdata reference to '{}' has no blob",
                                ctx.vars.get(var).name
                            ),
                            Span::default(),
                        );
                        continue;
                    }
                },
                Tag::OffsetMarker => {
                    hardcoded.push(code.len());
                    continue;
                }
                _ => continue,
            };
            if target > u16::MAX as usize || target >= code_len {
                ctx.diags.error(
                    CompileError::JumpOutOfBounds {
                        target,
                        len: code_len,
                    }
                    .to_string(),
                    Span::default(),
                );
                continue;
            }
            let [lo, hi] = (target as u16).to_le_bytes();
            byte = lo;
            patch_hi = Some(hi);
        }
        code.push(byte);
    }
    Resolved { code, hardcoded }
}
