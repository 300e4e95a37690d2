//! Tagged instruction stream.
//!
//! Lowering cannot know final byte offsets, so it emits [`Op`]s: one code
//! byte plus tags that defer label targets, cdata offsets and bookkeeping
//! to the resolution pass.

use smallvec::SmallVec;

use crate::syntax::LabelId;
use crate::vars::VarId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tag {
    /// Placeholder byte pair starting here is patched with the label's
    /// absolute offset.
    JumpRef(LabelId),
    /// The label resolves to this op's final offset.
    LabelTarget(LabelId),
    /// Hardcoded operand data; never an opcode or variable reference.
    OffsetMarker,
    /// The cdata blob for this variable starts at this op.
    ConstDef(VarId),
    /// Placeholder byte pair starting here is patched with the blob's
    /// offset.
    ConstRef(VarId),
    /// Pseudo-op carrying tags only; dropped by resolution.
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Op {
    pub byte: u8,
    pub tags: SmallVec<[Tag; 1]>,
}

impl Op {
    pub fn new(byte: u8) -> Self {
        Self {
            byte,
            tags: SmallVec::new(),
        }
    }

    pub fn tagged(byte: u8, tag: Tag) -> Self {
        let mut op = Self::new(byte);
        op.tags.push(tag);
        op
    }

    pub fn is_removed(&self) -> bool {
        self.tags.contains(&Tag::Removed)
    }
}

#[derive(Debug, Default)]
pub struct InstructionList {
    pub ops: Vec<Op>,
}

impl InstructionList {
    pub fn push(&mut self, byte: u8) {
        self.ops.push(Op::new(byte));
    }

    pub fn push_tagged(&mut self, byte: u8, tag: Tag) {
        self.ops.push(Op::tagged(byte, tag));
    }

    pub fn push_op(&mut self, op: Op) {
        self.ops.push(op);
    }

    pub fn merge(&mut self, mut other: InstructionList) {
        self.ops.append(&mut other.ops);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
