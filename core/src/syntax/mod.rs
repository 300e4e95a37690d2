//! Syntax tree types.
//!
//! Each top-level statement gets its own [`NodeArena`]; nodes address each
//! other by [`NodeId`] index, never by pointer, so subtrees can be cloned,
//! spliced and re-parented without touching the allocator. Transformations
//! rewrite trees in place across the whole pipeline until lowering walks
//! the final shape.

mod arena;
#[cfg(test)]
mod arena_test;

pub use arena::NodeArena;

use ecow::EcoString;
use smallvec::SmallVec;

use crate::diagnostics::Span;
use crate::registry::FuncId;
use crate::vars::VarId;

/// Index of a node within its statement's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Control-flow label, resolved to a code offset during packaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LabelId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Wrapper above every top-level statement.
    Root,
    /// Function application; children are arguments.
    Call,
    /// `target = value`. First child is the target, last the value;
    /// an indexed write keeps the index between them.
    Assign,
    /// Leaf: identifier or numeric literal.
    Param,
    /// Leaf: operator token inside a flat [`NodeKind::Compound`].
    Operation,
    /// Flat parenthesized operand/operator list, as parsed. Arithmetic
    /// analysis dissolves these into calls.
    Compound,
    /// Expression tree guarding an `if` or `while`; extra children before
    /// the last are hoisted push statements.
    Condition,
    If,
    Then,
    Else,
    While,
    WhileBody,
    For,
    Switch,
    Case,
    Default,
    /// Unconditional transfer to a [`NodeKind::Label`].
    JumpTo,
    Label,
    /// Inline function body as recorded at its definition site.
    InlineFn,
    /// Postfix component access; wraps the subject, `comp` or a child
    /// expression selects the component.
    Index,
    /// Reference to a cdata blob.
    Cdata,
    /// Generated: evaluate a call and push its result.
    Push,
    /// Generated: operand placeholder consuming a pushed value.
    Pop,
}

/// A postfix indexer as parsed, before transform classifies it into one of
/// the fixed index operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indexer {
    /// `.x/.y/.z/.w` or a literal `[n]`.
    Component(u8),
    /// `[expr]`; the subtree root lives parentless in the same arena.
    Dynamic(NodeId),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    /// Source text for leaves (identifier, literal, operator).
    pub text: EcoString,
    pub span: Span,
    /// Component count of the value this node produces, 0 until inference.
    pub vector_size: u8,
    pub is_vector: bool,
    pub is_constant: bool,
    /// Set when the value folds to a well-known constant opcode.
    pub const_op: Option<u8>,
    pub var: Option<VarId>,
    pub func: Option<FuncId>,
    /// Indexers as parsed, consumed by the transform stage.
    pub indexers: SmallVec<[Indexer; 1]>,
    /// Static component index for [`NodeKind::Index`] and indexed assigns.
    pub comp: Option<u8>,
    pub label: Option<LabelId>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Subtree roots that must execute before this node (loop initializers,
    /// inlined pre-return statements). Parentless by construction.
    pub dependencies: Vec<NodeId>,
    /// For a [`NodeKind::Pop`], the push that feeds it.
    pub linked_push: Option<NodeId>,
    /// For a [`NodeKind::Push`], the pop that consumes it.
    pub linked_pop: Option<NodeId>,
}

impl Node {
    pub fn new(kind: NodeKind, span: Span) -> Self {
        Self {
            kind,
            text: EcoString::new(),
            span,
            vector_size: 0,
            is_vector: false,
            is_constant: false,
            const_op: None,
            var: None,
            func: None,
            indexers: SmallVec::new(),
            comp: None,
            label: None,
            parent: None,
            children: Vec::new(),
            dependencies: Vec::new(),
            linked_push: None,
            linked_pop: None,
        }
    }

    pub fn leaf(kind: NodeKind, text: impl Into<EcoString>, span: Span) -> Self {
        let mut node = Self::new(kind, span);
        node.text = text.into();
        node
    }

    /// True for leaves the identifier-mapping stage classifies.
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Param | NodeKind::Operation)
    }
}
