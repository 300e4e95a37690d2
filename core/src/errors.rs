//! Error taxonomy for the compilation pipeline.
//!
//! `CompileError` is the typed form of everything the pipeline can reject:
//! declaration errors, type/width errors, structural errors, capacity
//! errors, and internal-consistency errors (the last indicate a bug in an
//! earlier stage, not bad user input). Stages format these into the shared
//! diagnostics log; the public [`Error`] carries the collected diagnostics
//! across the API boundary.

use ecow::EcoString;
use thiserror::Error;

use crate::diagnostics::{Diagnostic, Severity};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    // --- declaration errors ---
    #[error("duplicate identifier '{0}'")]
    DuplicateIdentifier(EcoString),
    #[error("undefined identifier '{0}'")]
    UndefinedIdentifier(EcoString),
    #[error("unknown function '{0}'")]
    UnknownFunction(EcoString),
    #[error("inline function '{fun}' may not reference '{name}': bodies are limited to formal parameters and constants")]
    InlineVarDeclaration { fun: EcoString, name: EcoString },
    #[error("inline function '{0}' calls itself")]
    RecursiveInline(EcoString),
    #[error("inline function '{0}' never returns a value")]
    MissingReturn(EcoString),
    #[error("output '{0}' is referenced undefined or unneeded")]
    OutputNeverComputed(EcoString),

    // --- type / width errors ---
    #[error("function '{name}' expects width {expected}, got {found}")]
    WidthMismatch {
        name: EcoString,
        expected: u8,
        found: u8,
    },
    #[error("function '{name}' takes {min}..{max} arguments, got {found}")]
    ArityMismatch {
        name: EcoString,
        min: u8,
        max: u8,
        found: u8,
    },
    #[error("cannot assign width {found} to '{name}' of width {expected}")]
    AssignWidthMismatch {
        name: EcoString,
        expected: u8,
        found: u8,
    },
    #[error("component {comp} is out of range for '{name}' of width {width}")]
    IndexOutOfRange {
        name: EcoString,
        comp: u8,
        width: u8,
    },
    #[error("condition must be a scalar, got width {0}")]
    ConditionNotScalar(u8),
    #[error("vector literal of width {0} exceeds the maximum of 4")]
    VectorTooWide(usize),

    // --- structural errors ---
    #[error("switch statement has neither cases nor a default")]
    MalformedSwitch,
    #[error("malformed directive: {0}")]
    MalformedDirective(EcoString),
    #[error("directives must precede all statements")]
    DirectiveOrder,
    #[error("unresolvable nesting: statement did not flatten within {0} passes")]
    UnresolvableNesting(u32),
    #[error("unresolvable grouping: expression did not settle within {0} passes")]
    UnsettledGrouping(u32),
    #[error("parse error: {0}")]
    Parse(EcoString),

    // --- capacity errors ---
    #[error("cdata '{name}' needs {slots} data slots, the maximum is {max}")]
    CdataTooLarge {
        name: EcoString,
        slots: usize,
        max: usize,
    },
    #[error("code segment overflow: {0} bytes")]
    CodeOverflow(usize),
    #[error("data segment overflow: {0} slots")]
    DataOverflow(usize),
    #[error("too many variables: {0}")]
    TooManyVariables(usize),
    #[error("stack region too small: {need} slots needed, {have} available")]
    StackRegionTooSmall { need: usize, have: usize },
    #[error("i/o range for '{0}' overlaps or leaves a gap in the block layout")]
    IoAlignment(EcoString),

    // --- internal-consistency errors ---
    #[error("internal: generated push was never placed")]
    UnplacedPush,
    #[error("internal: variable offset mismatch for slot {slot}: expected {expected}, got {found}")]
    OffsetMismatch { slot: u8, expected: u8, found: u8 },
    #[error("internal: jump target {target} is outside the code segment of {len} bytes")]
    JumpOutOfBounds { target: usize, len: usize },
    #[error("internal: unresolved label {0}")]
    UnresolvedLabel(u32),
}

/// Public error type returned by [`crate::compile`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("compilation failed with {} error(s)", .diagnostics.iter().filter(|d| d.severity == Severity::Error).count())]
    Compilation { diagnostics: Vec<Diagnostic> },
}

impl Error {
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Error::Compilation { diagnostics } => diagnostics,
        }
    }
}
