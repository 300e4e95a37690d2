//! Shared compilation state.
//!
//! One [`Context`] lives for the duration of a [`crate::compile`] call. It
//! owns the per-statement syntax arenas, the variable table, directive side
//! tables and the diagnostics log. The analysis stage may hand out `&Context`
//! to worker threads; everything mutated across threads sits behind a lock
//! or an atomic.

use core::sync::atomic::{AtomicU32, Ordering};

use ecow::EcoString;
use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::diagnostics::{DiagnosticLog, Span};
use crate::options::Options;
use crate::registry::Registry;
use crate::syntax::{LabelId, NodeArena, NodeId};
use crate::vars::{VarId, VariableTable};

/// One top-level statement with its private node arena.
#[derive(Debug)]
pub struct Statement {
    pub arena: NodeArena,
    pub root: NodeId,
}

/// An inline function recorded at its definition site. Calls are expanded
/// by copying `body` subtrees into the caller's arena.
#[derive(Debug)]
pub struct InlineFn {
    pub name: EcoString,
    pub params: Vec<EcoString>,
    pub arena: NodeArena,
    /// Statement subtree roots in source order; the `return` lowers to an
    /// assignment to the reserved name `return`.
    pub body: Vec<NodeId>,
    pub has_return: bool,
    pub span: Span,
}

/// Binding of a script variable to a byte range in the external input or
/// output block. The host bulk-copies these blocks at invocation, so
/// offsets must pack with no gaps.
#[derive(Debug, Clone)]
pub struct IoMapping {
    pub name: EcoString,
    pub var: VarId,
    /// Byte offset into the block.
    pub offset: u16,
    /// Byte size, 4 per component.
    pub size: u16,
    pub defaults: SmallVec<[f32; 4]>,
    /// Declaration site, for late diagnostics.
    pub span: Span,
}

/// Well-known named constants available to every script.
pub fn system_constant(name: &str) -> Option<f32> {
    match name {
        "pi" => Some(core::f32::consts::PI),
        "tau" => Some(core::f32::consts::TAU),
        "halfpi" => Some(core::f32::consts::FRAC_PI_2),
        "e" => Some(core::f32::consts::E),
        "sqrt2" => Some(core::f32::consts::SQRT_2),
        "epsilon" => Some(1.0e-6),
        "infinity" => Some(f32::INFINITY),
        _ => None,
    }
}

#[derive(Debug)]
pub struct Context {
    pub source: EcoString,
    pub options: Options,
    pub registry: Registry,
    pub statements: Vec<Statement>,
    pub inline_fns: HashMap<EcoString, InlineFn>,
    pub vars: VariableTable,
    pub io_inputs: Vec<IoMapping>,
    pub io_outputs: Vec<IoMapping>,
    /// Script `#define`s, resolved before host defines.
    pub defines: Vec<(EcoString, f32)>,
    /// `#validate name expr` entries, kept verbatim for the VM's validate
    /// mode.
    pub validations: Vec<(EcoString, EcoString, Span)>,
    pub diags: DiagnosticLog,
    next_label: AtomicU32,
    /// Data-segment slot per variable after cleanup; `None` for raw blobs,
    /// which live in the code segment.
    pub offset_table: Vec<Option<u8>>,
    /// Worst-case evaluation-stack depth in slots, width-aware.
    pub max_stack_slots: usize,
}

impl Context {
    pub fn new(source: impl Into<EcoString>, options: Options, registry: Registry) -> Self {
        Self {
            source: source.into(),
            options,
            registry,
            statements: Vec::new(),
            inline_fns: HashMap::new(),
            vars: VariableTable::new(),
            io_inputs: Vec::new(),
            io_outputs: Vec::new(),
            defines: Vec::new(),
            validations: Vec::new(),
            diags: DiagnosticLog::new(),
            next_label: AtomicU32::new(0),
            offset_table: Vec::new(),
            max_stack_slots: 0,
        }
    }

    pub fn alloc_label(&self) -> LabelId {
        LabelId(self.next_label.fetch_add(1, Ordering::Relaxed))
    }

    /// Resolve a named constant: script defines shadow host defines, which
    /// shadow the system constants.
    pub fn resolve_define(&self, name: &str) -> Option<f32> {
        self.defines
            .iter()
            .rev()
            .find_map(|(n, v)| (n == name).then_some(*v))
            .or_else(|| self.options.define(name))
            .or_else(|| system_constant(name))
    }

    /// Record an i/o binding, checking for byte-range overlap within its
    /// block. `offset` of `None` continues contiguously.
    pub fn add_io(
        &mut self,
        output: bool,
        name: EcoString,
        var: VarId,
        width: u8,
        offset: Option<u16>,
        defaults: SmallVec<[f32; 4]>,
        span: Span,
    ) {
        // Ranges are compared in u32; a u16 end offset near the top of the
        // block would wrap.
        let size = width as u32 * 4;
        let block = if output {
            &mut self.io_outputs
        } else {
            &mut self.io_inputs
        };
        let end = |m: &IoMapping| m.offset as u32 + m.size as u32;
        let offset = match offset {
            Some(o) => o as u32,
            None => block.iter().map(end).max().unwrap_or(0),
        };
        if offset + size > u16::MAX as u32 {
            self.diags.error(
                ecow::eco_format!("i/o range for '{name}' ends beyond the addressable block"),
                span,
            );
            return;
        }
        let overlaps = block
            .iter()
            .any(|m| offset < end(m) && (m.offset as u32) < offset + size);
        if overlaps {
            self.diags.error(
                ecow::eco_format!(
                    "i/o range for '{name}' overlaps an earlier {} binding",
                    if output { "output" } else { "input" }
                ),
                span,
            );
            return;
        }
        block.push(IoMapping {
            name,
            var,
            offset: offset as u16,
            size: size as u16,
            defaults,
            span,
        });
    }

    /// Explicit offsets may leave holes; both blocks must be gapless so the
    /// host can treat them as packed arrays.
    pub fn check_io_blocks(&self) {
        for (label, block) in [("input", &self.io_inputs), ("output", &self.io_outputs)] {
            let total: u16 = block.iter().map(|m| m.size).sum();
            let mut covered = vec![false; total as usize];
            for m in block {
                for byte in m.offset..m.offset.saturating_add(m.size) {
                    if let Some(c) = covered.get_mut(byte as usize) {
                        *c = true;
                    }
                }
            }
            if let Some(gap) = covered.iter().position(|&c| !c) {
                self.diags.error(
                    ecow::eco_format!("{label} block has a gap at byte {gap}"),
                    Span::default(),
                );
            }
        }
    }
}
