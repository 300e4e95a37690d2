//! Compilation diagnostics.
//!
//! Every stage reports through the shared [`DiagnosticLog`]; the pipeline
//! driver checks [`DiagnosticLog::is_ok`] after each stage and halts on the
//! first error. The log is lock-guarded because the analysis stage may fan
//! out over independent statement subtrees.

use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};

use ecow::EcoString;
use parking_lot::Mutex;

/// Byte range into the source script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start: start as u32,
            end: end as u32,
        }
    }

    pub fn range(&self) -> core::ops::Range<usize> {
        self.start as usize..self.end as usize
    }
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Informational message.
    Normal,
    /// Suspicious but not fatal (e.g. an unused input).
    Warning,
    /// Compilation cannot succeed.
    Error,
    /// Developer-facing detail, mirrored to `tracing`.
    Trace,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Normal => write!(f, "note"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Trace => write!(f, "trace"),
        }
    }
}

/// A single diagnostic message with source location.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: EcoString,
    pub span: Span,
}

/// Ordered diagnostics log shared across the pipeline.
#[derive(Debug, Default)]
pub struct DiagnosticLog {
    entries: Mutex<Vec<Diagnostic>>,
    errored: AtomicBool,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff no error has been logged so far.
    pub fn is_ok(&self) -> bool {
        !self.errored.load(Ordering::Acquire)
    }

    pub fn push(&self, severity: Severity, message: impl Into<EcoString>, span: Span) {
        let message = message.into();
        if severity == Severity::Error {
            self.errored.store(true, Ordering::Release);
            tracing::debug!(%message, ?span, "compile error");
        }
        self.entries.lock().push(Diagnostic {
            severity,
            message,
            span,
        });
    }

    pub fn error(&self, message: impl Into<EcoString>, span: Span) {
        self.push(Severity::Error, message, span);
    }

    pub fn warning(&self, message: impl Into<EcoString>, span: Span) {
        self.push(Severity::Warning, message, span);
    }

    pub fn note(&self, message: impl Into<EcoString>, span: Span) {
        self.push(Severity::Normal, message, span);
    }

    pub fn trace(&self, message: impl Into<EcoString>, span: Span) {
        self.push(Severity::Trace, message, span);
    }

    /// Snapshot of all entries in report order.
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries.lock().clone()
    }

    /// Drain the log, e.g. to build the final error value.
    pub fn take(&self) -> Vec<Diagnostic> {
        core::mem::take(&mut *self.entries.lock())
    }

    pub fn error_count(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_do_not_trip_is_ok() {
        let log = DiagnosticLog::new();
        log.warning("input 'x' is never used", Span::default());
        log.note("constant folded", Span::default());
        assert!(log.is_ok());
        log.error("undefined identifier 'y'", Span::new(3, 4));
        assert!(!log.is_ok());
        assert_eq!(log.error_count(), 1);
    }

    #[test]
    fn entries_preserve_order() {
        let log = DiagnosticLog::new();
        log.note("first", Span::default());
        log.error("second", Span::default());
        let entries = log.entries();
        assert_eq!(entries[0].message, "first");
        assert_eq!(entries[1].message, "second");
    }
}
