//! Compilation options.

use ecow::EcoString;

/// Knobs for a single [`crate::compile`] run.
///
/// The defaults match the behavior an external VM expects out of the box;
/// hosts typically only add compiler-side `defines`.
#[derive(Debug, Clone)]
pub struct Options {
    /// Tolerance used when matching numeric literals against the well-known
    /// constant opcodes and when narrowing cdata values.
    pub constant_epsilon: f32,
    /// Run the arithmetic analysis stage with one worker per top-level
    /// statement. Off by default; the sequential path is fast enough for
    /// typical scripts and easier to debug.
    pub parallel_analysis: bool,
    /// Host-supplied named constants, resolved after script `#define`s.
    pub defines: Vec<(EcoString, f32)>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            constant_epsilon: 1.0e-6,
            parallel_analysis: false,
            defines: Vec::new(),
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_define(mut self, name: impl Into<EcoString>, value: f32) -> Self {
        self.defines.push((name.into(), value));
        self
    }

    pub fn with_parallel_analysis(mut self, on: bool) -> Self {
        self.parallel_analysis = on;
        self
    }

    /// Look up a host-supplied define. Later entries shadow earlier ones.
    pub fn define(&self, name: &str) -> Option<f32> {
        self.defines
            .iter()
            .rev()
            .find_map(|(n, v)| (n == name).then_some(*v))
    }
}
