//! Tree-rewriting and analysis stages.
//!
//! Stage order is fixed: transform (desugar), arith (precedence repair and
//! operator lowering), mapping (identifier resolution), widths (vector-size
//! inference), flatten (push/pop linearization), cleanup (constant sweep
//! and slot assignment). Each stage reports into the shared diagnostics
//! log; the pipeline driver stops at the first stage that leaves an error.

pub mod arith;
pub mod cleanup;
pub mod flatten;
pub mod mapping;
pub mod transform;
pub mod widths;

#[cfg(test)]
mod flatten_test;
#[cfg(test)]
mod mapping_test;
#[cfg(test)]
mod transform_test;
#[cfg(test)]
mod widths_test;
