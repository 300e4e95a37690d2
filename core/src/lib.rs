//! Vexel compiler core.
//!
//! Compiles the Vexel expression language (scalars, vectors up to width 4,
//! control flow, inline functions, `#`-directives) into compact linear
//! bytecode plus a fixed-size data segment for the external stack VM.
//!
//! The pipeline is a fixed sequence of stages over per-statement syntax
//! arenas: lex, parse, desugar, arithmetic repair, identifier mapping,
//! width inference, push/pop flattening, constant cleanup, lowering and
//! packaging. [`compile`] runs the whole thing.

pub mod context;
pub mod diagnostics;
pub mod emit;
pub mod errors;
pub mod lexer;
pub mod opcode;
pub mod options;
pub mod parser;
pub mod passes;
pub mod pipeline;
pub mod registry;
pub mod syntax;
pub mod vars;

pub use context::IoMapping;
pub use diagnostics::{Diagnostic, Severity, Span};
pub use emit::{PackagedProgram, CODE_CAPACITY, DATA_SLOTS};
pub use errors::{CompileError, Error};
pub use options::Options;
pub use pipeline::{compile, compile_with_registry, Compilation};
pub use registry::{FuncId, Registry};
