//! Vexel - a tiny vector-expression compiler
//!
//! # Overview
//!
//! Vexel compiles a small numeric expression language (scalars and vectors
//! up to width 4, control flow, inline functions, `#`-directives) into
//! compact linear bytecode plus a fixed-size f32 data segment. The output
//! image is executed by an external stack VM; this crate only produces it.
//!
//! # Quick Start
//!
//! ```
//! use vexel::{compile, Options};
//!
//! let source = "
//!     #input  pos   vec3
//!     #output shade vec3
//!     shade = pos * 0.5 + (0.1 0.1 0.1);
//! ";
//! let compiled = compile(source, Options::default()).unwrap();
//! assert!(compiled.program.code_len > 0);
//! // Feed `compiled.program` and the i/o layout to the VM.
//! ```
//!
//! # Host functions
//!
//! The VM dispatches `ext` opcodes back to the host. Register the names a
//! script may call before compiling:
//!
//! ```
//! use vexel::{compile_with_registry, Options, Registry};
//!
//! let mut registry = Registry::new();
//! registry.register_external("turbulence", 7, 1, 2, 1);
//! let compiled = compile_with_registry(
//!     "#input p vec2\n#output o numeric\no = turbulence(p.x, p.y);",
//!     Options::default(),
//!     registry,
//! ).unwrap();
//! # let _ = compiled;
//! ```

// Re-export the public API from vexel-core.
pub use vexel_core::{
    compile, compile_with_registry, Compilation, CompileError, Diagnostic, Error, IoMapping,
    Options, PackagedProgram, Registry, Severity, Span, CODE_CAPACITY, DATA_SLOTS,
};

mod render;
pub use render::{render_error, render_error_to, render_error_to_string, render_error_to_string_no_color};
