//! Compilation driver.
//!
//! Runs the fixed stage order and stops at the first stage that leaves an
//! error in the diagnostics log. A successful run hands back the packaged
//! image together with the i/o layout and any warnings collected along the
//! way.

use ecow::EcoString;
use tracing::debug;

use crate::context::{Context, IoMapping};
use crate::diagnostics::{Diagnostic, Severity, Span};
use crate::emit;
use crate::errors::Error;
use crate::lexer;
use crate::options::Options;
use crate::parser;
use crate::passes::{arith, cleanup, flatten, mapping, transform, widths};
use crate::registry::Registry;

/// Everything a host needs to run the compiled script.
#[derive(Debug)]
pub struct Compilation {
    pub program: Box<emit::PackagedProgram>,
    /// Input bindings, byte offsets into the host's input block.
    pub inputs: Vec<IoMapping>,
    /// Output bindings, byte offsets into the host's output block.
    pub outputs: Vec<IoMapping>,
    /// `#validate` entries, passed through verbatim.
    pub validations: Vec<(EcoString, EcoString, Span)>,
    pub warnings: Vec<Diagnostic>,
}

pub fn compile(source: &str, options: Options) -> Result<Compilation, Error> {
    compile_with_registry(source, options, Registry::new())
}

pub fn compile_with_registry(
    source: &str,
    options: Options,
    registry: Registry,
) -> Result<Compilation, Error> {
    let mut ctx = Context::new(source, options, registry);

    debug!("lex");
    let tokens = lexer::tokenize(&mut ctx);
    gate(&ctx)?;

    debug!("parse");
    parser::parse(&mut ctx, tokens);
    gate(&ctx)?;

    debug!("transform");
    transform::run(&mut ctx);
    gate(&ctx)?;

    debug!("arith");
    arith::run(&mut ctx);
    gate(&ctx)?;

    debug!("mapping");
    mapping::run(&mut ctx);
    gate(&ctx)?;

    debug!("widths");
    widths::run(&mut ctx);
    gate(&ctx)?;

    debug!("flatten");
    flatten::run(&mut ctx);
    gate(&ctx)?;

    debug!("cleanup");
    cleanup::run(&mut ctx);
    gate(&ctx)?;

    debug!("assemble");
    let resolved = emit::assemble(&ctx);
    gate(&ctx)?;

    debug!("package");
    let program = emit::package(&ctx, &resolved);
    gate(&ctx)?;
    let Some(program) = program else {
        // package() reports before returning None; this is unreachable
        // with a consistent diagnostics log.
        return Err(Error::Compilation {
            diagnostics: ctx.diags.take(),
        });
    };

    let warnings = ctx
        .diags
        .take()
        .into_iter()
        .filter(|d| d.severity == Severity::Warning)
        .collect();
    Ok(Compilation {
        program,
        inputs: ctx.io_inputs,
        outputs: ctx.io_outputs,
        validations: ctx.validations,
        warnings,
    })
}

fn gate(ctx: &Context) -> Result<(), Error> {
    if ctx.diags.is_ok() {
        Ok(())
    } else {
        Err(Error::Compilation {
            diagnostics: ctx.diags.take(),
        })
    }
}
