//! Constant sweep and data-slot assignment.
//!
//! After flattening, constants whose references were folded away are dead
//! weight. The variable table sweeps them and renumbers so script
//! variables precede compiler constants; every stored id in the syntax
//! trees and i/o bindings is rewritten with the resulting map. The slot
//! layout for the packager's data segment is fixed here as well.

use crate::context::Context;
use crate::errors::CompileError;
use crate::diagnostics::Span;
use crate::vars::DataKind;

/// Hard cap on distinct variables; ids must stay below the reference bias.
const MAX_VARIABLES: usize = 128;
/// A cdata blob's slot count is stored in a meta nibble.
const MAX_BLOB_SLOTS: usize = 15;

pub fn run(ctx: &mut Context) {
    let remap = ctx.vars.sweep();

    for stmt in &mut ctx.statements {
        for i in 0..stmt.arena.len() {
            let node = stmt.arena.get_mut(crate::syntax::NodeId(i as u32));
            if let Some(old) = node.var {
                node.var = remap[old.index()];
            }
        }
    }
    for mapping in ctx.io_inputs.iter_mut().chain(ctx.io_outputs.iter_mut()) {
        if let Some(new) = remap[mapping.var.index()] {
            mapping.var = new;
        }
    }

    if ctx.vars.len() > MAX_VARIABLES {
        ctx.diags.error(
            CompileError::TooManyVariables(ctx.vars.len()).to_string(),
            Span::default(),
        );
        return;
    }

    let mut table = Vec::with_capacity(ctx.vars.len());
    let mut slot = 0usize;
    for var in ctx.vars.snapshot() {
        match var.kind {
            DataKind::Number => {
                table.push(Some(slot as u8));
                slot += var.width.max(1) as usize;
            }
            DataKind::BlobRaw => table.push(None),
            _ => {
                let slots = var.payload.len().div_ceil(4);
                if slots > MAX_BLOB_SLOTS {
                    ctx.diags.error(
                        CompileError::CdataTooLarge {
                            name: var.name.clone(),
                            slots,
                            max: MAX_BLOB_SLOTS,
                        }
                        .to_string(),
                        Span::default(),
                    );
                }
                table.push(Some(slot as u8));
                slot += slots;
            }
        }
        if slot > MAX_VARIABLES {
            ctx.diags
                .error(CompileError::DataOverflow(slot).to_string(), Span::default());
            return;
        }
    }
    ctx.offset_table = table;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::lexer::tokenize;
    use crate::options::Options;
    use crate::parser::parse;
    use crate::passes::{arith, flatten, mapping, transform, widths};
    use crate::registry::Registry;
    use pretty_assertions::assert_eq;

    fn cleaned(src: &str) -> Context {
        let mut ctx = Context::new(src, Options::default(), Registry::new());
        let tokens = tokenize(&mut ctx);
        parse(&mut ctx, tokens);
        transform::run(&mut ctx);
        arith::run(&mut ctx);
        mapping::run(&mut ctx);
        widths::run(&mut ctx);
        flatten::run(&mut ctx);
        assert!(ctx.diags.is_ok(), "analysis failed: {:?}", ctx.diags.entries());
        run(&mut ctx);
        ctx
    }

    #[test]
    fn slots_account_for_vector_widths() {
        let ctx = cleaned("v = (1 2 3);\na = 0.3;");
        assert!(ctx.diags.is_ok(), "{:?}", ctx.diags.entries());
        // v at slot 0 (three components), a at slot 3, then the 0.3
        // constant.
        let v = ctx.vars.lookup("v").unwrap();
        let a = ctx.vars.lookup("a").unwrap();
        assert_eq!(ctx.offset_table[v.index()], Some(0));
        assert_eq!(ctx.offset_table[a.index()], Some(3));
        let consts: Vec<_> = ctx
            .vars
            .snapshot()
            .into_iter()
            .enumerate()
            .filter(|(_, v)| v.is_constant)
            .collect();
        assert_eq!(consts.len(), 1);
        assert_eq!(ctx.offset_table[consts[0].0], Some(4));
    }

    #[test]
    fn node_ids_survive_the_renumbering() {
        // The constant 0.3 is created after `b`, so sweeping moves it.
        let ctx = cleaned("a = 0.3;\nb = a;");
        let s = &ctx.statements[0];
        let stmt = s.arena.children(s.root)[0];
        let value = *s.arena.children(stmt).last().unwrap();
        let id = s.arena.get(value).var.unwrap();
        assert_eq!(ctx.vars.get(id).values.as_slice(), &[0.3]);
    }

    #[test]
    fn packed_blob_reserves_rounded_slots() {
        let ctx = cleaned("#cdata t auto 1 2 3 4 5\na = noise(t);");
        assert!(ctx.diags.is_ok(), "{:?}", ctx.diags.entries());
        // Blobs sort with the constants, after the script variables; five
        // u8 elements round up to two slots.
        let t = ctx.vars.lookup("t").unwrap();
        let a = ctx.vars.lookup("a").unwrap();
        assert_eq!(ctx.offset_table[a.index()], Some(0));
        assert_eq!(ctx.offset_table[t.index()], Some(1));
        assert_eq!(ctx.offset_table.len(), 2);
    }
}
