use pretty_assertions::assert_eq;

use crate::context::Context;
use crate::diagnostics::Severity;
use crate::lexer::tokenize;
use crate::options::Options;
use crate::parser::parse;
use crate::passes::{arith, mapping, transform, widths};
use crate::registry::Registry;

fn infer(src: &str) -> Context {
    let mut ctx = Context::new(src, Options::default(), Registry::new());
    let tokens = tokenize(&mut ctx);
    parse(&mut ctx, tokens);
    transform::run(&mut ctx);
    arith::run(&mut ctx);
    mapping::run(&mut ctx);
    widths::run(&mut ctx);
    ctx
}

#[test]
fn first_write_fixes_variable_width() {
    let ctx = infer("v = (1 2 3);");
    assert!(ctx.diags.is_ok(), "{:?}", ctx.diags.entries());
    let v = ctx.vars.lookup("v").unwrap();
    assert_eq!(ctx.vars.width(v), 3);
}

#[test]
fn scalars_broadcast_into_vector_operations() {
    let ctx = infer("#input p vec3\n#output o vec3\no = p + 1;");
    assert!(ctx.diags.is_ok(), "{:?}", ctx.diags.entries());
    let o = ctx.vars.lookup("o").unwrap();
    assert_eq!(ctx.vars.width(o), 3);
}

#[test]
fn mismatched_vector_widths_are_rejected() {
    let ctx = infer("#input p vec3\n#input q vec2\n#output o vec3\no = p + q;");
    assert!(!ctx.diags.is_ok());
}

#[test]
fn vector_condition_is_rejected() {
    let ctx = infer("#input p vec3\nif (p) { a = 1; }\nb = p;");
    assert!(!ctx.diags.is_ok());
}

#[test]
fn reassignment_must_keep_the_width() {
    let ctx = infer("a = 1;\na = (1 2);");
    assert!(!ctx.diags.is_ok());
}

#[test]
fn component_read_past_the_width_is_rejected() {
    let ctx = infer("a = 1;\nb = a.y;");
    assert!(!ctx.diags.is_ok());
}

#[test]
fn component_write_is_bound_checked() {
    let ctx = infer("v = (1 2 3);\nv.z = 5;");
    assert!(ctx.diags.is_ok(), "{:?}", ctx.diags.entries());

    let ctx = infer("v = (1 2 3);\nv[3] = 5;");
    assert!(!ctx.diags.is_ok());
}

#[test]
fn zero_fill_takes_the_destination_width() {
    let ctx = infer("#output o vec3\no = 0;");
    assert!(ctx.diags.is_ok(), "{:?}", ctx.diags.entries());
    let o = ctx.vars.lookup("o").unwrap();
    assert_eq!(ctx.vars.width(o), 3);
}

#[test]
fn unwritten_output_is_an_error() {
    let ctx = infer("#output o numeric\na = 1;");
    assert!(!ctx.diags.is_ok());
}

#[test]
fn unread_input_is_only_a_warning() {
    let ctx = infer("#input p numeric\na = 1;");
    assert!(ctx.diags.is_ok(), "{:?}", ctx.diags.entries());
    assert!(ctx
        .diags
        .entries()
        .iter()
        .any(|d| d.severity == Severity::Warning));
}
