use pretty_assertions::assert_eq;

use crate::context::Context;
use crate::lexer::tokenize;
use crate::options::Options;
use crate::parser::parse;
use crate::passes::{arith, mapping, transform};
use crate::registry::Registry;
use crate::syntax::{NodeArena, NodeId, NodeKind};
use crate::vars::DataKind;

fn map(src: &str) -> Context {
    let mut ctx = Context::new(src, Options::default(), Registry::new());
    let tokens = tokenize(&mut ctx);
    parse(&mut ctx, tokens);
    transform::run(&mut ctx);
    arith::run(&mut ctx);
    mapping::run(&mut ctx);
    ctx
}

fn assign_value(ctx: &Context, i: usize) -> (&NodeArena, NodeId) {
    let s = &ctx.statements[i];
    let stmt = s.arena.children(s.root)[0];
    (&s.arena, *s.arena.children(stmt).last().unwrap())
}

#[test]
fn small_integers_use_constant_opcodes() {
    let ctx = map("a = 1 + 2;");
    assert!(ctx.diags.is_ok(), "{:?}", ctx.diags.entries());
    let (arena, value) = assign_value(&ctx, 0);
    assert!(arena.get(value).func.is_some());
    let kids = arena.children(value);
    assert_eq!(arena.get(kids[0]).const_op, Some(0x61));
    assert_eq!(arena.get(kids[1]).const_op, Some(0x62));
    assert!(arena.get(kids[0]).var.is_none());
}

#[test]
fn odd_constants_materialize_one_deduplicated_slot() {
    let ctx = map("a = 0.3;\nb = 0.3;");
    assert!(ctx.diags.is_ok(), "{:?}", ctx.diags.entries());
    let consts: Vec<_> = ctx
        .vars
        .snapshot()
        .into_iter()
        .filter(|v| v.is_constant)
        .collect();
    assert_eq!(consts.len(), 1);
    assert_eq!(consts[0].values[0], 0.3);
    assert_eq!(consts[0].ref_count, 2);
}

#[test]
fn negative_define_splits_into_neg_call() {
    let ctx = map("#define k -1\na = k;");
    assert!(ctx.diags.is_ok(), "{:?}", ctx.diags.entries());
    let (arena, value) = assign_value(&ctx, 0);
    assert_eq!(arena.kind(value), NodeKind::Call);
    assert_eq!(arena.get(value).text, "neg");
    assert!(arena.get(value).func.is_some());
    let inner = arena.children(value)[0];
    assert_eq!(arena.get(inner).const_op, Some(0x61));
}

#[test]
fn variable_reference_retains() {
    let ctx = map("a = 1;\nb = a;");
    assert!(ctx.diags.is_ok(), "{:?}", ctx.diags.entries());
    let a = ctx.vars.lookup("a").unwrap();
    // Declaration plus one read.
    assert_eq!(ctx.vars.ref_count(a), 2);
}

#[test]
fn cdata_reference_marks_the_leaf() {
    let ctx = map("#cdata t auto 1 2 3\na = noise(t);");
    assert!(ctx.diags.is_ok(), "{:?}", ctx.diags.entries());
    let (arena, value) = assign_value(&ctx, 0);
    let arg = arena.children(value)[0];
    assert_eq!(arena.kind(arg), NodeKind::Cdata);
    let id = arena.get(arg).var.unwrap();
    assert_eq!(ctx.vars.get(id).kind, DataKind::BlobU8);
    assert_eq!(ctx.vars.ref_count(id), 1);
}

#[test]
fn undefined_identifier_is_an_error() {
    let ctx = map("a = q;");
    assert!(!ctx.diags.is_ok());
}

#[test]
fn unknown_function_is_an_error() {
    let ctx = map("a = frobnicate(1);");
    assert!(!ctx.diags.is_ok());
}

#[test]
fn defines_cannot_be_assigned() {
    let ctx = map("#define k 1\nk = 2;");
    assert!(!ctx.diags.is_ok());
}
