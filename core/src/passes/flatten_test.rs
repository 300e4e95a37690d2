use pretty_assertions::assert_eq;

use crate::context::Context;
use crate::lexer::tokenize;
use crate::options::Options;
use crate::parser::parse;
use crate::passes::{arith, flatten, mapping, transform, widths};
use crate::registry::Registry;
use crate::syntax::{NodeArena, NodeId, NodeKind};

fn flatten_src(src: &str) -> Context {
    let mut ctx = Context::new(src, Options::default(), Registry::new());
    let tokens = tokenize(&mut ctx);
    parse(&mut ctx, tokens);
    transform::run(&mut ctx);
    arith::run(&mut ctx);
    mapping::run(&mut ctx);
    widths::run(&mut ctx);
    assert!(ctx.diags.is_ok(), "analysis failed: {:?}", ctx.diags.entries());
    flatten::run(&mut ctx);
    ctx
}

fn root(ctx: &Context, i: usize) -> (&NodeArena, Vec<NodeId>) {
    let s = &ctx.statements[i];
    (&s.arena, s.arena.children(s.root).to_vec())
}

fn push_callee<'a>(arena: &'a NodeArena, push: NodeId) -> &'a str {
    assert_eq!(arena.kind(push), NodeKind::Push);
    arena.get(arena.children(push)[0]).text.as_str()
}

#[test]
fn nested_call_splits_into_ordered_pushes() {
    let ctx = flatten_src("a = sin(cos(1));");
    assert!(ctx.diags.is_ok(), "{:?}", ctx.diags.entries());
    let (arena, stmts) = root(&ctx, 0);
    assert_eq!(stmts.len(), 3);
    assert_eq!(push_callee(arena, stmts[0]), "cos");
    assert_eq!(push_callee(arena, stmts[1]), "sin");
    assert_eq!(arena.kind(stmts[2]), NodeKind::Assign);
    // The assignment's operand is the placeholder linked to the sin push.
    let pop = *arena.children(stmts[2]).last().unwrap();
    assert_eq!(arena.kind(pop), NodeKind::Pop);
    assert_eq!(arena.get(pop).linked_push, Some(stmts[1]));
    assert_eq!(arena.get(stmts[1]).linked_pop, Some(pop));
}

#[test]
fn leftmost_operand_is_pushed_last() {
    let ctx = flatten_src("a = min(sin(1), cos(2));");
    assert!(ctx.diags.is_ok(), "{:?}", ctx.diags.entries());
    let (arena, stmts) = root(&ctx, 0);
    assert_eq!(stmts.len(), 4);
    assert_eq!(push_callee(arena, stmts[0]), "cos");
    assert_eq!(push_callee(arena, stmts[1]), "sin");
    assert_eq!(push_callee(arena, stmts[2]), "min");
}

#[test]
fn loop_condition_keeps_its_pushes_inside() {
    let ctx = flatten_src("a = 1;\nwhile (sin(a) < 1) { a = a + 1; }");
    assert!(ctx.diags.is_ok(), "{:?}", ctx.diags.entries());
    let (arena, stmts) = root(&ctx, 1);
    assert_eq!(stmts.len(), 1);
    let cond = arena.children(stmts[0])[0];
    let kinds: Vec<NodeKind> = arena
        .children(cond)
        .iter()
        .map(|&c| arena.kind(c))
        .collect();
    assert_eq!(kinds, vec![NodeKind::Push, NodeKind::Push, NodeKind::Pop]);
    assert_eq!(push_callee(arena, arena.children(cond)[0]), "sin");
    assert_eq!(push_callee(arena, arena.children(cond)[1]), "lt");
}

#[test]
fn zero_fill_is_not_pushed() {
    let ctx = flatten_src("#output o vec3\no = 0;");
    assert!(ctx.diags.is_ok(), "{:?}", ctx.diags.entries());
    let (arena, stmts) = root(&ctx, 0);
    assert_eq!(stmts.len(), 1);
    let value = *arena.children(stmts[0]).last().unwrap();
    assert_eq!(arena.kind(value), NodeKind::Call);
    assert_eq!(arena.get(value).text, "zero");
}

#[test]
fn stack_depth_is_width_aware() {
    let ctx = flatten_src("v = (1 2 3);\nw = v + v;");
    assert!(ctx.diags.is_ok(), "{:?}", ctx.diags.entries());
    assert_eq!(ctx.max_stack_slots, 3);
}

#[test]
fn pathological_nesting_is_an_error() {
    let src = "a = sin(sin(sin(sin(sin(sin(sin(sin(sin(sin(sin(sin(1))))))))))));";
    let mut ctx = Context::new(src, Options::default(), Registry::new());
    let tokens = tokenize(&mut ctx);
    parse(&mut ctx, tokens);
    transform::run(&mut ctx);
    arith::run(&mut ctx);
    mapping::run(&mut ctx);
    widths::run(&mut ctx);
    flatten::run(&mut ctx);
    assert!(!ctx.diags.is_ok());
    assert!(ctx
        .diags
        .entries()
        .iter()
        .any(|d| d.message.contains("did not flatten within 10 passes")));
}
