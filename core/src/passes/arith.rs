//! Arithmetic analysis.
//!
//! The parser keeps operand/operator lists flat, so precedence is repaired
//! here: a multiply/divide run found after an add/subtract in the same list
//! is extracted into a sub-compound, iterated until stable. Double unary
//! minus collapses to a plus, constant divisions become multiplications by
//! the reciprocal, and same-operator nestings are flattened one level.
//! Finally every surviving compound lowers to registry calls: variadic
//! add/mul for uniform runs, left-associative binary chains otherwise, and
//! `vec2/3/4` for the remaining vector literals.

use ecow::EcoString;

use crate::context::Context;
use crate::errors::CompileError;
use crate::syntax::{Node, NodeArena, NodeId, NodeKind};

/// Same-operator flattening is iterated at most this many times.
const MOVE_UP_CAP: u32 = 5;
/// Variadic add/mul take at most this many operands.
const VARIADIC_MAX: usize = 8;

pub fn run(ctx: &mut Context) {
    let mut statements = core::mem::take(&mut ctx.statements);
    if ctx.options.parallel_analysis {
        // Statements share no nodes, so the repair can fan out one worker
        // per statement; the scope joins them all before the next stage.
        let shared: &Context = ctx;
        std::thread::scope(|scope| {
            for stmt in &mut statements {
                scope.spawn(move || walk_stmt(shared, &mut stmt.arena, stmt.root));
            }
        });
    } else {
        for stmt in &mut statements {
            walk_stmt(ctx, &mut stmt.arena, stmt.root);
        }
    }
    ctx.statements = statements;
}

fn walk_stmt(ctx: &Context, arena: &mut NodeArena, node: NodeId) {
    let deps = arena.get(node).dependencies.clone();
    for dep in deps {
        walk_stmt(ctx, arena, dep);
    }
    match arena.kind(node) {
        NodeKind::Root | NodeKind::Then | NodeKind::Else | NodeKind::WhileBody => {
            let kids: Vec<NodeId> = arena.children(node).to_vec();
            for kid in kids {
                walk_stmt(ctx, arena, kid);
            }
        }
        NodeKind::Assign | NodeKind::Call => {
            let kids: Vec<NodeId> = arena.children(node).to_vec();
            let skip = usize::from(arena.kind(node) == NodeKind::Assign);
            for &kid in &kids[skip..] {
                process_expr(ctx, arena, kid);
            }
        }
        NodeKind::If | NodeKind::While => {
            let kids: Vec<NodeId> = arena.children(node).to_vec();
            let expr = arena.children(kids[0])[0];
            process_expr(ctx, arena, expr);
            for &kid in &kids[1..] {
                walk_stmt(ctx, arena, kid);
            }
        }
        _ => {}
    }
}

/// Repair then lower one expression tree. The returned root has replaced
/// the input under its parent.
fn process_expr(ctx: &Context, arena: &mut NodeArena, node: NodeId) -> NodeId {
    match arena.kind(node) {
        NodeKind::Call => {
            let kids: Vec<NodeId> = arena.children(node).to_vec();
            for kid in kids {
                process_expr(ctx, arena, kid);
            }
            node
        }
        NodeKind::Compound => {
            repair_rec(ctx, arena, node);
            fold_rec(ctx, arena, node)
        }
        _ => node,
    }
}

// === Repair phase (keeps compounds as compounds) ===

fn repair_rec(ctx: &Context, arena: &mut NodeArena, node: NodeId) {
    let kids: Vec<NodeId> = arena.children(node).to_vec();
    for kid in kids {
        match arena.kind(kid) {
            NodeKind::Compound => repair_rec(ctx, arena, kid),
            NodeKind::Call => {
                let args: Vec<NodeId> = arena.children(kid).to_vec();
                for arg in args {
                    if arena.kind(arg) == NodeKind::Compound {
                        repair_rec(ctx, arena, arg);
                    }
                }
            }
            _ => {}
        }
    }
    repair(ctx, arena, node);
}

fn repair(ctx: &Context, arena: &mut NodeArena, node: NodeId) {
    while extract_muldiv_run(ctx, arena, node) {}
    collapse_double_minus(arena, node);
    rewrite_reciprocals(ctx, arena, node);
    move_up(ctx, arena, node);
}

fn op_text(arena: &NodeArena, id: NodeId) -> Option<&str> {
    let n = arena.get(id);
    (n.kind == NodeKind::Operation).then(|| n.text.as_str())
}

fn is_muldiv(text: &str) -> bool {
    matches!(text, "*" | "/" | "%")
}

/// Extract one trailing multiply/divide run that appears after an
/// add/subtract, grouping it into a sub-compound. Returns true when a run
/// was extracted (the scan restarts from the left).
fn extract_muldiv_run(ctx: &Context, arena: &mut NodeArena, node: NodeId) -> bool {
    let kids: Vec<NodeId> = arena.children(node).to_vec();
    let mut seen_addsub = false;
    let mut i = 0usize;
    while i < kids.len() {
        let Some(text) = op_text(arena, kids[i]) else {
            i += 1;
            continue;
        };
        let binary = i > 0 && op_text(arena, kids[i - 1]).is_none();
        if binary && matches!(text, "+" | "-") {
            seen_addsub = true;
        }
        if binary && is_muldiv(text) && seen_addsub {
            let mut start = i - 1;
            // A unary minus directly before the run belongs to it.
            if start >= 1
                && op_text(arena, kids[start - 1]) == Some("-")
                && (start == 1 || op_text(arena, kids[start - 2]).is_some())
            {
                start -= 1;
            }
            let mut end = i + 1;
            // Operand may itself carry unary prefixes.
            while end < kids.len() && op_text(arena, kids[end]).is_some() {
                end += 1;
            }
            while end + 1 < kids.len()
                && op_text(arena, kids[end + 1]).is_some_and(is_muldiv)
            {
                end += 2;
                while end < kids.len() && op_text(arena, kids[end]).is_some() {
                    end += 1;
                }
            }
            if end >= kids.len() {
                // Dangling operator; fold() reports the malformed list.
                return false;
            }
            let span = arena.get(kids[start]).span;
            let sub = arena.alloc_kind(NodeKind::Compound, span);
            let removed = arena.splice_children(node, start..end + 1, vec![sub]);
            for id in removed {
                arena.add_child(sub, id);
            }
            repair(ctx, arena, sub);
            return true;
        }
        i += 1;
    }
    false
}

/// `a - - b` becomes `a + b`; a leading `- -` is simply dropped.
fn collapse_double_minus(arena: &mut NodeArena, node: NodeId) {
    loop {
        let kids: Vec<NodeId> = arena.children(node).to_vec();
        let pair = kids.windows(2).position(|w| {
            op_text(arena, w[0]) == Some("-") && op_text(arena, w[1]) == Some("-")
        });
        let Some(i) = pair else { break };
        if i == 0 {
            arena.splice_children(node, 0..2, Vec::new());
        } else {
            arena.get_mut(kids[i]).text = "+".into();
            arena.splice_children(node, i + 1..i + 2, Vec::new());
        }
    }
}

/// Division by a resolvable constant becomes multiplication by its
/// reciprocal, so the VM never divides where a cheaper multiply works.
fn rewrite_reciprocals(ctx: &Context, arena: &mut NodeArena, node: NodeId) {
    let kids: Vec<NodeId> = arena.children(node).to_vec();
    for i in 0..kids.len() {
        if op_text(arena, kids[i]) != Some("/") {
            continue;
        }
        let Some(&divisor) = kids.get(i + 1) else {
            continue;
        };
        let d = arena.get(divisor);
        if d.kind != NodeKind::Param {
            continue;
        }
        let value = d
            .text
            .parse::<f32>()
            .ok()
            .or_else(|| ctx.resolve_define(&d.text));
        let Some(value) = value else { continue };
        if value.abs() <= ctx.options.constant_epsilon {
            // Constant division by zero; leave it for the VM to produce
            // its infinity.
            continue;
        }
        let recip = 1.0 / value;
        arena.get_mut(kids[i]).text = "*".into();
        // Leaves carry no variable binding yet; the mapping stage sees the
        // reciprocal text and classifies it like any other literal.
        let d = arena.get_mut(divisor);
        d.text = ecow::eco_format!("{recip}");
        d.is_constant = true;
    }
}

/// Flatten a nested compound into its parent when both carry one uniform
/// associative operator. Vector-literal-shaped children (no operators) are
/// left alone. A list that still has absorbable children once the
/// iteration cap is spent is a structural error, not a silent stop.
fn move_up(ctx: &Context, arena: &mut NodeArena, node: NodeId) {
    let mut rounds = 0u32;
    loop {
        let Some(op) = uniform_op(arena, node) else {
            return;
        };
        if op != "+" && op != "*" {
            return;
        }
        let kids: Vec<NodeId> = arena.children(node).to_vec();
        let target = kids.iter().position(|&k| {
            arena.kind(k) == NodeKind::Compound
                && uniform_op(arena, k).is_some_and(|child_op| child_op == op)
        });
        let Some(pos) = target else { return };
        if rounds == MOVE_UP_CAP {
            ctx.diags.error(
                CompileError::UnsettledGrouping(MOVE_UP_CAP).to_string(),
                arena.get(node).span,
            );
            return;
        }
        rounds += 1;
        let inner = kids[pos];
        let inner_kids: Vec<NodeId> = arena.children(inner).to_vec();
        for &k in &inner_kids {
            arena.detach(k);
        }
        arena.splice_children(node, pos..pos + 1, inner_kids);
    }
}

/// The single operator text used across the whole list, if the list is a
/// strict operand/operator alternation with at least one operator.
fn uniform_op(arena: &NodeArena, node: NodeId) -> Option<EcoString> {
    let kids = arena.children(node);
    let mut op: Option<EcoString> = None;
    for (i, &k) in kids.iter().enumerate() {
        match op_text(arena, k) {
            Some(text) => {
                if i % 2 == 0 {
                    return None;
                }
                match &op {
                    Some(prev) if prev != text => return None,
                    _ => op = Some(text.into()),
                }
            }
            None if i % 2 == 1 => return None,
            None => {}
        }
    }
    op
}

// === Lowering phase (compounds become calls) ===

fn fold_rec(ctx: &Context, arena: &mut NodeArena, node: NodeId) -> NodeId {
    let kids: Vec<NodeId> = arena.children(node).to_vec();
    for kid in kids {
        match arena.kind(kid) {
            NodeKind::Compound => {
                fold_rec(ctx, arena, kid);
            }
            NodeKind::Call => {
                let args: Vec<NodeId> = arena.children(kid).to_vec();
                for arg in args {
                    if arg_is_foldable(arena, arg) {
                        fold_rec(ctx, arena, arg);
                    }
                }
            }
            _ => {}
        }
    }
    fold(ctx, arena, node)
}

fn arg_is_foldable(arena: &NodeArena, arg: NodeId) -> bool {
    arena.kind(arg) == NodeKind::Compound
}

fn operator_func(text: &str) -> Option<&'static str> {
    Some(match text {
        "+" => "add",
        "-" => "sub",
        "*" => "mul",
        "/" => "div",
        "%" => "mod",
        "==" => "eq",
        "!=" => "ne",
        "<" => "lt",
        "<=" => "le",
        ">" => "gt",
        ">=" => "ge",
        "&&" => "and",
        "||" => "or",
        _ => return None,
    })
}

/// Lower one compound to calls. The compound's place under its parent is
/// taken by the result.
fn fold(ctx: &Context, arena: &mut NodeArena, node: NodeId) -> NodeId {
    let span = arena.get(node).span;

    // Unary prefixes wrap their operand, rightmost first.
    let mut i = arena.children(node).len();
    while i > 0 {
        i -= 1;
        let kids: Vec<NodeId> = arena.children(node).to_vec();
        let Some(text) = op_text(arena, kids[i]) else {
            continue;
        };
        let unary = (text == "-" || text == "!")
            && (i == 0 || op_text(arena, kids[i - 1]).is_some());
        if !unary {
            continue;
        }
        let Some(&operand) = kids.get(i + 1) else {
            ctx.diags.error(
                CompileError::Parse("dangling unary operator".into()).to_string(),
                span,
            );
            return node;
        };
        let name = if text == "-" { "neg" } else { "not" };
        let call = arena.alloc(Node::leaf(NodeKind::Call, name, span));
        arena.splice_children(node, i..i + 2, vec![call]);
        arena.add_child(call, operand);
    }

    // Strict alternation check; a violation means operators were mixed
    // with vector-literal juxtaposition.
    let kids: Vec<NodeId> = arena.children(node).to_vec();
    let has_ops = kids.iter().any(|&k| op_text(arena, k).is_some());
    let alternates = kids.iter().enumerate().all(|(i, &k)| {
        let is_op = op_text(arena, k).is_some();
        if i % 2 == 1 { is_op } else { !is_op }
    }) && kids.len() % 2 == 1;
    if has_ops && !alternates {
        ctx.diags.error(
            CompileError::Parse("malformed operand/operator list".into()).to_string(),
            span,
        );
        return node;
    }

    if !has_ops {
        return match kids.len() {
            0 => {
                ctx.diags.error(
                    CompileError::Parse("empty expression".into()).to_string(),
                    span,
                );
                node
            }
            1 => {
                let child = kids[0];
                arena.detach(child);
                replace_with(arena, node, child);
                child
            }
            n if n <= 4 => {
                let call = arena.alloc(Node::leaf(
                    NodeKind::Call,
                    ecow::eco_format!("vec{n}"),
                    span,
                ));
                for k in kids {
                    arena.detach(k);
                    arena.add_child(call, k);
                }
                replace_with(arena, node, call);
                call
            }
            n => {
                ctx.diags
                    .error(CompileError::VectorTooWide(n).to_string(), span);
                node
            }
        };
    }

    let operands: Vec<NodeId> = kids.iter().step_by(2).copied().collect();
    let ops: Vec<EcoString> = kids
        .iter()
        .skip(1)
        .step_by(2)
        .map(|&k| arena.get(k).text.clone())
        .collect();

    let uniform = ops.iter().all(|o| o == &ops[0]);
    let result = if uniform
        && (ops[0] == "+" || ops[0] == "*")
        && operands.len() <= VARIADIC_MAX
    {
        let name = if ops[0] == "+" { "add" } else { "mul" };
        let call = arena.alloc(Node::leaf(NodeKind::Call, name, span));
        for op in operands {
            arena.detach(op);
            arena.add_child(call, op);
        }
        call
    } else {
        // Left-associative binary chain.
        let mut acc = operands[0];
        arena.detach(acc);
        for (op, &rhs) in ops.iter().zip(&operands[1..]) {
            let Some(name) = operator_func(op) else {
                ctx.diags.error(
                    CompileError::Parse(ecow::eco_format!("unknown operator '{op}'"))
                        .to_string(),
                    span,
                );
                return node;
            };
            arena.detach(rhs);
            let call = arena.alloc(Node::leaf(NodeKind::Call, name, span));
            arena.add_child(call, acc);
            arena.add_child(call, rhs);
            acc = call;
        }
        acc
    };
    replace_with(arena, node, result);
    result
}

/// Swap `old` for `new` under `old`'s parent, migrating dependencies so
/// inlined pre-statements stay attached to the surviving root.
fn replace_with(arena: &mut NodeArena, old: NodeId, new: NodeId) {
    let deps = core::mem::take(&mut arena.get_mut(old).dependencies);
    arena.get_mut(new).dependencies.extend(deps);
    if let Some(parent) = arena.get(old).parent {
        arena.replace_child(parent, old, new);
    }
}
