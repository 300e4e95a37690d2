//! Recursive-descent parser.
//!
//! Builds the initial node tree: one arena per top-level statement, plus
//! one arena per inline function definition. Expressions are parsed into
//! flat operand/operator lists ([`NodeKind::Compound`]) with no precedence
//! structure; the arithmetic stage regroups them later. Indexers are
//! attached to their subject node and classified by the transform stage.

use ecow::EcoString;

use crate::context::{Context, InlineFn, Statement};
use crate::diagnostics::Span;
use crate::errors::CompileError;
use crate::lexer::{Token, TokenKind};
use crate::syntax::{Indexer, Node, NodeArena, NodeId, NodeKind};

/// Parse the token stream into the context's statement list and inline
/// function table. Errors are reported to the diagnostics log; parsing
/// recovers at the next statement boundary so later errors still surface.
pub fn parse(ctx: &mut Context, tokens: Vec<Token>) {
    let mut parser = Parser { tokens, pos: 0 };
    while parser.peek().is_some() {
        if parser.peek_keyword("function") {
            parser.parse_function(ctx);
            continue;
        }
        let mut arena = NodeArena::new();
        match parser.parse_statement(ctx, &mut arena, false) {
            Some(node) => {
                let span = arena.get(node).span;
                let root = arena.alloc_kind(NodeKind::Root, span);
                arena.add_child(root, node);
                ctx.statements.push(Statement { arena, root });
            }
            None => parser.recover(),
        }
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self, kind: TokenKind) -> bool {
        self.peek().is_some_and(|t| t.kind == kind)
    }

    fn peek_keyword(&self, word: &str) -> bool {
        self.peek()
            .is_some_and(|t| t.kind == TokenKind::Ident && t.text == word)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        if self.peek_kind(kind) {
            self.advance()
        } else {
            None
        }
    }

    fn expect(&mut self, ctx: &Context, kind: TokenKind, what: &str) -> Option<Token> {
        match self.eat(kind) {
            Some(tok) => Some(tok),
            None => {
                let span = self.here();
                ctx.diags.error(
                    CompileError::Parse(ecow::eco_format!("expected {what}")).to_string(),
                    span,
                );
                None
            }
        }
    }

    fn here(&self) -> Span {
        self.peek()
            .map(|t| t.span)
            .or_else(|| self.tokens.last().map(|t| t.span))
            .unwrap_or_default()
    }

    /// Skip to the next statement boundary after a parse error.
    fn recover(&mut self) {
        let mut depth = 0usize;
        while let Some(tok) = self.advance() {
            match tok.kind {
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace if depth > 0 => depth -= 1,
                TokenKind::RBrace => break,
                TokenKind::Semi if depth == 0 => break,
                _ => {}
            }
        }
    }

    // === Statements ===

    fn parse_statement(
        &mut self,
        ctx: &Context,
        arena: &mut NodeArena,
        in_fn: bool,
    ) -> Option<NodeId> {
        match self.peek() {
            Some(tok) if tok.kind == TokenKind::Ident => match tok.text.as_str() {
                "if" => self.parse_if(ctx, arena, in_fn),
                "while" => self.parse_while(ctx, arena, in_fn),
                "for" => self.parse_for(ctx, arena, in_fn),
                "switch" => self.parse_switch(ctx, arena, in_fn),
                "return" if in_fn => self.parse_return(ctx, arena),
                "function" => {
                    let span = tok.span;
                    ctx.diags.error(
                        CompileError::Parse(
                            "function definitions are only allowed at the top level".into(),
                        )
                        .to_string(),
                        span,
                    );
                    None
                }
                _ if self.starts_assignment() => {
                    let node = self.parse_assign_core(ctx, arena)?;
                    self.expect(ctx, TokenKind::Semi, "';'")?;
                    Some(node)
                }
                _ => {
                    let node = self.parse_call_statement(ctx, arena)?;
                    self.expect(ctx, TokenKind::Semi, "';'")?;
                    Some(node)
                }
            },
            _ => {
                let span = self.here();
                ctx.diags.error(
                    CompileError::Parse("expected a statement".into()).to_string(),
                    span,
                );
                None
            }
        }
    }

    /// Lookahead: `ident` followed by at most one indexer, then `=`.
    fn starts_assignment(&self) -> bool {
        let mut j = self.pos + 1;
        match self.tokens.get(j).map(|t| t.kind) {
            Some(TokenKind::Dot) => j += 2,
            Some(TokenKind::LBracket) => {
                let mut depth = 1usize;
                j += 1;
                while depth > 0 {
                    match self.tokens.get(j).map(|t| t.kind) {
                        Some(TokenKind::LBracket) => depth += 1,
                        Some(TokenKind::RBracket) => depth -= 1,
                        Some(_) => {}
                        None => return false,
                    }
                    j += 1;
                }
            }
            _ => {}
        }
        self.tokens.get(j).map(|t| t.kind) == Some(TokenKind::Assign)
    }

    fn parse_assign_core(&mut self, ctx: &Context, arena: &mut NodeArena) -> Option<NodeId> {
        let name = self.expect(ctx, TokenKind::Ident, "an identifier")?;
        let target = arena.alloc(Node::leaf(NodeKind::Param, name.text, name.span));
        self.parse_indexers(ctx, arena, target)?;
        if arena.get(target).indexers.len() > 1 {
            ctx.diags.error(
                CompileError::Parse("an assignment target takes at most one indexer".into())
                    .to_string(),
                name.span,
            );
            return None;
        }
        self.expect(ctx, TokenKind::Assign, "'='")?;
        let value = self.parse_compound(ctx, arena)?;
        let assign = arena.alloc_kind(NodeKind::Assign, name.span);
        arena.add_child(assign, target);
        arena.add_child(assign, value);
        Some(assign)
    }

    fn parse_return(&mut self, ctx: &Context, arena: &mut NodeArena) -> Option<NodeId> {
        let kw = self.advance()?;
        let target = arena.alloc(Node::leaf(NodeKind::Param, "return", kw.span));
        let value = self.parse_compound(ctx, arena)?;
        self.expect(ctx, TokenKind::Semi, "';'")?;
        let assign = arena.alloc_kind(NodeKind::Assign, kw.span);
        arena.add_child(assign, target);
        arena.add_child(assign, value);
        Some(assign)
    }

    fn parse_call_statement(&mut self, ctx: &Context, arena: &mut NodeArena) -> Option<NodeId> {
        let name = self.expect(ctx, TokenKind::Ident, "an identifier")?;
        if !self.peek_kind(TokenKind::LParen) {
            ctx.diags.error(
                CompileError::Parse(ecow::eco_format!(
                    "'{}' is not a statement; expected a call or assignment",
                    name.text
                ))
                .to_string(),
                name.span,
            );
            return None;
        }
        self.parse_call(ctx, arena, name)
    }

    fn parse_call(&mut self, ctx: &Context, arena: &mut NodeArena, name: Token) -> Option<NodeId> {
        self.expect(ctx, TokenKind::LParen, "'('")?;
        let call = arena.alloc(Node::leaf(NodeKind::Call, name.text, name.span));
        if self.eat(TokenKind::RParen).is_none() {
            loop {
                let arg = self.parse_compound(ctx, arena)?;
                arena.add_child(call, arg);
                if self.eat(TokenKind::Comma).is_some() {
                    continue;
                }
                self.expect(ctx, TokenKind::RParen, "')'")?;
                break;
            }
        }
        Some(call)
    }

    fn parse_block(
        &mut self,
        ctx: &Context,
        arena: &mut NodeArena,
        parent: NodeId,
        in_fn: bool,
    ) -> Option<()> {
        self.expect(ctx, TokenKind::LBrace, "'{'")?;
        while !self.peek_kind(TokenKind::RBrace) {
            if self.peek().is_none() {
                let span = self.here();
                ctx.diags.error(
                    CompileError::Parse("unterminated block".into()).to_string(),
                    span,
                );
                return None;
            }
            let stmt = self.parse_statement(ctx, arena, in_fn)?;
            arena.add_child(parent, stmt);
        }
        self.advance();
        Some(())
    }

    fn parse_condition(&mut self, ctx: &Context, arena: &mut NodeArena) -> Option<NodeId> {
        self.expect(ctx, TokenKind::LParen, "'('")?;
        let expr = self.parse_compound(ctx, arena)?;
        self.expect(ctx, TokenKind::RParen, "')'")?;
        let cond = arena.alloc_kind(NodeKind::Condition, arena.get(expr).span);
        arena.add_child(cond, expr);
        Some(cond)
    }

    fn parse_if(&mut self, ctx: &Context, arena: &mut NodeArena, in_fn: bool) -> Option<NodeId> {
        let kw = self.advance()?;
        let cond = self.parse_condition(ctx, arena)?;
        let node = arena.alloc_kind(NodeKind::If, kw.span);
        arena.add_child(node, cond);
        let then = arena.alloc_kind(NodeKind::Then, kw.span);
        arena.add_child(node, then);
        self.parse_block(ctx, arena, then, in_fn)?;
        if self.peek_keyword("else") {
            self.advance();
            let els = arena.alloc_kind(NodeKind::Else, kw.span);
            arena.add_child(node, els);
            if self.peek_keyword("if") {
                let nested = self.parse_if(ctx, arena, in_fn)?;
                arena.add_child(els, nested);
            } else {
                self.parse_block(ctx, arena, els, in_fn)?;
            }
        }
        Some(node)
    }

    fn parse_while(&mut self, ctx: &Context, arena: &mut NodeArena, in_fn: bool) -> Option<NodeId> {
        let kw = self.advance()?;
        let cond = self.parse_condition(ctx, arena)?;
        let node = arena.alloc_kind(NodeKind::While, kw.span);
        arena.add_child(node, cond);
        let body = arena.alloc_kind(NodeKind::WhileBody, kw.span);
        arena.add_child(node, body);
        self.parse_block(ctx, arena, body, in_fn)?;
        Some(node)
    }

    fn parse_for(&mut self, ctx: &Context, arena: &mut NodeArena, in_fn: bool) -> Option<NodeId> {
        let kw = self.advance()?;
        self.expect(ctx, TokenKind::LParen, "'('")?;
        let init = self.parse_assign_core(ctx, arena)?;
        self.expect(ctx, TokenKind::Semi, "';'")?;
        let cond_expr = self.parse_compound(ctx, arena)?;
        self.expect(ctx, TokenKind::Semi, "';'")?;
        let cond = arena.alloc_kind(NodeKind::Condition, arena.get(cond_expr).span);
        arena.add_child(cond, cond_expr);
        let iter = self.parse_assign_core(ctx, arena)?;
        self.expect(ctx, TokenKind::RParen, "')'")?;
        let node = arena.alloc_kind(NodeKind::For, kw.span);
        arena.add_child(node, init);
        arena.add_child(node, cond);
        arena.add_child(node, iter);
        let body = arena.alloc_kind(NodeKind::WhileBody, kw.span);
        arena.add_child(node, body);
        self.parse_block(ctx, arena, body, in_fn)?;
        Some(node)
    }

    fn parse_switch(&mut self, ctx: &Context, arena: &mut NodeArena, in_fn: bool) -> Option<NodeId> {
        let kw = self.advance()?;
        self.expect(ctx, TokenKind::LParen, "'('")?;
        let subject = self.parse_compound(ctx, arena)?;
        self.expect(ctx, TokenKind::RParen, "')'")?;
        let node = arena.alloc_kind(NodeKind::Switch, kw.span);
        arena.add_child(node, subject);
        self.expect(ctx, TokenKind::LBrace, "'{'")?;
        loop {
            if self.eat(TokenKind::RBrace).is_some() {
                break;
            }
            let arm_kw = match self.peek() {
                Some(t) if t.kind == TokenKind::Ident && (t.text == "case" || t.text == "default") => {
                    self.advance()?
                }
                _ => {
                    let span = self.here();
                    ctx.diags.error(
                        CompileError::Parse("expected 'case', 'default' or '}'".into())
                            .to_string(),
                        span,
                    );
                    return None;
                }
            };
            let arm = if arm_kw.text == "case" {
                let value = self.parse_compound(ctx, arena)?;
                self.expect(ctx, TokenKind::Colon, "':'")?;
                let case = arena.alloc_kind(NodeKind::Case, arm_kw.span);
                arena.add_child(case, value);
                case
            } else {
                self.expect(ctx, TokenKind::Colon, "':'")?;
                arena.alloc_kind(NodeKind::Default, arm_kw.span)
            };
            let then = arena.alloc_kind(NodeKind::Then, arm_kw.span);
            arena.add_child(arm, then);
            while !(self.peek_kind(TokenKind::RBrace)
                || self.peek_keyword("case")
                || self.peek_keyword("default"))
            {
                if self.peek().is_none() {
                    let span = self.here();
                    ctx.diags.error(
                        CompileError::Parse("unterminated switch".into()).to_string(),
                        span,
                    );
                    return None;
                }
                let stmt = self.parse_statement(ctx, arena, in_fn)?;
                arena.add_child(then, stmt);
            }
            arena.add_child(node, arm);
        }
        Some(node)
    }

    // === Inline functions ===

    fn parse_function(&mut self, ctx: &mut Context) {
        let kw = match self.advance() {
            Some(t) => t,
            None => return,
        };
        let Some(name) = self.expect(ctx, TokenKind::Ident, "a function name") else {
            self.recover();
            return;
        };
        let fn_name: EcoString = name.text.clone();
        if ctx.inline_fns.contains_key(&fn_name) || ctx.registry.lookup(&fn_name).is_some() {
            ctx.diags.error(
                CompileError::DuplicateIdentifier(fn_name.clone()).to_string(),
                name.span,
            );
            self.recover();
            return;
        }
        if self.expect(ctx, TokenKind::LParen, "'('").is_none() {
            self.recover();
            return;
        }
        let mut params: Vec<EcoString> = Vec::new();
        if self.eat(TokenKind::RParen).is_none() {
            loop {
                let Some(param) = self.expect(ctx, TokenKind::Ident, "a parameter name") else {
                    self.recover();
                    return;
                };
                params.push(param.text);
                if self.eat(TokenKind::Comma).is_some() {
                    continue;
                }
                if self.expect(ctx, TokenKind::RParen, "')'").is_none() {
                    self.recover();
                    return;
                }
                break;
            }
        }

        let mut arena = NodeArena::new();
        let mut body: Vec<NodeId> = Vec::new();
        let mut has_return = false;
        if self.expect(ctx, TokenKind::LBrace, "'{'").is_none() {
            self.recover();
            return;
        }
        while !self.peek_kind(TokenKind::RBrace) {
            if self.peek().is_none() {
                let span = self.here();
                ctx.diags.error(
                    CompileError::Parse("unterminated function body".into()).to_string(),
                    span,
                );
                return;
            }
            if has_return {
                let span = self.here();
                ctx.diags.error(
                    CompileError::Parse("statements after 'return' are unreachable".into())
                        .to_string(),
                    span,
                );
                self.recover();
                return;
            }
            let Some(stmt) = self.parse_statement(ctx, &mut arena, true) else {
                self.recover();
                return;
            };
            if arena.kind(stmt) == NodeKind::Assign {
                let target = arena.children(stmt)[0];
                if arena.get(target).text == "return" {
                    has_return = true;
                }
            }
            body.push(stmt);
        }
        self.advance();
        if !has_return {
            ctx.diags.error(
                CompileError::MissingReturn(fn_name.clone()).to_string(),
                kw.span,
            );
            return;
        }
        ctx.inline_fns.insert(
            fn_name.clone(),
            InlineFn {
                name: fn_name,
                params,
                arena,
                body,
                has_return,
                span: kw.span,
            },
        );
    }

    // === Expressions ===

    /// A flat operand/operator list. Juxtaposed operands with no operator
    /// between them form a vector literal; the analysis stages tell the two
    /// apart by shape.
    fn parse_compound(&mut self, ctx: &Context, arena: &mut NodeArena) -> Option<NodeId> {
        let span = self.here();
        let node = arena.alloc_kind(NodeKind::Compound, span);
        loop {
            // Unary prefix run: at the list start or right after an operator.
            while let Some(tok) = self.peek() {
                let unary_ok = arena
                    .children(node)
                    .last()
                    .is_none_or(|&last| arena.kind(last) == NodeKind::Operation);
                if tok.kind == TokenKind::Operator
                    && (tok.text == "-" || tok.text == "!")
                    && unary_ok
                {
                    let tok = self.advance()?;
                    let op = arena.alloc(Node::leaf(NodeKind::Operation, tok.text, tok.span));
                    arena.add_child(node, op);
                } else {
                    break;
                }
            }
            let operand = self.parse_operand(ctx, arena)?;
            arena.add_child(node, operand);
            match self.peek() {
                Some(tok) if tok.kind == TokenKind::Operator => {
                    let tok = self.advance()?;
                    let op = arena.alloc(Node::leaf(NodeKind::Operation, tok.text, tok.span));
                    arena.add_child(node, op);
                }
                Some(tok)
                    if matches!(
                        tok.kind,
                        TokenKind::Number | TokenKind::Ident | TokenKind::LParen
                    ) =>
                {
                    // Vector literal: keep collecting juxtaposed operands.
                }
                _ => break,
            }
        }
        Some(node)
    }

    fn parse_operand(&mut self, ctx: &Context, arena: &mut NodeArena) -> Option<NodeId> {
        let node = match self.peek().map(|t| t.kind) {
            Some(TokenKind::Number) => {
                let tok = self.advance()?;
                arena.alloc(Node::leaf(NodeKind::Param, tok.text, tok.span))
            }
            Some(TokenKind::Ident) => {
                let tok = self.advance()?;
                if self.peek_kind(TokenKind::LParen) {
                    self.parse_call(ctx, arena, tok)?
                } else {
                    arena.alloc(Node::leaf(NodeKind::Param, tok.text, tok.span))
                }
            }
            Some(TokenKind::LParen) => {
                self.advance();
                let inner = self.parse_compound(ctx, arena)?;
                self.expect(ctx, TokenKind::RParen, "')'")?;
                inner
            }
            _ => {
                let span = self.here();
                ctx.diags.error(
                    CompileError::Parse("expected an expression".into()).to_string(),
                    span,
                );
                return None;
            }
        };
        self.parse_indexers(ctx, arena, node)?;
        Some(node)
    }

    fn parse_indexers(
        &mut self,
        ctx: &Context,
        arena: &mut NodeArena,
        node: NodeId,
    ) -> Option<()> {
        loop {
            if self.eat(TokenKind::Dot).is_some() {
                let comp = self.expect(ctx, TokenKind::Ident, "a component name")?;
                let index = match comp.text.as_str() {
                    "x" => 0,
                    "y" => 1,
                    "z" => 2,
                    "w" => 3,
                    other => {
                        ctx.diags.error(
                            CompileError::Parse(ecow::eco_format!(
                                "unknown component '{other}'"
                            ))
                            .to_string(),
                            comp.span,
                        );
                        return None;
                    }
                };
                arena.get_mut(node).indexers.push(Indexer::Component(index));
            } else if self.eat(TokenKind::LBracket).is_some() {
                let expr = self.parse_compound(ctx, arena)?;
                self.expect(ctx, TokenKind::RBracket, "']'")?;
                let indexer = match literal_component(arena, expr) {
                    Some(comp) => Indexer::Component(comp),
                    None => Indexer::Dynamic(expr),
                };
                arena.get_mut(node).indexers.push(indexer);
            } else {
                return Some(());
            }
        }
    }
}

/// `[2]` with a bare integer literal is a static component access.
fn literal_component(arena: &NodeArena, expr: NodeId) -> Option<u8> {
    let children = arena.children(expr);
    if children.len() != 1 {
        return None;
    }
    let leaf = arena.get(children[0]);
    if leaf.kind != NodeKind::Param {
        return None;
    }
    leaf.text.parse::<u8>().ok().filter(|&c| c < 4)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::lexer::tokenize;
    use crate::options::Options;
    use crate::registry::Registry;

    fn parse_src(src: &str) -> Context {
        let mut ctx = Context::new(src, Options::default(), Registry::new());
        let tokens = tokenize(&mut ctx);
        parse(&mut ctx, tokens);
        ctx
    }

    fn stmt(ctx: &Context, i: usize) -> (&NodeArena, NodeId) {
        let s = &ctx.statements[i];
        (&s.arena, s.arena.children(s.root)[0])
    }

    #[test]
    fn assignment_parses_to_flat_compound() {
        let ctx = parse_src("a = 1 + 2 * 3;");
        assert!(ctx.diags.is_ok(), "{:?}", ctx.diags.entries());
        let (arena, node) = stmt(&ctx, 0);
        assert_eq!(arena.kind(node), NodeKind::Assign);
        let value = arena.children(node)[1];
        assert_eq!(arena.kind(value), NodeKind::Compound);
        let texts: Vec<&str> = arena
            .children(value)
            .iter()
            .map(|&c| arena.get(c).text.as_str())
            .collect();
        // No precedence structure at parse time.
        assert_eq!(texts, vec!["1", "+", "2", "*", "3"]);
    }

    #[test]
    fn vector_literal_is_juxtaposed_operands() {
        let ctx = parse_src("v = (1 2 3);");
        assert!(ctx.diags.is_ok());
        let (arena, node) = stmt(&ctx, 0);
        let value = arena.children(node)[1];
        // Outer compound wraps the parenthesized inner one.
        let inner = arena.children(value)[0];
        assert_eq!(arena.kind(inner), NodeKind::Compound);
        assert_eq!(arena.children(inner).len(), 3);
    }

    #[test]
    fn indexers_attach_to_their_subject() {
        let ctx = parse_src("a = v.y + w[q + 1];");
        assert!(ctx.diags.is_ok(), "{:?}", ctx.diags.entries());
        let (arena, node) = stmt(&ctx, 0);
        let value = arena.children(node)[1];
        let v = arena.children(value)[0];
        assert_eq!(arena.get(v).indexers.as_slice(), &[Indexer::Component(1)]);
        let w = arena.children(value)[2];
        assert!(matches!(
            arena.get(w).indexers.as_slice(),
            &[Indexer::Dynamic(_)]
        ));
    }

    #[test]
    fn static_bracket_index_folds_to_component() {
        let ctx = parse_src("a = v[2];");
        assert!(ctx.diags.is_ok());
        let (arena, node) = stmt(&ctx, 0);
        let value = arena.children(node)[1];
        let v = arena.children(value)[0];
        assert_eq!(arena.get(v).indexers.as_slice(), &[Indexer::Component(2)]);
    }

    #[test]
    fn indexed_assignment_target() {
        let ctx = parse_src("v.z = 1;");
        assert!(ctx.diags.is_ok());
        let (arena, node) = stmt(&ctx, 0);
        let target = arena.children(node)[0];
        assert_eq!(
            arena.get(target).indexers.as_slice(),
            &[Indexer::Component(2)]
        );
    }

    #[test]
    fn if_else_chain_shape() {
        let ctx = parse_src("if (a < 1) { b = 1; } else if (a < 2) { b = 2; } else { b = 3; }");
        assert!(ctx.diags.is_ok(), "{:?}", ctx.diags.entries());
        let (arena, node) = stmt(&ctx, 0);
        assert_eq!(arena.kind(node), NodeKind::If);
        let kids = arena.children(node);
        assert_eq!(arena.kind(kids[0]), NodeKind::Condition);
        assert_eq!(arena.kind(kids[1]), NodeKind::Then);
        assert_eq!(arena.kind(kids[2]), NodeKind::Else);
        let nested = arena.children(kids[2])[0];
        assert_eq!(arena.kind(nested), NodeKind::If);
        assert_eq!(arena.children(nested).len(), 3);
    }

    #[test]
    fn for_loop_shape() {
        let ctx = parse_src("for (i = 0; i < 10; i = i + 1) { a = a + i; }");
        assert!(ctx.diags.is_ok(), "{:?}", ctx.diags.entries());
        let (arena, node) = stmt(&ctx, 0);
        assert_eq!(arena.kind(node), NodeKind::For);
        let kids = arena.children(node);
        assert_eq!(arena.kind(kids[0]), NodeKind::Assign);
        assert_eq!(arena.kind(kids[1]), NodeKind::Condition);
        assert_eq!(arena.kind(kids[2]), NodeKind::Assign);
        assert_eq!(arena.kind(kids[3]), NodeKind::WhileBody);
    }

    #[test]
    fn switch_shape() {
        let ctx = parse_src("switch (m) { case 1: a = 1; case 2: a = 2; default: a = 0; }");
        assert!(ctx.diags.is_ok(), "{:?}", ctx.diags.entries());
        let (arena, node) = stmt(&ctx, 0);
        assert_eq!(arena.kind(node), NodeKind::Switch);
        let kids = arena.children(node);
        assert_eq!(kids.len(), 4);
        assert_eq!(arena.kind(kids[1]), NodeKind::Case);
        assert_eq!(arena.kind(kids[3]), NodeKind::Default);
    }

    #[test]
    fn inline_function_definition() {
        // Bodies reference formals only; locals are rejected later, at
        // expansion time.
        let ctx = parse_src("function lift(a, b) { return a * 2 + b; }\nx = lift(1, 2);");
        assert!(ctx.diags.is_ok(), "{:?}", ctx.diags.entries());
        let f = ctx.inline_fns.get("lift").unwrap();
        assert_eq!(f.params, vec!["a", "b"]);
        assert_eq!(f.body.len(), 1);
        assert!(f.has_return);
        assert_eq!(ctx.statements.len(), 1);
    }

    #[test]
    fn function_without_return_is_an_error() {
        let ctx = parse_src("function bad(a) { t = a; }\n");
        assert!(!ctx.diags.is_ok());
    }

    #[test]
    fn error_recovery_reaches_later_statements() {
        let ctx = parse_src("a = ;\nb = 1;");
        assert!(!ctx.diags.is_ok());
        assert_eq!(ctx.statements.len(), 1);
    }
}
