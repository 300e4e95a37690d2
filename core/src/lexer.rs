//! Tokenizer and directive intake.
//!
//! Directives (`#define`, `#input`, `#output`, `#cdata`, `#validate`) are
//! line-oriented and must precede all statements; the lexer resolves them
//! into the context's side tables as it goes, so the token stream handed to
//! the parser contains statement material only. Identifiers are folded to
//! lower case.

use ecow::EcoString;
use smallvec::SmallVec;

use crate::context::Context;
use crate::diagnostics::Span;
use crate::errors::CompileError;
use crate::vars::DataKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semi,
    Colon,
    Comma,
    Dot,
    Assign,
    /// Arithmetic, comparison or logical operator; the text disambiguates.
    Operator,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub text: EcoString,
    pub span: Span,
}

/// Tokenize the context's source, recording directives as a side effect.
pub fn tokenize(ctx: &mut Context) -> Vec<Token> {
    let src = ctx.source.clone();
    let bytes = src.as_bytes();
    let mut tokens: Vec<Token> = Vec::new();
    let mut i = 0usize;

    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b' ' | b'\t' | b'\r' | b'\n' => i += 1,
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let start = i;
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                if i + 1 < bytes.len() {
                    i += 2;
                } else {
                    i = bytes.len();
                    ctx.diags.error(
                        CompileError::Parse("unterminated block comment".into()).to_string(),
                        Span::new(start, bytes.len()),
                    );
                }
            }
            b'#' => {
                let start = i;
                let mut end = i;
                while end < bytes.len() && bytes[end] != b'\n' {
                    end += 1;
                }
                let line = &src[start..end];
                let span = Span::new(start, end);
                if tokens.is_empty() {
                    directive(ctx, line, span);
                } else {
                    ctx.diags
                        .error(CompileError::DirectiveOrder.to_string(), span);
                }
                i = end;
            }
            b'0'..=b'9' => {
                let start = i;
                i = scan_number(bytes, i);
                tokens.push(Token {
                    kind: TokenKind::Number,
                    text: src[start..i].into(),
                    span: Span::new(start, i),
                });
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                tokens.push(Token {
                    kind: TokenKind::Ident,
                    text: src[start..i].to_ascii_lowercase().into(),
                    span: Span::new(start, i),
                });
            }
            _ => {
                let start = i;
                let two = bytes.get(i + 1).map(|&n| [c, n]);
                let (kind, len) = match (c, two) {
                    (b'<' | b'>' | b'=' | b'!', Some([_, b'='])) => (TokenKind::Operator, 2),
                    (b'&', Some([_, b'&'])) => (TokenKind::Operator, 2),
                    (b'|', Some([_, b'|'])) => (TokenKind::Operator, 2),
                    (b'+' | b'-' | b'*' | b'/' | b'%' | b'<' | b'>' | b'!', _) => {
                        (TokenKind::Operator, 1)
                    }
                    (b'=', _) => (TokenKind::Assign, 1),
                    (b'(', _) => (TokenKind::LParen, 1),
                    (b')', _) => (TokenKind::RParen, 1),
                    (b'{', _) => (TokenKind::LBrace, 1),
                    (b'}', _) => (TokenKind::RBrace, 1),
                    (b'[', _) => (TokenKind::LBracket, 1),
                    (b']', _) => (TokenKind::RBracket, 1),
                    (b';', _) => (TokenKind::Semi, 1),
                    (b':', _) => (TokenKind::Colon, 1),
                    (b',', _) => (TokenKind::Comma, 1),
                    (b'.', _) => (TokenKind::Dot, 1),
                    _ => {
                        ctx.diags.error(
                            CompileError::Parse(ecow::eco_format!(
                                "unexpected character '{}'",
                                c as char
                            ))
                            .to_string(),
                            Span::new(start, start + 1),
                        );
                        i += 1;
                        continue;
                    }
                };
                i += len;
                tokens.push(Token {
                    kind,
                    text: src[start..i].into(),
                    span: Span::new(start, i),
                });
            }
        }
    }
    tokens
}

fn scan_number(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' && bytes.get(i + 1).is_some_and(|b| b.is_ascii_digit())
    {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if bytes.get(j) == Some(&b'-') || bytes.get(j) == Some(&b'+') {
            j += 1;
        }
        if bytes.get(j).is_some_and(|b| b.is_ascii_digit()) {
            i = j;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
    }
    i
}

// === Directives ===

fn directive(ctx: &mut Context, line: &str, span: Span) {
    let mut words = line[1..].split_whitespace();
    let Some(keyword) = words.next() else {
        malformed(ctx, "empty directive", span);
        return;
    };
    let rest: Vec<&str> = words.collect();
    match keyword.to_ascii_lowercase().as_str() {
        "define" => define(ctx, &rest, span),
        "input" => io(ctx, false, &rest, span),
        "output" => io(ctx, true, &rest, span),
        "cdata" => cdata(ctx, line, &rest, span),
        "validate" => {
            let Some((name, expr)) = rest.split_first() else {
                malformed(ctx, "expected '#validate name expr'", span);
                return;
            };
            let name: EcoString = name.to_ascii_lowercase().into();
            let expr: EcoString = expr.join(" ").into();
            if expr.is_empty() {
                malformed(ctx, "validate needs an expression", span);
            } else {
                ctx.validations.push((name, expr, span));
            }
        }
        other => malformed(ctx, &format!("unknown directive '#{other}'"), span),
    }
}

fn malformed(ctx: &Context, what: &str, span: Span) {
    ctx.diags
        .error(CompileError::MalformedDirective(what.into()).to_string(), span);
}

fn define(ctx: &mut Context, rest: &[&str], span: Span) {
    let [name, value] = rest else {
        malformed(ctx, "expected '#define name value'", span);
        return;
    };
    let name: EcoString = name.to_ascii_lowercase().into();
    let Ok(value) = value.parse::<f32>() else {
        malformed(ctx, &format!("'{value}' is not a number"), span);
        return;
    };
    if ctx.defines.iter().any(|(n, _)| *n == name) {
        ctx.diags
            .error(CompileError::DuplicateIdentifier(name).to_string(), span);
        return;
    }
    ctx.defines.push((name, value));
}

fn width_of_type(ty: &str) -> Option<u8> {
    match ty {
        "numeric" => Some(1),
        "vec2" => Some(2),
        "vec3" => Some(3),
        "vec4" => Some(4),
        _ => None,
    }
}

/// `#input name type [@offset] [= defaults...]`
fn io(ctx: &mut Context, output: bool, rest: &[&str], span: Span) {
    let [name, ty, tail @ ..] = rest else {
        malformed(ctx, "expected 'name type'", span);
        return;
    };
    let name: EcoString = name.to_ascii_lowercase().into();
    let Some(width) = width_of_type(&ty.to_ascii_lowercase()) else {
        malformed(ctx, &format!("unknown type '{ty}'"), span);
        return;
    };

    let mut tail = tail.iter();
    let mut offset = None;
    let mut defaults: SmallVec<[f32; 4]> = SmallVec::new();
    let mut next = tail.next();
    if let Some(word) = next
        && let Some(off) = word.strip_prefix('@')
    {
        let Ok(off) = off.parse::<u16>() else {
            malformed(ctx, &format!("'{word}' is not a byte offset"), span);
            return;
        };
        offset = Some(off);
        next = tail.next();
    }
    if let Some(&"=") = next {
        for word in tail {
            let Ok(v) = word.parse::<f32>() else {
                malformed(ctx, &format!("'{word}' is not a number"), span);
                return;
            };
            defaults.push(v);
        }
        if defaults.is_empty() || defaults.len() > width as usize {
            malformed(ctx, "wrong number of default values", span);
            return;
        }
        next = None;
    }
    if next.is_some() {
        malformed(ctx, "trailing junk after declaration", span);
        return;
    }

    let Some(var) = ctx.vars.create(name.clone(), width, !output, output) else {
        ctx.diags
            .error(CompileError::DuplicateIdentifier(name).to_string(), span);
        return;
    };
    ctx.vars.set_values(var, defaults.clone());
    ctx.add_io(output, name, var, width, offset, defaults, span);
}

/// `#cdata name kind v0 v1 ...`; `kind` is `auto` (numeric list, narrowed
/// to the most compact encoding) or `raw` (quoted string payload).
fn cdata(ctx: &mut Context, line: &str, rest: &[&str], span: Span) {
    let [name, kind, ..] = rest else {
        malformed(ctx, "expected 'name kind values...'", span);
        return;
    };
    let name: EcoString = name.to_ascii_lowercase().into();
    let (kind, payload) = match kind.to_ascii_lowercase().as_str() {
        "auto" => {
            let mut values = Vec::new();
            for word in &rest[2..] {
                let Ok(v) = word.parse::<f32>() else {
                    malformed(ctx, &format!("'{word}' is not a number"), span);
                    return;
                };
                values.push(v);
            }
            if values.is_empty() {
                malformed(ctx, "cdata needs at least one value", span);
                return;
            }
            narrow(&values, ctx.options.constant_epsilon)
        }
        "raw" => {
            let Some(open) = line.find('"') else {
                malformed(ctx, "raw cdata needs a quoted payload", span);
                return;
            };
            let Some(close) = line.rfind('"').filter(|&c| c > open) else {
                malformed(ctx, "unterminated raw payload", span);
                return;
            };
            (DataKind::BlobRaw, line[open + 1..close].as_bytes().to_vec())
        }
        other => {
            malformed(ctx, &format!("unknown cdata kind '{other}'"), span);
            return;
        }
    };
    if ctx.vars.create_blob(name.clone(), kind, payload).is_none() {
        ctx.diags
            .error(CompileError::DuplicateIdentifier(name).to_string(), span);
    }
}

/// Pick the most compact encoding that represents every value exactly
/// (integers are matched within `epsilon`).
fn narrow(values: &[f32], epsilon: f32) -> (DataKind, Vec<u8>) {
    let integral = |lo: f32, hi: f32| {
        values.iter().all(|&v| {
            let r = v.round();
            (v - r).abs() <= epsilon && r >= lo && r <= hi
        })
    };
    if integral(0.0, 255.0) {
        (
            DataKind::BlobU8,
            values.iter().map(|v| v.round() as u8).collect(),
        )
    } else if integral(-128.0, 127.0) {
        (
            DataKind::BlobI8,
            values.iter().map(|v| (v.round() as i8) as u8).collect(),
        )
    } else if integral(-32768.0, 32767.0) {
        (
            DataKind::BlobI16,
            values
                .iter()
                .flat_map(|v| (v.round() as i16).to_le_bytes())
                .collect(),
        )
    } else {
        (
            DataKind::BlobF32,
            values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        )
    }
}
