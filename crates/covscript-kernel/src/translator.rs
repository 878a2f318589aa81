//! Statement translator: grammar methods and block assembly.
//!
//! The translator works on token lines. `match_line` classifies one line
//! into a grammar method; `preprocess` validates its shape early;
//! `translate` assembles a balanced token-line sequence into statements,
//! recursing into block constructs. The REPL drives the same machinery one
//! line at a time and reuses `translate` when a block closes.

use std::rc::Rc;

use crate::ast::{BinaryOp, Expr, UnaryOp, Value};
use crate::compiler::Compiler;
use crate::context::ContextRef;
use crate::error::{Error, Result};
use crate::lexer::{Token, TokenLine};
use crate::loader;
use crate::statement::{Stmt, StmtKind};

/// Grammar method categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    /// No grammar matched (empty line).
    Null,
    /// A one-line statement.
    Single,
    /// A multi-line construct opener.
    Block,
    /// A directive executed at translation time.
    JitCommand,
}

/// The grammar form a method lowers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    None,
    End,
    Else,
    Catch,
    Var,
    Assign,
    Import,
    Throw,
    Exit,
    Expression,
    If,
    While,
    Try,
    Package,
}

/// A matched grammar method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Method {
    pub kind: MethodKind,
    pub target: Target,
}

impl Method {
    fn new(kind: MethodKind, target: Target) -> Self {
        Method { kind, target }
    }
}

/// Classify a token line into a grammar method.
pub fn match_line(line: &TokenLine) -> Method {
    use MethodKind::*;
    let Some(first) = line.tokens.first() else {
        return Method::new(Null, Target::None);
    };
    match first {
        Token::Package => Method::new(JitCommand, Target::Package),
        Token::Import => Method::new(Single, Target::Import),
        Token::Var | Token::Constant => Method::new(Single, Target::Var),
        Token::Throw => Method::new(Single, Target::Throw),
        Token::Exit => Method::new(Single, Target::Exit),
        Token::End => Method::new(Single, Target::End),
        Token::Else => Method::new(Single, Target::Else),
        Token::Catch => Method::new(Single, Target::Catch),
        Token::If => Method::new(Block, Target::If),
        Token::While => Method::new(Block, Target::While),
        Token::Try => Method::new(Block, Target::Try),
        Token::Ident(_) if matches!(line.tokens.get(1), Some(Token::Assign)) => {
            Method::new(Single, Target::Assign)
        }
        _ => Method::new(Single, Target::Expression),
    }
}

/// Early shape validation for one line, before any lowering happens.
pub fn preprocess(method: Method, line: &TokenLine, ctx: &ContextRef) -> Result<()> {
    let grammar_error = |msg: &str| {
        Err(Error::source(
            line.line_num,
            ctx.file_path(),
            ctx.raw_code(line.line_num),
            msg,
        ))
    };
    let tokens = &line.tokens;
    match method.target {
        Target::End => {
            if tokens.len() != 1 {
                return grammar_error("trailing tokens after 'end'");
            }
        }
        Target::Else => {
            if tokens.len() != 1 {
                return grammar_error("trailing tokens after 'else'");
            }
        }
        Target::Catch => {
            if tokens.len() != 2 || !matches!(tokens.get(1), Some(Token::Ident(_))) {
                return grammar_error("expected a variable name after 'catch'");
            }
        }
        Target::If | Target::While => {
            if tokens.len() < 2 {
                return grammar_error("missing condition in block header");
            }
        }
        Target::Try => {
            if tokens.len() != 1 {
                return grammar_error("trailing tokens after 'try'");
            }
        }
        Target::Var => {
            if tokens.len() < 4
                || !matches!(tokens.get(1), Some(Token::Ident(_)))
                || !matches!(tokens.get(2), Some(Token::Assign))
            {
                return grammar_error("expected 'var NAME = expression'");
            }
        }
        Target::Import | Target::Package => {
            if tokens.len() != 2 || !matches!(tokens.get(1), Some(Token::Ident(_))) {
                return grammar_error("expected a single name after keyword");
            }
        }
        Target::Throw => {
            if tokens.len() < 2 {
                return grammar_error("missing expression after 'throw'");
            }
        }
        Target::Exit | Target::Assign | Target::Expression | Target::None => {}
    }
    Ok(())
}

/// Execute a translation-time directive. `package NAME` declares the
/// compilation unit a package.
pub fn execute_jit(line: &TokenLine, ctx: &ContextRef) -> Result<()> {
    match (&line.tokens[0], &line.tokens[1]) {
        (Token::Package, Token::Ident(name)) => {
            if !ctx.package_name().is_empty() {
                return Err(Error::source(
                    line.line_num,
                    ctx.file_path(),
                    ctx.raw_code(line.line_num),
                    "duplicate package declaration",
                ));
            }
            ctx.set_package_name(name.clone());
            Ok(())
        }
        _ => unreachable!("preprocess validated the directive shape"),
    }
}

/// Translate a balanced token-line sequence into a statement list.
///
/// `import` lines register their resolved module path with the compiler so
/// a dependency dump can run without interpreting anything.
pub fn translate(
    lines: &[TokenLine],
    ctx: &ContextRef,
    compiler: &mut Compiler,
    import_path: &str,
) -> Result<Vec<Rc<Stmt>>> {
    let mut pos = 0;
    let stmts = translate_seq(lines, &mut pos, ctx, compiler, import_path)?;
    if pos < lines.len() {
        let line = &lines[pos];
        let msg = match match_line(line).target {
            Target::End => "Hanging end statement.",
            Target::Else => "unexpected 'else' outside of a block",
            Target::Catch => "unexpected 'catch' outside of a block",
            _ => "unexpected statement",
        };
        return Err(located(line, ctx, msg));
    }
    Ok(stmts)
}

/// Translate one line into a single statement. The REPL uses this directly
/// for non-block input.
pub fn translate_single(
    line: &TokenLine,
    ctx: &ContextRef,
    compiler: &mut Compiler,
    import_path: &str,
) -> Result<Rc<Stmt>> {
    let method = match_line(line);
    let tokens = &line.tokens;
    let kind = match method.target {
        Target::Var => {
            let constant = tokens[0] == Token::Constant;
            let name = expect_ident(&tokens[1]);
            let expr = parse_full_expr(&tokens[3..], line, ctx)?;
            if constant {
                compiler.note_constant(name.as_str());
            }
            StmtKind::Var {
                name,
                expr: compiler.fold(expr),
                constant,
            }
        }
        Target::Assign => {
            let name = expect_ident(&tokens[0]);
            let expr = parse_full_expr(&tokens[2..], line, ctx)?;
            StmtKind::Assign {
                name,
                expr: compiler.fold(expr),
            }
        }
        Target::Import => {
            let name = expect_ident(&tokens[1]);
            // Registration order is the dependency dump order. An
            // unresolved module is recorded under its bare name; the
            // failure itself surfaces at run time.
            match loader::resolve(import_path, &name) {
                Some(candidate) => {
                    compiler.add_module(candidate.path().to_string_lossy().into_owned())
                }
                None => compiler.add_module(name.as_str()),
            }
            StmtKind::Import { name }
        }
        Target::Throw => {
            let expr = parse_full_expr(&tokens[1..], line, ctx)?;
            StmtKind::Throw {
                expr: compiler.fold(expr),
            }
        }
        Target::Exit => {
            let expr = if tokens.len() > 1 {
                Some(compiler.fold(parse_full_expr(&tokens[1..], line, ctx)?))
            } else {
                None
            };
            StmtKind::Exit { expr }
        }
        Target::Expression => {
            let expr = parse_full_expr(tokens, line, ctx)?;
            StmtKind::Expression {
                expr: compiler.fold(expr),
            }
        }
        _ => return Err(located(line, ctx, "Null type of grammar.")),
    };
    Ok(Stmt::new(kind, line.line_num, ctx.clone()))
}

/// Translate statements until a block closer (`end`, `else`, `catch`) or
/// the end of input. The closer is left unconsumed for the caller.
fn translate_seq(
    lines: &[TokenLine],
    pos: &mut usize,
    ctx: &ContextRef,
    compiler: &mut Compiler,
    import_path: &str,
) -> Result<Vec<Rc<Stmt>>> {
    let mut stmts = Vec::new();
    while let Some(line) = lines.get(*pos) {
        let method = match_line(line);
        preprocess(method, line, ctx)?;
        match method.kind {
            MethodKind::Null => return Err(located(line, ctx, "Null type of grammar.")),
            MethodKind::JitCommand => {
                execute_jit(line, ctx)?;
                *pos += 1;
            }
            MethodKind::Single => match method.target {
                Target::End | Target::Else | Target::Catch => return Ok(stmts),
                _ => {
                    stmts.push(translate_single(line, ctx, compiler, import_path)?);
                    *pos += 1;
                }
            },
            MethodKind::Block => {
                stmts.push(translate_block(lines, pos, ctx, compiler, import_path)?);
            }
        }
    }
    Ok(stmts)
}

fn translate_block(
    lines: &[TokenLine],
    pos: &mut usize,
    ctx: &ContextRef,
    compiler: &mut Compiler,
    import_path: &str,
) -> Result<Rc<Stmt>> {
    let opener = &lines[*pos];
    let target = match_line(opener).target;
    *pos += 1;
    let kind = match target {
        Target::If => {
            let cond = parse_full_expr(&opener.tokens[1..], opener, ctx)?;
            let then_body =
                translate_seq(lines, pos, ctx, compiler, import_path)?;
            let else_body = match closer(lines, *pos, opener, ctx)? {
                Target::Else => {
                    *pos += 1;
                    let body =
                        translate_seq(lines, pos, ctx, compiler, import_path)?;
                    expect_end(lines, pos, opener, ctx)?;
                    body
                }
                _ => {
                    expect_end(lines, pos, opener, ctx)?;
                    Vec::new()
                }
            };
            StmtKind::If {
                cond: compiler.fold(cond),
                then_body,
                else_body,
            }
        }
        Target::While => {
            let cond = parse_full_expr(&opener.tokens[1..], opener, ctx)?;
            let body = translate_seq(lines, pos, ctx, compiler, import_path)?;
            expect_end(lines, pos, opener, ctx)?;
            StmtKind::While {
                cond: compiler.fold(cond),
                body,
            }
        }
        Target::Try => {
            let body =
                translate_seq(lines, pos, ctx, compiler, import_path)?;
            if closer(lines, *pos, opener, ctx)? != Target::Catch {
                return Err(located(opener, ctx, "missing catch branch in try block"));
            }
            let var = expect_ident(&lines[*pos].tokens[1]);
            *pos += 1;
            let catch_body =
                translate_seq(lines, pos, ctx, compiler, import_path)?;
            expect_end(lines, pos, opener, ctx)?;
            StmtKind::Try {
                body,
                var,
                catch_body,
            }
        }
        _ => unreachable!("only block targets reach translate_block"),
    };
    Ok(Stmt::new(kind, opener.line_num, ctx.clone()))
}

/// The terminator the sequence stopped at, or a missing-end error located
/// at the block opener.
fn closer(
    lines: &[TokenLine],
    pos: usize,
    opener: &TokenLine,
    ctx: &ContextRef,
) -> Result<Target> {
    match lines.get(pos) {
        Some(line) => Ok(match_line(line).target),
        None => Err(located(opener, ctx, "missing end of block")),
    }
}

fn expect_end(
    lines: &[TokenLine],
    pos: &mut usize,
    opener: &TokenLine,
    ctx: &ContextRef,
) -> Result<()> {
    if closer(lines, *pos, opener, ctx)? == Target::End {
        *pos += 1;
        Ok(())
    } else {
        Err(located(&lines[*pos], ctx, "unexpected statement in block"))
    }
}

fn located(line: &TokenLine, ctx: &ContextRef, msg: &str) -> Error {
    Error::source(
        line.line_num,
        ctx.file_path(),
        ctx.raw_code(line.line_num),
        msg,
    )
}

fn expect_ident(token: &Token) -> String {
    match token {
        Token::Ident(name) => name.clone(),
        other => unreachable!("preprocess guaranteed an identifier, got {other}"),
    }
}

// --- Expression parsing ---
//
// Precedence climbing over one token line:
//   or < and < equality < comparison < additive < multiplicative < unary
//   < postfix (member access, call) < primary

fn parse_full_expr(tokens: &[Token], line: &TokenLine, ctx: &ContextRef) -> Result<Expr> {
    let mut pos = 0;
    let expr = parse_expr(tokens, &mut pos)
        .map_err(|msg| located(line, ctx, &msg))?;
    if pos < tokens.len() {
        return Err(located(
            line,
            ctx,
            &format!("unexpected token '{}' after expression", tokens[pos]),
        ));
    }
    Ok(expr)
}

type ParseResult = std::result::Result<Expr, String>;

fn parse_expr(tokens: &[Token], pos: &mut usize) -> ParseResult {
    parse_or(tokens, pos)
}

fn parse_or(tokens: &[Token], pos: &mut usize) -> ParseResult {
    let mut lhs = parse_and(tokens, pos)?;
    while matches!(tokens.get(*pos), Some(Token::Or)) {
        *pos += 1;
        let rhs = parse_and(tokens, pos)?;
        lhs = binary(BinaryOp::Or, lhs, rhs);
    }
    Ok(lhs)
}

fn parse_and(tokens: &[Token], pos: &mut usize) -> ParseResult {
    let mut lhs = parse_equality(tokens, pos)?;
    while matches!(tokens.get(*pos), Some(Token::And)) {
        *pos += 1;
        let rhs = parse_equality(tokens, pos)?;
        lhs = binary(BinaryOp::And, lhs, rhs);
    }
    Ok(lhs)
}

fn parse_equality(tokens: &[Token], pos: &mut usize) -> ParseResult {
    let mut lhs = parse_comparison(tokens, pos)?;
    loop {
        let op = match tokens.get(*pos) {
            Some(Token::EqEq) => BinaryOp::Eq,
            Some(Token::Neq) => BinaryOp::Neq,
            _ => break,
        };
        *pos += 1;
        let rhs = parse_comparison(tokens, pos)?;
        lhs = binary(op, lhs, rhs);
    }
    Ok(lhs)
}

fn parse_comparison(tokens: &[Token], pos: &mut usize) -> ParseResult {
    let mut lhs = parse_additive(tokens, pos)?;
    loop {
        let op = match tokens.get(*pos) {
            Some(Token::Lt) => BinaryOp::Lt,
            Some(Token::Le) => BinaryOp::Le,
            Some(Token::Gt) => BinaryOp::Gt,
            Some(Token::Ge) => BinaryOp::Ge,
            _ => break,
        };
        *pos += 1;
        let rhs = parse_additive(tokens, pos)?;
        lhs = binary(op, lhs, rhs);
    }
    Ok(lhs)
}

fn parse_additive(tokens: &[Token], pos: &mut usize) -> ParseResult {
    let mut lhs = parse_multiplicative(tokens, pos)?;
    loop {
        let op = match tokens.get(*pos) {
            Some(Token::Plus) => BinaryOp::Add,
            Some(Token::Minus) => BinaryOp::Sub,
            _ => break,
        };
        *pos += 1;
        let rhs = parse_multiplicative(tokens, pos)?;
        lhs = binary(op, lhs, rhs);
    }
    Ok(lhs)
}

fn parse_multiplicative(tokens: &[Token], pos: &mut usize) -> ParseResult {
    let mut lhs = parse_unary(tokens, pos)?;
    loop {
        let op = match tokens.get(*pos) {
            Some(Token::Star) => BinaryOp::Mul,
            Some(Token::Slash) => BinaryOp::Div,
            Some(Token::Percent) => BinaryOp::Mod,
            _ => break,
        };
        *pos += 1;
        let rhs = parse_unary(tokens, pos)?;
        lhs = binary(op, lhs, rhs);
    }
    Ok(lhs)
}

fn parse_unary(tokens: &[Token], pos: &mut usize) -> ParseResult {
    let op = match tokens.get(*pos) {
        Some(Token::Minus) => Some(UnaryOp::Neg),
        Some(Token::Not) => Some(UnaryOp::Not),
        _ => None,
    };
    if let Some(op) = op {
        *pos += 1;
        let rhs = parse_unary(tokens, pos)?;
        return Ok(Expr::Unary {
            op,
            rhs: Box::new(rhs),
        });
    }
    parse_postfix(tokens, pos)
}

fn parse_postfix(tokens: &[Token], pos: &mut usize) -> ParseResult {
    let mut expr = parse_primary(tokens, pos)?;
    loop {
        match tokens.get(*pos) {
            Some(Token::Dot) => {
                *pos += 1;
                match tokens.get(*pos) {
                    Some(Token::Ident(field)) => {
                        *pos += 1;
                        expr = Expr::Member {
                            target: Box::new(expr),
                            field: field.clone(),
                        };
                    }
                    _ => return Err("expected a member name after '.'".to_string()),
                }
            }
            Some(Token::LParen) if matches!(expr, Expr::Ident(_)) => {
                let Expr::Ident(name) = expr else { unreachable!() };
                *pos += 1;
                let mut args = Vec::new();
                if !matches!(tokens.get(*pos), Some(Token::RParen)) {
                    loop {
                        args.push(parse_expr(tokens, pos)?);
                        match tokens.get(*pos) {
                            Some(Token::Comma) => *pos += 1,
                            Some(Token::RParen) => break,
                            _ => return Err("expected ',' or ')' in call".to_string()),
                        }
                    }
                }
                *pos += 1; // consume ')'
                expr = Expr::Call { name, args };
            }
            _ => break,
        }
    }
    Ok(expr)
}

fn parse_primary(tokens: &[Token], pos: &mut usize) -> ParseResult {
    let Some(token) = tokens.get(*pos) else {
        return Err("unexpected end of line in expression".to_string());
    };
    *pos += 1;
    match token {
        Token::Int(v) => Ok(Expr::Value(Value::Int(*v))),
        Token::Float(v) => Ok(Expr::Value(Value::Float(*v))),
        Token::Str(s) => Ok(Expr::Value(Value::Str(s.clone()))),
        Token::True => Ok(Expr::Value(Value::Bool(true))),
        Token::False => Ok(Expr::Value(Value::Bool(false))),
        Token::Null => Ok(Expr::Value(Value::Null)),
        Token::Ident(name) => Ok(Expr::Ident(name.clone())),
        Token::LParen => {
            let inner = parse_expr(tokens, pos)?;
            match tokens.get(*pos) {
                Some(Token::RParen) => {
                    *pos += 1;
                    Ok(inner)
                }
                _ => Err("missing ')' in expression".to_string()),
            }
        }
        other => Err(format!("unexpected token '{other}' in expression")),
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}
