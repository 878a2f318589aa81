//! Lexer for Covariant Script source code.
//!
//! Converts source text into tokens using the logos lexer generator. The
//! grammar is line-oriented: `build_line` tokenizes one source line, and
//! `build_ast` tokenizes a whole buffer into token lines while recording
//! every raw line into the context's file buffer for later error reporting.

use std::fmt;

use logos::Logos;

use crate::context::ContextRef;
use crate::error::{Error, Result};

/// Lexer error types.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LexError {
    #[default]
    UnexpectedCharacter,
    InvalidNumber,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::UnexpectedCharacter => write!(f, "unexpected character"),
            LexError::InvalidNumber => write!(f, "invalid number literal"),
        }
    }
}

/// Unescape the body of a quoted string literal.
fn unescape(slice: &str) -> String {
    let body = &slice[1..slice.len() - 1];
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

/// Tokens produced by the lexer.
///
/// Keywords come before `Ident` so logos gives them priority. Value-carrying
/// tokens (identifiers, literals) include the parsed value directly.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(error = LexError)]
#[logos(skip r"[ \t\r]+")]
#[logos(skip r"#[^\n]*")]
pub enum Token {
    // Keywords
    #[token("package")]
    Package,
    #[token("import")]
    Import,
    #[token("var")]
    Var,
    #[token("constant")]
    Constant,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("try")]
    Try,
    #[token("catch")]
    Catch,
    #[token("throw")]
    Throw,
    #[token("exit")]
    Exit,
    #[token("end")]
    End,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,
    #[token("null")]
    Null,
    #[token("true")]
    True,
    #[token("false")]
    False,

    // Multi-character operators before their single-character prefixes
    #[token("==")]
    EqEq,
    #[token("!=")]
    Neq,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,

    // Single-character operators and punctuation
    #[token("=")]
    Assign,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,

    // Literals and identifiers
    #[regex(r"[0-9]+\.[0-9]+", |lex| lex.slice().parse::<f64>().map_err(|_| LexError::InvalidNumber))]
    Float(f64),
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().map_err(|_| LexError::InvalidNumber))]
    Int(i64),
    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| unescape(lex.slice()))]
    Str(String),
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Package => write!(f, "package"),
            Token::Import => write!(f, "import"),
            Token::Var => write!(f, "var"),
            Token::Constant => write!(f, "constant"),
            Token::If => write!(f, "if"),
            Token::Else => write!(f, "else"),
            Token::While => write!(f, "while"),
            Token::Try => write!(f, "try"),
            Token::Catch => write!(f, "catch"),
            Token::Throw => write!(f, "throw"),
            Token::Exit => write!(f, "exit"),
            Token::End => write!(f, "end"),
            Token::And => write!(f, "and"),
            Token::Or => write!(f, "or"),
            Token::Not => write!(f, "not"),
            Token::Null => write!(f, "null"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::EqEq => write!(f, "=="),
            Token::Neq => write!(f, "!="),
            Token::Le => write!(f, "<="),
            Token::Ge => write!(f, ">="),
            Token::Assign => write!(f, "="),
            Token::Lt => write!(f, "<"),
            Token::Gt => write!(f, ">"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::Dot => write!(f, "."),
            Token::Float(v) => write!(f, "{v}"),
            Token::Int(v) => write!(f, "{v}"),
            Token::Str(s) => write!(f, "{s:?}"),
            Token::Ident(name) => write!(f, "{name}"),
        }
    }
}

/// One tokenized source line.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenLine {
    pub tokens: Vec<Token>,
    pub line_num: usize,
}

/// Tokenize a single source line.
///
/// Lex failures are recoverable errors; callers wrap them with the source
/// location at the boundary where the line number is known.
pub fn build_line(code: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    for item in Token::lexer(code) {
        match item {
            Ok(token) => tokens.push(token),
            Err(e) => return Err(Error::runtime(format!("lex error: {e}"))),
        }
    }
    Ok(tokens)
}

/// Tokenize a whole source buffer into token lines.
///
/// Every raw line lands in the context's file buffer, so the buffer size
/// after a successful build equals the number of source lines read. Blank
/// and comment-only lines occupy a buffer slot but produce no token line.
pub fn build_ast(source: &str, ctx: &ContextRef) -> Result<Vec<TokenLine>> {
    let mut ast = Vec::new();
    for (idx, raw) in source.lines().enumerate() {
        let line_num = idx + 1;
        ctx.push_line(raw);
        let tokens = build_line(raw)
            .map_err(|e| e.locate(line_num, ctx.file_path(), raw.to_string()))?;
        if !tokens.is_empty() {
            ast.push(TokenLine { tokens, line_num });
        }
    }
    Ok(ast)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;

    #[test]
    fn keywords_win_over_idents() {
        let tokens = build_line("var x = import_name").unwrap();
        assert_eq!(tokens[0], Token::Var);
        assert_eq!(tokens[1], Token::Ident("x".into()));
        assert_eq!(tokens[2], Token::Assign);
        assert_eq!(tokens[3], Token::Ident("import_name".into()));
    }

    #[test]
    fn string_escapes() {
        let tokens = build_line(r#"var s = "a\tb\n""#).unwrap();
        assert_eq!(tokens[3], Token::Str("a\tb\n".into()));
    }

    #[test]
    fn comments_are_skipped() {
        assert!(build_line("# nothing here").unwrap().is_empty());
        let tokens = build_line("x + 1 # trailing").unwrap();
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn lex_failure_is_recoverable() {
        match build_line("var x = `") {
            Err(Error::Runtime(msg)) => assert!(msg.contains("lex error")),
            other => panic!("expected runtime error, got {other:?}"),
        }
    }

    #[test]
    fn build_ast_fills_file_buff() {
        let ctx = Context::new("test.csp");
        let ast = build_ast("var x = 1\n\n# comment\nx + 1\n", &ctx).unwrap();
        assert_eq!(ctx.line_count(), 4);
        assert_eq!(ast.len(), 2);
        assert_eq!(ast[0].line_num, 1);
        assert_eq!(ast[1].line_num, 4);
        assert_eq!(ctx.raw_code(3), "# comment");
    }

    #[test]
    fn build_ast_locates_lex_errors() {
        let ctx = Context::new("test.csp");
        match build_ast("var x = 1\nvar y = `\n", &ctx) {
            Err(Error::Source(s)) => {
                assert_eq!(s.line_num, 2);
                assert_eq!(s.file_path, "test.csp");
                assert_eq!(s.code, "var y = `");
            }
            other => panic!("expected source error, got {other:?}"),
        }
    }
}
