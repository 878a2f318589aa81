//! Compiler state: lexing entry points, constant marking, optimizer flag,
//! and the registered module list used for dependency dumps.

use std::collections::HashSet;

use crate::ast::Expr;
use crate::context::ContextRef;
use crate::error::Result;
use crate::eval::eval_const;
use crate::lexer::{self, Token, TokenLine};

/// Per-instance compiler state.
#[derive(Debug, Default)]
pub struct Compiler {
    /// Disables constant folding when set.
    pub disable_optimizer: bool,
    /// Module paths in registration order, deduplicated.
    modules: Vec<String>,
    /// Constant names visible to subsequent lines.
    constants: HashSet<String>,
    /// Constants declared since the last `mark_constant` call.
    pending: Vec<String>,
}

impl Compiler {
    pub fn new(disable_optimizer: bool) -> Self {
        Compiler {
            disable_optimizer,
            ..Compiler::default()
        }
    }

    /// Tokenize a single line of source.
    pub fn build_line(&self, code: &str) -> Result<Vec<Token>> {
        lexer::build_line(code)
    }

    /// Tokenize a whole buffer, recording raw lines into the context.
    pub fn build_ast(&self, source: &str, ctx: &ContextRef) -> Result<Vec<TokenLine>> {
        lexer::build_ast(source, ctx)
    }

    /// Register an imported module path. First registration wins.
    pub fn add_module(&mut self, path: impl Into<String>) {
        let path = path.into();
        if !self.modules.iter().any(|m| *m == path) {
            self.modules.push(path);
        }
    }

    /// Registered module paths in registration order.
    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    /// Note a constant declaration. It becomes visible at the next
    /// `mark_constant` call.
    pub fn note_constant(&mut self, name: impl Into<String>) {
        self.pending.push(name.into());
    }

    /// Commit pending constants so subsequent input observes them.
    pub fn mark_constant(&mut self) {
        for name in self.pending.drain(..) {
            self.constants.insert(name);
        }
    }

    /// Whether a name has been committed as a constant.
    pub fn is_constant(&self, name: &str) -> bool {
        self.constants.contains(name)
    }

    /// Fold constant subtrees of an expression, unless the optimizer is
    /// disabled.
    pub fn fold(&self, expr: Expr) -> Expr {
        if self.disable_optimizer {
            return expr;
        }
        fold_expr(expr)
    }
}

fn fold_expr(expr: Expr) -> Expr {
    if let Some(value) = eval_const(&expr) {
        return Expr::Value(value);
    }
    match expr {
        Expr::Unary { op, rhs } => Expr::Unary {
            op,
            rhs: Box::new(fold_expr(*rhs)),
        },
        Expr::Binary { op, lhs, rhs } => Expr::Binary {
            op,
            lhs: Box::new(fold_expr(*lhs)),
            rhs: Box::new(fold_expr(*rhs)),
        },
        Expr::Member { target, field } => Expr::Member {
            target: Box::new(fold_expr(*target)),
            field,
        },
        Expr::Call { name, args } => Expr::Call {
            name,
            args: args.into_iter().map(fold_expr).collect(),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, Value};

    #[test]
    fn constants_become_visible_after_marking() {
        let mut compiler = Compiler::new(false);
        compiler.note_constant("pi");
        assert!(!compiler.is_constant("pi"));
        compiler.mark_constant();
        assert!(compiler.is_constant("pi"));
    }

    #[test]
    fn modules_register_once_in_order() {
        let mut compiler = Compiler::new(false);
        compiler.add_module("./a/math.csp");
        compiler.add_module("./b/text.cse");
        compiler.add_module("./a/math.csp");
        assert_eq!(compiler.modules(), ["./a/math.csp", "./b/text.cse"]);
    }

    #[test]
    fn folding_respects_the_optimizer_flag() {
        let expr = Expr::Binary {
            op: BinaryOp::Add,
            lhs: Box::new(Expr::Value(Value::Int(1))),
            rhs: Box::new(Expr::Value(Value::Int(2))),
        };
        let optimizing = Compiler::new(false);
        assert_eq!(optimizing.fold(expr.clone()), Expr::Value(Value::Int(3)));
        let disabled = Compiler::new(true);
        assert_eq!(disabled.fold(expr.clone()), expr);
    }

    #[test]
    fn folding_reaches_into_mixed_trees() {
        // x + (2 * 3) folds the literal half only.
        let expr = Expr::Binary {
            op: BinaryOp::Add,
            lhs: Box::new(Expr::Ident("x".into())),
            rhs: Box::new(Expr::Binary {
                op: BinaryOp::Mul,
                lhs: Box::new(Expr::Value(Value::Int(2))),
                rhs: Box::new(Expr::Value(Value::Int(3))),
            }),
        };
        let compiler = Compiler::new(false);
        match compiler.fold(expr) {
            Expr::Binary { rhs, .. } => assert_eq!(*rhs, Expr::Value(Value::Int(6))),
            other => panic!("expected binary, got {other:?}"),
        }
    }
}
