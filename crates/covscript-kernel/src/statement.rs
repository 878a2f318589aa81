//! Executable statements.
//!
//! A statement is the unit the translator produces and the instance runs.
//! Each carries its 1-based line number and a shared back-reference to its
//! compilation context, which is how error wrapping recovers the file path
//! and raw source text. Statements execute strictly in source order.

use std::io::{self, Write};
use std::rc::Rc;

use crate::ast::{Expr, Value};
use crate::context::ContextRef;
use crate::error::{Error, Result};
use crate::eval::eval;
use crate::instance::Instance;
use crate::process;

/// An executable statement handle.
#[derive(Debug)]
pub struct Stmt {
    pub kind: StmtKind,
    line_num: usize,
    ctx: ContextRef,
}

/// Statement forms.
#[derive(Debug)]
pub enum StmtKind {
    /// `var NAME = expr` / `constant NAME = expr`
    Var {
        name: String,
        expr: Expr,
        constant: bool,
    },
    /// `NAME = expr`
    Assign { name: String, expr: Expr },
    /// A bare expression.
    Expression { expr: Expr },
    /// `import NAME`
    Import { name: String },
    /// `throw expr`
    Throw { expr: Expr },
    /// `exit` / `exit expr`
    Exit { expr: Option<Expr> },
    /// `if cond … else … end`
    If {
        cond: Expr,
        then_body: Vec<Rc<Stmt>>,
        else_body: Vec<Rc<Stmt>>,
    },
    /// `while cond … end`
    While { cond: Expr, body: Vec<Rc<Stmt>> },
    /// `try … catch e … end`
    Try {
        body: Vec<Rc<Stmt>>,
        var: String,
        catch_body: Vec<Rc<Stmt>>,
    },
}

impl Stmt {
    pub fn new(kind: StmtKind, line_num: usize, ctx: ContextRef) -> Rc<Self> {
        Rc::new(Stmt {
            kind,
            line_num,
            ctx,
        })
    }

    pub fn line_num(&self) -> usize {
        self.line_num
    }

    pub fn file_path(&self) -> String {
        self.ctx.file_path()
    }

    pub fn package_name(&self) -> String {
        self.ctx.package_name()
    }

    /// The raw source line this statement was translated from.
    pub fn raw_code(&self) -> String {
        self.ctx.raw_code(self.line_num)
    }

    /// Execute this statement.
    pub fn run(&self, inst: &mut Instance) -> Result<()> {
        self.execute(inst, false)
    }

    /// Execute in interactive mode: a non-null expression result is echoed.
    pub fn repl_run(&self, inst: &mut Instance) -> Result<()> {
        self.execute(inst, true)
    }

    fn execute(&self, inst: &mut Instance, interactive: bool) -> Result<()> {
        match &self.kind {
            StmtKind::Var { name, expr, .. } => {
                let value = eval(expr, &inst.storage)?;
                inst.storage.declare(name, value)
            }
            StmtKind::Assign { name, expr } => {
                if inst.compiler.is_constant(name) {
                    return Err(Error::runtime(format!(
                        "assignment to constant '{name}'"
                    )));
                }
                let value = eval(expr, &inst.storage)?;
                inst.storage.assign(name, value)
            }
            StmtKind::Expression { expr } => {
                let value = eval(expr, &inst.storage)?;
                if interactive && value != Value::Null {
                    println!("{value}");
                }
                Ok(())
            }
            StmtKind::Import { name } => {
                let extension = inst.import(name)?;
                inst.storage.declare(name, Value::Extension(extension))
            }
            StmtKind::Throw { expr } => {
                let value = eval(expr, &inst.storage)?;
                Err(Error::lang(value.to_string()))
            }
            StmtKind::Exit { expr } => {
                let code = match expr {
                    None => 0,
                    Some(expr) => match eval(expr, &inst.storage)? {
                        Value::Int(code) => code as i32,
                        other => {
                            return Err(Error::runtime(format!(
                                "exit code must be an integer, got '{}'",
                                other.type_name()
                            )))
                        }
                    },
                };
                Err(Error::Exit(code))
            }
            StmtKind::If {
                cond,
                then_body,
                else_body,
            } => {
                let branch = if eval(cond, &inst.storage)?.is_truthy() {
                    then_body
                } else {
                    else_body
                };
                run_scoped(inst, branch)
            }
            StmtKind::While { cond, body } => {
                loop {
                    process::poll()?;
                    if !eval(cond, &inst.storage)?.is_truthy() {
                        break;
                    }
                    run_scoped(inst, body)?;
                }
                Ok(())
            }
            StmtKind::Try {
                body,
                var,
                catch_body,
            } => {
                let caught = match run_scoped(inst, body) {
                    Ok(()) => return Ok(()),
                    Err(Error::Lang(msg) | Error::Runtime(msg)) => msg,
                    Err(other) => return Err(other),
                };
                inst.storage.add_domain();
                inst.storage.add_set();
                let result = inst
                    .storage
                    .declare(var, Value::Str(caught))
                    .and_then(|_| run_body(inst, catch_body));
                inst.storage.remove_set();
                inst.storage.remove_domain();
                result
            }
        }
    }

    /// Write a line-oriented textual dump of this statement.
    pub fn dump(&self, out: &mut dyn Write, depth: usize) -> io::Result<()> {
        let pad = "  ".repeat(depth);
        match &self.kind {
            StmtKind::Var {
                name,
                expr,
                constant,
            } => writeln!(
                out,
                "{pad}< Statement: Var, Line: {}, Constant: {constant}, Name: \"{name}\", Expr: {expr} >",
                self.line_num
            ),
            StmtKind::Assign { name, expr } => writeln!(
                out,
                "{pad}< Statement: Assign, Line: {}, Name: \"{name}\", Expr: {expr} >",
                self.line_num
            ),
            StmtKind::Expression { expr } => writeln!(
                out,
                "{pad}< Statement: Expression, Line: {}, Expr: {expr} >",
                self.line_num
            ),
            StmtKind::Import { name } => writeln!(
                out,
                "{pad}< Statement: Import, Line: {}, Module: \"{name}\" >",
                self.line_num
            ),
            StmtKind::Throw { expr } => writeln!(
                out,
                "{pad}< Statement: Throw, Line: {}, Expr: {expr} >",
                self.line_num
            ),
            StmtKind::Exit { expr } => match expr {
                Some(expr) => writeln!(
                    out,
                    "{pad}< Statement: Exit, Line: {}, Expr: {expr} >",
                    self.line_num
                ),
                None => writeln!(out, "{pad}< Statement: Exit, Line: {} >", self.line_num),
            },
            StmtKind::If {
                cond,
                then_body,
                else_body,
            } => {
                writeln!(
                    out,
                    "{pad}< Statement: If, Line: {}, Cond: {cond} >",
                    self.line_num
                )?;
                for stmt in then_body {
                    stmt.dump(out, depth + 1)?;
                }
                if !else_body.is_empty() {
                    writeln!(out, "{pad}< Else >")?;
                    for stmt in else_body {
                        stmt.dump(out, depth + 1)?;
                    }
                }
                writeln!(out, "{pad}< EndStatement: If >")
            }
            StmtKind::While { cond, body } => {
                writeln!(
                    out,
                    "{pad}< Statement: While, Line: {}, Cond: {cond} >",
                    self.line_num
                )?;
                for stmt in body {
                    stmt.dump(out, depth + 1)?;
                }
                writeln!(out, "{pad}< EndStatement: While >")
            }
            StmtKind::Try {
                body,
                var,
                catch_body,
            } => {
                writeln!(out, "{pad}< Statement: Try, Line: {} >", self.line_num)?;
                for stmt in body {
                    stmt.dump(out, depth + 1)?;
                }
                writeln!(out, "{pad}< Catch: \"{var}\" >")?;
                for stmt in catch_body {
                    stmt.dump(out, depth + 1)?;
                }
                writeln!(out, "{pad}< EndStatement: Try >")
            }
        }
    }
}

/// Run a statement sequence with an interrupt poll before each statement.
///
/// Errors propagate raw; location wrapping happens once, at the interpreter
/// boundary, so `try` still observes the underlying error kind.
pub fn run_body(inst: &mut Instance, body: &[Rc<Stmt>]) -> Result<()> {
    for stmt in body {
        process::poll()?;
        stmt.run(inst)?;
    }
    Ok(())
}

/// Run a block body inside its own domain and declaration set.
fn run_scoped(inst: &mut Instance, body: &[Rc<Stmt>]) -> Result<()> {
    inst.storage.add_domain();
    inst.storage.add_set();
    let result = run_body(inst, body);
    inst.storage.remove_set();
    inst.storage.remove_domain();
    result
}
