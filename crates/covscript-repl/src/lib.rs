//! Interactive line assembly for Covariant Script.
//!
//! The REPL accepts input one line at a time and keeps grammar state
//! across lines:
//!
//! - a pre-pass scanner classifies each line (comment, `@` directive,
//!   ordinary code),
//! - `@begin` / `@end` wrap a multi-line unit that is submitted as one run,
//! - block openers raise the nesting level and accumulate token lines until
//!   the matching `end` closes the outermost block, which is then
//!   translated and executed as a whole.
//!
//! Any error resets the assembly state (and pops the storage scopes of an
//! abandoned block), so the next well-formed input starts clean.

use covscript_kernel::error::{Error, Result};
use covscript_kernel::instance::Instance;
use covscript_kernel::lexer::TokenLine;
use covscript_kernel::statement::Stmt;
use covscript_kernel::translator::{self, Method, MethodKind, Target};

use std::rc::Rc;

/// The REPL line-assembly state machine.
pub struct Repl {
    instance: Instance,
    level: usize,
    method: Option<Method>,
    tmp: Vec<TokenLine>,
    multi_line: bool,
    line_buff: String,
    cmd_buff: String,
    line_num: usize,
    base_depth: usize,
}

impl Repl {
    /// Wrap an instance for interactive use.
    pub fn new(instance: Instance) -> Self {
        let base_depth = instance.storage.depth();
        Repl {
            instance,
            level: 0,
            method: None,
            tmp: Vec::new(),
            multi_line: false,
            line_buff: String::new(),
            cmd_buff: String::new(),
            line_num: 0,
            base_depth,
        }
    }

    /// Current block nesting depth. Drives the prompt.
    pub fn level(&self) -> usize {
        self.level
    }

    /// Whether a `@begin` multi-line unit is open.
    pub fn is_multi_line(&self) -> bool {
        self.multi_line
    }

    /// Whether a block method is being assembled.
    pub fn has_method(&self) -> bool {
        self.method.is_some()
    }

    /// Token lines accumulated for the open block.
    pub fn pending_lines(&self) -> usize {
        self.tmp.len()
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn instance_mut(&mut self) -> &mut Instance {
        &mut self.instance
    }

    /// Clear all assembly state and restore the storage to its base depth,
    /// abandoning any partially assembled block.
    pub fn reset_status(&mut self) {
        self.level = 0;
        self.method = None;
        self.tmp.clear();
        self.multi_line = false;
        self.line_buff.clear();
        self.cmd_buff.clear();
        self.instance.storage.shrink_to(self.base_depth);
    }

    /// Feed one input line into the REPL.
    ///
    /// On error the assembly state has already been reset; the session
    /// stays usable.
    pub fn exec(&mut self, code: &str) -> Result<()> {
        let result = self.exec_inner(code);
        if result.is_err() {
            self.reset_status();
        }
        result
    }

    fn exec_inner(&mut self, code: &str) -> Result<()> {
        self.line_num += 1;
        // Pre-pass scanner: 0 = leading whitespace, 1 = directive, -1 = code.
        let mut mode = 0i8;
        for ch in code.chars() {
            match mode {
                0 => {
                    if !ch.is_whitespace() {
                        match ch {
                            '#' => {
                                self.instance.context.push_empty_line();
                                return Ok(());
                            }
                            '@' => mode = 1,
                            _ => mode = -1,
                        }
                    }
                }
                1 => {
                    if !ch.is_whitespace() {
                        self.cmd_buff.push(ch);
                    }
                }
                _ => break,
            }
        }
        match mode {
            0 => {
                // Blank line: occupies a buffer slot like a comment.
                self.instance.context.push_empty_line();
                return Ok(());
            }
            1 => {
                let result = if self.cmd_buff == "begin" && !self.multi_line {
                    self.multi_line = true;
                    self.instance.context.push_empty_line();
                    Ok(())
                } else if self.cmd_buff == "end" && self.multi_line {
                    self.multi_line = false;
                    let buff = std::mem::take(&mut self.line_buff);
                    self.run(&buff)
                } else {
                    Err(Error::source(
                        self.line_num,
                        self.instance.context.file_path(),
                        self.cmd_buff.clone(),
                        "Wrong grammar for preprocessor command.",
                    ))
                };
                self.cmd_buff.clear();
                return result;
            }
            _ => {}
        }
        if self.multi_line {
            self.instance.context.push_empty_line();
            self.line_buff.push_str(code);
            Ok(())
        } else {
            self.instance.context.push_line(code);
            self.run(code)
        }
    }

    /// Tokenize, match, and dispatch one assembled line of code.
    fn run(&mut self, code: &str) -> Result<()> {
        if code.is_empty() {
            return Ok(());
        }
        self.run_inner(code).map_err(|e| {
            e.locate(
                self.line_num,
                self.instance.context.file_path(),
                code.to_string(),
            )
        })?;
        // Constants declared by this line become visible to the next one.
        self.instance.compiler.mark_constant();
        Ok(())
    }

    fn run_inner(&mut self, code: &str) -> Result<()> {
        let import_path = self.instance.import_path().to_string();
        let tokens = self.instance.compiler.build_line(code)?;
        let line = TokenLine {
            tokens,
            line_num: self.line_num,
        };
        let method = translator::match_line(&line);
        let mut statement: Option<Rc<Stmt>> = None;
        match method.kind {
            MethodKind::Null => return Err(Error::runtime("Null type of grammar.")),
            MethodKind::Single => {
                if self.level > 0 {
                    if method.target == Target::End {
                        self.instance.storage.remove_set();
                        self.instance.storage.remove_domain();
                        self.level -= 1;
                    }
                    if self.level == 0 {
                        // The outermost block just closed: translate the
                        // accumulated lines as one unit.
                        self.tmp.push(line);
                        let tmp = std::mem::take(&mut self.tmp);
                        self.method = None;
                        let stmts = translator::translate(
                            &tmp,
                            &self.instance.context,
                            &mut self.instance.compiler,
                            &import_path,
                        )?;
                        statement = stmts.into_iter().next();
                    } else {
                        translator::preprocess(method, &line, &self.instance.context)?;
                        self.tmp.push(line);
                    }
                } else if method.target == Target::End {
                    return Err(Error::runtime("Hanging end statement."));
                } else {
                    translator::preprocess(method, &line, &self.instance.context)?;
                    statement = Some(translator::translate_single(
                        &line,
                        &self.instance.context,
                        &mut self.instance.compiler,
                        &import_path,
                    )?);
                }
            }
            MethodKind::Block => {
                if self.level == 0 {
                    self.method = Some(method);
                }
                self.level += 1;
                self.instance.storage.add_domain();
                self.instance.storage.add_set();
                translator::preprocess(method, &line, &self.instance.context)?;
                self.tmp.push(line);
            }
            MethodKind::JitCommand => {
                translator::preprocess(method, &line, &self.instance.context)?;
                translator::execute_jit(&line, &self.instance.context)?;
            }
        }
        if let Some(stmt) = statement {
            stmt.repl_run(&mut self.instance)?;
        }
        Ok(())
    }
}
