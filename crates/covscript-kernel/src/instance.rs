//! The instance: one compilation unit and its runtime state.
//!
//! An instance owns its context, compiler state, storage, and the compiled
//! statement list. Imported modules become child instances on the `refers`
//! list, which keeps their exported scopes alive for as long as the
//! importer. Statement execution is strictly sequential; the interrupt flag
//! is polled before each top-level statement.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::ast::Value;
use crate::compiler::Compiler;
use crate::context::{Context, ContextRef};
use crate::error::{Error, Result};
use crate::loader::{self, Extension};
use crate::process;
use crate::statement::Stmt;
use crate::storage::Storage;
use crate::translator;

/// One compilation unit: context, compiled statements, runtime state.
#[derive(Debug)]
pub struct Instance {
    pub context: ContextRef,
    pub compiler: Compiler,
    pub storage: Storage,
    statements: Vec<Rc<Stmt>>,
    refers: Vec<Instance>,
    import_path: String,
    /// Canonical paths of packages currently being loaded, shared across
    /// the import tree for cycle detection.
    loading: Rc<RefCell<HashSet<PathBuf>>>,
}

impl Instance {
    /// Create an instance with the given search path and optimizer setting.
    pub fn new(import_path: impl Into<String>, disable_optimizer: bool) -> Self {
        Instance {
            context: Context::new(""),
            compiler: Compiler::new(disable_optimizer),
            storage: Storage::new(),
            statements: Vec::new(),
            refers: Vec::new(),
            import_path: import_path.into(),
            loading: Rc::new(RefCell::new(HashSet::new())),
        }
    }

    /// Create a child instance for an imported module. It shares the search
    /// path, optimizer setting, and in-progress load set.
    pub(crate) fn child(&self) -> Instance {
        Instance {
            context: Context::new(""),
            compiler: Compiler::new(self.compiler.disable_optimizer),
            storage: Storage::new(),
            statements: Vec::new(),
            refers: Vec::new(),
            import_path: self.import_path.clone(),
            loading: self.loading.clone(),
        }
    }

    /// The search path used for `import`.
    pub fn import_path(&self) -> &str {
        &self.import_path
    }

    /// Publish the command-line arguments as the constant global `args`.
    pub fn set_args(&mut self, args: Vec<String>) -> Result<()> {
        let values = args.into_iter().map(Value::Str).collect();
        self.storage.declare("args", Value::Array(values))?;
        self.compiler.note_constant("args");
        self.compiler.mark_constant();
        Ok(())
    }

    /// Read and compile a source file into the statement list.
    pub fn compile(&mut self, path: &str) -> Result<()> {
        self.context.set_file_path(path);
        let source = fs::read_to_string(path)
            .map_err(|_| Error::fatal(format!("{path}: No such file or directory")))?;
        let ast = self.compiler.build_ast(&source, &self.context)?;
        self.statements =
            translator::translate(&ast, &self.context, &mut self.compiler, &self.import_path)?;
        self.compiler.mark_constant();
        Ok(())
    }

    /// Execute the compiled statements in source order.
    ///
    /// Failures are wrapped with the location of the top-level statement
    /// that was executing; a script-level exception that reaches this
    /// boundary uncaught becomes a fatal error. Control variants (`Exit`,
    /// `Interrupt`) pass through unchanged.
    pub fn interpret(&mut self) -> Result<()> {
        let statements = self.statements.clone();
        for stmt in &statements {
            process::poll()?;
            stmt.run(self)
                .map_err(|e| e.locate(stmt.line_num(), stmt.file_path(), stmt.raw_code()))?;
        }
        Ok(())
    }

    /// Write the AST dump: a metadata header followed by each statement.
    pub fn dump_ast(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "< Covariant Script AST Dump >")?;
        writeln!(out, "< BeginMetaData >")?;
        writeln!(out, "< Version: {} >", process::VERSION)?;
        writeln!(out, "< STD Version: {} >", process::STD_VERSION)?;
        writeln!(out, "< Output Precision: {} >", process::OUTPUT_PRECISION)?;
        writeln!(out, "< Import Path: \"{}\" >", self.import_path)?;
        writeln!(out, "< Platform: {} >", process::PLATFORM)?;
        writeln!(out, "< EndMetaData >")?;
        for stmt in &self.statements {
            stmt.dump(out, 0)?;
        }
        out.flush()
    }

    /// Resolve and load a module along the search path.
    pub fn import(&mut self, name: &str) -> Result<Extension> {
        loader::import(self, name)
    }

    /// The compiled statement list.
    pub fn statements(&self) -> &[Rc<Stmt>] {
        &self.statements
    }

    /// Number of imported child instances kept alive.
    pub fn refer_count(&self) -> usize {
        self.refers.len()
    }

    pub(crate) fn add_refer(&mut self, child: Instance) {
        self.refers.push(child);
    }

    /// Mark a package load as in progress. Returns false if it already is,
    /// which means the import graph has a cycle.
    pub(crate) fn begin_loading(&self, path: &Path) -> bool {
        self.loading.borrow_mut().insert(path.to_path_buf())
    }

    pub(crate) fn finish_loading(&self, path: &Path) {
        self.loading.borrow_mut().remove(path);
    }
}
