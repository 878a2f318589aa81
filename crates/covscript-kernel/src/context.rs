//! Compilation context shared between an instance and its statements.
//!
//! A `Context` groups the identity of one compilation unit: the file path,
//! the package name (empty unless the unit declares itself a package), and
//! the buffered raw source lines that statements read back for error
//! reporting. Statements hold a non-owning `Rc` back-reference; the owning
//! instance keeps it alive, and imported children stay on the importer's
//! `refers` list for the same reason.

use std::cell::RefCell;
use std::rc::Rc;

/// Shared handle to a compilation context.
pub type ContextRef = Rc<Context>;

/// Per-compilation shared state.
#[derive(Debug, Default)]
pub struct Context {
    file_path: RefCell<String>,
    package_name: RefCell<String>,
    file_buff: RefCell<Vec<String>>,
}

impl Context {
    /// Create a context for the given compilation unit path.
    pub fn new(file_path: impl Into<String>) -> ContextRef {
        Rc::new(Context {
            file_path: RefCell::new(file_path.into()),
            package_name: RefCell::new(String::new()),
            file_buff: RefCell::new(Vec::new()),
        })
    }

    pub fn file_path(&self) -> String {
        self.file_path.borrow().clone()
    }

    pub fn set_file_path(&self, path: impl Into<String>) {
        *self.file_path.borrow_mut() = path.into();
    }

    pub fn package_name(&self) -> String {
        self.package_name.borrow().clone()
    }

    pub fn set_package_name(&self, name: impl Into<String>) {
        *self.package_name.borrow_mut() = name.into();
    }

    /// Append one raw source line to the buffer.
    pub fn push_line(&self, line: impl Into<String>) {
        self.file_buff.borrow_mut().push(line.into());
    }

    /// Append an empty placeholder slot (comments, directives, multi-line
    /// accumulation).
    pub fn push_empty_line(&self) {
        self.file_buff.borrow_mut().push(String::new());
    }

    /// Number of buffered lines.
    pub fn line_count(&self) -> usize {
        self.file_buff.borrow().len()
    }

    /// The raw source text at a 1-based line number, or empty if out of
    /// range.
    pub fn raw_code(&self, line_num: usize) -> String {
        self.file_buff
            .borrow()
            .get(line_num.wrapping_sub(1))
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_code_is_one_indexed() {
        let ctx = Context::new("a.csp");
        ctx.push_line("var x = 1");
        ctx.push_line("x + 1");
        assert_eq!(ctx.raw_code(1), "var x = 1");
        assert_eq!(ctx.raw_code(2), "x + 1");
        assert_eq!(ctx.raw_code(3), "");
        assert_eq!(ctx.raw_code(0), "");
    }

    #[test]
    fn package_name_starts_empty() {
        let ctx = Context::new("a.csp");
        assert!(ctx.package_name().is_empty());
        ctx.set_package_name("math");
        assert_eq!(ctx.package_name(), "math");
    }
}
