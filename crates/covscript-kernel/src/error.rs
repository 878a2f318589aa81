//! Error types for the Covariant Script kernel.
//!
//! One sum type covers the whole taxonomy:
//!
//! - **Fatal**: unrecoverable at the current call site (bad arguments,
//!   missing input file, exhausted import candidates).
//! - **Lang**: a script-level exception (`throw`). Catchable by `try`;
//!   escaping the interpreter turns it into a fatal "Uncaught exception".
//! - **Runtime**: an engine-raised recoverable error. Wrapped with the
//!   location of the executing statement at the interpreter boundary.
//! - **Source**: the wrapping envelope — `(line, file, raw code, message)`.
//!   Already-wrapped errors propagate unchanged.
//! - **Exit** / **Interrupt**: typed control-flow variants for process exit
//!   and SIGINT. The driver matches on these by variant, never by message.

use std::fmt;

use thiserror::Error;

/// Result type used throughout the kernel.
pub type Result<T> = std::result::Result<T, Error>;

/// A low-level failure wrapped with the source location it surfaced at.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceError {
    /// 1-based line number of the statement or input line.
    pub line_num: usize,
    /// Path of the compilation unit (`<REPL_ENV>` in interactive mode).
    pub file_path: String,
    /// The raw source text of the offending line.
    pub code: String,
    /// The underlying message.
    pub message: String,
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "File \"{}\", line {}: {}\n> {}",
            self.file_path, self.line_num, self.message, self.code
        )
    }
}

/// Kernel error sum type.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Error {
    /// Unrecoverable failure.
    #[error("{0}")]
    Fatal(String),
    /// Script-thrown exception, catchable by `try`.
    #[error("{0}")]
    Lang(String),
    /// Engine-raised recoverable error, pending location wrapping.
    #[error("{0}")]
    Runtime(String),
    /// A failure wrapped with its source location.
    #[error("{0}")]
    Source(Box<SourceError>),
    /// Process exit requested with the given code.
    #[error("process exit with code {0}")]
    Exit(i32),
    /// SIGINT observed at a poll point.
    #[error("keyboard interrupt")]
    Interrupt,
}

impl Error {
    /// Shorthand for a fatal error.
    pub fn fatal(msg: impl Into<String>) -> Self {
        Error::Fatal(msg.into())
    }

    /// Shorthand for a script-level exception.
    pub fn lang(msg: impl Into<String>) -> Self {
        Error::Lang(msg.into())
    }

    /// Shorthand for an engine-raised recoverable error.
    pub fn runtime(msg: impl Into<String>) -> Self {
        Error::Runtime(msg.into())
    }

    /// Build an already-located error.
    pub fn source(
        line_num: usize,
        file_path: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Source(Box::new(SourceError {
            line_num,
            file_path: file_path.into(),
            code: code.into(),
            message: message.into(),
        }))
    }

    /// Wrap this error with a source location, following the interpreter's
    /// boundary rules: a language-level escape becomes a fatal uncaught
    /// exception, already-wrapped and control-flow errors pass through
    /// unchanged, everything else gains the location envelope.
    pub fn locate(self, line_num: usize, file_path: String, code: String) -> Self {
        match self {
            Error::Lang(msg) => Error::Fatal(format!("Uncaught exception: {msg}")),
            e @ (Error::Source(_) | Error::Exit(_) | Error::Interrupt) => e,
            Error::Runtime(msg) | Error::Fatal(msg) => {
                Error::source(line_num, file_path, code, msg)
            }
        }
    }

    /// The inner message, without any location rendering.
    pub fn message(&self) -> String {
        match self {
            Error::Fatal(m) | Error::Lang(m) | Error::Runtime(m) => m.clone(),
            Error::Source(s) => s.message.clone(),
            Error::Exit(code) => format!("process exit with code {code}"),
            Error::Interrupt => "keyboard interrupt".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_error_renders_location() {
        let err = Error::source(3, "test.csp", "var x = ", "unexpected end of line");
        let text = err.to_string();
        assert!(text.contains("File \"test.csp\", line 3"));
        assert!(text.contains("unexpected end of line"));
        assert!(text.contains("> var x = "));
    }

    #[test]
    fn locate_wraps_runtime_errors() {
        let err = Error::runtime("undefined variable 'x'");
        match err.locate(7, "a.csp".into(), "x + 1".into()) {
            Error::Source(s) => {
                assert_eq!(s.line_num, 7);
                assert_eq!(s.file_path, "a.csp");
                assert_eq!(s.code, "x + 1");
                assert_eq!(s.message, "undefined variable 'x'");
            }
            other => panic!("expected source error, got {other:?}"),
        }
    }

    #[test]
    fn locate_escalates_lang_errors() {
        let err = Error::lang("boom");
        match err.locate(1, "a.csp".into(), "throw \"boom\"".into()) {
            Error::Fatal(m) => assert_eq!(m, "Uncaught exception: boom"),
            other => panic!("expected fatal, got {other:?}"),
        }
    }

    #[test]
    fn locate_passes_control_variants_through() {
        assert_eq!(
            Error::Exit(3).locate(1, String::new(), String::new()),
            Error::Exit(3)
        );
        assert_eq!(
            Error::Interrupt.locate(1, String::new(), String::new()),
            Error::Interrupt
        );
        let wrapped = Error::source(1, "a", "b", "c");
        assert_eq!(
            wrapped.clone().locate(9, "x".into(), "y".into()),
            wrapped
        );
    }
}
