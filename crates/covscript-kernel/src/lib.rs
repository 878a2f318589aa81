//! covscript-kernel: the execution core of Covariant Script.
//!
//! This crate provides:
//!
//! - **Context**: per-compilation shared state (file path, package name,
//!   buffered source lines)
//! - **Instance**: compiles a file into statements and interprets them in
//!   order, with source-located error wrapping
//! - **Lexer / Translator**: line-oriented tokenization (logos) and grammar
//!   method matching / block assembly
//! - **Storage**: nested domains and per-block declaration sets
//! - **Loader**: search-path module resolution for `.csp` packages and
//!   `.cse` extensions
//! - **Process**: the SIGINT flag facade and platform constants
//!
//! The interactive line-assembly state machine and the `cs` process driver
//! live in the `covscript-repl` crate.

pub mod ast;
pub mod compiler;
pub mod context;
pub mod error;
pub mod eval;
pub mod instance;
pub mod lexer;
pub mod loader;
pub mod process;
pub mod statement;
pub mod storage;
pub mod translator;

pub use ast::Value;
pub use context::{Context, ContextRef};
pub use error::{Error, Result, SourceError};
pub use instance::Instance;
pub use loader::Extension;
