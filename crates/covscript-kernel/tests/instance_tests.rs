//! Instance lifecycle tests: compile, interpret, dump.

use std::fs;
use std::path::Path;

use covscript_kernel::error::Error;
use covscript_kernel::{Instance, Value};
use tempfile::TempDir;

fn write_script(dir: &Path, name: &str, source: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, source).expect("failed to write fixture");
    path.to_string_lossy().into_owned()
}

fn instance() -> Instance {
    Instance::new(".", false)
}

#[test]
fn compile_records_path_and_file_buff() {
    let dir = TempDir::new().unwrap();
    let path = write_script(dir.path(), "main.csf", "var x = 1\n\n# note\nx = x + 1\n");
    let mut inst = instance();
    inst.compile(&path).expect("compile failure");
    assert_eq!(inst.context.file_path(), path);
    assert_eq!(inst.context.line_count(), 4);
    assert_eq!(inst.statements().len(), 2);
}

#[test]
fn compile_missing_file_is_fatal() {
    let mut inst = instance();
    match inst.compile("/nonexistent/nowhere.csf") {
        Err(Error::Fatal(msg)) => {
            assert!(msg.ends_with("No such file or directory"));
            assert!(msg.contains("/nonexistent/nowhere.csf"));
        }
        other => panic!("expected fatal error, got {other:?}"),
    }
}

#[test]
fn interpret_runs_statements_in_order() {
    let dir = TempDir::new().unwrap();
    let path = write_script(
        dir.path(),
        "main.csf",
        "var x = 1\nx = x + 1\nx = x * 10\n",
    );
    let mut inst = instance();
    inst.compile(&path).unwrap();
    inst.interpret().expect("interpret failure");
    assert_eq!(inst.storage.get("x"), Some(Value::Int(20)));
}

#[test]
fn block_statements_scope_their_bodies() {
    let dir = TempDir::new().unwrap();
    let path = write_script(
        dir.path(),
        "main.csf",
        "var total = 0\n\
         var i = 0\n\
         while i < 5\n\
             var step = 2\n\
             total = total + step\n\
             i = i + 1\n\
         end\n",
    );
    let mut inst = instance();
    inst.compile(&path).unwrap();
    inst.interpret().unwrap();
    assert_eq!(inst.storage.get("total"), Some(Value::Int(10)));
    // Block locals do not leak into the global scope.
    assert_eq!(inst.storage.get("step"), None);
}

#[test]
fn runtime_errors_are_wrapped_with_location() {
    let dir = TempDir::new().unwrap();
    let path = write_script(dir.path(), "main.csf", "var x = 1\nx = ghost + 1\n");
    let mut inst = instance();
    inst.compile(&path).unwrap();
    match inst.interpret() {
        Err(Error::Source(s)) => {
            assert_eq!(s.line_num, 2);
            assert_eq!(s.file_path, path);
            assert_eq!(s.code, "x = ghost + 1");
            assert!(s.message.contains("ghost"));
        }
        other => panic!("expected source error, got {other:?}"),
    }
}

#[test]
fn nested_errors_carry_the_top_level_statement_line() {
    let dir = TempDir::new().unwrap();
    let path = write_script(
        dir.path(),
        "main.csf",
        "var x = 1\nif true\n    if true\n        ghost\n    end\nend\n",
    );
    let mut inst = instance();
    inst.compile(&path).unwrap();
    match inst.interpret() {
        Err(Error::Source(s)) => {
            // The envelope names the executing top-level statement.
            assert_eq!(s.line_num, 2);
            assert_eq!(s.code, "if true");
            assert!(s.message.contains("ghost"));
        }
        other => panic!("expected source error, got {other:?}"),
    }
}

#[test]
fn uncaught_throw_becomes_fatal() {
    let dir = TempDir::new().unwrap();
    let path = write_script(dir.path(), "main.csf", "throw \"boom\"\n");
    let mut inst = instance();
    inst.compile(&path).unwrap();
    match inst.interpret() {
        Err(Error::Fatal(msg)) => assert_eq!(msg, "Uncaught exception: boom"),
        other => panic!("expected fatal error, got {other:?}"),
    }
}

#[test]
fn try_catches_thrown_and_runtime_errors() {
    let dir = TempDir::new().unwrap();
    let path = write_script(
        dir.path(),
        "main.csf",
        "var caught = \"\"\n\
         try\n\
             throw \"first\"\n\
         catch e\n\
             caught = e\n\
         end\n\
         try\n\
             ghost\n\
         catch e\n\
             caught = caught + \" \" + e\n\
         end\n",
    );
    let mut inst = instance();
    inst.compile(&path).unwrap();
    inst.interpret().unwrap();
    match inst.storage.get("caught") {
        Some(Value::Str(s)) => {
            assert!(s.starts_with("first"));
            assert!(s.contains("ghost"));
        }
        other => panic!("expected string, got {other:?}"),
    }
}

#[test]
fn exit_propagates_as_a_control_variant() {
    let dir = TempDir::new().unwrap();
    let path = write_script(dir.path(), "main.csf", "var x = 1\nexit 3\nx = 99\n");
    let mut inst = instance();
    inst.compile(&path).unwrap();
    assert_eq!(inst.interpret(), Err(Error::Exit(3)));
    // Nothing after the exit ran.
    assert_eq!(inst.storage.get("x"), Some(Value::Int(1)));
}

#[test]
fn assignment_to_constant_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_script(dir.path(), "main.csf", "constant pi = 3.14\npi = 3\n");
    let mut inst = instance();
    inst.compile(&path).unwrap();
    match inst.interpret() {
        Err(Error::Source(s)) => {
            assert_eq!(s.line_num, 2);
            assert!(s.message.contains("assignment to constant 'pi'"));
        }
        other => panic!("expected source error, got {other:?}"),
    }
}

#[test]
fn args_are_published_as_a_constant_array() {
    let mut inst = instance();
    inst.set_args(vec!["main.csf".into(), "--flag".into()])
        .unwrap();
    assert_eq!(
        inst.storage.get("args"),
        Some(Value::Array(vec![
            Value::Str("main.csf".into()),
            Value::Str("--flag".into()),
        ]))
    );
    assert!(inst.compiler.is_constant("args"));
}

#[test]
fn dump_ast_is_deterministic_and_prefixed() {
    let dir = TempDir::new().unwrap();
    let path = write_script(
        dir.path(),
        "main.csf",
        "var x = 1\nif x > 0\n    x = 0\nend\n",
    );
    let mut first = Vec::new();
    let mut second = Vec::new();
    for out in [&mut first, &mut second] {
        let mut inst = instance();
        inst.compile(&path).unwrap();
        inst.dump_ast(out).unwrap();
    }
    assert_eq!(first, second);
    let text = String::from_utf8(first).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("< Covariant Script AST Dump >"));
    assert_eq!(lines.next(), Some("< BeginMetaData >"));
    assert!(text.contains("< EndMetaData >"));
    assert!(text.contains("< Statement: If, Line: 2, Cond: x > 0 >"));
}
