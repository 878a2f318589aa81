//! cs — the Covariant Script interpreter CLI.
//!
//! Usage:
//!   cs [options...] <FILE> [arguments...]   # Run a script
//!   cs [options...]                         # Interactive REPL
//!
//! The argument grammar is order-sensitive and parsed in a single pass;
//! the first non-option token is the script file and everything after it
//! is handed to the script as constant string arguments.

use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process::ExitCode;

use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use covscript_kernel::error::Error;
use covscript_kernel::instance::Instance;
use covscript_kernel::process;
use covscript_repl::Repl;

/// Driver options collected from the command line.
#[derive(Debug, Default)]
struct Options {
    repl: bool,
    silent: bool,
    dump_ast: bool,
    dump_dependency: bool,
    no_optimize: bool,
    compile_only: bool,
    show_help: bool,
    wait_before_exit: bool,
    show_version: bool,
    log_path: Option<String>,
    import_path: Option<String>,
}

fn main() -> ExitCode {
    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let (opts, index) = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(255);
        }
    };

    let code = match dispatch(&opts, &args[index.min(args.len())..]) {
        Ok(code) => code,
        Err(e) => {
            report_error(&opts.log_path, &e.to_string());
            -1
        }
    };

    if opts.wait_before_exit {
        eprintln!("\nProcess finished with exit code {code}");
        eprintln!("\nPress any key to exit...");
        let mut line = String::new();
        let _ = io::stdin().lock().read_line(&mut line);
    }
    ExitCode::from(code as u8)
}

/// Parse the interpreter options. Returns the options and the index of the
/// first argument that belongs to the script.
fn parse_args(args: &[String]) -> Result<(Options, usize), Error> {
    let mut opts = Options::default();
    let mut expect_log_path = 0u8;
    let mut expect_import_path = 0u8;
    let mut index = 1;
    while index < args.len() {
        let arg = args[index].as_str();
        if expect_log_path == 1 {
            opts.log_path = Some(arg.to_string());
            expect_log_path = 2;
        } else if expect_import_path == 1 {
            opts.import_path = Some(arg.to_string());
            expect_import_path = 2;
        } else if arg.starts_with('-') {
            match arg {
                "--args" | "-a" => {
                    opts.repl = true;
                    return Ok((opts, index + 1));
                }
                "--silent" | "-s" if !opts.silent => opts.silent = true,
                "--dump-ast" | "-d" if !opts.dump_ast => opts.dump_ast = true,
                "--dependency" | "-r" if !opts.dump_dependency => opts.dump_dependency = true,
                "--no-optimize" | "-o" if !opts.no_optimize => opts.no_optimize = true,
                "--compile-only" | "-c" if !opts.compile_only => opts.compile_only = true,
                "--help" | "-h" if !opts.show_help => opts.show_help = true,
                "--wait-before-exit" | "-w" if !opts.wait_before_exit => {
                    opts.wait_before_exit = true
                }
                "--version" | "-v" if !opts.show_version => opts.show_version = true,
                "--log-path" | "-l" if expect_log_path == 0 => expect_log_path = 1,
                "--import-path" | "-i" if expect_import_path == 0 => expect_import_path = 1,
                _ => return Err(Error::fatal("argument syntax error.")),
            }
        } else {
            break;
        }
        index += 1;
    }
    if expect_log_path == 1 || expect_import_path == 1 {
        return Err(Error::fatal("argument syntax error."));
    }
    Ok((opts, index))
}

/// Compose the import search path: script directory first (when running a
/// file), then the current directory, then any `--import-path` entry.
fn build_import_path(opts: &Options, script: Option<&str>) -> String {
    let delimiter = process::PATH_DELIMITER.to_string();
    let mut parts = Vec::new();
    if let Some(script) = script {
        if let Some(dir) = Path::new(script).parent() {
            let dir = dir.to_string_lossy();
            if !dir.is_empty() {
                parts.push(dir.into_owned());
            }
        }
    }
    parts.push(".".to_string());
    if let Some(extra) = &opts.import_path {
        parts.push(extra.clone());
    }
    parts.join(&delimiter)
}

fn dispatch(opts: &Options, script_args: &[String]) -> covscript_kernel::Result<i32> {
    if opts.show_help {
        print_help();
        return Ok(0);
    }
    if opts.show_version {
        print_version(opts);
        return Ok(0);
    }
    // SIGINT raises the process interrupt flag, observed at poll points
    // while statements execute. During REPL line editing rustyline reports
    // the key press directly instead.
    if let Err(e) = ctrlc::set_handler(|| {
        println!("Keyboard Interrupt (Ctrl+C Received)");
        process::raise_interrupt();
    }) {
        tracing::warn!("failed to install SIGINT handler: {e}");
    }
    if !opts.repl {
        if let Some((path, rest)) = script_args.split_first() {
            return run_file(opts, path, rest);
        }
    }
    run_repl(opts, script_args)
}

fn print_help() {
    println!("Usage:");
    println!("    cs [options...] <FILE> [arguments...]");
    println!("    cs [options...]");
    println!();
    println!("Interpreter Options:");
    println!("    Option               Mnemonic   Function");
    println!("  --compile-only        -c          Only compile");
    println!("  --dump-ast            -d          Export abstract syntax tree");
    println!("  --dependency          -r          Export module dependency");
    println!();
    println!("Interpreter REPL Options:");
    println!("    Option               Mnemonic   Function");
    println!("  --silent              -s          Close the command prompt");
    println!("  --args <...>          -a <...>    Set the arguments");
    println!();
    println!("Common Options:");
    println!("    Option               Mnemonic   Function");
    println!("  --no-optimize         -o          Disable optimizer");
    println!("  --help                -h          Show help information");
    println!("  --version             -v          Show version information");
    println!("  --wait-before-exit    -w          Wait before process exit");
    println!("  --log-path    <PATH>  -l <PATH>   Set the log and AST exporting path");
    println!("  --import-path <PATH>  -i <PATH>   Set the import path");
    println!();
}

fn print_version(opts: &Options) {
    println!("Covariant Script Programming Language Interpreter");
    println!("Version: {}", process::VERSION);
    println!();
    println!("Metadata:");
    println!("  Import Path: {}", build_import_path(opts, None));
    println!("  STD Version: {}", process::STD_VERSION);
    println!("  Runtime Env: {}", process::PLATFORM);
    println!();
}

/// Validate, compile, optionally dump, and interpret a script file.
fn run_file(opts: &Options, path: &str, rest: &[String]) -> covscript_kernel::Result<i32> {
    let meta = Path::new(path);
    if !meta.is_file() || File::open(meta).is_err() {
        return Err(Error::fatal("invalid input file."));
    }

    let mut instance = Instance::new(build_import_path(opts, Some(path)), opts.no_optimize);
    let mut args = vec![path.to_string()];
    args.extend(rest.iter().cloned());
    instance.set_args(args)?;
    instance.compile(path)?;

    if opts.dump_ast || opts.dump_dependency {
        write_dumps(opts, &instance)?;
    }
    if opts.compile_only {
        return Ok(0);
    }
    match instance.interpret() {
        Ok(()) => Ok(0),
        Err(Error::Exit(code)) => Ok(code),
        Err(e) => Err(e),
    }
}

/// Write the AST and/or dependency dumps to the log path, or stdout when no
/// log path was given.
///
/// Each dump reopens (truncates) the log path, so when both are requested
/// the dependency list is what remains in the file.
fn write_dumps(opts: &Options, instance: &Instance) -> covscript_kernel::Result<()> {
    if opts.dump_ast {
        let mut sink = open_dump_sink(&opts.log_path)?;
        instance
            .dump_ast(&mut sink)
            .map_err(|e| Error::fatal(format!("failed to write AST dump: {e}")))?;
    }
    if opts.dump_dependency {
        let mut sink = open_dump_sink(&opts.log_path)?;
        for module in instance.compiler.modules() {
            writeln!(sink, "{module}")
                .map_err(|e| Error::fatal(format!("failed to write dependency dump: {e}")))?;
        }
    }
    Ok(())
}

fn open_dump_sink(log_path: &Option<String>) -> covscript_kernel::Result<Box<dyn Write>> {
    match log_path {
        Some(path) => Ok(Box::new(
            File::create(path)
                .map_err(|_| Error::fatal(format!("{path}: cannot open log file")))?,
        )),
        None => Ok(Box::new(io::stdout())),
    }
}

/// The interactive loop.
fn run_repl(opts: &Options, script_args: &[String]) -> covscript_kernel::Result<i32> {
    if !opts.silent {
        println!("Covariant Script Programming Language Interpreter REPL");
        println!("Version: {}", process::VERSION);
    }

    let instance = Instance::new(build_import_path(opts, None), opts.no_optimize);
    instance.context.set_file_path("<REPL_ENV>");
    let mut repl = Repl::new(instance);
    let mut args = vec!["<REPL_ENV>".to_string()];
    args.extend(script_args.iter().cloned());
    repl.instance_mut().set_args(args)?;

    let mut editor: Editor<(), DefaultHistory> = Editor::new()
        .map_err(|e| Error::fatal(format!("failed to create line editor: {e}")))?;
    let history_path = directories::BaseDirs::new()
        .map(|dirs| dirs.data_dir().join("covscript").join("history.txt"));
    if let Some(path) = &history_path {
        if let Err(e) = editor.load_history(path) {
            let not_found = matches!(&e, ReadlineError::Io(io_err)
                if io_err.kind() == io::ErrorKind::NotFound);
            if !not_found {
                tracing::warn!("failed to load history: {e}");
            }
        }
    }

    let mut log_stream: Option<File> = None;
    let code = loop {
        let prompt = if opts.silent {
            String::new()
        } else {
            format!("{}> ", ".".repeat(2 * repl.level()))
        };
        match editor.readline(&prompt) {
            Ok(line) => {
                if let Err(e) = editor.add_history_entry(line.as_str()) {
                    tracing::warn!("failed to record history entry: {e}");
                }
                match process::poll().and_then(|_| repl.exec(&line)) {
                    Ok(()) => {}
                    Err(Error::Exit(code)) => break code,
                    Err(Error::Interrupt) => {
                        // The flag fired mid-execution: abandon the current
                        // iteration and restore the top-level state.
                        repl.reset_status();
                    }
                    Err(e) => {
                        log_repl_error(&opts.log_path, &mut log_stream, &e.to_string());
                        eprintln!("{e}");
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("Keyboard Interrupt (Ctrl+C Received)");
                process::take_interrupt();
                repl.reset_status();
            }
            Err(ReadlineError::Eof) => break 0,
            Err(e) => return Err(Error::fatal(format!("input failure: {e}"))),
        }
    };

    if let Some(path) = &history_path {
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!("failed to create history directory: {e}");
            }
        }
        if let Err(e) = editor.save_history(path) {
            tracing::warn!("failed to save history: {e}");
        }
    }
    Ok(code)
}

/// Append one REPL error to the log file, opening it on first use.
fn log_repl_error(log_path: &Option<String>, stream: &mut Option<File>, message: &str) {
    let Some(path) = log_path else {
        return;
    };
    if stream.is_none() {
        *stream = File::create(path).ok();
    }
    match stream {
        Some(file) => {
            if writeln!(file, "{message}").is_err() {
                eprintln!("Write log failed.");
            }
        }
        None => eprintln!("Write log failed."),
    }
}

/// Top-level error envelope: log file (if configured) plus stderr.
fn report_error(log_path: &Option<String>, message: &str) {
    if let Some(path) = log_path {
        match File::create(path) {
            Ok(mut file) => {
                if write!(file, "{message}").is_err() {
                    eprintln!("Write log failed.");
                }
            }
            Err(_) => eprintln!("Write log failed."),
        }
    }
    eprintln!("{message}");
}
