use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;

use toyc::backend::ir::IrBuilder;
use toyc::backend::vm::{Value, Vm};
use toyc::config::{self, CompilerConfig};
use toyc::error::ToyError;
use toyc::frontend::error::{CompileError, Diagnostics};
use toyc::frontend::lexer::Lexer;
use toyc::frontend::session::Session;
use toyc::frontend::{compile_source_lossy, parser};

// ── CLI argument parsing ─────────────────────────────────────────

#[derive(Parser)]
#[command(name = "toyc", about = "Compiler front end for the toy language", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON config file (entry name, forward-reference policy, VM limits)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output raw JSON instead of formatted text
    #[arg(long, global = true)]
    json: bool,

    /// More logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the token stream
    Tokens { file: PathBuf },
    /// Parse only and dump the functions as JSON
    Ast { file: PathBuf },
    /// Compile and report diagnostics
    Check { file: PathBuf },
    /// Compile and print the IR
    Ir { file: PathBuf },
    /// Compile and run the entry function
    Run {
        file: PathBuf,
        /// Arguments for the entry function
        #[arg(allow_negative_numbers = true)]
        args: Vec<f64>,
    },
}

// ── Logging ──────────────────────────────────────────────────────

struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!("[toyc] {} {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

// ── Diagnostics ──────────────────────────────────────────────────

/// Prints each error as soon as it is reported.
struct StderrDiagnostics {
    json: bool,
    count: usize,
}

impl Diagnostics for StderrDiagnostics {
    fn report(&mut self, error: CompileError) {
        self.count += 1;
        if self.json {
            println!("{}", serde_json::to_string(&error).unwrap_or_default());
        } else {
            eprintln!("{}", error.format_with_kind());
        }
    }
}

fn print_errors(errors: Vec<CompileError>, json: bool) {
    let mut sink = StderrDiagnostics { json, count: 0 };
    for error in errors {
        sink.report(error);
    }
}

/// `{ "<key>": value, "errors": [...] }` as one pretty-printed document, so
/// `--json` output stays parseable when compilation reports errors.
fn json_document<T: Serialize>(
    key: &str,
    value: &T,
    errors: &[CompileError],
) -> serde_json::Result<String> {
    let mut doc = serde_json::Map::new();
    doc.insert(key.to_string(), serde_json::to_value(value)?);
    doc.insert("errors".to_string(), serde_json::to_value(errors)?);
    serde_json::to_string_pretty(&doc)
}

// ── Commands ─────────────────────────────────────────────────────

fn read_input(file: &Path) -> Result<String, ToyError> {
    if file.as_os_str() == "-" {
        let mut source = String::new();
        io::stdin().read_to_string(&mut source)?;
        Ok(source)
    } else {
        Ok(std::fs::read_to_string(file)?)
    }
}

fn cmd_tokens(source: &str, config: &CompilerConfig, json: bool) -> bool {
    let mut ok = true;
    for item in Lexer::from_source(source).with_escapes(config.text_escapes) {
        match item {
            Ok(tok) if json => println!(
                "{}",
                json!({ "line": tok.pos.line, "col": tok.pos.col, "token": format!("{:?}", tok.token) })
            ),
            Ok(tok) => println!("{:>4}:{:<3} {:?}", tok.pos.line, tok.pos.col, tok.token),
            Err(e) => {
                ok = false;
                print_errors(vec![e], json);
            }
        }
    }
    ok
}

fn cmd_ast(source: &str, config: &CompilerConfig, json: bool) -> bool {
    let (functions, errors) = parser::parse_source(source, config.text_escapes);
    let ok = errors.is_empty();
    if json {
        println!("{}", json_document("functions", &functions, &errors).unwrap_or_default());
    } else {
        println!("{}", serde_json::to_string_pretty(&functions).unwrap_or_default());
        print_errors(errors, false);
    }
    ok
}

fn cmd_check(source: &str, config: &CompilerConfig, json: bool) -> bool {
    let mut ir = IrBuilder::new();
    let mut sink = StderrDiagnostics { json, count: 0 };
    let mut parser = parser::Parser::new(Lexer::from_source(source).with_escapes(config.text_escapes));
    let mut session = Session::new(&mut ir, config);
    let bodies = session.compile_all(&mut parser, &mut sink);
    session.finish(&mut sink);

    let has_entry = bodies.iter().any(|b| b.name == config.entry);
    if json {
        println!(
            "{}",
            json!({ "functions": bodies.len(), "errors": sink.count, "entry": has_entry })
        );
    } else {
        eprintln!("{} function(s) compiled, {} error(s)", bodies.len(), sink.count);
        if !has_entry {
            eprintln!("note: no '{}' function defined", config.entry);
        }
    }
    sink.count == 0
}

fn cmd_ir(source: &str, config: &CompilerConfig, json: bool) -> bool {
    let (program, errors) = compile_source_lossy(source, config);
    let ok = errors.is_empty();
    if json {
        println!("{}", json_document("program", &program, &errors).unwrap_or_default());
    } else {
        print!("{program}");
        print_errors(errors, false);
    }
    ok
}

fn cmd_run(source: &str, config: &CompilerConfig, args: Vec<f64>, json: bool) -> Result<Value, ToyError> {
    let (program, errors) = compile_source_lossy(source, config);
    if !errors.is_empty() {
        print_errors(errors.clone(), json);
        return Err(ToyError::Compile(errors));
    }
    if program.entry().is_none() {
        return Err(ToyError::MissingEntry(config.entry.clone()));
    }
    let mut vm = Vm::new(&program, config.vm, io::stdout().lock());
    let args = args.into_iter().map(Value::Number).collect();
    Ok(vm.run_entry(&config.entry, args)?)
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => match config::load_config(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("[toyc] Failed to load config '{}': {e}", path.display());
                process::exit(2);
            }
        },
        None => CompilerConfig::default(),
    };

    let file = match &cli.command {
        Commands::Tokens { file }
        | Commands::Ast { file }
        | Commands::Check { file }
        | Commands::Ir { file }
        | Commands::Run { file, .. } => file.clone(),
    };
    let source = match read_input(&file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("[toyc] Failed to read '{}': {e}", file.display());
            process::exit(2);
        }
    };

    let ok = match cli.command {
        Commands::Tokens { .. } => cmd_tokens(&source, &config, cli.json),
        Commands::Ast { .. } => cmd_ast(&source, &config, cli.json),
        Commands::Check { .. } => cmd_check(&source, &config, cli.json),
        Commands::Ir { .. } => cmd_ir(&source, &config, cli.json),
        Commands::Run { args, .. } => match cmd_run(&source, &config, args, cli.json) {
            Ok(value) => {
                if cli.json {
                    let value = match value {
                        Value::Number(n) => json!(n),
                        Value::Text(t) => json!(t),
                    };
                    println!("{}", json!({ "result": value }));
                } else {
                    println!("{value}");
                }
                true
            }
            Err(ToyError::Compile(_)) => false,
            Err(e) => {
                if cli.json {
                    println!("{}", json!({ "error": e }));
                } else {
                    eprintln!("Error: {e}");
                }
                false
            }
        },
    };

    if !ok {
        process::exit(1);
    }
}
