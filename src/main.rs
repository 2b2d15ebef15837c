use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;

use rill::bytecode::{disassemble_chunk, read_chunk, write_chunk, write_chunk_json};
use rill::compile;
use rill::vm::{Vm, VmConfig};

/// Exit codes for the two failure classes, per the usual convention for
/// interpreters: 65 for bad input (compile error), 70 for an internal
/// runtime failure.
const EX_DATAERR: i32 = 65;
const EX_SOFTWARE: i32 = 70;

#[derive(Parser)]
#[command(name = "rill", version, about = "Compile and run arithmetic expressions on a bytecode VM")]
struct Cli {
    /// Script file to run: source text, or a compiled .rlc chunk
    script: Option<PathBuf>,

    /// Evaluate an expression given on the command line
    #[arg(short, long, value_name = "EXPR", conflicts_with = "script")]
    eval: Option<String>,

    /// Print the compiled bytecode listing before running
    #[arg(short, long)]
    disassemble: bool,

    /// Trace the stack and each instruction during execution
    #[arg(long)]
    trace: bool,

    /// Compile only, writing the chunk to FILE in binary form
    #[arg(long, value_name = "FILE")]
    emit: Option<PathBuf>,

    /// Compile only, writing the chunk to FILE as JSON
    #[arg(long, value_name = "FILE")]
    emit_json: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    if let Some(expr) = cli.eval.clone() {
        return run_source(&expr, &cli);
    }

    match cli.script.clone() {
        Some(path) if path.extension().is_some_and(|ext| ext == "rlc") => {
            run_chunk_file(&path, &cli)
        }
        Some(path) => {
            let source = fs::read_to_string(&path)
                .with_context(|| format!("could not read {}", path.display()))?;
            run_source(&source, &cli)
        }
        None => {
            repl(&cli);
            Ok(0)
        }
    }
}

/// Compile `source`, then emit, disassemble, or execute it per the flags.
fn run_source(source: &str, cli: &Cli) -> Result<i32> {
    let chunk = match compile(source) {
        Ok(chunk) => chunk,
        Err(error) => {
            for diagnostic in error.diagnostics() {
                eprintln!("{}", diagnostic);
            }
            return Ok(EX_DATAERR);
        }
    };

    if cli.disassemble {
        print!("{}", disassemble_chunk(&chunk, "code"));
    }

    // Emit modes compile without executing
    if cli.emit.is_some() || cli.emit_json.is_some() {
        if let Some(path) = &cli.emit {
            write_chunk(&chunk, path)
                .with_context(|| format!("could not write {}", path.display()))?;
        }
        if let Some(path) = &cli.emit_json {
            write_chunk_json(&chunk, path)
                .with_context(|| format!("could not write {}", path.display()))?;
        }
        return Ok(0);
    }

    execute(&chunk, cli)
}

/// Load a compiled chunk from disk and execute it.
fn run_chunk_file(path: &Path, cli: &Cli) -> Result<i32> {
    let file =
        File::open(path).with_context(|| format!("could not open {}", path.display()))?;
    let mut reader = BufReader::new(file);

    let chunk = match read_chunk(&mut reader) {
        Ok(chunk) => chunk,
        Err(error) => {
            eprintln!("{}: {}", path.display(), error);
            return Ok(EX_DATAERR);
        }
    };

    if cli.disassemble {
        print!("{}", disassemble_chunk(&chunk, "code"));
    }

    execute(&chunk, cli)
}

fn execute(chunk: &rill::Chunk, cli: &Cli) -> Result<i32> {
    let mut vm = Vm::with_config(VmConfig::new().with_trace(cli.trace));
    match vm.run(chunk) {
        Ok(value) => {
            println!("{}", value);
            Ok(0)
        }
        Err(error) => {
            eprintln!("{}", error);
            eprintln!("[line {}] in script", error.line);
            Ok(EX_SOFTWARE)
        }
    }
}

/// Read-eval-print loop. Errors are reported but never end the session.
fn repl(cli: &Cli) {
    println!("Rill v{}", rill::VERSION);

    let mut vm = Vm::with_config(VmConfig::new().with_trace(cli.trace));
    let stdin = io::stdin();

    loop {
        print!("> ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if cli.disassemble {
            if let Ok(chunk) = compile(line) {
                print!("{}", disassemble_chunk(&chunk, "repl"));
            }
        }

        vm.interpret(line);
    }
}
