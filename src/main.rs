mod builtin;
mod error;
mod eval;
mod expand;
mod parser;
mod redirect;
mod search;
mod session;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

use crate::session::Session;

const PROMPT: &str = "msh> ";

/// A small line-oriented command interpreter.
#[derive(Parser)]
#[command(name = "msh", version, about)]
struct Args {
    /// Script file to run in batch mode; interactive when omitted.
    script: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.script {
        Some(path) => run_batch(&path),
        None => run_interactive(),
    }
}

/// Execute every line of a script file in sequence. A script that opens
/// runs to completion with a success exit code; one that does not fails the
/// process.
fn run_batch(path: &Path) -> ExitCode {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("msh: {}: {}", path.display(), e);
            return ExitCode::FAILURE;
        }
    };
    let mut session = Session::new();
    for line in BufReader::new(file).lines() {
        match line {
            Ok(line) => {
                eval::eval_line(&mut session, &line);
            }
            Err(e) => {
                eprintln!("msh: read error: {e}");
                break;
            }
        }
    }
    ExitCode::SUCCESS
}

/// Banner, prompt, read, evaluate, repeat until end-of-input. Read errors
/// other than end-of-input are reported and the loop continues.
fn run_interactive() -> ExitCode {
    println!("msh {}", env!("CARGO_PKG_VERSION"));
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("msh: cannot initialize line editor: {e}");
            return ExitCode::FAILURE;
        }
    };
    let mut session = Session::new();
    loop {
        match editor.readline(PROMPT) {
            Ok(line) => {
                eval::eval_line(&mut session, &line);
            }
            Err(ReadlineError::Eof) => break,
            Err(ReadlineError::Interrupted) => continue,
            Err(e) => {
                eprintln!("msh: readline: {e}");
                continue;
            }
        }
    }
    ExitCode::SUCCESS
}
