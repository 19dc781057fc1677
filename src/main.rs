use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{Parser as ClapParser, ValueEnum};
use env_logger::Builder;
use log::{debug, info};
use memmap2::Mmap;

use rox::ast_printer::AstPrinter;
use rox::scanner::scan_all;
use rox::session::EXIT_STATIC_ERROR;
use rox::{Outcome, Session};

/// Exit code for a malformed command line.
const EXIT_USAGE: i32 = 64;

#[derive(ClapParser, Debug)]
#[command(version, about = "Lox language interpreter", long_about = None)]
pub struct Cli {
    /// Script to run; starts an interactive prompt when omitted
    script: Option<PathBuf>,

    /// Enable logging to rox.log
    #[arg(long)]
    log: bool,

    /// Print an intermediate form of the script instead of running it
    #[arg(long, value_enum)]
    emit: Option<Emit>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Emit {
    /// One `KIND lexeme literal` line per token
    Tokens,

    /// One JSON object per token
    TokensJson,

    /// Each parsed statement in prefix form
    Ast,
}

fn init_logger() -> Result<()> {
    let log_file = File::create("rox.log").context("Failed to create rox.log")?;

    Builder::new()
        .format(|buf, record| {
            // Strip 'rox::' from module path
            let module = record.module_path().unwrap_or("<unnamed>");
            let module = module.strip_prefix("rox::").unwrap_or(module);
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug)
        .parse_default_env()
        .init();

    info!("Logger initialized, writing to rox.log");
    Ok(())
}

/// Map `path` and hand back its contents as text.
fn read_source(path: &Path) -> Result<String> {
    info!("Reading file: {:?}", path);

    let file = File::open(path).with_context(|| format!("Failed to open file {:?}", path))?;

    // SAFETY: the mapping is read-only and dropped before this function returns.
    let map = unsafe { Mmap::map(&file) }
        .with_context(|| format!("Failed to map file {:?}", path))?;

    let text = std::str::from_utf8(&map)
        .with_context(|| format!("File {:?} is not valid UTF-8", path))?
        .to_owned();

    info!("Read {} bytes from {:?}", text.len(), path);

    Ok(text)
}

fn run_file(path: &Path) -> Result<()> {
    let source = read_source(path)?;
    let mut session = Session::new();

    let outcome: Outcome = session.run_source(&source);
    debug!("Script finished: {:?}", outcome);

    let code = outcome.exit_code();
    if code != 0 {
        process::exit(code);
    }

    Ok(())
}

fn run_prompt() -> Result<()> {
    info!("Starting REPL");

    let mut session = Session::new();
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut line = String::new();

    loop {
        print!("> ");
        io::stdout().flush().context("Failed to flush prompt")?;

        line.clear();
        let read = input
            .read_line(&mut line)
            .context("Failed to read from stdin")?;

        if read == 0 || line.trim() == "exit" {
            break;
        }

        if let Outcome::Exit(code) = session.run_source(&line) {
            process::exit(code);
        }

        session.reset_errors();
    }

    info!("REPL finished");
    Ok(())
}

fn emit(path: &Path, mode: Emit) -> Result<()> {
    let source = read_source(path)?;

    match mode {
        Emit::Tokens | Emit::TokensJson => {
            let (tokens, errors) = scan_all(&source);

            for token in &tokens {
                if mode == Emit::TokensJson {
                    println!("{}", serde_json::to_string(token)?);
                } else {
                    println!("{}", token);
                }
            }

            for error in &errors {
                eprintln!("{}", error);
            }

            if !errors.is_empty() {
                debug!("Tokenization failed, exiting with code {}", EXIT_STATIC_ERROR);
                process::exit(EXIT_STATIC_ERROR);
            }
        }

        Emit::Ast => {
            let mut session = Session::new();

            match session.parse_source(&source) {
                Ok(statements) => {
                    for stmt in &statements {
                        println!("{}", AstPrinter::print_stmt(stmt));
                    }
                }
                // Diagnostics were already written by the session.
                Err(_) => process::exit(EXIT_STATIC_ERROR),
            }
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let args: Cli = match Cli::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
            _ => {
                let _ = e.print();
                process::exit(EXIT_USAGE);
            }
        },
    };

    if args.log {
        init_logger()?;
    } else {
        Builder::new().filter_level(log::LevelFilter::Off).init();
    }

    info!("CLI arguments: {:?}", args);

    match (&args.script, args.emit) {
        (Some(script), Some(mode)) => emit(script, mode),
        (Some(script), None) => run_file(script),
        (None, Some(_)) => {
            eprintln!("--emit needs a script path");
            process::exit(EXIT_USAGE);
        }
        (None, None) => run_prompt(),
    }
}
