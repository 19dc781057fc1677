//! One interpreter session: the state that outlives a single `run_source`.
//!
//! The session owns the node-id allocator, the interpreter (and through it the
//! global environment), the had-error flags and the diagnostic sink. Nothing
//! here is global, so tests can run any number of isolated sessions.

use std::io::{self, Write};

use log::{debug, info};

use crate::ast::{IdGen, Stmt};
use crate::error::LoxError;
use crate::interpreter::{Interpreter, Unwind};
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::scan_all;

/// Exit code for lexical, parse and resolution errors.
pub const EXIT_STATIC_ERROR: i32 = 65;

/// Exit code for an unrecovered runtime error.
pub const EXIT_RUNTIME_ERROR: i32 = 70;

/// How one unit of source ended.
#[derive(Debug)]
pub enum Outcome {
    Success,

    /// Scanning, parsing or resolution failed; nothing was executed.
    StaticErrors(Vec<LoxError>),

    /// Execution stopped at this runtime error.
    RuntimeError(LoxError),

    /// The program called `exit()`.
    Exit(i32),
}

impl Outcome {
    /// Process exit code the shell should apply.
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Success => 0,
            Outcome::StaticErrors(_) => EXIT_STATIC_ERROR,
            Outcome::RuntimeError(_) => EXIT_RUNTIME_ERROR,
            Outcome::Exit(code) => *code,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

pub struct Session {
    ids: IdGen,
    interpreter: Interpreter,
    diagnostics: Box<dyn Write>,
    had_error: bool,
    had_runtime_error: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Program output to stdout, diagnostics to stderr.
    pub fn new() -> Self {
        Self::with_io(Box::new(io::stdout()), Box::new(io::stderr()))
    }

    /// Route program output and diagnostics to the given sinks.
    pub fn with_io(out: Box<dyn Write>, diagnostics: Box<dyn Write>) -> Self {
        info!("Session created");

        Self {
            ids: IdGen::new(),
            interpreter: Interpreter::with_output(out),
            diagnostics,
            had_error: false,
            had_runtime_error: false,
        }
    }

    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }

    /// Forget earlier failures; the REPL does this after every line.
    pub fn reset_errors(&mut self) {
        self.had_error = false;
        self.had_runtime_error = false;
    }

    /// Scan and parse `source`, reporting every lexical and syntax error.
    pub fn parse_source(&mut self, source: &str) -> Result<Vec<Stmt>, Vec<LoxError>> {
        let (tokens, mut errors) = scan_all(source);

        let parsed = Parser::new(tokens, &mut self.ids).parse();

        match parsed {
            Ok(statements) if errors.is_empty() => Ok(statements),
            Ok(_) => Err(self.fail_static(errors)),
            Err(parse_errors) => {
                errors.extend(parse_errors);
                Err(self.fail_static(errors))
            }
        }
    }

    /// Scan, parse, resolve and interpret one unit of source.
    pub fn run_source(&mut self, source: &str) -> Outcome {
        let statements: Vec<Stmt> = match self.parse_source(source) {
            Ok(statements) => statements,
            Err(errors) => return Outcome::StaticErrors(errors),
        };

        let locals = match Resolver::new().resolve(&statements) {
            Ok(locals) => locals,
            Err(errors) => return Outcome::StaticErrors(self.fail_static(errors)),
        };

        self.interpreter.extend_locals(locals);

        match self.interpreter.interpret(&statements) {
            Ok(()) => Outcome::Success,

            Err(Unwind::Error(error)) => {
                self.report(&error);
                self.had_runtime_error = true;
                Outcome::RuntimeError(error)
            }

            Err(Unwind::Exit(code)) => {
                info!("Program requested exit with code {}", code);
                Outcome::Exit(code)
            }

            Err(Unwind::Return(_)) => Outcome::Success,
        }
    }

    fn fail_static(&mut self, mut errors: Vec<LoxError>) -> Vec<LoxError> {
        errors.sort_by_key(|e| e.line().unwrap_or(0));

        for error in &errors {
            self.report(error);
        }

        self.had_error = true;
        errors
    }

    fn report(&mut self, error: &LoxError) {
        if let Err(e) = writeln!(self.diagnostics, "{}", error) {
            debug!("Could not write diagnostic: {}", e);
        }
    }
}
