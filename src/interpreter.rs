//! Tree‑walking evaluator.
//!
//! Executes resolved statements against a chain of [`Environment`] frames
//! rooted at the globals. Variable references with a recorded distance walk
//! exactly that many frames; anything the resolver left unresolved is read
//! from the global frame directly.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use log::{debug, info};
use thiserror::Error;

use crate::ast::{Expr, ExprId, FunctionDecl, LiteralValue, Stmt};
use crate::callable::{LoxClass, LoxFunction, INITIALIZER};
use crate::environment::{self, EnvRef, Environment};
use crate::error::LoxError;
use crate::natives;
use crate::resolver::Locals;
use crate::token::{Token, TokenType};
use crate::value::{format_number, Value};

/// Anything that unwinds evaluation. Only `Error` is a user-visible failure.
#[derive(Error, Debug)]
pub enum Unwind {
    #[error(transparent)]
    Error(#[from] LoxError),

    /// Non-local `return`, caught at the function-call boundary.
    #[error("Return signal with value: {0}")]
    Return(Value),

    /// The script asked the process to stop with this exit code.
    #[error("Exit requested with code {0}")]
    Exit(i32),
}

/// Convenient alias for interpreter results.
pub type IResult<T> = Result<T, Unwind>;

/// Shorthand for a runtime error at `token`.
fn runtime_error<T>(token: &Token, message: impl Into<String>) -> IResult<T> {
    let error = LoxError::runtime(token, message);
    debug!("Error: {}", error.message());
    Err(Unwind::Error(error))
}

fn number_operand(operator: &Token, operand: &Value) -> IResult<f64> {
    match operand {
        Value::Number(n) => Ok(*n),
        _ => runtime_error(operator, "Operand must be a number."),
    }
}

fn number_operands(operator: &Token, left: &Value, right: &Value) -> IResult<(f64, f64)> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        _ => runtime_error(operator, "Operands must be numbers."),
    }
}

pub struct Interpreter {
    globals: EnvRef,
    environment: EnvRef,
    locals: HashMap<ExprId, usize>,
    out: Box<dyn Write>,
}

impl Interpreter {
    /// An interpreter printing to standard output.
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// An interpreter whose `print` output goes to `out`.
    pub fn with_output(out: Box<dyn Write>) -> Self {
        info!("Initializing Interpreter");

        let globals: EnvRef = Rc::new(RefCell::new(Environment::new()));
        natives::install(&mut globals.borrow_mut());

        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            out,
        }
    }

    /// Record the resolver's distances. Ids are unique per session, so maps
    /// from successive runs never collide.
    ///
    /// Entries are never evicted: a closure defined on an earlier REPL line
    /// still looks its variables up by these ids.
    pub fn extend_locals(&mut self, locals: Locals) {
        debug!("Recording {} resolved reference(s)", locals.len());
        self.locals.extend(locals);
    }

    /// Write one line of program output.
    pub fn write_line(&mut self, text: &str) -> IResult<()> {
        writeln!(self.out, "{}", text).map_err(LoxError::from)?;
        self.out.flush().map_err(LoxError::from)?;
        Ok(())
    }

    /// Interprets a list of statements (a "program").
    pub fn interpret(&mut self, statements: &[Stmt]) -> IResult<()> {
        debug!("Interpreting {} statements", statements.len());

        for stmt in statements {
            match self.execute(stmt) {
                Ok(()) => {}
                // The resolver rejects top-level `return`; treat a stray one as done.
                Err(Unwind::Return(_)) => break,
                Err(other) => return Err(other),
            }
        }

        info!("Interpretation completed successfully");

        Ok(())
    }

    // ─────────────────────────────── statements ────────────────────────

    pub fn execute(&mut self, stmt: &Stmt) -> IResult<()> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
            }

            Stmt::Var { name, initializer } => {
                let value: Value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Defining variable '{}' = {}", name.lexeme, value);
                self.environment.borrow_mut().define(&name.lexeme, value);
            }

            Stmt::Block(statements) => {
                let environment: EnvRef = Environment::child_of(&self.environment);
                self.execute_block(statements, environment)?;
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)?;
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)?;
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    self.execute(body)?;
                }
            }

            Stmt::Function(declaration) => {
                debug!("Defining function '{}'", declaration.name.lexeme);

                let function = LoxFunction::new(
                    Rc::clone(declaration),
                    Rc::clone(&self.environment),
                    false,
                );
                self.environment
                    .borrow_mut()
                    .define(&declaration.name.lexeme, Value::Function(Rc::new(function)));
            }

            Stmt::Return { value, .. } => {
                let value: Value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Returning value: {}", value);
                return Err(Unwind::Return(value));
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.execute_class(name, superclass.as_ref(), methods)?,
        }

        Ok(())
    }

    /// Run `statements` in `environment`, restoring the current frame on every
    /// exit path (normal, return, error).
    pub fn execute_block(&mut self, statements: &[Stmt], environment: EnvRef) -> IResult<()> {
        let previous: EnvRef = std::mem::replace(&mut self.environment, environment);

        let result = statements.iter().try_for_each(|stmt| self.execute(stmt));

        self.environment = previous;

        result
    }

    fn execute_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) -> IResult<()> {
        debug!("Defining class '{}'", name.lexeme);

        let superclass: Option<Rc<LoxClass>> = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),
                _ => {
                    let at: &Token = match expr {
                        Expr::Variable { name: super_name, .. } => super_name,
                        _ => name,
                    };
                    return runtime_error(at, "Superclass must be a class.");
                }
            },
            None => None,
        };

        self.environment
            .borrow_mut()
            .define(&name.lexeme, Value::Nil);

        let method_env: EnvRef = match &superclass {
            Some(parent) => {
                let env: EnvRef = Environment::child_of(&self.environment);
                env.borrow_mut()
                    .define("super", Value::Class(Rc::clone(parent)));
                env
            }
            None => Rc::clone(&self.environment),
        };

        let table: HashMap<String, Rc<LoxFunction>> = methods
            .iter()
            .map(|decl| {
                let function = LoxFunction::new(
                    Rc::clone(decl),
                    Rc::clone(&method_env),
                    decl.name.lexeme == INITIALIZER,
                );
                (decl.name.lexeme.clone(), Rc::new(function))
            })
            .collect();

        let class = LoxClass::new(name.lexeme.clone(), superclass, table);

        self.environment
            .borrow_mut()
            .define(&name.lexeme, Value::Class(Rc::new(class)));

        info!("Class '{}' defined", name.lexeme);

        Ok(())
    }

    // ─────────────────────────────── expressions ───────────────────────

    /// Evaluates an expression and returns a Value.
    pub fn evaluate(&mut self, expr: &Expr) -> IResult<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Variable { id, name } => self.look_up(*id, name),

            Expr::Assign { id, name, value } => {
                let value: Value = self.evaluate(value)?;
                self.assign(*id, name, value.clone())?;
                Ok(value)
            }

            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left: Value = self.evaluate(left)?;
                let right: Value = self.evaluate(right)?;
                self.binary(operator, left, right)
            }

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left: Value = self.evaluate(left)?;

                let short_circuit = match operator.token_type {
                    TokenType::OR => left.is_truthy(),
                    _ => !left.is_truthy(),
                };

                if short_circuit {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Prefix { operator, right } => {
                let right: Value = self.evaluate(right)?;

                match operator.token_type {
                    TokenType::MINUS => Ok(Value::Number(-number_operand(operator, &right)?)),
                    _ => Ok(Value::Bool(!right.is_truthy())),
                }
            }

            Expr::Postfix { operator, target } => self.postfix(operator, target),

            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.evaluate(then_branch)
                } else {
                    self.evaluate(else_branch)
                }
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee: Value = self.evaluate(callee)?;

                let mut values: Vec<Value> = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    values.push(self.evaluate(argument)?);
                }

                self.call(&callee, paren, values)
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => Ok(instance.get(name)?),
                _ => runtime_error(name, "Only instances have properties."),
            },

            Expr::Set {
                object,
                name,
                value,
            } => {
                // Target once, then value once, then store.
                let instance = match self.evaluate(object)? {
                    Value::Instance(instance) => instance,
                    _ => return runtime_error(name, "Only instances have fields."),
                };

                let value: Value = self.evaluate(value)?;
                instance.set(name, value.clone());

                Ok(value)
            }

            Expr::This { id, keyword } => self.look_up(*id, keyword),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.super_method(*id, keyword, method),
        }
    }

    fn binary(&mut self, operator: &Token, left: Value, right: Value) -> IResult<Value> {
        debug!(
            "Binary {} on {} and {}",
            operator.lexeme,
            left.type_name(),
            right.type_name()
        );

        let value = match operator.token_type {
            TokenType::PLUS => match (left, right) {
                (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
                (Value::String(a), Value::String(b)) => Value::String(a + &b),
                (Value::String(a), Value::Number(b)) => Value::String(a + &format_number(b)),
                _ => {
                    return runtime_error(
                        operator,
                        "Operands must be two numbers or two strings.",
                    )
                }
            },

            TokenType::MINUS => {
                let (a, b) = number_operands(operator, &left, &right)?;
                Value::Number(a - b)
            }

            TokenType::STAR => {
                let (a, b) = number_operands(operator, &left, &right)?;
                Value::Number(a * b)
            }

            TokenType::SLASH => {
                let (a, b) = number_operands(operator, &left, &right)?;
                if b == 0.0 {
                    return runtime_error(operator, "Division by zero.");
                }
                Value::Number(a / b)
            }

            TokenType::GREATER => {
                let (a, b) = number_operands(operator, &left, &right)?;
                Value::Bool(a > b)
            }

            TokenType::GREATER_EQUAL => {
                let (a, b) = number_operands(operator, &left, &right)?;
                Value::Bool(a >= b)
            }

            TokenType::LESS => {
                let (a, b) = number_operands(operator, &left, &right)?;
                Value::Bool(a < b)
            }

            TokenType::LESS_EQUAL => {
                let (a, b) = number_operands(operator, &left, &right)?;
                Value::Bool(a <= b)
            }

            TokenType::EQUAL_EQUAL => Value::Bool(left == right),

            TokenType::BANG_EQUAL => Value::Bool(left != right),

            _ => return runtime_error(operator, "Invalid binary operator."),
        };

        Ok(value)
    }

    /// `x++` / `obj.f--`: store the stepped number, yield the previous one.
    fn postfix(&mut self, operator: &Token, target: &Expr) -> IResult<Value> {
        let step: f64 = match operator.token_type {
            TokenType::PLUS_PLUS => 1.0,
            _ => -1.0,
        };

        match target {
            Expr::Variable { id, name } => {
                let old: f64 = number_operand(operator, &self.look_up(*id, name)?)?;
                self.assign(*id, name, Value::Number(old + step))?;
                Ok(Value::Number(old))
            }

            Expr::Get { object, name } => {
                let instance = match self.evaluate(object)? {
                    Value::Instance(instance) => instance,
                    _ => return runtime_error(name, "Only instances have properties."),
                };

                let old: f64 = number_operand(operator, &instance.get(name)?)?;
                instance.set(name, Value::Number(old + step));
                Ok(Value::Number(old))
            }

            _ => runtime_error(operator, "Invalid increment target."),
        }
    }

    fn call(&mut self, callee: &Value, paren: &Token, arguments: Vec<Value>) -> IResult<Value> {
        let Some(callable) = callee.as_callable() else {
            return runtime_error(paren, "Can only call functions and classes.");
        };

        if arguments.len() != callable.arity() {
            return runtime_error(
                paren,
                format!(
                    "Expected {} arguments but got {}.",
                    callable.arity(),
                    arguments.len()
                ),
            );
        }

        let result: Value = callable.call(self, paren, arguments)?;
        debug!("Call at line {} returned {}", paren.line, result);

        Ok(result)
    }

    fn super_method(&mut self, id: ExprId, keyword: &Token, method: &Token) -> IResult<Value> {
        let Some(&distance) = self.locals.get(&id) else {
            return runtime_error(keyword, "Can't use 'super' outside of a class.");
        };

        let superclass = match environment::get_at(&self.environment, distance, "super") {
            Some(Value::Class(class)) => class,
            _ => return runtime_error(keyword, "Can't use 'super' in a class with no superclass."),
        };

        // `this` is bound one frame inside the `super` frame.
        let instance = match environment::get_at(&self.environment, distance.saturating_sub(1), "this") {
            Some(Value::Instance(instance)) => instance,
            _ => return runtime_error(keyword, "Can't use 'super' outside of a method."),
        };

        match superclass.find_method(&method.lexeme) {
            Some(found) => Ok(Value::Function(Rc::new(found.bind(instance)))),
            None => runtime_error(
                method,
                format!("Undefined property '{}'.", method.lexeme),
            ),
        }
    }

    // ─────────────────────────────── variables ─────────────────────────

    fn look_up(&self, id: ExprId, name: &Token) -> IResult<Value> {
        let found: Option<Value> = match self.locals.get(&id) {
            Some(&distance) => environment::get_at(&self.environment, distance, &name.lexeme),
            None => self.globals.borrow().get_local(&name.lexeme),
        };

        match found {
            Some(value) => Ok(value),
            None => runtime_error(name, format!("Undefined variable '{}'.", name.lexeme)),
        }
    }

    fn assign(&mut self, id: ExprId, name: &Token, value: Value) -> IResult<()> {
        match self.locals.get(&id) {
            Some(&distance) => {
                environment::assign_at(&self.environment, distance, &name.lexeme, value);
                Ok(())
            }
            None => {
                if self.globals.borrow_mut().assign(&name.lexeme, value) {
                    Ok(())
                } else {
                    runtime_error(name, format!("Undefined variable '{}'.", name.lexeme))
                }
            }
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}
