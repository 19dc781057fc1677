//! Functions the host pre-populates in the global environment.

use std::rc::Rc;

use chrono::Utc;
use log::{debug, info};

use crate::callable::NativeFunction;
use crate::environment::Environment;
use crate::interpreter::{IResult, Interpreter, Unwind};
use crate::token::Token;
use crate::value::Value;

/// Exit code used by the `exit()` native.
pub const EXIT_CODE: i32 = 1;

/// Seconds since the Unix epoch, with millisecond resolution.
fn clock(_interpreter: &mut Interpreter, _paren: &Token, _args: &[Value]) -> IResult<Value> {
    let seconds: f64 = Utc::now().timestamp_millis() as f64 / 1000.0;
    debug!("Native function 'clock' returned: {}", seconds);
    Ok(Value::Number(seconds))
}

fn exit(_interpreter: &mut Interpreter, paren: &Token, _args: &[Value]) -> IResult<Value> {
    info!("exit() called on line {}", paren.line);
    Err(Unwind::Exit(EXIT_CODE))
}

fn print(interpreter: &mut Interpreter, _paren: &Token, args: &[Value]) -> IResult<Value> {
    let text: String = args.first().map_or_else(|| "nil".to_string(), Value::to_string);
    interpreter.write_line(&text)?;
    Ok(Value::Nil)
}

/// Define every native in `globals`.
pub fn install(globals: &mut Environment) {
    let natives = [
        NativeFunction {
            name: "clock",
            arity: 0,
            func: clock,
        },
        NativeFunction {
            name: "exit",
            arity: 0,
            func: exit,
        },
        NativeFunction {
            name: "print",
            arity: 1,
            func: print,
        },
    ];

    for native in natives {
        debug!("Defining native function '{}'", native.name);
        globals.define(native.name, Value::Native(Rc::new(native)));
    }
}
