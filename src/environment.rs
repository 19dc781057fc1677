use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

/// Shared handle to one frame of the scope chain. Closures hold one of these,
/// which keeps the whole chain above it alive for as long as they are reachable.
pub type EnvRef = Rc<RefCell<Environment>>;

/// One frame of the runtime scope chain.
#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<EnvRef>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: EnvRef) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Wrap a fresh child of `enclosing` in a shared handle.
    pub fn child_of(enclosing: &EnvRef) -> EnvRef {
        Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(enclosing))))
    }

    pub fn enclosing(&self) -> Option<EnvRef> {
        self.enclosing.clone()
    }

    /// Bind `name` in this frame, shadowing any outer binding.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Dynamic assignment walking the whole chain; `false` when unbound.
    pub fn assign(&mut self, name: &str, value: Value) -> bool {
        if let Some(slot) = self.values.get_mut(name) {
            *slot = value;
            true
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            false
        }
    }

    /// Read `name` from this frame only.
    pub fn get_local(&self, name: &str) -> Option<Value> {
        self.values.get(name).cloned()
    }
}

/// The frame `distance` links above `env`. Stops at the root if the chain is
/// shorter, which a correct resolver never asks for.
pub fn ancestor(env: &EnvRef, distance: usize) -> EnvRef {
    let mut current: EnvRef = Rc::clone(env);

    for _ in 0..distance {
        let next = current.borrow().enclosing();
        match next {
            Some(parent) => current = parent,
            None => {
                debug!("ancestor({}) ran past the global frame", distance);
                break;
            }
        }
    }

    current
}

/// Read `name` exactly `distance` frames above `env`.
pub fn get_at(env: &EnvRef, distance: usize, name: &str) -> Option<Value> {
    ancestor(env, distance).borrow().get_local(name)
}

/// Write `name` exactly `distance` frames above `env`.
pub fn assign_at(env: &EnvRef, distance: usize, name: &str, value: Value) {
    ancestor(env, distance).borrow_mut().define(name, value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shadowing_leaves_outer_binding_alone() {
        let global: EnvRef = Rc::new(RefCell::new(Environment::new()));
        global.borrow_mut().define("a", Value::Number(1.0));

        let inner = Environment::child_of(&global);
        inner.borrow_mut().define("a", Value::Number(2.0));

        assert_eq!(inner.borrow().get_local("a"), Some(Value::Number(2.0)));
        assert_eq!(global.borrow().get_local("a"), Some(Value::Number(1.0)));
    }

    #[test]
    fn distance_lookups_skip_exactly_n_frames() {
        let global: EnvRef = Rc::new(RefCell::new(Environment::new()));
        global.borrow_mut().define("x", Value::Number(0.0));
        let middle = Environment::child_of(&global);
        middle.borrow_mut().define("x", Value::Number(1.0));
        let inner = Environment::child_of(&middle);

        assert_eq!(get_at(&inner, 1, "x"), Some(Value::Number(1.0)));
        assert_eq!(get_at(&inner, 2, "x"), Some(Value::Number(0.0)));
        assert_eq!(get_at(&inner, 0, "x"), None);

        assign_at(&inner, 2, "x", Value::Bool(true));
        assert_eq!(global.borrow().get_local("x"), Some(Value::Bool(true)));
        assert_eq!(middle.borrow().get_local("x"), Some(Value::Number(1.0)));
    }

    #[test]
    fn assign_to_unbound_name_fails() {
        let global: EnvRef = Rc::new(RefCell::new(Environment::new()));
        let inner = Environment::child_of(&global);

        assert!(!inner.borrow_mut().assign("nope", Value::Nil));
    }
}
