use std::cell::RefCell;
use std::rc::Rc;

use crate::value::Value;

/// Named mutable container owned by exactly one view node. Replacing the
/// held value is the only mutation; the old value is discarded. Holders are
/// invalidated when their owner is torn down — a write after that point is a
/// programming error (typically a leaked timer) and is rejected with a
/// warning.
#[derive(Clone)]
pub struct StateHolder(Rc<RefCell<Inner>>);

struct Inner {
    name: Rc<str>,
    value: Value,
    version: u64,
    alive: bool,
}

impl StateHolder {
    pub fn new(name: &str, initial: impl Into<Value>) -> Self {
        StateHolder(Rc::new(RefCell::new(Inner {
            name: Rc::from(name),
            value: initial.into(),
            version: 0,
            alive: true,
        })))
    }

    pub fn name(&self) -> Rc<str> {
        self.0.borrow().name.clone()
    }

    pub fn get(&self) -> Value {
        self.0.borrow().value.clone()
    }

    pub fn set(&self, value: impl Into<Value>) {
        let mut inner = self.0.borrow_mut();
        if !inner.alive {
            log::warn!(
                "state holder `{}` written after its owner was torn down; ignoring (leaked timer?)",
                inner.name
            );
            return;
        }
        inner.value = value.into();
        inner.version += 1;
    }

    pub fn update(&self, f: impl FnOnce(&Value) -> Value) {
        let next = f(&self.0.borrow().value);
        self.set(next);
    }

    pub fn version(&self) -> u64 {
        self.0.borrow().version
    }

    pub(crate) fn invalidate(&self) {
        self.0.borrow_mut().alive = false;
    }
}

impl std::fmt::Debug for StateHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.0.borrow();
        f.debug_struct("StateHolder")
            .field("name", &inner.name)
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("alive", &inner.alive)
            .finish()
    }
}
