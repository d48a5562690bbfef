use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use crate::value::Props;

/// Outcome of a props comparison: `Unchanged` skips the wrapped subtree,
/// `Changed` re-renders it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Unchanged,
    Changed,
}

/// Decides whether a memo-wrapped child sees its props as changed.
///
/// Policies must be pure and deterministic; the skip decision is only sound
/// if the same inputs always produce the same answer. A `Custom` policy that
/// panics is caught and treated as `Changed` — fail open and re-render
/// rather than silently freeze a subtree.
#[derive(Clone)]
pub enum EqualityPolicy {
    /// Field-by-field comparison of top-level props. Scalars compare by
    /// value, records and lists by identity, so a freshly built nested
    /// record reports `Changed` even when its fields are equal.
    Shallow,
    /// `Unchanged` iff the designated fields compare equal; every other
    /// field is intentionally masked.
    Fields(Rc<[Rc<str>]>),
    Custom(Rc<dyn Fn(&Props, &Props) -> Decision>),
}

impl EqualityPolicy {
    pub fn fields<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let names: Vec<Rc<str>> = names.into_iter().map(Rc::from).collect();
        EqualityPolicy::Fields(Rc::from(names))
    }

    pub fn custom(f: impl Fn(&Props, &Props) -> Decision + 'static) -> Self {
        EqualityPolicy::Custom(Rc::new(f))
    }

    pub fn evaluate(&self, prev: &Props, next: &Props) -> Decision {
        // Identical props object: unchanged without any field comparison.
        if prev.same_object(next) {
            return Decision::Unchanged;
        }
        match self {
            EqualityPolicy::Shallow => shallow(prev, next),
            EqualityPolicy::Fields(names) => {
                let equal = names
                    .iter()
                    .all(|name| prev.get(name) == next.get(name));
                if equal { Decision::Unchanged } else { Decision::Changed }
            }
            EqualityPolicy::Custom(f) => {
                match catch_unwind(AssertUnwindSafe(|| f(prev, next))) {
                    Ok(decision) => decision,
                    Err(_) => {
                        log::warn!("custom equality policy panicked; treating props as changed");
                        Decision::Changed
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for EqualityPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EqualityPolicy::Shallow => write!(f, "Shallow"),
            EqualityPolicy::Fields(names) => f.debug_tuple("Fields").field(names).finish(),
            EqualityPolicy::Custom(_) => write!(f, "Custom(<fn>)"),
        }
    }
}

fn shallow(prev: &Props, next: &Props) -> Decision {
    if prev.record().len() != next.record().len() {
        return Decision::Changed;
    }
    let equal = prev
        .record()
        .fields()
        .all(|(name, value)| next.get(name) == Some(value));
    if equal { Decision::Unchanged } else { Decision::Changed }
}
