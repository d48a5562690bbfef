use std::rc::Rc;

use smallvec::SmallVec;

use crate::error::RenderError;
use crate::value::Value;

pub type Snapshot = SmallVec<[Value; 4]>;

/// Lifecycle of a memoized computation or a memo-wrapped subtree.
///
/// `Fresh` → `Cached` on first evaluation; `Cached` → `Stale` when the
/// inputs differ; `Stale` → `Cached` when the recompute completes. A failed
/// recompute stays `Stale` with the previous cache untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellState {
    Fresh,
    Cached,
    Stale,
}

/// Caches one computation keyed by its last-seen dependency snapshot.
///
/// `evaluate` compares the new dependencies elementwise against the stored
/// snapshot (scalars by value, records and lists by identity — see
/// [`Value`]); on a match the cached output is returned without invoking the
/// compute function. The compute function therefore runs at most once per
/// *distinct* snapshot in sequence, never once per call.
pub struct MemoCell {
    label: Rc<str>,
    compute: Rc<dyn Fn(&[Value]) -> Result<Value, RenderError>>,
    once: bool,
    snapshot: Option<Snapshot>,
    cached: Option<Value>,
    state: CellState,
    computes: u64,
}

impl MemoCell {
    pub fn new(
        label: &str,
        compute: impl Fn(&[Value]) -> Result<Value, RenderError> + 'static,
    ) -> Self {
        Self {
            label: Rc::from(label),
            compute: Rc::new(compute),
            once: false,
            snapshot: None,
            cached: None,
            state: CellState::Fresh,
            computes: 0,
        }
    }

    /// A cell with a permanently empty dependency snapshot: the computation
    /// runs exactly once, on first evaluation, and the cached value is
    /// returned forever after regardless of how often the owner re-renders.
    pub fn once(
        label: &str,
        compute: impl Fn(&[Value]) -> Result<Value, RenderError> + 'static,
    ) -> Self {
        let mut cell = Self::new(label, compute);
        cell.once = true;
        cell
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> CellState {
        self.state
    }

    /// How many times the compute function has actually run.
    pub fn compute_count(&self) -> u64 {
        self.computes
    }

    pub fn cached(&self) -> Option<&Value> {
        self.cached.as_ref()
    }

    pub fn evaluate(&mut self, deps: &[Value]) -> Result<Value, RenderError> {
        let deps: &[Value] = if self.once { &[] } else { deps };

        if let (Some(snapshot), Some(cached)) = (&self.snapshot, &self.cached)
            && snapshot_matches(snapshot, deps)
        {
            self.state = CellState::Cached;
            return Ok(cached.clone());
        }

        // Mark stale before computing so a failing compute leaves the cell
        // stale and the previous cache intact.
        if self.state == CellState::Cached {
            self.state = CellState::Stale;
        }
        self.computes += 1;
        let out = (self.compute)(deps)?;
        self.snapshot = Some(deps.iter().cloned().collect());
        self.cached = Some(out.clone());
        self.state = CellState::Cached;
        Ok(out)
    }
}

impl std::fmt::Debug for MemoCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoCell")
            .field("label", &self.label)
            .field("state", &self.state)
            .field("computes", &self.computes)
            .field("has_value", &self.cached.is_some())
            .finish()
    }
}

fn snapshot_matches(snapshot: &[Value], deps: &[Value]) -> bool {
    snapshot.len() == deps.len() && snapshot.iter().zip(deps).all(|(a, b)| a == b)
}
