use std::cell::Cell;
use std::rc::Rc;

use web_time::Instant;

/// Deterministic clock driving the scheduler's timers. Time only moves when
/// the scheduler advances it (`Scheduler::advance` or a `Tick` event), so
/// tests can step through timer schedules without sleeping.
#[derive(Clone)]
pub struct VirtualClock(Rc<Cell<Instant>>);

impl VirtualClock {
    pub fn new() -> Self {
        VirtualClock(Rc::new(Cell::new(Instant::now())))
    }

    pub fn now(&self) -> Instant {
        self.0.get()
    }

    /// Move to an absolute point, never backwards.
    pub(crate) fn set_at(&self, t: Instant) {
        if t > self.0.get() {
            self.0.set(t);
        }
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}
