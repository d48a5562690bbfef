use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use slotmap::{SlotMap, new_key_type};
use web_time::{Duration, Instant};

use crate::clock::VirtualClock;
use crate::error::RenderError;
use crate::node::ViewNode;
use crate::output::Output;
use crate::value::{Props, Value};

new_key_type! {
    /// Cancellation handle returned by timer registration.
    pub struct TimerId;
}

pub(crate) type HandlerMap = HashMap<String, Rc<dyn Fn(Option<&Value>)>>;

struct TimerEntry {
    owner: Rc<str>,
    deadline: Instant,
    period: Option<Duration>,
    seq: u64,
    callback: Rc<dyn Fn()>,
}

/// Pending timers, keyed by slotmap handle. Removing a stale key is a no-op,
/// which makes `cancel` idempotent; a cancelled timer can never fire again,
/// even when it was already due.
pub(crate) struct TimerWheel {
    clock: VirtualClock,
    slots: SlotMap<TimerId, TimerEntry>,
    seq: u64,
}

impl TimerWheel {
    pub(crate) fn new(clock: VirtualClock) -> Self {
        Self {
            clock,
            slots: SlotMap::with_key(),
            seq: 0,
        }
    }

    pub(crate) fn register(
        &mut self,
        owner: &str,
        interval: Duration,
        period: Option<Duration>,
        callback: impl Fn() + 'static,
    ) -> TimerId {
        // A zero period would reschedule at the same instant and never
        // drain; downgrade it instead of spinning.
        let period = match period {
            Some(p) if p.is_zero() => {
                log::warn!("zero-period timer owned by `{owner}` downgraded to one-shot");
                None
            }
            other => other,
        };
        self.seq += 1;
        self.slots.insert(TimerEntry {
            owner: Rc::from(owner),
            deadline: self.clock.now() + interval,
            period,
            seq: self.seq,
            callback: Rc::new(callback),
        })
    }

    pub(crate) fn cancel(&mut self, id: TimerId) {
        self.slots.remove(id);
    }

    pub(crate) fn pending(&self) -> usize {
        self.slots.len()
    }

    /// Earliest timer due at or before `until`; ties fire in registration
    /// order.
    fn next_due(&self, until: Instant) -> Option<TimerId> {
        self.slots
            .iter()
            .filter(|(_, e)| e.deadline <= until)
            .min_by_key(|(_, e)| (e.deadline, e.seq))
            .map(|(id, _)| id)
    }

    /// Take one firing: one-shots are removed, periodic timers rescheduled.
    fn fire(&mut self, id: TimerId) -> Option<(Instant, Rc<dyn Fn()>)> {
        let entry = self.slots.get_mut(id)?;
        let deadline = entry.deadline;
        let callback = Rc::clone(&entry.callback);
        log::trace!("firing timer owned by `{}`", entry.owner);
        match entry.period {
            Some(period) => {
                entry.deadline = deadline + period;
                self.seq += 1;
                entry.seq = self.seq;
            }
            None => {
                self.slots.remove(id);
            }
        }
        Some((deadline, callback))
    }
}

/// Discrete external events fed into the scheduler queue.
#[derive(Clone)]
pub enum Event {
    /// A click on a named target registered via `NodeCtx::on_click`.
    Click {
        target: String,
        payload: Option<Value>,
    },
    /// Elapsed wall time; moves the virtual clock and fires due timers.
    Tick { elapsed: Duration },
}

impl Event {
    pub fn click(target: &str) -> Self {
        Event::Click {
            target: target.to_string(),
            payload: None,
        }
    }

    pub fn click_with(target: &str, payload: impl Into<Value>) -> Self {
        Event::Click {
            target: target.to_string(),
            payload: Some(payload.into()),
        }
    }

    pub fn tick(elapsed: Duration) -> Self {
        Event::Tick { elapsed }
    }
}

/// Cooperative, single-threaded event loop. Each event is processed to
/// completion — no preemption, no parallel mutation — and all state changes
/// made by one event batch into exactly one re-evaluation pass over the
/// tree. The committed output only moves on a successful pass; a failing
/// pass reports the error and leaves the previous output visible.
pub struct Scheduler {
    root: ViewNode,
    root_props: Props,
    clock: VirtualClock,
    timers: TimerWheel,
    handlers: HandlerMap,
    queue: VecDeque<Event>,
    committed: Output,
    passes: u64,
}

impl Scheduler {
    /// Activate the tree (running `on_activate` hooks, parent before
    /// children) and commit the initial pass.
    pub fn mount(mut root: ViewNode, root_props: Props) -> Result<Self, RenderError> {
        let clock = VirtualClock::new();
        let mut timers = TimerWheel::new(clock.clone());
        let mut handlers = HandlerMap::new();
        root.activate(&mut timers, &mut handlers);
        let committed = root.evaluate(&root_props)?;
        Ok(Self {
            root,
            root_props,
            clock,
            timers,
            handlers,
            queue: VecDeque::new(),
            committed,
            passes: 1,
        })
    }

    pub fn enqueue(&mut self, event: Event) {
        self.queue.push_back(event);
    }

    /// Enqueue and drain.
    pub fn dispatch(&mut self, event: Event) -> Result<(), RenderError> {
        self.enqueue(event);
        self.run()
    }

    /// Drain the queue in arrival order, one pass per event.
    pub fn run(&mut self) -> Result<(), RenderError> {
        while let Some(event) = self.queue.pop_front() {
            match event {
                Event::Click { target, payload } => {
                    match self.handlers.get(&target) {
                        Some(handler) => {
                            let handler = Rc::clone(handler);
                            handler(payload.as_ref());
                        }
                        None => log::warn!("click on unregistered target `{target}`"),
                    }
                    self.render_pass()?;
                }
                Event::Tick { elapsed } => self.advance(elapsed)?,
            }
        }
        Ok(())
    }

    /// Move virtual time forward, firing due timers in deadline order. Each
    /// firing is its own event: callback, then one pass. The wheel is
    /// re-read between firings, so a callback cancelling another due timer
    /// prevents it.
    pub fn advance(&mut self, by: Duration) -> Result<(), RenderError> {
        let until = self.clock.now() + by;
        while let Some(id) = self.timers.next_due(until) {
            if let Some((deadline, callback)) = self.timers.fire(id) {
                self.clock.set_at(deadline);
                callback();
                self.render_pass()?;
            }
        }
        self.clock.set_at(until);
        Ok(())
    }

    /// Idempotent; cancelling an unknown or already-fired handle is a no-op.
    pub fn cancel(&mut self, id: TimerId) {
        self.timers.cancel(id);
    }

    /// Output committed by the most recent successful pass.
    pub fn output(&self) -> &Output {
        &self.committed
    }

    pub fn root(&self) -> &ViewNode {
        &self.root
    }

    pub fn node(&self, name: &str) -> Option<&ViewNode> {
        self.root.find(name)
    }

    pub fn pass_count(&self) -> u64 {
        self.passes
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.pending()
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Tear the tree down: children before parents, disposers run, timers
    /// cancelled, handlers removed, state holders invalidated.
    pub fn unmount(self) {
        let Scheduler {
            mut root,
            mut timers,
            mut handlers,
            ..
        } = self;
        root.teardown(&mut timers, &mut handlers);
    }

    fn render_pass(&mut self) -> Result<(), RenderError> {
        let out = self.root.evaluate(&self.root_props)?;
        self.committed = out;
        self.passes += 1;
        Ok(())
    }
}
