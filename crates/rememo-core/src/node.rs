use std::cell::RefCell;
use std::rc::Rc;

use smallvec::SmallVec;
use web_time::Duration;

use crate::equality::{Decision, EqualityPolicy};
use crate::error::RenderError;
use crate::memo::{CellState, MemoCell};
use crate::output::Output;
use crate::scheduler::{HandlerMap, TimerId, TimerWheel};
use crate::state::StateHolder;
use crate::value::{Props, Value};

pub type RenderFn = Rc<dyn Fn(&Props, &RenderScope<'_>) -> Result<Output, RenderError>>;
pub type PropsFn = Rc<dyn Fn(&Props, &RenderScope<'_>) -> Result<Props, RenderError>>;
pub type GateFn = Rc<dyn Fn(&Props, &RenderScope<'_>) -> Value>;
pub type ActivateFn = Rc<dyn Fn(&mut NodeCtx<'_>)>;

/// Cleanup guard registered during activation; runs at most once.
#[derive(Clone)]
pub struct Dispose(Rc<RefCell<Option<Box<dyn FnOnce()>>>>);

impl Dispose {
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self(Rc::new(RefCell::new(Some(Box::new(f)))))
    }

    /// Safe to call multiple times.
    pub fn run(&self) {
        if let Some(f) = self.0.borrow_mut().take() {
            f()
        }
    }
}

/// What a node's render and props closures can see: the node's own state
/// holders and named memo cells. Child props derive from the parent's props
/// plus this scope.
pub struct RenderScope<'a> {
    node: &'a str,
    holders: &'a [StateHolder],
    cells: &'a [NamedCell],
}

impl RenderScope<'_> {
    pub fn state(&self, name: &str) -> Result<StateHolder, RenderError> {
        self.holders
            .iter()
            .find(|h| h.name().as_ref() == name)
            .cloned()
            .ok_or_else(|| RenderError::UnknownState {
                name: format!("{}.{name}", self.node),
            })
    }

    /// Evaluate the named memo cell against `deps`. Returns the cached value
    /// when the snapshot matches; see [`MemoCell::evaluate`].
    pub fn memo(&self, name: &str, deps: &[Value]) -> Result<Value, RenderError> {
        let cell = self
            .cells
            .iter()
            .find(|c| c.cell.borrow().label() == name)
            .ok_or_else(|| RenderError::UnknownCell {
                name: format!("{}.{name}", self.node),
            })?;
        cell.cell.borrow_mut().evaluate(deps)
    }
}

/// Handed to `on_activate` hooks: create node-owned state, register timers
/// and click handlers, and queue cleanup. Everything registered here is torn
/// down with the node — timers are cancelled, handlers deregistered, holders
/// invalidated.
pub struct NodeCtx<'a> {
    node: Rc<str>,
    holders: &'a mut Vec<StateHolder>,
    disposers: &'a mut Vec<Dispose>,
    timer_ids: &'a mut Vec<TimerId>,
    handler_names: &'a mut Vec<String>,
    timers: &'a mut TimerWheel,
    handlers: &'a mut HandlerMap,
}

impl NodeCtx<'_> {
    pub fn state(&mut self, name: &str, initial: impl Into<Value>) -> StateHolder {
        let holder = StateHolder::new(name, initial);
        self.holders.push(holder.clone());
        holder
    }

    /// One-shot timer. The handle can be cancelled through the scheduler;
    /// deactivating the node cancels it regardless.
    pub fn after(&mut self, interval: Duration, callback: impl Fn() + 'static) -> TimerId {
        let id = self.timers.register(&self.node, interval, None, callback);
        self.timer_ids.push(id);
        id
    }

    /// Repeating timer with a fixed period.
    pub fn every(&mut self, period: Duration, callback: impl Fn() + 'static) -> TimerId {
        let id = self.timers.register(&self.node, period, Some(period), callback);
        self.timer_ids.push(id);
        id
    }

    /// Named click target; `dispatch(Event::Click { target, .. })` runs it.
    pub fn on_click(&mut self, target: &str, handler: impl Fn(Option<&Value>) + 'static) {
        if self.handlers.contains_key(target) {
            log::warn!("click target `{target}` registered twice; replacing");
        }
        self.handlers.insert(target.to_string(), Rc::new(handler));
        self.handler_names.push(target.to_string());
    }

    pub fn on_deactivate(&mut self, f: impl FnOnce() + 'static) {
        self.disposers.push(Dispose::new(f));
    }
}

struct NamedCell {
    cell: RefCell<MemoCell>,
}

enum ChildKind {
    /// Always recursed into when the parent renders.
    Plain,
    /// Wrapped by an equality policy; `Unchanged` reuses the cached subtree
    /// output verbatim, without recursing.
    Memo {
        policy: EqualityPolicy,
        last_props: Option<Props>,
        cached: Option<Output>,
        state: CellState,
    },
    /// Conditionally rendered on a gate value; see [`Value::gate_closed`].
    Gated { gate: GateFn },
}

struct Child {
    props: PropsFn,
    kind: ChildKind,
    node: ViewNode,
}

/// A renderable unit: its own render closure, node-owned state holders and
/// memo cells, and an ordered list of children. A node's output is a pure
/// function of its props and the current values of its cells and holders.
///
/// Evaluation order is fixed: the node's own output first (recomputed
/// unconditionally whenever the node is reached), then children in declared
/// order, parent before child. There is no priority scheduling.
pub struct ViewNode {
    name: Rc<str>,
    render: RenderFn,
    activate_hook: Option<ActivateFn>,
    children: Vec<Child>,
    cells: Vec<NamedCell>,
    holders: Vec<StateHolder>,
    disposers: Vec<Dispose>,
    timer_ids: Vec<TimerId>,
    handler_names: Vec<String>,
    active: bool,
    renders: u64,
}

impl ViewNode {
    pub fn new(
        name: &str,
        render: impl Fn(&Props, &RenderScope<'_>) -> Result<Output, RenderError> + 'static,
    ) -> Self {
        Self {
            name: Rc::from(name),
            render: Rc::new(render),
            activate_hook: None,
            children: Vec::new(),
            cells: Vec::new(),
            holders: Vec::new(),
            disposers: Vec::new(),
            timer_ids: Vec::new(),
            handler_names: Vec::new(),
            active: false,
            renders: 0,
        }
    }

    /// A node that renders a fixed text and nothing else.
    pub fn text(name: &str, text: &str) -> Self {
        let text = text.to_string();
        Self::new(name, move |_, _| Ok(Output::text(text.clone())))
    }

    pub fn on_activate(mut self, hook: impl Fn(&mut NodeCtx<'_>) + 'static) -> Self {
        self.activate_hook = Some(Rc::new(hook));
        self
    }

    pub fn memo_cell(mut self, cell: MemoCell) -> Self {
        self.cells.push(NamedCell {
            cell: RefCell::new(cell),
        });
        self
    }

    pub fn child(
        mut self,
        props: impl Fn(&Props, &RenderScope<'_>) -> Result<Props, RenderError> + 'static,
        node: ViewNode,
    ) -> Self {
        self.children.push(Child {
            props: Rc::new(props),
            kind: ChildKind::Plain,
            node,
        });
        self
    }

    pub fn memo_child(
        mut self,
        props: impl Fn(&Props, &RenderScope<'_>) -> Result<Props, RenderError> + 'static,
        policy: EqualityPolicy,
        node: ViewNode,
    ) -> Self {
        self.children.push(Child {
            props: Rc::new(props),
            kind: ChildKind::Memo {
                policy,
                last_props: None,
                cached: None,
                state: CellState::Fresh,
            },
            node,
        });
        self
    }

    pub fn gated_child(
        mut self,
        gate: impl Fn(&Props, &RenderScope<'_>) -> Value + 'static,
        props: impl Fn(&Props, &RenderScope<'_>) -> Result<Props, RenderError> + 'static,
        node: ViewNode,
    ) -> Self {
        self.children.push(Child {
            props: Rc::new(props),
            kind: ChildKind::Gated {
                gate: Rc::new(gate),
            },
            node,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// How many times this node's render closure has run. Skipped passes do
    /// not count; this is what the skip decision is verified against.
    pub fn render_count(&self) -> u64 {
        self.renders
    }

    /// State of this node's memo-wrapped child, if it has one at `child`.
    pub fn memo_child_state(&self, child: &str) -> Option<CellState> {
        self.children.iter().find_map(|c| match &c.kind {
            ChildKind::Memo { state, .. } if c.node.name.as_ref() == child => Some(*state),
            _ => None,
        })
    }

    /// Compute count of the named memo cell on this node.
    pub fn cell_compute_count(&self, name: &str) -> Option<u64> {
        self.cells
            .iter()
            .find(|c| c.cell.borrow().label() == name)
            .map(|c| c.cell.borrow().compute_count())
    }

    pub fn cell_state(&self, name: &str) -> Option<CellState> {
        self.cells
            .iter()
            .find(|c| c.cell.borrow().label() == name)
            .map(|c| c.cell.borrow().state())
    }

    /// Depth-first lookup by node name.
    pub fn find(&self, name: &str) -> Option<&ViewNode> {
        if self.name.as_ref() == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.node.find(name))
    }

    pub(crate) fn activate(&mut self, timers: &mut TimerWheel, handlers: &mut HandlerMap) {
        if self.active {
            return;
        }
        self.active = true;
        if let Some(hook) = self.activate_hook.clone() {
            let mut ctx = NodeCtx {
                node: self.name.clone(),
                holders: &mut self.holders,
                disposers: &mut self.disposers,
                timer_ids: &mut self.timer_ids,
                handler_names: &mut self.handler_names,
                timers,
                handlers,
            };
            hook(&mut ctx);
        }
        for child in &mut self.children {
            child.node.activate(timers, handlers);
        }
    }

    /// Children first, then this node's disposers, timers, handlers and
    /// holders. After this the node must not be observed mutating anything.
    pub(crate) fn teardown(&mut self, timers: &mut TimerWheel, handlers: &mut HandlerMap) {
        for child in &mut self.children {
            child.node.teardown(timers, handlers);
        }
        for dispose in self.disposers.drain(..) {
            dispose.run();
        }
        for id in self.timer_ids.drain(..) {
            timers.cancel(id);
        }
        for name in self.handler_names.drain(..) {
            handlers.remove(&name);
        }
        for holder in &self.holders {
            holder.invalidate();
        }
        self.active = false;
    }

    pub(crate) fn evaluate(&mut self, props: &Props) -> Result<Output, RenderError> {
        self.renders += 1;
        let render = Rc::clone(&self.render);

        // Own output and per-child inputs are computed under the scope
        // borrow; recursion into children happens after it ends.
        enum Input {
            Props(Props),
            // closed gate: no output, no props computation, no recursion
            Skip,
            // 0 / "" gate: the gate value itself is the visible output
            Literal(Value),
        }

        let mut inputs: SmallVec<[Input; 4]> = SmallVec::new();
        let own = {
            let scope = RenderScope {
                node: &self.name,
                holders: &self.holders,
                cells: &self.cells,
            };
            let own = render(props, &scope)?;
            for child in &self.children {
                let input = match &child.kind {
                    ChildKind::Gated { gate } => {
                        let gate = gate(props, &scope);
                        if gate.gate_closed() {
                            Input::Skip
                        } else if gate.falsy_visible() {
                            Input::Literal(gate)
                        } else {
                            Input::Props((child.props)(props, &scope)?)
                        }
                    }
                    _ => Input::Props((child.props)(props, &scope)?),
                };
                inputs.push(input);
            }
            own
        };

        if self.children.is_empty() {
            return Ok(own);
        }

        let mut parts = Vec::with_capacity(1 + self.children.len());
        parts.push(own);
        for (child, input) in self.children.iter_mut().zip(inputs) {
            let next = match input {
                Input::Skip => continue,
                Input::Literal(gate) => {
                    parts.push(Output::text(gate.to_string()));
                    continue;
                }
                Input::Props(next) => next,
            };
            match &mut child.kind {
                ChildKind::Plain | ChildKind::Gated { .. } => {
                    parts.push(child.node.evaluate(&next)?)
                }
                ChildKind::Memo {
                    policy,
                    last_props,
                    cached,
                    state,
                } => {
                    let reuse = match (&*last_props, &*cached) {
                        (Some(prev), Some(out)) => {
                            if policy.evaluate(prev, &next) == Decision::Unchanged {
                                *state = CellState::Cached;
                                Some(out.clone())
                            } else {
                                *state = CellState::Stale;
                                None
                            }
                        }
                        _ => None,
                    };
                    match reuse {
                        Some(out) => parts.push(out),
                        None => {
                            let out = child.node.evaluate(&next)?;
                            *last_props = Some(next);
                            *cached = Some(out.clone());
                            *state = CellState::Cached;
                            parts.push(out);
                        }
                    }
                }
            }
        }
        Ok(Output::Group(parts))
    }

    #[cfg(feature = "inspector")]
    pub fn dump(&self) -> String {
        fn walk(node: &ViewNode, depth: usize, out: &mut String) {
            use std::fmt::Write;
            let _ = writeln!(
                out,
                "{:indent$}{} (renders: {})",
                "",
                node.name,
                node.renders,
                indent = depth * 2
            );
            for child in &node.children {
                walk(&child.node, depth + 1, out);
            }
        }
        let mut out = String::new();
        walk(self, 0, &mut out);
        out
    }
}

impl std::fmt::Debug for ViewNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewNode")
            .field("name", &self.name)
            .field("children", &self.children.len())
            .field("renders", &self.renders)
            .field("active", &self.active)
            .finish()
    }
}
