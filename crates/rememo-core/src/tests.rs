#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use web_time::Duration;

    use crate::equality::{Decision, EqualityPolicy};
    use crate::error::RenderError;
    use crate::memo::{CellState, MemoCell};
    use crate::node::ViewNode;
    use crate::output::Output;
    use crate::scheduler::{Event, Scheduler, TimerId};
    use crate::value::{Props, Record, Value};

    fn init_logs() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn props(record: Record) -> Props {
        Props::new(record)
    }

    fn bump(holder: &crate::state::StateHolder) {
        holder.update(|v| Value::Int(v.as_int().unwrap_or(0) + 1));
    }

    // ---- memo cells -------------------------------------------------------

    #[test]
    fn equal_snapshots_hit_the_cache() {
        let mut cell = MemoCell::new("sum", |deps| {
            let total: i64 = deps.iter().filter_map(Value::as_int).sum();
            Ok(Value::Int(total))
        });

        assert_eq!(cell.state(), CellState::Fresh);
        assert_eq!(cell.evaluate(&[Value::Int(1), Value::Int(2)]).unwrap(), Value::Int(3));
        assert_eq!(cell.evaluate(&[Value::Int(1), Value::Int(2)]).unwrap(), Value::Int(3));
        assert_eq!(cell.compute_count(), 1);
        assert_eq!(cell.state(), CellState::Cached);
    }

    #[test]
    fn distinct_snapshots_each_compute_once() {
        let mut cell = MemoCell::new("sum", |deps| {
            let total: i64 = deps.iter().filter_map(Value::as_int).sum();
            Ok(Value::Int(total))
        });

        cell.evaluate(&[Value::Int(1)]).unwrap();
        cell.evaluate(&[Value::Int(2)]).unwrap();
        cell.evaluate(&[Value::Int(2)]).unwrap();
        // Length difference is a difference too.
        cell.evaluate(&[Value::Int(2), Value::Int(0)]).unwrap();
        assert_eq!(cell.compute_count(), 3);
    }

    #[test]
    fn record_dependencies_are_snapshotted_by_identity() {
        // Deps that carry Rcs have to be cloned into the snapshot; the
        // stored copy then compares by identity, not by field contents.
        let mut cell = MemoCell::new("who", |deps| Ok(deps[0].clone()));

        let shared = Value::from(Record::new().field("id", 1));
        cell.evaluate(std::slice::from_ref(&shared)).unwrap();
        cell.evaluate(std::slice::from_ref(&shared)).unwrap();
        assert_eq!(cell.compute_count(), 1);

        let rebuilt = Value::from(Record::new().field("id", 1));
        cell.evaluate(&[rebuilt]).unwrap();
        assert_eq!(cell.compute_count(), 2);
    }

    #[test]
    fn once_cell_computes_exactly_once() {
        let mut cell = MemoCell::once("users", |_| {
            Ok(Value::list(vec![Value::str("Alice"), Value::str("Bob")]))
        });

        let first = cell.evaluate(&[]).unwrap();
        // Even nonsense deps are ignored: the snapshot is permanently empty.
        let second = cell.evaluate(&[Value::Int(99)]).unwrap();
        let third = cell.evaluate(&[]).unwrap();
        assert_eq!(cell.compute_count(), 1);
        assert_eq!(first, second);
        assert_eq!(second, third); // identical Rc, identity-equal
    }

    #[test]
    fn failing_compute_keeps_previous_cache() {
        let mut cell = MemoCell::new("checked", |deps| match deps[0].as_int() {
            Some(n) if n >= 0 => Ok(Value::Int(n)),
            _ => Err(RenderError::compute("checked", "negative input")),
        });

        assert_eq!(cell.evaluate(&[Value::Int(7)]).unwrap(), Value::Int(7));
        assert!(cell.evaluate(&[Value::Int(-1)]).is_err());
        assert_eq!(cell.state(), CellState::Stale);
        assert_eq!(cell.cached(), Some(&Value::Int(7)));
        // The stored snapshot is also untouched, so the old deps still hit.
        assert_eq!(cell.evaluate(&[Value::Int(7)]).unwrap(), Value::Int(7));
        assert_eq!(cell.compute_count(), 2);
    }

    // ---- equality policies ------------------------------------------------

    fn user_props(id: i64, name: &str, email: &str) -> Props {
        props(
            Record::new()
                .field("id", id)
                .field("name", name)
                .field("email", email),
        )
    }

    #[test]
    fn fields_policy_masks_undesignated_fields() {
        let policy = EqualityPolicy::fields(["id", "name"]);
        let prev = user_props(1, "Bob", "bob@example.com");
        let next = user_props(1, "Bob", "bob42@example.com");
        assert_eq!(policy.evaluate(&prev, &next), Decision::Unchanged);

        let renamed = user_props(1, "Alice", "bob@example.com");
        assert_eq!(policy.evaluate(&prev, &renamed), Decision::Changed);
    }

    #[test]
    fn shallow_policy_compares_scalars_by_value() {
        let prev = user_props(1, "Bob", "bob@example.com");
        let next = user_props(1, "Bob", "bob@example.com");
        // Fresh Props object, but every field is a scalar: unchanged.
        assert_eq!(EqualityPolicy::Shallow.evaluate(&prev, &next), Decision::Unchanged);
    }

    #[test]
    fn shallow_policy_sees_fresh_records_as_changed() {
        // The case the custom-policy samples exist to work around: a record
        // rebuilt every pass has a new identity even with equal fields.
        let prev = props(Record::new().field("user", Record::new().field("id", 1)));
        let next = props(Record::new().field("user", Record::new().field("id", 1)));
        assert_eq!(EqualityPolicy::Shallow.evaluate(&prev, &next), Decision::Changed);

        let shared = Value::from(Record::new().field("id", 1));
        let prev = props(Record::new().field("user", shared.clone()));
        let next = props(Record::new().field("user", shared));
        assert_eq!(EqualityPolicy::Shallow.evaluate(&prev, &next), Decision::Unchanged);
    }

    #[test]
    fn identical_props_object_short_circuits() {
        let policy = EqualityPolicy::custom(|_, _| panic!("must not be called"));
        let p = user_props(1, "Bob", "bob@example.com");
        assert_eq!(policy.evaluate(&p, &p.clone()), Decision::Unchanged);
    }

    #[test]
    fn panicking_custom_policy_fails_open() {
        init_logs();
        let policy = EqualityPolicy::custom(|_, _| panic!("bad policy"));
        let prev = user_props(1, "Bob", "a@example.com");
        let next = user_props(1, "Bob", "b@example.com");
        assert_eq!(policy.evaluate(&prev, &next), Decision::Changed);
    }

    // ---- view tree / skip decision ----------------------------------------

    fn counter_root(child_label: &'static str) -> ViewNode {
        ViewNode::new("parent", |_, scope| {
            let count = scope.state("count")?;
            Ok(Output::text(format!("count={}", count.get())))
        })
        .on_activate(|ctx| {
            let count = ctx.state("count", 0);
            ctx.on_click("bump", move |_| bump(&count));
        })
        .memo_child(
            move |_, _| Ok(props(Record::new().field("label", child_label))),
            EqualityPolicy::Shallow,
            ViewNode::new("child", |p, _| {
                let label = p.get("label").cloned().unwrap_or(Value::Unit);
                Ok(Output::text(label.to_string()))
            }),
        )
    }

    #[test]
    fn memoized_child_skips_irrelevant_parent_renders() {
        let mut sched = Scheduler::mount(counter_root("static"), Props::empty()).unwrap();
        assert_eq!(sched.node("child").unwrap().render_count(), 1);

        sched.dispatch(Event::click("bump")).unwrap();
        sched.dispatch(Event::click("bump")).unwrap();

        assert_eq!(sched.node("parent").unwrap().render_count(), 3);
        assert_eq!(sched.node("child").unwrap().render_count(), 1);
        assert_eq!(
            sched.node("parent").unwrap().memo_child_state("child"),
            Some(CellState::Cached)
        );
        assert_eq!(sched.output().flatten(), "count=2static");
    }

    #[test]
    fn unmemoized_child_rerenders_with_parent() {
        let root = ViewNode::new("parent", |_, scope| {
            let count = scope.state("count")?;
            Ok(Output::text(format!("count={}", count.get())))
        })
        .on_activate(|ctx| {
            let count = ctx.state("count", 0);
            ctx.on_click("bump", move |_| bump(&count));
        })
        .child(
            |_, _| Ok(Props::empty()),
            ViewNode::text("child", "leaf"),
        );

        let mut sched = Scheduler::mount(root, Props::empty()).unwrap();
        sched.dispatch(Event::click("bump")).unwrap();
        sched.dispatch(Event::click("bump")).unwrap();
        assert_eq!(sched.node("child").unwrap().render_count(), 3);
    }

    #[test]
    fn fresh_nested_record_defeats_shallow_memo() {
        let root = ViewNode::new("parent", |_, scope| {
            let count = scope.state("count")?;
            Ok(Output::text(format!("count={}", count.get())))
        })
        .on_activate(|ctx| {
            let count = ctx.state("count", 0);
            ctx.on_click("bump", move |_| bump(&count));
        })
        .memo_child(
            // Rebuilt record each pass: new identity, shallow sees Changed.
            |_, _| Ok(props(Record::new().field("user", Record::new().field("id", 1)))),
            EqualityPolicy::Shallow,
            ViewNode::text("child", "leaf"),
        );

        let mut sched = Scheduler::mount(root, Props::empty()).unwrap();
        sched.dispatch(Event::click("bump")).unwrap();
        sched.dispatch(Event::click("bump")).unwrap();
        assert_eq!(sched.node("child").unwrap().render_count(), 3);
    }

    fn gated_root(initial: Value) -> ViewNode {
        ViewNode::new("parent", |_, _| Ok(Output::text("home")))
            .on_activate(move |ctx| {
                let gate = ctx.state("gate", initial.clone());
                ctx.on_click("set-gate", move |payload| {
                    gate.set(payload.cloned().unwrap_or(Value::Unit));
                });
            })
            .gated_child(
                |_, scope| scope.state("gate").map(|h| h.get()).unwrap_or(Value::Unit),
                |_, scope| {
                    let gate = scope.state("gate")?;
                    Ok(props(Record::new().field("selected", gate.get())))
                },
                ViewNode::new("banner", |p, _| {
                    let selected = p.get("selected").cloned().unwrap_or(Value::Unit);
                    Ok(Output::text(format!("selected: {selected}")))
                }),
            )
    }

    #[test]
    fn closed_gate_renders_nothing_and_skips_the_child() {
        let sched = Scheduler::mount(gated_root(Value::Unit), Props::empty()).unwrap();
        assert_eq!(sched.output().flatten(), "home");
        assert_eq!(sched.node("banner").unwrap().render_count(), 0);
    }

    #[test]
    fn open_gate_renders_the_child() {
        let mut sched = Scheduler::mount(gated_root(Value::Unit), Props::empty()).unwrap();
        sched.dispatch(Event::click_with("set-gate", 7)).unwrap();
        assert_eq!(sched.output().flatten(), "homeselected: 7");
        assert_eq!(sched.node("banner").unwrap().render_count(), 1);
    }

    #[test]
    fn zero_gate_is_rendered_as_visible_output() {
        // The documented pitfall: `0` does not close the gate, it *is* the
        // output, and the wrapped child is never evaluated.
        let mut sched = Scheduler::mount(gated_root(Value::Unit), Props::empty()).unwrap();
        sched.dispatch(Event::click_with("set-gate", 0)).unwrap();
        assert_eq!(sched.output().flatten(), "home0");
        assert_eq!(sched.node("banner").unwrap().render_count(), 0);

        sched.dispatch(Event::click_with("set-gate", false)).unwrap();
        assert_eq!(sched.output().flatten(), "home");
    }

    #[test]
    fn once_cell_gives_identity_stable_child_props() {
        let root = ViewNode::new("parent", |_, scope| {
            let count = scope.state("count")?;
            Ok(Output::text(format!("count={}", count.get())))
        })
        .on_activate(|ctx| {
            let count = ctx.state("count", 0);
            ctx.on_click("bump", move |_| bump(&count));
        })
        .memo_cell(MemoCell::once("users", |_| {
            Ok(Value::list(vec![Value::str("Alice"), Value::str("Bob")]))
        }))
        .memo_child(
            |_, scope| Ok(props(Record::new().field("users", scope.memo("users", &[])?))),
            EqualityPolicy::Shallow,
            ViewNode::new("list", |p, _| {
                let users = p.get("users").cloned().unwrap_or(Value::Unit);
                Ok(Output::text(users.to_string()))
            }),
        );

        let mut sched = Scheduler::mount(root, Props::empty()).unwrap();
        sched.dispatch(Event::click("bump")).unwrap();
        sched.dispatch(Event::click("bump")).unwrap();

        // The list value is the same Rc every pass, so shallow comparison
        // reports Unchanged even though the Props object is rebuilt.
        assert_eq!(sched.node("list").unwrap().render_count(), 1);
        assert_eq!(sched.node("parent").unwrap().cell_compute_count("users"), Some(1));
        assert_eq!(sched.node("parent").unwrap().cell_state("users"), Some(CellState::Cached));
    }

    // ---- scheduler: batching, errors --------------------------------------

    #[test]
    fn mutations_in_one_handler_batch_into_one_pass() {
        let root = ViewNode::new("parent", |_, scope| {
            let a = scope.state("a")?;
            let b = scope.state("b")?;
            Ok(Output::text(format!("{} {}", a.get(), b.get())))
        })
        .on_activate(|ctx| {
            let a = ctx.state("a", 0);
            let b = ctx.state("b", 0);
            ctx.on_click("both", move |_| {
                bump(&a);
                bump(&b);
            });
        });

        let mut sched = Scheduler::mount(root, Props::empty()).unwrap();
        assert_eq!(sched.pass_count(), 1);
        sched.dispatch(Event::click("both")).unwrap();
        assert_eq!(sched.pass_count(), 2);
        assert_eq!(sched.output().flatten(), "1 1");
    }

    #[test]
    fn queued_events_process_in_arrival_order() {
        let log: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));
        let root = ViewNode::new("parent", |_, _| Ok(Output::Empty)).on_activate({
            let log = log.clone();
            move |ctx| {
                let first = log.clone();
                ctx.on_click("first", move |_| first.borrow_mut().push("first"));
                let second = log.clone();
                ctx.on_click("second", move |_| second.borrow_mut().push("second"));
            }
        });

        let mut sched = Scheduler::mount(root, Props::empty()).unwrap();
        sched.enqueue(Event::click("first"));
        sched.enqueue(Event::click("second"));
        sched.run().unwrap();
        assert_eq!(*log.borrow(), vec!["first", "second"]);
        assert_eq!(sched.pass_count(), 3);
    }

    #[test]
    fn failing_render_keeps_last_committed_output() {
        let root = ViewNode::new("parent", |_, scope| {
            let broken = scope.state("broken")?;
            if broken.get() == Value::Bool(true) {
                return Err(RenderError::render("parent", "boom"));
            }
            Ok(Output::text("ok"))
        })
        .on_activate(|ctx| {
            let broken = ctx.state("broken", false);
            ctx.on_click("break", move |_| broken.set(true));
        });

        let mut sched = Scheduler::mount(root, Props::empty()).unwrap();
        assert_eq!(sched.output().flatten(), "ok");
        assert!(sched.dispatch(Event::click("break")).is_err());
        // Previous committed output stays visible.
        assert_eq!(sched.output().flatten(), "ok");
        assert_eq!(sched.pass_count(), 1);
    }

    #[test]
    fn unknown_click_target_still_completes_the_pass() {
        init_logs();
        let mut sched =
            Scheduler::mount(ViewNode::text("parent", "hi"), Props::empty()).unwrap();
        sched.dispatch(Event::click("nobody-home")).unwrap();
        assert_eq!(sched.pass_count(), 2);
    }

    // ---- timers ------------------------------------------------------------

    fn timer_root(
        interval: Duration,
        handle_out: Rc<Cell<Option<TimerId>>>,
        fires: Rc<Cell<u32>>,
    ) -> ViewNode {
        ViewNode::new("parent", |_, scope| {
            let ticks = scope.state("ticks")?;
            Ok(Output::text(format!("ticks={}", ticks.get())))
        })
        .on_activate(move |ctx| {
            let ticks = ctx.state("ticks", 0);
            let fires = fires.clone();
            let id = ctx.after(interval, move || {
                fires.set(fires.get() + 1);
                bump(&ticks);
            });
            handle_out.set(Some(id));
        })
    }

    #[test]
    fn cancel_before_fire_prevents_the_callback() {
        let handle = Rc::new(Cell::new(None));
        let fires = Rc::new(Cell::new(0));
        let root = timer_root(Duration::from_secs(1), handle.clone(), fires.clone());

        let mut sched = Scheduler::mount(root, Props::empty()).unwrap();
        sched.cancel(handle.get().unwrap());
        sched.advance(Duration::from_secs(5)).unwrap();

        assert_eq!(fires.get(), 0);
        assert_eq!(sched.pending_timers(), 0);
        assert_eq!(sched.output().flatten(), "ticks=0");
    }

    #[test]
    fn cancel_is_idempotent() {
        let handle = Rc::new(Cell::new(None));
        let fires = Rc::new(Cell::new(0));
        let root = timer_root(Duration::from_secs(1), handle.clone(), fires.clone());

        let mut sched = Scheduler::mount(root, Props::empty()).unwrap();
        let id = handle.get().unwrap();
        sched.cancel(id);
        sched.cancel(id);
        sched.advance(Duration::from_secs(2)).unwrap();
        // Cancelling after the deadline would have passed is also a no-op.
        sched.cancel(id);
        assert_eq!(fires.get(), 0);
    }

    #[test]
    fn one_shot_timer_fires_once_and_commits_a_pass() {
        let handle = Rc::new(Cell::new(None));
        let fires = Rc::new(Cell::new(0));
        let root = timer_root(Duration::from_secs(1), handle.clone(), fires.clone());

        let mut sched = Scheduler::mount(root, Props::empty()).unwrap();
        sched.advance(Duration::from_millis(999)).unwrap();
        assert_eq!(fires.get(), 0);
        sched.advance(Duration::from_millis(1)).unwrap();
        assert_eq!(fires.get(), 1);
        assert_eq!(sched.output().flatten(), "ticks=1");
        sched.advance(Duration::from_secs(10)).unwrap();
        assert_eq!(fires.get(), 1);
    }

    #[test]
    fn periodic_timer_fires_once_per_period() {
        let fires = Rc::new(Cell::new(0u32));
        let root = ViewNode::new("parent", |_, scope| {
            let ticks = scope.state("ticks")?;
            Ok(Output::text(format!("ticks={}", ticks.get())))
        })
        .on_activate({
            let fires = fires.clone();
            move |ctx| {
                let ticks = ctx.state("ticks", 0);
                let fires = fires.clone();
                ctx.every(Duration::from_secs(1), move || {
                    fires.set(fires.get() + 1);
                    bump(&ticks);
                });
            }
        });

        let mut sched = Scheduler::mount(root, Props::empty()).unwrap();
        sched.dispatch(Event::tick(Duration::from_secs(3))).unwrap();
        assert_eq!(fires.get(), 3);
        // One pass per firing, plus the mount pass.
        assert_eq!(sched.pass_count(), 4);
        assert_eq!(sched.output().flatten(), "ticks=3");
    }

    #[test]
    fn zero_period_interval_downgrades_to_one_shot() {
        init_logs();
        let fires = Rc::new(Cell::new(0u32));
        let root = ViewNode::new("parent", |_, _| Ok(Output::Empty)).on_activate({
            let fires = fires.clone();
            move |ctx| {
                let fires = fires.clone();
                ctx.every(Duration::ZERO, move || fires.set(fires.get() + 1));
            }
        });

        // A literal zero period would reschedule at the same instant
        // forever; advance must terminate with a single firing instead.
        let mut sched = Scheduler::mount(root, Props::empty()).unwrap();
        sched.advance(Duration::from_secs(1)).unwrap();
        assert_eq!(fires.get(), 1);
        assert_eq!(sched.pending_timers(), 0);
    }

    #[test]
    fn unmount_cancels_timers_and_invalidates_holders() {
        init_logs();
        let captured: Rc<RefCell<Option<crate::state::StateHolder>>> =
            Rc::new(RefCell::new(None));
        let fires = Rc::new(Cell::new(0u32));
        let root = ViewNode::new("parent", |_, _| Ok(Output::Empty)).on_activate({
            let captured = captured.clone();
            let fires = fires.clone();
            move |ctx| {
                let ticks = ctx.state("ticks", 0);
                *captured.borrow_mut() = Some(ticks.clone());
                let fires = fires.clone();
                ctx.every(Duration::from_secs(1), move || fires.set(fires.get() + 1));
            }
        });

        let sched = Scheduler::mount(root, Props::empty()).unwrap();
        assert_eq!(sched.pending_timers(), 1);
        sched.unmount();

        // Writes into a torn-down holder are rejected and do not bump the
        // version counter.
        let holder = captured.borrow().clone().unwrap();
        assert_eq!(holder.version(), 0);
        holder.set(99);
        assert_eq!(holder.get(), Value::Int(0));
        assert_eq!(holder.version(), 0);
    }

    #[test]
    fn holder_versions_count_accepted_writes() {
        let holder = crate::state::StateHolder::new("count", 0);
        assert_eq!(holder.version(), 0);
        holder.set(1);
        holder.update(|v| Value::Int(v.as_int().unwrap_or(0) + 1));
        assert_eq!(holder.version(), 2);
        assert_eq!(holder.get(), Value::Int(2));
    }

    #[test]
    fn dispose_runs_at_most_once() {
        let runs = Rc::new(Cell::new(0));
        let root = ViewNode::new("parent", |_, _| Ok(Output::Empty)).on_activate({
            let runs = runs.clone();
            move |ctx| {
                let runs = runs.clone();
                ctx.on_deactivate(move || runs.set(runs.get() + 1));
            }
        });

        let sched = Scheduler::mount(root, Props::empty()).unwrap();
        sched.unmount();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn teardown_runs_children_first() {
        let order: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));
        let child = ViewNode::new("child", |_, _| Ok(Output::Empty)).on_activate({
            let order = order.clone();
            move |ctx| {
                let order = order.clone();
                ctx.on_deactivate(move || order.borrow_mut().push("child"));
            }
        });
        let root = ViewNode::new("parent", |_, _| Ok(Output::Empty))
            .on_activate({
                let order = order.clone();
                move |ctx| {
                    let order = order.clone();
                    ctx.on_deactivate(move || order.borrow_mut().push("parent"));
                }
            })
            .child(|_, _| Ok(Props::empty()), child);

        let sched = Scheduler::mount(root, Props::empty()).unwrap();
        sched.unmount();
        assert_eq!(*order.borrow(), vec!["child", "parent"]);
    }
}
