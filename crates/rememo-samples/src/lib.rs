#![allow(non_snake_case)]
//! Demo screens built on `rememo-core`, one per memoization pattern:
//!
//! - [`MemoizedUserCardScreen`] — a periodic timer replaces the user's email
//!   every second; a `Fields(["id", "name"])` policy keeps the card from
//!   re-rendering for email-only changes.
//! - [`StableUserListScreen`] — the user list comes from a run-once memo
//!   cell and the select handler is registered once at activation, so the
//!   list child survives parent counter increments untouched. The selection
//!   banner is a gated child, `Unit` until something is selected.
//! - [`CartScreen`] — the cart total is a memo cell keyed on the item list's
//!   identity: counter clicks reuse the cached total, adding an item
//!   recomputes it.

use rememo_core::{
    EqualityPolicy, MemoCell, Output, Props, Record, RenderError, Value, ViewNode,
};
use web_time::Duration;

fn bump(holder: &rememo_core::StateHolder) {
    holder.update(|v| Value::Int(v.as_int().unwrap_or(0) + 1));
}

fn field_or_unit(record: &Record, name: &str) -> Value {
    record.get(name).cloned().unwrap_or(Value::Unit)
}

fn user_record(id: i64, name: &str, email: &str) -> Record {
    Record::new()
        .field("id", id)
        .field("name", name)
        .field("email", email)
}

// ---- memoized user card ----------------------------------------------------

/// Card showing a user's name, id and email. Re-renders only when the parent
/// recurses into it — which the wrapping policy prevents for email changes.
pub fn UserCard() -> ViewNode {
    ViewNode::new("user-card", |p, _| {
        let name = p.get("name").cloned().unwrap_or(Value::Unit);
        let id = p.get("id").cloned().unwrap_or(Value::Unit);
        let email = p.get("email").cloned().unwrap_or(Value::Unit);
        Ok(Output::group(vec![
            Output::text(name.to_string()),
            Output::text(format!(" (id {id}, {email})")),
        ]))
    })
}

/// Counter plus a memoized user card. A 1 s interval replaces the whole user
/// record with a fresh one carrying a new email; `id` and `name` stay put,
/// so the `Fields(["id", "name"])` policy reports Unchanged and the card
/// keeps its first render.
pub fn MemoizedUserCardScreen() -> ViewNode {
    ViewNode::new("memo-screen", |_, scope| {
        let count = scope.state("count")?;
        Ok(Output::text(format!("count: {}", count.get())))
    })
    .on_activate(|ctx| {
        let count = ctx.state("count", 0);
        ctx.on_click("count-up", move |_| bump(&count));

        let user = ctx.state("user", user_record(1, "Bob", "bob@example.com"));
        ctx.on_click("rename", {
            let user = user.clone();
            move |payload| {
                let name = payload.and_then(Value::as_str).unwrap_or("Bob").to_string();
                user.set(user_record(1, &name, "bob@example.com"));
            }
        });
        let ticks = ctx.state("ticks", 0);
        ctx.every(Duration::from_secs(1), move || {
            bump(&ticks);
            let n = ticks.get().as_int().unwrap_or(0);
            // Fresh record each tick: only the email differs.
            user.set(user_record(1, "Bob", &format!("bob{n}@example.com")));
        });
    })
    .memo_child(
        |_, scope| {
            let user = scope.state("user")?.get();
            let user = user
                .as_record()
                .ok_or_else(|| RenderError::render("memo-screen", "user is not a record"))?;
            Ok(Props::new(
                Record::new()
                    .field("id", field_or_unit(user, "id"))
                    .field("name", field_or_unit(user, "name"))
                    .field("email", field_or_unit(user, "email")),
            ))
        },
        EqualityPolicy::fields(["id", "name"]),
        UserCard(),
    )
}

// ---- stable user list ------------------------------------------------------

pub fn UserList() -> ViewNode {
    ViewNode::new("user-list", |p, _| {
        let users = p
            .get("users")
            .and_then(Value::as_list)
            .map(<[Value]>::to_vec)
            .unwrap_or_default();
        let mut parts = Vec::with_capacity(users.len());
        for user in &users {
            if let Some(user) = user.as_record() {
                parts.push(Output::text(format!("[{}]", field_or_unit(user, "name"))));
            }
        }
        Ok(Output::group(parts))
    })
}

/// Counter plus a user list whose props never change: the list value comes
/// from a run-once cell (same identity every pass) and the select handler is
/// registered once at activation. Incrementing the counter re-renders the
/// screen but never the list. Selecting a user opens the gated banner.
pub fn StableUserListScreen() -> ViewNode {
    ViewNode::new("list-screen", |_, scope| {
        let count = scope.state("count")?;
        Ok(Output::text(format!("count: {}", count.get())))
    })
    .on_activate(|ctx| {
        let count = ctx.state("count", 0);
        ctx.on_click("count-up", move |_| bump(&count));

        let selected = ctx.state("selected", Value::Unit);
        ctx.on_click("select", move |payload| {
            let Some(id) = payload.cloned() else {
                log::warn!("select clicked without a user id");
                return;
            };
            selected.set(id);
        });
    })
    .memo_cell(MemoCell::once("users", |_| {
        Ok(Value::list(vec![
            Value::from(Record::new().field("id", 1).field("name", "Alice")),
            Value::from(Record::new().field("id", 2).field("name", "Bob")),
            Value::from(Record::new().field("id", 3).field("name", "Charlie")),
        ]))
    }))
    .memo_child(
        |_, scope| Ok(Props::new(Record::new().field("users", scope.memo("users", &[])?))),
        EqualityPolicy::Shallow,
        UserList(),
    )
    .gated_child(
        |_, scope| {
            scope
                .state("selected")
                .map(|h| h.get())
                .unwrap_or(Value::Unit)
        },
        |_, scope| {
            let selected = scope.state("selected")?;
            Ok(Props::new(Record::new().field("selected", selected.get())))
        },
        ViewNode::new("selected-banner", |p, _| {
            let id = p.get("selected").cloned().unwrap_or(Value::Unit);
            Ok(Output::text(format!("selected user: {id}")))
        }),
    )
}

// ---- cart with a derived total ---------------------------------------------

fn product(id: i64, name: &str, price: i64, quantity: i64) -> Value {
    Value::from(
        Record::new()
            .field("id", id)
            .field("name", name)
            .field("price", price)
            .field("quantity", quantity),
    )
}

/// Item list plus a total derived through a memo cell keyed on the list
/// value. The cart itself is an ordinary child — it re-renders with every
/// parent pass — but the total only recomputes when the list identity moves.
pub fn Cart() -> ViewNode {
    ViewNode::new("cart", |p, scope| {
        let items = p
            .get("items")
            .cloned()
            .ok_or_else(|| RenderError::render("cart", "missing items"))?;
        let total = scope.memo("total", &[items.clone()])?;

        let mut parts = Vec::new();
        if let Some(items) = items.as_list() {
            for item in items {
                if let Some(item) = item.as_record() {
                    parts.push(Output::text(format!(
                        "{} x{} @ {}; ",
                        field_or_unit(item, "name"),
                        field_or_unit(item, "quantity"),
                        field_or_unit(item, "price"),
                    )));
                }
            }
        }
        parts.push(Output::text(format!("total: {total}")));
        Ok(Output::group(parts))
    })
    .memo_cell(MemoCell::new("total", |deps| {
        let items = deps
            .first()
            .and_then(Value::as_list)
            .ok_or_else(|| RenderError::compute("total", "expected a product list"))?;
        let mut total = 0i64;
        for item in items {
            let item = item
                .as_record()
                .ok_or_else(|| RenderError::compute("total", "expected a product record"))?;
            let price = item.get("price").and_then(Value::as_int).unwrap_or(0);
            let quantity = item.get("quantity").and_then(Value::as_int).unwrap_or(0);
            total += price * quantity;
        }
        Ok(Value::Int(total))
    }))
}

pub fn CartScreen() -> ViewNode {
    ViewNode::new("cart-screen", |_, scope| {
        let count = scope.state("count")?;
        Ok(Output::text(format!("count: {}", count.get())))
    })
    .on_activate(|ctx| {
        let count = ctx.state("count", 0);
        ctx.on_click("count-up", move |_| bump(&count));

        let items = ctx.state(
            "items",
            Value::list(vec![
                product(1, "apple", 100, 2),
                product(2, "banana", 150, 3),
            ]),
        );
        ctx.on_click("add-item", move |_| {
            items.update(|prev| {
                let mut next: Vec<Value> =
                    prev.as_list().map(<[Value]>::to_vec).unwrap_or_default();
                let n = next.len() as i64 + 1;
                next.push(product(n, &format!("item {n}"), 50 * n, 1));
                Value::list(next)
            });
        });
    })
    .child(
        |_, scope| {
            let items = scope.state("items")?;
            Ok(Props::new(Record::new().field("items", items.get())))
        },
        Cart(),
    )
}
