//! # Render triggers, memo cells, and the skip decision
//!
//! Rememo is a small render-trigger engine: given a stream of state
//! mutations, it decides which parts of a view tree recompute and which are
//! skipped. There are four pieces:
//!
//! - [`EqualityPolicy`] — pure comparison of two props values.
//! - [`MemoCell`] — a computation cached against its last dependency
//!   snapshot.
//! - [`ViewNode`] — a renderable unit; recomputes its own output whenever it
//!   is reached, but may skip a memo-wrapped child subtree entirely.
//! - [`Scheduler`] — the cooperative event loop: one event at a time, one
//!   re-evaluation pass per event, virtual timers with idempotent cancel.
//!
//! ## Values and identity
//!
//! Props and dependency snapshots are built from [`Value`]. Scalars and
//! strings compare by value; records and lists compare by *reference
//! identity*. That split is the whole reason custom policies exist: a parent
//! that rebuilds a record every pass defeats the default shallow comparison
//! even when every field is equal.
//!
//! ```rust
//! use rememo_core::{Record, Value};
//!
//! let a = Value::from(Record::new().field("id", 1));
//! let b = Value::from(Record::new().field("id", 1));
//! assert_ne!(a, b);          // fresh record, new identity
//! assert_eq!(a, a.clone()); // clones share identity
//! ```
//!
//! ## Memo cells
//!
//! A [`MemoCell`] runs its computation at most once per distinct dependency
//! snapshot; a cell created with [`MemoCell::once`] runs it exactly once,
//! ever.
//!
//! ```rust
//! use rememo_core::{MemoCell, Value};
//!
//! let mut cell = MemoCell::new("doubled", |deps| {
//!     let n = deps[0].as_int().unwrap_or(0);
//!     Ok(Value::Int(n * 2))
//! });
//! assert_eq!(cell.evaluate(&[Value::Int(3)])?, Value::Int(6));
//! assert_eq!(cell.evaluate(&[Value::Int(3)])?, Value::Int(6));
//! assert_eq!(cell.compute_count(), 1); // second call hit the cache
//! # Ok::<(), rememo_core::RenderError>(())
//! ```
//!
//! ## The skip decision
//!
//! On each pass a node recomputes its own output unconditionally, then walks
//! its children in declared order. A child added with
//! [`ViewNode::memo_child`] is only recursed into when its policy reports
//! changed props; otherwise its cached subtree output is reused verbatim.
//! Reusing a skipped child's stale output is the intended behavior, not an
//! error.
//!
//! A child added with [`ViewNode::gated_child`] renders only when its gate
//! value is neither `Unit` nor `false`. `0` and `""` do not suppress the
//! child slot — they become the visible output themselves, the classic
//! conditional-rendering pitfall, reproduced here on purpose.
//!
//! ## Lifecycle
//!
//! State holders, timers and click handlers are created in a node's
//! `on_activate` hook through [`NodeCtx`], and are owned by that node:
//! unmounting tears children down first, runs [`Dispose`] guards, cancels
//! every registered timer and invalidates the holders. A timer that somehow
//! outlives its owner has its writes rejected with a warning — that state is
//! a programming error, not a supported mode.
//!
//! Time is virtual: [`Scheduler::advance`] moves the clock and fires due
//! timers deterministically, so tests step through timer schedules without
//! sleeping.

pub mod clock;
pub mod equality;
pub mod error;
pub mod memo;
pub mod node;
pub mod output;
pub mod scheduler;
pub mod state;
pub mod tests;
pub mod value;

pub use clock::VirtualClock;
pub use equality::{Decision, EqualityPolicy};
pub use error::RenderError;
pub use memo::{CellState, MemoCell, Snapshot};
pub use node::{Dispose, NodeCtx, RenderScope, ViewNode};
pub use output::Output;
pub use scheduler::{Event, Scheduler, TimerId};
pub use state::StateHolder;
pub use value::{Props, Record, Value};
