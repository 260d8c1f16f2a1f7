//! Reconciliation logic for the package panel.
//!
//! Everything in here is a pure function over [`crate::state`] values: the
//! selection state machine, view filters, update detection, and the action
//! planner. Remote calls live in `crate::client`; orchestration lives in
//! `crate::panel`.

pub mod filter;
pub mod plan;
pub mod selection;
pub mod updates;

pub use filter::apply_filter;
pub use plan::{ActionPlan, ApplyStrategy};
pub use selection::{PkgRow, clear_pending, combine_with_pending, select_version, toggle_select};
pub use updates::mark_updatable;
