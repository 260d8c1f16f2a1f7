//! Modularized state module.
//!
//! Value types live in `types`; the mutable panel container lives in
//! `panel_state`. Public API is re-exported under `crate::state::*`.

pub mod panel_state;
pub mod types;

pub use panel_state::PanelState;
pub use types::{
    BuildId, BuildStatus, EnvironmentRef, Package, PendingEntry, PkgFilter, PkgSelection,
};
