//! Library entry for envdeck exposing the reconciliation engine for
//! integration tests and embedding.

pub mod app;
pub mod args;
pub mod build;
pub mod client;
pub mod logic;
pub mod panel;
pub mod settings;
pub mod state;
pub mod util;
