//! Generation workspace: the version graph plus the session that feeds it.
//!
//! [`controller::Workspace`] is the single owner of all generation state.
//! [`notify`] holds the user-facing messages it emits.

pub mod controller;
pub mod notify;
