//! Generation channel client library.
//!
//! Provides the outbound request and inbound message types, the WebSocket
//! session that streams a generation, the reconciler that applies its
//! messages to a [`pix2code_core::store::VersionGraph`], and a REST wrapper
//! for the backend's side endpoints.

pub mod api;
pub mod client;
pub mod close;
pub mod config;
pub mod messages;
pub mod reconciler;
pub mod request;
pub mod session;
