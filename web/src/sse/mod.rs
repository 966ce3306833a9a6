//! SSE HTTP handler for the web layer.
//!
//! This module contains only the Axum handler for the subscription endpoint.
//! The core SSE infrastructure (Manager, ConnectionRegistry, event log, wire
//! format) lives in the `sse` crate.

pub mod handler;
