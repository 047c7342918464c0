//! HTTP server for the Spout streaming gateway.
//!
//! Wires the gateway, stores, and worker pool behind an Axum router and
//! serves the public player and byte-serving routes.

pub mod api;
pub mod backend_factory;
pub mod config;
pub mod error;
pub mod telemetry;
