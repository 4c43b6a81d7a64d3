//! Chronicle API: HTTP surface and process bootstrap.
//!
//! The library half holds everything the binary wires together so the
//! integration tests can build the same router over an in-memory store.

pub mod app;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;
