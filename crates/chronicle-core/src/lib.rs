//! Chronicle Core: event-sourcing persistence discipline.
//!
//! This crate defines the aggregate abstraction, the message type registry
//! and codec, the aggregate repository with optimistic concurrency, and the
//! idempotent stream seeder. It talks to an event store only through the
//! [`store::EventStore`] contract and contains no infrastructure code.

pub mod aggregate;
pub mod cancel;
pub mod clock;
pub mod codec;
pub mod command;
pub mod error;
pub mod message;
pub mod registry;
pub mod repository;
pub mod seeding;
pub mod store;
