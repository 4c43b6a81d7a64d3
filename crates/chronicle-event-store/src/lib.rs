//! Chronicle Event Store: `PostgreSQL` implementation of the core
//! `EventStore` contract.

pub mod pg_event_store;
