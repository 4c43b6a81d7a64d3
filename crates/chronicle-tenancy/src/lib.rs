//! Chronicle: Tenancy context.
//!
//! The tenant lifecycle (registration, renaming, feature flags, deletion)
//! modelled as an event-sourced aggregate on top of `chronicle-core`, plus
//! the default tenant seed published at startup.

pub mod application;
pub mod domain;
pub mod seed;
