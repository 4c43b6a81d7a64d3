//! Shared fixtures for the core integration tests: a small counter domain
//! wired to the in-memory stores.

#![allow(dead_code)]

use std::sync::Arc;

use chronicle_core::aggregate::Aggregate;
use chronicle_core::codec::{CodecOptions, EventCodec};
use chronicle_core::message::{AnyMessage, CoreMessages, Message};
use chronicle_core::registry::{MessageDescriptor, MessageSource, TypeRegistry};
use chronicle_core::repository::AggregateRepository;
use chronicle_core::seeding::EventSeeder;
use chronicle_core::store::EventStore;
use chronicle_test_support::FixedClock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterOpened {
    pub label: String,
}

impl Message for CounterOpened {
    const TYPE_NAME: &'static str = "counter.opened";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incremented {
    pub by: u32,
}

impl Message for Incremented {
    const TYPE_NAME: &'static str = "counter.incremented";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterRetired;

impl Message for CounterRetired {
    const TYPE_NAME: &'static str = "counter.retired";
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Counter {
    pub label: Option<String>,
    pub total: u32,
    pub retired: bool,
}

impl Aggregate for Counter {
    const NAME: &'static str = "Counter";

    fn apply(&mut self, event: &dyn AnyMessage) {
        if let Some(opened) = event.downcast_ref::<CounterOpened>() {
            self.label = Some(opened.label.clone());
        } else if let Some(inc) = event.downcast_ref::<Incremented>() {
            self.total = self.total.saturating_add(inc.by);
        } else if event.is::<CounterRetired>() {
            self.retired = true;
        }
    }

    fn is_deleted(&self) -> bool {
        self.retired
    }
}

pub struct CounterMessages;

impl MessageSource for CounterMessages {
    fn name(&self) -> &'static str {
        "counter-tests"
    }

    fn descriptors(&self) -> Vec<MessageDescriptor> {
        vec![
            MessageDescriptor::of::<CounterOpened>(),
            MessageDescriptor::of::<Incremented>(),
            MessageDescriptor::of::<CounterRetired>(),
        ]
    }
}

pub fn codec() -> EventCodec {
    let registry = TypeRegistry::build(&[&CoreMessages, &CounterMessages]).unwrap();
    EventCodec::new(Arc::new(registry), CodecOptions::default())
}

pub fn repository(store: Arc<dyn EventStore>) -> AggregateRepository {
    AggregateRepository::new(store, codec(), Arc::new(FixedClock::default()))
}

pub fn seeder(store: Arc<dyn EventStore>) -> EventSeeder {
    EventSeeder::new(store, codec(), Arc::new(FixedClock::default()))
}
