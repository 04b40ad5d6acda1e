// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Queue Definitions for RabbitMQ
//!
//! This module provides the queue definition declared for a consumer and the
//! binding that routes messages from an exchange into that queue.

use lapin::{
    options::{QueueBindOptions, QueueDeclareOptions},
    types::FieldTable,
};

/// Definition of a RabbitMQ queue with its declare flags.
///
/// This struct implements the builder pattern, starting from a non-durable,
/// non-exclusive queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueDefinition {
    pub(crate) name: String,
    pub(crate) durable: bool,
    pub(crate) delete: bool,
    pub(crate) exclusive: bool,
    pub(crate) passive: bool,
    pub(crate) no_wait: bool,
}

impl QueueDefinition {
    /// Creates a new queue definition with the given name.
    ///
    /// An empty name asks the broker to generate one; the generated name is
    /// returned by the declare call.
    ///
    /// # Parameters
    /// * `name` - The name of the queue
    ///
    /// # Returns
    /// A new queue definition with default settings
    pub fn new(name: &str) -> QueueDefinition {
        QueueDefinition {
            name: name.to_owned(),
            durable: false,
            delete: false,
            exclusive: false,
            passive: false,
            no_wait: false,
        }
    }

    /// Makes the queue durable, persisting across broker restarts.
    ///
    /// # Returns
    /// Self for method chaining
    pub fn durable(mut self) -> Self {
        self.durable = true;
        self
    }

    /// Returns the queue name as declared.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns whether the queue survives broker restarts.
    pub fn is_durable(&self) -> bool {
        self.durable
    }

    /// Returns whether the queue is restricted to the declaring connection.
    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    /// Returns whether the broker deletes the queue after its last consumer.
    pub fn is_auto_delete(&self) -> bool {
        self.delete
    }

    pub(crate) fn options(&self) -> QueueDeclareOptions {
        QueueDeclareOptions {
            passive: self.passive,
            durable: self.durable,
            exclusive: self.exclusive,
            auto_delete: self.delete,
            nowait: self.no_wait,
        }
    }
}

/// Configuration for binding a queue to an exchange.
///
/// Queue bindings define how messages flow from exchanges to queues based on
/// routing keys and exchange types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueBinding {
    pub(crate) queue_name: String,
    pub(crate) exchange_name: String,
    pub(crate) routing_key: String,
}

impl QueueBinding {
    /// Creates a new queue binding for the given queue.
    ///
    /// The exchange name and routing key start empty and are set with
    /// `exchange` and `routing_key`.
    ///
    /// # Parameters
    /// * `queue` - The name of the queue to bind
    ///
    /// # Returns
    /// A new queue binding
    pub fn new(queue: &str) -> QueueBinding {
        QueueBinding {
            queue_name: queue.to_owned(),
            exchange_name: String::new(),
            routing_key: String::new(),
        }
    }

    /// Sets the exchange to bind the queue to.
    ///
    /// # Parameters
    /// * `exchange` - The name of the exchange
    ///
    /// # Returns
    /// Self for method chaining
    pub fn exchange(mut self, exchange: &str) -> Self {
        self.exchange_name = exchange.to_owned();
        self
    }

    /// Sets the routing key for the binding.
    ///
    /// # Parameters
    /// * `key` - The routing key or pattern
    ///
    /// # Returns
    /// Self for method chaining
    pub fn routing_key(mut self, key: &str) -> Self {
        self.routing_key = key.to_owned();
        self
    }

    /// Returns the bound queue name.
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Returns the source exchange name.
    pub fn exchange_name(&self) -> &str {
        &self.exchange_name
    }

    /// Returns the routing key of the binding.
    pub fn key(&self) -> &str {
        &self.routing_key
    }

    pub(crate) fn options(&self) -> QueueBindOptions {
        QueueBindOptions { nowait: false }
    }

    pub(crate) fn arguments(&self) -> FieldTable {
        FieldTable::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durable_queue_is_shared_and_kept() {
        let opts = QueueDefinition::new("events.q").durable().options();

        assert!(opts.durable);
        assert!(!opts.exclusive);
        assert!(!opts.auto_delete);
        assert!(!opts.passive);
    }

    #[test]
    fn binding_collects_exchange_and_key() {
        let binding = QueueBinding::new("events.q")
            .exchange("events")
            .routing_key("events.#");

        assert_eq!(binding.queue_name(), "events.q");
        assert_eq!(binding.exchange_name(), "events");
        assert_eq!(binding.key(), "events.#");
    }
}
