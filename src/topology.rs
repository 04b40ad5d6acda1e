// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Topology for a Consumer
//!
//! This module describes the topology a consumer relies on: a durable exchange,
//! a durable shared queue and the binding between them, plus the tag the
//! consumer is registered under. Installing the topology declares the exchange,
//! declares the queue and binds it, in that order, stopping at the first
//! failure.

use crate::{
    errors::AmqpError,
    exchange::{ExchangeDefinition, ExchangeKind},
    link::BrokerLink,
    queue::{QueueBinding, QueueDefinition},
};
use tracing::debug;
use uuid::Uuid;

/// Immutable description of the exchange, queue, binding and consumer tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyDescriptor {
    exchange: String,
    exchange_kind: ExchangeKind,
    queue: String,
    binding_key: String,
    consumer_tag: String,
}

impl TopologyDescriptor {
    /// Creates a topology descriptor.
    ///
    /// # Parameters
    /// * `exchange` - The exchange to declare
    /// * `exchange_kind` - The exchange type, e.g. `"topic"`
    /// * `queue` - The queue to declare and consume from
    /// * `binding_key` - The routing key binding the queue to the exchange
    /// * `consumer_tag` - The tag the consumer is registered under
    ///
    /// # Returns
    /// A new topology descriptor
    pub fn new(
        exchange: &str,
        exchange_kind: impl Into<ExchangeKind>,
        queue: &str,
        binding_key: &str,
        consumer_tag: &str,
    ) -> Self {
        TopologyDescriptor {
            exchange: exchange.to_owned(),
            exchange_kind: exchange_kind.into(),
            queue: queue.to_owned(),
            binding_key: binding_key.to_owned(),
            consumer_tag: consumer_tag.to_owned(),
        }
    }

    /// Generates a consumer tag unique to this process, `<queue>-<uuid>`.
    pub fn generated_tag(queue: &str) -> String {
        format!("{}-{}", queue, Uuid::new_v4())
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    pub fn exchange_kind(&self) -> &ExchangeKind {
        &self.exchange_kind
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn binding_key(&self) -> &str {
        &self.binding_key
    }

    pub fn consumer_tag(&self) -> &str {
        &self.consumer_tag
    }

    /// The exchange is durable, never auto-deleted and not internal.
    pub fn exchange_definition(&self) -> ExchangeDefinition {
        ExchangeDefinition::new(&self.exchange)
            .kind(self.exchange_kind.clone())
            .durable()
    }

    /// The queue is durable, shared between connections and never auto-deleted.
    pub fn queue_definition(&self) -> QueueDefinition {
        QueueDefinition::new(&self.queue).durable()
    }

    /// The binding of `queue`, the name reported by the broker, to the exchange.
    pub fn queue_binding(&self, queue: &str) -> QueueBinding {
        QueueBinding::new(queue)
            .exchange(&self.exchange)
            .routing_key(&self.binding_key)
    }

    /// Declares the exchange and queue and binds them.
    ///
    /// # Returns
    /// The queue name reported by the broker, to consume from.
    pub async fn install<L: BrokerLink>(&self, link: &L) -> Result<String, AmqpError> {
        debug!("creating exchange: {}", self.exchange);
        link.declare_exchange(&self.exchange_definition()).await?;
        debug!("exchange: {} was created", self.exchange);

        debug!("creating queue: {}", self.queue);
        let queue = link.declare_queue(&self.queue_definition()).await?;
        debug!("queue: {} was created", queue);

        debug!(
            "binding queue: {} to the exchange: {} with the key: {}",
            queue, self.exchange, self.binding_key
        );
        link.bind_queue(&self.queue_binding(&queue)).await?;
        debug!("queue was bounded");

        Ok(queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::MockBrokerLink;
    use mockall::Sequence;

    fn events() -> TopologyDescriptor {
        TopologyDescriptor::new("events", "topic", "events.q", "events.#", "c1")
    }

    #[test]
    fn definitions_carry_the_fixed_flags() {
        let topology = events();

        let exchange = topology.exchange_definition();
        assert_eq!(exchange.name(), "events");
        assert_eq!(exchange.exchange_kind(), &ExchangeKind::Topic);
        assert!(exchange.is_durable());
        assert!(!exchange.is_auto_delete());
        assert!(!exchange.is_internal());

        let queue = topology.queue_definition();
        assert_eq!(queue.name(), "events.q");
        assert!(queue.is_durable());
        assert!(!queue.is_exclusive());
        assert!(!queue.is_auto_delete());
    }

    #[test]
    fn generated_tags_are_unique_per_call() {
        let first = TopologyDescriptor::generated_tag("events.q");
        let second = TopologyDescriptor::generated_tag("events.q");

        assert!(first.starts_with("events.q-"));
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn install_declares_then_binds_the_broker_queue_name() {
        let mut seq = Sequence::new();
        let mut link = MockBrokerLink::new();

        link.expect_declare_exchange()
            .withf(|def| def.name() == "events" && def.is_durable())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        link.expect_declare_queue()
            .withf(|def| def.name() == "events.q")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("events.q".to_owned()));
        link.expect_bind_queue()
            .withf(|b| {
                b.queue_name() == "events.q" && b.exchange_name() == "events" && b.key() == "events.#"
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        assert_eq!(events().install(&link).await, Ok("events.q".to_owned()));
    }

    #[tokio::test]
    async fn install_stops_at_the_first_failure() {
        let mut link = MockBrokerLink::new();

        link.expect_declare_exchange().returning(|_| Ok(()));
        link.expect_declare_queue().returning(|def| {
            Err(AmqpError::DeclareQueueError(
                def.name().to_owned(),
                "PRECONDITION_FAILED".to_owned(),
            ))
        });
        link.expect_bind_queue().never();

        assert_eq!(
            events().install(&link).await,
            Err(AmqpError::DeclareQueueError(
                "events.q".to_owned(),
                "PRECONDITION_FAILED".to_owned()
            ))
        );
    }
}
