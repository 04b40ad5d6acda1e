// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Exchange Definitions for RabbitMQ
//!
//! This module provides the exchange kinds understood by the consumer and the
//! definition used to declare the exchange a consumer queue is bound to.
//! Exchange kinds are given as strings by the caller and validated by the broker
//! on declare, so unknown kinds are carried through as `ExchangeKind::Custom`.

use lapin::types::FieldTable;
use serde::Deserialize;
use std::fmt;

/// Represents the types of exchanges available in RabbitMQ.
///
/// Each exchange type has specific routing behavior:
/// - Direct: Routes messages to queues based on an exact match of routing keys
/// - Fanout: Broadcasts messages to all bound queues regardless of routing keys
/// - Topic: Routes messages based on wildcard pattern matching of routing keys
/// - Headers: Routes based on message header values instead of routing keys
/// - XMessageDelayed: Extension for delayed message delivery (plugin required)
/// - Custom: Any other kind registered on the broker
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum ExchangeKind {
    #[default]
    Direct,
    Fanout,
    Topic,
    Headers,
    XMessageDelayed,
    Custom(String),
}

impl From<&str> for ExchangeKind {
    fn from(kind: &str) -> Self {
        match kind {
            "direct" => ExchangeKind::Direct,
            "fanout" => ExchangeKind::Fanout,
            "topic" => ExchangeKind::Topic,
            "headers" => ExchangeKind::Headers,
            "x-delayed-message" => ExchangeKind::XMessageDelayed,
            other => ExchangeKind::Custom(other.to_owned()),
        }
    }
}

impl From<String> for ExchangeKind {
    fn from(kind: String) -> Self {
        ExchangeKind::from(kind.as_str())
    }
}

impl fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeKind::Direct => f.write_str("direct"),
            ExchangeKind::Fanout => f.write_str("fanout"),
            ExchangeKind::Topic => f.write_str("topic"),
            ExchangeKind::Headers => f.write_str("headers"),
            ExchangeKind::XMessageDelayed => f.write_str("x-delayed-message"),
            ExchangeKind::Custom(kind) => f.write_str(kind),
        }
    }
}

impl From<ExchangeKind> for lapin::ExchangeKind {
    fn from(kind: ExchangeKind) -> Self {
        match kind {
            ExchangeKind::Direct => lapin::ExchangeKind::Direct,
            ExchangeKind::Fanout => lapin::ExchangeKind::Fanout,
            ExchangeKind::Headers => lapin::ExchangeKind::Headers,
            ExchangeKind::Topic => lapin::ExchangeKind::Topic,
            ExchangeKind::XMessageDelayed => {
                lapin::ExchangeKind::Custom("x-delayed-message".to_owned())
            }
            ExchangeKind::Custom(kind) => lapin::ExchangeKind::Custom(kind),
        }
    }
}

/// Definition of a RabbitMQ exchange with its declare flags.
///
/// Built with chained setters, starting from a non-durable direct exchange.
#[derive(Debug, Clone)]
pub struct ExchangeDefinition {
    pub(crate) name: String,
    pub(crate) kind: ExchangeKind,
    pub(crate) delete: bool,
    pub(crate) durable: bool,
    pub(crate) passive: bool,
    pub(crate) internal: bool,
    pub(crate) no_wait: bool,
}

impl ExchangeDefinition {
    /// Creates a new exchange definition with the given name.
    ///
    /// By default, the exchange is a non-durable Direct exchange.
    ///
    /// # Parameters
    /// * `name` - The name of the exchange
    ///
    /// # Returns
    /// A new exchange definition with default settings
    pub fn new(name: &str) -> ExchangeDefinition {
        ExchangeDefinition {
            name: name.to_owned(),
            kind: ExchangeKind::Direct,
            delete: false,
            durable: false,
            passive: false,
            internal: false,
            no_wait: false,
        }
    }

    /// Sets the exchange type.
    ///
    /// # Parameters
    /// * `kind` - The exchange type
    ///
    /// # Returns
    /// Self for method chaining
    pub fn kind(mut self, kind: ExchangeKind) -> Self {
        self.kind = kind;
        self
    }

    /// Makes the exchange durable, persisting across broker restarts.
    ///
    /// # Returns
    /// Self for method chaining
    pub fn durable(mut self) -> Self {
        self.durable = true;
        self
    }

    /// Returns the exchange name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the exchange type.
    pub fn exchange_kind(&self) -> &ExchangeKind {
        &self.kind
    }

    /// Returns whether the exchange survives broker restarts.
    pub fn is_durable(&self) -> bool {
        self.durable
    }

    /// Returns whether the broker deletes the exchange once unused.
    pub fn is_auto_delete(&self) -> bool {
        self.delete
    }

    /// Returns whether the exchange rejects direct publishes.
    pub fn is_internal(&self) -> bool {
        self.internal
    }

    pub(crate) fn options(&self) -> lapin::options::ExchangeDeclareOptions {
        lapin::options::ExchangeDeclareOptions {
            passive: self.passive,
            durable: self.durable,
            auto_delete: self.delete,
            internal: self.internal,
            nowait: self.no_wait,
        }
    }

    pub(crate) fn arguments(&self) -> FieldTable {
        FieldTable::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_known_kinds() {
        assert_eq!(ExchangeKind::from("topic"), ExchangeKind::Topic);
        assert_eq!(ExchangeKind::from("fanout"), ExchangeKind::Fanout);
        assert_eq!(
            ExchangeKind::from("x-delayed-message"),
            ExchangeKind::XMessageDelayed
        );
    }

    #[test]
    fn unknown_kinds_are_left_for_the_broker_to_validate() {
        let kind = ExchangeKind::from("x-consistent-hash");

        assert_eq!(kind, ExchangeKind::Custom("x-consistent-hash".to_owned()));
        assert_eq!(kind.to_string(), "x-consistent-hash");
        assert!(matches!(
            lapin::ExchangeKind::from(kind),
            lapin::ExchangeKind::Custom(k) if k == "x-consistent-hash"
        ));
    }

    #[test]
    fn declare_options_follow_the_builder() {
        let def = ExchangeDefinition::new("events")
            .kind(ExchangeKind::Topic)
            .durable();

        let opts = def.options();
        assert!(opts.durable);
        assert!(!opts.auto_delete);
        assert!(!opts.internal);
        assert!(!opts.nowait);
        assert_eq!(def.exchange_kind(), &ExchangeKind::Topic);
    }
}
