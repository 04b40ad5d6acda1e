// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Error Types for the RabbitMQ Consumer
//!
//! This module provides the error types surfaced by the consumer manager.
//! `AmqpError` identifies the lifecycle stage that failed (connection, channel,
//! topology declaration, consumption, shutdown) and carries the underlying broker
//! message. `HandlerError` is the opaque value a delivery handler reports back.

use std::time::Duration;
use thiserror::Error;

/// The terminal failure reported by a delivery handler.
///
/// The consumer manager never inspects it: whatever the handler reports is
/// returned verbatim from `ConsumerManager::shutdown`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(msg: impl Into<String>) -> Self {
        HandlerError(msg.into())
    }
}

impl From<&str> for HandlerError {
    fn from(msg: &str) -> Self {
        HandlerError(msg.to_owned())
    }
}

impl From<String> for HandlerError {
    fn from(msg: String) -> Self {
        HandlerError(msg)
    }
}

/// Represents errors that can occur while managing a RabbitMQ consumer.
///
/// Setup errors are terminal and never retried. Shutdown errors are surfaced
/// immediately; the manager keeps its position in the shutdown sequence so the
/// caller may try again.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AmqpError {
    /// Error establishing a connection to the RabbitMQ server
    #[error("failure to connect: {0}")]
    ConnectionError(String),

    /// Error creating a channel from an established connection
    #[error("failure to create a channel: {0}")]
    ChannelError(String),

    /// Error declaring an exchange with the given name
    #[error("failure to declare an exchange `{0}`: {1}")]
    DeclareExchangeError(String, String),

    /// Error declaring a queue with the given name
    #[error("failure to declare a queue `{0}`: {1}")]
    DeclareQueueError(String, String),

    /// Error binding a queue to an exchange
    #[error("failure to bind exchange `{0}` to queue `{1}`: {2}")]
    BindingExchangeToQueueError(String, String, String),

    /// Error starting a consumer on a queue
    #[error("failure to declare consumer `{0}`: {1}")]
    BindingConsumerError(String, String),

    /// Error cancelling the active consumer during shutdown
    #[error("failure to cancel consumer `{0}`: {1}")]
    ConsumerCancelError(String, String),

    /// Error closing the connection during shutdown
    #[error("failure to close the connection: {0}")]
    ConnectionCloseError(String),

    /// The value the delivery handler reported
    #[error(transparent)]
    Handler(#[from] HandlerError),

    /// The handler dropped its completion without reporting
    #[error("handler finished without reporting completion")]
    HandlerAbandoned,

    /// The handler task panicked before reporting
    #[error("handler task panicked")]
    HandlerPanicked,

    /// The handler did not report within the shutdown timeout
    #[error("handler did not report within {0:?}")]
    HandlerTimeout(Duration),

    /// Shutdown was already completed
    #[error("consumer was already shut down")]
    AlreadyShutdown,

    /// Error receiving a message from the consumer stream
    #[error("failure to consume message `{0}`")]
    ConsumerError(String),

    /// Error acknowledging a message
    #[error("failure to ack message: {0}")]
    AckMessageError(String),

    /// Error negative-acknowledging a message
    #[error("failure to nack message: {0}")]
    NackMessageError(String),

    /// Error rejecting a message
    #[error("failure to reject message: {0}")]
    RejectMessageError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_error_is_passed_through_transparently() {
        let err = AmqpError::from(HandlerError::new("db unavailable"));

        assert_eq!(err.to_string(), "db unavailable");
        assert_eq!(err, AmqpError::Handler("db unavailable".into()));
    }

    #[test]
    fn setup_errors_name_their_stage() {
        let err = AmqpError::BindingExchangeToQueueError(
            "events".to_owned(),
            "events.q".to_owned(),
            "NOT_FOUND".to_owned(),
        );

        assert_eq!(
            err.to_string(),
            "failure to bind exchange `events` to queue `events.q`: NOT_FOUND"
        );
    }
}
