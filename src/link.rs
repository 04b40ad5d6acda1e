// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Broker Link
//!
//! This module defines the capability the consumer manager drives: one
//! connection to the broker plus one channel on it. `Connector` establishes the
//! connection; the returned `BrokerLink` opens the channel and carries out the
//! declare, bind, consume, cancel and close operations. The lapin-backed
//! implementation lives in `channel`.

use crate::{
    delivery::Deliveries,
    errors::AmqpError,
    exchange::ExchangeDefinition,
    queue::{QueueBinding, QueueDefinition},
    tls::TlsConfig,
};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Asynchronous close reasons reported by a connection.
///
/// Yields one message per unexpected disconnect or protocol error and ends
/// when the connection is dropped.
pub type CloseNotifications = mpsc::UnboundedReceiver<String>;

/// A single connection and channel to the broker.
///
/// Every method except `open_channel` and `close_notifications` requires the
/// channel to be open. Once `close` succeeded no further operation is valid.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrokerLink: Send + Sync + 'static {
    /// Subscribes to close notifications of the underlying connection.
    ///
    /// There is a single subscriber: only the first call receives the
    /// notifications, later calls get a receiver that is already closed.
    fn close_notifications(&self) -> CloseNotifications;

    async fn open_channel(&mut self) -> Result<(), AmqpError>;

    async fn declare_exchange(&self, def: &ExchangeDefinition) -> Result<(), AmqpError>;

    /// Declares the queue and returns the name the broker reports for it.
    async fn declare_queue(&self, def: &QueueDefinition) -> Result<String, AmqpError>;

    async fn bind_queue(&self, binding: &QueueBinding) -> Result<(), AmqpError>;

    /// Starts a manually acknowledged, non-exclusive consumer on `queue`.
    async fn consume(&self, queue: &str, consumer_tag: &str) -> Result<Deliveries, AmqpError>;

    /// Cancels the consumer and waits for the broker to confirm it.
    async fn cancel(&self, consumer_tag: &str) -> Result<(), AmqpError>;

    async fn close(&self) -> Result<(), AmqpError>;
}

/// Establishes broker links.
#[async_trait]
pub trait Connector: Send + Sync {
    type Link: BrokerLink;

    /// Connects to `uri`, over TLS when a configuration is given.
    async fn connect(&self, uri: &str, tls: Option<&TlsConfig>) -> Result<Self::Link, AmqpError>;
}
