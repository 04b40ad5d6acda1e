// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # AMQP Channel Management
//!
//! This module provides the lapin implementation of the broker link. It
//! establishes connections to the RabbitMQ server, plain or over TLS, opens the
//! channel used by the consumer and forwards each topology, consume and
//! teardown operation to it.

use crate::{
    delivery::Deliveries,
    errors::AmqpError,
    exchange::ExchangeDefinition,
    link::{BrokerLink, CloseNotifications, Connector},
    queue::{QueueBinding, QueueDefinition},
    tls::TlsConfig,
};
use async_trait::async_trait;
use lapin::{
    options::{BasicCancelOptions, BasicConsumeOptions},
    tcp::OwnedTLSConfig,
    types::{FieldTable, LongString},
    Channel, Connection, ConnectionProperties,
};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

const REPLY_SUCCESS: u16 = 200;
const CHANNEL_NOT_OPEN: &str = "channel is not open";

/// Connects to RabbitMQ with lapin.
#[derive(Debug, Clone, Default)]
pub struct LapinConnector {
    connection_name: Option<String>,
}

impl LapinConnector {
    /// Creates a connector with lapin's default connection properties.
    ///
    /// # Returns
    /// A new connector without a connection name
    pub fn new() -> Self {
        LapinConnector::default()
    }

    /// Sets the connection name shown in the broker management UI.
    ///
    /// # Parameters
    /// * `name` - The client-provided connection name
    ///
    /// # Returns
    /// Self for method chaining
    pub fn with_connection_name(mut self, name: &str) -> Self {
        self.connection_name = Some(name.to_owned());
        self
    }

    fn properties(&self) -> ConnectionProperties {
        let options = ConnectionProperties::default();

        match &self.connection_name {
            Some(name) => options.with_connection_name(LongString::from(name.clone())),
            None => options,
        }
    }
}

#[async_trait]
impl Connector for LapinConnector {
    type Link = LapinLink;

    async fn connect(&self, uri: &str, tls: Option<&TlsConfig>) -> Result<LapinLink, AmqpError> {
        debug!("creating amqp connection...");

        let connected = match tls {
            Some(cfg) => {
                debug!("using tls transport");
                Connection::connect_with_config(uri, self.properties(), OwnedTLSConfig::from(cfg))
                    .await
            }
            None => Connection::connect(uri, self.properties()).await,
        };

        let conn = match connected {
            Ok(c) => Ok(c),
            Err(err) => {
                error!(error = err.to_string(), "failure to connect");
                Err(AmqpError::ConnectionError(err.to_string()))
            }
        }?;
        debug!("amqp connected");

        let (tx, closes) = CloseSignal::channel();
        conn.on_error(move |err| {
            let _ = tx.send(err.to_string());
        });

        Ok(LapinLink {
            conn,
            channel: None,
            closes,
        })
    }
}

/// Close reasons of one connection, handed to a single subscriber.
///
/// lapin keeps one error callback per connection, so the callback is
/// registered once at connect time and its receiver can be taken once.
struct CloseSignal {
    rx: Mutex<Option<CloseNotifications>>,
}

impl CloseSignal {
    fn channel() -> (mpsc::UnboundedSender<String>, CloseSignal) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, CloseSignal { rx: Mutex::new(Some(rx)) })
    }

    /// Takes the receiver. Later calls get a receiver that is already closed.
    fn subscribe(&self) -> CloseNotifications {
        let taken = self.rx.lock().ok().and_then(|mut rx| rx.take());

        taken.unwrap_or_else(|| {
            warn!("close notifications already have a subscriber");
            let (_, rx) = mpsc::unbounded_channel();
            rx
        })
    }
}

/// A lapin connection and the channel opened on it.
pub struct LapinLink {
    conn: Connection,
    channel: Option<Channel>,
    closes: CloseSignal,
}

impl LapinLink {
    fn channel(&self) -> Result<&Channel, String> {
        self.channel.as_ref().ok_or_else(|| CHANNEL_NOT_OPEN.to_owned())
    }
}

#[async_trait]
impl BrokerLink for LapinLink {
    fn close_notifications(&self) -> CloseNotifications {
        self.closes.subscribe()
    }

    async fn open_channel(&mut self) -> Result<(), AmqpError> {
        debug!("creating amqp channel...");

        match self.conn.create_channel().await {
            Ok(c) => {
                debug!("channel created");
                self.channel = Some(c);
                Ok(())
            }
            Err(err) => {
                error!(error = err.to_string(), "error to create the channel");
                Err(AmqpError::ChannelError(err.to_string()))
            }
        }
    }

    async fn declare_exchange(&self, def: &ExchangeDefinition) -> Result<(), AmqpError> {
        let channel = self
            .channel()
            .map_err(|e| AmqpError::DeclareExchangeError(def.name.clone(), e))?;

        match channel
            .exchange_declare(
                &def.name,
                def.kind.clone().into(),
                def.options(),
                def.arguments(),
            )
            .await
        {
            Err(err) => {
                error!(
                    error = err.to_string(),
                    name = %def.name,
                    "error to declare the exchange"
                );
                Err(AmqpError::DeclareExchangeError(
                    def.name.clone(),
                    err.to_string(),
                ))
            }
            _ => Ok(()),
        }
    }

    async fn declare_queue(&self, def: &QueueDefinition) -> Result<String, AmqpError> {
        let channel = self
            .channel()
            .map_err(|e| AmqpError::DeclareQueueError(def.name.clone(), e))?;

        match channel
            .queue_declare(&def.name, def.options(), FieldTable::default())
            .await
        {
            Err(err) => {
                error!(
                    error = err.to_string(),
                    name = %def.name,
                    "error to declare the queue"
                );
                Err(AmqpError::DeclareQueueError(def.name.clone(), err.to_string()))
            }
            Ok(queue) => Ok(queue.name().as_str().to_owned()),
        }
    }

    async fn bind_queue(&self, binding: &QueueBinding) -> Result<(), AmqpError> {
        let bind_error = |cause: String| {
            AmqpError::BindingExchangeToQueueError(
                binding.exchange_name.clone(),
                binding.queue_name.clone(),
                cause,
            )
        };

        let channel = self.channel().map_err(bind_error)?;

        match channel
            .queue_bind(
                &binding.queue_name,
                &binding.exchange_name,
                &binding.routing_key,
                binding.options(),
                binding.arguments(),
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "error to bind queue to exchange");
                Err(bind_error(err.to_string()))
            }
            _ => Ok(()),
        }
    }

    async fn consume(&self, queue: &str, consumer_tag: &str) -> Result<Deliveries, AmqpError> {
        let channel = self
            .channel()
            .map_err(|e| AmqpError::BindingConsumerError(consumer_tag.to_owned(), e))?;

        match channel
            .basic_consume(
                queue,
                consumer_tag,
                BasicConsumeOptions {
                    no_local: false,
                    no_ack: false,
                    exclusive: false,
                    nowait: false,
                },
                FieldTable::default(),
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "error to create the consumer");
                Err(AmqpError::BindingConsumerError(
                    consumer_tag.to_owned(),
                    err.to_string(),
                ))
            }
            Ok(consumer) => Ok(Deliveries::from(consumer)),
        }
    }

    async fn cancel(&self, consumer_tag: &str) -> Result<(), AmqpError> {
        let channel = self
            .channel()
            .map_err(|e| AmqpError::ConsumerCancelError(consumer_tag.to_owned(), e))?;

        channel
            .basic_cancel(consumer_tag, BasicCancelOptions { nowait: false })
            .await
            .map_err(|err| {
                error!(error = err.to_string(), "consumer cancel failed");
                AmqpError::ConsumerCancelError(consumer_tag.to_owned(), err.to_string())
            })
    }

    async fn close(&self) -> Result<(), AmqpError> {
        self.conn
            .close(REPLY_SUCCESS, "OK")
            .await
            .map_err(|err| {
                error!(error = err.to_string(), "amqp connection close error");
                AmqpError::ConnectionCloseError(err.to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn close_reasons_reach_the_first_subscriber_only() {
        let (tx, closes) = CloseSignal::channel();
        let mut first = closes.subscribe();
        let mut second = closes.subscribe();

        tx.send("CONNECTION_FORCED".to_owned()).unwrap();
        drop(tx);

        assert_eq!(first.recv().await, Some("CONNECTION_FORCED".to_owned()));
        assert_eq!(first.recv().await, None);
        assert_eq!(second.recv().await, None);
    }
}
