// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Consumer Manager
//!
//! This module owns the lifecycle of one consumer: it connects to the broker,
//! declares the topology, starts consuming and hands the deliveries to a
//! caller-supplied handler task. Shutdown cancels the consumer, closes the
//! connection and then waits for the handler to report, so no delivery is left
//! mid-processing when the caller regains control.
//!
//! Setup is fail-fast. If any step after the connection fails, the connection
//! is released before the error is returned. Unexpected disconnects are logged
//! by a close watcher but never trigger reconnection.

use crate::{
    channel::{LapinConnector, LapinLink},
    config::ConsumerConfig,
    delivery::Deliveries,
    errors::AmqpError,
    handler::{Completion, DeliveryHandler, HandlerOutcome},
    link::{BrokerLink, CloseNotifications, Connector},
    tls::TlsConfig,
    topology::TopologyDescriptor,
};
use std::time::Duration;
use tokio::{sync::oneshot, task::JoinHandle, time};
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LifecycleState {
    Consuming,
    Cancelled,
    Closed,
    Drained,
}

/// A running consumer and the tasks attached to it.
pub struct ConsumerManager<L: BrokerLink = LapinLink> {
    link: L,
    consumer_tag: String,
    done: Option<oneshot::Receiver<HandlerOutcome>>,
    handler: Option<JoinHandle<()>>,
    watcher: JoinHandle<()>,
    shutdown_timeout: Option<Duration>,
    state: LifecycleState,
}

impl ConsumerManager<LapinLink> {
    /// Connects with lapin and starts consuming.
    ///
    /// The connection uses TLS when `tls` is given, plain TCP otherwise.
    pub async fn setup<H>(
        uri: &str,
        topology: TopologyDescriptor,
        handler: H,
        tls: Option<TlsConfig>,
    ) -> Result<Self, AmqpError>
    where
        H: DeliveryHandler,
    {
        Self::setup_with(&LapinConnector::new(), uri, topology, handler, tls).await
    }

    /// Connects and starts consuming as described by `cfg`.
    ///
    /// # Parameters
    /// * `cfg` - The broker, topology, TLS and shutdown settings
    /// * `handler` - The task the deliveries are handed to
    ///
    /// # Returns
    /// A running consumer, or the error of the first setup step that failed
    pub async fn from_config<H>(cfg: &ConsumerConfig, handler: H) -> Result<Self, AmqpError>
    where
        H: DeliveryHandler,
    {
        let connector = match &cfg.connection_name {
            Some(name) => LapinConnector::new().with_connection_name(name),
            None => LapinConnector::new(),
        };

        let manager =
            Self::setup_with(&connector, &cfg.uri, cfg.topology(), handler, cfg.tls.clone())
                .await?;

        Ok(manager.with_shutdown_timeout(cfg.shutdown_timeout()))
    }
}

impl<L: BrokerLink> ConsumerManager<L> {
    /// Connects through `connector`, declares the topology and starts consuming.
    ///
    /// Steps run in order and the first failure is returned:
    /// 1. connect (no background task is started when this fails)
    /// 2. spawn the close watcher
    /// 3. open the channel
    /// 4. declare the exchange, declare the queue and bind them
    /// 5. start the consumer
    /// 6. spawn the handler task with the deliveries and its completion
    pub async fn setup_with<C, H>(
        connector: &C,
        uri: &str,
        topology: TopologyDescriptor,
        handler: H,
        tls: Option<TlsConfig>,
    ) -> Result<Self, AmqpError>
    where
        C: Connector<Link = L>,
        H: DeliveryHandler,
    {
        debug!(consumer_tag = topology.consumer_tag(), "starting consumer");

        let mut link = connector.connect(uri, tls.as_ref()).await?;
        let watcher = tokio::spawn(watch_close(link.close_notifications()));

        let deliveries = match Self::start_consuming(&mut link, &topology).await {
            Ok(deliveries) => deliveries,
            Err(err) => {
                release(&link).await;
                watcher.abort();
                return Err(err);
            }
        };

        debug!("consume started, spawning the delivery handler");
        let (done, rx) = Completion::channel();
        let handler = tokio::spawn(handler.run(deliveries, done));

        Ok(ConsumerManager {
            link,
            consumer_tag: topology.consumer_tag().to_owned(),
            done: Some(rx),
            handler: Some(handler),
            watcher,
            shutdown_timeout: None,
            state: LifecycleState::Consuming,
        })
    }

    async fn start_consuming(
        link: &mut L,
        topology: &TopologyDescriptor,
    ) -> Result<Deliveries, AmqpError> {
        link.open_channel().await?;
        let queue = topology.install(&*link).await?;

        debug!(
            "starting consume on queue: {} with tag: {}",
            queue,
            topology.consumer_tag()
        );
        link.consume(&queue, topology.consumer_tag()).await
    }

    /// Bounds how long `shutdown` waits for the handler to report.
    ///
    /// The deadline covers the whole wait, including joining a handler that
    /// dropped its completion without reporting.
    ///
    /// # Parameters
    /// * `timeout` - The deadline, or `None` to wait indefinitely
    ///
    /// # Returns
    /// Self for method chaining
    pub fn with_shutdown_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Returns the tag the consumer is registered under.
    pub fn consumer_tag(&self) -> &str {
        &self.consumer_tag
    }

    /// Cancels the consumer, closes the connection and waits for the handler.
    ///
    /// Cancelling ends the handler's delivery stream, which lets it drain and
    /// report. The handler's outcome is returned as is.
    ///
    /// A failed step is returned immediately and the next call resumes from
    /// it: a failed cancel leaves the connection open. Calling again after a
    /// completed shutdown returns `AlreadyShutdown`.
    pub async fn shutdown(&mut self) -> Result<(), AmqpError> {
        if self.state == LifecycleState::Drained {
            error!(consumer_tag = %self.consumer_tag, "consumer was already shut down");
            return Err(AmqpError::AlreadyShutdown);
        }

        if self.state == LifecycleState::Consuming {
            debug!(consumer_tag = %self.consumer_tag, "cancelling consumer");
            self.link.cancel(&self.consumer_tag).await?;
            self.state = LifecycleState::Cancelled;
        }

        if self.state == LifecycleState::Cancelled {
            debug!("closing amqp connection");
            self.link.close().await?;
            self.state = LifecycleState::Closed;
            self.watcher.abort();
        }

        debug!("waiting for the delivery handler to finish");
        let wait = await_handler(&mut self.done, &mut self.handler);
        let result = match self.shutdown_timeout {
            Some(limit) => match time::timeout(limit, wait).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(timeout = ?limit, "delivery handler did not report in time");
                    return Err(AmqpError::HandlerTimeout(limit));
                }
            },
            None => wait.await,
        };
        self.state = LifecycleState::Drained;

        result
    }
}

impl<L: BrokerLink> Drop for ConsumerManager<L> {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

async fn watch_close(mut notifications: CloseNotifications) {
    debug!("waiting for connection close notifications");

    if let Some(reason) = notifications.recv().await {
        warn!(reason = %reason, "closing: {}", reason);
    }
}

/// Awaits the handler's report, or its exit when the completion was dropped.
///
/// Both waits fall under the caller's deadline. A dropped completion is
/// forgotten, so a retried wait goes straight to the join.
async fn await_handler(
    done: &mut Option<oneshot::Receiver<HandlerOutcome>>,
    handler: &mut Option<JoinHandle<()>>,
) -> Result<(), AmqpError> {
    if let Some(rx) = done.as_mut() {
        let reported = rx.await;
        done.take();

        if let Ok(result) = reported {
            debug!("delivery handler finished");
            return result.map_err(AmqpError::from);
        }
    }

    let Some(task) = handler.as_mut() else {
        return Err(AmqpError::HandlerAbandoned);
    };
    let joined = task.await;
    handler.take();

    match joined {
        Err(err) if err.is_panic() => {
            error!("delivery handler panicked");
            Err(AmqpError::HandlerPanicked)
        }
        _ => {
            error!("delivery handler finished without reporting");
            Err(AmqpError::HandlerAbandoned)
        }
    }
}

async fn release<L: BrokerLink>(link: &L) {
    if let Err(err) = link.close().await {
        warn!(
            error = err.to_string(),
            "failure to release the connection after a setup error"
        );
    }
}
