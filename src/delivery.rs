// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Deliveries
//!
//! This module defines the message records handed to a delivery handler and the
//! stream that carries them. Each delivery owns an acknowledgement handle, since
//! consumers are always started in manual acknowledgement mode. The stream ends
//! once the consumer is cancelled.

use crate::{errors::AmqpError, otel};
use async_trait::async_trait;
use futures_util::{
    stream::{BoxStream, Stream},
    StreamExt,
};
use lapin::{
    options::{BasicAckOptions, BasicNackOptions, BasicRejectOptions},
    BasicProperties,
};
use opentelemetry::{
    global::{BoxedSpan, BoxedTracer},
    Context,
};
use std::{
    fmt,
    pin::Pin,
    sync::Arc,
    task::{self, Poll},
};
use tracing::error;

/// Settles a single delivery with the broker.
#[async_trait]
pub trait Acknowledge: Send + Sync {
    async fn ack(&self) -> Result<(), AmqpError>;

    async fn nack(&self, requeue: bool) -> Result<(), AmqpError>;

    async fn reject(&self, requeue: bool) -> Result<(), AmqpError>;
}

/// Settles through the lapin delivery the payload was taken from.
pub(crate) struct LapinAcker(lapin::message::Delivery);

#[async_trait]
impl Acknowledge for LapinAcker {
    async fn ack(&self) -> Result<(), AmqpError> {
        self.0
            .ack(BasicAckOptions { multiple: false })
            .await
            .map(|_| ())
            .map_err(|err| {
                error!(error = err.to_string(), "error whiling ack msg");
                AmqpError::AckMessageError(err.to_string())
            })
    }

    async fn nack(&self, requeue: bool) -> Result<(), AmqpError> {
        self.0
            .nack(BasicNackOptions {
                multiple: false,
                requeue,
            })
            .await
            .map(|_| ())
            .map_err(|err| {
                error!(error = err.to_string(), "error whiling nack msg");
                AmqpError::NackMessageError(err.to_string())
            })
    }

    async fn reject(&self, requeue: bool) -> Result<(), AmqpError> {
        self.0
            .reject(BasicRejectOptions { requeue })
            .await
            .map(|_| ())
            .map_err(|err| {
                error!(error = err.to_string(), "error whiling reject msg");
                AmqpError::RejectMessageError(err.to_string())
            })
    }
}

/// One message delivered to the consumer.
///
/// Carries the payload, the routing metadata and properties set by the
/// publisher, and the handle used to acknowledge it.
pub struct Delivery {
    pub delivery_tag: u64,
    pub exchange: String,
    pub routing_key: String,
    pub redelivered: bool,
    pub properties: BasicProperties,
    pub data: Vec<u8>,
    acker: Arc<dyn Acknowledge>,
}

impl Delivery {
    /// Creates a delivery settled through the given acknowledgement handle.
    pub fn new(delivery_tag: u64, data: Vec<u8>, acker: Arc<dyn Acknowledge>) -> Self {
        Delivery {
            delivery_tag,
            exchange: String::new(),
            routing_key: String::new(),
            redelivered: false,
            properties: BasicProperties::default(),
            data,
            acker,
        }
    }

    pub fn with_routing(mut self, exchange: &str, routing_key: &str) -> Self {
        self.exchange = exchange.to_owned();
        self.routing_key = routing_key.to_owned();
        self
    }

    pub fn with_properties(mut self, properties: BasicProperties) -> Self {
        self.properties = properties;
        self
    }

    pub async fn ack(&self) -> Result<(), AmqpError> {
        self.acker.ack().await
    }

    pub async fn nack(&self, requeue: bool) -> Result<(), AmqpError> {
        self.acker.nack(requeue).await
    }

    pub async fn reject(&self, requeue: bool) -> Result<(), AmqpError> {
        self.acker.reject(requeue).await
    }

    /// Starts a consumer span continuing the trace propagated in the headers.
    pub fn span(&self, tracer: &BoxedTracer, name: &str) -> (Context, BoxedSpan) {
        otel::new_span(&self.properties, tracer, name)
    }
}

impl From<lapin::message::Delivery> for Delivery {
    fn from(mut delivery: lapin::message::Delivery) -> Self {
        let data = std::mem::take(&mut delivery.data);

        Delivery {
            delivery_tag: delivery.delivery_tag,
            exchange: delivery.exchange.to_string(),
            routing_key: delivery.routing_key.to_string(),
            redelivered: delivery.redelivered,
            properties: delivery.properties.clone(),
            data,
            acker: Arc::new(LapinAcker(delivery)),
        }
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("delivery_tag", &self.delivery_tag)
            .field("exchange", &self.exchange)
            .field("routing_key", &self.routing_key)
            .field("redelivered", &self.redelivered)
            .field("data_len", &self.data.len())
            .finish()
    }
}

/// The live sequence of deliveries for one consumer.
///
/// Ends when the consumer is cancelled or the channel goes away.
pub struct Deliveries {
    inner: BoxStream<'static, Result<Delivery, AmqpError>>,
}

impl Deliveries {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Delivery, AmqpError>> + Send + 'static,
    {
        Deliveries {
            inner: stream.boxed(),
        }
    }
}

impl From<lapin::Consumer> for Deliveries {
    fn from(consumer: lapin::Consumer) -> Self {
        Deliveries::new(consumer.map(|result| match result {
            Ok(delivery) => Ok(Delivery::from(delivery)),
            Err(err) => {
                error!(error = err.to_string(), "errors consume msg");
                Err(AmqpError::ConsumerError(err.to_string()))
            }
        }))
    }
}

impl Stream for Deliveries {
    type Item = Result<Delivery, AmqpError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use futures_util::stream;
    use std::sync::Mutex;

    /// Records how each delivery was settled.
    #[derive(Default)]
    pub(crate) struct RecordingAcker {
        pub(crate) settled: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl Acknowledge for RecordingAcker {
        async fn ack(&self) -> Result<(), AmqpError> {
            self.settled.lock().unwrap().push("ack");
            Ok(())
        }

        async fn nack(&self, requeue: bool) -> Result<(), AmqpError> {
            self.settled
                .lock()
                .unwrap()
                .push(if requeue { "nack-requeue" } else { "nack" });
            Ok(())
        }

        async fn reject(&self, _requeue: bool) -> Result<(), AmqpError> {
            Err(AmqpError::RejectMessageError("channel closed".to_owned()))
        }
    }

    #[tokio::test]
    async fn settles_through_the_ack_handle() {
        let acker = Arc::new(RecordingAcker::default());
        let delivery = Delivery::new(7, b"payload".to_vec(), acker.clone())
            .with_routing("events", "events.created");

        delivery.ack().await.unwrap();
        delivery.nack(true).await.unwrap();
        assert_eq!(
            delivery.reject(false).await,
            Err(AmqpError::RejectMessageError("channel closed".to_owned()))
        );

        assert_eq!(*acker.settled.lock().unwrap(), vec!["ack", "nack-requeue"]);
        assert_eq!(delivery.routing_key, "events.created");
    }

    #[tokio::test]
    async fn deliveries_end_with_the_underlying_stream() {
        let acker = Arc::new(RecordingAcker::default());
        let mut deliveries = Deliveries::new(stream::iter(vec![
            Ok(Delivery::new(1, b"a".to_vec(), acker.clone())),
            Err(AmqpError::ConsumerError("frame error".to_owned())),
        ]));

        assert_eq!(deliveries.next().await.unwrap().unwrap().delivery_tag, 1);
        assert!(deliveries.next().await.unwrap().is_err());
        assert!(deliveries.next().await.is_none());
    }
}
