// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Delivery Handler
//!
//! This module defines the task contract for processing deliveries. A handler
//! receives the live `Deliveries` stream and a `Completion`; it drains the
//! stream until it ends (the consumer was cancelled) or it decides to stop, and
//! then reports its terminal outcome exactly once.

use crate::{delivery::Deliveries, errors::HandlerError};
use async_trait::async_trait;
use std::future::Future;
use tokio::sync::oneshot;
use tracing::warn;

pub(crate) type HandlerOutcome = Result<(), HandlerError>;

/// The single-use sink a handler reports its terminal outcome to.
///
/// `report` consumes the completion, so a second report cannot be written.
/// Dropping it without reporting is seen by shutdown as an abandoned handler.
#[derive(Debug)]
pub struct Completion {
    tx: oneshot::Sender<HandlerOutcome>,
}

impl Completion {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<HandlerOutcome>) {
        let (tx, rx) = oneshot::channel();
        (Completion { tx }, rx)
    }

    pub fn report(self, outcome: Result<(), HandlerError>) {
        if self.tx.send(outcome).is_err() {
            warn!("handler completion reported after the consumer was dropped");
        }
    }

    pub fn success(self) {
        self.report(Ok(()))
    }

    pub fn failure(self, err: impl Into<HandlerError>) {
        self.report(Err(err.into()))
    }
}

/// A task that processes the deliveries of one consumer.
///
/// Implemented for any `FnOnce(Deliveries, Completion)` returning a future, so
/// an async closure or function can be passed directly.
#[async_trait]
pub trait DeliveryHandler: Send + 'static {
    async fn run(self, deliveries: Deliveries, done: Completion);
}

#[async_trait]
impl<F, Fut> DeliveryHandler for F
where
    F: FnOnce(Deliveries, Completion) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn run(self, deliveries: Deliveries, done: Completion) {
        (self)(deliveries, done).await
    }
}
