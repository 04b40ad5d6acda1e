// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Consumer
//!
//! Connection and session lifecycle for a single RabbitMQ consumer. A
//! `ConsumerManager` connects, declares a durable exchange and queue, binds
//! them, starts a manually acknowledged consumer and runs a caller-supplied
//! `DeliveryHandler` over the deliveries. `ConsumerManager::shutdown` cancels
//! the consumer, closes the connection and returns only once the handler has
//! drained its stream and reported.

mod otel;

pub mod channel;
pub mod config;
pub mod consumer;
pub mod delivery;
pub mod errors;
pub mod exchange;
pub mod handler;
pub mod link;
pub mod queue;
pub mod tls;
pub mod topology;

pub use consumer::ConsumerManager;
pub use delivery::{Deliveries, Delivery};
pub use errors::{AmqpError, HandlerError};
pub use handler::{Completion, DeliveryHandler};
pub use topology::TopologyDescriptor;
