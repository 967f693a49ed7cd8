//! Broker connectivity and acknowledgment marshaling.
//!
//! The consume loop owns the AMQP connection and channel; dispatch
//! strategies resolve deliveries through the thread-safe [`AckSender`]
//! handoff instead of touching the channel themselves.

mod consumer;
mod types;

pub use consumer::BrokerConsumer;
pub use types::{AckCommand, AckOutcome, AckSender, BrokerError, Dispatcher, InboundMessage};
