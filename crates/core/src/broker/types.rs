//! Types for broker consumption and acknowledgment marshaling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;

/// Errors that can occur while talking to the broker.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Queue declaration failed: {0}")]
    QueueDeclare(String),

    #[error("Consume error: {0}")]
    Consume(String),
}

/// A message delivered from the broker, decoupled from the channel that
/// delivered it. Only the consumer task may touch the channel; everyone else
/// resolves the delivery through an [`AckSender`].
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub delivery_tag: u64,
    pub body: Vec<u8>,
}

/// How a delivery should be resolved on the broker channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// Message handled; remove it from the queue.
    Ack,
    /// Message not handled; put it back for redelivery.
    NackRequeue,
}

impl AckOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AckOutcome::Ack => "ack",
            AckOutcome::NackRequeue => "nack",
        }
    }
}

/// Command sent back to the consumer task, which owns the channel and is the
/// only place `basic_ack`/`basic_nack` are invoked.
#[derive(Debug)]
pub struct AckCommand {
    pub delivery_tag: u64,
    pub outcome: AckOutcome,
}

/// Handle for resolving a single delivery from any task.
///
/// Guarantees at most one command reaches the channel per delivery; a second
/// resolution attempt is logged and dropped.
pub struct AckSender {
    delivery_tag: u64,
    tx: mpsc::UnboundedSender<AckCommand>,
    resolved: Arc<AtomicBool>,
}

impl AckSender {
    pub fn new(delivery_tag: u64, tx: mpsc::UnboundedSender<AckCommand>) -> Self {
        Self {
            delivery_tag,
            tx,
            resolved: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Acknowledge the delivery.
    pub fn ack(&self) {
        self.send(AckOutcome::Ack);
    }

    /// Negatively acknowledge the delivery, requesting redelivery.
    pub fn nack_requeue(&self) {
        self.send(AckOutcome::NackRequeue);
    }

    fn send(&self, outcome: AckOutcome) {
        if self.resolved.swap(true, Ordering::SeqCst) {
            warn!(
                "Delivery {} already resolved, ignoring duplicate {}",
                self.delivery_tag,
                outcome.as_str()
            );
            return;
        }

        let command = AckCommand {
            delivery_tag: self.delivery_tag,
            outcome,
        };
        if self.tx.send(command).is_err() {
            // Consumer session is gone; the broker will redeliver the
            // unacknowledged message on the next connection.
            warn!(
                "Consumer closed before delivery {} could be resolved",
                self.delivery_tag
            );
        }
    }
}

/// A dispatch strategy for inbound messages.
///
/// Implementations must resolve every delivery exactly once through the
/// provided [`AckSender`], and must not block the consume loop: long-running
/// work belongs on spawned tasks or an internal queue.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Number of unacknowledged messages the broker may hand this consumer at
    /// once. Used as the channel prefetch count, coupling broker backpressure
    /// to the strategy's actual parallelism.
    fn concurrency_bound(&self) -> u16;

    async fn dispatch(&self, message: InboundMessage, ack: AckSender);
}
