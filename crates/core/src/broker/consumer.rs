//! Broker connection management and the consume loop.
//!
//! The consumer owns the AMQP connection and channel for its whole session;
//! all acknowledgments funnel back to it as [`AckCommand`]s so channel
//! operations never happen on worker tasks.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::config::BrokerConfig;
use crate::metrics;

use super::types::{AckCommand, AckOutcome, AckSender, BrokerError, Dispatcher, InboundMessage};

/// How a consume session ended.
enum SessionEnd {
    /// Shutdown was signalled; do not reconnect.
    Shutdown,
    /// The delivery stream closed (broker went away); reconnect.
    StreamClosed,
}

/// Blocking consumer that (re)establishes broker connectivity forever.
///
/// Connectivity failures are never fatal: the consumer logs, sleeps a fixed
/// retry delay and reconnects, indefinitely. The only way out is the shutdown
/// signal.
pub struct BrokerConsumer {
    config: BrokerConfig,
    dispatcher: Arc<dyn Dispatcher>,
}

impl BrokerConsumer {
    pub fn new(config: BrokerConfig, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self { config, dispatcher }
    }

    /// Run the consume loop until shutdown is signalled.
    ///
    /// In-flight work holds its own [`AckSender`]; deliveries left unresolved
    /// when a session dies are redelivered by the broker.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let retry_delay = Duration::from_secs(self.config.retry_delay_secs);

        loop {
            info!(
                "Connecting to broker at {}:{}...",
                self.config.host, self.config.port
            );

            match self.consume_session(&mut shutdown).await {
                Ok(SessionEnd::Shutdown) => {
                    info!("Shutting down consumer");
                    break;
                }
                Ok(SessionEnd::StreamClosed) => {
                    warn!("Broker closed the delivery stream");
                }
                Err(e) => {
                    error!("Broker connection error: {}", e);
                }
            }

            metrics::BROKER_RECONNECTS.inc();
            info!("Retrying in {}s...", self.config.retry_delay_secs);
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Shutting down consumer");
                    break;
                }
                _ = tokio::time::sleep(retry_delay) => {}
            }
        }
    }

    /// Establish one connection+channel and consume until it dies or shutdown
    /// is signalled.
    async fn consume_session(
        &self,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<SessionEnd, BrokerError> {
        let connection = Connection::connect(
            &self.config.amqp_uri(),
            ConnectionProperties::default().with_connection_name("conveyor-consumer".into()),
        )
        .await
        .map_err(|e| BrokerError::ConnectionFailed(e.to_string()))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| BrokerError::Channel(e.to_string()))?;

        // Idempotent: safe if the producer already declared the queue.
        channel
            .queue_declare(
                &self.config.queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::QueueDeclare(e.to_string()))?;

        // Prefetch = the dispatcher's parallelism, so the broker never hands
        // us more unacknowledged messages than we can actually work on.
        let prefetch = self.dispatcher.concurrency_bound();
        channel
            .basic_qos(prefetch, BasicQosOptions::default())
            .await
            .map_err(|e| BrokerError::Channel(e.to_string()))?;

        let mut consumer = channel
            .basic_consume(
                &self.config.queue,
                "conveyor",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::Consume(e.to_string()))?;

        info!(
            "Connected to broker, consuming from '{}' (prefetch: {})",
            self.config.queue, prefetch
        );

        // Ack command channel for this session. Dispatched work holds clones
        // of the sender; commands are applied here, on the channel owner.
        let (ack_tx, mut ack_rx) = mpsc::unbounded_channel::<AckCommand>();

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    // Apply acks already queued by finished workers before
                    // tearing the channel down.
                    while let Ok(command) = ack_rx.try_recv() {
                        Self::apply_ack(&channel, command).await;
                    }
                    return Ok(SessionEnd::Shutdown);
                }
                Some(command) = ack_rx.recv() => {
                    Self::apply_ack(&channel, command).await;
                }
                delivery = consumer.next() => {
                    match delivery {
                        Some(Ok(delivery)) => {
                            metrics::MESSAGES_CONSUMED.inc();
                            debug!(
                                "Received delivery {} from '{}'",
                                delivery.delivery_tag, self.config.queue
                            );
                            let message = InboundMessage {
                                delivery_tag: delivery.delivery_tag,
                                body: delivery.data,
                            };
                            let ack = AckSender::new(message.delivery_tag, ack_tx.clone());
                            self.dispatcher.dispatch(message, ack).await;
                        }
                        Some(Err(e)) => return Err(BrokerError::Consume(e.to_string())),
                        None => return Ok(SessionEnd::StreamClosed),
                    }
                }
            }
        }
    }

    /// Apply an ack/nack on the channel. Failures here are logged, not
    /// propagated: the message stays unacknowledged and the broker redelivers
    /// it, which opens a duplicate-processing window once a task exists.
    async fn apply_ack(channel: &Channel, command: AckCommand) {
        let result = match command.outcome {
            AckOutcome::Ack => {
                channel
                    .basic_ack(command.delivery_tag, BasicAckOptions::default())
                    .await
            }
            AckOutcome::NackRequeue => {
                channel
                    .basic_nack(
                        command.delivery_tag,
                        BasicNackOptions {
                            requeue: true,
                            ..Default::default()
                        },
                    )
                    .await
            }
        };

        match result {
            Ok(()) => {
                metrics::ACKS_APPLIED
                    .with_label_values(&[command.outcome.as_str()])
                    .inc();
                debug!(
                    "Applied {} for delivery {}",
                    command.outcome.as_str(),
                    command.delivery_tag
                );
            }
            Err(e) => {
                warn!(
                    "Failed to {} delivery {}: {} (message will be redelivered)",
                    command.outcome.as_str(),
                    command.delivery_tag,
                    e
                );
            }
        }
    }
}
