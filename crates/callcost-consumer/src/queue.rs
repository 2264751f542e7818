//! RabbitMQ queue consumer
//!
//! Connects with `lapin`, declares the configured queue as durable and
//! consumes with auto-acknowledge. A delivery is therefore acknowledged as
//! soon as the broker hands it over; processing is at-most-once.

use callcost_core::config::RabbitMqConfig;
use callcost_core::{AppError, AppResult};
use futures::{Stream, StreamExt};
use lapin::options::{BasicConsumeOptions, BasicQosOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties};
use std::future::Future;
use tracing::{error, info, warn};

use crate::dispatcher::{DispatchStatus, Dispatcher};

/// Delivery counters for one consumer run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    pub received: u64,
    pub handled: u64,
    pub dropped: u64,
    pub failed: u64,
}

impl DeliveryStats {
    fn record(&mut self, status: DispatchStatus) {
        self.received += 1;
        match status {
            DispatchStatus::Handled(_) => self.handled += 1,
            DispatchStatus::Dropped => self.dropped += 1,
            DispatchStatus::Failed => self.failed += 1,
        }
    }
}

/// Feed payloads to the dispatcher one at a time, in order
pub async fn process_stream<S>(dispatcher: &Dispatcher, payloads: S) -> DeliveryStats
where
    S: Stream<Item = Vec<u8>>,
{
    let mut stats = DeliveryStats::default();
    futures::pin_mut!(payloads);

    while let Some(payload) = payloads.next().await {
        stats.record(dispatcher.process(&payload).await);
    }

    stats
}

/// Consumer bound to one queue
pub struct QueueConsumer {
    connection: Connection,
    channel: Channel,
    config: RabbitMqConfig,
}

impl QueueConsumer {
    /// Connect, open a channel and declare the queue
    pub async fn connect(config: &RabbitMqConfig) -> AppResult<Self> {
        let connection = Connection::connect(
            &config.url,
            ConnectionProperties::default().with_connection_name(config.consumer_tag.clone().into()),
        )
        .await
        .map_err(|e| AppError::Messaging(format!("RabbitMQ connection failed: {}", e)))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| AppError::Messaging(format!("RabbitMQ channel creation failed: {}", e)))?;

        channel
            .basic_qos(config.prefetch_count, BasicQosOptions::default())
            .await
            .map_err(|e| AppError::Messaging(format!("Failed to set QoS: {}", e)))?;

        channel
            .queue_declare(
                &config.queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                AppError::Messaging(format!("Failed to declare queue {}: {}", config.queue, e))
            })?;

        info!(queue = %config.queue, "Connected to RabbitMQ");

        Ok(Self {
            connection,
            channel,
            config: config.clone(),
        })
    }

    /// Consume until Ctrl-C or until the broker closes the stream
    pub async fn run(self, dispatcher: &Dispatcher) -> AppResult<DeliveryStats> {
        self.run_until(dispatcher, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Consume until `shutdown` resolves or the broker closes the stream.
    ///
    /// The message being processed when `shutdown` fires is finished first.
    pub async fn run_until<F>(self, dispatcher: &Dispatcher, shutdown: F) -> AppResult<DeliveryStats>
    where
        F: Future<Output = ()>,
    {
        let mut consumer = self
            .channel
            .basic_consume(
                &self.config.queue,
                &self.config.consumer_tag,
                BasicConsumeOptions {
                    no_ack: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| AppError::Messaging(format!("Failed to start consumer: {}", e)))?;

        info!(
            queue = %self.config.queue,
            consumer_tag = %self.config.consumer_tag,
            "Waiting for messages"
        );

        let mut stats = DeliveryStats::default();
        futures::pin_mut!(shutdown);

        let result = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received, stopping consumer");
                    break Ok(stats);
                }
                next = consumer.next() => match next {
                    Some(Ok(delivery)) => {
                        stats.record(dispatcher.process(&delivery.data).await);
                    }
                    Some(Err(e)) => {
                        error!("Consumer error: {}", e);
                        break Err(AppError::Messaging(format!("Consumer stream failed: {}", e)));
                    }
                    None => {
                        warn!("Consumer stream closed by broker");
                        break Ok(stats);
                    }
                }
            }
        };

        info!(
            received = stats.received,
            handled = stats.handled,
            dropped = stats.dropped,
            failed = stats.failed,
            "Consumer stopped"
        );
        self.close().await;
        result
    }

    async fn close(&self) {
        if let Err(e) = self.channel.close(200, "shutdown").await {
            warn!("Failed to close channel: {}", e);
        }
        if let Err(e) = self.connection.close(200, "shutdown").await {
            warn!("Failed to close connection: {}", e);
        }
    }
}
