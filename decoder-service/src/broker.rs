//! AMQP consumer plumbing.
//!
//! The transaction service publishes execution events on a durable fanout
//! exchange; this service binds its own durable queue to it and consumes
//! with explicit acks, sent before processing. A broker that cannot be
//! reached at startup is logged and the service runs without a consumer.

use futures::StreamExt;
use lapin::{
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, ExchangeDeclareOptions,
        QueueBindOptions, QueueDeclareOptions, QueueDeleteOptions,
    },
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::services::events::EventsService;

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("unable to connect to the message broker: {0}")]
    UnableToConnect(lapin::Error),
    #[error(transparent)]
    Lapin(#[from] lapin::Error),
}

/// Connection to the events exchange and the service's queue.
pub struct QueueProvider {
    connection: Connection,
    channel: Channel,
    exchange: String,
    queue_name: String,
}

impl QueueProvider {
    /// Connect, declare the fanout exchange and the durable events queue and
    /// bind them.
    pub async fn connect(settings: &Settings) -> Result<Self, BrokerError> {
        let connection =
            Connection::connect(&settings.rabbitmq_amqp_url, ConnectionProperties::default())
                .await
                .map_err(BrokerError::UnableToConnect)?;
        let channel = connection.create_channel().await?;

        channel
            .exchange_declare(
                &settings.rabbitmq_amqp_exchange,
                ExchangeKind::Fanout,
                ExchangeDeclareOptions { durable: true, ..Default::default() },
                FieldTable::default(),
            )
            .await?;
        channel
            .queue_declare(
                &settings.rabbitmq_decoder_events_queue_name,
                QueueDeclareOptions { durable: true, ..Default::default() },
                FieldTable::default(),
            )
            .await?;
        channel
            .queue_bind(
                &settings.rabbitmq_decoder_events_queue_name,
                &settings.rabbitmq_amqp_exchange,
                "",
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        info!(
            target: "broker",
            exchange = %settings.rabbitmq_amqp_exchange,
            queue = %settings.rabbitmq_decoder_events_queue_name,
            "connected to the message broker"
        );
        Ok(Self {
            connection,
            channel,
            exchange: settings.rabbitmq_amqp_exchange.clone(),
            queue_name: settings.rabbitmq_decoder_events_queue_name.clone(),
        })
    }

    /// Spawn the consume loop. Every delivery is acked on receipt and handed
    /// to the events service; empty bodies are dropped.
    pub async fn consume(
        &self,
        events: Arc<EventsService>,
    ) -> Result<JoinHandle<()>, BrokerError> {
        let mut consumer = self
            .channel
            .basic_consume(
                &self.queue_name,
                "safe-decoder-service",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        Ok(tokio::spawn(async move {
            while let Some(delivery) = consumer.next().await {
                let delivery = match delivery {
                    Ok(delivery) => delivery,
                    Err(err) => {
                        error!(target: "broker", %err, "consumer stream failed");
                        break;
                    }
                };
                if let Err(err) = delivery.ack(BasicAckOptions::default()).await {
                    warn!(target: "broker", %err, "cannot ack delivery");
                }
                if delivery.data.is_empty() {
                    continue;
                }
                let body = String::from_utf8_lossy(&delivery.data);
                events.process_event(&body).await;
            }
        }))
    }

    /// Publish a message on the events exchange. Only used by the
    /// `publish-test-event` command to exercise a deployment end to end.
    pub async fn publish(&self, payload: &[u8]) -> Result<(), BrokerError> {
        self.channel
            .basic_publish(
                &self.exchange,
                "",
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default(),
            )
            .await?
            .await?;
        Ok(())
    }

    /// Close the connection, leaving the queue in place.
    pub async fn close(self) -> Result<(), BrokerError> {
        self.connection.close(0, "done").await?;
        Ok(())
    }

    /// Unbind and delete the queue, then close the connection.
    pub async fn disconnect(self) -> Result<(), BrokerError> {
        self.channel
            .queue_unbind(&self.queue_name, &self.exchange, "", FieldTable::default())
            .await?;
        self.channel
            .queue_delete(&self.queue_name, QueueDeleteOptions::default())
            .await?;
        self.connection.close(0, "shutdown").await?;
        Ok(())
    }
}
