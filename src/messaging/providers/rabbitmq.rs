//! # RabbitMQ Transport
//!
//! [`MessageTransport`] over AMQP 0.9.1 using the `lapin` crate.
//!
//! ## Features
//!
//! - **Topic exchange**: durable exchange, queue bindings per topic or pattern
//! - **Push delivery**: `basic_consume` drives a tokio consumer loop per subscription
//! - **Manual acknowledgement**: deliveries stay unacked until the routing layer acks
//! - **Prefetch control**: consumer backpressure through `basic_qos`
//!
//! ## Usage
//!
//! ```ignore
//! use topicbus::config::BusConfig;
//! use topicbus::messaging::providers::RabbitMqTransport;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BusConfig::from_env()?;
//! let transport = RabbitMqTransport::connect(&config).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
    ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::BusConfig;
use crate::messaging::errors::{TransportError, TransportResult};
use crate::messaging::message::{DeliveryTag, HeaderValue, Headers, InboundMessage};
use crate::messaging::transport::{DeliveryHandler, MessageTransport};

const PERSISTENT_DELIVERY_MODE: u8 = 2;
const REPLY_SUCCESS: u16 = 200;

/// RabbitMQ-backed transport
pub struct RabbitMqTransport {
    connection: Connection,
    channel: Channel,
    connection_name: String,
    consumers: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for RabbitMqTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RabbitMqTransport")
            .field("connection_name", &self.connection_name)
            .field("connected", &self.connection.status().connected())
            .finish()
    }
}

impl RabbitMqTransport {
    /// Connect, open a channel and apply the configured prefetch
    pub async fn connect(config: &BusConfig) -> TransportResult<Self> {
        info!(
            url = %config.url_redacted(),
            connection_name = %config.connection_name,
            "Connecting to RabbitMQ"
        );

        let connection = Connection::connect(
            &config.url,
            ConnectionProperties::default()
                .with_connection_name(config.connection_name.clone().into()),
        )
        .await
        .map_err(|e| TransportError::connection(format!("RabbitMQ connection failed: {e}")))?;

        let channel = connection.create_channel().await.map_err(|e| {
            TransportError::connection(format!("RabbitMQ channel creation failed: {e}"))
        })?;

        channel
            .basic_qos(config.prefetch_count, BasicQosOptions::default())
            .await
            .map_err(|e| TransportError::connection(format!("Failed to set QoS: {e}")))?;

        Ok(Self {
            connection,
            channel,
            connection_name: config.connection_name.clone(),
            consumers: Mutex::new(Vec::new()),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connection.status().connected()
    }
}

#[async_trait]
impl MessageTransport for RabbitMqTransport {
    async fn declare_topic_exchange(&self, name: &str) -> TransportResult<()> {
        self.channel
            .exchange_declare(
                name,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| TransportError::declare("exchange", name, e.to_string()))?;

        debug!(exchange = %name, "Declared topic exchange");
        Ok(())
    }

    async fn declare_queue(&self, name: &str) -> TransportResult<()> {
        self.channel
            .queue_declare(
                name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| TransportError::declare("queue", name, e.to_string()))?;

        debug!(queue = %name, "Declared queue");
        Ok(())
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> TransportResult<()> {
        self.channel
            .queue_bind(
                queue,
                exchange,
                routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| TransportError::bind(queue, exchange, routing_key, e.to_string()))?;

        debug!(queue = %queue, exchange = %exchange, routing_key = %routing_key, "Bound queue");
        Ok(())
    }

    async fn subscribe(
        &self,
        queue: &str,
        handler: Arc<dyn DeliveryHandler>,
    ) -> TransportResult<String> {
        let consumer_tag = format!("{}-{}", self.connection_name, Uuid::new_v4());
        let mut consumer = self
            .channel
            .basic_consume(
                queue,
                &consumer_tag,
                BasicConsumeOptions {
                    no_ack: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| TransportError::subscribe(queue, e.to_string()))?;

        let loop_queue = queue.to_string();
        let loop_tag = consumer_tag.clone();
        let handle = tokio::spawn(async move {
            while let Some(delivery) = consumer.next().await {
                match delivery {
                    Ok(delivery) => handler.on_delivery(to_inbound(delivery, &loop_tag)),
                    Err(e) => {
                        error!(
                            queue = %loop_queue,
                            consumer_tag = %loop_tag,
                            error = %e,
                            "RabbitMQ consumer stream failed"
                        );
                        break;
                    }
                }
            }
            debug!(queue = %loop_queue, consumer_tag = %loop_tag, "Consumer loop finished");
        });
        self.consumers.lock().push(handle);

        info!(queue = %queue, consumer_tag = %consumer_tag, "Subscribed to queue");
        Ok(consumer_tag)
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        headers: Headers,
        body: Vec<u8>,
    ) -> TransportResult<()> {
        let properties = BasicProperties::default()
            .with_delivery_mode(PERSISTENT_DELIVERY_MODE)
            .with_headers(to_field_table(&headers));

        let confirm = self
            .channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                &body,
                properties,
            )
            .await
            .map_err(|e| TransportError::publish(exchange, routing_key, e.to_string()))?;

        confirm.await.map_err(|e| {
            TransportError::publish(
                exchange,
                routing_key,
                format!("Publish confirmation failed: {e}"),
            )
        })?;

        Ok(())
    }

    async fn acknowledge(&self, delivery_tag: DeliveryTag) -> TransportResult<()> {
        self.channel
            .basic_ack(delivery_tag.value(), BasicAckOptions::default())
            .await
            .map_err(|e| TransportError::acknowledge(delivery_tag.value(), e.to_string()))
    }

    async fn close(&self) -> TransportResult<()> {
        for handle in self.consumers.lock().drain(..) {
            handle.abort();
        }

        if let Err(e) = self.channel.close(REPLY_SUCCESS, "OK").await {
            warn!(error = %e, "Failed to close RabbitMQ channel cleanly");
        }
        self.connection
            .close(REPLY_SUCCESS, "OK")
            .await
            .map_err(|e| TransportError::close(e.to_string()))?;

        info!(connection_name = %self.connection_name, "RabbitMQ transport closed");
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "rabbitmq"
    }
}

fn to_inbound(delivery: Delivery, consumer_tag: &str) -> InboundMessage {
    let headers = delivery
        .properties
        .headers()
        .as_ref()
        .map(from_field_table)
        .unwrap_or_default();

    InboundMessage::builder(delivery.routing_key.as_str())
        .exchange(delivery.exchange.as_str())
        .consumer_tag(consumer_tag)
        .delivery_tag(delivery.delivery_tag)
        .redelivered(delivery.redelivered)
        .headers(headers)
        .body(delivery.data)
        .build()
}

/// Convert our headers into an AMQP field table
pub(crate) fn to_field_table(headers: &Headers) -> FieldTable {
    let mut table = FieldTable::default();
    for (name, value) in headers {
        let value = match value {
            HeaderValue::String(text) => AMQPValue::LongString(text.as_str().into()),
            HeaderValue::Integer(number) => AMQPValue::LongLongInt(*number),
            HeaderValue::Boolean(flag) => AMQPValue::Boolean(*flag),
            HeaderValue::Float(number) => AMQPValue::Double(*number),
            HeaderValue::Bytes(bytes) => AMQPValue::ByteArray(bytes.clone().into()),
        };
        table.insert(ShortString::from(name.as_str()), value);
    }
    table
}

/// Convert an AMQP field table into our headers
///
/// Nested tables, arrays, decimals and void values have no header
/// representation and are dropped.
pub(crate) fn from_field_table(table: &FieldTable) -> Headers {
    table
        .inner()
        .iter()
        .filter_map(|(name, value)| {
            from_amqp_value(value).map(|value| (name.as_str().to_string(), value))
        })
        .collect()
}

fn from_amqp_value(value: &AMQPValue) -> Option<HeaderValue> {
    let converted = match value {
        AMQPValue::Boolean(flag) => HeaderValue::Boolean(*flag),
        AMQPValue::ShortShortInt(n) => HeaderValue::Integer(i64::from(*n)),
        AMQPValue::ShortShortUInt(n) => HeaderValue::Integer(i64::from(*n)),
        AMQPValue::ShortInt(n) => HeaderValue::Integer(i64::from(*n)),
        AMQPValue::ShortUInt(n) => HeaderValue::Integer(i64::from(*n)),
        AMQPValue::LongInt(n) => HeaderValue::Integer(i64::from(*n)),
        AMQPValue::LongUInt(n) => HeaderValue::Integer(i64::from(*n)),
        AMQPValue::LongLongInt(n) => HeaderValue::Integer(*n),
        AMQPValue::Float(n) => HeaderValue::Float(f64::from(*n)),
        AMQPValue::Double(n) => HeaderValue::Float(*n),
        AMQPValue::ShortString(text) => HeaderValue::String(text.as_str().to_string()),
        AMQPValue::LongString(text) => {
            HeaderValue::String(String::from_utf8_lossy(text.as_bytes()).into_owned())
        }
        AMQPValue::ByteArray(bytes) => HeaderValue::Bytes(bytes.as_slice().to_vec()),
        AMQPValue::Timestamp(ts) => HeaderValue::Integer(i64::try_from(*ts).ok()?),
        _ => return None,
    };
    Some(converted)
}
