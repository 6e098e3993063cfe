//! Kafka implementation of the broker log ports, built on `rdkafka`.
//!
//! [`KafkaClientConfig`] carries the connection settings shared by consumers
//! and producers (brokers, security protocol, SASL credentials and TLS
//! material) and renders them as librdkafka properties. [`KafkaLogReader`]
//! wraps a subscribed [`StreamConsumer`] and [`KafkaLogWriter`] a
//! [`FutureProducer`].
//!
//! # Example
//!
//! ```rust,no_run
//! use missy::messaging::kafka::{KafkaClientConfig, KafkaLogReader};
//! use std::time::Duration;
//!
//! let config = KafkaClientConfig::new(vec!["kafka.example.com:9093".to_string()])
//!     .with_sasl_scram_sha256("username", "password")
//!     .with_ssl("/etc/ssl/ca.pem");
//! let reader = KafkaLogReader::connect(&config, "orders", "billing", Duration::ZERO)?;
//! # Ok::<(), missy::messaging::MessagingError>(())
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message as _;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use rdkafka::{Offset, TopicPartitionList};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::broker::{LogReader, LogWriter};
use super::error::{MessagingError, Result};
use super::message::Message;
use crate::error::ConfigError;

/// Security protocol for broker connections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityProtocol {
    /// No encryption or authentication.
    #[default]
    Plaintext,
    /// TLS without SASL.
    Ssl,
    /// SASL without TLS.
    SaslPlaintext,
    /// SASL over TLS.
    SaslSsl,
}

impl SecurityProtocol {
    /// librdkafka name of the protocol.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plaintext => "PLAINTEXT",
            Self::Ssl => "SSL",
            Self::SaslPlaintext => "SASL_PLAINTEXT",
            Self::SaslSsl => "SASL_SSL",
        }
    }

    /// Whether the protocol authenticates with SASL.
    pub fn uses_sasl(&self) -> bool {
        matches!(self, Self::SaslPlaintext | Self::SaslSsl)
    }
}

impl FromStr for SecurityProtocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PLAINTEXT" => Ok(Self::Plaintext),
            "SSL" => Ok(Self::Ssl),
            "SASL_PLAINTEXT" => Ok(Self::SaslPlaintext),
            "SASL_SSL" => Ok(Self::SaslSsl),
            _ => Err(ConfigError::InvalidSecurityProtocol(s.to_string())),
        }
    }
}

/// SASL authentication mechanism.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaslMechanism {
    #[serde(rename = "PLAIN")]
    Plain,
    #[default]
    #[serde(rename = "SCRAM-SHA-256")]
    ScramSha256,
    #[serde(rename = "SCRAM-SHA-512")]
    ScramSha512,
}

impl SaslMechanism {
    /// librdkafka name of the mechanism.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::ScramSha256 => "SCRAM-SHA-256",
            Self::ScramSha512 => "SCRAM-SHA-512",
        }
    }
}

impl FromStr for SaslMechanism {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PLAIN" => Ok(Self::Plain),
            "SCRAM-SHA-256" => Ok(Self::ScramSha256),
            "SCRAM-SHA-512" => Ok(Self::ScramSha512),
            _ => Err(ConfigError::InvalidSaslMechanism(s.to_string())),
        }
    }
}

/// SASL credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaslConfig {
    #[serde(default)]
    pub mechanism: SaslMechanism,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for SaslConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaslConfig")
            .field("mechanism", &self.mechanism)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// TLS material locations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SslConfig {
    /// CA certificate file.
    #[serde(default)]
    pub ca_location: Option<String>,
    /// Client certificate file, for mutual TLS.
    #[serde(default)]
    pub certificate_location: Option<String>,
    /// Client key file, for mutual TLS.
    #[serde(default)]
    pub key_location: Option<String>,
}

/// Connection settings shared by Kafka readers and writers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaClientConfig {
    /// Bootstrap broker addresses.
    pub brokers: Vec<String>,
    /// Client id reported to the brokers.
    pub client_id: String,
    pub security_protocol: SecurityProtocol,
    pub sasl: Option<SaslConfig>,
    pub ssl: Option<SslConfig>,
    /// Where a group without committed offsets starts ("earliest" or "latest").
    pub auto_offset_reset: String,
    pub session_timeout: Duration,
    /// Upper bound for the delivery of one produced record.
    pub write_timeout: Duration,
}

impl KafkaClientConfig {
    /// Plaintext settings for `brokers`.
    pub fn new(brokers: Vec<String>) -> Self {
        Self {
            brokers,
            client_id: "missy".to_string(),
            security_protocol: SecurityProtocol::default(),
            sasl: None,
            ssl: None,
            auto_offset_reset: "earliest".to_string(),
            session_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_client_id(mut self, client_id: &str) -> Self {
        self.client_id = client_id.to_string();
        self
    }

    pub fn with_security_protocol(mut self, protocol: SecurityProtocol) -> Self {
        self.security_protocol = protocol;
        self
    }

    /// Authenticates with SASL/SCRAM-SHA-256 over TLS.
    pub fn with_sasl_scram_sha256(self, username: &str, password: &str) -> Self {
        self.with_sasl(SaslMechanism::ScramSha256, username, password)
    }

    /// Authenticates with SASL/SCRAM-SHA-512 over TLS.
    pub fn with_sasl_scram_sha512(self, username: &str, password: &str) -> Self {
        self.with_sasl(SaslMechanism::ScramSha512, username, password)
    }

    /// Authenticates with `mechanism`. Switches the protocol to `SASL_SSL`
    /// unless a SASL protocol was already selected.
    pub fn with_sasl(mut self, mechanism: SaslMechanism, username: &str, password: &str) -> Self {
        if !self.security_protocol.uses_sasl() {
            self.security_protocol = SecurityProtocol::SaslSsl;
        }
        self.sasl = Some(SaslConfig {
            mechanism,
            username: username.to_string(),
            password: password.to_string(),
        });
        self
    }

    /// Trusts the CA certificate at `ca_location`.
    pub fn with_ssl(mut self, ca_location: &str) -> Self {
        let ssl = self.ssl.get_or_insert_with(SslConfig::default);
        ssl.ca_location = Some(ca_location.to_string());
        self
    }

    pub fn with_auto_offset_reset(mut self, policy: &str) -> Self {
        self.auto_offset_reset = policy.to_string();
        self
    }

    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Properties common to consumers and producers.
    pub fn common_settings(&self) -> Vec<(String, String)> {
        let mut settings = vec![
            ("bootstrap.servers".to_string(), self.brokers.join(",")),
            ("client.id".to_string(), self.client_id.clone()),
            (
                "security.protocol".to_string(),
                self.security_protocol.as_str().to_string(),
            ),
        ];

        if let Some(sasl) = &self.sasl {
            settings.push((
                "sasl.mechanism".to_string(),
                sasl.mechanism.as_str().to_string(),
            ));
            settings.push(("sasl.username".to_string(), sasl.username.clone()));
            settings.push(("sasl.password".to_string(), sasl.password.clone()));
        }

        if let Some(ssl) = &self.ssl {
            if let Some(ca) = &ssl.ca_location {
                settings.push(("ssl.ca.location".to_string(), ca.clone()));
            }
            if let Some(cert) = &ssl.certificate_location {
                settings.push(("ssl.certificate.location".to_string(), cert.clone()));
            }
            if let Some(key) = &ssl.key_location {
                settings.push(("ssl.key.location".to_string(), key.clone()));
            }
        }

        settings
    }

    /// Consumer properties for `group_id`.
    ///
    /// A zero `commit_interval` disables auto commit; the reader then commits
    /// every record synchronously. Otherwise the reader only stores offsets
    /// and the client flushes them every `commit_interval`.
    pub fn consumer_settings(
        &self,
        group_id: &str,
        commit_interval: Duration,
    ) -> Vec<(String, String)> {
        let mut settings = self.common_settings();
        settings.push(("group.id".to_string(), group_id.to_string()));
        settings.push((
            "auto.offset.reset".to_string(),
            self.auto_offset_reset.clone(),
        ));
        settings.push((
            "session.timeout.ms".to_string(),
            self.session_timeout.as_millis().to_string(),
        ));
        if commit_interval.is_zero() {
            settings.push(("enable.auto.commit".to_string(), "false".to_string()));
        } else {
            settings.push(("enable.auto.commit".to_string(), "true".to_string()));
            settings.push((
                "auto.commit.interval.ms".to_string(),
                commit_interval.as_millis().to_string(),
            ));
            settings.push(("enable.auto.offset.store".to_string(), "false".to_string()));
        }
        settings
    }

    /// Producer properties.
    pub fn producer_settings(&self) -> Vec<(String, String)> {
        let mut settings = self.common_settings();
        settings.push((
            "message.timeout.ms".to_string(),
            self.write_timeout.as_millis().to_string(),
        ));
        settings
    }
}

fn client_config(settings: &[(String, String)]) -> ClientConfig {
    let mut config = ClientConfig::new();
    for (key, value) in settings {
        config.set(key.as_str(), value.as_str());
    }
    config
}

/// Highest committed-to-be offset per topic partition. The stored position
/// is the offset of the next record to read.
fn commit_positions(messages: &[Message]) -> BTreeMap<(String, i32), i64> {
    let mut positions: BTreeMap<(String, i32), i64> = BTreeMap::new();
    for message in messages {
        let next = message.offset + 1;
        positions
            .entry((message.topic.clone(), message.partition))
            .and_modify(|position| *position = (*position).max(next))
            .or_insert(next);
    }
    positions
}

fn timestamp_from_millis(millis: Option<i64>) -> DateTime<Utc> {
    millis
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_default()
}

/// Consumer bound to one topic and consumer group.
pub struct KafkaLogReader {
    consumer: Arc<StreamConsumer>,
    topic: String,
    group_id: String,
    store_only: bool,
}

impl KafkaLogReader {
    /// Creates a consumer and subscribes it to `topic`.
    pub fn connect(
        config: &KafkaClientConfig,
        topic: &str,
        group_id: &str,
        commit_interval: Duration,
    ) -> Result<Self> {
        info!(
            brokers = %config.brokers.join(","),
            topic,
            group_id,
            security_protocol = %config.security_protocol.as_str(),
            "Creating Kafka consumer"
        );

        let consumer: StreamConsumer = client_config(
            &config.consumer_settings(group_id, commit_interval),
        )
        .create()
        .map_err(|e| MessagingError::Kafka(e.to_string()))?;
        consumer
            .subscribe(&[topic])
            .map_err(|e| MessagingError::Kafka(e.to_string()))?;

        Ok(Self {
            consumer: Arc::new(consumer),
            topic: topic.to_string(),
            group_id: group_id.to_string(),
            store_only: !commit_interval.is_zero(),
        })
    }

    fn partition_list(messages: &[Message]) -> Result<TopicPartitionList> {
        let mut list = TopicPartitionList::new();
        for ((topic, partition), offset) in commit_positions(messages) {
            list.add_partition_offset(&topic, partition, Offset::Offset(offset))
                .map_err(|e| MessagingError::Commit(e.to_string()))?;
        }
        Ok(list)
    }
}

impl std::fmt::Debug for KafkaLogReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaLogReader")
            .field("topic", &self.topic)
            .field("group_id", &self.group_id)
            .field("store_only", &self.store_only)
            .finish()
    }
}

#[async_trait]
impl LogReader for KafkaLogReader {
    async fn fetch_next(&self) -> Result<Message> {
        let record = self
            .consumer
            .recv()
            .await
            .map_err(|e| MessagingError::Fetch(e.to_string()))?;

        Ok(Message {
            topic: record.topic().to_string(),
            key: record.key().map(Bytes::copy_from_slice).unwrap_or_default(),
            value: record
                .payload()
                .map(Bytes::copy_from_slice)
                .unwrap_or_default(),
            timestamp: timestamp_from_millis(record.timestamp().to_millis()),
            partition: record.partition(),
            offset: record.offset(),
        })
    }

    async fn commit(&self, messages: &[Message]) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }
        let list = Self::partition_list(messages)?;

        if self.store_only {
            return self
                .consumer
                .store_offsets(&list)
                .map_err(|e| MessagingError::Commit(e.to_string()));
        }

        let consumer = Arc::clone(&self.consumer);
        tokio::task::spawn_blocking(move || consumer.commit(&list, CommitMode::Sync))
            .await
            .map_err(|e| MessagingError::Commit(e.to_string()))?
            .map_err(|e| MessagingError::Commit(e.to_string()))
    }

    async fn close(&self) -> Result<()> {
        debug!(topic = %self.topic, group_id = %self.group_id, "Unsubscribing Kafka consumer");
        self.consumer.unsubscribe();
        Ok(())
    }
}

/// Producer bound to one topic.
pub struct KafkaLogWriter {
    producer: FutureProducer,
    topic: String,
    timeout: Duration,
}

impl KafkaLogWriter {
    /// Creates a producer for `topic`.
    pub fn connect(config: &KafkaClientConfig, topic: &str) -> Result<Self> {
        info!(
            brokers = %config.brokers.join(","),
            topic,
            security_protocol = %config.security_protocol.as_str(),
            "Creating Kafka producer"
        );

        let producer: FutureProducer = client_config(&config.producer_settings())
            .create()
            .map_err(|e| MessagingError::Kafka(e.to_string()))?;

        Ok(Self {
            producer,
            topic: topic.to_string(),
            timeout: config.write_timeout,
        })
    }
}

impl std::fmt::Debug for KafkaLogWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaLogWriter")
            .field("topic", &self.topic)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[async_trait]
impl LogWriter for KafkaLogWriter {
    async fn write(&self, key: Bytes, value: Bytes, timestamp: DateTime<Utc>) -> Result<()> {
        let record = FutureRecord::<[u8], [u8]>::to(&self.topic)
            .key(&key[..])
            .payload(&value[..])
            .timestamp(timestamp.timestamp_millis());

        let (partition, offset) = self
            .producer
            .send(record, Timeout::After(self.timeout))
            .await
            .map_err(|(e, _)| MessagingError::Write(e.to_string()))?;

        debug!(topic = %self.topic, partition, offset, "Record delivered");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let producer = self.producer.clone();
        let timeout = self.timeout;
        tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout)))
            .await
            .map_err(|e| MessagingError::Kafka(e.to_string()))?
            .map_err(|e| MessagingError::Kafka(e.to_string()))
    }
}
