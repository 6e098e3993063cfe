//! Kafka cluster handle creating readers and writers.

use std::sync::Arc;
use tracing::info;

use super::error::{MessagingError, Result};
use super::kafka::{KafkaClientConfig, KafkaLogReader, KafkaLogWriter};
use super::reader::{Reader, ReaderOptions};
use super::writer::Writer;

/// A set of bootstrap brokers plus the client settings used to reach them.
///
/// # Example
///
/// ```rust
/// use missy::messaging::Brokers;
///
/// let brokers = Brokers::parse("kafka-1:9092, kafka-2:9092").unwrap();
/// assert_eq!(brokers.addresses(), ["kafka-1:9092", "kafka-2:9092"]);
/// assert!(Brokers::parse(" , ").is_err());
/// ```
#[derive(Debug, Clone)]
pub struct Brokers {
    client: KafkaClientConfig,
}

impl Brokers {
    /// Parses a comma separated list of `host:port` addresses.
    ///
    /// # Errors
    ///
    /// Returns `MessagingError::NoBrokers` if the list holds no address.
    pub fn parse(value: &str) -> Result<Self> {
        let addresses = value
            .split(',')
            .map(str::trim)
            .filter(|address| !address.is_empty())
            .map(str::to_string)
            .collect();
        Self::from_config(KafkaClientConfig::new(addresses)).map_err(|_| {
            MessagingError::NoBrokers(value.to_string())
        })
    }

    /// Uses fully specified client settings, including security.
    pub fn from_config(client: KafkaClientConfig) -> Result<Self> {
        if client.brokers.is_empty() {
            return Err(MessagingError::NoBrokers(String::new()));
        }
        Ok(Self { client })
    }

    /// Bootstrap broker addresses.
    pub fn addresses(&self) -> &[String] {
        &self.client.brokers
    }

    /// Client settings used for every connection.
    pub fn client_config(&self) -> &KafkaClientConfig {
        &self.client
    }

    /// Creates a writer producing to `topic`.
    pub fn new_writer(&self, topic: &str) -> Result<Writer> {
        let log = KafkaLogWriter::connect(&self.client, topic)?;
        Ok(Writer::new(self.client.brokers.clone(), topic, Arc::new(log)))
    }

    /// Creates a reader of `topic` for consumer group `group_id`.
    ///
    /// When dead-lettering is enabled in `options` a writer for the
    /// dead-letter topic is created as well.
    pub fn new_reader(&self, group_id: &str, topic: &str, options: &ReaderOptions) -> Result<Reader> {
        let log = KafkaLogReader::connect(&self.client, topic, group_id, options.commit_interval)?;
        let mut reader = Reader::new(topic, group_id, Arc::new(log), options)
            .with_brokers(self.client.brokers.clone());

        if let Some(dlq_topic) = options.dead_letter_topic(topic) {
            info!(topic, dead_letter_topic = %dlq_topic, "Dead-letter forwarding enabled");
            reader = reader.with_dead_letter(self.new_writer(&dlq_topic)?);
        }
        Ok(reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_parse_single_broker() {
        let brokers = Brokers::parse("localhost:9092").unwrap();
        assert_eq!(brokers.addresses(), ["localhost:9092".to_string()]);
    }

    #[test]
    fn test_parse_trims_and_skips_blanks() {
        let brokers = Brokers::parse(" a:9092 ,, b:9092 ").unwrap();
        assert_eq!(
            brokers.addresses(),
            ["a:9092".to_string(), "b:9092".to_string()]
        );
    }

    #[test]
    fn test_parse_empty_input_fails() {
        let err = Brokers::parse("").unwrap_err();
        assert_eq!(err, MessagingError::NoBrokers(String::new()));
        assert_eq!(err.to_string(), "no brokers provided, value=''");

        assert!(matches!(
            Brokers::parse(" , "),
            Err(MessagingError::NoBrokers(v)) if v == " , "
        ));
    }

    #[test]
    fn test_from_config_keeps_security() {
        let config = KafkaClientConfig::new(vec!["kafka:9093".to_string()])
            .with_sasl_scram_sha256("user", "pass");
        let brokers = Brokers::from_config(config.clone()).unwrap();
        assert_eq!(brokers.client_config(), &config);

        assert!(Brokers::from_config(KafkaClientConfig::new(Vec::new())).is_err());
    }

    #[tokio::test]
    async fn test_new_reader_attaches_dead_letter_writer() {
        // Client creation is local; no broker has to be reachable.
        let brokers = Brokers::parse("localhost:9092").unwrap();
        let options = ReaderOptions::default()
            .with_retries(1)
            .with_interval(Duration::ZERO)
            .with_dead_letter(None);

        let reader = brokers.new_reader("billing", "orders", &options).unwrap();

        assert_eq!(reader.topic(), "orders");
        assert_eq!(reader.group_id(), "billing");
        assert_eq!(reader.brokers(), ["localhost:9092".to_string()]);
        assert_eq!(reader.dead_letter_topic(), Some("orders.dlq"));
        assert_eq!(reader.retry_policy().max_retries(), 1);
    }

    #[tokio::test]
    async fn test_new_writer_topic() {
        let brokers = Brokers::parse("localhost:9092").unwrap();
        let writer = brokers.new_writer("orders").unwrap();
        assert_eq!(writer.topic(), "orders");
        assert_eq!(writer.brokers(), ["localhost:9092".to_string()]);
    }
}
