//! Configuration management for Missy
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.
//! Precedence, lowest first: built-in defaults, YAML file, environment,
//! command line.

use crate::cli::{Cli, Commands};
use crate::error::{ConfigError, Result};
use crate::messaging::kafka::{
    KafkaClientConfig, SaslConfig, SaslMechanism, SecurityProtocol, SslConfig,
};
use crate::messaging::{Brokers, CommitPolicy, ReaderOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Main configuration structure for Missy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Kafka connection settings
    #[serde(default)]
    pub kafka: KafkaConfig,

    /// Consumption behaviour
    #[serde(default)]
    pub reader: ReaderConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Kafka connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaConfig {
    /// Kafka brokers (comma-separated)
    #[serde(default = "default_brokers")]
    pub brokers: String,

    /// Consumer group ID
    #[serde(default = "default_group_id")]
    pub group_id: String,

    /// Topic to consume from
    #[serde(default)]
    pub topic: String,

    /// Where a group without committed offsets starts (earliest, latest)
    #[serde(default = "default_auto_offset_reset")]
    pub auto_offset_reset: String,

    /// Consumer session timeout in milliseconds
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u64,

    /// Producer delivery timeout in milliseconds
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,

    /// Security configuration
    #[serde(default)]
    pub security: Option<KafkaSecurityConfig>,
}

/// Kafka security configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KafkaSecurityConfig {
    /// Security protocol (PLAINTEXT, SSL, SASL_PLAINTEXT, SASL_SSL)
    #[serde(default)]
    pub protocol: SecurityProtocol,

    /// SASL credentials (prefer env var KAFKA_SASL_PASSWORD for the password)
    #[serde(default)]
    pub sasl: Option<SaslConfig>,

    /// TLS material
    #[serde(default)]
    pub ssl: Option<SslConfig>,
}

/// Consumption behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Retries after the first failed processing attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay between processing attempts in milliseconds
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    /// Offset flush interval in milliseconds, 0 commits every record synchronously
    #[serde(default)]
    pub commit_interval_ms: u64,

    /// Forward records that exhausted their retries to a dead-letter topic
    #[serde(default)]
    pub dlq_enabled: bool,

    /// Dead-letter topic, `<topic>.dlq` when unset
    #[serde(default)]
    pub dlq_topic: Option<String>,

    /// Commit behaviour after a failed dead-letter write
    #[serde(default)]
    pub commit_policy: CommitPolicy,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Enable JSON-formatted logs
    #[serde(default)]
    pub json_format: bool,

    /// Log file path (if None, STDOUT only)
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// Include record keys and values in debug logs
    #[serde(default)]
    pub include_payload: bool,
}

fn default_brokers() -> String {
    "localhost:9092".to_string()
}

fn default_group_id() -> String {
    "missy".to_string()
}

fn default_auto_offset_reset() -> String {
    "earliest".to_string()
}

fn default_session_timeout_ms() -> u64 {
    30_000
}

fn default_write_timeout_ms() -> u64 {
    10_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_interval_ms() -> u64 {
    5_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: default_brokers(),
            group_id: default_group_id(),
            topic: String::new(),
            auto_offset_reset: default_auto_offset_reset(),
            session_timeout_ms: default_session_timeout_ms(),
            write_timeout_ms: default_write_timeout_ms(),
            security: None,
        }
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_interval_ms: default_retry_interval_ms(),
            commit_interval_ms: 0,
            dlq_enabled: false,
            dlq_topic: None,
            commit_policy: CommitPolicy::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            file_path: None,
            include_payload: false,
        }
    }
}

/// Reads an environment variable and parses it, warning about and ignoring
/// values that do not parse.
fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => {
            tracing::debug!(variable = name, "Env override applied");
            Some(value)
        }
        Err(_) => {
            tracing::warn!("Invalid value for {}: {}", name, raw);
            None
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// A missing file is not an error; defaults are used instead.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::Invalid(format!("Failed to read config file: {}", e))
        })?;
        serde_yaml::from_str(&contents)
            .map_err(|e| ConfigError::Invalid(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(brokers) = std::env::var("KAFKA_BROKERS") {
            self.kafka.brokers = brokers;
        }

        if let Ok(group_id) = std::env::var("KAFKA_GROUP_ID") {
            self.kafka.group_id = group_id;
        }

        if let Ok(topic) = std::env::var("KAFKA_TOPIC") {
            self.kafka.topic = topic;
        }

        if let Some(retries) = env_parse("KAFKA_RETRIES_MAX_NUMBER") {
            self.reader.max_retries = retries;
        }

        if let Some(interval) = env_parse("KAFKA_RETRIES_INTERVAL_MS") {
            self.reader.retry_interval_ms = interval;
        }

        if let Some(interval) = env_parse("KAFKA_COMMIT_INTERVAL_MS") {
            self.reader.commit_interval_ms = interval;
        }

        if let Some(enabled) = env_parse("KAFKA_DLQ_ENABLED") {
            self.reader.dlq_enabled = enabled;
        }

        if let Ok(dlq_topic) = std::env::var("KAFKA_DLQ_TOPIC") {
            self.reader.dlq_topic = Some(dlq_topic);
        }

        // Security overrides create the security block on demand.
        if let Some(protocol) = env_parse::<SecurityProtocol>("KAFKA_SECURITY_PROTOCOL") {
            self.kafka.security.get_or_insert_with(Default::default).protocol = protocol;
        }

        let username = std::env::var("KAFKA_SASL_USERNAME").ok();
        let password = std::env::var("KAFKA_SASL_PASSWORD").ok();
        let mechanism = env_parse::<SaslMechanism>("KAFKA_SASL_MECHANISM");
        if username.is_some() || password.is_some() || mechanism.is_some() {
            let security = self.kafka.security.get_or_insert_with(Default::default);
            let sasl = security.sasl.get_or_insert_with(|| SaslConfig {
                mechanism: SaslMechanism::default(),
                username: String::new(),
                password: String::new(),
            });
            if let Some(username) = username {
                sasl.username = username;
            }
            if let Some(password) = password {
                sasl.password = password;
            }
            if let Some(mechanism) = mechanism {
                sasl.mechanism = mechanism;
            }
        }

        if let Ok(ca_location) = std::env::var("KAFKA_SSL_CA_LOCATION") {
            let security = self.kafka.security.get_or_insert_with(Default::default);
            security
                .ssl
                .get_or_insert_with(SslConfig::default)
                .ca_location = Some(ca_location);
        }

        if let Ok(level) = std::env::var("MISSY_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Some(json_logs) = env_parse("MISSY_JSON_LOGS") {
            self.logging.json_format = json_logs;
        }

        if let Ok(log_file) = std::env::var("MISSY_LOG_FILE") {
            self.logging.file_path = Some(PathBuf::from(log_file));
        }

        if let Some(include_payload) = env_parse("MISSY_LOG_PAYLOAD") {
            self.logging.include_payload = include_payload;
        }
    }

    fn apply_cli_overrides(&mut self, cli: &Cli) {
        if cli.verbose {
            self.logging.level = "debug".to_string();
        }

        if let Some(brokers) = &cli.brokers {
            self.kafka.brokers = brokers.clone();
        }

        match &cli.command {
            Commands::Consume {
                topic,
                group,
                dlq,
                dlq_topic,
                max_retries,
                retry_interval_ms,
            } => {
                if let Some(topic) = topic {
                    self.kafka.topic = topic.clone();
                }
                if let Some(group) = group {
                    self.kafka.group_id = group.clone();
                }
                if *dlq || dlq_topic.is_some() {
                    self.reader.dlq_enabled = true;
                }
                if let Some(dlq_topic) = dlq_topic {
                    self.reader.dlq_topic = Some(dlq_topic.clone());
                }
                if let Some(retries) = max_retries {
                    self.reader.max_retries = *retries;
                }
                if let Some(interval) = retry_interval_ms {
                    self.reader.retry_interval_ms = *interval;
                }
            }
            Commands::Produce { topic, .. } => {
                self.kafka.topic = topic.clone();
            }
            Commands::Hash { .. } => {}
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if brokers, topic or group id are missing, if the
    /// dead-letter topic equals the source topic, or if a SASL protocol is
    /// selected without credentials
    pub fn validate(&self) -> Result<()> {
        if Brokers::parse(&self.kafka.brokers).is_err() {
            return Err(ConfigError::MissingConfig("kafka.brokers".to_string()).into());
        }

        if self.kafka.topic.trim().is_empty() {
            return Err(ConfigError::MissingConfig("kafka.topic".to_string()).into());
        }

        if self.kafka.group_id.trim().is_empty() {
            return Err(ConfigError::MissingConfig("kafka.group_id".to_string()).into());
        }

        if let Some(dlq_topic) = self.reader_options().dead_letter_topic(&self.kafka.topic) {
            if dlq_topic == self.kafka.topic {
                return Err(ConfigError::Invalid(format!(
                    "reader.dlq_topic must differ from the source topic '{}'",
                    self.kafka.topic
                ))
                .into());
            }
        }

        if let Some(security) = &self.kafka.security {
            if security.protocol.uses_sasl() {
                match &security.sasl {
                    Some(sasl) if !sasl.username.is_empty() && !sasl.password.is_empty() => {}
                    _ => {
                        return Err(ConfigError::MissingConfig(
                            "kafka.security.sasl username and password".to_string(),
                        )
                        .into())
                    }
                }
            }
        }

        Ok(())
    }

    /// Reader options described by the `reader` and `logging` sections
    pub fn reader_options(&self) -> ReaderOptions {
        ReaderOptions {
            retries: Some(self.reader.max_retries),
            interval: Some(Duration::from_millis(self.reader.retry_interval_ms)),
            commit_interval: Duration::from_millis(self.reader.commit_interval_ms),
            dlq_enabled: self.reader.dlq_enabled,
            dlq_topic: self.reader.dlq_topic.clone(),
            commit_policy: self.reader.commit_policy,
            log_payloads: self.logging.include_payload,
        }
    }

    /// Kafka client settings described by the `kafka` section
    ///
    /// # Errors
    ///
    /// Returns `MessagingError::NoBrokers` if the broker list is empty
    pub fn brokers(&self) -> Result<Brokers> {
        let addresses = Brokers::parse(&self.kafka.brokers)?.addresses().to_vec();
        let mut client = KafkaClientConfig::new(addresses)
            .with_auto_offset_reset(&self.kafka.auto_offset_reset)
            .with_session_timeout(Duration::from_millis(self.kafka.session_timeout_ms))
            .with_write_timeout(Duration::from_millis(self.kafka.write_timeout_ms));

        if let Some(security) = &self.kafka.security {
            client = client.with_security_protocol(security.protocol);
            client.sasl = security.sasl.clone();
            client.ssl = security.ssl.clone();
        }

        Ok(Brokers::from_config(client)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const ENV_VARS: &[&str] = &[
        "KAFKA_BROKERS",
        "KAFKA_GROUP_ID",
        "KAFKA_TOPIC",
        "KAFKA_RETRIES_MAX_NUMBER",
        "KAFKA_RETRIES_INTERVAL_MS",
        "KAFKA_COMMIT_INTERVAL_MS",
        "KAFKA_DLQ_ENABLED",
        "KAFKA_DLQ_TOPIC",
        "KAFKA_SECURITY_PROTOCOL",
        "KAFKA_SASL_MECHANISM",
        "KAFKA_SASL_USERNAME",
        "KAFKA_SASL_PASSWORD",
        "KAFKA_SSL_CA_LOCATION",
        "MISSY_LOG_LEVEL",
        "MISSY_JSON_LOGS",
        "MISSY_LOG_FILE",
        "MISSY_LOG_PAYLOAD",
    ];

    fn clear_env() {
        for name in ENV_VARS {
            std::env::remove_var(name);
        }
    }

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["missy"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.kafka.topic = "orders".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.kafka.brokers, "localhost:9092");
        assert_eq!(config.kafka.group_id, "missy");
        assert!(config.kafka.topic.is_empty());
        assert_eq!(config.reader.max_retries, 3);
        assert_eq!(config.reader.retry_interval_ms, 5000);
        assert_eq!(config.reader.commit_interval_ms, 0);
        assert!(!config.reader.dlq_enabled);
        assert_eq!(config.reader.commit_policy, CommitPolicy::Always);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_validation_success() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_config_validation_missing_topic() {
        let err = Config::default().validate().unwrap_err();
        assert!(err.to_string().contains("kafka.topic"));
    }

    #[test]
    fn test_config_validation_empty_brokers() {
        let mut config = valid_config();
        config.kafka.brokers = " , ".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("kafka.brokers"));
    }

    #[test]
    fn test_config_validation_empty_group() {
        let mut config = valid_config();
        config.kafka.group_id = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_dlq_equals_topic() {
        let mut config = valid_config();
        config.reader.dlq_enabled = true;
        config.reader.dlq_topic = Some("orders".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must differ"));

        config.reader.dlq_topic = None;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_sasl_requires_credentials() {
        let mut config = valid_config();
        config.kafka.security = Some(KafkaSecurityConfig {
            protocol: SecurityProtocol::SaslSsl,
            sasl: None,
            ssl: None,
        });
        assert!(config.validate().is_err());

        config.kafka.security = Some(KafkaSecurityConfig {
            protocol: SecurityProtocol::SaslSsl,
            sasl: Some(SaslConfig {
                mechanism: SaslMechanism::ScramSha256,
                username: "user".to_string(),
                password: "pass".to_string(),
            }),
            ssl: None,
        });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_yaml() {
        let yaml = r#"
kafka:
  brokers: "kafka-1:9092,kafka-2:9092"
  group_id: billing
  topic: orders
  security:
    protocol: SASL_SSL
    sasl:
      mechanism: SCRAM-SHA-512
      username: svc
      password: secret
    ssl:
      ca_location: /etc/ssl/ca.pem
reader:
  max_retries: 0
  retry_interval_ms: 100
  dlq_enabled: true
  commit_policy: require_dead_letter
logging:
  level: debug
  json_format: true
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.kafka.group_id, "billing");
        assert_eq!(config.kafka.session_timeout_ms, 30_000);
        let security = config.kafka.security.as_ref().unwrap();
        assert_eq!(security.protocol, SecurityProtocol::SaslSsl);
        assert_eq!(
            security.sasl.as_ref().unwrap().mechanism,
            SaslMechanism::ScramSha512
        );
        assert_eq!(config.reader.max_retries, 0);
        assert_eq!(config.reader.commit_policy, CommitPolicy::RequireDeadLetter);
        assert!(config.logging.json_format);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_reader_options_honour_zero() {
        let mut config = valid_config();
        config.reader.max_retries = 0;
        config.reader.retry_interval_ms = 0;
        config.reader.dlq_enabled = true;

        let options = config.reader_options();
        let policy = options.retry_policy();
        assert_eq!(policy.max_retries(), 0);
        assert_eq!(policy.interval(), Duration::ZERO);
        assert_eq!(
            options.dead_letter_topic("orders").as_deref(),
            Some("orders.dlq")
        );
    }

    #[test]
    fn test_brokers_carry_security() {
        let mut config = valid_config();
        config.kafka.brokers = "a:9092, b:9092".to_string();
        config.kafka.security = Some(KafkaSecurityConfig {
            protocol: SecurityProtocol::Ssl,
            sasl: None,
            ssl: Some(SslConfig {
                ca_location: Some("/ca.pem".to_string()),
                ..Default::default()
            }),
        });

        let brokers = config.brokers().unwrap();
        assert_eq!(brokers.addresses(), ["a:9092".to_string(), "b:9092".to_string()]);
        assert_eq!(
            brokers.client_config().security_protocol,
            SecurityProtocol::Ssl
        );
        assert!(brokers.client_config().ssl.is_some());
    }

    #[test]
    #[serial]
    fn test_load_nonexistent_file_uses_defaults() {
        clear_env();
        let config = Config::load("nonexistent.yaml", &cli(&["consume"])).unwrap();
        assert_eq!(config.kafka.brokers, "localhost:9092");
        assert_eq!(config.reader.max_retries, 3);
    }

    #[test]
    #[serial]
    fn test_load_from_file() {
        clear_env();
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "kafka:\n  topic: payments\nreader:\n  max_retries: 7").unwrap();

        let config = Config::load(file.path().to_str().unwrap(), &cli(&["consume"])).unwrap();
        assert_eq!(config.kafka.topic, "payments");
        assert_eq!(config.reader.max_retries, 7);
        assert_eq!(config.reader.retry_interval_ms, 5000);
    }

    #[test]
    #[serial]
    fn test_load_invalid_yaml_fails() {
        clear_env();
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "kafka: [unclosed").unwrap();

        let result = Config::load(file.path().to_str().unwrap(), &cli(&["consume"]));
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_apply_env_vars() {
        clear_env();
        std::env::set_var("KAFKA_BROKERS", "env-broker:9092");
        std::env::set_var("KAFKA_TOPIC", "env-topic");
        std::env::set_var("KAFKA_GROUP_ID", "env-group");
        std::env::set_var("KAFKA_RETRIES_MAX_NUMBER", "5");
        std::env::set_var("KAFKA_RETRIES_INTERVAL_MS", "250");
        std::env::set_var("KAFKA_DLQ_ENABLED", "true");
        std::env::set_var("KAFKA_DLQ_TOPIC", "env-topic.failed");
        std::env::set_var("MISSY_JSON_LOGS", "true");

        let mut config = Config::default();
        config.apply_env_vars();
        clear_env();

        assert_eq!(config.kafka.brokers, "env-broker:9092");
        assert_eq!(config.kafka.topic, "env-topic");
        assert_eq!(config.kafka.group_id, "env-group");
        assert_eq!(config.reader.max_retries, 5);
        assert_eq!(config.reader.retry_interval_ms, 250);
        assert!(config.reader.dlq_enabled);
        assert_eq!(config.reader.dlq_topic.as_deref(), Some("env-topic.failed"));
        assert!(config.logging.json_format);
    }

    #[test]
    #[serial]
    fn test_apply_env_vars_ignores_invalid_values() {
        clear_env();
        std::env::set_var("KAFKA_RETRIES_MAX_NUMBER", "many");
        std::env::set_var("KAFKA_DLQ_ENABLED", "sometimes");
        std::env::set_var("KAFKA_SECURITY_PROTOCOL", "TLS");

        let mut config = Config::default();
        config.apply_env_vars();
        clear_env();

        assert_eq!(config.reader.max_retries, 3);
        assert!(!config.reader.dlq_enabled);
        assert!(config.kafka.security.is_none());
    }

    #[test]
    #[serial]
    fn test_apply_env_vars_security() {
        clear_env();
        std::env::set_var("KAFKA_SECURITY_PROTOCOL", "SASL_SSL");
        std::env::set_var("KAFKA_SASL_MECHANISM", "SCRAM-SHA-512");
        std::env::set_var("KAFKA_SASL_USERNAME", "user");
        std::env::set_var("KAFKA_SASL_PASSWORD", "pass");
        std::env::set_var("KAFKA_SSL_CA_LOCATION", "/etc/ca.pem");

        let mut config = Config::default();
        config.apply_env_vars();
        clear_env();

        let security = config.kafka.security.unwrap();
        assert_eq!(security.protocol, SecurityProtocol::SaslSsl);
        let sasl = security.sasl.unwrap();
        assert_eq!(sasl.mechanism, SaslMechanism::ScramSha512);
        assert_eq!(sasl.username, "user");
        assert_eq!(sasl.password, "pass");
        assert_eq!(
            security.ssl.unwrap().ca_location.as_deref(),
            Some("/etc/ca.pem")
        );
    }

    #[test]
    #[serial]
    fn test_cli_overrides_env() {
        clear_env();
        std::env::set_var("KAFKA_TOPIC", "env-topic");
        std::env::set_var("KAFKA_RETRIES_MAX_NUMBER", "5");

        let config = Config::load(
            "nonexistent.yaml",
            &cli(&[
                "--brokers",
                "cli:9092",
                "-v",
                "consume",
                "--topic",
                "cli-topic",
                "--dlq-topic",
                "cli-topic.dead",
                "--max-retries",
                "1",
            ]),
        )
        .unwrap();
        clear_env();

        assert_eq!(config.kafka.brokers, "cli:9092");
        assert_eq!(config.kafka.topic, "cli-topic");
        assert_eq!(config.reader.max_retries, 1);
        assert!(config.reader.dlq_enabled);
        assert_eq!(config.reader.dlq_topic.as_deref(), Some("cli-topic.dead"));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    #[serial]
    fn test_produce_sets_topic() {
        clear_env();
        let config = Config::load(
            "nonexistent.yaml",
            &cli(&["produce", "--topic", "orders", "--value", "v"]),
        )
        .unwrap();
        assert_eq!(config.kafka.topic, "orders");
    }
}
