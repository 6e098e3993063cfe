//! Broker record type shared by every pipeline component.
//!
//! A [`Message`] is created by a broker log when a record is fetched and is
//! then passed by value through the pipeline without ever being mutated.
//! Key and value are opaque byte sequences held in [`Bytes`], so cloning a
//! message for a retry attempt does not copy the payload.
//!
//! # Example
//!
//! ```rust
//! use missy::messaging::Message;
//!
//! let message = Message::new("orders", "order-1", r#"{"qty":2}"#).with_position(0, 12);
//! let id = message.sha256_string();
//! assert_eq!(id.len(), 64);
//! assert_eq!(id, message.clone().sha256_string());
//! ```

use bytes::Bytes;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// A single record of a partitioned log.
///
/// `(topic, partition, offset)` identifies the record within the broker's
/// retention window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Topic the record belongs to.
    pub topic: String,

    /// Record key.
    pub key: Bytes,

    /// Record value.
    pub value: Bytes,

    /// Record timestamp as reported by the broker.
    pub timestamp: DateTime<Utc>,

    /// Partition the record was read from.
    pub partition: i32,

    /// Partition-local position of the record.
    pub offset: i64,
}

impl Message {
    /// Creates a message at partition 0, offset 0, stamped with the Unix epoch.
    pub fn new(topic: impl Into<String>, key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            key: key.into(),
            value: value.into(),
            timestamp: DateTime::<Utc>::default(),
            partition: 0,
            offset: 0,
        }
    }

    /// Sets the partition and offset of the message.
    pub fn with_position(mut self, partition: i32, offset: i64) -> Self {
        self.partition = partition;
        self.offset = offset;
        self
    }

    /// Sets the timestamp of the message.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Feeds the canonical encoding of every field through `digest` and
    /// returns the resulting hash.
    ///
    /// Variable-length fields are length-prefixed so that moving bytes from
    /// one field into a neighbouring one always changes the encoding. The
    /// pipeline never calls this itself; it exists for callers that need an
    /// idempotency or deduplication key.
    ///
    /// # Example
    ///
    /// ```rust
    /// use missy::messaging::Message;
    /// use sha2::{Digest, Sha512};
    ///
    /// let message = Message::new("orders", "k", "v");
    /// assert_eq!(message.hash(Sha512::new()).len(), 64);
    /// ```
    pub fn hash<D: Digest>(&self, mut digest: D) -> Vec<u8> {
        digest.update(self.canonical_bytes());
        digest.finalize().to_vec()
    }

    /// Lowercase hex encoding of [`Message::hash`].
    pub fn hash_string<D: Digest>(&self, digest: D) -> String {
        hex::encode(self.hash(digest))
    }

    /// SHA-256 hash of the message.
    pub fn sha256(&self) -> Vec<u8> {
        self.hash(Sha256::new())
    }

    /// Hex encoded SHA-256 hash of the message.
    pub fn sha256_string(&self) -> String {
        self.hash_string(Sha256::new())
    }

    fn canonical_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            self.topic.len() + self.key.len() + self.value.len() + 3 * 8 + 8 + 4 + 4 + 8,
        );
        put_field(&mut buf, self.topic.as_bytes());
        put_field(&mut buf, &self.key);
        put_field(&mut buf, &self.value);
        buf.extend_from_slice(&self.timestamp.timestamp().to_be_bytes());
        buf.extend_from_slice(&self.timestamp.timestamp_subsec_nanos().to_be_bytes());
        buf.extend_from_slice(&self.partition.to_be_bytes());
        buf.extend_from_slice(&self.offset.to_be_bytes());
        buf
    }
}

fn put_field(buf: &mut Vec<u8>, field: &[u8]) {
    buf.extend_from_slice(&(field.len() as u64).to_be_bytes());
    buf.extend_from_slice(field);
}
