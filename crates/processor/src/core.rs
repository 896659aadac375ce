//! Core event types and traits
//!
//! - InboundEvent: one event as delivered by the source collaborator
//! - KeyPolicy: maps optional event keys onto aggregation keys
//! - Clock: source of "now" for arrival timestamps and periodic ticks

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Default aggregation key for events that carry no key
pub const DEFAULT_NO_KEY_SENTINEL: &str = "NO_KEY";

/// Where an inbound event came from (the transport's raw delivery handle)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventOrigin {
    /// Topic name
    pub topic: String,
    /// Partition
    pub partition: i32,
    /// Offset
    pub offset: i64,
}

impl fmt::Display for EventOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.topic, self.partition, self.offset)
    }
}

/// An event handed to the aggregator
///
/// Only `key` and `timestamp` are inspected; `value` is carried opaquely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// Event key, if the producer set one
    pub key: Option<String>,
    /// Opaque payload bytes
    pub value: Vec<u8>,
    /// Event time in epoch milliseconds, if the transport provided one
    pub timestamp: Option<i64>,
    /// Raw delivery handle
    pub origin: Option<EventOrigin>,
}

impl InboundEvent {
    /// Create an event with no key, no timestamp and the given payload
    pub fn new(value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: None,
            value: value.into(),
            timestamp: None,
            origin: None,
        }
    }

    /// Set event key
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set event timestamp (epoch milliseconds)
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Set delivery origin
    pub fn with_origin(mut self, origin: EventOrigin) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Decode transport key bytes into a key string
    ///
    /// Invalid UTF-8 is replaced rather than rejected so a single malformed
    /// key never stops consumption. Returns the key and whether it was lossy.
    pub fn decode_key(bytes: &[u8]) -> (String, bool) {
        match std::str::from_utf8(bytes) {
            Ok(s) => (s.to_string(), false),
            Err(_) => (String::from_utf8_lossy(bytes).into_owned(), true),
        }
    }
}

/// Maps optional event keys to aggregation keys
///
/// A missing key and an empty key both count under the sentinel. A producer
/// key that equals the sentinel lands in the same bucket, so the sentinel
/// should be chosen outside the real key space when the two must be told
/// apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPolicy {
    sentinel: String,
}

impl KeyPolicy {
    /// Create a key policy with a custom sentinel
    pub fn new(sentinel: impl Into<String>) -> Self {
        Self {
            sentinel: sentinel.into(),
        }
    }

    /// The sentinel used for keyless events
    pub fn sentinel(&self) -> &str {
        &self.sentinel
    }

    /// Aggregation key for an event key
    pub fn resolve<'a>(&'a self, key: Option<&'a str>) -> &'a str {
        match key {
            Some(k) if !k.is_empty() => k,
            _ => &self.sentinel,
        }
    }
}

impl Default for KeyPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_NO_KEY_SENTINEL)
    }
}

/// Source of the current time in epoch milliseconds
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current time in epoch milliseconds
    fn now_millis(&self) -> i64;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Manually driven clock for tests and replays
///
/// Clones share the same underlying time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    /// Create a clock reading `start_millis`
    pub fn new(start_millis: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start_millis)),
        }
    }

    /// Set the current time
    pub fn set(&self, millis: i64) {
        self.now.store(millis, Ordering::SeqCst);
    }

    /// Move the current time forward
    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
