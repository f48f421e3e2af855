//! Metrics collection for the forwarder.
//!
//! Counters and gauges are plain atomics so they can be read from any
//! context while the forwarder task updates them.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicU64,
}

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Aggregate counters for one forwarder instance.
#[derive(Debug, Default)]
pub struct ForwarderMetrics {
    // Packet processing
    pub interests_received: Counter,
    pub interests_forwarded: Counter,
    pub interests_aggregated: Counter,
    pub data_received: Counter,
    pub data_sent: Counter,
    pub timeouts_sent: Counter,

    // Content store
    pub cs_hits: Counter,
    pub cs_misses: Counter,
    pub cs_inserts: Counter,
    pub cs_evictions: Counter,
    pub cs_size: Gauge,

    // PIT
    pub pit_inserts: Counter,
    pub pit_matches: Counter,
    pub pit_expirations: Counter,
    pub pit_size: Gauge,
}

impl ForwarderMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}
