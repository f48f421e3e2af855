//! Content Store: a bounded cache of previously seen Data packets.
//!
//! Lookup walks newest-first and returns the first cached Data whose name
//! the Interest name equals or is a proper prefix of. Capacity is a
//! configuration knob; the oldest entries are evicted beyond it.

use crate::Result;
use bytes::Bytes;
use log::debug;
use rust_ndnfwd_core::data::DataPacket;
use rust_ndnfwd_core::name;
use std::collections::VecDeque;

/// Default cache capacity, in entries.
pub const DEFAULT_CS_CAPACITY: usize = 4096;

struct CsEntry {
    data: DataPacket,
    name: Bytes,
}

pub struct ContentStore {
    entries: VecDeque<CsEntry>,
    capacity: usize,
}

impl ContentStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Caches a Data packet, newest first. Returns the number of entries
    /// evicted to stay within capacity.
    pub fn insert(&mut self, data: DataPacket) -> Result<usize> {
        let name = data.name()?;
        self.entries.push_front(CsEntry { data, name });
        let mut evicted = 0;
        while self.entries.len() > self.capacity {
            self.entries.pop_back();
            evicted += 1;
        }
        if evicted > 0 {
            debug!("cs: evicted {} entries (capacity {})", evicted, self.capacity);
        }
        Ok(evicted)
    }

    /// Finds the newest cached Data whose name is equal to or a descendant
    /// of `interest_name` (an encoded Name TLV block). The hit is returned
    /// as a fresh clone.
    pub fn lookup(&self, interest_name: &[u8]) -> Option<DataPacket> {
        for entry in &self.entries {
            if let Ok(rel) = name::compare_encoded(interest_name, &entry.name) {
                if rel.is_prefix_match() {
                    return Some(entry.data.clone());
                }
            }
        }
        None
    }
}

impl Default for ContentStore {
    fn default() -> Self {
        Self::new(DEFAULT_CS_CAPACITY)
    }
}
