// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Thread-safe expiring map of host metadata.

use nmp_core::{NodeLookup, NodeMeta};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct CacheEntry {
    node: NodeMeta,
    expires_at: Instant,
}

pub struct NodeCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl NodeCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Store a node under its lookup key, resetting its expiration.
    pub fn insert(&self, key: String, node: NodeMeta) {
        let entry = CacheEntry {
            node,
            expires_at: Instant::now() + self.ttl,
        };
        self.entries
            .lock()
            .expect("cache lock poisoned")
            .insert(key, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NodeLookup for NodeCache {
    fn get_node(&self, host: &str) -> Option<NodeMeta> {
        let entries = self.entries.lock().expect("cache lock poisoned");
        entries
            .get(host)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.node.clone())
    }
}
