// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Tag-filtered projection of decoded record sets into typed metric
//! records.
//!
//! Record sets whose tag is not in the allow-list are dropped at `emit`,
//! before they ever enter the stage's queue. Field type mismatches are an
//! upstream bug: they are logged and the field defaulted, never a panic.

use crate::record::{MetricRecord, RecordSink};
use async_trait::async_trait;
use nmp_core::mailbox::{self, Mailbox};
use nmp_core::sink::RecordSetSink;
use nmp_core::{Entry, RecordSet, ShutdownFlag, Worker};
use rmpv::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::Receiver;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

const QUEUE_CAPACITY: usize = 16;

pub struct Normalizer {
    tags: HashSet<String>,
    mailbox: Mailbox<RecordSet>,
    rx: Mutex<Option<Receiver<RecordSet>>>,
    sink: Arc<dyn RecordSink>,
    tracker: TaskTracker,
    shutdown: ShutdownFlag,
}

impl Normalizer {
    pub fn new(tags: impl IntoIterator<Item = String>, sink: Arc<dyn RecordSink>) -> Self {
        let (mailbox, rx) = mailbox::bounded(QUEUE_CAPACITY);
        Self {
            tags: tags.into_iter().collect(),
            mailbox,
            rx: Mutex::new(Some(rx)),
            sink,
            tracker: TaskTracker::new(),
            shutdown: ShutdownFlag::new(),
        }
    }
}

#[async_trait]
impl RecordSetSink for Normalizer {
    async fn emit(&self, sets: Vec<RecordSet>) {
        for set in sets {
            if self.tags.contains(&set.tag) {
                self.mailbox.send(set).await;
            }
        }
    }
}

#[async_trait]
impl Worker for Normalizer {
    fn name(&self) -> &'static str {
        "normalizer"
    }

    fn start(&self) {
        let Some(mut rx) = self.rx.lock().expect("receiver lock poisoned").take() else {
            return;
        };
        let sink = Arc::clone(&self.sink);
        self.tracker.spawn(async move {
            info!("normalizer started");
            while let Some(set) = rx.recv().await {
                for entry in set.entries {
                    let record = normalize_entry(&set.tag, entry);
                    sink.emit(record).await;
                }
            }
            info!("normalizer ended");
        });
    }

    fn stop(&self) {
        if self.shutdown.begin() {
            self.mailbox.close();
        }
        self.tracker.close();
    }

    async fn join(&self) {
        self.tracker.wait().await;
    }
}

/// Destructure one entry's data mapping into a typed record. Recognized
/// keys are projected; unknown keys are logged and left only in `raw`.
fn normalize_entry(tag: &str, entry: Entry) -> MetricRecord {
    let mut record = MetricRecord {
        tag: tag.to_owned(),
        timestamp: entry.timestamp,
        ..Default::default()
    };
    for (key, value) in &entry.data {
        match key.as_str() {
            "host" => record.host = string_field(key, value),
            "plugin" => record.plugin = string_field(key, value),
            "plugin_instance" => record.plugin_instance = string_field(key, value),
            "type" => record.type_name = string_field(key, value),
            "type_instance" => record.type_instance = string_field(key, value),
            "values" => record.values = number_list(key, value),
            "dsnames" => record.ds_names = string_list(key, value),
            "dstypes" => record.ds_types = string_list(key, value),
            "interval" => {
                record.interval = match value.as_f64() {
                    Some(interval) => interval as u8,
                    None => {
                        warn!(field = key, value = %value, "interval is not a number");
                        0
                    }
                }
            }
            _ => warn!(field = key, value = %value, "unhandled field"),
        }
    }
    record.raw = entry.data;
    record
}

fn string_field(key: &str, value: &Value) -> String {
    match value.as_str() {
        Some(text) => text.to_owned(),
        None => {
            warn!(field = key, value = %value, "field is not a string");
            String::new()
        }
    }
}

fn number_list(key: &str, value: &Value) -> Vec<f64> {
    let Some(items) = value.as_array() else {
        warn!(field = key, value = %value, "field is not an array");
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let number = item.as_f64();
            if number.is_none() {
                warn!(field = key, value = %item, "sample is not a number");
            }
            number
        })
        .collect()
}

fn string_list(key: &str, value: &Value) -> Vec<String> {
    let Some(items) = value.as_array() else {
        warn!(field = key, value = %value, "field is not an array");
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let text = item.as_str().map(str::to_owned);
            if text.is_none() {
                warn!(field = key, value = %item, "element is not a string");
            }
            text
        })
        .collect()
}
