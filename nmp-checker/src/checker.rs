// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Rule evaluation stage.
//!
//! For each record, every rule of the record's plugin is evaluated
//! independently and produces exactly one result (the highest matching
//! severity), unless an evaluation error is logged for that rule-record
//! pair. Threshold resolution order: host override (highest priority among
//! regex matches) over meta override (first match in declaration order)
//! over the rule defaults.

use crate::humanize;
use crate::record::{MetricRecord, RecordSink};
use crate::rule::Rule;
use crate::template::ThresholdExpr;
use async_trait::async_trait;
use nmp_core::mailbox::{self, Mailbox};
use nmp_core::sink::CheckResultSink;
use nmp_core::{CheckCode, CheckKind, CheckResult, NodeLookup, ShutdownFlag, Worker};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::Receiver;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

const QUEUE_CAPACITY: usize = 16;

/// Immutable evaluation state shared with the consumer task.
#[derive(Clone)]
struct Engine {
    rules: Arc<HashMap<String, Vec<Rule>>>,
    nodes: Option<Arc<dyn NodeLookup>>,
}

pub struct Checker {
    engine: Engine,
    mailbox: Mailbox<MetricRecord>,
    rx: Mutex<Option<Receiver<MetricRecord>>>,
    sink: Arc<dyn CheckResultSink>,
    tracker: TaskTracker,
    shutdown: ShutdownFlag,
}

impl Checker {
    pub fn new(
        rules: HashMap<String, Vec<Rule>>,
        nodes: Option<Arc<dyn NodeLookup>>,
        sink: Arc<dyn CheckResultSink>,
    ) -> Self {
        let (mailbox, rx) = mailbox::bounded(QUEUE_CAPACITY);
        Self {
            engine: Engine {
                rules: Arc::new(rules),
                nodes,
            },
            mailbox,
            rx: Mutex::new(Some(rx)),
            sink,
            tracker: TaskTracker::new(),
            shutdown: ShutdownFlag::new(),
        }
    }
}

#[async_trait]
impl RecordSink for Checker {
    async fn emit(&self, record: MetricRecord) {
        self.mailbox.send(record).await;
    }
}

#[async_trait]
impl Worker for Checker {
    fn name(&self) -> &'static str {
        "checker"
    }

    fn start(&self) {
        let Some(mut rx) = self.rx.lock().expect("receiver lock poisoned").take() else {
            return;
        };
        let engine = self.engine.clone();
        let sink = Arc::clone(&self.sink);
        self.tracker.spawn(async move {
            info!("checker started");
            while let Some(record) = rx.recv().await {
                let results = engine.check_record(&record);
                if !results.is_empty() {
                    sink.emit(results).await;
                }
            }
            info!("checker ended");
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

impl Engine {
    fn check_record(&self, record: &MetricRecord) -> Vec<CheckResult> {
        let Some(rules) = self.rules.get(&record.plugin) else {
            return Vec::new();
        };
        let mut results = Vec::new();
        for rule in rules {
            if !rule.plugin_instance.is_empty() && rule.plugin_instance != record.plugin_instance {
                continue;
            }
            if !rule.type_name.is_empty() && rule.type_name != record.type_name {
                continue;
            }
            if !rule.type_instance.is_empty() && rule.type_instance != record.type_instance {
                continue;
            }

            let value = match rule.value.render(record) {
                Ok(value) => value,
                Err(e) => {
                    warn!(rule = %rule.name, host = %record.host, error = %e, "value template failed");
                    continue;
                }
            };

            let (warning, critical, matched) = self.select_thresholds(rule, record);
            debug!(rule = %rule.name, host = %record.host, thresholds = %matched, "evaluating");

            match evaluate(rule, &value, warning, critical) {
                Ok(code) => results.push(CheckResult {
                    hostname: record.host.clone(),
                    kind: CheckKind::Service,
                    service_name: rule.name.clone(),
                    code,
                    output: humanize::apply(rule.humanize, &value),
                }),
                Err(e) => {
                    warn!(rule = %rule.name, host = %record.host, error = %e, "comparison failed");
                }
            }
        }
        results
    }

    /// Resolve the thresholds for one rule-record pair. Meta overrides are
    /// consulted first so that a host override found afterwards supersedes
    /// them; the returned label names the winning source.
    fn select_thresholds<'r>(
        &self,
        rule: &'r Rule,
        record: &MetricRecord,
    ) -> (&'r ThresholdExpr, &'r ThresholdExpr, String) {
        let mut warning = &rule.warning;
        let mut critical = &rule.critical;
        let mut matched = "default".to_owned();

        if !rule.meta_overrides.is_empty() {
            if let Some(node) = self
                .nodes
                .as_ref()
                .and_then(|nodes| nodes.get_node(&record.host))
            {
                for entry in &rule.meta_overrides {
                    if node.meta.get(&entry.key) == Some(&entry.value) {
                        warning = &entry.warning;
                        critical = &entry.critical;
                        matched = format!("meta:{}", entry.pattern);
                        break;
                    }
                }
            }
        }

        let mut priority = 0i64;
        for entry in &rule.host_overrides {
            if entry.regex.is_match(&record.host) && entry.priority >= priority {
                priority = entry.priority;
                warning = &entry.warning;
                critical = &entry.critical;
                matched = format!("host:{}", entry.pattern);
            }
        }

        (warning, critical, matched)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum CompareError {
    Value(String),
    Threshold(String),
}

impl std::fmt::Display for CompareError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompareError::Value(text) => write!(f, "value is not a number: {text:?}"),
            CompareError::Threshold(text) => write!(f, "threshold is not a number: {text:?}"),
        }
    }
}

/// Classify one value against the resolved thresholds. Critical is checked
/// first; its match short-circuits the warning comparison.
fn evaluate(
    rule: &Rule,
    value: &str,
    warning: &ThresholdExpr,
    critical: &ThresholdExpr,
) -> Result<CheckCode, CompareError> {
    if compare(rule, value, &critical.eval())? {
        return Ok(CheckCode::Critical);
    }
    if compare(rule, value, &warning.eval())? {
        return Ok(CheckCode::Warning);
    }
    Ok(CheckCode::Ok)
}

fn compare(rule: &Rule, value: &str, threshold: &str) -> Result<bool, CompareError> {
    let value: f64 = value
        .parse()
        .map_err(|_| CompareError::Value(value.to_owned()))?;
    let threshold: f64 = threshold
        .parse()
        .map_err(|_| CompareError::Threshold(threshold.to_owned()))?;
    Ok(rule.comparator.compare(value, threshold))
}
