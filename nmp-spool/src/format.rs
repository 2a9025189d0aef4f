// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Renders check results into the monitor's spool text format.

use async_trait::async_trait;
use chrono::Local;
use nmp_core::mailbox::{self, Mailbox};
use nmp_core::sink::{CheckResultSink, SpoolSink};
use nmp_core::{CheckKind, CheckResult, ShutdownFlag, Worker};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::Receiver;
use tokio_util::task::TaskTracker;
use tracing::info;

const QUEUE_CAPACITY: usize = 16;

/// `finish_time` is the render-time unix timestamp; the `# Time:` line is
/// the same instant in the monitor's date format.
pub fn render(result: &CheckResult) -> String {
    let now = Local::now();
    render_at(
        result,
        now.timestamp(),
        &now.format("%a %b %d %H:%M:%S %z %Y").to_string(),
    )
}

fn render_at(result: &CheckResult, finish_time: i64, date: &str) -> String {
    let mut text = String::with_capacity(256);
    text.push_str("### NMP Check ###\n");
    text.push_str("latency=0\n");
    text.push_str(&format!("start_time={finish_time}.0\n"));
    text.push_str(&format!("finish_time={finish_time}.0\n"));
    text.push_str(&format!("# Time: {date}\n"));
    text.push_str(&format!("host_name={}\n", result.hostname));
    if result.kind == CheckKind::Service {
        text.push_str(&format!("service_description={}\n", result.service_name));
    }
    text.push_str("check_type=1\n");
    text.push_str("early_timeout=1\n");
    text.push_str("exited_ok=1\n");
    text.push_str(&format!("return_code={}\n", result.code));
    text.push_str(&format!("output={}\n", result.output));
    text
}

/// Pipeline stage consuming check-result batches and forwarding each
/// rendered text to the spool writer.
pub struct Formatter {
    mailbox: Mailbox<Vec<CheckResult>>,
    rx: Mutex<Option<Receiver<Vec<CheckResult>>>>,
    sink: Arc<dyn SpoolSink>,
    tracker: TaskTracker,
    shutdown: ShutdownFlag,
}

impl Formatter {
    pub fn new(sink: Arc<dyn SpoolSink>) -> Self {
        let (mailbox, rx) = mailbox::bounded(QUEUE_CAPACITY);
        Self {
            mailbox,
            rx: Mutex::new(Some(rx)),
            sink,
            tracker: TaskTracker::new(),
            shutdown: ShutdownFlag::new(),
        }
    }
}

#[async_trait]
impl CheckResultSink for Formatter {
    async fn emit(&self, results: Vec<CheckResult>) {
        self.mailbox.send(results).await;
    }
}

#[async_trait]
impl Worker for Formatter {
    fn name(&self) -> &'static str {
        "formatter"
    }

    fn start(&self) {
        let Some(mut rx) = self.rx.lock().expect("receiver lock poisoned").take() else {
            return;
        };
        let sink = Arc::clone(&self.sink);
        self.tracker.spawn(async move {
            info!("formatter started");
            while let Some(results) = rx.recv().await {
                for result in &results {
                    sink.emit(render(result)).await;
                }
            }
            info!("formatter ended");
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
