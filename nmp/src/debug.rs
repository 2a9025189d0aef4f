// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Diagnostic HTTP endpoint served on `:6060` when `--pprof` is set.
//! Returns the pipeline counters as JSON on every request.

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

const DEBUG_ADDR: &str = "0.0.0.0:6060";

pub struct PipelineStats {
    record_sets: Arc<AtomicU64>,
    spooled: Arc<AtomicU64>,
    started_at: Instant,
}

impl PipelineStats {
    pub fn new(record_sets: Arc<AtomicU64>, spooled: Arc<AtomicU64>) -> Self {
        Self {
            record_sets,
            spooled,
            started_at: Instant::now(),
        }
    }

    fn render(&self) -> String {
        serde_json::json!({
            "uptime_secs": self.started_at.elapsed().as_secs(),
            "record_sets_decoded": self.record_sets.load(Ordering::SeqCst),
            "results_spooled": self.spooled.load(Ordering::SeqCst),
        })
        .to_string()
    }
}

/// Bind and serve in the background. A bind failure is logged, not fatal;
/// diagnostics never take the bridge down.
pub fn spawn(stats: PipelineStats) {
    let stats = Arc::new(stats);
    tokio::spawn(async move {
        let listener = match TcpListener::bind(DEBUG_ADDR).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(addr = DEBUG_ADDR, error = %e, "debug endpoint bind failed");
                return;
            }
        };
        info!(addr = DEBUG_ADDR, "debug endpoint started");
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let stats = Arc::clone(&stats);
            tokio::spawn(async move {
                let service = service_fn(move |_req: Request<hyper::body::Incoming>| {
                    let stats = Arc::clone(&stats);
                    async move {
                        let mut response = Response::new(Full::new(Bytes::from(stats.render())));
                        response
                            .headers_mut()
                            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                        Ok::<_, Infallible>(response)
                    }
                });
                if let Err(e) = hyper::server::conn::http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await
                {
                    debug!(error = %e, "debug connection error");
                }
            });
        }
    });
}
