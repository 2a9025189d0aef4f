// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Supervised refresh stage for the node cache.
//!
//! The initial load runs first inside the background task, so lookups may
//! miss until it completes. Directory errors are logged and the cache left
//! untouched: stale beats empty.

use crate::cache::NodeCache;
use crate::directory::Directory;
use async_trait::async_trait;
use nmp_core::{ShutdownFlag, Worker};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info};

pub struct TopologyRefresher {
    directory: Arc<dyn Directory>,
    cache: Arc<NodeCache>,
    period: Duration,
    tracker: TaskTracker,
    cancel: CancellationToken,
    shutdown: ShutdownFlag,
}

impl TopologyRefresher {
    pub fn new(directory: Arc<dyn Directory>, cache: Arc<NodeCache>, period: Duration) -> Self {
        Self {
            directory,
            cache,
            period,
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
            shutdown: ShutdownFlag::new(),
        }
    }
}

#[async_trait]
impl Worker for TopologyRefresher {
    fn name(&self) -> &'static str {
        "topology-refresher"
    }

    fn start(&self) {
        let directory = Arc::clone(&self.directory);
        let cache = Arc::clone(&self.cache);
        let period = self.period;
        let cancel = self.cancel.clone();
        self.tracker.spawn(async move {
            info!("topology refresher started");
            load(directory.as_ref(), &cache).await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sleep(period) => load(directory.as_ref(), &cache).await,
                }
            }
            info!("topology refresher ended");
        });
    }

    fn stop(&self) {
        if self.shutdown.begin() {
            self.cancel.cancel();
        }
        self.tracker.close();
    }

    async fn join(&self) {
        self.tracker.wait().await;
    }
}

/// One full load: every datacenter, every node. Each node is cached under
/// its `name` meta field when present, its node name otherwise.
async fn load(directory: &dyn Directory, cache: &NodeCache) {
    let datacenters = match directory.datacenters().await {
        Ok(datacenters) => datacenters,
        Err(e) => {
            error!(error = %e, "datacenter enumeration failed");
            return;
        }
    };
    for datacenter in datacenters {
        let nodes = match directory.nodes(&datacenter).await {
            Ok(nodes) => nodes,
            Err(e) => {
                error!(datacenter = %datacenter, error = %e, "node enumeration failed");
                continue;
            }
        };
        for node in nodes {
            let key = node
                .meta
                .get("name")
                .cloned()
                .unwrap_or_else(|| node.node.clone());
            cache.insert(key, node);
        }
    }
}
