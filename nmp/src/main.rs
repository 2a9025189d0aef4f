// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Entry point: loads the configuration, wires the pipeline stages
//! (ingest → normalizer → checker → formatter → spool writer, with the
//! heartbeat echo and topology refresher on the side), and supervises them
//! until an INT or TERM signal triggers the graceful shutdown.

mod debug;

use anyhow::Context;
use clap::Parser;
use nmp_checker::{Checker, Normalizer, RecordSink};
use nmp_core::node::NodeLookup;
use nmp_core::sink::{CheckResultSink, RecordSetSink, SpoolSink};
use nmp_core::WorkerSet;
use nmp_forward::{ForwardInput, HeartbeatInput};
use nmp_spool::{Formatter, SpoolWriter};
use nmp_topology::{CatalogClient, NodeCache, TopologyRefresher};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "nmp", about = "Forward-protocol to monitor check bridge")]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, default_value = "config.hcl")]
    config: PathBuf,
    /// Serve pipeline diagnostics over HTTP on :6060.
    #[arg(long)]
    pprof: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = nmp_config::load(&cli.config)?;
    let rules = nmp_checker::index_rules(&config.check)?;
    let bind: SocketAddr = config
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {}", config.bind))?;

    // The cache is constructed here and injected into the checker; its
    // refresh loop runs as a supervised stage like any other.
    let mut lookup: Option<Arc<dyn NodeLookup>> = None;
    let mut refresher: Option<Arc<TopologyRefresher>> = None;
    if let Some(topology) = &config.topology {
        let cache = Arc::new(NodeCache::new(Duration::from_secs(topology.ttl_secs)));
        let directory = Arc::new(CatalogClient::new(topology.address.clone()));
        refresher = Some(Arc::new(TopologyRefresher::new(
            directory,
            Arc::clone(&cache),
            Duration::from_secs(topology.refresh_secs),
        )));
        lookup = Some(cache);
    }

    let writer = Arc::new(SpoolWriter::new(&config.check_results_dir));
    let formatter = Arc::new(Formatter::new(Arc::clone(&writer) as Arc<dyn SpoolSink>));
    let checker = Arc::new(Checker::new(
        rules,
        lookup,
        Arc::clone(&formatter) as Arc<dyn CheckResultSink>,
    ));
    let normalizer = Arc::new(Normalizer::new(
        config.tags.clone(),
        Arc::clone(&checker) as Arc<dyn RecordSink>,
    ));
    let input = Arc::new(
        ForwardInput::bind(bind, Arc::clone(&normalizer) as Arc<dyn RecordSetSink>)
            .await
            .with_context(|| format!("binding forward listener on {bind}"))?,
    );
    let heartbeat = Arc::new(
        HeartbeatInput::bind(bind)
            .await
            .with_context(|| format!("binding heartbeat socket on {bind}"))?,
    );

    if cli.pprof {
        debug::spawn(debug::PipelineStats::new(
            input.record_sets(),
            writer.written(),
        ));
    }

    // Insertion order is shutdown order: close the intake first, then let
    // each downstream stage drain.
    let mut workers = WorkerSet::new();
    workers.add(input);
    workers.add(heartbeat);
    workers.add(normalizer);
    workers.add(checker);
    workers.add(formatter);
    workers.add(writer);
    if let Some(refresher) = refresher {
        workers.add(refresher);
    }
    let workers = Arc::new(workers);
    workers.start_all();

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    {
        let workers = Arc::clone(&workers);
        tokio::spawn(async move {
            tokio::select! {
                _ = interrupt.recv() => info!("interrupt received"),
                _ = terminate.recv() => info!("terminate received"),
            }
            workers.stop_all();
        });
    }

    workers.join_all().await;
    info!("shutting down");
    Ok(())
}
