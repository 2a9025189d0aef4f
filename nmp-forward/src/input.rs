// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! TCP ingest stage for the forward protocol.
//!
//! One acceptor task plus one decoder task per connection. Frames are
//! decoded incrementally out of a growable buffer, so a frame split across
//! TCP segments is retried once more bytes arrive. A decode failure abandons
//! the connection, since the stream is no longer framed-synchronized.

use crate::decode::decode_frame;
use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use nmp_core::sink::RecordSetSink;
use nmp_core::{ShutdownFlag, Worker};
use std::collections::HashMap;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info};

const READ_BUFFER_CAPACITY: usize = 8 * 1024;

pub struct ForwardInput {
    local_addr: SocketAddr,
    listener: Mutex<Option<TcpListener>>,
    sink: Arc<dyn RecordSetSink>,
    clients: Arc<Mutex<HashMap<SocketAddr, Instant>>>,
    record_sets: Arc<AtomicU64>,
    tracker: TaskTracker,
    cancel: CancellationToken,
    shutdown: ShutdownFlag,
}

impl ForwardInput {
    /// Bind the forward listener. A bind failure is fatal at startup.
    pub async fn bind(addr: SocketAddr, sink: Arc<dyn RecordSetSink>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            local_addr,
            listener: Mutex::new(Some(listener)),
            sink,
            clients: Arc::new(Mutex::new(HashMap::new())),
            record_sets: Arc::new(AtomicU64::new(0)),
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
            shutdown: ShutdownFlag::new(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Counter of decoded record sets, shared with the diagnostic endpoint.
    pub fn record_sets(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.record_sets)
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().expect("clients lock poisoned").len()
    }
}

#[async_trait]
impl Worker for ForwardInput {
    fn name(&self) -> &'static str {
        "forward-input"
    }

    fn start(&self) {
        let Some(listener) = self
            .listener
            .lock()
            .expect("listener lock poisoned")
            .take()
        else {
            return;
        };
        let sink = Arc::clone(&self.sink);
        let clients = Arc::clone(&self.clients);
        let record_sets = Arc::clone(&self.record_sets);
        let cancel = self.cancel.clone();
        let tracker = self.tracker.clone();
        let local_addr = self.local_addr;
        self.tracker.spawn(async move {
            info!(addr = %local_addr, "acceptor started");
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    accepted = listener.accept() => {
                        let (stream, peer) = match accepted {
                            Ok(pair) => pair,
                            Err(e) => {
                                error!(error = %e, "accept failed");
                                break;
                            }
                        };
                        info!(%peer, "connected");
                        clients
                            .lock()
                            .expect("clients lock poisoned")
                            .insert(peer, Instant::now());
                        let sink = Arc::clone(&sink);
                        let clients = Arc::clone(&clients);
                        let record_sets = Arc::clone(&record_sets);
                        let cancel = cancel.clone();
                        tracker.spawn(async move {
                            handle_client(stream, peer, sink, record_sets, cancel).await;
                            clients
                                .lock()
                                .expect("clients lock poisoned")
                                .remove(&peer);
                            info!(%peer, "connection ended");
                        });
                    }
                }
            }
            info!("acceptor ended");
        });
    }

    fn stop(&self) {
        if self.shutdown.begin() {
            // Aborts the accept loop (dropping the listener closes the
            // socket) and unblocks every live connection read.
            self.cancel.cancel();
        }
        self.tracker.close();
    }

    async fn join(&self) {
        self.tracker.wait().await;
    }
}

async fn handle_client(
    mut stream: TcpStream,
    peer: SocketAddr,
    sink: Arc<dyn RecordSetSink>,
    record_sets: Arc<AtomicU64>,
    cancel: CancellationToken,
) {
    let mut buf = BytesMut::with_capacity(READ_BUFFER_CAPACITY);
    loop {
        // Drain every complete frame currently buffered.
        while !buf.is_empty() {
            let mut cursor = Cursor::new(&buf[..]);
            let value = match rmpv::decode::read_value(&mut cursor) {
                Ok(value) => value,
                Err(e) if is_truncated(&e) => break,
                Err(e) => {
                    error!(%peer, error = %e, "malformed stream");
                    return;
                }
            };
            let consumed = cursor.position() as usize;
            buf.advance(consumed);
            match decode_frame(value) {
                Ok(set) => {
                    record_sets.fetch_add(1, Ordering::SeqCst);
                    sink.emit(vec![set]).await;
                }
                Err(e) => {
                    error!(%peer, error = %e, "frame decode failed");
                    return;
                }
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            read = stream.read_buf(&mut buf) => match read {
                Ok(0) => {
                    info!(%peer, "client closed the connection");
                    return;
                }
                Ok(_) => {}
                Err(e) if is_temporary(&e) => {
                    info!(%peer, error = %e, "temporary failure");
                }
                Err(e) => {
                    error!(%peer, error = %e, "read failed");
                    return;
                }
            },
        }
    }
}

/// True when the buffered bytes end mid-value and more input may complete
/// the frame.
fn is_truncated(err: &rmpv::decode::Error) -> bool {
    match err {
        rmpv::decode::Error::InvalidMarkerRead(e) | rmpv::decode::Error::InvalidDataRead(e) => {
            e.kind() == std::io::ErrorKind::UnexpectedEof
        }
        _ => false,
    }
}

fn is_temporary(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::Interrupted
            | std::io::ErrorKind::WouldBlock
            | std::io::ErrorKind::TimedOut
    )
}
