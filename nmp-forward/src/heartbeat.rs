// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! UDP heartbeat echo.
//!
//! Agents probe the forward port with UDP datagrams to confirm the bridge
//! is alive; every datagram is echoed back verbatim. No interpretation, no
//! state. The read is raced against the stage's cancellation token so
//! `stop` always unblocks it.

use async_trait::async_trait;
use nmp_core::{ShutdownFlag, Worker};
use std::net::SocketAddr;
use std::sync::Mutex;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info};

const DATAGRAM_BUFFER: usize = 1024;

pub struct HeartbeatInput {
    local_addr: SocketAddr,
    socket: Mutex<Option<UdpSocket>>,
    tracker: TaskTracker,
    cancel: CancellationToken,
    shutdown: ShutdownFlag,
}

impl HeartbeatInput {
    pub async fn bind(addr: SocketAddr) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        let local_addr = socket.local_addr()?;
        Ok(Self {
            local_addr,
            socket: Mutex::new(Some(socket)),
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
            shutdown: ShutdownFlag::new(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[async_trait]
impl Worker for HeartbeatInput {
    fn name(&self) -> &'static str {
        "heartbeat"
    }

    fn start(&self) {
        let Some(socket) = self.socket.lock().expect("socket lock poisoned").take() else {
            return;
        };
        let cancel = self.cancel.clone();
        let local_addr = self.local_addr;
        self.tracker.spawn(async move {
            info!(addr = %local_addr, "heartbeat started");
            let mut buf = [0u8; DATAGRAM_BUFFER];
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    received = socket.recv_from(&mut buf) => {
                        let (len, peer) = match received {
                            Ok(pair) => pair,
                            Err(e) => {
                                error!(error = %e, "heartbeat read failed");
                                continue;
                            }
                        };
                        if let Err(e) = socket.send_to(&buf[..len], peer).await {
                            error!(%peer, error = %e, "heartbeat echo failed");
                        }
                    }
                }
            }
            info!("heartbeat ended");
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[cfg_attr(miri, ignore)]
    #[tokio::test]
    async fn echoes_datagrams_back_to_the_sender() {
        let input = Arc::new(HeartbeatInput::bind("127.0.0.1:0".parse().unwrap()).await.unwrap());
        input.start();

        let probe = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        probe.send_to(b"ping", input.local_addr()).await.unwrap();

        let mut buf = [0u8; 16];
        let recv = tokio::time::timeout(Duration::from_secs(1), probe.recv_from(&mut buf))
            .await
            .expect("no echo before timeout")
            .unwrap();
        assert_eq!(&buf[..recv.0], b"ping");
        assert_eq!(recv.1, input.local_addr());

        input.stop();
        input.join().await;
    }

    #[cfg_attr(miri, ignore)]
    #[tokio::test]
    async fn stop_unblocks_the_read() {
        let input = Arc::new(HeartbeatInput::bind("127.0.0.1:0".parse().unwrap()).await.unwrap());
        input.start();
        input.stop();
        tokio::time::timeout(Duration::from_secs(1), input.join())
            .await
            .expect("join did not complete after stop");
    }
}
