// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounded inter-stage queue with close-once semantics.
//!
//! A stage's `stop` closes its mailbox; the consumer task observes
//! end-of-input once the buffered items are drained. Sending into a closed
//! mailbox is a silent no-op; this is the documented contract for upstream
//! `emit` calls racing a downstream shutdown.

use std::sync::Mutex;
use tokio::sync::mpsc;

pub struct Mailbox<T> {
    tx: Mutex<Option<mpsc::Sender<T>>>,
}

/// Create a bounded mailbox and the receiver its consumer task drains.
pub fn bounded<T>(capacity: usize) -> (Mailbox<T>, mpsc::Receiver<T>) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        Mailbox {
            tx: Mutex::new(Some(tx)),
        },
        rx,
    )
}

impl<T> Mailbox<T> {
    /// Enqueue an item, waiting if the queue is full. Returns false if the
    /// mailbox was already closed and the item was discarded.
    pub async fn send(&self, item: T) -> bool {
        let tx = match self.tx.lock().expect("mailbox lock poisoned").as_ref() {
            Some(tx) => tx.clone(),
            None => return false,
        };
        tx.send(item).await.is_ok()
    }

    /// Close the mailbox. The consumer drains what is buffered, then sees
    /// end-of-input. Safe to call more than once.
    pub fn close(&self) {
        self.tx.lock().expect("mailbox lock poisoned").take();
    }

    pub fn is_closed(&self) -> bool {
        self.tx.lock().expect("mailbox lock poisoned").is_none()
    }
}
