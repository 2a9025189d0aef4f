// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Spool file writer.
//!
//! Each payload becomes a `c<6-random-chars>` file created with an
//! exclusive open (a name collision retries with a new suffix), written in
//! full, chmodded to 0770, then committed by a zero-byte `<name>.ok`
//! sentinel. The monitor ignores payload files without the sentinel, so a
//! partial write is never consumed.

use async_trait::async_trait;
use nmp_core::mailbox::{self, Mailbox};
use nmp_core::sink::SpoolSink;
use nmp_core::{ShutdownFlag, Worker};
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::Receiver;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

const QUEUE_CAPACITY: usize = 16;
const SUFFIX_LEN: usize = 6;
const MAX_CREATE_ATTEMPTS: usize = 10;
const SPOOL_MODE: u32 = 0o770;

pub struct SpoolWriter {
    dir: PathBuf,
    mailbox: Mailbox<String>,
    rx: Mutex<Option<Receiver<String>>>,
    rng: Mutex<Option<StdRng>>,
    written: Arc<AtomicU64>,
    tracker: TaskTracker,
    shutdown: ShutdownFlag,
}

impl SpoolWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_rng(dir, StdRng::from_entropy())
    }

    /// Writer with a caller-provided suffix generator, so tests can predict
    /// the file names it will pick.
    pub fn with_rng(dir: impl Into<PathBuf>, rng: StdRng) -> Self {
        let (mailbox, rx) = mailbox::bounded(QUEUE_CAPACITY);
        Self {
            dir: dir.into(),
            mailbox,
            rx: Mutex::new(Some(rx)),
            rng: Mutex::new(Some(rng)),
            written: Arc::new(AtomicU64::new(0)),
            tracker: TaskTracker::new(),
            shutdown: ShutdownFlag::new(),
        }
    }

    /// Counter of committed spool files, shared with the diagnostic
    /// endpoint.
    pub fn written(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.written)
    }
}

#[async_trait]
impl SpoolSink for SpoolWriter {
    async fn emit(&self, payload: String) {
        self.mailbox.send(payload).await;
    }
}

#[async_trait]
impl Worker for SpoolWriter {
    fn name(&self) -> &'static str {
        "spool-writer"
    }

    fn start(&self) {
        let Some(mut rx) = self.rx.lock().expect("receiver lock poisoned").take() else {
            return;
        };
        let Some(mut rng) = self.rng.lock().expect("rng lock poisoned").take() else {
            return;
        };
        let dir = self.dir.clone();
        let written = Arc::clone(&self.written);
        self.tracker.spawn(async move {
            info!(dir = %dir.display(), "spool writer started");
            while let Some(payload) = rx.recv().await {
                match write_spool_file(&dir, &payload, &mut rng).await {
                    Ok(path) => {
                        written.fetch_add(1, Ordering::SeqCst);
                        debug!(path = %path.display(), "committed");
                    }
                    Err(e) => error!(error = %e, "spool write failed"),
                }
            }
            info!("spool writer ended");
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

pub(crate) fn spool_name(rng: &mut StdRng) -> String {
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| rng.sample(Alphanumeric) as char)
        .collect();
    format!("c{suffix}")
}

/// Write one payload and its commit sentinel. Returns the payload path.
pub async fn write_spool_file(
    dir: &Path,
    payload: &str,
    rng: &mut StdRng,
) -> std::io::Result<PathBuf> {
    let (mut file, path) = create_unique(dir, rng).await?;
    file.write_all(payload.as_bytes()).await?;
    file.flush().await?;
    drop(file);
    fs::set_permissions(&path, std::fs::Permissions::from_mode(SPOOL_MODE)).await?;

    let mut sentinel = path.clone().into_os_string();
    sentinel.push(".ok");
    let sentinel = PathBuf::from(sentinel);
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(SPOOL_MODE)
        .open(&sentinel)
        .await?;
    Ok(path)
}

async fn create_unique(dir: &Path, rng: &mut StdRng) -> std::io::Result<(fs::File, PathBuf)> {
    for _ in 0..MAX_CREATE_ATTEMPTS {
        let path = dir.join(spool_name(rng));
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => return Ok((file, path)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
    Err(std::io::Error::new(
        std::io::ErrorKind::AlreadyExists,
        "could not pick a unique spool file name",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn seeded() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[cfg_attr(miri, ignore)]
    #[tokio::test]
    async fn commits_payload_and_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = seeded();
        let path = write_spool_file(dir.path(), "payload text\n", &mut rng)
            .await
            .unwrap();

        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with('c'));
        assert_eq!(name.len(), 1 + SUFFIX_LEN);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "payload text\n");

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, SPOOL_MODE);

        let sentinel = PathBuf::from(format!("{}.ok", path.display()));
        let meta = std::fs::metadata(&sentinel).unwrap();
        assert_eq!(meta.len(), 0);
    }

    #[cfg_attr(miri, ignore)]
    #[tokio::test]
    async fn name_collision_retries_with_a_new_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let first = spool_name(&mut seeded());
        std::fs::write(dir.path().join(&first), "occupied").unwrap();

        let mut rng = seeded();
        let path = write_spool_file(dir.path(), "x", &mut rng).await.unwrap();
        assert_ne!(path.file_name().unwrap().to_str().unwrap(), first);
        assert!(PathBuf::from(format!("{}.ok", path.display())).exists());
    }

    #[cfg_attr(miri, ignore)]
    #[tokio::test]
    async fn failed_sentinel_leaves_no_commit_marker() {
        let dir = tempfile::tempdir().unwrap();
        let first = spool_name(&mut seeded());
        // Occupying the sentinel name with a directory makes the sentinel
        // write fail after the payload file has been created.
        std::fs::create_dir(dir.path().join(format!("{first}.ok"))).unwrap();

        let mut rng = seeded();
        write_spool_file(dir.path(), "partial", &mut rng)
            .await
            .unwrap_err();

        // The payload file exists but carries no commit marker, so the
        // monitor skips it.
        let payload = dir.path().join(&first);
        assert!(payload.exists());
        assert!(!dir.path().join(format!("{first}.ok")).is_file());
    }

    #[cfg_attr(miri, ignore)]
    #[tokio::test]
    async fn stage_writes_emitted_payloads() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SpoolWriter::new(dir.path());
        writer.start();
        writer.emit("first\n".to_owned()).await;

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            if writer.written().load(Ordering::SeqCst) == 1 {
                break;
            }
            assert!(tokio::time::Instant::now() < deadline, "no spool file appeared");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(names.len(), 2);
        assert_eq!(format!("{}.ok", names[0]), names[1]);

        writer.stop();
        writer.join().await;
    }

    #[cfg_attr(miri, ignore)]
    #[tokio::test]
    async fn write_error_does_not_stop_the_worker() {
        // A spool directory that does not exist fails every write.
        let writer = SpoolWriter::new("/nonexistent/spool");
        writer.start();
        writer.emit("dropped".to_owned()).await;
        writer.emit("also dropped".to_owned()).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(writer.written().load(Ordering::SeqCst), 0);
        writer.stop();
        writer.join().await;
    }

    #[cfg_attr(miri, ignore)]
    #[tokio::test]
    async fn emit_after_stop_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SpoolWriter::new(dir.path());
        writer.start();
        writer.stop();
        writer.emit("late".to_owned()).await;
        writer.join().await;
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
