//! Advisory cross-process lock over the registry file.
//!
//! The guard releases on every exit path — drop runs on normal return,
//! error propagation, and unwinding alike. Where the filesystem refuses
//! advisory locks (some network mounts), a sentinel sibling file takes
//! over; the sentinel honors the same timeout and is removed on clean
//! release.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use flash_domain::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// RAII guard over the lock; dropping it releases.
pub struct FileLock {
    file: Option<File>,
    sentinel: Option<PathBuf>,
}

pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(100);

impl FileLock {
    /// Acquire the lock at `path`, retrying every `retry_interval` until
    /// `timeout` elapses. `timeout = None` retries indefinitely.
    pub fn acquire(
        path: &Path,
        mode: LockMode,
        timeout: Option<Duration>,
        retry_interval: Duration,
    ) -> Result<FileLock> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)?;

        let started = Instant::now();
        let mut advisory_failed = false;
        loop {
            if !advisory_failed {
                let attempt = match mode {
                    LockMode::Shared => fs2::FileExt::try_lock_shared(&file),
                    LockMode::Exclusive => fs2::FileExt::try_lock_exclusive(&file),
                };
                match attempt {
                    Ok(()) => {
                        return Ok(FileLock {
                            file: Some(file),
                            sentinel: None,
                        })
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                    Err(e) => {
                        // Filesystem without advisory locking; switch to the
                        // sentinel strategy for the rest of this acquire.
                        tracing::debug!(path = %path.display(), error = %e,
                            "advisory lock unavailable, using sentinel file");
                        advisory_failed = true;
                    }
                }
            }

            if advisory_failed {
                let sentinel = sentinel_path(path);
                match OpenOptions::new().create_new(true).write(true).open(&sentinel) {
                    Ok(_) => {
                        return Ok(FileLock {
                            file: None,
                            sentinel: Some(sentinel),
                        })
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
                    Err(e) => return Err(Error::Lock(format!("sentinel create failed: {e}"))),
                }
            }

            if let Some(limit) = timeout {
                if started.elapsed() >= limit {
                    return Err(Error::LockTimeout(limit));
                }
            }
            std::thread::sleep(retry_interval);
        }
    }

    /// Acquire with the default retry interval.
    pub fn acquire_default(path: &Path, mode: LockMode, timeout: Option<Duration>) -> Result<Self> {
        Self::acquire(path, mode, timeout, DEFAULT_RETRY_INTERVAL)
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
        }
        if let Some(sentinel) = self.sentinel.take() {
            let _ = std::fs::remove_file(sentinel);
        }
    }
}

fn sentinel_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".lock");
    path.with_file_name(name)
}
