//! Per-entry advisory locks shared across processes

use codedoc_core::{CacheKey, CodedocError, CodedocResult, ErrorContext};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

/// Exclusive lock on one cache entry, released on drop or by [`EntryLock::release`]
#[derive(Debug)]
pub struct EntryLock {
    file: File,
    path: PathBuf,
}

impl EntryLock {
    /// Acquire the lock for `key`, polling every `retry` until `timeout` has elapsed
    pub fn acquire(
        lock_dir: &Path,
        key: &CacheKey,
        timeout: Duration,
        retry: Duration,
    ) -> CodedocResult<Self> {
        std::fs::create_dir_all(lock_dir)?;

        let path = lock_dir.join(format!("{}.lock", key));
        let start = Instant::now();
        loop {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false) // Lock file content doesn't matter, just the lock
                .open(&path)?;

            loop {
                match FileExt::try_lock_exclusive(&file) {
                    Ok(()) => break,
                    Err(err) => {
                        if err.kind() != ErrorKind::WouldBlock {
                            return Err(err.into());
                        }
                        if start.elapsed() >= timeout {
                            return Err(CodedocError::Lock {
                                message: format!(
                                    "Timed out waiting for cache entry '{}' ({}s)",
                                    key,
                                    timeout.as_secs()
                                ),
                                waited_ms: start.elapsed().as_millis() as u64,
                                context: ErrorContext::new("entry_lock")
                                    .with_operation("acquire")
                                    .with_metadata("key", key.as_str())
                                    .with_suggestion(
                                        "Another codedoc process is updating this repository; retry later",
                                    ),
                            });
                        }
                        std::thread::sleep(retry);
                    }
                }
            }

            // The holder may have evicted the entry and unlinked the file we waited on
            if still_linked(&file, &path) {
                debug!(lock = %path.display(), waited_ms = start.elapsed().as_millis() as u64, "🔒 Acquired entry lock");
                return Ok(Self { file, path });
            }
            debug!(lock = %path.display(), "Lock file was removed while waiting, reopening");
            let _ = FileExt::unlock(&file);
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock explicitly
    pub fn release(self) -> CodedocResult<()> {
        FileExt::unlock(&self.file)?;
        debug!(lock = %self.path.display(), "🔓 Released entry lock");
        Ok(())
    }

    /// Delete the lock file, then release; for entries that no longer exist
    pub fn release_and_remove(self) -> CodedocResult<()> {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                debug!(lock = %self.path.display(), error = %e, "Lock file left in place");
            }
        }
        self.release()
    }
}

/// Whether `path` still names the file `file` was opened from
#[cfg(unix)]
fn still_linked(file: &File, path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (file.metadata(), std::fs::metadata(path)) {
        (Ok(held), Ok(current)) => held.dev() == current.dev() && held.ino() == current.ino(),
        _ => false,
    }
}

/// Open files cannot be deleted here, so an existing path is the file that was locked
#[cfg(not(unix))]
fn still_linked(_file: &File, path: &Path) -> bool {
    path.exists()
}

impl Drop for EntryLock {
    fn drop(&mut self) {
        // Unlocking twice is harmless; closing the descriptor releases it anyway
        let _ = FileExt::unlock(&self.file);
    }
}
