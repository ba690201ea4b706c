//! Write-ahead log: one JSON-encoded record per line.
//!
//! ## File format
//!
//! The WAL is an append-only file. Each record is a single JSON object
//! followed by `\n`. This is deliberately simpler than a length-prefixed
//! binary framing: a truncated trailing write (crash mid-`write`) leaves an
//! incomplete final line, which fails to parse as JSON and is skipped rather
//! than treated as corruption, exactly matching the recovery contract
//! ("a truncated trailing record is dropped, not treated as corruption").
//! A malformed (but complete) line elsewhere in the file is also skipped,
//! with a `tracing::warn!` so an operator can notice.
//!
//! ## Durability modes
//!
//! - `Strict` - fsync after every append (maximum durability, highest latency)
//! - `Batched` - fsync every N appends OR T ms, whichever first (DEFAULT)
//! - `Async` - background thread fsyncs periodically

use emberstore_core::{EmberError, Result, Value};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// A single WAL record.
///
/// `Ttl` records an expiry change without touching the stored value (the
/// `expire(key, ttl)` operation); `Clr` records a full-store clear.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum WalRecord {
    /// Insert or overwrite `k` with `v`, optionally setting an expiry.
    Put {
        /// Key written.
        k: String,
        /// Value written.
        v: Value,
        /// Unix millis expiry, if this write carries a TTL.
        #[serde(skip_serializing_if = "Option::is_none")]
        exp: Option<i64>,
    },
    /// Remove `k`.
    Del {
        /// Key removed.
        k: String,
    },
    /// Remove every key.
    Clr,
    /// Set or clear (`exp: None`) the expiry on an existing key.
    Ttl {
        /// Key whose expiry changes.
        k: String,
        /// New unix millis expiry, or `None` to make the key permanent.
        #[serde(skip_serializing_if = "Option::is_none")]
        exp: Option<i64>,
    },
}

/// Durability mode: controls when `fsync` is called.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DurabilityMode {
    /// fsync after every append.
    Strict,
    /// fsync every `batch_size` appends or `interval_ms`, whichever first.
    Batched {
        /// Maximum time between fsyncs in milliseconds.
        interval_ms: u64,
        /// Maximum appends between fsyncs.
        batch_size: usize,
    },
    /// Background thread fsyncs periodically; appends only flush to the OS.
    Async {
        /// Time between background fsyncs in milliseconds.
        interval_ms: u64,
    },
}

impl Default for DurabilityMode {
    fn default() -> Self {
        DurabilityMode::Batched {
            interval_ms: 100,
            batch_size: 1000,
        }
    }
}

/// Append-only write-ahead log.
pub struct Wal {
    path: PathBuf,
    writer: Arc<Mutex<BufWriter<File>>>,
    current_offset: Arc<AtomicU64>,
    mode: DurabilityMode,
    last_fsync: Arc<Mutex<Instant>>,
    writes_since_fsync: Arc<AtomicU64>,
    fsync_thread: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl Wal {
    /// Open (creating if absent) the WAL file at `path` in append mode.
    pub fn open<P: AsRef<Path>>(path: P, mode: DurabilityMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).read(true).open(&path)?;
        let current_offset = Arc::new(AtomicU64::new(file.metadata()?.len()));
        let writer = Arc::new(Mutex::new(BufWriter::new(file)));
        let last_fsync = Arc::new(Mutex::new(Instant::now()));
        let writes_since_fsync = Arc::new(AtomicU64::new(0));
        let shutdown = Arc::new(AtomicBool::new(false));

        let fsync_thread = if let DurabilityMode::Async { interval_ms } = mode {
            let writer = Arc::clone(&writer);
            let shutdown = Arc::clone(&shutdown);
            let interval = Duration::from_millis(interval_ms);
            Some(thread::spawn(move || {
                while !shutdown.load(Ordering::Relaxed) {
                    thread::sleep(interval);
                    if shutdown.load(Ordering::Relaxed) {
                        break;
                    }
                    if let Ok(mut w) = writer.lock() {
                        let _ = w.flush();
                        let _ = w.get_mut().sync_all();
                    }
                }
            }))
        } else {
            None
        };

        Ok(Self {
            path,
            writer,
            current_offset,
            mode,
            last_fsync,
            writes_since_fsync,
            fsync_thread,
            shutdown,
        })
    }

    /// Append a record, applying the configured durability mode.
    pub fn append(&mut self, record: &WalRecord) -> Result<u64> {
        let offset = self.current_offset.load(Ordering::SeqCst);
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        {
            let mut writer = self.writer.lock().unwrap();
            writer
                .write_all(&line)
                .map_err(|e| EmberError::durability_with_source(format!("wal append at offset {offset}"), e))?;
        }
        self.current_offset.fetch_add(line.len() as u64, Ordering::SeqCst);

        match self.mode {
            DurabilityMode::Strict => self.fsync()?,
            DurabilityMode::Batched { interval_ms, batch_size } => {
                self.writes_since_fsync.fetch_add(1, Ordering::SeqCst);
                let should_fsync = {
                    let last = self.last_fsync.lock().unwrap();
                    last.elapsed().as_millis() as u64 >= interval_ms
                        || self.writes_since_fsync.load(Ordering::SeqCst) >= batch_size as u64
                };
                if should_fsync {
                    self.fsync()?;
                    self.writes_since_fsync.store(0, Ordering::SeqCst);
                    *self.last_fsync.lock().unwrap() = Instant::now();
                }
            }
            DurabilityMode::Async { .. } => {
                let mut writer = self.writer.lock().unwrap();
                writer
                    .flush()
                    .map_err(|e| EmberError::durability_with_source("wal flush", e))?;
            }
        }

        Ok(offset)
    }

    /// Flush buffered writes to the OS (not necessarily to disk).
    pub fn flush(&mut self) -> Result<()> {
        let mut writer = self.writer.lock().unwrap();
        writer.flush().map_err(|e| EmberError::durability_with_source("wal flush", e))
    }

    /// Flush and fsync to disk.
    pub fn fsync(&self) -> Result<()> {
        let mut writer = self.writer.lock().unwrap();
        writer.flush().map_err(|e| EmberError::durability_with_source("wal flush", e))?;
        writer
            .get_mut()
            .sync_all()
            .map_err(|e| EmberError::durability_with_source("wal fsync", e))?;
        Ok(())
    }

    /// Truncate the log to zero length, for use after a snapshot checkpoint.
    /// Also resets the in-process offset/fsync bookkeeping.
    pub fn truncate(&mut self) -> Result<()> {
        {
            let mut writer = self.writer.lock().unwrap();
            writer.flush().map_err(|e| EmberError::durability_with_source("wal flush before truncate", e))?;
            writer.get_mut().set_len(0)?;
            use std::io::Seek;
            writer.get_mut().seek(std::io::SeekFrom::Start(0))?;
        }
        self.current_offset.store(0, Ordering::SeqCst);
        self.writes_since_fsync.store(0, Ordering::SeqCst);
        Ok(())
    }

    /// Replay every well-formed record in the file from the beginning.
    /// Malformed lines (other than a truncated trailing line) are logged
    /// and skipped; decoding never aborts the whole replay.
    pub fn read_all(&self) -> Result<Vec<WalRecord>> {
        {
            let mut writer = self.writer.lock().unwrap();
            let _ = writer.flush();
        }
        let file = File::open(&self.path)?;
        let mut reader = BufReader::new(file);
        let mut records = Vec::new();
        let mut line = Vec::new();

        loop {
            line.clear();
            let read = reader.read_until(b'\n', &mut line)?;
            if read == 0 {
                break;
            }
            if line.last() != Some(&b'\n') {
                // Truncated trailing write; not corruption, just stop here.
                break;
            }
            let trimmed = &line[..line.len() - 1];
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_slice::<WalRecord>(trimmed) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping malformed wal line");
                }
            }
        }

        Ok(records)
    }

    /// Current file size in bytes.
    pub fn size(&self) -> u64 {
        self.current_offset.load(Ordering::SeqCst)
    }

    /// Path to the WAL file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configured durability mode.
    pub fn mode(&self) -> DurabilityMode {
        self.mode
    }
}

impl Drop for Wal {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.fsync_thread.take() {
            let _ = handle.join();
        }
        let _ = self.fsync();
    }
}
