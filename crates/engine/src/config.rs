//! Engine-wide configuration (§6 "Configuration"): base path, durability
//! mode, cache/backup limits, background task intervals, replication
//! setup, and the compression/encryption interface points.

use emberstore_core::Value;
use emberstore_durability::DurabilityMode;
use emberstore_replication::ReplicatorOptions;
use std::path::PathBuf;
use std::time::Duration;

/// TTL sweep cadence (§5 "Background tasks").
pub const DEFAULT_TTL_SWEEP_INTERVAL: Duration = Duration::from_secs(10);
/// Snapshot compaction cadence, `saveInterval` in the source.
pub const DEFAULT_SAVE_INTERVAL: Duration = Duration::from_secs(30);
/// Primary-to-follower heartbeat cadence, `syncInterval` in the source.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// Transforms a value on its way into or out of the store. The source's
/// compression/encryption hooks are implemented as identity functions
/// there too (§9 "Compression/encryption stubs... treat these as
/// interface points rather than features"); a host wires a real codec in
/// by implementing this trait.
pub trait ValueCodec: Send + Sync {
    fn encode(&self, value: Value) -> Value;
    fn decode(&self, value: Value) -> Value;
}

/// The no-op codec used when no compression/encryption plugin is
/// configured.
pub struct IdentityCodec;

impl ValueCodec for IdentityCodec {
    fn encode(&self, value: Value) -> Value {
        value
    }

    fn decode(&self, value: Value) -> Value {
        value
    }
}

/// Options the engine is opened with.
pub struct EngineOptions {
    pub base_path: PathBuf,
    pub durability_mode: DurabilityMode,
    pub cache_limit: usize,
    pub backup_retention: usize,
    pub save_interval: Duration,
    pub ttl_sweep_interval: Duration,
    pub heartbeat_interval: Duration,
    pub replication: Option<ReplicatorOptions>,
    pub codec: Box<dyn ValueCodec>,
}

impl EngineOptions {
    /// Defaults matching the values named throughout the specification:
    /// batched durability, a 1000-entry cache, 5 kept backups, a 10 s TTL
    /// sweep, a 30 s save interval, and a 5 s replication heartbeat. No
    /// replication, no codec.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        EngineOptions {
            base_path: base_path.into(),
            durability_mode: DurabilityMode::default(),
            cache_limit: 1000,
            backup_retention: 5,
            save_interval: DEFAULT_SAVE_INTERVAL,
            ttl_sweep_interval: DEFAULT_TTL_SWEEP_INTERVAL,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            replication: None,
            codec: Box::new(IdentityCodec),
        }
    }

    pub fn durability_mode(mut self, mode: DurabilityMode) -> Self {
        self.durability_mode = mode;
        self
    }

    pub fn cache_limit(mut self, limit: usize) -> Self {
        self.cache_limit = limit;
        self
    }

    pub fn backup_retention(mut self, retention: usize) -> Self {
        self.backup_retention = retention;
        self
    }

    pub fn save_interval(mut self, interval: Duration) -> Self {
        self.save_interval = interval;
        self
    }

    pub fn ttl_sweep_interval(mut self, interval: Duration) -> Self {
        self.ttl_sweep_interval = interval;
        self
    }

    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn replication(mut self, options: ReplicatorOptions) -> Self {
        self.replication = Some(options);
        self
    }

    pub fn codec(mut self, codec: Box<dyn ValueCodec>) -> Self {
        self.codec = codec;
        self
    }
}
