//! Engine facade: orchestrates durability, storage, indexes, query,
//! collections, and replication behind one writer critical section, plus
//! the background tasks that share it (§5, §6).

mod background;
pub mod config;
pub mod database;
mod inner;
pub mod interceptor;
pub mod registry;

pub use config::{EngineOptions, IdentityCodec, ValueCodec};
pub use database::{Database, ReplicationStatus};
pub use interceptor::{InterceptorChain, PostRead, PostWrite, PreRead, PreReadOutcome, PreWrite, PreWriteOutcome};
pub use registry::StoreRegistry;
