//! Checkpoint cache for multi-step pipelines
//!
//! Each checkpointed call is keyed by its identity and arguments; the result
//! is persisted so repeated runs with the same inputs skip the computation.
//!
//! # Layout of a cache root
//!
//! | Entry | Description |
//! |-------|-------------|
//! | `{identity}__{sha256}.json` | One artifact per identity and argument set |
//! | `cache_manifest.json` | Identities in first-execution order |
//!
//! # Invalidation
//!
//! | Operation | Effect |
//! |-----------|--------|
//! | `truncate(id)` | Drops `id` and every identity after it, with their artifacts |
//! | `clear()` | Drops every artifact and empties the manifest |

pub mod checkpoint;
pub mod codec;
pub mod engine;
pub mod key;
pub mod manifest;
pub mod observer;
pub mod store;

pub use checkpoint::Checkpoint;
pub use codec::{Codec, JsonCodec};
pub use engine::{CheckpointCache, ClearReport, TruncateReport};
pub use key::{default_identity, CacheKey, CallArgs, MANIFEST_KEY};
pub use manifest::Manifest;
pub use observer::{AuditLog, CacheEvent, CacheObserver};
pub use store::{ByteStore, FsStore, MemoryStore};
