//! Key-value persistence layer for the Mercado storefront.
//!
//! Provides a small [`KvStore`] surface with two backends and a typed
//! [`Cache`] wrapper that handles JSON serialization.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use mercado_cache::{Cache, MemoryStore};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Snapshot {
//!     rate: String,
//! }
//!
//! let cache = Cache::new(Arc::new(MemoryStore::new()));
//! cache.set("exchange-rate", &Snapshot { rate: "36.5".into() })?;
//!
//! let snapshot: Option<Snapshot> = cache.get("exchange-rate")?;
//! assert_eq!(snapshot, Some(Snapshot { rate: "36.5".into() }));
//! # Ok::<(), mercado_cache::CacheError>(())
//! ```

mod error;
mod file;
mod kv;
mod memory;

pub use error::CacheError;
pub use file::FileStore;
pub use kv::{Cache, KvStore};
pub use memory::MemoryStore;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{cache_key, Cache, CacheError, FileStore, KvStore, MemoryStore};
}
