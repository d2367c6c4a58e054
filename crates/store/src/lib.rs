//! zmna-store: fetches, caches, and schedules loading of verb data.
//!
//! - [`ResourceSource`]: where JSON resources come from (HTTP, a
//!   directory, or memory)
//! - [`VerbDataStore`]: per-verb cache with single-flight fetches and
//!   retry with exponential backoff
//! - [`LazyLoader`]: decides when a verb gets loaded and announces
//!   completed loads to subscribers

pub mod config;
pub mod error;
mod flight;
pub mod lazy;
pub mod resource;
pub mod source;
pub mod store;
#[cfg(test)]
mod testing;

pub use config::{DeploymentMode, SourceConfig, StoreConfig};
pub use error::{SourceError, StoreError};
pub use lazy::{resolve_anchor, LazyLoadConfig, LazyLoader, LoadEvent, SectionVisibility};
pub use resource::Resource;
pub use source::{DirSource, HttpSource, ResourceSource, StaticSource};
pub use store::{CacheEntry, CacheStats, LoadState, VerbDataStore};
