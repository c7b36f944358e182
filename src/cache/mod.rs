//! Cache module for storing fetched card sets
//!
//! This module provides a cache manager that persists whole card sets through a
//! pluggable [`CacheStore`] with a configurable freshness window. Expired
//! entries read as misses but stay on disk, so their timestamp can still be
//! reported and a later successful fetch simply overwrites them.

mod manager;
mod store;

pub use manager::{CacheManager, DetailCache};
pub use store::{CacheStore, FileStore, MemoryStore};
