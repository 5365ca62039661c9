//! Persistence for acquisition history.
//!
//! This module provides:
//! - Atomic JSON file operations
//! - The identifier → filename mapping store shared across runs

mod atomic;
mod mapping;

pub use atomic::{atomic_read_json, atomic_write_json};
pub use mapping::{EntityMapping, MappingStore, MappingTable};
