//! Adapters implementing the domain ports.

pub mod file_slot;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
