//! Adapters implementing the domain ports.

pub mod in_memory;
pub mod offline_ils;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod row;
