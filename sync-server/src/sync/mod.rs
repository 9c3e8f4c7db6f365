//! Sync queue processing: enqueue helpers and the background worker.

pub mod enqueue;
pub mod worker;
