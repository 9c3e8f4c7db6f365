//! Shared domain types for the CRM synchronization engine.

pub mod models;
pub mod util;
