//! CRM synchronization engine.
//!
//! Keeps a local SQLite order database consistent with an external CRM:
//! a durable sync queue pushes local mutations out, a webhook ingester and
//! a periodic reconciler pull remote state back in, and an invoice
//! materializer downloads generated documents to local files.

pub mod api;
pub mod config;
pub mod crm;
pub mod db;
pub mod invoice;
pub mod reconcile;
pub mod stages;
pub mod state;
pub mod sync;
