//! Offline sync reconciliation engine for VisitCare Engine
//!
//! Mobile devices queue visit records locally and upload them in batches.
//! The [`SyncReconciler`] matches each inbound candidate to an existing
//! visit (or decides it is new), applies create-or-update semantics through
//! the core store, stamps sync provenance on the extended record, and
//! returns one outcome per candidate in input order.
//!
//! The central design decision is per-record isolation: a failing candidate
//! is recorded as failed and the batch continues, so the device retries
//! only the failed subset. The batch is never wrapped in an all-or-nothing
//! transaction.

pub mod identity;
pub mod reconciler;

pub use identity::*;
pub use reconciler::*;
