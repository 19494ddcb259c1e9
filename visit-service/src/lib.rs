//! Visit record orchestration service for VisitCare Engine
//!
//! [`VisitService`] is the surface the (external) HTTP layer calls:
//! create/update/delete, lifecycle transitions, task-ledger operations,
//! reads and listings. It owns the dual-write ordering contract:
//!
//! 1. the core store write must succeed, or the whole operation fails;
//! 2. the extended store write is then attempted, and a failure there is
//!    logged as a degraded write while the operation still reports success.
//!
//! Store handles are injected at construction; the service holds no global
//! state.

pub mod service;
pub mod tasks;

pub use service::*;
pub use tasks::*;
