//! Dual-store persistence adapters for VisitCare Engine
//!
//! A visit's canonical fields live in a rigid relational table (the **core
//! store**); its flexible payload lives in a JSONB document keyed by the
//! same id (the **extended store**). The two write paths are deliberately
//! loosely coupled — no distributed transaction spans them:
//!
//! - a core write failure is fatal to the enclosing operation,
//! - an extended write failure is a degraded write the caller logs and
//!   tolerates, and a missing extended record on read means "no extended
//!   data", never "visit does not exist".
//!
//! Both adapters are trait seams ([`CoreStore`], [`ExtendedStore`]) with a
//! PostgreSQL implementation for production and an in-memory implementation
//! for tests and embedded use. Store handles are constructed explicitly and
//! injected into components; there is no module-level connection state.
//!
//! The extended document carries a `version` revision used for optimistic
//! concurrency: targeted ledger updates are conditional on the version the
//! caller read, so two actors completing different tasks on the same visit
//! do not clobber each other.

pub mod config;
pub mod connection;
pub mod core_store;
pub mod error;
pub mod extended_store;
pub mod memory;

pub use config::*;
pub use connection::*;
pub use core_store::*;
pub use error::*;
pub use extended_store::*;
pub use memory::*;
