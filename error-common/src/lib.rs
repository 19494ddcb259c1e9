//! Common error handling for VisitCare Engine
//!
//! This crate provides the error taxonomy shared by every engine module.
//! Each error carries a stable machine-readable code (see [`codes`]) and a
//! human-readable message, so the calling layer can build API responses
//! without pattern-matching on message strings.
//!
//! # Error Categories
//!
//! - **NotFound**: no visit record for the given identity
//! - **ValidationError**: missing or malformed input fields
//! - **InvalidTransition**: illegal lifecycle status change
//! - **IncompleteRequiredTasks**: completion gate violation, carries the
//!   offending task references
//! - **TaskNotFound / DuplicateTask**: task-ledger addressing errors
//! - **IdentityConflict**: offline id and server id resolve to different
//!   records (corrupted client state, never auto-resolved)
//! - **ExtendedStoreDegraded**: extended write/read failed after the core
//!   operation already committed
//! - **StoreFailure**: core store failure, fatal to the enclosing write

pub mod codes;
pub mod types;

pub use types::*;
