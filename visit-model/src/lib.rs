//! Visit record domain model for VisitCare Engine
//!
//! A visit is one aggregate split across two physical representations that
//! share one identity:
//!
//! - the **core record** ([`CoreRecord`]): rigid, regulatory-facing fields
//!   (identity, scheduling, lifecycle status, timestamps, location, notes),
//! - the **extended record** ([`ExtendedRecord`]): flexible fields (the
//!   task-completion ledger, vital signs, media references, device sync
//!   metadata).
//!
//! The core store is the single source of truth for identity and lifecycle
//! status; the extended record denormalizes nothing that would override it.
//! Inbound mutations use allow-listed structs ([`CreateVisit`],
//! [`UpdateVisit`], [`ExtendedPatch`], [`VisitCandidate`]) that reject
//! unknown fields rather than spreading arbitrary payloads into records.

pub mod pagination;
pub mod projection;
pub mod status;
pub mod task;
pub mod update;
pub mod visit;

pub use pagination::*;
pub use status::*;
pub use task::*;
pub use update::*;
pub use visit::*;
