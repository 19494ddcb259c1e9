//! Visit lifecycle state machine for VisitCare Engine
//!
//! Governs the legal status transitions of a visit:
//!
//! ```text
//! planned ──start──▶ inProgress ──complete──▶ completed (terminal)
//!    │                   │
//!    └──────cancel───────┴──────────────────▶ cancelled (terminal)
//! ```
//!
//! The `complete` transition is gated on the task ledger: every task with
//! high or critical priority must be completed first. Every transition
//! produces an audit note (actor, timestamp, resulting status) that the
//! caller appends to the visit's free-text notes.
//!
//! The machine itself is pure: [`plan_transition`] inspects the current
//! core record and ledger and returns the facts to persist, without
//! touching any store.

pub mod gate;
pub mod machine;

pub use gate::*;
pub use machine::*;
