//! # registra-core — Shared Foundation Types
//!
//! The bottom of the dependency DAG. Defines the typed identifiers, the
//! two-level tenant hierarchy (district / local congregation), the explicit
//! actor context threaded through every workflow call, and the structured
//! audit event accepted by the append-only audit sink.
//!
//! ## Crate Policy
//!
//! - No IO, no async, no crypto — pure types only.
//! - Workflow and API crates depend on this crate, never the reverse.
//! - The actor context is always passed explicitly; nothing in the core
//!   reads a logged-in user from ambient state.

pub mod actor;
pub mod audit;
pub mod ids;
pub mod scope;

pub use actor::{Actor, Role};
pub use audit::AuditEvent;
pub use ids::{DocumentId, GrantId, GroupId, OfficerId, OfficerRequestId, RequestId, UserId};
pub use scope::{DistrictId, LocalId, TenantScope};
