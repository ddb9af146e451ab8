//! # registra-workflow — Approval and Lifecycle State Machines
//!
//! Pure domain logic for the four stateful components of the registry:
//!
//! - [`request`] — the generic pending → approved/rejected pipeline for
//!   registry access requests.
//! - [`grant`] — the derived, time-boxed capability record an approval
//!   produces.
//! - [`document`] — the lazy open/lock/delete lifecycle protecting a
//!   rendered confidential artifact.
//! - [`officer`] — the multi-stage officer-credentialing pipeline with its
//!   new-identity-vs-merge terminal branch.
//!
//! ## Crate Policy
//!
//! - No IO and no clock reads: every transition takes `now` from the caller
//!   so lifecycles are testable at any point in simulated time.
//! - Transitions validate before mutating and reject invalid moves with
//!   structured per-module errors.
//! - The actor context is an explicit parameter everywhere; this crate has
//!   no notion of a "current" user.

pub mod document;
pub mod grant;
pub mod officer;
pub mod request;

pub use document::{DocumentError, DocumentGrant, LifecycleState, OpenOutcome, PrintOutcome};
pub use grant::{AccessGrant, GRANT_TTL_DAYS};
pub use officer::{
    DepartmentAssignment, OathDisposition, Officer, OfficerError, OfficerRequest, OfficerStatus,
    RecordCode, SeminarSession, TransitionRecord,
};
pub use request::{
    AccessRequest, Capability, DuplicateKey, RegistryKind, RequestError, RequestStatus,
    VerificationStatus,
};
