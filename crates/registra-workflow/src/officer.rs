//! Officer credentialing.
//!
//! The multi-stage onboarding pipeline:
//!
//! ```text
//! pending → requested_to_seminar → in_seminar → seminar_completed
//!        → requested_to_oath → ready_to_oath → oath_taken
//! ```
//!
//! with `rejected` and `cancelled` reachable from every non-terminal state.
//! Oath completion branches on the record code: CODE A materializes a new
//! [`Officer`] identity (and bumps the tenant headcount), CODE D reactivates
//! an existing identity and appends an assignment (headcount unchanged).
//! The code must be set before completion — the new-vs-duplicate decision is
//! explicit, never implied.
//!
//! Every transition is recorded in an ordered log on the request, which the
//! history query returns verbatim.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use registra_core::{OfficerId, OfficerRequestId, TenantScope, UserId};

/// Pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfficerStatus {
    /// Submitted, not yet routed to a seminar.
    Pending,
    /// Approved for seminar attendance.
    RequestedToSeminar,
    /// Attending the seminar.
    InSeminar,
    /// Seminar marked complete by a reviewer.
    SeminarCompleted,
    /// Approved to proceed to oath.
    RequestedToOath,
    /// Cleared for oath completion.
    ReadyToOath,
    /// Oath taken; identity materialized (terminal).
    OathTaken,
    /// Rejected by a reviewer (terminal).
    Rejected,
    /// Withdrawn by the requester (terminal).
    Cancelled,
}

impl OfficerStatus {
    /// Stable string form, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::RequestedToSeminar => "requested_to_seminar",
            Self::InSeminar => "in_seminar",
            Self::SeminarCompleted => "seminar_completed",
            Self::RequestedToOath => "requested_to_oath",
            Self::ReadyToOath => "ready_to_oath",
            Self::OathTaken => "oath_taken",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    /// The next stage in the linear pipeline, if any.
    pub fn next(&self) -> Option<OfficerStatus> {
        match self {
            Self::Pending => Some(Self::RequestedToSeminar),
            Self::RequestedToSeminar => Some(Self::InSeminar),
            Self::InSeminar => Some(Self::SeminarCompleted),
            Self::SeminarCompleted => Some(Self::RequestedToOath),
            Self::RequestedToOath => Some(Self::ReadyToOath),
            Self::ReadyToOath => Some(Self::OathTaken),
            Self::OathTaken | Self::Rejected | Self::Cancelled => None,
        }
    }

    /// Whether this stage is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::OathTaken | Self::Rejected | Self::Cancelled)
    }
}

impl std::fmt::Display for OfficerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The new-vs-duplicate disposition code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordCode {
    /// New identity: create a fresh [`Officer`].
    A,
    /// Duplicate: merge into an existing [`Officer`].
    D,
}

impl RecordCode {
    /// Stable string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::D => "D",
        }
    }

    /// Parse the wire form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "A" => Some(Self::A),
            "D" => Some(Self::D),
            _ => None,
        }
    }
}

/// What oath completion resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OathDisposition {
    /// CODE A: a new identity must be created and the tenant headcount
    /// incremented by one.
    NewIdentity,
    /// CODE D: the named identity is reactivated and receives a new
    /// assignment; headcount is unchanged.
    MergeInto(OfficerId),
}

/// One seminar session in the ordered, append-only attendance sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeminarSession {
    /// Session date.
    pub date: NaiveDate,
    /// Where the session was held.
    pub location: String,
    /// Whether the candidate attended.
    pub attended: bool,
    /// Who marked the attendance.
    pub marked_by: Option<UserId>,
}

/// One entry in a request's transition log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// Stage before.
    pub from: OfficerStatus,
    /// Stage after.
    pub to: OfficerStatus,
    /// Who drove the transition.
    pub actor: UserId,
    /// When.
    pub at: DateTime<Utc>,
}

/// Errors from the credentialing pipeline.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum OfficerError {
    /// The requested stage does not follow the current one.
    #[error("cannot move from {from} to {to}")]
    InvalidTransition {
        from: OfficerStatus,
        to: OfficerStatus,
    },

    /// The request has reached a terminal stage.
    #[error("request is {status}; no further transitions")]
    Terminal { status: OfficerStatus },

    /// Oath completion requires the record code to be decided first.
    #[error("record code must be set before completing the oath")]
    CodeNotSet,

    /// CODE D names a pre-existing identity; none was given.
    #[error("record code D requires an existing officer identity")]
    MissingExistingOfficer,

    /// CODE A must not name an existing identity.
    #[error("record code A must not name an existing officer identity")]
    UnexpectedExistingOfficer,

    /// Rejection requires a non-empty reason.
    #[error("rejection reason must be non-empty")]
    EmptyReason,

    /// Attendance was marked at an index past the session list.
    #[error("no seminar session at index {index} (have {len})")]
    AttendanceIndexOutOfRange { index: usize, len: usize },
}

/// An officer-credentialing request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficerRequest {
    /// Unique identifier.
    pub id: OfficerRequestId,
    /// The submitting user.
    pub requester: UserId,
    /// The requester's tenant scope; CODE D relocates the merged identity
    /// here.
    pub scope: TenantScope,
    /// Requested department role.
    pub requested_role: String,
    /// Requested duty within the role.
    pub requested_duty: String,
    /// Applicant display name, encrypted for the request's district. Copied
    /// onto the identity a CODE A completion creates.
    pub applicant_name_enc: String,
    /// Current pipeline stage.
    pub status: OfficerStatus,
    /// The new-vs-duplicate decision; must be set before oath completion.
    pub record_code: Option<RecordCode>,
    /// The identity to merge into; required iff the code is D.
    pub existing_officer: Option<OfficerId>,
    /// Ordered, append-only seminar attendance sequence.
    pub seminar_sessions: Vec<SeminarSession>,
    /// Attendance-day threshold, tracked for display only; never drives a
    /// transition.
    pub required_seminar_days: u32,
    /// The materialized identity, set on successful completion.
    pub officer_id: Option<OfficerId>,
    /// Rejection reason.
    pub rejection_reason: Option<String>,
    /// Who completed the oath.
    pub completed_by: Option<UserId>,
    /// When the oath was completed.
    pub completed_at: Option<DateTime<Utc>>,
    /// Ordered transition log.
    pub transitions: Vec<TransitionRecord>,
    /// When the request was submitted.
    pub created_at: DateTime<Utc>,
}

impl OfficerRequest {
    /// Submit a new request in the `Pending` stage.
    pub fn submit(
        requester: UserId,
        scope: TenantScope,
        requested_role: impl Into<String>,
        requested_duty: impl Into<String>,
        applicant_name_enc: impl Into<String>,
        required_seminar_days: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: OfficerRequestId::new(),
            requester,
            scope,
            requested_role: requested_role.into(),
            requested_duty: requested_duty.into(),
            applicant_name_enc: applicant_name_enc.into(),
            status: OfficerStatus::Pending,
            record_code: None,
            existing_officer: None,
            seminar_sessions: Vec::new(),
            required_seminar_days,
            officer_id: None,
            rejection_reason: None,
            completed_by: None,
            completed_at: None,
            transitions: Vec::new(),
            created_at: now,
        }
    }

    /// Days attended so far, for display against the required threshold.
    pub fn attended_days(&self) -> usize {
        self.seminar_sessions.iter().filter(|s| s.attended).count()
    }

    fn step(
        &mut self,
        to: OfficerStatus,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> Result<(), OfficerError> {
        if self.status.is_terminal() {
            return Err(OfficerError::Terminal {
                status: self.status,
            });
        }
        if self.status.next() != Some(to) {
            return Err(OfficerError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.record_transition(to, actor, now);
        Ok(())
    }

    fn record_transition(&mut self, to: OfficerStatus, actor: UserId, at: DateTime<Utc>) {
        self.transitions.push(TransitionRecord {
            from: self.status,
            to,
            actor,
            at,
        });
        self.status = to;
    }

    /// `pending → requested_to_seminar`.
    pub fn approve_seminar(&mut self, actor: UserId, now: DateTime<Utc>) -> Result<(), OfficerError> {
        self.step(OfficerStatus::RequestedToSeminar, actor, now)
    }

    /// `requested_to_seminar → in_seminar`.
    pub fn mark_in_seminar(&mut self, actor: UserId, now: DateTime<Utc>) -> Result<(), OfficerError> {
        self.step(OfficerStatus::InSeminar, actor, now)
    }

    /// `in_seminar → seminar_completed`. A manual reviewer decision; the
    /// attendance count never triggers this on its own.
    pub fn complete_seminar(&mut self, actor: UserId, now: DateTime<Utc>) -> Result<(), OfficerError> {
        self.step(OfficerStatus::SeminarCompleted, actor, now)
    }

    /// `seminar_completed → requested_to_oath`.
    pub fn approve_oath(&mut self, actor: UserId, now: DateTime<Utc>) -> Result<(), OfficerError> {
        self.step(OfficerStatus::RequestedToOath, actor, now)
    }

    /// `requested_to_oath → ready_to_oath`.
    pub fn mark_ready_oath(&mut self, actor: UserId, now: DateTime<Utc>) -> Result<(), OfficerError> {
        self.step(OfficerStatus::ReadyToOath, actor, now)
    }

    /// Record the new-vs-duplicate decision.
    ///
    /// CODE D must name the identity to merge into; CODE A must not.
    /// Allowed at any non-terminal stage so the decision can be corrected
    /// up until completion.
    pub fn set_code(
        &mut self,
        code: RecordCode,
        existing_officer: Option<OfficerId>,
    ) -> Result<(), OfficerError> {
        if self.status.is_terminal() {
            return Err(OfficerError::Terminal {
                status: self.status,
            });
        }
        match (code, existing_officer) {
            (RecordCode::D, None) => Err(OfficerError::MissingExistingOfficer),
            (RecordCode::A, Some(_)) => Err(OfficerError::UnexpectedExistingOfficer),
            (code, existing) => {
                self.record_code = Some(code);
                self.existing_officer = existing;
                Ok(())
            }
        }
    }

    /// Append a seminar session. The sequence is append-only; sessions are
    /// addressed by index thereafter.
    pub fn add_seminar_date(
        &mut self,
        date: NaiveDate,
        location: impl Into<String>,
    ) -> Result<(), OfficerError> {
        if self.status.is_terminal() {
            return Err(OfficerError::Terminal {
                status: self.status,
            });
        }
        self.seminar_sessions.push(SeminarSession {
            date,
            location: location.into(),
            attended: false,
            marked_by: None,
        });
        Ok(())
    }

    /// Mark attendance for the session at `index`.
    pub fn mark_attendance(
        &mut self,
        index: usize,
        attended: bool,
        marked_by: UserId,
    ) -> Result<(), OfficerError> {
        if self.status.is_terminal() {
            return Err(OfficerError::Terminal {
                status: self.status,
            });
        }
        let len = self.seminar_sessions.len();
        let session = self
            .seminar_sessions
            .get_mut(index)
            .ok_or(OfficerError::AttendanceIndexOutOfRange { index, len })?;
        session.attended = attended;
        session.marked_by = Some(marked_by);
        Ok(())
    }

    /// Reject the request with a mandatory reason. Reachable from any
    /// non-terminal stage.
    pub fn reject(
        &mut self,
        reason: &str,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> Result<(), OfficerError> {
        if reason.trim().is_empty() {
            return Err(OfficerError::EmptyReason);
        }
        if self.status.is_terminal() {
            return Err(OfficerError::Terminal {
                status: self.status,
            });
        }
        self.rejection_reason = Some(reason.trim().to_string());
        self.record_transition(OfficerStatus::Rejected, actor, now);
        Ok(())
    }

    /// Withdraw the request. Reachable from any non-terminal stage.
    pub fn cancel(&mut self, actor: UserId, now: DateTime<Utc>) -> Result<(), OfficerError> {
        if self.status.is_terminal() {
            return Err(OfficerError::Terminal {
                status: self.status,
            });
        }
        self.record_transition(OfficerStatus::Cancelled, actor, now);
        Ok(())
    }

    /// Complete the oath: `ready_to_oath → oath_taken`.
    ///
    /// Requires the record code to be set; validates before mutating, so a
    /// failed gate leaves the request untouched. Returns which branch the
    /// caller must materialize (identity creation vs merge) — persisting
    /// the resulting [`Officer`] and the headcount change is the store's
    /// job, inside the same transaction as this status change.
    pub fn complete_oath(
        &mut self,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> Result<OathDisposition, OfficerError> {
        if self.status.is_terminal() {
            return Err(OfficerError::Terminal {
                status: self.status,
            });
        }
        if self.status != OfficerStatus::ReadyToOath {
            return Err(OfficerError::InvalidTransition {
                from: self.status,
                to: OfficerStatus::OathTaken,
            });
        }
        let disposition = match self.record_code {
            None => return Err(OfficerError::CodeNotSet),
            Some(RecordCode::A) => OathDisposition::NewIdentity,
            Some(RecordCode::D) => OathDisposition::MergeInto(
                self.existing_officer
                    .ok_or(OfficerError::MissingExistingOfficer)?,
            ),
        };

        self.record_transition(OfficerStatus::OathTaken, actor, now);
        self.completed_by = Some(actor);
        self.completed_at = Some(now);
        Ok(disposition)
    }
}

/// One department assignment on an officer identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentAssignment {
    /// Department role.
    pub role: String,
    /// Duty within the role.
    pub duty: String,
    /// Date the oath for this assignment was taken.
    pub oath_date: NaiveDate,
}

impl DepartmentAssignment {
    /// Whether another assignment is an exact role+duty duplicate.
    pub fn same_post(&self, other: &DepartmentAssignment) -> bool {
        self.role == other.role && self.duty == other.duty
    }
}

/// A stable officer identity with 1..N department assignments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Officer {
    /// Stable identity; survives reactivation, relocation, and merges.
    pub officer_uuid: OfficerId,
    /// Current tenant scope.
    pub scope: TenantScope,
    /// Active flag; flipped on reactivation (CODE D) and deactivation.
    pub is_active: bool,
    /// Encrypted display name (tenant field encryption).
    pub name_enc: String,
    /// Department assignments, in creation order.
    pub assignments: Vec<DepartmentAssignment>,
    /// When the identity was created.
    pub created_at: DateTime<Utc>,
}

impl Officer {
    /// Materialize a new identity (CODE A) with its first assignment.
    pub fn materialize(
        scope: TenantScope,
        name_enc: String,
        first_assignment: DepartmentAssignment,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            officer_uuid: OfficerId::new(),
            scope,
            is_active: true,
            name_enc,
            assignments: vec![first_assignment],
            created_at: now,
        }
    }

    /// Reactivate into a (possibly new) tenant scope and append an
    /// assignment (CODE D).
    pub fn reactivate_into(&mut self, scope: TenantScope, assignment: DepartmentAssignment) {
        self.is_active = true;
        self.scope = scope;
        self.assignments.push(assignment);
    }

    /// Absorb another identity's assignments, skipping exact role+duty
    /// duplicates. Used by the identity-merge bulk operation; re-pointing
    /// foreign references and deleting the duplicate is the store's job.
    pub fn merge_assignments_from(&mut self, other: &Officer) {
        for a in &other.assignments {
            if !self.assignments.iter().any(|mine| mine.same_post(a)) {
                self.assignments.push(a.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> OfficerRequest {
        OfficerRequest::submit(
            UserId::new(),
            TenantScope::new("D1", "L1"),
            "records",
            "archivist",
            "enc:applicant",
            3,
            Utc::now(),
        )
    }

    fn at_ready_to_oath() -> (OfficerRequest, UserId) {
        let mut r = request();
        let rev = UserId::new();
        let now = Utc::now();
        r.approve_seminar(rev, now).unwrap();
        r.mark_in_seminar(rev, now).unwrap();
        r.complete_seminar(rev, now).unwrap();
        r.approve_oath(rev, now).unwrap();
        r.mark_ready_oath(rev, now).unwrap();
        (r, rev)
    }

    fn assignment(role: &str, duty: &str) -> DepartmentAssignment {
        DepartmentAssignment {
            role: role.to_string(),
            duty: duty.to_string(),
            oath_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
        }
    }

    #[test]
    fn linear_pipeline_walk() {
        let (r, _) = at_ready_to_oath();
        assert_eq!(r.status, OfficerStatus::ReadyToOath);
        assert_eq!(r.transitions.len(), 5);
        assert_eq!(r.transitions[0].from, OfficerStatus::Pending);
        assert_eq!(r.transitions[4].to, OfficerStatus::ReadyToOath);
    }

    #[test]
    fn stage_skipping_is_rejected() {
        let mut r = request();
        let rev = UserId::new();
        let err = r.mark_in_seminar(rev, Utc::now()).unwrap_err();
        assert_eq!(
            err,
            OfficerError::InvalidTransition {
                from: OfficerStatus::Pending,
                to: OfficerStatus::InSeminar,
            }
        );
        assert_eq!(r.status, OfficerStatus::Pending);
        assert!(r.transitions.is_empty());
    }

    #[test]
    fn reject_from_mid_pipeline() {
        let mut r = request();
        let rev = UserId::new();
        r.approve_seminar(rev, Utc::now()).unwrap();
        r.reject("did not meet requirements", rev, Utc::now()).unwrap();
        assert_eq!(r.status, OfficerStatus::Rejected);
        assert_eq!(r.rejection_reason.as_deref(), Some("did not meet requirements"));
    }

    #[test]
    fn reject_requires_reason() {
        let mut r = request();
        assert_eq!(
            r.reject("  ", UserId::new(), Utc::now()).unwrap_err(),
            OfficerError::EmptyReason
        );
        assert_eq!(r.status, OfficerStatus::Pending);
    }

    #[test]
    fn cancel_from_any_non_terminal() {
        let (mut r, rev) = at_ready_to_oath();
        r.cancel(rev, Utc::now()).unwrap();
        assert_eq!(r.status, OfficerStatus::Cancelled);

        let err = r.cancel(rev, Utc::now()).unwrap_err();
        assert!(matches!(err, OfficerError::Terminal { .. }));
    }

    #[test]
    fn terminal_states_are_frozen() {
        let mut r = request();
        let rev = UserId::new();
        r.reject("no", rev, Utc::now()).unwrap();
        assert!(matches!(
            r.approve_seminar(rev, Utc::now()).unwrap_err(),
            OfficerError::Terminal { .. }
        ));
        assert!(matches!(
            r.set_code(RecordCode::A, None).unwrap_err(),
            OfficerError::Terminal { .. }
        ));
    }

    #[test]
    fn seminar_sessions_append_in_order() {
        let mut r = request();
        r.add_seminar_date(NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(), "hall A")
            .unwrap();
        r.add_seminar_date(NaiveDate::from_ymd_opt(2025, 2, 8).unwrap(), "hall B")
            .unwrap();
        assert_eq!(r.seminar_sessions.len(), 2);
        assert_eq!(r.seminar_sessions[0].location, "hall A");
        assert!(!r.seminar_sessions[0].attended);
    }

    #[test]
    fn attendance_marked_at_index() {
        let mut r = request();
        let marker = UserId::new();
        r.add_seminar_date(NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(), "hall A")
            .unwrap();
        r.add_seminar_date(NaiveDate::from_ymd_opt(2025, 2, 8).unwrap(), "hall A")
            .unwrap();

        r.mark_attendance(1, true, marker).unwrap();
        assert!(!r.seminar_sessions[0].attended);
        assert!(r.seminar_sessions[1].attended);
        assert_eq!(r.seminar_sessions[1].marked_by, Some(marker));
        assert_eq!(r.attended_days(), 1);
    }

    #[test]
    fn attendance_index_out_of_range() {
        let mut r = request();
        let err = r.mark_attendance(0, true, UserId::new()).unwrap_err();
        assert_eq!(
            err,
            OfficerError::AttendanceIndexOutOfRange { index: 0, len: 0 }
        );
    }

    #[test]
    fn attendance_count_never_advances_status() {
        let mut r = request();
        let rev = UserId::new();
        r.approve_seminar(rev, Utc::now()).unwrap();
        r.mark_in_seminar(rev, Utc::now()).unwrap();
        for day in 1..=5 {
            r.add_seminar_date(NaiveDate::from_ymd_opt(2025, 2, day).unwrap(), "hall A")
                .unwrap();
            r.mark_attendance((day - 1) as usize, true, rev).unwrap();
        }
        // Past the required threshold, still in seminar until a reviewer
        // says otherwise.
        assert!(r.attended_days() as u32 > r.required_seminar_days);
        assert_eq!(r.status, OfficerStatus::InSeminar);
    }

    #[test]
    fn code_d_requires_existing_identity() {
        let mut r = request();
        assert_eq!(
            r.set_code(RecordCode::D, None).unwrap_err(),
            OfficerError::MissingExistingOfficer
        );
        r.set_code(RecordCode::D, Some(OfficerId::new())).unwrap();
    }

    #[test]
    fn code_a_forbids_existing_identity() {
        let mut r = request();
        assert_eq!(
            r.set_code(RecordCode::A, Some(OfficerId::new())).unwrap_err(),
            OfficerError::UnexpectedExistingOfficer
        );
    }

    #[test]
    fn oath_without_code_is_rejected_and_harmless() {
        let (mut r, rev) = at_ready_to_oath();
        let before = r.clone();
        assert_eq!(
            r.complete_oath(rev, Utc::now()).unwrap_err(),
            OfficerError::CodeNotSet
        );
        assert_eq!(r, before);
    }

    #[test]
    fn oath_before_ready_is_rejected() {
        let mut r = request();
        r.set_code(RecordCode::A, None).unwrap();
        assert!(matches!(
            r.complete_oath(UserId::new(), Utc::now()).unwrap_err(),
            OfficerError::InvalidTransition { .. }
        ));
    }

    #[test]
    fn code_a_completion_yields_new_identity() {
        let (mut r, rev) = at_ready_to_oath();
        r.set_code(RecordCode::A, None).unwrap();
        let now = Utc::now();

        let d = r.complete_oath(rev, now).unwrap();
        assert_eq!(d, OathDisposition::NewIdentity);
        assert_eq!(r.status, OfficerStatus::OathTaken);
        assert_eq!(r.completed_by, Some(rev));
        assert_eq!(r.completed_at, Some(now));
    }

    #[test]
    fn code_d_completion_yields_merge_target() {
        let (mut r, rev) = at_ready_to_oath();
        let target = OfficerId::new();
        r.set_code(RecordCode::D, Some(target)).unwrap();

        let d = r.complete_oath(rev, Utc::now()).unwrap();
        assert_eq!(d, OathDisposition::MergeInto(target));
    }

    #[test]
    fn completed_request_takes_no_further_oath() {
        let (mut r, rev) = at_ready_to_oath();
        r.set_code(RecordCode::A, None).unwrap();
        r.complete_oath(rev, Utc::now()).unwrap();
        assert!(matches!(
            r.complete_oath(rev, Utc::now()).unwrap_err(),
            OfficerError::Terminal { .. }
        ));
    }

    #[test]
    fn reactivation_relocates_and_appends() {
        let mut o = Officer::materialize(
            TenantScope::new("D1", "L1"),
            "enc:old".to_string(),
            assignment("records", "archivist"),
            Utc::now(),
        );
        o.is_active = false;

        o.reactivate_into(TenantScope::new("D2", "L5"), assignment("records", "clerk"));
        assert!(o.is_active);
        assert_eq!(o.scope, TenantScope::new("D2", "L5"));
        assert_eq!(o.assignments.len(), 2);
    }

    #[test]
    fn merge_skips_exact_role_duty_duplicates() {
        let now = Utc::now();
        let mut primary = Officer::materialize(
            TenantScope::new("D1", "L1"),
            "enc:a".to_string(),
            assignment("records", "archivist"),
            now,
        );
        let mut duplicate = Officer::materialize(
            TenantScope::new("D1", "L1"),
            "enc:b".to_string(),
            assignment("records", "archivist"),
            now,
        );
        duplicate
            .assignments
            .push(assignment("outreach", "coordinator"));

        primary.merge_assignments_from(&duplicate);
        assert_eq!(primary.assignments.len(), 2);
        assert_eq!(primary.assignments[1].role, "outreach");
    }
}
