//! Confidential document lifecycle.
//!
//! A [`DocumentGrant`] protects one rendered confidential artifact with a
//! time-boxed open/lock/delete lifecycle:
//!
//! ```text
//! Approved&Unopened ──open──▶ Opened(<7d) ──▶ Locked(≥7d) ──▶ Deleted(≥30d)
//! ```
//!
//! Transitions are evaluated lazily on each access attempt; there is no
//! background scheduler. A grant that is never reopened stays
//! `Approved&Unopened` forever — only elapsed time since *first open*
//! drives locking and deletion. The attempt that crosses a threshold is
//! itself denied.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use registra_core::{DocumentId, RequestId, TenantScope, UserId};

/// Days a document stays openable after its first open.
pub const VIEW_WINDOW_DAYS: i64 = 7;
/// Days from first open until the artifact is deleted.
pub const RETENTION_DAYS: i64 = 30;

/// The lifecycle stage a grant's persisted fields place it in.
///
/// Derived from stored state only, never from the clock: a grant past a
/// threshold that has not been accessed since still reports its last
/// persisted stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Approved, never opened.
    ApprovedUnopened,
    /// Opened within the viewing window.
    Opened,
    /// Locked after the viewing window closed.
    Locked,
    /// Tombstoned; the artifact is gone.
    Deleted,
}

impl LifecycleState {
    /// Stable string form, used as a metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApprovedUnopened => "approved_unopened",
            Self::Opened => "opened",
            Self::Locked => "locked",
            Self::Deleted => "deleted",
        }
    }
}

/// Outcome of a permitted open attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    /// First open; the retention clock starts now.
    FirstOpen,
    /// Reopened inside the viewing window.
    Reopened,
}

/// Outcome of a permitted print attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintOutcome {
    /// First print; `printed_at` was set.
    FirstPrint,
    /// Already printed; nothing changed, the attempt is log-only.
    AlreadyPrinted,
}

/// Denials from the document lifecycle.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DocumentError {
    /// The viewing window has closed. Terminal for this document.
    #[error("document is locked; the viewing window closed {locked_at}")]
    Locked {
        /// When the lock took effect.
        locked_at: DateTime<Utc>,
    },

    /// The retention window has passed and the grant is tombstoned.
    /// Terminal for this document.
    #[error("document grant has expired")]
    Expired,
}

/// A grant over one rendered confidential document.
///
/// Specializes the access-request record with the lifecycle fields; the
/// grant id doubles as the blob-store key for the artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentGrant {
    /// Unique identifier and blob-store key.
    pub id: DocumentId,
    /// The approved request this grant derives from.
    pub request_id: RequestId,
    /// The grant holder.
    pub user_id: UserId,
    /// The holder's tenant scope.
    pub scope: TenantScope,
    /// When the underlying request was approved.
    pub approved_at: DateTime<Utc>,
    /// When the document was first opened; unset until then.
    pub first_opened_at: Option<DateTime<Utc>>,
    /// Whether the viewing window has closed.
    pub is_locked: bool,
    /// When the lock took effect.
    pub locked_at: Option<DateTime<Utc>>,
    /// Exactly `first_opened_at + 30 days`; unset until first open.
    pub will_delete_at: Option<DateTime<Utc>>,
    /// Whether the document has ever been printed.
    pub has_printed: bool,
    /// When the first print happened.
    pub printed_at: Option<DateTime<Utc>>,
    /// Tombstone marker; set when the retention window lapses.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl DocumentGrant {
    /// Issue a grant for a freshly approved document request.
    pub fn issue(
        request_id: RequestId,
        user_id: UserId,
        scope: TenantScope,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: DocumentId::new(),
            request_id,
            user_id,
            scope,
            approved_at: now,
            first_opened_at: None,
            is_locked: false,
            locked_at: None,
            will_delete_at: None,
            has_printed: false,
            printed_at: None,
            deleted_at: None,
        }
    }

    /// Whether the grant is tombstoned.
    pub fn is_tombstoned(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// The lifecycle stage per persisted fields.
    pub fn state(&self) -> LifecycleState {
        if self.is_tombstoned() {
            LifecycleState::Deleted
        } else if self.is_locked {
            LifecycleState::Locked
        } else if self.first_opened_at.is_some() {
            LifecycleState::Opened
        } else {
            LifecycleState::ApprovedUnopened
        }
    }

    /// Evaluate an open attempt at `now`, advancing lifecycle state as a
    /// side effect.
    ///
    /// Checked in order:
    /// 1. tombstoned, or past `first_opened_at + 30d` — tombstone if not
    ///    already, deny [`DocumentError::Expired`];
    /// 2. never opened — start the clock (`first_opened_at = now`,
    ///    `will_delete_at = now + 30d`), allow;
    /// 3. locked, or ≥ 7d since first open — lock if not already, deny
    ///    [`DocumentError::Locked`];
    /// 4. otherwise allow.
    pub fn on_open_attempt(&mut self, now: DateTime<Utc>) -> Result<OpenOutcome, DocumentError> {
        if self.is_tombstoned() {
            return Err(DocumentError::Expired);
        }
        if let Some(first) = self.first_opened_at {
            if now >= first + Duration::days(RETENTION_DAYS) {
                self.deleted_at = Some(now);
                return Err(DocumentError::Expired);
            }
            if self.is_locked {
                return Err(DocumentError::Locked {
                    locked_at: self.locked_at.unwrap_or(now),
                });
            }
            if now >= first + Duration::days(VIEW_WINDOW_DAYS) {
                self.is_locked = true;
                self.locked_at = Some(now);
                return Err(DocumentError::Locked { locked_at: now });
            }
            Ok(OpenOutcome::Reopened)
        } else {
            self.first_opened_at = Some(now);
            self.will_delete_at = Some(now + Duration::days(RETENTION_DAYS));
            Ok(OpenOutcome::FirstOpen)
        }
    }

    /// Evaluate a print attempt at `now`.
    ///
    /// Runs the same lifecycle gate as an open (and advances state the same
    /// way). `printed_at` is set once, by the first print; later attempts
    /// succeed but change nothing and are distinguishable for access
    /// logging.
    pub fn on_print_attempt(&mut self, now: DateTime<Utc>) -> Result<PrintOutcome, DocumentError> {
        self.on_open_attempt(now)?;
        if self.has_printed {
            return Ok(PrintOutcome::AlreadyPrinted);
        }
        self.has_printed = true;
        self.printed_at = Some(now);
        Ok(PrintOutcome::FirstPrint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(approved_at: DateTime<Utc>) -> DocumentGrant {
        DocumentGrant::issue(
            RequestId::new(),
            UserId::new(),
            TenantScope::new("D1", "L1"),
            approved_at,
        )
    }

    fn days(n: i64) -> Duration {
        Duration::days(n)
    }

    #[test]
    fn first_open_starts_the_clock() {
        let t0 = Utc::now();
        let mut g = grant(t0);
        let opened = t0 + days(1);

        assert_eq!(g.on_open_attempt(opened).unwrap(), OpenOutcome::FirstOpen);
        assert_eq!(g.first_opened_at, Some(opened));
        assert_eq!(g.will_delete_at, Some(opened + days(30)));
        assert_eq!(g.state(), LifecycleState::Opened);
    }

    #[test]
    fn reopen_within_window_allows() {
        let t0 = Utc::now();
        let mut g = grant(t0);
        g.on_open_attempt(t0).unwrap();
        assert_eq!(
            g.on_open_attempt(t0 + days(6)).unwrap(),
            OpenOutcome::Reopened
        );
        assert!(!g.is_locked);
    }

    #[test]
    fn never_opened_grant_does_not_age() {
        // Lazy evaluation: time alone never advances state.
        let t0 = Utc::now();
        let mut g = grant(t0);
        assert_eq!(g.state(), LifecycleState::ApprovedUnopened);

        // First access a year later still succeeds as a first open.
        assert_eq!(
            g.on_open_attempt(t0 + days(365)).unwrap(),
            OpenOutcome::FirstOpen
        );
    }

    #[test]
    fn crossing_attempt_is_itself_denied() {
        let t0 = Utc::now();
        let mut g = grant(t0);
        g.on_open_attempt(t0).unwrap();

        let err = g.on_open_attempt(t0 + days(7)).unwrap_err();
        assert!(matches!(err, DocumentError::Locked { .. }));
        assert!(g.is_locked);
        assert_eq!(g.locked_at, Some(t0 + days(7)));
        assert_eq!(g.state(), LifecycleState::Locked);
    }

    #[test]
    fn locked_grant_stays_denied_without_moving_locked_at() {
        let t0 = Utc::now();
        let mut g = grant(t0);
        g.on_open_attempt(t0).unwrap();
        g.on_open_attempt(t0 + days(8)).unwrap_err();
        let locked_at = g.locked_at;

        let err = g.on_open_attempt(t0 + days(9)).unwrap_err();
        assert!(matches!(err, DocumentError::Locked { .. }));
        assert_eq!(g.locked_at, locked_at);
    }

    #[test]
    fn retention_lapse_tombstones() {
        let t0 = Utc::now();
        let mut g = grant(t0);
        g.on_open_attempt(t0).unwrap();

        let err = g.on_open_attempt(t0 + days(30)).unwrap_err();
        assert_eq!(err, DocumentError::Expired);
        assert!(g.is_tombstoned());
        assert_eq!(g.state(), LifecycleState::Deleted);

        // Terminal: later attempts stay expired.
        assert_eq!(g.on_open_attempt(t0 + days(31)).unwrap_err(), DocumentError::Expired);
    }

    #[test]
    fn full_lifecycle_scenario() {
        // Approved at T0, opened at T0+1d, denied locked at T0+8d, denied
        // expired and tombstoned at T0+31d.
        let t0 = Utc::now();
        let mut g = grant(t0);

        assert_eq!(g.on_open_attempt(t0 + days(1)).unwrap(), OpenOutcome::FirstOpen);

        let err = g.on_open_attempt(t0 + days(8)).unwrap_err();
        assert!(matches!(err, DocumentError::Locked { .. }));
        assert!(g.is_locked);

        let err = g.on_open_attempt(t0 + days(31)).unwrap_err();
        assert_eq!(err, DocumentError::Expired);
        assert!(g.is_tombstoned());
    }

    #[test]
    fn lock_and_delete_offsets_hold() {
        let t0 = Utc::now();
        let mut g = grant(t0);
        let first = t0 + days(2);
        g.on_open_attempt(first).unwrap();
        g.on_open_attempt(first + days(9)).unwrap_err();

        assert_eq!(g.will_delete_at, Some(first + days(30)));
        assert!(g.locked_at.unwrap() >= first + days(7));
    }

    #[test]
    fn print_is_recorded_once() {
        let t0 = Utc::now();
        let mut g = grant(t0);
        g.on_open_attempt(t0).unwrap();

        assert_eq!(g.on_print_attempt(t0 + days(1)).unwrap(), PrintOutcome::FirstPrint);
        assert!(g.has_printed);
        assert_eq!(g.printed_at, Some(t0 + days(1)));

        assert_eq!(
            g.on_print_attempt(t0 + days(2)).unwrap(),
            PrintOutcome::AlreadyPrinted
        );
        assert_eq!(g.printed_at, Some(t0 + days(1)));
    }

    #[test]
    fn print_runs_the_lifecycle_gate() {
        let t0 = Utc::now();
        let mut g = grant(t0);
        g.on_open_attempt(t0).unwrap();

        let err = g.on_print_attempt(t0 + days(10)).unwrap_err();
        assert!(matches!(err, DocumentError::Locked { .. }));
        assert!(!g.has_printed);
    }

    #[test]
    fn unopened_print_counts_as_first_open() {
        let t0 = Utc::now();
        let mut g = grant(t0);
        assert_eq!(g.on_print_attempt(t0).unwrap(), PrintOutcome::FirstPrint);
        assert_eq!(g.first_opened_at, Some(t0));
    }
}
