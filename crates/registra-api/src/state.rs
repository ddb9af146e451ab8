//! # Application State
//!
//! Shared state for all handlers: configuration, the in-memory stores, the
//! tenant keyring and field cipher, the audit trail, and the optional
//! Postgres pool for write-through persistence.
//!
//! The stores are authoritative at runtime; the database (when configured)
//! is hydrated from at startup and written through on every mutation.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use sqlx::PgPool;

use registra_core::{
    Actor, DocumentId, GrantId, OfficerId, OfficerRequestId, RequestId, TenantScope,
};
use registra_crypto::{FieldCipher, Keyring, MasterSecret, TenantSecret};
use registra_workflow::{AccessGrant, AccessRequest, DocumentGrant, Officer, OfficerRequest};

use crate::audit::AuditTrail;
use crate::auth::{Session, SessionToken};

/// Generic concurrent keyed store backed by a `parking_lot` RwLock.
///
/// `try_update` is the atomic read-validate-write primitive: the closure
/// runs on a clone of the record under the write lock, and the result is
/// committed only when the closure succeeds. A failing closure leaves the
/// stored record untouched.
pub struct Store<K, V> {
    inner: Arc<RwLock<HashMap<K, V>>>,
}

impl<K, V> Clone for Store<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> Default for Store<K, V> {
    fn default() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<K, V> Store<K, V>
where
    K: std::hash::Hash + Eq + Clone,
    V: Clone,
{
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record.
    pub fn insert(&self, key: K, value: V) {
        self.inner.write().insert(key, value);
    }

    /// Fetch a record by key (cloned).
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.read().get(key).cloned()
    }

    /// Remove a record.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.inner.write().remove(key)
    }

    /// All records (cloned, unordered).
    pub fn list(&self) -> Vec<V> {
        self.inner.read().values().cloned().collect()
    }

    /// The first record matching a predicate.
    pub fn find(&self, pred: impl Fn(&V) -> bool) -> Option<V> {
        self.inner.read().values().find(|v| pred(v)).cloned()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Insert `value` unless an existing record matches `conflict`, all
    /// under one write lock. Closes the duplicate-submit race in in-memory
    /// mode; the SQL layer closes it with a partial unique index.
    pub fn insert_unless(&self, key: K, value: V, conflict: impl Fn(&V) -> bool) -> bool {
        let mut map = self.inner.write();
        if map.values().any(|v| conflict(v)) {
            return false;
        }
        map.insert(key, value);
        true
    }

    /// Atomically update the record at `key` under the write lock.
    ///
    /// The closure mutates a clone; the clone replaces the stored record
    /// only on `Ok`. Returns `None` when the key is absent.
    pub fn try_update<T, E>(
        &self,
        key: &K,
        f: impl FnOnce(&mut V) -> Result<T, E>,
    ) -> Option<Result<T, E>> {
        let mut map = self.inner.write();
        let stored = map.get_mut(key)?;
        let mut candidate = stored.clone();
        match f(&mut candidate) {
            Ok(out) => {
                *stored = candidate;
                Some(Ok(out))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// Service configuration, collected by the binary from flags and env.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Whether the master key was generated at startup rather than loaded
    /// from configuration. Encrypted fields do not survive a restart in
    /// this mode; exposed as a gauge so operators notice.
    pub master_key_ephemeral: bool,
    /// Local development only: skip session checks and act as a synthetic
    /// administrator.
    pub auth_disabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            master_key_ephemeral: true,
            auth_disabled: false,
        }
    }
}

/// Shared application state. Cheap to clone; all stores are `Arc`-backed.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    /// Registry access requests.
    pub requests: Store<RequestId, AccessRequest>,
    /// Derived capability grants.
    pub grants: Store<GrantId, AccessGrant>,
    /// Confidential document grants.
    pub documents: Store<DocumentId, DocumentGrant>,
    /// Rendered confidential artifacts, keyed by document grant id.
    pub blobs: Store<DocumentId, String>,
    /// Officer credentialing requests.
    pub officer_requests: Store<OfficerRequestId, OfficerRequest>,
    /// Officer identities.
    pub officers: Store<OfficerId, Officer>,
    /// Per-local-congregation officer headcounts.
    pub headcounts: Store<TenantScope, i64>,
    /// Authenticated sessions, keyed by bearer token.
    pub sessions: Store<SessionToken, Session>,
    /// Append-only audit trail.
    pub audit: AuditTrail,
    /// Per-district tenant secrets.
    pub keyring: Arc<Keyring>,
    /// Tenant field cipher around the master secret.
    pub cipher: Arc<FieldCipher>,
    /// Optional Postgres pool; `None` means in-memory only.
    pub db_pool: Option<PgPool>,
}

impl AppState {
    /// In-memory state with an ephemeral master key. Used by tests and by
    /// the binary's development mode.
    pub fn new() -> Self {
        Self::with_master(MasterSecret::generate(), true)
    }

    /// State around a configured master secret.
    pub fn with_master(master: MasterSecret, ephemeral: bool) -> Self {
        Self {
            config: AppConfig {
                master_key_ephemeral: ephemeral,
                auth_disabled: false,
            },
            requests: Store::new(),
            grants: Store::new(),
            documents: Store::new(),
            blobs: Store::new(),
            officer_requests: Store::new(),
            officers: Store::new(),
            headcounts: Store::new(),
            sessions: Store::new(),
            audit: AuditTrail::new(),
            keyring: Arc::new(Keyring::new()),
            cipher: Arc::new(FieldCipher::new(master)),
            db_pool: None,
        }
    }

    /// Attach a database pool for write-through persistence.
    pub fn with_pool(mut self, pool: PgPool) -> Self {
        self.db_pool = Some(pool);
        self
    }

    /// Disable session checks. Development only; every call runs as a
    /// synthetic administrator.
    pub fn with_auth_disabled(mut self) -> Self {
        self.config.auth_disabled = true;
        self
    }

    /// Provision a fresh tenant secret for a district if none exists yet.
    pub fn ensure_district(&self, district: &str) {
        if self.keyring.secret_for(district).is_err() {
            self.keyring.provision(district, TenantSecret::generate());
        }
    }

    /// Create a session for `actor` and return its bearer and anti-forgery
    /// tokens. Cookie plumbing lives outside this service; callers carry
    /// the tokens in headers.
    pub fn issue_session(&self, actor: Actor) -> Session {
        let session = Session::mint(actor);
        self.sessions.insert(session.token.clone(), session.clone());
        session
    }

    /// Current headcount for a scope.
    pub fn headcount(&self, scope: &TenantScope) -> i64 {
        self.headcounts.get(scope).unwrap_or(0)
    }

    /// Adjust the headcount for a scope by `delta`.
    pub fn bump_headcount(&self, scope: &TenantScope, delta: i64) {
        let current = self.headcounts.get(scope).unwrap_or(0);
        self.headcounts.insert(scope.clone(), current + delta);
    }

    /// Look up the actor behind a bearer token.
    pub fn actor_for_token(&self, token: &str) -> Option<Session> {
        // Constant-time comparison over the session set; the token is the
        // credential, so a HashMap probe's timing must not leak prefixes.
        self.sessions
            .find(|s| s.token.matches(token))
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_update_commits_on_ok() {
        let store: Store<u32, String> = Store::new();
        store.insert(1, "a".to_string());
        let out = store
            .try_update(&1, |v| {
                v.push('b');
                Ok::<_, ()>(v.clone())
            })
            .unwrap()
            .unwrap();
        assert_eq!(out, "ab");
        assert_eq!(store.get(&1).unwrap(), "ab");
    }

    #[test]
    fn try_update_rolls_back_on_err() {
        let store: Store<u32, String> = Store::new();
        store.insert(1, "a".to_string());
        let res = store
            .try_update(&1, |v| {
                v.push('b');
                Err::<(), _>("validation failed")
            })
            .unwrap();
        assert!(res.is_err());
        assert_eq!(store.get(&1).unwrap(), "a", "failed update must not commit");
    }

    #[test]
    fn try_update_missing_key() {
        let store: Store<u32, String> = Store::new();
        assert!(store.try_update(&9, |_| Ok::<(), ()>(())).is_none());
    }

    #[test]
    fn insert_unless_blocks_conflicts() {
        let store: Store<u32, String> = Store::new();
        assert!(store.insert_unless(1, "first".to_string(), |v| v == "first"));
        assert!(!store.insert_unless(2, "first".to_string(), |v| v == "first"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn headcount_defaults_to_zero_and_accumulates() {
        let state = AppState::new();
        let scope = TenantScope::new("D1", "L1");
        assert_eq!(state.headcount(&scope), 0);
        state.bump_headcount(&scope, 1);
        state.bump_headcount(&scope, 1);
        assert_eq!(state.headcount(&scope), 2);
    }

    #[test]
    fn ensure_district_is_idempotent() {
        let state = AppState::new();
        state.ensure_district("D1");
        let first = state.keyring.secret_for("D1").unwrap();
        state.ensure_district("D1");
        let second = state.keyring.secret_for("D1").unwrap();
        // Same secret: re-provisioning would orphan existing ciphertext.
        let probe = state.cipher.encrypt("probe", "D1", &first).unwrap();
        assert_eq!(state.cipher.decrypt(&probe, "D1", &second).unwrap(), "probe");
    }
}
