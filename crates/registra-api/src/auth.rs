//! # Session Authentication and Anti-Forgery
//!
//! Every `/v1/*` call requires `Authorization: Bearer <session-token>`.
//! Mutating methods additionally require an `X-Csrf-Token` header matching
//! the session's anti-forgery token. Both comparisons are constant-time.
//!
//! The middleware resolves the session to an [`Actor`] and stashes it in
//! request extensions; handlers receive it through [`CurrentActor`]. Core
//! logic never reads ambient session state — the actor travels as an
//! explicit value from here down.

use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::{header, Method};
use axum::middleware::Next;
use axum::response::Response;
use subtle::ConstantTimeEq;

use registra_core::{Actor, Role, TenantScope, UserId};

use crate::error::AppError;

/// Header carrying the per-session anti-forgery token.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// An opaque session credential compared in constant time.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    /// Mint a fresh random token (256-bit, hex).
    pub fn mint() -> Self {
        let mut bytes = [0u8; 32];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
        Self(hex::encode(bytes))
    }

    /// Constant-time comparison against a presented credential.
    pub fn matches(&self, presented: &str) -> bool {
        self.0.as_bytes().ct_eq(presented.as_bytes()).into()
    }

    /// The raw token value, for handing to the client.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionToken(..)")
    }
}

/// An authenticated session: bearer token, anti-forgery token, actor.
#[derive(Debug, Clone)]
pub struct Session {
    /// Bearer credential.
    pub token: SessionToken,
    /// Anti-forgery token required on mutating calls.
    pub csrf: SessionToken,
    /// The resolved caller.
    pub actor: Actor,
}

impl Session {
    /// Mint a session with fresh tokens.
    pub fn mint(actor: Actor) -> Self {
        Self {
            token: SessionToken::mint(),
            csrf: SessionToken::mint(),
            actor,
        }
    }
}

/// The authenticated caller, extracted from request extensions.
///
/// Present on every request that passed the auth middleware; extraction
/// fails with 401 otherwise.
#[derive(Debug, Clone)]
pub struct CurrentActor(pub Actor);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Actor>()
            .cloned()
            .map(CurrentActor)
            .ok_or_else(|| AppError::Unauthorized("no authenticated session".to_string()))
    }
}

fn is_mutating(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Middleware enforcing session auth and, for mutating methods, the
/// anti-forgery token.
pub async fn auth_middleware(mut request: Request, next: Next) -> Result<Response, AppError> {
    let state = request
        .extensions()
        .get::<crate::state::AppState>()
        .cloned()
        .ok_or_else(|| AppError::Internal("app state missing from request".to_string()))?;

    if state.config.auth_disabled {
        // Development mode: a fixed synthetic administrator, so audit
        // entries stay attributable to the bypass rather than a random id.
        let actor = Actor::new(
            UserId::from_uuid(uuid::Uuid::nil()),
            Role::Admin,
            TenantScope::new("dev", "dev"),
        );
        request.extensions_mut().insert(actor);
        return Ok(next.run(request).await);
    }

    let bearer = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;

    let session = state
        .actor_for_token(bearer)
        .ok_or_else(|| AppError::Unauthorized("invalid session token".to_string()))?;

    if is_mutating(request.method()) {
        let presented = request
            .headers()
            .get(CSRF_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Forbidden("missing anti-forgery token".to_string()))?;
        if !session.csrf.matches(presented) {
            return Err(AppError::Forbidden("anti-forgery token mismatch".to_string()));
        }
    }

    request.extensions_mut().insert(session.actor.clone());
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_tokens_differ() {
        assert!(!SessionToken::mint().matches(SessionToken::mint().expose()));
    }

    #[test]
    fn token_matches_itself() {
        let t = SessionToken::mint();
        assert!(t.matches(t.expose()));
    }

    #[test]
    fn mutating_method_detection() {
        assert!(!is_mutating(&Method::GET));
        assert!(!is_mutating(&Method::HEAD));
        assert!(is_mutating(&Method::POST));
        assert!(is_mutating(&Method::PUT));
        assert!(is_mutating(&Method::DELETE));
    }
}
