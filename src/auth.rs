use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, header, request::Parts},
};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    repository::RepositoryState,
    token::TokenService,
};

/// AuthUser
///
/// The resolved identity of an authenticated request: the output of the
/// bearer-token verification that runs before every protected handler.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The unique identifier of the user, mapped to `users.id`.
    pub id: Uuid,
    /// Email as recorded on the user row at verification time.
    pub email: String,
}

/// AuthUser Extractor Implementation
///
/// Implements Axum's `FromRequestParts`, making `AuthUser` usable as an
/// argument of any protected handler and as the guard inside the route-layer
/// middleware. Verification is fully stateless: the request must carry its
/// own credential, nothing is read from or written to a session.
///
/// Steps:
/// 1. Local-only bypass via the `x-user-id` header (never in production).
/// 2. Bearer token extraction from the Authorization header.
/// 3. Signature and expiry validation of the JWT.
/// 4. Database lookup confirming the subject still maps to a live user.
///
/// Rejection: `401 Unauthorized` on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        // Development bypass: in Env::Local a known user id in `x-user-id`
        // stands in for a token. The id must still resolve to a real row.
        if config.env == Env::Local {
            if let Some(user_id_header) = parts.headers.get("x-user-id") {
                if let Ok(id_str) = user_id_header.to_str() {
                    if let Ok(user_id) = Uuid::parse_str(id_str) {
                        if let Some(user) = repo.get_user(user_id).await {
                            return Ok(AuthUser {
                                id: user.id,
                                email: user.email,
                            });
                        }
                    }
                }
            }
        }
        // In production, or when the bypass does not resolve, fall through
        // to standard bearer-token verification.

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let claims = TokenService::new(&config).verify(token).map_err(|e| {
            // Expired tokens are routine; anything else is worth a trace.
            tracing::debug!("token rejected: {:?}", e.kind());
            StatusCode::UNAUTHORIZED
        })?;

        // The token may outlive the account. A deleted user's otherwise
        // valid token must not authenticate.
        let user = repo
            .get_user(claims.sub)
            .await
            .ok_or(StatusCode::UNAUTHORIZED)?;

        Ok(AuthUser {
            id: user.id,
            email: user.email,
        })
    }
}
