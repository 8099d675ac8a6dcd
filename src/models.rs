use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// Canonical identity record in the `users` table. A user is created (or
/// refreshed) the first time an OAuth2 login for a given `(provider, subject)`
/// pair succeeds; that pair is the unique external identity key.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow, Default)]
pub struct User {
    pub id: Uuid,
    // Name of the identity provider that authenticated this user ("google", ...).
    pub provider: String,
    // The provider's stable identifier for the user (`sub`/`id` claim).
    pub subject: String,
    pub email: String,
    // Human-readable name as reported by the provider, when available.
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
    // Refreshed on every successful OAuth2 login.
    pub last_login: DateTime<Utc>,
}

/// UserProfile
///
/// The authenticated user's own view of their record, returned by `GET /me`.
/// Omits internal bookkeeping fields.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub provider: String,
}

// --- Token Payloads ---

/// TokenResponse
///
/// The issued credential, returned by the success handler redirect and the
/// refresh endpoint. Mirrors the OAuth2 bearer-token response shape.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct TokenResponse {
    pub access_token: String,
    // Always "Bearer".
    pub token_type: String,
    // Seconds until the token expires.
    pub expires_in: u64,
}

/// TokenRequest
///
/// Input payload for the public token utility endpoints
/// (`POST /token/validate`, `POST /token/refresh`).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct TokenRequest {
    pub token: String,
}

/// TokenClaimsResponse
///
/// The decoded claims of a valid token, returned by `POST /token/validate`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenClaimsResponse {
    // The user id the token was issued for.
    pub sub: Uuid,
    pub email: String,
    // Unix timestamps, seconds.
    pub iat: usize,
    pub exp: usize,
}
