use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    models::{TokenResponse, User},
};

/// Claims
///
/// Payload of every access token issued by this service. Signed with the
/// server secret (HS256) and validated on every authenticated request.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the UUID of the user, used to resolve the principal.
    pub sub: Uuid,
    /// Email at issue time. Informational; the `users` row stays authoritative.
    pub email: String,
    /// Issued-at, Unix seconds.
    pub iat: usize,
    /// Expiration, Unix seconds. Tokens past this point are rejected.
    pub exp: usize,
}

/// TokenService
///
/// Mints and verifies access tokens. This is the whole of the server's
/// session machinery: there is no server-side session store, so a token is
/// self-contained proof of a past successful login.
#[derive(Clone)]
pub struct TokenService {
    secret: String,
    ttl_secs: u64,
}

impl TokenService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            secret: config.jwt_secret.clone(),
            ttl_secs: config.token_ttl_secs,
        }
    }

    /// issue
    ///
    /// Signs a fresh access token for the given user, valid for the
    /// configured TTL from now.
    pub fn issue(&self, user: &User) -> Result<TokenResponse, jsonwebtoken::errors::Error> {
        let now = Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            iat: now,
            exp: now + self.ttl_secs as usize,
        };

        let key = EncodingKey::from_secret(self.secret.as_bytes());
        let access_token = encode(&Header::default(), &claims, &key)?;

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.ttl_secs,
        })
    }

    /// verify
    ///
    /// Decodes a presented token, checking the signature and expiration.
    /// Any failure (tampered, malformed, expired) surfaces as an error the
    /// caller maps to 401.
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let key = DecodingKey::from_secret(self.secret.as_bytes());

        let mut validation = Validation::default();
        validation.validate_exp = true;

        let data = decode::<Claims>(token, &key, &validation)?;
        Ok(data.claims)
    }
}
