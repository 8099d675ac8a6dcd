use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{AppConfig, OAuthProviderConfig};

/// StateClaims
///
/// The CSRF `state` parameter of the authorization-code flow. Because no
/// server-side session exists, the state cannot be stashed and compared
/// later; instead it is itself a short-lived signed token. The callback
/// accepts a state only if the signature verifies, it has not expired, and
/// it names a registered provider.
#[derive(Debug, Serialize, Deserialize)]
struct StateClaims {
    // Random value making every login attempt's state unique.
    nonce: Uuid,
    // Which provider registration this flow was started against.
    provider: String,
    // Unix seconds. A login attempt must complete within the window.
    exp: usize,
}

// A browser round-trip through the provider comfortably fits in this window.
const STATE_TTL_SECS: usize = 600;

/// TokenExchangeResponse
///
/// Minimal view of the provider's token-endpoint response; only the access
/// token is needed to fetch the user-info document.
#[derive(Debug, Deserialize)]
struct TokenExchangeResponse {
    access_token: String,
}

/// ProviderIdentity
///
/// The normalized result of a provider's user-info document: the stable
/// subject identifier plus the profile attributes this service keeps.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderIdentity {
    pub subject: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

/// OAuth2Client
///
/// Drives the redirect-based authorization-code flow: building the
/// authorization URL (with a signed state), exchanging the returned code,
/// and fetching/normalizing the user-info document.
pub struct OAuth2Client {
    http: reqwest::Client,
    providers: Vec<OAuthProviderConfig>,
    redirect_uri: String,
    state_secret: String,
}

/// OAuthState
///
/// The shared handle stored in the application state.
pub type OAuthState = Arc<OAuth2Client>;

impl OAuth2Client {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            providers: config.providers.clone(),
            redirect_uri: config.redirect_uri(),
            state_secret: config.jwt_secret.clone(),
        }
    }

    /// Looks up a provider registration by the name used in the login URL.
    pub fn provider(&self, name: &str) -> Option<&OAuthProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }

    pub fn providers(&self) -> &[OAuthProviderConfig] {
        &self.providers
    }

    /// authorize_url
    ///
    /// Builds the provider authorization URL the browser is redirected to,
    /// including a freshly signed state token.
    pub fn authorize_url(&self, provider: &OAuthProviderConfig) -> Result<String, String> {
        let state = self.issue_state(&provider.name)?;

        let url = reqwest::Url::parse_with_params(
            &provider.auth_url,
            &[
                ("response_type", "code"),
                ("client_id", provider.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", provider.scopes.as_str()),
                ("state", state.as_str()),
            ],
        )
        .map_err(|e| format!("invalid auth_url for provider {}: {}", provider.name, e))?;

        Ok(url.to_string())
    }

    /// Signs the state token for a login attempt against `provider`.
    fn issue_state(&self, provider: &str) -> Result<String, String> {
        let claims = StateClaims {
            nonce: Uuid::new_v4(),
            provider: provider.to_string(),
            exp: chrono::Utc::now().timestamp() as usize + STATE_TTL_SECS,
        };

        let key = EncodingKey::from_secret(self.state_secret.as_bytes());
        encode(&Header::default(), &claims, &key).map_err(|e| format!("state signing: {}", e))
    }

    /// verify_state
    ///
    /// Validates the state returned by the provider and resolves it back to
    /// the provider registration the flow was started against.
    pub fn verify_state(&self, state: &str) -> Result<&OAuthProviderConfig, String> {
        let key = DecodingKey::from_secret(self.state_secret.as_bytes());
        let validation = Validation::default();

        let data = decode::<StateClaims>(state, &key, &validation)
            .map_err(|e| format!("state rejected: {}", e))?;

        self.provider(&data.claims.provider)
            .ok_or_else(|| format!("state names unknown provider {}", data.claims.provider))
    }

    /// exchange_code
    ///
    /// Exchanges the authorization code for the provider's access token.
    /// The explicit `Accept: application/json` matters: GitHub answers in
    /// form encoding without it.
    pub async fn exchange_code(
        &self,
        provider: &OAuthProviderConfig,
        code: &str,
    ) -> Result<String, String> {
        let response = self
            .http
            .post(&provider.token_url)
            .header("Accept", "application/json")
            .form(&[
                ("grant_type", "authorization_code"),
                ("client_id", provider.client_id.as_str()),
                ("client_secret", provider.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| format!("token endpoint unreachable: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("token exchange failed ({}): {}", status, body));
        }

        let tokens: TokenExchangeResponse = response
            .json()
            .await
            .map_err(|e| format!("token response parse: {}", e))?;

        Ok(tokens.access_token)
    }

    /// fetch_identity
    ///
    /// Retrieves the provider's user-info document and maps it onto the
    /// local identity shape. This is the user-service half of the login
    /// flow: whatever the provider calls its fields, the rest of the
    /// application only ever sees a `ProviderIdentity`.
    pub async fn fetch_identity(
        &self,
        provider: &OAuthProviderConfig,
        access_token: &str,
    ) -> Result<ProviderIdentity, String> {
        let response = self
            .http
            .get(&provider.userinfo_url)
            .bearer_auth(access_token)
            // GitHub's API rejects requests without a User-Agent.
            .header("User-Agent", "auth-portal")
            .send()
            .await
            .map_err(|e| format!("userinfo endpoint unreachable: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("userinfo request failed ({})", response.status()));
        }

        let raw: serde_json::Value = response
            .json()
            .await
            .map_err(|e| format!("userinfo parse: {}", e))?;

        normalize_identity(&raw).ok_or_else(|| "userinfo document has no usable subject".to_string())
    }
}

/// normalize_identity
///
/// Maps a raw user-info document onto `ProviderIdentity`. Providers disagree
/// on field names: OIDC-style endpoints report `sub`, Google's v2 endpoint
/// and GitHub report `id` (GitHub's as a number). The subject is required;
/// everything else is best-effort.
fn normalize_identity(raw: &serde_json::Value) -> Option<ProviderIdentity> {
    let subject = match raw.get("sub").or_else(|| raw.get("id"))? {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => return None,
    };

    let email = raw
        .get("email")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    // GitHub reports `login` when the display name is unset.
    let display_name = raw
        .get("name")
        .or_else(|| raw.get("login"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    Some(ProviderIdentity {
        subject,
        email,
        display_name,
    })
}
