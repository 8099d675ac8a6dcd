use crate::{
    AppState,
    auth::AuthUser,
    models::{TokenClaimsResponse, TokenRequest, TokenResponse, UserProfile},
    token::TokenService,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, Redirect},
};
use serde::Deserialize;

// --- Query Structs ---

/// LoginPageQuery
///
/// Query parameters of the login page. `error` carries the slug of a failed
/// attempt so the page can surface it.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct LoginPageQuery {
    pub error: Option<String>,
}

/// CallbackQuery
///
/// What the provider sends back to the redirect URI: an authorization code
/// and the echoed state on success, or an error code when the user denied
/// access (or the provider failed).
#[derive(Deserialize, utoipa::IntoParams)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// LoginSuccessQuery
///
/// The landing page receives the freshly issued access token as a query
/// parameter from the callback redirect.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct LoginSuccessQuery {
    pub token: Option<String>,
}

// --- View Handlers (/views/**) ---

/// login_page
///
/// [Public Route] The login entry point. Renders one login link per
/// registered provider and, after a failed attempt, a human-readable error.
#[utoipa::path(
    get,
    path = "/views/login",
    params(LoginPageQuery),
    responses((status = 200, description = "Login page", content_type = "text/html"))
)]
pub async fn login_page(
    State(state): State<AppState>,
    Query(query): Query<LoginPageQuery>,
) -> Html<String> {
    // Error slugs are mapped to fixed copy; the raw parameter is never
    // reflected into the page.
    let error_html = match query.error.as_deref() {
        None => String::new(),
        Some("access_denied") => {
            r#"<p class="error">Login was cancelled at the provider.</p>"#.to_string()
        }
        Some("email_unavailable") => {
            r#"<p class="error">The provider did not share an email address.</p>"#.to_string()
        }
        Some(_) => r#"<p class="error">Login failed. Please try again.</p>"#.to_string(),
    };

    let provider_links: String = state
        .oauth
        .providers()
        .iter()
        .map(|p| {
            format!(
                r#"<li><a href="/views/oauth/{name}">Sign in with {name}</a></li>"#,
                name = p.name
            )
        })
        .collect();

    let body = if provider_links.is_empty() {
        "<p>No identity providers are configured.</p>".to_string()
    } else {
        format!("<ul>{}</ul>", provider_links)
    };

    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Sign in</title></head>
<body>
<h1>Sign in</h1>
{error_html}
{body}
</body>
</html>"#
    ))
}

/// login_success_page
///
/// [Public Route] Where the success handler lands the browser. Displays the
/// issued access token so the client can copy it into its API calls.
#[utoipa::path(
    get,
    path = "/views/login-success",
    params(LoginSuccessQuery),
    responses((status = 200, description = "Post-login landing page", content_type = "text/html"))
)]
pub async fn login_success_page(Query(query): Query<LoginSuccessQuery>) -> Html<String> {
    let body = match query.token {
        Some(token) => {
            // Tokens are base64url segments joined by dots; strip anything
            // else so arbitrary query input never reaches the markup.
            let token: String = token
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
                .collect();
            format!(
                r#"<p>Signed in. Use this bearer token for API requests:</p>
<pre><code>{token}</code></pre>"#
            )
        }
        None => "<p>Signed in, but no token was provided.</p>".to_string(),
    };

    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Signed in</title></head>
<body>
<h1>Signed in</h1>
{body}
</body>
</html>"#
    ))
}

// --- OAuth2 Flow Handlers (/views/oauth/**) ---

/// Sends the browser back to the login page with an error slug.
fn login_error(reason: &str) -> Redirect {
    Redirect::to(&format!("/views/login?error={}", reason))
}

/// oauth_authorize
///
/// [Public Route] Starts the login flow against the named provider:
/// redirects the browser to the provider's authorization endpoint carrying a
/// signed state token.
#[utoipa::path(
    get,
    path = "/views/oauth/{provider}",
    params(("provider" = String, Path, description = "Provider registration name")),
    responses((status = 303, description = "Redirect to the provider's authorization endpoint"))
)]
pub async fn oauth_authorize(
    State(state): State<AppState>,
    Path(provider_name): Path<String>,
) -> Result<Redirect, Redirect> {
    let provider = state
        .oauth
        .provider(&provider_name)
        .ok_or_else(|| login_error("unknown_provider"))?;

    let url = state.oauth.authorize_url(provider).map_err(|e| {
        tracing::error!("authorize_url failed: {}", e);
        login_error("provider_error")
    })?;

    Ok(Redirect::to(&url))
}

/// oauth_callback
///
/// [Public Route] The redirect URI, and the success handler of the login
/// flow. Verifies the state, exchanges the code, fetches the provider
/// identity, upserts the local user and hands the browser a freshly minted
/// access token. Every failure lands back on the login page with an error
/// slug; success lands on `/views/login-success` with the token.
#[utoipa::path(
    get,
    path = "/views/oauth/callback",
    params(CallbackQuery),
    responses(
        (status = 303, description = "Redirect: to the landing page with an issued token on success, back to the login page with an error slug otherwise")
    )
)]
pub async fn oauth_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Redirect, Redirect> {
    // The provider reports user denial (and its own failures) via `error`.
    if let Some(error) = query.error {
        tracing::info!("provider returned error: {}", error);
        return Err(login_error("access_denied"));
    }

    let state_param = query.state.ok_or_else(|| login_error("missing_state"))?;
    let provider = state.oauth.verify_state(&state_param).map_err(|e| {
        tracing::warn!("callback state rejected: {}", e);
        login_error("invalid_state")
    })?;

    let code = query.code.ok_or_else(|| login_error("missing_code"))?;

    let provider_token = state
        .oauth
        .exchange_code(provider, &code)
        .await
        .map_err(|e| {
            tracing::error!("code exchange failed: {}", e);
            login_error("exchange_failed")
        })?;

    let identity = state
        .oauth
        .fetch_identity(provider, &provider_token)
        .await
        .map_err(|e| {
            tracing::error!("identity fetch failed: {}", e);
            login_error("provider_error")
        })?;

    // An email is required to create an account; some providers only share
    // it with the right scopes granted.
    let email = identity
        .email
        .ok_or_else(|| login_error("email_unavailable"))?;

    let user = state
        .repo
        .upsert_oauth_user(
            &provider.name,
            &identity.subject,
            &email,
            identity.display_name,
        )
        .await
        .ok_or_else(|| login_error("server_error"))?;

    tracing::info!(user_id = %user.id, provider = %provider.name, "login succeeded");

    let token = TokenService::new(&state.config).issue(&user).map_err(|e| {
        tracing::error!("token issue failed: {:?}", e);
        login_error("server_error")
    })?;

    Ok(Redirect::to(&format!(
        "/views/login-success?token={}",
        token.access_token
    )))
}

// --- Token Utility Handlers (/token/**) ---

/// validate_token
///
/// [Public Route] Verifies a presented token (signature and expiry) and
/// returns its decoded claims. The endpoint is public: verification is the
/// operation itself, not a precondition.
#[utoipa::path(
    post,
    path = "/token/validate",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Token is valid", body = TokenClaimsResponse),
        (status = 401, description = "Token is invalid or expired")
    )
)]
pub async fn validate_token(
    State(state): State<AppState>,
    Json(payload): Json<TokenRequest>,
) -> Result<Json<TokenClaimsResponse>, StatusCode> {
    let claims = TokenService::new(&state.config)
        .verify(&payload.token)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    Ok(Json(TokenClaimsResponse {
        sub: claims.sub,
        email: claims.email,
        iat: claims.iat,
        exp: claims.exp,
    }))
}

/// refresh_token
///
/// [Public Route] Exchanges a still-valid token for a fresh one. The user
/// must still exist; a token whose account was deleted cannot be renewed.
#[utoipa::path(
    post,
    path = "/token/refresh",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Fresh token issued", body = TokenResponse),
        (status = 401, description = "Presented token is invalid, expired, or orphaned")
    )
)]
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, StatusCode> {
    let service = TokenService::new(&state.config);

    let claims = service
        .verify(&payload.token)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let user = state
        .repo
        .get_user(claims.sub)
        .await
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = service.issue(&user).map_err(|e| {
        tracing::error!("token issue failed: {:?}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(token))
}

// --- Authenticated Handlers ---

/// get_me
///
/// [Authenticated Route] The authenticated user's own profile. The identity
/// is resolved by the `AuthUser` extractor before this handler runs.
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Profile", body = UserProfile),
        (status = 401, description = "No valid credential presented")
    )
)]
pub async fn get_me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserProfile>, StatusCode> {
    let user = state
        .repo
        .get_user(id)
        .await
        .ok_or(StatusCode::UNAUTHORIZED)?;

    Ok(Json(UserProfile {
        id: user.id,
        email: user.email,
        display_name: user.display_name,
        provider: user.provider,
    }))
}
