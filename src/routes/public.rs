use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// The unauthenticated surface: everything under `/views/**` and
/// `/token/**`, plus the health probe. No auth layer is attached here —
/// these paths must work for a browser that has no credential yet, because
/// they are how a credential is obtained in the first place.
///
/// The `/token/**` endpoints are public but not unverified: each one
/// validates the token presented in its body as its core operation.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Unauthenticated probe for monitoring and load balancer checks.
        .route("/health", get(|| async { "ok" }))
        // --- Login Views ---
        // GET /views/login
        // The login entry point, listing the registered providers.
        .route("/views/login", get(handlers::login_page))
        // GET /views/login-success
        // Where the success handler lands the browser with the issued token.
        .route("/views/login-success", get(handlers::login_success_page))
        // --- OAuth2 Flow ---
        // GET /views/oauth/{provider}
        // Starts the authorization-code flow: 303 to the provider.
        .route("/views/oauth/{provider}", get(handlers::oauth_authorize))
        // GET /views/oauth/callback
        // The registered redirect URI; static segment wins over the
        // {provider} capture above.
        .route("/views/oauth/callback", get(handlers::oauth_callback))
        // --- Token Utilities ---
        // POST /token/validate
        // Decodes and checks a presented token, returning its claims.
        .route("/token/validate", post(handlers::validate_token))
        // POST /token/refresh
        // Exchanges a still-valid token for a fresh one.
        .route("/token/refresh", post(handlers::refresh_token))
}
