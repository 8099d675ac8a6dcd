use axum::{
    Router,
    extract::{FromRef, Request},
    http::{HeaderName, StatusCode},
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod handlers;
pub mod models;
pub mod oauth;
pub mod repository;
pub mod token;

// Routing segregation: public surface vs. token-guarded surface.
pub mod routes;
use auth::AuthUser;
use routes::{authenticated, public};

// --- Public Re-exports ---

// Core state types, accessible to the application entry point (main.rs).
pub use config::AppConfig;
pub use oauth::{OAuth2Client, OAuthState};
pub use repository::{PostgresRepository, RepositoryState};
pub use token::TokenService;

/// ApiDoc
///
/// Auto-generates the OpenAPI documentation (Swagger JSON), aggregating the
/// paths and schemas decorated with `#[utoipa::path]` / `ToSchema`.
/// Served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login_page, handlers::login_success_page,
        handlers::oauth_authorize, handlers::oauth_callback,
        handlers::validate_token, handlers::refresh_token,
        handlers::get_me,
    ),
    components(
        schemas(
            models::User, models::UserProfile,
            models::TokenRequest, models::TokenResponse, models::TokenClaimsResponse,
        )
    ),
    tags(
        (name = "auth-portal", description = "Stateless OAuth2/JWT authentication portal")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, thread-safe, immutable container holding all application
/// services and configuration, shared across all incoming requests.
#[derive(Clone)]
pub struct AppState {
    /// Persistence layer: user records behind the `Repository` trait.
    pub repo: RepositoryState,
    /// OAuth2 layer: drives the authorization-code flow against providers.
    pub oauth: OAuthState,
    /// The loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Allow extractors and middleware to pull individual components out of the
// shared AppState.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for OAuthState {
    fn from_ref(app_state: &AppState) -> OAuthState {
        app_state.oauth.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Enforces authentication on the guarded router. The `AuthUser` parameter
/// is the mechanism: its `FromRequestParts` implementation performs the
/// bearer-token verification, so a request without a valid credential is
/// rejected with 401 before `next.run` — and therefore before any handler
/// or access decision.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routing structure and, with it, the whole security rule
/// set: which paths are public, which sit behind token verification, and
/// the guarantee that verification runs before any authorization decision.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS configuration.
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for request correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base router assembly.
    let base_router = Router::new()
        // Documentation: the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public surface: /views/**, /token/**, /health. No auth layer.
        .merge(public::public_routes())
        // Guarded surface: everything else. The fallback lives on this side
        // so a request matching no route at all still needs a principal
        // before it can learn the path does not exist.
        .merge(
            authenticated::authenticated_routes()
                .fallback(|| async { StatusCode::NOT_FOUND })
                .layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        // Apply the unified state to all routes.
        .with_state(state);

    // 3. Observability and correlation layers (outermost).
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID generation: a unique UUID per request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request tracing: one span per request/response cycle,
                // carrying the generated request id.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID propagation back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS layer.
        .layer(cors)
}

/// trace_span_logger
///
/// Customizes `TraceLayer` span creation: includes the `x-request-id`
/// header in the structured logging metadata alongside method and URI, so
/// every log line of a request is correlated by a unique id.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
