use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Every route here sits behind the `auth_middleware` layer applied in
/// `create_router`, so handlers always run with a verified principal. The
/// guard also covers this router's fallback: unmatched paths answer 401
/// before 404.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me
        // The authenticated user's own profile.
        .route("/me", get(handlers::get_me))
}
