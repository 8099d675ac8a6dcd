/// Router Module Index
///
/// Splits the routing table along the security boundary, so the access rule
/// for a path is visible from which module declares it rather than from a
/// check buried in a handler.
///
/// First-match semantics are structural: a request either hits a public
/// route, hits a guarded route behind the auth layer, or falls through to
/// the guarded fallback.

/// Routes accessible without credentials: the login views, the OAuth2 flow,
/// and the self-verifying token utilities.
pub mod public;

/// Routes protected by the `AuthUser` bearer-token guard.
pub mod authenticated;
