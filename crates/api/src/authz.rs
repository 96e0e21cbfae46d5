//! API-side authorization guard.
//!
//! Thin wrappers over the `campus-auth` guard that turn a denial straight
//! into the HTTP response, so handlers can bail out before touching any
//! service.

use axum::response::Response;

use campus_auth::{AuthError, Session, SystemRole, require_auth, require_role};

use crate::app::errors;
use crate::context::RequestSession;

/// Require a session holding `capability` (`"<module>:<action>"`).
pub fn capability<'a>(ctx: &'a RequestSession, capability: &str) -> Result<&'a Session, Response> {
    require_auth(ctx.session(), capability).map_err(errors::auth_error_to_response)
}

/// Require a session whose built-in role is one of `allowed`.
pub fn role<'a>(ctx: &'a RequestSession, allowed: &[SystemRole]) -> Result<&'a Session, Response> {
    require_role(ctx.session(), allowed).map_err(errors::auth_error_to_response)
}

/// Require any authenticated session.
pub fn authenticated(ctx: &RequestSession) -> Result<&Session, Response> {
    ctx.session()
        .ok_or(AuthError::Unauthenticated)
        .map_err(errors::auth_error_to_response)
}
