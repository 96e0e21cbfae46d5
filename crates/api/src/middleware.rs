use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use campus_auth::{Session, SessionResolver};
use campus_infra::RoleService;

use crate::context::RequestSession;

#[derive(Clone)]
pub struct AuthState {
    pub resolver: Arc<dyn SessionResolver>,
    pub roles: RoleService,
}

/// Resolve the bearer credential (if any) into a [`RequestSession`].
///
/// Never rejects: a missing or invalid credential yields an anonymous
/// session and the route's guard decides. A principal's custom role is
/// loaded here, once per request.
pub async fn session_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let ctx = match extract_bearer(req.headers()) {
        Some(token) => match state.resolver.resolve(token, Utc::now()) {
            Ok(principal) => {
                let custom_role = state.roles.load_for_principal(&principal).await;
                RequestSession::authenticated(Session::new(principal, custom_role))
            }
            Err(_) => RequestSession::anonymous(),
        },
        None => RequestSession::anonymous(),
    };

    req.extensions_mut().insert(ctx);
    next.run(req).await
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let header = header.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}
