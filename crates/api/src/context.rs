use std::sync::Arc;

use campus_auth::Session;

/// Authorization context attached to every request by the session middleware.
///
/// Anonymous requests carry `RequestSession(None)`; the guard turns that into
/// `Unauthenticated` for any route that needs a session.
#[derive(Debug, Clone, Default)]
pub struct RequestSession(pub Option<Arc<Session>>);

impl RequestSession {
    pub fn anonymous() -> Self {
        Self(None)
    }

    pub fn authenticated(session: Session) -> Self {
        Self(Some(Arc::new(session)))
    }

    pub fn session(&self) -> Option<&Session> {
        self.0.as_deref()
    }
}
