//! `campus-auth`: tenant context resolution, capability matrix and guard.
//!
//! This crate is intentionally decoupled from HTTP and storage: callers load
//! custom roles and hand them in, the crate only decides.

pub mod authorize;
pub mod claims;
pub mod matrix;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod session;

pub use authorize::{AuthError, require_auth, require_capability, require_role};
pub use claims::{SessionClaims, TokenValidationError, validate_claims};
pub use matrix::{
    Decision, DecisionSource, default_permissions, explain, principal_permissions, resolve_permissions,
};
pub use permissions::{Action, Capability, CapabilityParseError, Module, PermissionSet};
pub use principal::Principal;
pub use roles::{CustomRole, ModulePermission, SystemRole};
pub use session::{Hs256SessionResolver, Session, SessionResolver};
