//! `campus-core`: shared building blocks for the school platform.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the error taxonomy, and the tenant-scoped entity contract.

pub mod entity;
pub mod error;
pub mod id;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{EntityId, TenantId, UserId};
