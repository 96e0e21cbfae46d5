//! Entity trait: identity + tenant ownership + storage collection.

use crate::{EntityId, TenantId};

/// A tenant-owned record persisted in a named collection.
///
/// Every entity carries the tenant it belongs to. Stores key records by
/// `(tenant, collection, id)`, so a record is never visible outside its tenant.
pub trait Entity {
    /// Collection (table / document kind) the entity is stored in.
    const COLLECTION: &'static str;

    fn id(&self) -> EntityId;

    fn tenant_id(&self) -> TenantId;
}
