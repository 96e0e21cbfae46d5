//! Active/inactive lifecycle shared by deactivatable records.
//!
//! There is no undo: reactivation is its own forward transition.

use chrono::{DateTime, Utc};

use campus_core::{DomainError, DomainResult, Entity};

pub trait Lifecycle: Entity {
    fn is_active(&self) -> bool;

    fn set_active(&mut self, active: bool, at: DateTime<Utc>);

    fn deactivate(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        if !self.is_active() {
            return Err(DomainError::conflict(format!(
                "{} {} is already inactive",
                Self::COLLECTION,
                self.id()
            )));
        }
        self.set_active(false, at);
        Ok(())
    }

    fn reactivate(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        if self.is_active() {
            return Err(DomainError::conflict(format!(
                "{} {} is already active",
                Self::COLLECTION,
                self.id()
            )));
        }
        self.set_active(true, at);
        Ok(())
    }
}

macro_rules! impl_lifecycle {
    ($t:ty) => {
        impl $crate::lifecycle::Lifecycle for $t {
            fn is_active(&self) -> bool {
                self.active
            }

            fn set_active(&mut self, active: bool, at: chrono::DateTime<chrono::Utc>) {
                self.active = active;
                self.updated_at = at;
            }
        }
    };
}

pub(crate) use impl_lifecycle;
