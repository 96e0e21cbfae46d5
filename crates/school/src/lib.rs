//! School domain module (people, academics, transport, fees).
//!
//! Pure, deterministic domain logic (no IO, no HTTP, no storage): record
//! shapes, lifecycle transitions and the declarative rules describing how a
//! parent's deactivation or deletion reaches its dependents.

pub mod academics;
pub mod cascade;
pub mod fees;
pub mod lifecycle;
pub mod people;
pub mod transport;

pub use academics::{Department, FacultyWorkload, Subject, SubjectPatch};
pub use cascade::{
    CascadeAction, CascadeRule, Cleared, DeleteGuardRule, DependentKind, ParentKind, Reference,
    cascade_rules, delete_guards,
};
pub use fees::FeeStructure;
pub use lifecycle::Lifecycle;
pub use people::{Student, Teacher};
pub use transport::TransportVehicle;
