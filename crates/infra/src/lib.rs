//! Infrastructure layer: storage, audit trail, cascades, background work and
//! the application services built on them.

pub mod audit;
pub mod cascade;
pub mod db;
pub mod external;
pub mod services;
pub mod store;
pub mod tasks;

pub use audit::{
    Actor, AuditAction, AuditEntry, AuditParams, AuditQuery, AuditRecorder, AuditSettings, AuditStore, Changes,
    FieldChange, InMemoryAuditStore, PostgresAuditStore, RetentionHandle, RetentionSweeper, UnknownAuditAction,
    build_changes,
};
pub use cascade::{CascadeCoordinator, CascadeCount, CascadeSummary, DeleteBlock};
pub use db::{ConnectionManager, DatabaseError};
pub use external::{ExternalCallError, Notifier, TracingNotifier, call_with_timeout};
pub use services::{
    LifecycleService, NewDepartment, NewFeeStructure, NewRole, NewStudent, NewSubject, NewTeacher, NewVehicle,
    NewWorkload, RecordService, RoleService, RoleUpdate, SubjectUpdate,
};
pub use store::{DocumentStore, Filter, InMemoryDocumentStore, PostgresDocumentStore, Repository, StoreError, Update};
pub use tasks::BackgroundTasks;
