use axum::{
    Router,
    routing::get,
};

pub mod academics;
pub mod audit;
pub mod fees;
pub mod people;
pub mod roles;
pub mod system;
pub mod transport;

/// Router for every session-aware endpoint.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/teachers", people::teachers_router())
        .nest("/students", people::students_router())
        .nest("/departments", academics::departments_router())
        .nest("/subjects", academics::subjects_router())
        .nest("/workloads", academics::workloads_router())
        .nest("/transport", transport::router())
        .nest("/fees", fees::router())
        .nest("/roles", roles::router())
        .nest("/audit-logs", audit::router())
}
