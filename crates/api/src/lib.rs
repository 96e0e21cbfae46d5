//! HTTP API: configuration, session resolution, guarded routes and
//! request/response mapping.

pub mod app;
pub mod authz;
pub mod config;
pub mod context;
pub mod middleware;
