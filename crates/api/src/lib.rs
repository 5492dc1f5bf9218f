//! Imprint API server library.
//!
//! Exposes the building blocks (config, state, error handling, routes, the
//! render orchestrator and job queue) so integration tests and the binary
//! entrypoint can both access them.

pub mod app;
pub mod config;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod middleware;
pub mod orchestrator;
pub mod query;
pub mod quota;
pub mod response;
pub mod routes;
pub mod state;
pub mod storage;
