//! # TuitionBell Gateway
//! HTTP trigger for the notification engine plus a liveness probe.

pub mod routes;
pub mod server;

pub use server::{AppState, build_router, start};
