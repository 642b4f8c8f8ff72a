//! HTTP server: application state, routing and the readiness probe.

pub mod health;
pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::AppState;
