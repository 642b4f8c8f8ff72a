//! Readiness probe over the service's backends.
//!
//! Liveness (`/health`) is the shared handler from `naviera_web`.

use axum::extract::State;
use naviera_web::handlers::{ComponentCheck, ReadinessReport};

use super::state::AppState;

/// Readiness check endpoint.
///
/// Pings storage and the session store; 503 when either fails.
///
/// ```bash
/// curl http://localhost:8080/ready
/// # {"status":"ready","checks":[{"component":"storage","healthy":true},...]}
/// ```
pub async fn readiness_check(State(state): State<AppState>) -> ReadinessReport {
    let (storage, sessions) = tokio::join!(state.storage.ping(), state.sessions.ping());
    ReadinessReport::new(vec![
        ComponentCheck::from_result("storage", storage),
        ComponentCheck::from_result("sessions", sessions),
    ])
}
