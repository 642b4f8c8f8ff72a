//! Health check endpoints.
//!
//! `/health` answers as long as the process is serving requests. Readiness
//! depends on the application's backends, so the application builds a
//! [`ReadinessReport`] from its own checks and returns it.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Liveness probe. Does not touch any dependency.
#[allow(clippy::unused_async)] // Axum handler signature requires async
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Result of probing one backend.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ComponentCheck {
    /// Component name (`storage`, `sessions`, ...)
    pub component: String,
    /// Whether the component answered
    pub healthy: bool,
    /// Error text when unhealthy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentCheck {
    /// Build a check from a probe result.
    pub fn from_result<E: std::fmt::Display>(component: &str, result: Result<(), E>) -> Self {
        Self {
            component: component.to_string(),
            healthy: result.is_ok(),
            message: result.err().map(|e| e.to_string()),
        }
    }
}

/// Aggregated readiness: `200` when every component is healthy, else `503`.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessReport {
    /// `"ready"` or `"unavailable"`
    pub status: &'static str,
    /// Individual component results
    pub checks: Vec<ComponentCheck>,
}

impl ReadinessReport {
    /// Aggregate component checks.
    #[must_use]
    pub fn new(checks: Vec<ComponentCheck>) -> Self {
        let status = if checks.iter().all(|c| c.healthy) {
            "ready"
        } else {
            "unavailable"
        };
        Self { status, checks }
    }

    /// `true` when every component is healthy.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status == "ready"
    }
}

impl IntoResponse for ReadinessReport {
    fn into_response(self) -> Response {
        let status = if self.is_ready() {
            StatusCode::OK
        } else {
            tracing::warn!(checks = ?self.checks, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        };
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simple_health_check() {
        let (status, body) = health_check().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[test]
    fn test_ready_when_all_components_healthy() {
        let report = ReadinessReport::new(vec![
            ComponentCheck::from_result::<String>("storage", Ok(())),
            ComponentCheck::from_result::<String>("sessions", Ok(())),
        ]);
        assert!(report.is_ready());
        assert_eq!(report.into_response().status(), StatusCode::OK);
    }

    #[test]
    fn test_unavailable_when_any_component_fails() {
        let report = ReadinessReport::new(vec![
            ComponentCheck::from_result::<String>("storage", Ok(())),
            ComponentCheck::from_result("sessions", Err("connection refused")),
        ]);
        assert!(!report.is_ready());
        assert_eq!(report.checks[1].message.as_deref(), Some("connection refused"));
        assert_eq!(report.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
