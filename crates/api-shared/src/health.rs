use serde::Serialize;
use utoipa::ToSchema;

/// Liveness response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Simple health service that can be used by any API surface
///
/// This service provides a standardised way to check the health status of the HMS portal.
#[derive(Clone, Default)]
pub struct HealthService;

impl HealthService {
    /// Creates a new instance of HealthService.
    ///
    /// # Returns
    /// A new `HealthService` instance.
    pub fn new() -> Self {
        Self
    }

    /// Static method to check health without creating an instance
    ///
    /// # Returns
    /// A `HealthRes` indicating the service is healthy.
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: "HMS is alive".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_reports_ok() {
        let res = HealthService::check_health();
        assert!(res.ok);
        assert_eq!(
            serde_json::to_value(&res).unwrap(),
            serde_json::json!({"ok": true, "message": "HMS is alive"})
        );
    }
}
