//! The error taxonomy shared by every layer of the workload-lifecycle engine.
//!
//! Hand-rolled rather than derived: each variant owns the diagnostic text a caller needs, and the
//! HTTP layer maps variants to status codes in `http::response`.

use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// Input violates a documented grammar, or references a non-existent queue/priority class.
    ValidationFailed(String),
    /// Unsupported execution mode.
    BadMode(String),
    /// The Workload label selector found nothing, the owning resource was deleted, or no pods exist.
    NotFound(String),
    /// The Workload exists but is structurally inconsistent.
    InvalidWorkload(String),
    /// The Kubernetes API returned 400 for a log read.
    PodNotReady,
    /// Pod discovery was attempted for an owner kind outside `{Job, RayJob}`.
    UnsupportedKind(String),
    /// Any other Kubernetes API failure.
    APIError(String),
    /// The delete cascade failed mid-flight.
    StopFailed(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ValidationFailed(detail) => write!(f, "{detail}"),
            Error::BadMode(mode) => write!(f, "unsupported execution mode {mode:?}"),
            Error::NotFound(detail) => write!(f, "{detail}"),
            Error::InvalidWorkload(detail) => write!(f, "workload is structurally invalid: {detail}"),
            Error::PodNotReady => write!(f, "pod not ready"),
            Error::UnsupportedKind(kind) => write!(f, "pod discovery is not supported for kind {kind:?}"),
            Error::APIError(detail) => write!(f, "{detail}"),
            Error::StopFailed(detail) => write!(f, "failed to stop workload: {detail}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<kube::Error> for Error {
    fn from(error: kube::Error) -> Self {
        if let kube::Error::Api(response) = &error {
            if response.code == 404 {
                return Error::NotFound(response.message.clone());
            }
        }
        Error::APIError(error.to_string())
    }
}

/// Maps a log-endpoint failure specifically: the apiserver returns 400 when a pod's container
/// hasn't started yet, which is only meaningful for `GetPodLogs`/`StreamPodLogs`. Every other
/// Gateway call uses the blanket `From<kube::Error>` instead.
pub fn map_log_error(error: kube::Error) -> Error {
    if let kube::Error::Api(response) = &error {
        if response.code == 400 {
            return Error::PodNotReady;
        }
    }
    Error::from(error)
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(code: u16, message: &str) -> kube::Error {
        kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: message.to_string(),
            reason: String::new(),
            code,
        })
    }

    #[test]
    fn blanket_conversion_falls_400_through_to_api_error() {
        assert!(matches!(Error::from(api_error(400, "not ready")), Error::APIError(_)));
    }

    #[test]
    fn maps_404_to_not_found_with_message() {
        match Error::from(api_error(404, "workload missing")) {
            Error::NotFound(message) => assert_eq!(message, "workload missing"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn maps_other_codes_to_api_error() {
        assert!(matches!(Error::from(api_error(500, "boom")), Error::APIError(_)));
    }

    #[test]
    fn log_error_mapping_treats_400_as_pod_not_ready() {
        assert!(matches!(map_log_error(api_error(400, "not ready")), Error::PodNotReady));
    }

    #[test]
    fn log_error_mapping_still_maps_404_to_not_found() {
        assert!(matches!(map_log_error(api_error(404, "gone")), Error::NotFound(_)));
    }
}
