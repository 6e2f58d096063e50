//! Error types for routing.

use thiserror::Error;

use crate::response::Response;

/// Router-specific errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    /// A path template could not be compiled.
    #[error("invalid path template `{template}`: {reason}")]
    PatternSyntax { template: String, reason: String },

    /// No route matched the request.
    #[error("no route matched: {method} {path}")]
    NotFound { method: String, path: String },

    /// A handler reference could not be resolved to an invocable action.
    #[error("invalid handler `{handler}`: {reason}")]
    HandlerContract { handler: String, reason: String },

    /// Not one of the supported HTTP methods.
    #[error("unknown HTTP method: {0}")]
    UnknownMethod(String),

    /// A route declaration file could not be read.
    #[error("invalid route configuration: {0}")]
    Config(String),
}

impl RouterError {
    pub(crate) fn syntax(template: &str, reason: impl Into<String>) -> Self {
        Self::PatternSyntax {
            template: template.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn contract(handler: &str, reason: impl Into<String>) -> Self {
        Self::HandlerContract {
            handler: handler.to_string(),
            reason: reason.into(),
        }
    }

    /// Returns `true` for the "no route matched" outcome.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// HTTP status code the error maps to at the server boundary.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            _ => 500,
        }
    }

    /// Converts the error into a response suitable for the client.
    #[must_use]
    pub fn into_response(self) -> Response {
        match self {
            Self::NotFound { .. } => Response::not_found(),
            _ => Response::internal_server_error(),
        }
    }
}

impl From<serde_json::Error> for RouterError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type alias for router operations.
pub type Result<T> = std::result::Result<T, RouterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let err = RouterError::NotFound {
            method: "GET".to_string(),
            path: "/missing".to_string(),
        };
        assert!(err.is_not_found());
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.to_string(), "no route matched: GET /missing");
        assert_eq!(err.into_response().status, 404);
    }

    #[test]
    fn test_contract_error_maps_to_500() {
        let err = RouterError::contract("user@show", "action not found");
        assert!(!err.is_not_found());
        assert_eq!(err.status_code(), 500);
        assert_eq!(
            err.to_string(),
            "invalid handler `user@show`: action not found"
        );
    }
}
