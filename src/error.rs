use std::error::Error;

use axum::response::IntoResponse;
use axum::Json;
use hyper::StatusCode;
use serde::Serialize;
use tracing::error;

/// The error taxonomy of §7: every failure a request can hit resolves to one
/// of these kinds, and every kind maps to exactly one HTTP status. Errors
/// outside this taxonomy (panics aside) are not expected to reach a handler;
/// if one does, `Programatic` is the catch-all and is always logged.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The addressed [`crate::node::Node`] does not exist.
    #[error("does not exist: {0}")]
    DoesNotExist(String),

    /// Not authenticated, or credentials did not verify.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The URI is on a deny list, or addresses the reserved `/sys` tree.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Client input the system refuses: a store conflict, an address outside
    /// its root, a type mismatch between source and destination.
    #[error("logical error: {0}")]
    Logical(String),

    /// A required parameter was absent.
    #[error("missing argument: {0}")]
    MissingArg(String),

    /// A parameter was present but malformed.
    #[error("illegal argument: {0}")]
    IllegalArg(String),

    /// An invariant broke. Always logged at error level regardless of
    /// whether the client ever sees it.
    #[error("internal error")]
    Programatic(#[from] anyhow::Error),

    /// The request must be retried over `https`, at the given absolute URI.
    #[error("https required")]
    HttpsRequired(String),

    /// The request must be retried over `http`, at the given absolute URI.
    #[error("https not required")]
    HttpsNotRequired(String),

    #[error("io error")]
    Io(#[from] std::io::Error),

    #[error("json error")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::DoesNotExist(_) => StatusCode::NOT_FOUND,
            AppError::AccessDenied(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Logical(_) => StatusCode::CONFLICT,
            AppError::MissingArg(_) => StatusCode::CONFLICT,
            AppError::IllegalArg(_) => StatusCode::CONFLICT,
            AppError::Programatic(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::HttpsRequired(_) | AppError::HttpsNotRequired(_) => {
                StatusCode::MOVED_PERMANENTLY
            }
            AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Json(_) => StatusCode::CONFLICT,
        }
    }

    /// The absolute URI to redirect to, for the two scheme-mismatch kinds.
    pub fn redirect_target(&self) -> Option<&str> {
        match self {
            AppError::HttpsRequired(uri) | AppError::HttpsNotRequired(uri) => Some(uri),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorWrapper {
    error: ProblemDetails,
}

#[derive(Debug, Serialize)]
struct ProblemDetails {
    #[serde(rename = "type")]
    kind: &'static str,
    message: String,
}

impl AppError {
    fn kind_name(&self) -> &'static str {
        match self {
            AppError::DoesNotExist(_) => "DoesNotExist",
            AppError::AccessDenied(_) => "AccessDenied",
            AppError::Forbidden(_) => "Forbidden",
            AppError::Logical(_) => "Logical",
            AppError::MissingArg(_) => "MissingArg",
            AppError::IllegalArg(_) => "IllegalArg",
            AppError::Programatic(_) => "Programatic",
            AppError::HttpsRequired(_) => "HttpsRequired",
            AppError::HttpsNotRequired(_) => "HttpsNotRequired",
            AppError::Io(_) => "Programatic",
            AppError::Json(_) => "Logical",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();

        if status.is_server_error() {
            error!(status = ?status, message = ?self, details = ?self.source());
        }

        if let Some(target) = self.redirect_target() {
            return (
                status,
                [(hyper::header::LOCATION, target.to_owned())],
            )
                .into_response();
        }

        let mut response = (
            status,
            Json(ErrorWrapper {
                error: ProblemDetails {
                    kind: self.kind_name(),
                    message: self.to_string(),
                },
            }),
        )
            .into_response();

        if matches!(self, AppError::AccessDenied(_)) {
            response
                .headers_mut()
                .insert(hyper::header::WWW_AUTHENTICATE, "Web".parse().unwrap());
        }

        response
    }
}
