//! Stable numeric error codes returned in API responses, grouped by range:
//! auth 1000-1999, database 4000-4999, server 5000-5999, api 6000-6999.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidCredentials,
    UserAlreadyExists,
    TokenExpired,
    InvalidToken,
    UnauthorizedAccess,

    DatabaseError,
    RecordNotFound,
    DuplicateRecord,

    InternalServerError,
    ServiceUnavailable,
    UnknownApiError,
    QueueUnavailable,

    ApiError,
}

struct Descriptor {
    code: u32,
    message: &'static str,
    status: StatusCode,
    description: &'static str,
}

impl ErrorCode {
    fn descriptor(&self) -> Descriptor {
        match self {
            ErrorCode::InvalidCredentials => Descriptor {
                code: 1000,
                message: "INVALID CREDENTIALS",
                status: StatusCode::UNAUTHORIZED,
                description: "Invalid credentials",
            },
            ErrorCode::UserAlreadyExists => Descriptor {
                code: 1001,
                message: "USER ALREADY EXISTS",
                status: StatusCode::BAD_REQUEST,
                description: "User already exists",
            },
            ErrorCode::TokenExpired => Descriptor {
                code: 1002,
                message: "TOKEN EXPIRED",
                status: StatusCode::UNAUTHORIZED,
                description: "Authentication token has expired",
            },
            ErrorCode::InvalidToken => Descriptor {
                code: 1003,
                message: "INVALID TOKEN",
                status: StatusCode::UNAUTHORIZED,
                description: "Invalid authentication token",
            },
            ErrorCode::UnauthorizedAccess => Descriptor {
                code: 1004,
                message: "UNAUTHORIZED ACCESS",
                status: StatusCode::FORBIDDEN,
                description: "User does not have permission to access this resource",
            },
            ErrorCode::DatabaseError => Descriptor {
                code: 4000,
                message: "DATABASE ERROR",
                status: StatusCode::INTERNAL_SERVER_ERROR,
                description: "An error occurred while accessing the database",
            },
            ErrorCode::RecordNotFound => Descriptor {
                code: 4001,
                message: "RECORD NOT FOUND",
                status: StatusCode::NOT_FOUND,
                description: "The requested record was not found",
            },
            ErrorCode::DuplicateRecord => Descriptor {
                code: 4002,
                message: "DUPLICATE RECORD",
                status: StatusCode::BAD_REQUEST,
                description: "A record with this information already exists",
            },
            ErrorCode::InternalServerError => Descriptor {
                code: 5000,
                message: "INTERNAL SERVER ERROR",
                status: StatusCode::INTERNAL_SERVER_ERROR,
                description: "An unexpected error occurred",
            },
            ErrorCode::ServiceUnavailable => Descriptor {
                code: 5001,
                message: "SERVICE UNAVAILABLE",
                status: StatusCode::SERVICE_UNAVAILABLE,
                description: "The service is temporarily unavailable",
            },
            ErrorCode::UnknownApiError => Descriptor {
                code: 5002,
                message: "UNKNOWN API ERROR",
                status: StatusCode::INTERNAL_SERVER_ERROR,
                description: "An unknown error occurred",
            },
            ErrorCode::QueueUnavailable => Descriptor {
                code: 5003,
                message: "QUEUE UNAVAILABLE",
                status: StatusCode::SERVICE_UNAVAILABLE,
                description: "The queue is temporarily unavailable",
            },
            ErrorCode::ApiError => Descriptor {
                code: 6000,
                message: "API ERROR",
                status: StatusCode::INTERNAL_SERVER_ERROR,
                description: "An error occurred while accessing the API",
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: u32,
    message: String,
    description: String,
}

/// HTTP-facing error envelope: `{code, message, description}` plus the
/// status line the code maps to.
pub struct ApiError(pub ErrorCode);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let d = self.0.descriptor();
        (d.status, Json(ErrorBody { code: d.code, message: d.message.to_string(), description: d.description.to_string() }))
            .into_response()
    }
}

impl From<crate::error::AuthError> for ApiError {
    fn from(e: crate::error::AuthError) -> Self {
        match e {
            crate::error::AuthError::TokenExpired => ApiError(ErrorCode::TokenExpired),
            crate::error::AuthError::InvalidToken => ApiError(ErrorCode::InvalidToken),
            crate::error::AuthError::UnauthorizedAccess => ApiError(ErrorCode::UnauthorizedAccess),
        }
    }
}

impl From<crate::error::OrchestratorError> for ApiError {
    fn from(e: crate::error::OrchestratorError) -> Self {
        match e {
            crate::error::OrchestratorError::QueueUnavailable => ApiError(ErrorCode::QueueUnavailable),
            crate::error::OrchestratorError::NotFound => ApiError(ErrorCode::RecordNotFound),
            crate::error::OrchestratorError::Auth(auth) => ApiError::from(auth),
            crate::error::OrchestratorError::Database(_) => ApiError(ErrorCode::DatabaseError),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: &[ErrorCode] = &[
        ErrorCode::InvalidCredentials,
        ErrorCode::UserAlreadyExists,
        ErrorCode::TokenExpired,
        ErrorCode::InvalidToken,
        ErrorCode::UnauthorizedAccess,
        ErrorCode::DatabaseError,
        ErrorCode::RecordNotFound,
        ErrorCode::DuplicateRecord,
        ErrorCode::InternalServerError,
        ErrorCode::ServiceUnavailable,
        ErrorCode::UnknownApiError,
        ErrorCode::QueueUnavailable,
        ErrorCode::ApiError,
    ];

    #[test]
    fn every_error_code_round_trips_to_its_documented_http_status() {
        for code in ALL {
            let d = code.descriptor();
            let expected_status = match code {
                ErrorCode::InvalidCredentials
                | ErrorCode::TokenExpired
                | ErrorCode::InvalidToken => StatusCode::UNAUTHORIZED,
                ErrorCode::UserAlreadyExists | ErrorCode::DuplicateRecord => StatusCode::BAD_REQUEST,
                ErrorCode::UnauthorizedAccess => StatusCode::FORBIDDEN,
                ErrorCode::DatabaseError | ErrorCode::InternalServerError | ErrorCode::UnknownApiError | ErrorCode::ApiError => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                ErrorCode::RecordNotFound => StatusCode::NOT_FOUND,
                ErrorCode::ServiceUnavailable | ErrorCode::QueueUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            };
            assert_eq!(d.status, expected_status, "{code:?} mapped to the wrong HTTP status");
        }
    }

    #[test]
    fn every_error_code_has_a_unique_numeric_code_in_its_documented_range() {
        use std::collections::HashSet;
        let mut seen = HashSet::new();
        for code in ALL {
            let d = code.descriptor();
            assert!(seen.insert(d.code), "duplicate numeric error code {}", d.code);
        }
    }

    #[test]
    fn queue_unavailable_orchestrator_error_maps_to_the_dedicated_code() {
        let api_err = ApiError::from(crate::error::OrchestratorError::QueueUnavailable);
        assert_eq!(api_err.0, ErrorCode::QueueUnavailable);
        assert_eq!(api_err.0.descriptor().code, 5003);
    }
}
