use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sharekeep_core::protocol::{ErrorKind, ErrorResponse};
use sharekeep_ledger::LedgerError;

pub(crate) fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::FailedPrecondition => StatusCode::PRECONDITION_FAILED,
        ErrorKind::AlreadyExists => StatusCode::CONFLICT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn error_response(kind: ErrorKind, message: impl Into<String>) -> Response {
    (
        status_for(kind),
        Json(ErrorResponse {
            code: kind,
            error: message.into(),
        }),
    )
        .into_response()
}

/// Maps a ledger failure to its public shape. Internal causes are logged
/// and replaced with a generic message.
pub(crate) fn ledger_failure(operation: &'static str, error: LedgerError) -> Response {
    let kind = error.kind();
    if kind == ErrorKind::Internal {
        tracing::error!(operation, error = %error, "request failed");
        return internal_error();
    }
    error_response(kind, error.to_string())
}

pub(crate) fn internal_error() -> Response {
    error_response(ErrorKind::Internal, "internal error")
}

pub(crate) fn bad_body(rejection: JsonRejection) -> Response {
    error_response(ErrorKind::InvalidArgument, rejection.body_text())
}

/// Formats a response timestamp or produces the internal error response.
pub(crate) fn timestamp(value: std::time::SystemTime) -> Result<String, Response> {
    sharekeep_core::protocol::format_timestamp(value).map_err(|error| {
        tracing::error!(error = %error, "timestamp out of range");
        internal_error()
    })
}
