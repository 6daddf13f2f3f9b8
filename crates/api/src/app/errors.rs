use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use aura_auth::PasswordError;
use aura_infra::command_dispatcher::DispatchError;
use aura_infra::event_store::EventStoreError;
use aura_infra::reports::ReportError;
use aura_infra::scheduler::ScheduleError;

/// Handlers return the error response itself so `?` works on guards and parsers.
pub type ApiResult = Result<Response, Response>;

pub fn dispatch_error_to_response(err: DispatchError) -> Response {
    match err {
        DispatchError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DispatchError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DispatchError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DispatchError::Unauthorized => json_error(StatusCode::FORBIDDEN, "forbidden", "not allowed"),
        DispatchError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DispatchError::TenantIsolation(msg) => json_error(StatusCode::FORBIDDEN, "tenant_isolation", msg),
        DispatchError::Deserialize(msg) => {
            tracing::error!(error = %msg, "stored event could not be decoded");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "deserialize_error", msg)
        }
        DispatchError::Store(e) => store_error(e),
        DispatchError::Publish(msg) => {
            // The append already succeeded; the bus worker is the only casualty.
            tracing::warn!(error = %msg, "event publish failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "publish_error", msg)
        }
    }
}

fn store_error(err: EventStoreError) -> Response {
    tracing::error!(error = %err, "event store failure");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", err.to_string())
}

pub fn report_error(err: ReportError) -> Response {
    tracing::error!(error = %err, "report rendering failed");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "report_error", err.to_string())
}

pub fn schedule_error(err: ScheduleError) -> Response {
    match err {
        ScheduleError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", err.to_string()),
        ScheduleError::Report(e) => report_error(e),
        ScheduleError::Mail(e) => json_error(StatusCode::BAD_GATEWAY, "mail_error", e.to_string()),
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn not_found(what: &str) -> Response {
    json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
}

pub fn bad_request(message: impl Into<String>) -> Response {
    json_error(StatusCode::BAD_REQUEST, "validation_error", message)
}

pub fn conflict(message: impl Into<String>) -> Response {
    json_error(StatusCode::CONFLICT, "conflict", message)
}

pub fn unprocessable(message: impl Into<String>) -> Response {
    json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", message)
}

pub fn password_error(err: PasswordError) -> Response {
    match err {
        PasswordError::TooShort => bad_request(err.to_string()),
        PasswordError::Hash(_) | PasswordError::MalformedHash(_) => {
            tracing::error!(error = %err, "password hashing failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "password_error", err.to_string())
        }
    }
}
