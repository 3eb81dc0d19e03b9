use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::admissions::AdmissionsError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Admissions(AdmissionsError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Admissions(err) => write!(f, "admissions error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Admissions(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Admissions(AdmissionsError::Validation(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Admissions(AdmissionsError::Forbidden(_)) => StatusCode::FORBIDDEN,
            AppError::Admissions(AdmissionsError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Admissions(
                AdmissionsError::Precondition(_) | AdmissionsError::Transition(_),
            ) => StatusCode::CONFLICT,
            AppError::Admissions(_)
            | AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<AdmissionsError> for AppError {
    fn from(value: AdmissionsError) -> Self {
        Self::Admissions(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::admissions::FieldErrors;

    #[test]
    fn admissions_errors_map_to_client_statuses() {
        let cases = [
            (
                AppError::from(AdmissionsError::Validation(FieldErrors::single(
                    "phone",
                    "This field is required.",
                ))),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                AppError::from(AdmissionsError::Forbidden("export applications")),
                StatusCode::FORBIDDEN,
            ),
            (
                AppError::from(AdmissionsError::Precondition("not a draft".to_string())),
                StatusCode::CONFLICT,
            ),
            (
                AppError::from(std::io::Error::new(std::io::ErrorKind::Other, "boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }
}
