use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Every failure is terminal for the current action and carries a message
/// that is shown to the user as-is.
#[derive(Debug, Error)]
pub enum AppError {
    /// Non-200 status, unparseable body or a non-empty `errors` array upstream.
    #[error("{0}")]
    Remote(String),

    /// Empty dataset, missing columns or unreadable cells.
    #[error("{0}")]
    Data(String),

    /// Nothing usable in the user input (coordinates, file, facade).
    #[error("{0}")]
    Input(String),

    #[error("{0}")]
    SolarGeometry(String),
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Remote(_) => StatusCode::BAD_GATEWAY,
            AppError::Data(_) | AppError::SolarGeometry(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Input(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::Remote(_) => "RemoteError",
            AppError::Data(_) => "DataError",
            AppError::Input(_) => "InputError",
            AppError::SolarGeometry(_) => "SolarGeometryError",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.error_type(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AppError::Remote(format!("NSRDB request timed out: {}", e))
        } else {
            AppError::Remote(format!("NSRDB request failed: {}", e))
        }
    }
}

impl From<csv::Error> for AppError {
    fn from(e: csv::Error) -> Self {
        AppError::Data(format!("Error loading data: {}", e))
    }
}
