use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Lookup failure: {0}")]
    LookupFailure(String),

    #[error("Prediction failure: {0}")]
    PredictionFailure(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Insufficient ratings: user {user_id} has {count}, at least {required} required")]
    InsufficientRatings {
        user_id: u32,
        count: usize,
        required: usize,
    },

    #[error("Artifact error: {0}")]
    Artifact(String),

    #[error("Catalog error: {0}")]
    Catalog(#[from] csv::Error),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Scoring exceeded the {0} ms budget")]
    Timeout(u64),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            AppError::LookupFailure(_) | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InsufficientRatings { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::PredictionFailure(_) => StatusCode::BAD_GATEWAY,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Artifact(_) | AppError::Catalog(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
