use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use skiff_engine::EngineError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing X-User header")]
    MissingIdentity,

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingIdentity => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Engine(EngineError::Validation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Engine(EngineError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skiff_engine::StoreError;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(ApiError::MissingIdentity.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::NotFound("task abc".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Engine(EngineError::Validation("run is required".into())).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Engine(EngineError::Store(StoreError::Transport("down".into())))
                .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
