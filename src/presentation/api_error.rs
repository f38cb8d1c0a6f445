// HTTP error mapping
use crate::application::dashboard_service::ServiceError;
use crate::application::pipeline::PipelineError;
use crate::infrastructure::config::ConfigError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let status = match &err {
            ServiceError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            ServiceError::UnknownChannel(_) => StatusCode::NOT_FOUND,
            ServiceError::NoRangeSelected
            | ServiceError::Pipeline(PipelineError::InvalidRange(_))
            | ServiceError::Pipeline(PipelineError::InvalidOptions(_)) => StatusCode::BAD_REQUEST,
        };
        Self::new(status, err.to_string())
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("Request failed: {}", self.message);
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
