use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("MQTT error: {0}")]
    Mqtt(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid Device ID: {0:?}")]
    InvalidDeviceId(String),

    #[error("Invalid payload on {topic}: {reason}")]
    InvalidPayload { topic: String, reason: String },

    #[error("Unexpected topic: {0}")]
    UnknownTopic(String),

    #[error("Unknown outlet: {0}")]
    UnknownOutlet(String),

    #[error("Unsupported command: {0}")]
    Unsupported(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn invalid_payload(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::InvalidPayload {
            topic: topic.into(),
            reason: reason.into(),
        }
    }

    /// Short machine-readable code sent to websocket clients alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG",
            AppError::Mqtt(_) => "MQTT",
            AppError::Json(_) | AppError::Yaml(_) => "SERIALIZATION",
            AppError::Io(_) => "IO",
            AppError::Auth(_) => "UNAUTHORIZED",
            AppError::InvalidDeviceId(_) => "INVALID_DEVICE_ID",
            AppError::InvalidPayload { .. } => "INVALID_PAYLOAD",
            AppError::UnknownTopic(_) => "UNKNOWN_TOPIC",
            AppError::UnknownOutlet(_) => "UNKNOWN_OUTLET",
            AppError::Unsupported(_) => "UNSUPPORTED",
            AppError::Internal(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Json(ref e) => {
                tracing::warn!("Serialization error: {:?}", e);
                (StatusCode::BAD_REQUEST, "Invalid data format".to_string())
            }
            AppError::Auth(_) => {
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }
            AppError::UnknownOutlet(ref outlet) => (
                StatusCode::NOT_FOUND,
                format!("Outlet {} not found", outlet),
            ),
            AppError::InvalidDeviceId(_)
            | AppError::InvalidPayload { .. }
            | AppError::Unsupported(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ref other => {
                tracing::error!("Internal error: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
