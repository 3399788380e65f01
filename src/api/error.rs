use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or inconsistent identifier in the request.
    #[error("{message}")]
    Validation {
        entity_name: &'static str,
        error_key: &'static str,
        message: String,
    },

    /// Identifier supplied where the store owns the namespace.
    #[error("{message}")]
    Conflict {
        entity_name: &'static str,
        error_key: &'static str,
        message: String,
    },

    #[error("{entity_name} {id} not found")]
    NotFound { entity_name: &'static str, id: i64 },

    #[error("Invalid search query: {0}")]
    InvalidQuery(String),

    #[error("Search index unavailable: {0:#}")]
    IndexUnavailable(anyhow::Error),

    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_key: Option<String>,
}

impl ApiError {
    pub fn validation(entity_name: &'static str, error_key: &'static str, message: &str) -> Self {
        Self::Validation {
            entity_name,
            error_key,
            message: message.to_string(),
        }
    }

    pub fn conflict(entity_name: &'static str, error_key: &'static str, message: &str) -> Self {
        Self::Conflict {
            entity_name,
            error_key,
            message: message.to_string(),
        }
    }

    pub fn not_found(entity_name: &'static str, id: i64) -> Self {
        Self::NotFound { entity_name, id }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } | Self::Conflict { .. } | Self::InvalidQuery(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::IndexUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn entity_name(&self) -> Option<&'static str> {
        match self {
            Self::Validation { entity_name, .. }
            | Self::Conflict { entity_name, .. }
            | Self::NotFound { entity_name, .. } => Some(*entity_name),
            _ => None,
        }
    }

    fn error_key(&self) -> Option<&'static str> {
        match self {
            Self::Validation { error_key, .. } | Self::Conflict { error_key, .. } => Some(*error_key),
            Self::NotFound { .. } => Some("idnotfound"),
            Self::InvalidQuery(_) => Some("queryinvalid"),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("Request failed: {:#}", self);
        }

        let body = ErrorResponse {
            error: self.to_string(),
            status: status.as_u16(),
            entity_name: self.entity_name().map(str::to_string),
            error_key: self.error_key().map(str::to_string),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_status_codes() {
        assert_eq!(
            ApiError::validation("instance", "idnull", "Invalid id").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::conflict("instance", "idexists", "exists").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::not_found("instance", 4).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::InvalidQuery("Failed to parse query".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::IndexUnavailable(anyhow::anyhow!("connection refused")).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::from(anyhow::anyhow!("pool timed out")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn response_body_names_entity_and_key() {
        let response = ApiError::validation("wMISComponent", "idinvalid", "Invalid ID").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(body["error"], "Invalid ID");
        assert_eq!(body["entityName"], "wMISComponent");
        assert_eq!(body["errorKey"], "idinvalid");
        assert_eq!(body["status"], 400);
    }
}
