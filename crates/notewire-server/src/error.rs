use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use notewire_store::StoreError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("hub error: {0}")]
    Hub(#[from] notewire_hub::HubError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ServerError::Store(StoreError::InvalidPath(_)) => {
                (StatusCode::BAD_REQUEST, "Invalid path.\n".to_string())
            }
            ServerError::Store(StoreError::StorageFull { .. }) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Storage is overloaded.\n".to_string(),
            ),
            ServerError::Store(StoreError::ContentTooLarge { max, .. }) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("Note is too large to save. Maximum size is {}KB.\n", max / 1024),
            ),
            _ => {
                tracing::error!(error = %self, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error.\n".to_string(),
                )
            }
        };
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_client_statuses() {
        let resp = ServerError::Store(StoreError::InvalidPath("..".into())).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = ServerError::Store(StoreError::StorageFull {
            needed: 10,
            ceiling: 5,
        })
        .into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        let resp = ServerError::Store(StoreError::ContentTooLarge { size: 9, max: 8 })
            .into_response();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn io_errors_are_internal() {
        let err = ServerError::Io(std::io::Error::other("disk gone"));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
