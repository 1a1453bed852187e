use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use storefront_orders::{ErrorKind, OrderError};

/// HTTP status for an order failure.
pub fn status_for(err: &OrderError) -> StatusCode {
    match err.kind() {
        ErrorKind::InvalidInput | ErrorKind::CartRejected => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::Persistence => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn order_error_to_response(err: OrderError) -> axum::response::Response {
    let status = status_for(&err);
    let message = match &err {
        OrderError::Persistence { retryable, .. } => {
            tracing::warn!(error = %err, retryable, "request failed in storage");
            if *retryable {
                "the request could not be completed, please retry".to_string()
            } else {
                "the request could not be completed".to_string()
            }
        }
        OrderError::Unauthorized => "unauthorized".to_string(),
        other => other.to_string(),
    };
    json_error(status, err.code(), message)
}

pub fn json_rejection_to_response(rejection: JsonRejection) -> axum::response::Response {
    json_error(
        StatusCode::BAD_REQUEST,
        "invalid_input",
        format!("invalid request body: {}", rejection.body_text()),
    )
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "status": "error",
            "code": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_core::ProductId;
    use storefront_orders::OrderStatus;

    #[test]
    fn stock_and_lookup_failures_are_client_errors() {
        let shortage = OrderError::InsufficientStock {
            product_id: ProductId::new(),
            requested: 2,
            available: 1,
        };
        assert_eq!(status_for(&shortage), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&OrderError::ProductNotFound { product_id: ProductId::new() }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_for(&OrderError::OrderNotFound), StatusCode::NOT_FOUND);
    }

    #[test]
    fn lifecycle_and_storage_failures() {
        let transition = OrderError::InvalidStatusTransition {
            from: OrderStatus::Delivered,
            to: OrderStatus::Pending,
        };
        assert_eq!(status_for(&transition), StatusCode::CONFLICT);
        assert_eq!(
            status_for(&OrderError::persistence("deadlock", true)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
