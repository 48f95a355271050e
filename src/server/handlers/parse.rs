//! `POST /parseReceipt`.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::{info, warn};

use super::super::AppState;
use crate::error::{ReceiptError, RemoteErrorKind};
use crate::extraction::{CallableError, CallableErrorBody, ParseReceiptRequest, INVALID_JSON_MESSAGE};

/// A classified failure rendered as `{"error": {"kind", "message"}}`.
#[derive(Debug)]
pub struct ApiError {
    pub kind: RemoteErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<ReceiptError> for ApiError {
    fn from(e: ReceiptError) -> Self {
        Self::new(e.remote_kind(), wire_message(&e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.kind.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = CallableErrorBody {
            error: CallableError {
                kind: self.kind,
                message: self.message,
            },
        };
        (status, Json(body)).into_response()
    }
}

/// Message sent to the client for an error.
///
/// Parse failures always carry the fixed invalid-JSON message so the client
/// can map them back to a parsing error.
pub fn wire_message(e: &ReceiptError) -> String {
    match e {
        ReceiptError::Parsing { .. } => INVALID_JSON_MESSAGE.to_string(),
        ReceiptError::ImageProcessing(m)
        | ReceiptError::Authentication(m)
        | ReceiptError::QuotaExceeded(m)
        | ReceiptError::Network(m)
        | ReceiptError::NotFound(m)
        | ReceiptError::SaveFailed(m) => m.clone(),
        ReceiptError::Service { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

/// Map a body rejection to a wire error. Only a well-formed body without
/// image data counts as "missing".
fn rejection_error(rejection: &JsonRejection) -> ApiError {
    let message = match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            "Request body must be JSON (application/json).".to_string()
        }
        JsonRejection::JsonSyntaxError(_) => "Request body is not valid JSON.".to_string(),
        JsonRejection::JsonDataError(_) => "Request body has an invalid shape.".to_string(),
        _ if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            "Image data is too large.".to_string()
        }
        _ => rejection.body_text(),
    };
    ApiError::new(RemoteErrorKind::InvalidArgument, message)
}

pub async fn parse_receipt(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ParseReceiptRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let identity = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| state.tokens.resolve_bearer(v))
        .ok_or_else(|| {
            ApiError::new(
                RemoteErrorKind::Unauthenticated,
                "User must be authenticated to parse receipts.",
            )
        })?;

    let Json(request) = body.map_err(|rejection| {
        warn!(owner = %identity.user_id, "Rejected parseReceipt body: {}", rejection);
        rejection_error(&rejection)
    })?;

    let image_base64 = request.image_base64;
    if image_base64.trim().is_empty() {
        return Err(ApiError::new(
            RemoteErrorKind::InvalidArgument,
            "Image data is required.",
        ));
    }

    info!(owner = %identity.user_id, "Parsing receipt ({} base64 bytes)", image_base64.len());

    match state.vision.parse_base64(&image_base64).await {
        Ok(candidate) => Ok(Json(candidate)),
        Err(e) => {
            warn!(owner = %identity.user_id, "Receipt parse failed: {}", e);
            Err(e.into())
        }
    }
}
