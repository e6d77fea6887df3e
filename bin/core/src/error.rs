use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use dispider_client::error::{DispiderError, ErrorKind};
use serde_json::json;

fn status_for(kind: ErrorKind) -> StatusCode {
  match kind {
    ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
    ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
    ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
    ErrorKind::NotFound => StatusCode::NOT_FOUND,
    ErrorKind::Conflict => StatusCode::CONFLICT,
    ErrorKind::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
    ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

pub struct ApiError(pub DispiderError);

impl From<DispiderError> for ApiError {
  fn from(e: DispiderError) -> Self {
    Self(e)
  }
}

impl From<anyhow::Error> for ApiError {
  fn from(e: anyhow::Error) -> Self {
    Self(DispiderError::new(ErrorKind::Internal, e))
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = status_for(self.0.kind);
    tracing::error!(kind = %self.0.kind, "{:#}", self.0.source);
    let body = Json(json!({
      "code": status.as_u16(),
      "msg": format!("{:#}", self.0.source),
      "data": serde_json::Value::Null,
    }));
    (status, body).into_response()
  }
}

pub type ApiResult<T> = Result<T, ApiError>;
