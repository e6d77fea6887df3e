use serde::{Deserialize, Serialize};

/// The small set of error categories the core classifies every
/// domain failure into. The transport layer (bin/core/src/error.rs)
/// maps these onto HTTP status codes; this crate stays transport-agnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  InvalidArgument,
  Unauthenticated,
  PermissionDenied,
  NotFound,
  Conflict,
  ServiceUnavailable,
  Internal,
}

impl std::fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let s = match self {
      ErrorKind::InvalidArgument => "invalid_argument",
      ErrorKind::Unauthenticated => "unauthenticated",
      ErrorKind::PermissionDenied => "permission_denied",
      ErrorKind::NotFound => "not_found",
      ErrorKind::Conflict => "conflict",
      ErrorKind::ServiceUnavailable => "service_unavailable",
      ErrorKind::Internal => "internal",
    };
    f.write_str(s)
  }
}

/// A domain error carrying the classification needed to pick an HTTP
/// status code at the transport boundary, without the domain layer
/// knowing about HTTP at all.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {source:#}")]
pub struct DispiderError {
  pub kind: ErrorKind,
  #[source]
  pub source: anyhow::Error,
}

impl DispiderError {
  pub fn new(
    kind: ErrorKind,
    source: impl Into<anyhow::Error>,
  ) -> Self {
    Self {
      kind,
      source: source.into(),
    }
  }
}

pub type DispiderResult<T> = Result<T, DispiderError>;

/// Extension trait to tag an `anyhow::Result` with an [ErrorKind] at
/// the point a failure is first classified, mirroring how `serror`'s
/// `AddStatusCode` attaches a status code to a bare `anyhow::Error`.
pub trait WithErrorKind<T> {
  fn kind(self, kind: ErrorKind) -> DispiderResult<T>;
}

impl<T, E> WithErrorKind<T> for Result<T, E>
where
  E: Into<anyhow::Error>,
{
  fn kind(self, kind: ErrorKind) -> DispiderResult<T> {
    self.map_err(|e| DispiderError::new(kind, e.into()))
  }
}
