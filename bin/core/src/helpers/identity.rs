//! Stand-in boundary for the external auth collaborator (out of scope
//! per §1): reads a caller's identity and project role off headers an
//! upstream gateway is expected to set after verifying a token. Swap
//! this extractor for a real one without touching any handler.

use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;
use dispider_client::entities::user::{Identity, ProjectRole};

pub struct AuthedIdentity(pub Identity);

impl<S> FromRequestParts<S> for AuthedIdentity
where
  S: Send + Sync,
{
  type Rejection = (StatusCode, &'static str);

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &S,
  ) -> Result<Self, Self::Rejection> {
    let user_id = parts
      .headers
      .get("x-user-id")
      .and_then(|v| v.to_str().ok())
      .ok_or((StatusCode::UNAUTHORIZED, "missing x-user-id"))?
      .to_string();

    let is_super_admin = parts
      .headers
      .get("x-super-admin")
      .and_then(|v| v.to_str().ok())
      .map(|v| v == "true")
      .unwrap_or(false);

    let project_role = parts
      .headers
      .get("x-project-role")
      .and_then(|v| v.to_str().ok())
      .and_then(|v| match v {
        "owner" => Some(ProjectRole::Owner),
        "admin" => Some(ProjectRole::Admin),
        "member" => Some(ProjectRole::Member),
        _ => None,
      });

    Ok(AuthedIdentity(Identity { user_id, is_super_admin, project_role }))
  }
}

/// Worker endpoints are unauthenticated by identity, per §9's preserved
/// decision; this extractor always succeeds.
pub struct WorkerIdentity;

impl<S> FromRequestParts<S> for WorkerIdentity
where
  S: Send + Sync,
{
  type Rejection = std::convert::Infallible;

  async fn from_request_parts(
    _parts: &mut Parts,
    _state: &S,
  ) -> Result<Self, Self::Rejection> {
    Ok(WorkerIdentity)
  }
}
