// crates/makerboard/src/api/actor.rs
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::api::ApiError;

pub const MEMBER_ID_HEADER: &str = "x-member-id";
pub const MEMBER_EMAIL_HEADER: &str = "x-member-email";

/// The member making the request, as vouched for by the identity provider
/// in front of the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub email: Option<String>,
}

impl Actor {
    /// Explicit contact address wins over the identity's.
    pub fn contact(&self, explicit: Option<String>) -> Option<String> {
        explicit
            .filter(|e| !e.trim().is_empty())
            .or_else(|| self.email.clone())
    }
}

fn header(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(parts, MEMBER_ID_HEADER).ok_or(ApiError::MissingIdentity)?;
        Ok(Actor {
            id,
            email: header(parts, MEMBER_EMAIL_HEADER),
        })
    }
}
