//! Request extractors whose rejections use the gateway's error format.
//!
//! Axum's stock `Json`, `Query` and `Path` reject with plain-text bodies;
//! these wrappers turn every malformed input into
//! [`GatewayError::InvalidRequest`] before a handler runs.

use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;

use crate::app_state::AppState;
use crate::domain::UserId;
use crate::error::GatewayError;

/// Header carrying the caller's opaque identity.
pub const USER_ID_HEADER: &str = "x-user-id";

/// JSON body, rejected as `InvalidRequest` when malformed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(GatewayError::InvalidRequest(rejection.body_text())),
        }
    }
}

/// Query string, rejected as `InvalidRequest` when malformed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Self(value)),
            Err(rejection) => Err(GatewayError::InvalidRequest(rejection.body_text())),
        }
    }
}

/// Path parameters, rejected as `InvalidRequest` when malformed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(Self(value)),
            Err(rejection) => Err(GatewayError::InvalidRequest(rejection.body_text())),
        }
    }
}

/// Caller identity from `X-User-Id`; `None` is guest checkout.
///
/// The value is opaque: authentication happens upstream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallerIdentity(pub Option<UserId>);

impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(USER_ID_HEADER) else {
            return Ok(Self(None));
        };
        let value = value
            .to_str()
            .map_err(|_| GatewayError::InvalidRequest("X-User-Id must be visible ASCII".to_string()))?
            .trim();
        if value.is_empty() {
            return Ok(Self(None));
        }
        Ok(Self(Some(UserId::new(value))))
    }
}

/// Proof that the request carried the administrator bearer token.
#[derive(Debug, Clone, Copy)]
pub struct AdminGuard;

impl FromRequestParts<AppState> for AdminGuard {
    type Rejection = GatewayError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.admin_token.as_deref() else {
            tracing::warn!("admin route called but ADMIN_TOKEN is not configured");
            return Err(GatewayError::Unauthorized);
        };

        let presented = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(GatewayError::Unauthorized)?;

        if constant_time_eq::constant_time_eq(presented.trim().as_bytes(), expected.as_bytes()) {
            Ok(Self)
        } else {
            tracing::warn!("admin route called with a wrong token");
            Err(GatewayError::Unauthorized)
        }
    }
}
