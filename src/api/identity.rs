//! Request extractors: caller identity and validated JSON bodies.

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap},
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::api::AppState;
use crate::domain::value_objects::{Identity, SessionId};
use crate::ShopError;

pub const SESSION_HEADER: &str = "x-session-id";
pub const SESSION_COOKIE: &str = "session_id";

/// Token from `Authorization: Bearer <t>` (or DRF-style `Token <t>`).
fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, ShopError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| ShopError::Unauthorized("Invalid token header.".into()))?;
    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or_else(|| ShopError::Unauthorized("Invalid token header.".into()))?;
    if !(scheme.eq_ignore_ascii_case("bearer") || scheme.eq_ignore_ascii_case("token")) {
        return Err(ShopError::Unauthorized("Unsupported authorization scheme.".into()));
    }
    Ok(Some(token))
}

fn cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|line| line.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find_map(|(key, value)| (key == name).then_some(value))
}

/// Header first, cookie second; blank values count as absent.
fn session_token(headers: &HeaderMap) -> Result<Option<SessionId>, ShopError> {
    let from_header = headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(SessionId::parse)
        .transpose()?
        .flatten();
    match from_header {
        Some(session) => Ok(Some(session)),
        None => cookie(headers, SESSION_COOKIE).map(SessionId::parse).transpose().map(Option::flatten),
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Identity {
    type Rejection = ShopError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let principal = match bearer_token(&parts.headers)? {
            Some(token) => Some(state.services.identity.authenticate(token).await?),
            None => None,
        };
        let session = session_token(&parts.headers)?;
        Ok(Identity { principal, session })
    }
}

/// `Json<T>` that also runs `validator` rules; both failures surface as `Validation`.
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ShopError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ShopError::validation(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn header_beats_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; session_id=from-cookie"));
        assert_eq!(session_token(&headers).unwrap().unwrap().as_str(), "from-cookie");

        headers.insert(SESSION_HEADER, HeaderValue::from_static("from-header"));
        assert_eq!(session_token(&headers).unwrap().unwrap().as_str(), "from-header");
    }

    #[test]
    fn blank_session_header_falls_back() {
        let mut headers = HeaderMap::new();
        headers.insert(SESSION_HEADER, HeaderValue::from_static("  "));
        assert!(session_token(&headers).unwrap().is_none());
    }

    #[test]
    fn authorization_schemes() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers).unwrap(), None);
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers).unwrap(), Some("abc"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Token abc"));
        assert_eq!(bearer_token(&headers).unwrap(), Some("abc"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_err());
    }
}
