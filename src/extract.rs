use axum::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;

use crate::errors::AppError;

/// JSON body extractor that reports malformed payloads as field-keyed
/// validation errors (400) rather than axum's plain-text 422.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| AppError::bad_request(rejection.body_text()))?;

        parse(&bytes).map(ApiJson)
    }
}

/// Path extractor. Segments that do not parse into `T` (a malformed id)
/// cannot name an existing resource, so they answer 404.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(ApiPath(value)),
            Err(rejection) => {
                tracing::debug!(uri = %parts.uri, reason = %rejection.body_text(), "unmatched path parameter");
                Err(AppError::not_found("not found"))
            }
        }
    }
}

/// Query-string extractor reporting undecodable parameters as a JSON
/// validation error.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::try_from_uri(&parts.uri)
            .map(|Query(value)| ApiQuery(value))
            .map_err(|rejection| AppError::validation(NON_FIELD_ERRORS, rejection.body_text()))
    }
}

const NON_FIELD_ERRORS: &str = "non_field_errors";

fn parse<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, AppError> {
    // an empty body reads as an empty object so all-optional payloads work
    let bytes = if bytes.iter().all(u8::is_ascii_whitespace) { b"{}".as_slice() } else { bytes };

    let deserializer = &mut serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize(deserializer).map_err(|err| {
        let path = err.path().to_string();
        // syntax errors carry no usable path ("?" inside an unfinished object)
        let unkeyed = err.inner().is_syntax() || err.inner().is_eof() || matches!(path.as_str(), "" | "." | "?");
        let field = if unkeyed { NON_FIELD_ERRORS.to_string() } else { path };
        AppError::validation(field, err.into_inner().to_string())
    })
}
