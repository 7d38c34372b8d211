//! Request extractors.
//!
//! Admin and JSON endpoints reject bad input with the `{error, details}` body
//! built by `AppError`. The validate/register query never rejects: a query
//! that doesn't parse is missing input, which answers `FAILED`.

use std::convert::Infallible;

use axum::{
    extract::{FromRequest, FromRequestParts, Request},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::AppError;

/// JSON body in, JSON body out. A body that fails to parse is a `BadRequest`.
pub struct Json<T>(pub T);

impl<S, T> FromRequest<S> for Json<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let axum::Json(value) = axum::Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// Wraps the axum parts extractor of the same name with `AppError` as its rejection.
macro_rules! app_error_extractor {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        pub struct $name<T>(pub T);

        impl<S, T> FromRequestParts<S> for $name<T>
        where
            S: Send + Sync,
            T: DeserializeOwned + Send,
        {
            type Rejection = AppError;

            async fn from_request_parts(
                parts: &mut Parts,
                state: &S,
            ) -> Result<Self, Self::Rejection> {
                let axum::extract::$name(value) =
                    axum::extract::$name::<T>::from_request_parts(parts, state).await?;
                Ok(Self(value))
            }
        }
    };
}

app_error_extractor! {
    /// Query string for admin filters and `license-info`.
    Query
}

app_error_extractor! {
    /// Path segments: license keys, request ids, banned HWIDs.
    Path
}

/// `?license=&hwid=` for `/api/validate` and `/api/register`.
///
/// Absent or unparseable fields come through empty, so the decision logic
/// answers `FAILED` in plain text instead of a JSON rejection.
#[derive(Debug, Default, Deserialize)]
pub struct LicenseHwid {
    #[serde(default)]
    pub license: String,
    #[serde(default)]
    pub hwid: String,
}

impl<S: Send + Sync> FromRequestParts<S> for LicenseHwid {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match axum::extract::Query::<Self>::try_from_uri(&parts.uri) {
            Ok(axum::extract::Query(query)) => Ok(query),
            Err(rejection) => {
                tracing::debug!("unparseable license query: {}", rejection.body_text());
                Ok(Self::default())
            }
        }
    }
}
