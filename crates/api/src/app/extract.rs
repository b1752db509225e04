//! `Json` and `Query` extractors whose rejections use the API error body.
//!
//! A body or query string that fails to parse or deserialize answers
//! 400 `validation_error` instead of axum's plain-text 4xx.

use axum::{
    async_trait,
    extract::{
        FromRequest, FromRequestParts, Query, Request,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, request::Parts},
    response::Response,
    Json,
};

use crate::app::errors;

pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                rejection.body_text(),
            )),
        }
    }
}

pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    Query<T>: FromRequestParts<S, Rejection = QueryRejection>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Self(value)),
            Err(rejection) => Err(errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                rejection.body_text(),
            )),
        }
    }
}
