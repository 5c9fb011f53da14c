//! Extractors whose rejections render as [`ServiceError`] bodies.

use axum::extract::{FromRequest, FromRequestParts};

use crate::errors::ServiceError;

/// `axum::Json` with malformed bodies reported as 400 `ErrorResponse`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ServiceError))]
pub struct AppJson<T>(pub T);

/// `axum::extract::Query` with bad query strings reported as 400.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ServiceError))]
pub struct AppQuery<T>(pub T);

/// `axum::extract::Path`; an id that does not parse is reported as 404.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ServiceError))]
pub struct AppPath<T>(pub T);
