//! Route handlers for the HTTP API.

pub mod health;
pub mod photos;

use axum::http::Uri;

use crate::error::AppError;

/// Fallback for unknown `/api` paths: a JSON 404 instead of an empty body.
pub async fn api_not_found(uri: Uri) -> AppError {
    AppError::from(shelf_core::Error::not_found("route", uri.path()))
}
