use axum::extract::{FromRequest, FromRequestParts};

use crate::error::AppError;

// Thin wrappers over the stock extractors whose only job is to swap the
// rejection type for `AppError`.

/// JSON body extractor rejecting with the uniform 400 envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Path extractor rejecting with the uniform 400 envelope.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);

/// Query extractor rejecting with the uniform 400 envelope.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);
