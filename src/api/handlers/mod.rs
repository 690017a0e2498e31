//! API request handlers

pub mod camera;
pub mod command;
pub mod docker;
pub mod health;
pub mod messages;
pub mod subscribe;

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::error::{RelayError, Result};

/// Unwrap a JSON body, reporting rejections as validation errors
pub(crate) fn json_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| RelayError::InvalidRequest(e.body_text()))
}
