/**
 * Routes Module
 * API route handlers and the shared JSON envelope
 */
pub mod auth;
pub mod blobs;
pub mod events;
pub mod health;
pub mod organizers;
pub mod photographers;
pub mod photos;
pub mod tags;
pub mod users;

use axum::extract::FromRequest;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::validation;

/// `Json` whose rejections use the API envelope instead of plain text.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Envelope shared by every JSON endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
        }
    }
}

/// Path ids arrive as strings; anything that is not a positive integer is a 400.
pub fn parse_id(raw: &str) -> Result<i32, ApiError> {
    match raw.trim().parse::<i32>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::validation("Neplatné ID")),
    }
}

/// Trimmed plain text; blank becomes `None`. Stored as typed.
pub(crate) fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Markdown bodies (bios, descriptions) keep their formatting but lose
/// dangerous HTML.
pub(crate) fn clean_markdown(value: Option<String>) -> Option<String> {
    clean_text(value).map(|v| validation::sanitize_text(&v))
}

/// Blank becomes `None`; anything else must be an http(s) URL.
pub(crate) fn clean_url(value: Option<String>) -> Result<Option<String>, ApiError> {
    match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(url) => {
            validation::url(&url).map_err(ApiError::validation)?;
            Ok(Some(url))
        }
        None => Ok(None),
    }
}

/// A required name on create; on update only checked when present.
pub(crate) fn clean_name(value: Option<String>, required: bool) -> Result<Option<String>, ApiError> {
    match value.map(|v| v.trim().to_string()) {
        Some(name) if !name.is_empty() => Ok(Some(name)),
        Some(_) => Err(ApiError::validation("Název je povinný")),
        None if required => Err(ApiError::validation("Název je povinný")),
        None => Ok(None),
    }
}

/// `YYYY-MM-DD`; blank becomes `None`.
pub(crate) fn parse_date(value: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| ApiError::validation("Neplatné datum")),
        None => Ok(None),
    }
}
