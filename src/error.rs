//! Error taxonomy for OCR requests.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use crate::render;

/// Per-request failure, reported back to the page that submitted it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OcrError {
    /// Bad or missing input, rejected before any remote call.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The file could not be handed to the provider.
    #[error("Upload failed: {0}")]
    Upload(String),

    /// The provider's OCR call failed.
    #[error("OCR API error: {0}")]
    OcrCall(String),
}

impl OcrError {
    pub fn status(&self) -> StatusCode {
        match self {
            OcrError::Validation(_) => StatusCode::BAD_REQUEST,
            OcrError::Upload(_) => StatusCode::UNPROCESSABLE_ENTITY,
            OcrError::OcrCall(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Render the form page with this error, keeping the submitted URL in its field.
    pub fn into_page(self, url: Option<&str>) -> Response {
        match &self {
            OcrError::Validation(msg) => tracing::info!("Rejected request: {}", msg),
            OcrError::Upload(msg) => tracing::warn!("Upload error: {}", msg),
            OcrError::OcrCall(msg) => tracing::error!("OCR call error: {}", msg),
        }

        (self.status(), Html(render::error_page(&self, url))).into_response()
    }
}

impl IntoResponse for OcrError {
    fn into_response(self) -> Response {
        self.into_page(None)
    }
}
