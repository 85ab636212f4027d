//! Image analysis handler

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use std::sync::Arc;
use tracing::{info, warn};

use petscan_worker::AnalysisReport;

use super::AppState;
use crate::api::error::ApiError;
use crate::api::middleware::Identity;

/// Multipart field carrying the upload
pub const IMAGE_FIELD: &str = "image";

/// Analyze an uploaded pet image
///
/// POST /api/pets/analyze
///
/// Expects a multipart body with an `image` part of an `image/*` type. The
/// upload is rejected before any worker starts if it is missing, empty, or
/// not an image.
pub async fn analyze_image(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalysisReport>, ApiError> {
    let mut multipart = multipart?;
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let content_type = field.content_type().map(str::to_string);
        let file_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await?;
        upload = Some((content_type, file_name, bytes));
        break;
    }

    let Some((content_type, file_name, bytes)) = upload.filter(|(_, _, b)| !b.is_empty()) else {
        warn!(user = %identity.email, "Analysis request without an image");
        return Err(ApiError::BadRequest("No image provided".into()));
    };

    if !content_type
        .as_deref()
        .is_some_and(|ct| ct.starts_with("image/"))
    {
        warn!(
            user = %identity.email,
            content_type = ?content_type,
            "Analysis request with a non-image upload"
        );
        return Err(ApiError::BadRequest("Only image files are allowed".into()));
    }

    info!(
        user = %identity.email,
        file_name = ?file_name,
        content_type = ?content_type,
        bytes = bytes.len(),
        analyzer = state.analyzer.description(),
        "Analyzing image"
    );

    let report = state.analyzer.analyze(&bytes).await?;
    Ok(Json(report))
}
