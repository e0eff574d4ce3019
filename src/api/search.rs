//! Search API handler
//!
//! `POST /search` accepts a multipart image upload and runs the full
//! pipeline synchronously on the request task. Admission is gated: a second
//! upload while one is in flight gets an immediate 409, never a queue slot.
//! The gate is acquired before the upload touches the shared uploads
//! directory, and the RAII permit releases it on every exit path.

use axum::{
    extract::{Multipart, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::pipeline::{CategoryResult, PipelineEvent};
use crate::types::SelectedFacet;
use crate::AppState;

/// POST /search response
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    /// Detection run identifier
    pub run_id: Uuid,
    /// Annotated image path, when the detector produced one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotated_image: Option<String>,
    /// Pipeline milestones in emission order, for progressive disclosure
    pub status_log: Vec<PipelineEvent>,
    /// Per-category recommendations
    pub categories: Vec<CategoryView>,
}

/// One category's rendered recommendations
#[derive(Debug, Serialize)]
pub struct CategoryView {
    pub category: String,
    /// Facets the first catalog query carried
    pub facets: Vec<SelectedFacet>,
    /// Up to `tuning.max_display` shoppable products; empty means
    /// "nothing found" for this category
    pub products: Vec<ProductView>,
}

/// One shoppable product tile
#[derive(Debug, Serialize)]
pub struct ProductView {
    pub name: String,
    /// Absolute storefront link
    pub link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// POST /search
///
/// Multipart body with one `image` part (JPEG or PNG, checked by file
/// signature rather than the client-supplied content type).
pub async fn search(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<SearchResponse>> {
    // Admission control first: the uploads directory and detection outputs
    // are shared mutable state, and this gate is what serializes access.
    let _permit = state.gate.try_acquire().ok_or_else(|| {
        ApiError::Conflict("A search is already running, try again later".to_string())
    })?;

    let (filename, image_bytes) = read_image_part(&mut multipart).await?;

    let kind = infer::get(&image_bytes).ok_or_else(|| {
        ApiError::BadRequest("Could not determine uploaded file type".to_string())
    })?;
    if !matches!(kind.mime_type(), "image/jpeg" | "image/png") {
        return Err(ApiError::BadRequest(format!(
            "Unsupported image type: {} (expected JPEG or PNG)",
            kind.mime_type()
        )));
    }

    let uploads_dir = &state.config.paths.uploads_dir;
    std::fs::create_dir_all(uploads_dir)?;
    let upload_path = uploads_dir.join(format!("{}-{}", Uuid::new_v4(), sanitize(&filename)));
    std::fs::write(&upload_path, &image_bytes)?;

    info!(path = %upload_path.display(), bytes = image_bytes.len(), "Upload saved");

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let _ = events_tx.send(PipelineEvent::UploadSaved {
        path: upload_path.display().to_string(),
    });

    let outcome = state.pipeline.run(&upload_path, &events_tx).await?;

    drop(events_tx);
    let mut status_log = Vec::new();
    while let Ok(event) = events_rx.try_recv() {
        status_log.push(event);
    }

    let categories = outcome
        .categories
        .into_iter()
        .map(|result| render_category(result, &state))
        .collect();

    Ok(Json(SearchResponse {
        run_id: outcome.run_id,
        annotated_image: outcome.annotated_image,
        status_log,
        categories,
    }))
}

/// Pull the image part out of the multipart body
async fn read_image_part(multipart: &mut Multipart) -> ApiResult<(String, Vec<u8>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {e}")))?
    {
        if field.name() == Some("image") {
            let filename = field.file_name().unwrap_or("upload.jpg").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {e}")))?;
            if bytes.is_empty() {
                return Err(ApiError::BadRequest("Uploaded image is empty".to_string()));
            }
            return Ok((filename, bytes.to_vec()));
        }
    }
    Err(ApiError::BadRequest(
        "Missing multipart field: image".to_string(),
    ))
}

/// Truncate to the display budget and join relative links with the
/// storefront base URL
fn render_category(result: CategoryResult, state: &AppState) -> CategoryView {
    let base = state
        .config
        .endpoints
        .storefront_base_url
        .trim_end_matches('/');
    let products = result
        .products
        .iter()
        .take(state.config.tuning.max_display)
        .map(|product| ProductView {
            name: product.product_name.clone(),
            link: format!("{base}{}", product.link.as_deref().unwrap_or("#")),
            image_url: product.first_image_url().map(String::from),
        })
        .collect();

    CategoryView {
        category: result.category,
        facets: result.facets,
        products,
    }
}

/// Keep uploaded filenames filesystem-safe
fn sanitize(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "upload.jpg".to_string()
    } else {
        cleaned
    }
}

/// Build search routes
pub fn search_routes() -> Router<AppState> {
    Router::new().route("/search", post(search))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_path_separators() {
        assert_eq!(sanitize("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize("photo 01.jpeg"), "photo_01.jpeg");
        assert_eq!(sanitize(""), "upload.jpg");
    }
}
