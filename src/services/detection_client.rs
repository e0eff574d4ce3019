//! Object detection service client
//!
//! Sends the uploaded image to the detection service together with the class
//! vocabulary (the catalog's category names) and receives labeled regions
//! plus the crop files the service wrote for each region.
//!
//! The service assigns every run an explicit run identifier and reports its
//! output paths in the response, so this client never scans output
//! directories for the "most recent" run.

use crate::types::{Detection, DetectionError, DetectionProvider, DetectionRun};
use base64::Engine as _;
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Detection can load a large model on first use; allow it time
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Detection service client
#[derive(Debug, Clone)]
pub struct DetectionClient {
    http_client: Client,
    base_url: String,
    /// Class vocabulary sent with every request
    classes: Vec<String>,
}

impl DetectionClient {
    pub fn new(base_url: impl Into<String>, classes: Vec<String>) -> Self {
        Self {
            http_client: Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.into(),
            classes,
        }
    }

}

#[async_trait::async_trait]
impl DetectionProvider for DetectionClient {
    async fn detect(&self, image_path: &Path) -> Result<DetectionRun, DetectionError> {
        let image_bytes = std::fs::read(image_path)
            .map_err(|e| DetectionError::Image(format!("{}: {e}", image_path.display())))?;

        let filename = image_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload");

        debug!(
            image = %image_path.display(),
            classes = self.classes.len(),
            "Requesting detection"
        );

        let response = self
            .http_client
            .post(format!("{}/detect", self.base_url))
            .json(&serde_json::json!({
                "image": base64::engine::general_purpose::STANDARD.encode(&image_bytes),
                "filename": filename,
                "classes": self.classes,
            }))
            .send()
            .await
            .map_err(|e| DetectionError::Network(format!("Detection request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(DetectionError::Api(status, body));
        }

        let payload: DetectResponse = response
            .json()
            .await
            .map_err(|e| DetectionError::Parse(format!("Detection response parse failed: {e}")))?;

        let mut crops: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
        let mut detections = Vec::with_capacity(payload.detections.len());
        for region in payload.detections {
            if let Some(crop_path) = region.crop_path {
                crops
                    .entry(region.category.clone())
                    .or_default()
                    .push(PathBuf::from(crop_path));
            }
            detections.push(Detection {
                category: region.category,
                confidence: region.confidence,
                bbox: region.bbox,
            });
        }

        let run = DetectionRun {
            run_id: payload.run_id,
            annotated_image: payload.annotated_image.map(PathBuf::from),
            detections,
            crops,
        };
        log_detections(&run);
        Ok(run)
    }
}

/// Log each detected region (class, confidence, bounding box)
pub fn log_detections(run: &DetectionRun) {
    for detection in &run.detections {
        info!(
            run_id = %run.run_id,
            category = %detection.category,
            confidence = format!("{:.2}", detection.confidence),
            bbox = ?detection.bbox,
            "Detected region"
        );
    }
    if run.detections.is_empty() {
        info!(run_id = %run.run_id, "No regions detected");
    }
}

/// Load the detection class vocabulary from a JSON file of the form
/// `{"category-3": ["Necklace", "Watch", ...]}`.
pub fn load_class_vocabulary(path: &Path) -> crate::error::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    let document: ClassVocabulary = serde_json::from_str(&content).map_err(|e| {
        crate::error::Error::Config(format!(
            "Malformed category file {}: {e}",
            path.display()
        ))
    })?;
    Ok(document.categories)
}

// ============================================================================
// Detection service response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct DetectResponse {
    run_id: Uuid,
    #[serde(default)]
    annotated_image: Option<String>,
    #[serde(default)]
    detections: Vec<DetectedRegion>,
}

#[derive(Debug, Deserialize)]
struct DetectedRegion {
    category: String,
    confidence: f32,
    bbox: [f32; 4],
    #[serde(default)]
    crop_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClassVocabulary {
    #[serde(rename = "category-3")]
    categories: Vec<String>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_response_parses_and_groups() {
        let json = r#"{
            "run_id": "9f9d3c1e-4a64-4b5d-8f31-0f0c6f1f2a3b",
            "annotated_image": "/runs/9f9d3c1e/annotated.jpg",
            "detections": [
                {
                    "category": "Necklace",
                    "confidence": 0.87,
                    "bbox": [10.0, 20.0, 110.0, 220.0],
                    "crop_path": "/runs/9f9d3c1e/crops/Necklace/0.jpg"
                },
                {
                    "category": "Necklace",
                    "confidence": 0.41,
                    "bbox": [5.0, 8.0, 55.0, 90.0],
                    "crop_path": "/runs/9f9d3c1e/crops/Necklace/1.jpg"
                }
            ]
        }"#;
        let payload: DetectResponse = serde_json::from_str(json).unwrap();
        assert_eq!(payload.detections.len(), 2);
        assert_eq!(payload.detections[0].category, "Necklace");
        assert!(payload.annotated_image.is_some());
    }

    #[test]
    fn test_detection_without_crop_is_kept_for_logging_only() {
        let json = r#"{
            "run_id": "9f9d3c1e-4a64-4b5d-8f31-0f0c6f1f2a3b",
            "detections": [
                { "category": "Watch", "confidence": 0.3, "bbox": [0,0,1,1] }
            ]
        }"#;
        let payload: DetectResponse = serde_json::from_str(json).unwrap();
        assert!(payload.detections[0].crop_path.is_none());
    }

    #[test]
    fn test_load_class_vocabulary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("categories.json");
        std::fs::write(&path, r#"{"category-3": ["Necklace", "Watch"]}"#).unwrap();

        let classes = load_class_vocabulary(&path).unwrap();
        assert_eq!(classes, vec!["Necklace".to_string(), "Watch".to_string()]);
    }

    #[test]
    fn test_malformed_class_vocabulary_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("categories.json");
        std::fs::write(&path, r#"{"wrong-key": []}"#).unwrap();
        assert!(load_class_vocabulary(&path).is_err());
    }
}
