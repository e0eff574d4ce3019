//! Core types and trait definitions for stylelens
//!
//! Defines the data model shared by the pipeline stages and the trait seams
//! for the external collaborators:
//! - **DetectionProvider**: image -> labeled regions with per-category crops
//! - **SimilarityScorer**: crop + label list -> ranked (label, score) pairs
//! - **ProductSearch**: category + facet constraints -> products
//!
//! The pipeline holds collaborators as trait objects so tests can substitute
//! in-process mocks for the remote services.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Facet data model
// ============================================================================

/// One candidate value for a facet type, as stored in the vocabulary.
///
/// `quantity` is the number of catalog items currently carrying this value.
/// It is a tie-break signal during selection, never a ranking signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetCandidate {
    /// Facet value (e.g., "Black" for facet type "Colour")
    pub name: String,
    /// Catalog inventory count for this value
    pub quantity: u32,
}

/// A facet candidate annotated with a similarity score against one crop.
///
/// Ephemeral: produced by the scorer, consumed by selection within one call.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredFacet {
    /// Facet value
    pub name: String,
    /// Similarity score in [0.0, 1.0]
    pub score: f32,
    /// Catalog inventory count carried over from the candidate
    pub quantity: u32,
}

/// The chosen representative value for one facet type within one category.
///
/// At most one exists per (category, facet_type) pair per run. Collected into
/// an ordered set that the relaxation loop shrinks from the low-quantity end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedFacet {
    /// Facet type name (e.g., "Colour")
    pub facet_type: String,
    /// Selected facet value (e.g., "Black")
    pub selected_facet: String,
    /// Inventory count of the selected value
    pub quantity: u32,
}

// ============================================================================
// Catalog products
// ============================================================================

/// A product record returned by the catalog API.
///
/// Opaque to the core: the pipeline only counts and forwards these. `link` is
/// relative; the presentation layer joins it with the storefront base URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Display name
    #[serde(rename = "productName")]
    pub product_name: String,
    /// Storefront-relative link
    #[serde(default)]
    pub link: Option<String>,
    /// Sellable items, each with zero or more images
    #[serde(default)]
    pub items: Vec<ProductItem>,
}

/// One sellable item of a product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductItem {
    /// Image references for this item
    #[serde(default)]
    pub images: Vec<ProductImage>,
}

/// Image reference on a product item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductImage {
    /// Absolute image URL
    #[serde(rename = "imageUrl")]
    pub image_url: String,
}

impl Product {
    /// First image URL across items, if any
    pub fn first_image_url(&self) -> Option<&str> {
        self.items
            .iter()
            .flat_map(|item| item.images.iter())
            .map(|img| img.image_url.as_str())
            .next()
    }
}

// ============================================================================
// Detection
// ============================================================================

/// One detected region within the uploaded image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    /// Detected category label (e.g., "Necklace")
    pub category: String,
    /// Detector confidence in [0.0, 1.0]
    pub confidence: f32,
    /// Bounding box as [x1, y1, x2, y2] pixel coordinates
    pub bbox: [f32; 4],
}

/// Result of one detection run.
///
/// The provider assigns an explicit `run_id` and reports the crop files it
/// wrote, so downstream stages never have to guess which output directory
/// belongs to this run.
#[derive(Debug, Clone)]
pub struct DetectionRun {
    /// Identifier assigned by the detection provider for this run
    pub run_id: Uuid,
    /// Annotated copy of the input image (bounding boxes drawn), if produced
    pub annotated_image: Option<PathBuf>,
    /// Raw detections for logging
    pub detections: Vec<Detection>,
    /// Crop image paths grouped by detected category.
    ///
    /// BTreeMap keeps category iteration order deterministic across runs.
    pub crops: BTreeMap<String, Vec<PathBuf>>,
}

impl DetectionRun {
    /// Categories that produced at least one crop, in deterministic order
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.crops
            .iter()
            .filter(|(_, crops)| !crops.is_empty())
            .map(|(category, _)| category.as_str())
    }
}

// ============================================================================
// Collaborator traits
// ============================================================================

/// Detection provider errors
#[derive(Debug, Error)]
pub enum DetectionError {
    /// Network communication error
    #[error("Network error: {0}")]
    Network(String),

    /// Detection service returned an error response
    #[error("Detection service error {0}: {1}")]
    Api(u16, String),

    /// Failed to parse the service response
    #[error("Parse error: {0}")]
    Parse(String),

    /// Input image unreadable or missing
    #[error("Image error: {0}")]
    Image(String),
}

/// Object detection collaborator.
///
/// Localizes clothing/accessory regions in an image and persists one crop per
/// region, grouped by category. Categories with no crops are simply absent
/// from the result.
#[async_trait::async_trait]
pub trait DetectionProvider: Send + Sync {
    /// Run detection on `image_path`, returning crops keyed by category
    async fn detect(&self, image_path: &std::path::Path) -> Result<DetectionRun, DetectionError>;
}

/// Similarity scorer errors
#[derive(Debug, Error)]
pub enum ScorerError {
    /// Network communication error
    #[error("Network error: {0}")]
    Network(String),

    /// Scorer service returned an error response
    #[error("Scorer service error {0}: {1}")]
    Api(u16, String),

    /// Failed to parse the service response
    #[error("Parse error: {0}")]
    Parse(String),

    /// Scorer response did not cover every input label exactly once
    #[error("Label coverage mismatch: {0}")]
    LabelMismatch(String),

    /// Input crop unreadable or missing
    #[error("Image error: {0}")]
    Image(String),
}

/// Similarity scoring collaborator.
///
/// Scores one image crop against a list of candidate text labels. The result
/// covers every input label exactly once and is ranked descending by score.
#[async_trait::async_trait]
pub trait SimilarityScorer: Send + Sync {
    /// Score `labels` against the crop at `image_path`, ranked descending
    async fn score(
        &self,
        image_path: &std::path::Path,
        labels: &[String],
    ) -> Result<Vec<(String, f32)>, ScorerError>;
}

/// Catalog API errors
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Network communication error
    #[error("Network error: {0}")]
    Network(String),

    /// Catalog API returned a non-success status
    #[error("Catalog API error {0}: {1}")]
    Api(u16, String),

    /// Failed to parse the API response
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Product catalog search collaborator.
///
/// Executes one structured query: a fixed category constraint plus zero or
/// more facet constraints. The relaxation loop treats any error from this
/// call exactly like an insufficient result count.
#[async_trait::async_trait]
pub trait ProductSearch: Send + Sync {
    /// Query products matching `category` and all of `facets`
    async fn search(
        &self,
        category: &str,
        facets: &[SelectedFacet],
    ) -> Result<Vec<Product>, CatalogError>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_image_url_skips_imageless_items() {
        let product = Product {
            product_name: "Gold Pendant".to_string(),
            link: Some("/gold-pendant/p".to_string()),
            items: vec![
                ProductItem { images: vec![] },
                ProductItem {
                    images: vec![ProductImage {
                        image_url: "https://img.example/p.jpg".to_string(),
                    }],
                },
            ],
        };
        assert_eq!(product.first_image_url(), Some("https://img.example/p.jpg"));
    }

    #[test]
    fn test_first_image_url_none_when_no_images() {
        let product = Product {
            product_name: "Plain".to_string(),
            link: None,
            items: vec![ProductItem { images: vec![] }],
        };
        assert_eq!(product.first_image_url(), None);
    }

    #[test]
    fn test_detection_run_categories_skips_empty() {
        let mut crops = BTreeMap::new();
        crops.insert("Necklace".to_string(), vec![PathBuf::from("a.jpg")]);
        crops.insert("Watch".to_string(), vec![]);
        let run = DetectionRun {
            run_id: Uuid::new_v4(),
            annotated_image: None,
            detections: vec![],
            crops,
        };
        let categories: Vec<&str> = run.categories().collect();
        assert_eq!(categories, vec!["Necklace"]);
    }

    #[test]
    fn test_product_deserializes_catalog_shape() {
        let json = r#"{
            "productName": "Vintage Ring",
            "link": "/vintage-ring/p",
            "items": [{"images": [{"imageUrl": "https://img.example/r.jpg"}]}]
        }"#;
        let product: Product = serde_json::from_str(json).unwrap();
        assert_eq!(product.product_name, "Vintage Ring");
        assert_eq!(product.link.as_deref(), Some("/vintage-ring/p"));
        assert_eq!(product.first_image_url(), Some("https://img.example/r.jpg"));
    }
}
