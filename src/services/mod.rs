//! Service clients and stores for the search pipeline
//!
//! Each external collaborator gets a narrow client implementing the matching
//! trait from `types`, plus the filesystem-backed facet vocabulary store.

pub mod catalog_client;
pub mod detection_client;
pub mod scorer_client;
pub mod vocabulary;

pub use catalog_client::CatalogClient;
pub use detection_client::{load_class_vocabulary, log_detections, DetectionClient};
pub use scorer_client::ScorerClient;
pub use vocabulary::VocabularyStore;
