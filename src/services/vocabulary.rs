//! Facet vocabulary store
//!
//! Per-category facet vocabularies live as flat JSON files, one per category,
//! in a configured directory. Each file carries the raw catalog facets
//! response shape:
//!
//! ```json
//! { "data": { "facets": { "facets": [
//!     { "name": "Colour", "values": [ { "name": "Black", "quantity": 12 } ] }
//! ] } } }
//! ```
//!
//! A category with no stored vocabulary yields an empty mapping and is
//! skipped by the pipeline; that is an expected state, not an error.
//! Navigational facet types (Price, Department, ...) are filtered out at
//! load time since scoring them against an image crop produces noise.

use crate::types::FacetCandidate;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Loads per-category facet vocabularies from a directory of JSON files
#[derive(Debug, Clone)]
pub struct VocabularyStore {
    facets_dir: PathBuf,
    excluded_facets: HashSet<String>,
}

impl VocabularyStore {
    pub fn new(facets_dir: impl Into<PathBuf>, excluded_facets: &[String]) -> Self {
        Self {
            facets_dir: facets_dir.into(),
            excluded_facets: excluded_facets.iter().cloned().collect(),
        }
    }

    /// Load the facet vocabulary for `category`.
    ///
    /// Returns facet types in file order, each with its candidate values.
    /// Missing or unreadable files yield an empty vocabulary (logged), which
    /// the pipeline treats as "skip this category".
    pub fn load(&self, category: &str) -> Vec<(String, Vec<FacetCandidate>)> {
        let path = self.facets_dir.join(format!("{category}.json"));
        if !path.exists() {
            debug!(category = %category, path = %path.display(), "No vocabulary file");
            return Vec::new();
        }

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!(category = %category, error = %e, "Vocabulary file unreadable");
                return Vec::new();
            }
        };

        let document: FacetDocument = match serde_json::from_str(&content) {
            Ok(document) => document,
            Err(e) => {
                warn!(category = %category, error = %e, "Vocabulary file malformed");
                return Vec::new();
            }
        };

        // Duplicate facet-type entries collapse: last occurrence wins, the
        // position of the first is kept. One facet type must never yield two
        // selected facets for the same category.
        let mut vocabulary: Vec<(String, Vec<FacetCandidate>)> = Vec::new();
        for facet in document.data.facets.facets {
            if self.excluded_facets.contains(&facet.name) {
                continue;
            }
            let candidates: Vec<FacetCandidate> = facet
                .values
                .into_iter()
                .map(|value| FacetCandidate {
                    name: value.name,
                    quantity: value.quantity,
                })
                .collect();
            match vocabulary.iter_mut().find(|(name, _)| *name == facet.name) {
                Some((_, existing)) => *existing = candidates,
                None => vocabulary.push((facet.name, candidates)),
            }
        }
        vocabulary
    }

}

// ============================================================================
// Vocabulary file shape
// ============================================================================

#[derive(Debug, Deserialize)]
struct FacetDocument {
    data: FacetData,
}

#[derive(Debug, Deserialize)]
struct FacetData {
    facets: FacetEnvelope,
}

#[derive(Debug, Deserialize)]
struct FacetEnvelope {
    #[serde(default)]
    facets: Vec<FacetEntry>,
}

#[derive(Debug, Deserialize)]
struct FacetEntry {
    name: String,
    #[serde(default)]
    values: Vec<FacetValue>,
}

#[derive(Debug, Deserialize)]
struct FacetValue {
    name: String,
    #[serde(default)]
    quantity: u32,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const SAMPLE: &str = r#"{
        "data": { "facets": { "facets": [
            {
                "name": "Colour",
                "quantity": 40,
                "values": [
                    { "name": "Black", "quantity": 12 },
                    { "name": "Gold", "quantity": 3 }
                ]
            },
            {
                "name": "Price",
                "values": [ { "name": "R0 - R500", "quantity": 99 } ]
            },
            {
                "name": "Style",
                "values": [ { "name": "Vintage", "quantity": 1 } ]
            }
        ] } }
    }"#;

    fn store_with(dir: &Path, excluded: &[&str]) -> VocabularyStore {
        let excluded: Vec<String> = excluded.iter().map(|s| s.to_string()).collect();
        VocabularyStore::new(dir, &excluded)
    }

    #[test]
    fn test_load_parses_nested_shape_in_file_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Necklace.json"), SAMPLE).unwrap();

        let store = store_with(dir.path(), &[]);
        let vocabulary = store.load("Necklace");

        assert_eq!(vocabulary.len(), 3);
        assert_eq!(vocabulary[0].0, "Colour");
        assert_eq!(
            vocabulary[0].1,
            vec![
                FacetCandidate { name: "Black".to_string(), quantity: 12 },
                FacetCandidate { name: "Gold".to_string(), quantity: 3 },
            ]
        );
    }

    #[test]
    fn test_excluded_facet_types_filtered() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Necklace.json"), SAMPLE).unwrap();

        let store = store_with(dir.path(), &["Price"]);
        let vocabulary = store.load("Necklace");

        let names: Vec<&str> = vocabulary.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["Colour", "Style"]);
    }

    #[test]
    fn test_missing_category_yields_empty_vocabulary() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(dir.path(), &[]);
        assert!(store.load("Watch").is_empty());
    }

    #[test]
    fn test_duplicate_facet_type_collapses_last_wins() {
        let duplicated = r#"{
            "data": { "facets": { "facets": [
                {
                    "name": "Colour",
                    "values": [ { "name": "Black", "quantity": 12 } ]
                },
                {
                    "name": "Material",
                    "values": [ { "name": "Gold plated", "quantity": 3 } ]
                },
                {
                    "name": "Colour",
                    "values": [ { "name": "Silver", "quantity": 4 } ]
                }
            ] } }
        }"#;
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Ring.json"), duplicated).unwrap();

        let store = store_with(dir.path(), &[]);
        let vocabulary = store.load("Ring");

        let names: Vec<&str> = vocabulary.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["Colour", "Material"]);
        // Last occurrence supplies the candidates
        assert_eq!(
            vocabulary[0].1,
            vec![FacetCandidate { name: "Silver".to_string(), quantity: 4 }]
        );
    }

    #[test]
    fn test_malformed_file_yields_empty_vocabulary() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Bracelet.json"), "{ not json").unwrap();

        let store = store_with(dir.path(), &[]);
        assert!(store.load("Bracelet").is_empty());
    }
}
