//! Search pipeline orchestrator
//!
//! Runs the complete detect → score → select → relax pipeline for one
//! uploaded image, synchronously on the calling task:
//!
//! 1. Detection localizes regions and writes one crop set per category
//! 2. Per category: the facet vocabulary is loaded (empty vocabulary skips
//!    the category), the first crop is scored against each facet type's
//!    candidate values, and one representative value is selected per type
//! 3. The selected facets are sorted descending by quantity once, then the
//!    relaxation loop queries the catalog
//!
//! # Error handling
//! Per-category isolation: a scorer or catalog failure in one category never
//! prevents the remaining categories from being processed. Per-facet-type
//! isolation inside a category likewise: a failed scoring call skips that
//! facet type and moves on. Only a detection failure aborts the run, since
//! nothing downstream can proceed without crops.

use crate::config::SearchTuning;
use crate::error::{Error, Result};
use crate::relaxation::build_products;
use crate::selection;
use crate::services::VocabularyStore;
use crate::types::{
    DetectionProvider, FacetCandidate, Product, ProductSearch, ScoredFacet, SelectedFacet,
    SimilarityScorer,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Pipeline milestone events for the presentation boundary
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    /// Upload persisted to the uploads directory
    UploadSaved { path: String },
    /// Detection run finished
    DetectionComplete {
        run_id: Uuid,
        categories: Vec<String>,
    },
    /// Facet scoring and selection finished for one category
    ScoringComplete {
        category: String,
        facets: Vec<SelectedFacet>,
    },
    /// Pipeline finished
    Done { categories: usize },
}

/// Final result for one category
#[derive(Debug, Clone, Serialize)]
pub struct CategoryResult {
    /// Detected category label
    pub category: String,
    /// Facets selected for this category, sorted descending by quantity
    /// (the constraint set the first catalog query carried)
    pub facets: Vec<SelectedFacet>,
    /// Products returned by the first sufficient query; empty when
    /// relaxation exhausted every constraint set
    pub products: Vec<Product>,
}

/// Outcome of one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    /// Run identifier assigned by the detection provider
    pub run_id: Uuid,
    /// Annotated image path, when the provider produced one
    pub annotated_image: Option<String>,
    /// Per-category results, in deterministic category order
    pub categories: Vec<CategoryResult>,
}

/// The detect → score → select → relax pipeline
pub struct SearchPipeline {
    detector: Arc<dyn DetectionProvider>,
    scorer: Arc<dyn SimilarityScorer>,
    catalog: Arc<dyn ProductSearch>,
    vocabulary: VocabularyStore,
    tuning: SearchTuning,
}

impl SearchPipeline {
    pub fn new(
        detector: Arc<dyn DetectionProvider>,
        scorer: Arc<dyn SimilarityScorer>,
        catalog: Arc<dyn ProductSearch>,
        vocabulary: VocabularyStore,
        tuning: SearchTuning,
    ) -> Self {
        Self {
            detector,
            scorer,
            catalog,
            vocabulary,
            tuning,
        }
    }

    /// Run the pipeline on one uploaded image.
    ///
    /// Milestone events are emitted to `events` best-effort; a dropped
    /// receiver never fails the run.
    pub async fn run(
        &self,
        image_path: &Path,
        events: &mpsc::UnboundedSender<PipelineEvent>,
    ) -> Result<SearchOutcome> {
        let run = self
            .detector
            .detect(image_path)
            .await
            .map_err(Error::Detection)?;

        let category_names: Vec<String> = run.categories().map(String::from).collect();
        info!(
            run_id = %run.run_id,
            categories = ?category_names,
            "Detection complete"
        );
        let _ = events.send(PipelineEvent::DetectionComplete {
            run_id: run.run_id,
            categories: category_names.clone(),
        });

        let mut categories = Vec::new();
        for category in &category_names {
            // categories() only yields entries with at least one crop
            let crops = &run.crops[category];
            if let Some(result) = self.process_category(category, crops, events).await {
                categories.push(result);
            }
        }

        let _ = events.send(PipelineEvent::Done {
            categories: categories.len(),
        });

        Ok(SearchOutcome {
            run_id: run.run_id,
            annotated_image: run
                .annotated_image
                .as_ref()
                .map(|p| p.display().to_string()),
            categories,
        })
    }

    /// Score, select and query for one category. Failures are absorbed here:
    /// the category yields empty products rather than aborting the run.
    /// A category with no stored vocabulary is skipped outright.
    async fn process_category(
        &self,
        category: &str,
        crops: &[std::path::PathBuf],
        events: &mpsc::UnboundedSender<PipelineEvent>,
    ) -> Option<CategoryResult> {
        let vocabulary = self.vocabulary.load(category);
        if vocabulary.is_empty() {
            info!(category = %category, "No facet vocabulary, skipping category");
            return None;
        }

        // Only the first crop per category is scored
        let crop = &crops[0];

        let mut facets = Vec::new();
        for (facet_type, candidates) in &vocabulary {
            if candidates.is_empty() {
                continue;
            }
            match self.select_for_facet_type(crop, facet_type, candidates).await {
                Ok(Some(selected)) => {
                    debug!(
                        category = %category,
                        facet_type = %facet_type,
                        selected = %selected.selected_facet,
                        quantity = selected.quantity,
                        "Facet selected"
                    );
                    facets.push(selected);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        category = %category,
                        facet_type = %facet_type,
                        error = %e,
                        "Facet scoring failed, skipping facet type"
                    );
                }
            }
        }

        // Relaxation precondition: sorted descending by quantity, once.
        facets.sort_by(|a, b| b.quantity.cmp(&a.quantity));

        let _ = events.send(PipelineEvent::ScoringComplete {
            category: category.to_string(),
            facets: facets.clone(),
        });

        let products = build_products(
            self.catalog.as_ref(),
            category,
            facets.clone(),
            self.tuning.min_results,
        )
        .await;

        Some(CategoryResult {
            category: category.to_string(),
            facets,
            products,
        })
    }

    /// Score one facet type's candidates against the crop and select one
    async fn select_for_facet_type(
        &self,
        crop: &Path,
        facet_type: &str,
        candidates: &[FacetCandidate],
    ) -> Result<Option<SelectedFacet>> {
        let labels: Vec<String> = candidates.iter().map(|c| c.name.clone()).collect();
        let ranked = self
            .scorer
            .score(crop, &labels)
            .await
            .map_err(Error::Scorer)?;

        // Re-attach quantities to the ranked labels
        let scored: Vec<ScoredFacet> = ranked
            .into_iter()
            .filter_map(|(name, score)| {
                candidates
                    .iter()
                    .find(|c| c.name == name)
                    .map(|c| ScoredFacet {
                        name,
                        score,
                        quantity: c.quantity,
                    })
            })
            .collect();

        Ok(selection::select(
            facet_type,
            &scored,
            self.tuning.shortlist_size,
            self.tuning.quantity_floor,
        ))
    }
}
