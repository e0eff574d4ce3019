//! Facet relaxation and product query loop
//!
//! Turns a category's selected facets into a product list by querying the
//! catalog with the full constraint set and progressively dropping the
//! lowest-quantity facet until the query returns enough products or the
//! constraint set is exhausted.
//!
//! Dropping the least-stocked facet first keeps the broader queries anchored
//! on well-stocked, popular constraints, trading specificity for result
//! volume in the least damaging order.
//!
//! # Error handling
//! A transport failure from the catalog is treated exactly like an
//! insufficient result count: the loop drops one facet and tries the broader
//! query rather than retrying the same constraint set or aborting. The
//! shrinking set bounds the loop at `|facets| + 1` queries (the last attempt
//! is category-only). Exhaustion yields an empty list, an expected outcome.

use crate::types::{Product, ProductSearch, SelectedFacet};
use tracing::{debug, info, warn};

/// Query the catalog for `category`, relaxing `facets` until at least
/// `min_results` products come back.
///
/// Precondition: `facets` is sorted descending by quantity. Callers sort once
/// up front; the loop itself never re-sorts, it only pops from the tail.
///
/// Returns ALL products of the first sufficient query (not truncated to
/// `min_results`), or an empty list when every attempt falls short.
pub async fn build_products<S: ProductSearch + ?Sized>(
    catalog: &S,
    category: &str,
    facets: Vec<SelectedFacet>,
    min_results: usize,
) -> Vec<Product> {
    let mut remaining = facets;

    loop {
        debug!(
            category = %category,
            constraints = remaining.len(),
            "Querying catalog"
        );

        match catalog.search(category, &remaining).await {
            Ok(products) if products.len() >= min_results => {
                info!(
                    category = %category,
                    constraints = remaining.len(),
                    products = products.len(),
                    "Catalog query satisfied minimum result threshold"
                );
                return products;
            }
            Ok(products) => {
                debug!(
                    category = %category,
                    products = products.len(),
                    min_results,
                    "Insufficient results, relaxing constraints"
                );
            }
            Err(e) => {
                // Transient transport failure costs one relaxation step
                // instead of aborting the category.
                warn!(
                    category = %category,
                    error = %e,
                    "Catalog query failed, relaxing constraints"
                );
            }
        }

        // Last attempt was category-only; nothing left to relax.
        if remaining.pop().is_none() {
            info!(category = %category, "Facet relaxation exhausted, no products");
            return Vec::new();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CatalogError;
    use std::sync::Mutex;

    /// Scripted catalog: replays one response per query and records the
    /// constraint set each query carried.
    struct ScriptedCatalog {
        responses: Mutex<Vec<Result<Vec<Product>, CatalogError>>>,
        queries: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedCatalog {
        fn new(responses: Vec<Result<Vec<Product>, CatalogError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                queries: Mutex::new(Vec::new()),
            }
        }

        fn query_count(&self) -> usize {
            self.queries.lock().unwrap().len()
        }

        fn recorded_queries(&self) -> Vec<Vec<String>> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl ProductSearch for ScriptedCatalog {
        async fn search(
            &self,
            _category: &str,
            facets: &[SelectedFacet],
        ) -> Result<Vec<Product>, CatalogError> {
            self.queries.lock().unwrap().push(
                facets
                    .iter()
                    .map(|f| f.facet_type.clone())
                    .collect(),
            );
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(Vec::new())
            } else {
                responses.remove(0)
            }
        }
    }

    fn products(n: usize) -> Vec<Product> {
        (0..n)
            .map(|i| Product {
                product_name: format!("Product {i}"),
                link: Some(format!("/product-{i}/p")),
                items: vec![],
            })
            .collect()
    }

    fn facet(facet_type: &str, value: &str, quantity: u32) -> SelectedFacet {
        SelectedFacet {
            facet_type: facet_type.to_string(),
            selected_facet: value.to_string(),
            quantity,
        }
    }

    #[tokio::test]
    async fn test_first_query_sufficient_returns_all_products() {
        let catalog = ScriptedCatalog::new(vec![Ok(products(7))]);
        let facets = vec![
            facet("Colour", "Black", 12),
            facet("Material", "Gold", 9),
            facet("Style", "Vintage", 8),
            facet("Pattern", "Plain", 7),
            facet("Fit", "Slim", 6),
        ];

        let result = build_products(&catalog, "Necklace", facets, 5).await;

        assert_eq!(result.len(), 7, "all products returned, not just min_results");
        assert_eq!(catalog.query_count(), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_empty_after_n_plus_one_queries() {
        let catalog = ScriptedCatalog::new(vec![]);
        let facets = vec![
            facet("Colour", "Black", 12),
            facet("Material", "Gold", 3),
            facet("Style", "Vintage", 1),
        ];

        let result = build_products(&catalog, "Necklace", facets, 5).await;

        assert!(result.is_empty());
        assert_eq!(catalog.query_count(), 4, "3 facets plus the category-only query");
    }

    #[tokio::test]
    async fn test_relaxation_drops_lowest_quantity_facet() {
        // First query (3 constraints) returns 2 products, second query
        // (2 constraints) returns 6 and wins.
        let catalog = ScriptedCatalog::new(vec![Ok(products(2)), Ok(products(6))]);
        let facets = vec![
            facet("Colour", "Black", 12),
            facet("Material", "Gold", 3),
            facet("Style", "Vintage", 1),
        ];

        let result = build_products(&catalog, "Necklace", facets, 5).await;

        assert_eq!(result.len(), 6);
        assert_eq!(catalog.query_count(), 2);
        assert_eq!(
            catalog.recorded_queries(),
            vec![
                vec!["Colour".to_string(), "Material".to_string(), "Style".to_string()],
                vec!["Colour".to_string(), "Material".to_string()],
            ]
        );
    }

    #[tokio::test]
    async fn test_constraint_sets_shrink_monotonically_from_tail() {
        let catalog = ScriptedCatalog::new(vec![]);
        let facets = vec![
            facet("A", "a", 10),
            facet("B", "b", 8),
            facet("C", "c", 2),
        ];

        build_products(&catalog, "Watch", facets, 5).await;

        let queries = catalog.recorded_queries();
        for pair in queries.windows(2) {
            // Each step is the previous step minus exactly its last element.
            assert_eq!(pair[1], pair[0][..pair[0].len() - 1].to_vec());
        }
    }

    #[tokio::test]
    async fn test_transport_failure_costs_one_relaxation_step() {
        let catalog = ScriptedCatalog::new(vec![
            Err(CatalogError::Api(502, "bad gateway".to_string())),
            Ok(products(5)),
        ]);
        let facets = vec![facet("Colour", "Black", 12), facet("Style", "Boho", 2)];

        let result = build_products(&catalog, "Bracelet", facets, 5).await;

        assert_eq!(result.len(), 5);
        assert_eq!(catalog.query_count(), 2);
        // The failed query's constraint set was not retried.
        assert_eq!(catalog.recorded_queries()[1], vec!["Colour".to_string()]);
    }

    #[tokio::test]
    async fn test_no_facets_still_issues_category_only_query() {
        let catalog = ScriptedCatalog::new(vec![Ok(products(9))]);

        let result = build_products(&catalog, "Earrings", Vec::new(), 5).await;

        assert_eq!(result.len(), 9);
        assert_eq!(catalog.query_count(), 1);
        assert!(catalog.recorded_queries()[0].is_empty());
    }
}
