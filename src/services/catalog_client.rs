//! Product catalog GraphQL client
//!
//! Executes VTEX-style `productSearch` queries against the storefront's
//! GraphQL endpoint. One query carries the fixed category constraint
//! (`category-3` tree level) plus one selected-facet constraint per entry;
//! the relaxation loop owns how many constraints each attempt carries.
//!
//! Unavailable items are hidden at the source (`hideUnavailableItems`) and
//! each product reports its first available item's images.

use crate::types::{CatalogError, Product, ProductSearch, SelectedFacet};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Default timeout for catalog API requests
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Facet tree key scoping category constraints
const CATEGORY_FACET_KEY: &str = "category-3";

/// GraphQL context provider directive required by the search resolver
const SEARCH_PROVIDER: &str = "vtex.search-graphql@0.62.0";

/// Catalog search client
#[derive(Debug, Clone)]
pub struct CatalogClient {
    http_client: Client,
    endpoint: String,
}

impl CatalogClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http_client: Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .expect("Failed to create HTTP client"),
            endpoint: endpoint.into(),
        }
    }

    /// Render the GraphQL query text for one constraint set
    pub fn build_query(category: &str, facets: &[SelectedFacet]) -> String {
        let mut selected = vec![format!(
            "{{key:\"{}\", value:\"{}\"}}",
            CATEGORY_FACET_KEY,
            escape(category)
        )];
        selected.extend(facets.iter().map(|facet| {
            format!(
                "{{key:\"{}\", value:\"{}\"}}",
                escape(&facet.facet_type),
                escape(&facet.selected_facet)
            )
        }));

        format!(
            concat!(
                "query Request {{\n",
                "  productSearch(\n",
                "    hideUnavailableItems: true,\n",
                "    selectedFacets: [{}]\n",
                "  ) @context(provider: \"{}\") {{\n",
                "    products {{\n",
                "      productName\n",
                "      link\n",
                "      items(filter: FIRST_AVAILABLE) {{\n",
                "        images {{ imageUrl }}\n",
                "      }}\n",
                "    }}\n",
                "  }}\n",
                "}}",
            ),
            selected.join(", "),
            SEARCH_PROVIDER
        )
    }

    async fn execute(&self, query: String) -> Result<Vec<Product>, CatalogError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await
            .map_err(|e| CatalogError::Network(format!("Catalog request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Api(status, body));
        }

        let envelope: SearchEnvelope = response
            .json()
            .await
            .map_err(|e| CatalogError::Parse(format!("Catalog response parse failed: {e}")))?;

        let products = envelope
            .data
            .ok_or_else(|| CatalogError::Parse("Response missing data section".to_string()))?
            .product_search
            .products;

        debug!(products = products.len(), "Catalog query complete");
        Ok(products)
    }
}

#[async_trait::async_trait]
impl ProductSearch for CatalogClient {
    async fn search(
        &self,
        category: &str,
        facets: &[SelectedFacet],
    ) -> Result<Vec<Product>, CatalogError> {
        let query = Self::build_query(category, facets);
        debug!(category = %category, constraints = facets.len(), "Executing catalog search");
        self.execute(query).await
    }
}

/// Escape a value for embedding in a double-quoted GraphQL string
fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

// ============================================================================
// Catalog API response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    data: Option<SearchData>,
}

#[derive(Debug, Deserialize)]
struct SearchData {
    #[serde(rename = "productSearch")]
    product_search: ProductSearchPayload,
}

#[derive(Debug, Deserialize)]
struct ProductSearchPayload {
    #[serde(default)]
    products: Vec<Product>,
}

// ============================================================================
// Tests
// ============================================================================
