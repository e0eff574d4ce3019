//! Configuration loading for stylelens
//!
//! Resolution priority per setting: CLI flag → environment variable → TOML
//! config file → compiled default. The TOML path itself comes from the CLI
//! (`--config`) or falls back to the platform config directory.
//!
//! Every threshold the pipeline uses is a named value here rather than a
//! literal at the call site: shortlist size, quantity floor, minimum result
//! count and maximum displayed products all have documented defaults.

use crate::error::Error;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the catalog GraphQL endpoint
pub const ENV_CATALOG_URL: &str = "STYLELENS_CATALOG_URL";
/// Environment variable overriding the detection service endpoint
pub const ENV_DETECTION_URL: &str = "STYLELENS_DETECTION_URL";
/// Environment variable overriding the similarity scorer endpoint
pub const ENV_SCORER_URL: &str = "STYLELENS_SCORER_URL";

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener settings
    pub listen: ListenConfig,
    /// Filesystem layout
    pub paths: PathsConfig,
    /// External service endpoints
    pub endpoints: EndpointsConfig,
    /// Pipeline thresholds
    pub tuning: SearchTuning,
    /// Facet types dropped from every vocabulary at load time
    pub excluded_facets: Vec<String>,
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    pub host: String,
    pub port: u16,
}

/// Filesystem layout for uploads and the facet vocabulary
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory receiving uploaded images
    pub uploads_dir: PathBuf,
    /// Directory of per-category facet vocabulary JSON files
    pub facets_dir: PathBuf,
    /// JSON file listing the detection class vocabulary
    pub categories_file: PathBuf,
}

/// External service endpoints
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    /// Object detection service base URL
    pub detection_url: String,
    /// Similarity scorer service base URL
    pub scorer_url: String,
    /// Catalog GraphQL endpoint
    pub catalog_graphql_url: String,
    /// Storefront base URL joined with relative product links
    pub storefront_base_url: String,
}

/// Pipeline thresholds with documented defaults
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SearchTuning {
    /// Top-K candidates by similarity score considered for selection
    pub shortlist_size: usize,
    /// Selection prefers the first shortlisted candidate with quantity
    /// strictly above this floor
    pub quantity_floor: u32,
    /// Minimum product count for a catalog query to be accepted
    pub min_results: usize,
    /// Maximum products rendered per category
    pub max_display: usize,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5731,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            uploads_dir: PathBuf::from("data/images"),
            facets_dir: PathBuf::from("data/facets"),
            categories_file: PathBuf::from("data/categories.json"),
        }
    }
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            detection_url: "http://127.0.0.1:8601".to_string(),
            scorer_url: "http://127.0.0.1:8602".to_string(),
            catalog_graphql_url: "https://thefoschini.myvtex.com/_v/segment/graphql/v1/"
                .to_string(),
            storefront_base_url: "https://bash.com".to_string(),
        }
    }
}

impl Default for SearchTuning {
    fn default() -> Self {
        Self {
            shortlist_size: 5,
            quantity_floor: 5,
            min_results: 5,
            max_display: 4,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen: ListenConfig::default(),
            paths: PathsConfig::default(),
            endpoints: EndpointsConfig::default(),
            tuning: SearchTuning::default(),
            excluded_facets: default_excluded_facets(),
        }
    }
}

/// Facet types that are navigational rather than visual; scoring them
/// against a crop produces noise, so they are filtered at vocabulary load.
fn default_excluded_facets() -> Vec<String> {
    [
        "Price",
        "Store",
        "Size",
        "Department",
        "Category",
        "Subcategory",
        "Sport",
        "Bags & wallets",
        "Gemstone",
        "Necklace",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl AppConfig {
    /// Load configuration from `path` (or the platform default location),
    /// then apply environment-variable overrides.
    ///
    /// A missing config file is not an error: defaults apply. A present but
    /// malformed file is an error, silently falling back would mask typos.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let resolved = match path {
            Some(p) => Some(p.to_path_buf()),
            None => default_config_path(),
        };

        let mut config = match resolved {
            Some(ref p) if p.exists() => {
                let content = std::fs::read_to_string(p)
                    .map_err(|e| Error::Config(format!("Read config failed: {e}")))?;
                let config: AppConfig = toml::from_str(&content)
                    .map_err(|e| Error::Config(format!("Parse config failed: {e}")))?;
                info!("Configuration loaded from {}", p.display());
                config
            }
            Some(ref p) => {
                info!("No config file at {}, using defaults", p.display());
                AppConfig::default()
            }
            None => {
                warn!("Could not determine config directory, using defaults");
                AppConfig::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(ENV_CATALOG_URL) {
            info!("Catalog endpoint overridden from environment");
            self.endpoints.catalog_graphql_url = url;
        }
        if let Ok(url) = std::env::var(ENV_DETECTION_URL) {
            info!("Detection endpoint overridden from environment");
            self.endpoints.detection_url = url;
        }
        if let Ok(url) = std::env::var(ENV_SCORER_URL) {
            info!("Scorer endpoint overridden from environment");
            self.endpoints.scorer_url = url;
        }
    }

    fn validate(&self) -> Result<(), Error> {
        if self.tuning.shortlist_size == 0 {
            return Err(Error::Config(
                "tuning.shortlist_size must be at least 1".to_string(),
            ));
        }
        if self.tuning.min_results == 0 {
            return Err(Error::Config(
                "tuning.min_results must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Platform default config path (`<config dir>/stylelens/config.toml`)
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("stylelens").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.tuning.shortlist_size, 5);
        assert_eq!(config.tuning.quantity_floor, 5);
        assert_eq!(config.tuning.min_results, 5);
        assert_eq!(config.tuning.max_display, 4);
        assert_eq!(config.listen.port, 5731);
        assert_eq!(
            config.excluded_facets,
            vec![
                "Price",
                "Store",
                "Size",
                "Department",
                "Category",
                "Subcategory",
                "Sport",
                "Bags & wallets",
                "Gemstone",
                "Necklace",
            ]
        );
    }

    #[test]
    fn test_partial_toml_keeps_defaults_elsewhere() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "[tuning]\nmin_results = 8\n\n[listen]\nport = 9000\n"
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.tuning.min_results, 8);
        assert_eq!(config.listen.port, 9000);
        // Untouched sections keep compiled defaults
        assert_eq!(config.tuning.shortlist_size, 5);
        assert_eq!(config.endpoints.storefront_base_url, "https://bash.com");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = AppConfig::load(Some(Path::new("/nonexistent/stylelens.toml"))).unwrap();
        assert_eq!(config.tuning.max_display, 4);
    }

    #[test]
    fn test_malformed_toml_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[tuning\nmin_results = ").unwrap();
        assert!(AppConfig::load(Some(file.path())).is_err());
    }

    #[test]
    fn test_zero_shortlist_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[tuning]\nshortlist_size = 0\n").unwrap();
        assert!(AppConfig::load(Some(file.path())).is_err());
    }
}
