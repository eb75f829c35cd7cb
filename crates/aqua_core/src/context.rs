//! Serving context: catalog, then pipeline, built once at startup

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::artifact::{load_artifact, ModelMetadata};
use crate::catalog::SoluteCatalog;
use crate::config::AquaConfig;
use crate::errors::Result;
use crate::pipeline::InferencePipeline;

/// Shared read-only state for every serving entry point
#[derive(Debug, Clone)]
pub struct AppContext {
    pub catalog: Arc<SoluteCatalog>,
    pub pipeline: Arc<InferencePipeline>,
    pub metadata: ModelMetadata,
}

impl AppContext {
    /// Load the catalog (file or built-in) and then the model artifact.
    pub fn initialize(config: &AquaConfig) -> Result<Self> {
        let catalog = load_catalog(config.paths.catalog.as_deref())?;
        Self::with_catalog(catalog, &config.paths.model_dir)
    }

    pub fn with_catalog<P: AsRef<Path>>(catalog: Arc<SoluteCatalog>, model_dir: P) -> Result<Self> {
        let (pipeline, metadata) = load_artifact(model_dir, Arc::clone(&catalog))?;
        info!(
            model_type = %metadata.model_type,
            features = metadata.feature_count,
            pharmaceuticals = catalog.len(),
            "serving context ready"
        );
        Ok(Self {
            catalog,
            pipeline: Arc::new(pipeline),
            metadata,
        })
    }
}

/// Catalog from a CSV file when given, otherwise the built-in reference table.
pub fn load_catalog(path: Option<&Path>) -> Result<Arc<SoluteCatalog>> {
    let catalog = match path {
        Some(path) => SoluteCatalog::from_csv(path)?,
        None => SoluteCatalog::builtin(),
    };
    Ok(Arc::new(catalog))
}
