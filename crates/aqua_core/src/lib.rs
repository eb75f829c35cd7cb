//! Adsorption-capacity (qe) feature pipeline and inference
//!
//! Raw measurements flow through the [`DomainTransformer`] (molar ratios and
//! solute descriptors), a [`FittedPreprocessor`] (imputation, scaling, one-hot)
//! and a trained [`aqua_boost::Regressor`], frozen together as an
//! [`InferencePipeline`]. Artifacts persist the fitted parts with metadata that
//! is checked before anything is served.

pub mod artifact;
pub mod batch;
pub mod catalog;
pub mod config;
pub mod context;
pub mod errors;
pub mod pipeline;
pub mod preprocess;
pub mod record;
pub mod schema;
pub mod sweep;
pub mod transform;

pub use artifact::{load_artifact, save_artifact, ModelBundle, ModelMetadata};
pub use batch::{predict_csv, predict_csv_file, BatchSummary};
pub use catalog::{SoluteCatalog, SoluteDescriptor, SoluteEntry};
pub use config::AquaConfig;
pub use context::AppContext;
pub use errors::{AquaError, Result, SchemaError, ValidationError};
pub use pipeline::{InferencePipeline, Prediction, RecordError, RowError};
pub use preprocess::{FeatureVector, FittedPreprocessor};
pub use record::{RawRecord, Value, ACTIVATION_ATMOSPHERE, TARGET, TARGET_PHAR};
pub use schema::FeatureSchema;
pub use sweep::{compare_pharmaceuticals, linspace, sweep, sweep_values, PharmaComparison, SweepPoint};
pub use transform::{DomainTransformer, EnrichedRecord, QualityWarning};
