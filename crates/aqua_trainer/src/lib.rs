//! Model selection and training for adsorption-capacity (qe) prediction
//!
//! Loads a dataset, compares the boosting backends by k-fold cross-validation,
//! tunes the best ranked ones with randomized search and freezes the winner as
//! an [`aqua_core::InferencePipeline`] together with out-of-fold reports.

pub mod cv;
pub mod dataset;
pub mod errors;
pub mod folds;
pub mod metrics;
pub mod pool;
pub mod report;
pub mod search;
pub mod session;
pub mod split;

pub use cv::{fit_pipeline, CrossValidator, CvReport, FoldResult};
pub use dataset::TrainingSet;
pub use errors::{CvError, DatasetError, Result, SearchError, TrainerError};
pub use folds::{Fold, FoldSplitter, FoldStrategy};
pub use metrics::RegressionMetrics;
pub use pool::{default_pool, Candidate, PoolEntry, TunedCandidate};
pub use report::{OofReport, TrainingSummary};
pub use search::{
    CancelToken, Distribution, ParamSpace, RandomizedSearch, SearchOutcome, TrialResult,
    TrialStatus,
};
pub use session::{TrainingOptions, TrainingOutcome, TrainingSession};
pub use split::train_test_split;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
