//! Gradient-boosted regression tree engines behind one estimator contract
//!
//! Three backends share the tree, forest and CART builder:
//! - `gbdt`: exact-greedy second-order boosting
//! - `hist_gbdt`: the same loop on quantile-binned split candidates
//! - `dart`: boosting with dropout of existing trees
//!
//! Callers work with [`Regressor`] through the [`Estimator`] trait and exchange
//! hyperparameters as a [`ParamMap`].

pub mod adapter;
pub mod cart;
pub mod dart;
pub mod errors;
pub mod estimator;
pub mod forest;
pub mod gbdt;
pub mod params;
pub mod sampling;
pub mod tree;

pub use adapter::{DartAdapter, GbdtAdapter, HistGbdtAdapter, Regressor};
pub use cart::{CartBuilder, SplitCandidates, TreeConfig};
pub use dart::{DartConfig, DartTrainer};
pub use errors::{EngineError, EstimatorError, UnknownModelType};
pub use estimator::{Estimator, ModelType};
pub use forest::Forest;
pub use gbdt::{GbdtConfig, GbdtTrainer};
pub use params::{format_params, ParamMap, ParamValue};
pub use tree::{Node, Tree};
