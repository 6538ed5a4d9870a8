//! Model training module
//!
//! Provides the fixed model catalog and everything needed to fit it:
//! - Linear and logistic regression
//! - Decision trees, Random Forests and gradient boosted trees
//! - RBF-kernel Support Vector Machines
//! - K-fold and stratified cross-validation
//! - Model selection and exhaustive grid search

mod config;
mod engine;
mod grid;
mod models;
mod trainer;
pub mod cross_validation;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod linear_models;
pub mod random_forest;
pub mod svm;

pub use config::{ModelKind, TaskType, TrainingConfig};
pub use engine::{ModelArtifact, TrainedModel};
pub use grid::{default_params, param_grid, HyperParams, ParamValue};
pub use models::{Model, TrainingMetrics};
pub use trainer::{GridPointScore, ModelScore, ModelTrainer, SelectionResult, TrainingOutcome, TuningOutcome};
pub use cross_validation::{CVResults, CVSplit, CVStrategy, CrossValidator};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
pub use linear_models::{LinearRegression, LogisticRegression};
pub use random_forest::{MaxFeatures, RandomForest};
pub use svm::{Gamma, SVMClassifier, SVMConfig, SVMRegressor};
