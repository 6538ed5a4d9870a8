//! Preprocessing configuration

use serde::{Deserialize, Serialize};
use super::{ImputeStrategy, ScalerType};

/// Configuration for data preprocessing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingConfig {
    /// Statistic used to fill missing numeric values.
    /// Non-numeric columns are always filled with their mode.
    pub impute_strategy: ImputeStrategy,

    /// Type of scaler fitted on the feature columns
    pub scaler_type: ScalerType,

    /// Fraction of rows held out for testing
    pub test_size: f64,

    /// Seed for the train/test shuffle
    pub random_state: u64,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            impute_strategy: ImputeStrategy::Mean,
            scaler_type: ScalerType::Standard,
            test_size: 0.2,
            random_state: 42,
        }
    }
}

impl PreprocessingConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the impute strategy
    pub fn with_impute(mut self, strategy: ImputeStrategy) -> Self {
        self.impute_strategy = strategy;
        self
    }

    /// Builder method to set scaler type
    pub fn with_scaler(mut self, scaler_type: ScalerType) -> Self {
        self.scaler_type = scaler_type;
        self
    }

    /// Builder method to set the held-out fraction
    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    /// Builder method to set the split seed
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PreprocessingConfig::default();
        assert_eq!(config.impute_strategy, ImputeStrategy::Mean);
        assert_eq!(config.scaler_type, ScalerType::Standard);
        assert_eq!(config.test_size, 0.2);
        assert_eq!(config.random_state, 42);
    }

    #[test]
    fn test_builder_pattern() {
        let config = PreprocessingConfig::new()
            .with_scaler(ScalerType::MinMax)
            .with_impute(ImputeStrategy::Median)
            .with_test_size(0.3);

        assert_eq!(config.scaler_type, ScalerType::MinMax);
        assert_eq!(config.impute_strategy, ImputeStrategy::Median);
        assert_eq!(config.test_size, 0.3);
    }

    #[test]
    fn test_partial_json() {
        let config: PreprocessingConfig =
            serde_json::from_str(r#"{"scaler_type": "minmax"}"#).unwrap();
        assert_eq!(config.scaler_type, ScalerType::MinMax);
        assert_eq!(config.test_size, 0.2);
    }
}
