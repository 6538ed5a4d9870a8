//! Inference over persisted artifacts
//!
//! A [`Predictor`] holds a trained model and the preprocessing state it was
//! trained behind. Inputs arrive as a [`PredictionInput`], are laid out in
//! training feature order and replay impute → encode → scale before the
//! model sees them.

mod input;
mod predictor;

pub use input::{PredictionInput, Record};
pub use predictor::{ModelInfo, Prediction, Predictor};
