//! Categorical label encoding

use crate::error::{PipelineError, Result};
use super::is_numeric_dtype;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Fitted mapping from category string to integer code.
///
/// Codes follow the sorted order of the distinct training values, so
/// fitting twice on the same data always yields the same codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Fit on a set of values
    pub fn fit<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let mut classes: Vec<String> = values.into_iter().map(str::to_string).collect();
        classes.sort();
        classes.dedup();
        Self { classes }
    }

    /// Known categories, indexed by code
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Number of known categories
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Code of a value, `None` when it was never seen during fit
    pub fn code(&self, value: &str) -> Option<usize> {
        self.classes.binary_search_by(|c| c.as_str().cmp(value)).ok()
    }

    /// Encode a value of `column`, failing on unseen categories
    pub fn encode(&self, column: &str, value: &str) -> Result<usize> {
        self.code(value).ok_or_else(|| PipelineError::UnseenCategory {
            column: column.to_string(),
            value: value.to_string(),
        })
    }

    /// Category for a code
    pub fn decode(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }
}

/// Per-column label encoders for every non-numeric column of a frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoricalEncoder {
    encoders: BTreeMap<String, LabelEncoder>,
}

impl CategoricalEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit one encoder per non-numeric column
    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        self.encoders.clear();

        for column in df.get_columns() {
            if is_numeric_dtype(column.dtype()) {
                continue;
            }
            let casted = column.cast(&DataType::String)?;
            let encoder = LabelEncoder::fit(casted.str()?.into_iter().flatten());
            debug!(column = %column.name(), categories = encoder.len(), "Fitted label encoder");
            self.encoders.insert(column.name().to_string(), encoder);
        }

        Ok(self)
    }

    /// Replace every encoded column present in `df` with its Int64 codes.
    ///
    /// Missing cells stay missing; values never seen during fit fail with
    /// [`PipelineError::UnseenCategory`].
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut result = df.clone();

        for (name, encoder) in &self.encoders {
            let Ok(column) = df.column(name) else {
                continue;
            };
            let casted = column.cast(&DataType::String)?;
            let codes: Int64Chunked = casted
                .str()?
                .into_iter()
                .map(|opt| {
                    opt.map(|v| encoder.encode(name, v).map(|c| c as i64))
                        .transpose()
                })
                .collect::<Result<_>>()?;
            result
                .with_column(codes.with_name(name.as_str().into()).into_series())
                .map_err(|e| PipelineError::DataError(e.to_string()))?;
        }

        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<DataFrame> {
        self.fit(df)?;
        self.transform(df)
    }

    /// Encoder for one column
    pub fn get(&self, column: &str) -> Option<&LabelEncoder> {
        self.encoders.get(column)
    }

    /// Names of the encoded columns
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.encoders.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.encoders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_codes() {
        let enc = LabelEncoder::fit(["pune", "delhi", "mumbai", "delhi"]);
        assert_eq!(enc.classes(), &["delhi", "mumbai", "pune"]);
        assert_eq!(enc.code("mumbai"), Some(1));
        assert_eq!(enc.decode(2), Some("pune"));
        assert_eq!(enc.code("goa"), None);
    }

    #[test]
    fn test_unseen_category() {
        let enc = LabelEncoder::fit(["a", "b"]);
        let err = enc.encode("city", "c").unwrap_err();
        assert!(matches!(err, PipelineError::UnseenCategory { ref column, ref value }
            if column == "city" && value == "c"));
    }

    #[test]
    fn test_frame_encoding_is_deterministic() {
        let df = df!(
            "city" => &["b", "a", "c", "a"],
            "area" => &[1.0, 2.0, 3.0, 4.0]
        )
        .unwrap();

        let first = CategoricalEncoder::new().fit_transform(&df).unwrap();
        let second = CategoricalEncoder::new().fit_transform(&df).unwrap();

        assert!(first.equals(&second));
        let codes: Vec<Option<i64>> = first.column("city").unwrap().i64().unwrap().into_iter().collect();
        assert_eq!(codes, vec![Some(1), Some(0), Some(2), Some(0)]);
        assert_eq!(first.column("area").unwrap().dtype(), &DataType::Float64);
    }

    #[test]
    fn test_transform_rejects_unseen() {
        let train = df!("city" => &["a", "b"]).unwrap();
        let mut enc = CategoricalEncoder::new();
        enc.fit(&train).unwrap();

        let new = df!("city" => &["z"]).unwrap();
        assert!(matches!(enc.transform(&new), Err(PipelineError::UnseenCategory { .. })));
    }
}
