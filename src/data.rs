//! In-memory dataset batches flowing through a pipeline
//!
//! A [`Batch`] bundles the feature matrix with optional targets and named
//! per-sample annotations (side-channel values such as covariates or group ids).
//! Every stage consumes and produces a batch.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2, Axis};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Features, optional targets and per-sample annotations
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub x: Array2<f64>,
    pub y: Option<Array1<f64>>,
    pub annotations: BTreeMap<String, Array1<f64>>,
}

/// One sample of a batch, used by per-item caching
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub x: Array1<f64>,
    pub y: Option<f64>,
    pub annotations: BTreeMap<String, f64>,
}

impl Batch {
    /// Create a batch holding only features
    pub fn new(x: Array2<f64>) -> Self {
        Self { x, y: None, annotations: BTreeMap::new() }
    }

    /// Attach targets
    pub fn with_targets(mut self, y: Array1<f64>) -> Self {
        self.y = Some(y);
        self
    }

    /// Attach a named annotation column
    pub fn with_annotation(mut self, name: impl Into<String>, values: Array1<f64>) -> Self {
        self.annotations.insert(name.into(), values);
        self
    }

    /// Replace the features, keeping targets and annotations
    pub fn with_features(&self, x: Array2<f64>) -> Self {
        Self { x, y: self.y.clone(), annotations: self.annotations.clone() }
    }

    pub fn n_samples(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    /// Targets, or an error naming the consumer that needed them
    pub fn targets(&self, consumer: &str) -> Result<&Array1<f64>> {
        self.y
            .as_ref()
            .ok_or_else(|| Error::InvalidData(format!("{consumer} requires targets but none were given")))
    }

    /// Check that targets and annotations line up with the feature rows
    pub fn validate(&self) -> Result<()> {
        let n = self.n_samples();
        if let Some(y) = &self.y {
            if y.len() != n {
                return Err(Error::InvalidData(format!(
                    "targets have {} entries but features have {n} rows",
                    y.len()
                )));
            }
        }
        for (name, values) in &self.annotations {
            if values.len() != n {
                return Err(Error::InvalidData(format!(
                    "annotation '{name}' has {} entries but features have {n} rows",
                    values.len()
                )));
            }
        }
        Ok(())
    }

    /// Gather the given rows (in the given order) into a new batch
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            x: self.x.select(Axis(0), indices),
            y: self.y.as_ref().map(|y| y.select(Axis(0), indices)),
            annotations: self
                .annotations
                .iter()
                .map(|(name, values)| (name.clone(), values.select(Axis(0), indices)))
                .collect(),
        }
    }

    /// Content fingerprint over shape, features, targets and annotations
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update((self.x.nrows() as u64).to_le_bytes());
        hasher.update((self.x.ncols() as u64).to_le_bytes());
        for v in &self.x {
            hasher.update(v.to_bits().to_le_bytes());
        }
        match &self.y {
            Some(y) => {
                hasher.update([1u8]);
                for v in y {
                    hasher.update(v.to_bits().to_le_bytes());
                }
            }
            None => hasher.update([0u8]),
        }
        for (name, values) in &self.annotations {
            hasher.update(name.as_bytes());
            hasher.update([0xffu8]);
            for v in values {
                hasher.update(v.to_bits().to_le_bytes());
            }
        }
        hex::encode(hasher.finalize())
    }

    /// Split into individual rows
    pub fn rows(&self) -> Vec<Row> {
        (0..self.n_samples())
            .map(|i| Row {
                x: self.x.row(i).to_owned(),
                y: self.y.as_ref().map(|y| y[i]),
                annotations: self.annotations.iter().map(|(k, v)| (k.clone(), v[i])).collect(),
            })
            .collect()
    }

    /// Reassemble a batch from rows; all rows must agree on width, targets and annotation names
    pub fn from_rows(rows: &[Row]) -> Result<Self> {
        let Some(first) = rows.first() else {
            return Err(Error::InvalidData("cannot assemble a batch from zero rows".to_string()));
        };
        let n_features = first.x.len();
        let mut flat = Vec::with_capacity(rows.len() * n_features);
        let mut y = first.y.map(|_| Vec::with_capacity(rows.len()));
        let mut annotations: BTreeMap<String, Vec<f64>> =
            first.annotations.keys().map(|k| (k.clone(), Vec::with_capacity(rows.len()))).collect();

        for row in rows {
            if row.x.len() != n_features {
                return Err(Error::InvalidData(format!(
                    "row width {} does not match {n_features}",
                    row.x.len()
                )));
            }
            flat.extend(row.x.iter().copied());
            match (&mut y, row.y) {
                (Some(ys), Some(v)) => ys.push(v),
                (None, None) => {}
                _ => return Err(Error::InvalidData("rows disagree on targets".to_string())),
            }
            if row.annotations.len() != annotations.len() {
                return Err(Error::InvalidData("rows disagree on annotations".to_string()));
            }
            for (name, value) in &row.annotations {
                annotations
                    .get_mut(name)
                    .ok_or_else(|| Error::InvalidData(format!("unexpected annotation '{name}'")))?
                    .push(*value);
            }
        }

        let x = Array2::from_shape_vec((rows.len(), n_features), flat)
            .map_err(|e| Error::InvalidData(e.to_string()))?;
        Ok(Self {
            x,
            y: y.map(Array1::from),
            annotations: annotations.into_iter().map(|(k, v)| (k, Array1::from(v))).collect(),
        })
    }
}

impl Row {
    /// Content fingerprint of a single sample
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update((self.x.len() as u64).to_le_bytes());
        for v in &self.x {
            hasher.update(v.to_bits().to_le_bytes());
        }
        if let Some(y) = self.y {
            hasher.update([1u8]);
            hasher.update(y.to_bits().to_le_bytes());
        }
        for (name, value) in &self.annotations {
            hasher.update(name.as_bytes());
            hasher.update(value.to_bits().to_le_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample() -> Batch {
        Batch::new(array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]])
            .with_targets(array![0.0, 1.0, 0.0])
            .with_annotation("site", array![7.0, 8.0, 9.0])
    }

    #[test]
    fn test_select_keeps_alignment() {
        let batch = sample().select(&[2, 0]);
        assert_eq!(batch.x, array![[5.0, 6.0], [1.0, 2.0]]);
        assert_eq!(batch.y, Some(array![0.0, 0.0]));
        assert_eq!(batch.annotations["site"], array![9.0, 7.0]);
    }

    #[test]
    fn test_fingerprint_is_content_based() {
        let a = sample();
        let b = sample();
        assert_eq!(a.fingerprint(), b.fingerprint());

        let c = sample().with_targets(array![1.0, 1.0, 1.0]);
        assert_ne!(a.fingerprint(), c.fingerprint());

        let d = sample().with_annotation("site", array![0.0, 0.0, 0.0]);
        assert_ne!(a.fingerprint(), d.fingerprint());
    }

    #[test]
    fn test_rows_roundtrip() {
        let batch = sample();
        let rebuilt = Batch::from_rows(&batch.rows()).expect("operation should succeed");
        assert_eq!(rebuilt, batch);
    }

    #[test]
    fn test_from_rows_rejects_empty() {
        assert!(matches!(Batch::from_rows(&[]), Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_validate_detects_mismatch() {
        let batch = Batch::new(array![[1.0], [2.0]]).with_targets(array![1.0]);
        assert!(matches!(batch.validate(), Err(Error::InvalidData(_))));
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_row_fingerprint_ignores_position() {
        let batch = sample();
        let reordered = batch.select(&[1, 0, 2]);
        assert_eq!(batch.rows()[0].fingerprint(), reordered.rows()[1].fingerprint());
    }

    #[test]
    fn test_targets_error_names_consumer() {
        let batch = Batch::new(array![[1.0]]);
        let err = batch.targets("NearestCentroid").expect_err("should fail");
        assert!(err.to_string().contains("NearestCentroid"));
    }
}
