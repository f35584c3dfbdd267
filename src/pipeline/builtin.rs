//! Built-in processing units
//!
//! Small reference transformers and estimators registered under their type
//! names. Anything heavier is plugged in through the element registry.

use std::collections::BTreeMap;

use ndarray::{s, Array1, Array2, Axis};

use crate::data::Batch;
use crate::error::{Error, Result};
use crate::hpo::{Configuration, ParameterValue};

use super::element::{invalid_value, unknown_param, BaseElement, Capabilities};

fn not_fitted(unit: &str) -> Error {
    Error::NotFitted(format!("{unit} must be fitted before use"))
}

fn as_positive_usize(unit: &str, name: &str, value: &ParameterValue) -> Result<usize> {
    value
        .as_int()
        .filter(|v| *v > 0)
        .map(|v| v as usize)
        .ok_or_else(|| invalid_value(unit, name, value))
}

/// Per-column standardization
#[derive(Debug, Clone)]
pub struct StandardScaler {
    with_mean: bool,
    with_std: bool,
    mean: Option<Array1<f64>>,
    scale: Option<Array1<f64>>,
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self { with_mean: true, with_std: true, mean: None, scale: None }
    }
}

impl BaseElement for StandardScaler {
    fn capabilities(&self) -> Capabilities {
        Capabilities::transformer()
    }

    fn set_param(&mut self, name: &str, value: &ParameterValue) -> Result<()> {
        let flag = value.as_bool().ok_or_else(|| invalid_value("StandardScaler", name, value));
        match name {
            "with_mean" => self.with_mean = flag?,
            "with_std" => self.with_std = flag?,
            _ => return Err(unknown_param("StandardScaler", name)),
        }
        Ok(())
    }

    fn params(&self) -> Configuration {
        Configuration::new().with("with_mean", self.with_mean).with("with_std", self.with_std)
    }

    fn fit(&mut self, batch: &Batch) -> Result<()> {
        if batch.n_samples() == 0 {
            return Err(Error::InvalidData("StandardScaler fit on zero samples".to_string()));
        }
        let mean = batch
            .x
            .mean_axis(Axis(0))
            .ok_or_else(|| Error::InvalidData("StandardScaler fit on zero samples".to_string()))?;
        let scale = batch.x.std_axis(Axis(0), 0.0).mapv(|s| if s > 0.0 { s } else { 1.0 });
        self.mean = Some(mean);
        self.scale = Some(scale);
        Ok(())
    }

    fn transform(&self, batch: &Batch) -> Result<Batch> {
        let (Some(mean), Some(scale)) = (&self.mean, &self.scale) else {
            return Err(not_fitted("StandardScaler"));
        };
        if batch.n_features() != mean.len() {
            return Err(Error::InvalidData(format!(
                "StandardScaler fitted on {} features, got {}",
                mean.len(),
                batch.n_features()
            )));
        }
        let mut x = batch.x.clone();
        if self.with_mean {
            x -= mean;
        }
        if self.with_std {
            x /= scale;
        }
        Ok(batch.with_features(x))
    }

    fn clone_boxed(&self) -> Box<dyn BaseElement> {
        Box::new(self.clone())
    }
}

/// Keep the first `k` feature columns
#[derive(Debug, Clone)]
pub struct SelectFirst {
    k: usize,
}

impl Default for SelectFirst {
    fn default() -> Self {
        Self { k: 1 }
    }
}

impl SelectFirst {
    pub fn new(k: usize) -> Self {
        Self { k }
    }
}

impl BaseElement for SelectFirst {
    fn capabilities(&self) -> Capabilities {
        Capabilities::transformer()
    }

    fn set_param(&mut self, name: &str, value: &ParameterValue) -> Result<()> {
        match name {
            "k" => self.k = as_positive_usize("SelectFirst", name, value)?,
            _ => return Err(unknown_param("SelectFirst", name)),
        }
        Ok(())
    }

    fn params(&self) -> Configuration {
        Configuration::new().with("k", self.k as i64)
    }

    fn fit(&mut self, _batch: &Batch) -> Result<()> {
        Ok(())
    }

    fn transform(&self, batch: &Batch) -> Result<Batch> {
        if self.k > batch.n_features() {
            return Err(Error::InvalidData(format!(
                "SelectFirst k={} exceeds {} features",
                self.k,
                batch.n_features()
            )));
        }
        Ok(batch.with_features(batch.x.slice(s![.., ..self.k]).to_owned()))
    }

    fn clone_boxed(&self) -> Box<dyn BaseElement> {
        Box::new(self.clone())
    }
}

/// Identity transform
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl BaseElement for Passthrough {
    fn capabilities(&self) -> Capabilities {
        Capabilities::transformer()
    }

    fn set_param(&mut self, name: &str, _value: &ParameterValue) -> Result<()> {
        Err(unknown_param("Passthrough", name))
    }

    fn params(&self) -> Configuration {
        Configuration::new()
    }

    fn fit(&mut self, _batch: &Batch) -> Result<()> {
        Ok(())
    }

    fn transform(&self, batch: &Batch) -> Result<Batch> {
        Ok(batch.clone())
    }

    fn clone_boxed(&self) -> Box<dyn BaseElement> {
        Box::new(*self)
    }
}

fn squared_distance(a: ndarray::ArrayView1<f64>, b: ndarray::ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

fn class_label_key(v: f64) -> i64 {
    v.round() as i64
}

/// Nearest class centroid classifier with optional shrinkage towards the global mean
#[derive(Debug, Clone, Default)]
pub struct NearestCentroid {
    shrink: f64,
    centroids: Vec<(f64, Array1<f64>)>,
}

impl BaseElement for NearestCentroid {
    fn capabilities(&self) -> Capabilities {
        Capabilities::estimator()
    }

    fn set_param(&mut self, name: &str, value: &ParameterValue) -> Result<()> {
        match name {
            "shrink" => {
                self.shrink = value
                    .as_float()
                    .filter(|v| (0.0..=1.0).contains(v))
                    .ok_or_else(|| invalid_value("NearestCentroid", name, value))?;
            }
            _ => return Err(unknown_param("NearestCentroid", name)),
        }
        Ok(())
    }

    fn params(&self) -> Configuration {
        Configuration::new().with("shrink", self.shrink)
    }

    fn fit(&mut self, batch: &Batch) -> Result<()> {
        let y = batch.targets("NearestCentroid")?;
        let global = batch
            .x
            .mean_axis(Axis(0))
            .ok_or_else(|| Error::InvalidData("NearestCentroid fit on zero samples".to_string()))?;

        let mut members: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (i, label) in y.iter().enumerate() {
            members.entry(class_label_key(*label)).or_default().push(i);
        }

        self.centroids = members
            .into_iter()
            .filter_map(|(label, rows)| {
                let centroid = batch.x.select(Axis(0), &rows).mean_axis(Axis(0))?;
                let shrunk = &centroid * (1.0 - self.shrink) + &global * self.shrink;
                Some((label as f64, shrunk))
            })
            .collect();
        Ok(())
    }

    fn predict(&self, batch: &Batch) -> Result<Array1<f64>> {
        if self.centroids.is_empty() {
            return Err(not_fitted("NearestCentroid"));
        }
        Ok(batch
            .x
            .rows()
            .into_iter()
            .map(|row| {
                self.centroids
                    .iter()
                    .map(|(label, c)| (*label, squared_distance(row, c.view())))
                    .fold((f64::NAN, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
                    .0
            })
            .collect())
    }

    fn clone_boxed(&self) -> Box<dyn BaseElement> {
        Box::new(self.clone())
    }
}

/// Majority vote among the `n_neighbors` closest training samples
#[derive(Debug, Clone)]
pub struct KNeighborsClassifier {
    n_neighbors: usize,
    x: Option<Array2<f64>>,
    y: Option<Array1<f64>>,
}

impl Default for KNeighborsClassifier {
    fn default() -> Self {
        Self { n_neighbors: 5, x: None, y: None }
    }
}

impl BaseElement for KNeighborsClassifier {
    fn capabilities(&self) -> Capabilities {
        Capabilities::estimator()
    }

    fn set_param(&mut self, name: &str, value: &ParameterValue) -> Result<()> {
        match name {
            "n_neighbors" => {
                self.n_neighbors = as_positive_usize("KNeighborsClassifier", name, value)?;
            }
            _ => return Err(unknown_param("KNeighborsClassifier", name)),
        }
        Ok(())
    }

    fn params(&self) -> Configuration {
        Configuration::new().with("n_neighbors", self.n_neighbors as i64)
    }

    fn fit(&mut self, batch: &Batch) -> Result<()> {
        let y = batch.targets("KNeighborsClassifier")?;
        if batch.n_samples() == 0 {
            return Err(Error::InvalidData("KNeighborsClassifier fit on zero samples".to_string()));
        }
        self.x = Some(batch.x.clone());
        self.y = Some(y.clone());
        Ok(())
    }

    fn predict(&self, batch: &Batch) -> Result<Array1<f64>> {
        let (Some(train_x), Some(train_y)) = (&self.x, &self.y) else {
            return Err(not_fitted("KNeighborsClassifier"));
        };
        let k = self.n_neighbors.min(train_x.nrows());
        Ok(batch
            .x
            .rows()
            .into_iter()
            .map(|row| {
                let mut distances: Vec<(f64, usize)> = train_x
                    .rows()
                    .into_iter()
                    .enumerate()
                    .map(|(i, t)| (squared_distance(row, t), i))
                    .collect();
                distances.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
                let mut votes: BTreeMap<i64, usize> = BTreeMap::new();
                for (_, i) in distances.iter().take(k) {
                    *votes.entry(class_label_key(train_y[*i])).or_default() += 1;
                }
                // ties resolve to the smallest label
                votes
                    .into_iter()
                    .fold((0i64, 0usize), |best, (label, n)| if n > best.1 { (label, n) } else { best })
                    .0 as f64
            })
            .collect())
    }

    fn clone_boxed(&self) -> Box<dyn BaseElement> {
        Box::new(self.clone())
    }
}

/// Predicts the most frequent training class
#[derive(Debug, Clone, Default)]
pub struct DummyClassifier {
    majority: Option<f64>,
}

impl BaseElement for DummyClassifier {
    fn capabilities(&self) -> Capabilities {
        Capabilities::estimator()
    }

    fn set_param(&mut self, name: &str, _value: &ParameterValue) -> Result<()> {
        Err(unknown_param("DummyClassifier", name))
    }

    fn params(&self) -> Configuration {
        Configuration::new()
    }

    fn fit(&mut self, batch: &Batch) -> Result<()> {
        let y = batch.targets("DummyClassifier")?;
        let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
        for label in y {
            *counts.entry(class_label_key(*label)).or_default() += 1;
        }
        self.majority = counts
            .into_iter()
            .fold(None, |best: Option<(i64, usize)>, (label, n)| match best {
                Some((_, m)) if m >= n => best,
                _ => Some((label, n)),
            })
            .map(|(label, _)| label as f64);
        self.majority.map(|_| ()).ok_or_else(|| {
            Error::InvalidData("DummyClassifier fit on zero samples".to_string())
        })
    }

    fn predict(&self, batch: &Batch) -> Result<Array1<f64>> {
        let value = self.majority.ok_or_else(|| not_fitted("DummyClassifier"))?;
        Ok(Array1::from_elem(batch.n_samples(), value))
    }

    fn clone_boxed(&self) -> Box<dyn BaseElement> {
        Box::new(self.clone())
    }
}

/// Predicts the training mean
#[derive(Debug, Clone, Default)]
pub struct DummyRegressor {
    mean: Option<f64>,
}

impl BaseElement for DummyRegressor {
    fn capabilities(&self) -> Capabilities {
        Capabilities::estimator()
    }

    fn set_param(&mut self, name: &str, _value: &ParameterValue) -> Result<()> {
        Err(unknown_param("DummyRegressor", name))
    }

    fn params(&self) -> Configuration {
        Configuration::new()
    }

    fn fit(&mut self, batch: &Batch) -> Result<()> {
        let y = batch.targets("DummyRegressor")?;
        self.mean = y.mean();
        self.mean.map(|_| ()).ok_or_else(|| {
            Error::InvalidData("DummyRegressor fit on zero samples".to_string())
        })
    }

    fn predict(&self, batch: &Batch) -> Result<Array1<f64>> {
        let value = self.mean.ok_or_else(|| not_fitted("DummyRegressor"))?;
        Ok(Array1::from_elem(batch.n_samples(), value))
    }

    fn clone_boxed(&self) -> Box<dyn BaseElement> {
        Box::new(self.clone())
    }
}
