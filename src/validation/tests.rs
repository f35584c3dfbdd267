use std::sync::{Arc, Mutex};
use std::time::Instant;

use approx::assert_abs_diff_eq;
use ndarray::{Array1, Array2};

use super::*;
use crate::data::Batch;
use crate::error::Error;
use crate::eval::{HoldoutSplit, KFold, MetricRegistry};
use crate::hpo::{
    Configuration, ConstraintStrategy, GridSearch, Optimizer, ParameterDomain, ParameterValue,
    PerformanceConstraint, TimeBoxedRandomGridSearch,
};
use crate::pipeline::builtin::{DummyClassifier, KNeighborsClassifier, NearestCentroid, StandardScaler};
use crate::pipeline::{
    invalid_value, unknown_param, BaseElement, Capabilities, Pipeline, PipelineElement, PipelineNode, Switch,
};
use crate::tracking::{InMemoryStore, ResultStore};

#[derive(Debug, Clone, Default)]
struct Flaky {
    fail: bool,
}

impl BaseElement for Flaky {
    fn capabilities(&self) -> Capabilities {
        Capabilities::transformer()
    }

    fn set_param(&mut self, name: &str, value: &ParameterValue) -> crate::Result<()> {
        match name {
            "fail" => self.fail = value.as_bool().ok_or_else(|| invalid_value("Flaky", name, value))?,
            _ => return Err(unknown_param("Flaky", name)),
        }
        Ok(())
    }

    fn params(&self) -> Configuration {
        Configuration::new().with("fail", self.fail)
    }

    fn fit(&mut self, _batch: &Batch) -> crate::Result<()> {
        Ok(())
    }

    fn transform(&self, batch: &Batch) -> crate::Result<Batch> {
        if self.fail {
            return Err(Error::InvalidData("flaky stage gave up".to_string()));
        }
        Ok(batch.clone())
    }

    fn clone_boxed(&self) -> Box<dyn BaseElement> {
        Box::new(self.clone())
    }
}

#[derive(Debug)]
struct BrokenStore;

impl ResultStore for BrokenStore {
    fn save(&self, _result: &PipeResult) -> crate::Result<()> {
        Err(Error::Storage("disk full".to_string()))
    }

    fn load(&self, name: &str) -> crate::Result<PipeResult> {
        Err(Error::NotFound(name.to_string()))
    }

    fn list(&self) -> crate::Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn delete(&self, name: &str) -> crate::Result<()> {
        Err(Error::NotFound(name.to_string()))
    }
}

fn blobs(n: usize) -> Batch {
    let x = Array2::from_shape_fn((n, 2), |(i, j)| (i % 2) as f64 * 6.0 + (i * (j + 1)) as f64 * 0.01);
    let y = Array1::from_shape_fn(n, |i| (i % 2) as f64);
    Batch::new(x).with_targets(y)
}

fn shrink_values() -> ParameterDomain {
    ParameterDomain::Values(vec![ParameterValue::Float(0.0), ParameterValue::Float(0.5)])
}

fn centroid() -> PipelineElement {
    PipelineElement::new("clf", Box::new(NearestCentroid::default())).with_hyperparameter("shrink", shrink_values())
}

fn scaled_centroid() -> Pipeline {
    Pipeline::new(vec![
        PipelineElement::new("scaler", Box::new(StandardScaler::default())).into(),
        centroid().into(),
    ])
}

fn small(pipeline: Pipeline) -> Hyperpipe {
    Hyperpipe::new("test", pipeline)
        .with_outer_cv(KFold::new(2))
        .with_inner_cv(KFold::new(3))
        .with_metrics(["accuracy", "f1_score"])
}

#[test]
fn test_fit_builds_complete_tree() {
    let mut hyperpipe = small(scaled_centroid());
    let result = hyperpipe.fit(&blobs(30)).expect("operation should succeed");

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.best_config_metric, "accuracy");
    assert!(result.maximize);
    assert_eq!(result.outer_folds.len(), 2);
    for (i, fold) in result.outer_folds.iter().enumerate() {
        assert_eq!(fold.fold_nr, i + 1);
        assert_eq!(fold.n_train + fold.n_test, 30);
        assert_eq!(fold.tested_configs.len(), 2);
        for tested in &fold.tested_configs {
            assert_eq!(tested.inner_folds.len(), 3);
            assert_eq!(tested.metrics_validation["accuracy"].values.len(), 3);
            assert!(tested.human_readable.contains("clf[shrink="));
        }
        let best = fold.best_config.as_ref().expect("outer fold has a winner");
        assert!(best.test.is_some());
        assert!(fold.dummy.is_some());
    }
    assert!(result.best_config.is_some());
    assert_abs_diff_eq!(result.metrics_test["accuracy"].mean, 1.0, epsilon = 1e-12);
}

#[test]
fn test_best_config_has_best_mean_validation() {
    let switch = Switch::new("clf")
        .with_element(PipelineElement::new("centroid", Box::new(NearestCentroid::default())))
        .with_element(PipelineElement::new("dummy", Box::new(DummyClassifier::default())));
    let mut hyperpipe = small(Pipeline::new(vec![switch.into()]));
    let result = hyperpipe.fit(&blobs(60)).expect("operation should succeed");

    for fold in &result.outer_folds {
        let best = fold.best_config_result().expect("outer fold has a winner");
        let best_score = best.validation_mean("accuracy").expect("accuracy recorded");
        for tested in fold.tested_configs.iter().filter(|c| c.is_eligible()) {
            assert!(tested.validation_mean("accuracy").expect("accuracy recorded") <= best_score);
        }
        assert!(best.human_readable.contains("centroid"));
    }
}

#[test]
fn test_failed_configuration_is_isolated() {
    let pipeline = Pipeline::new(vec![
        PipelineElement::new("flaky", Box::new(Flaky::default()))
            .with_hyperparameter(
                "fail",
                ParameterDomain::Values(vec![ParameterValue::Bool(true), ParameterValue::Bool(false)]),
            )
            .into(),
        centroid().into(),
    ]);
    let mut hyperpipe = small(pipeline);
    let result = hyperpipe.fit(&blobs(30)).expect("operation should succeed");

    for fold in &result.outer_folds {
        assert_eq!(fold.tested_configs.len(), 4);
        let failed: Vec<&ConfigResult> = fold.tested_configs.iter().filter(|c| c.failed).collect();
        assert_eq!(failed.len(), 2);
        for config in failed {
            assert!(config.metrics_validation.is_empty());
            assert!(config.inner_folds.is_empty());
            assert!(config.error.as_deref().is_some_and(|e| e.contains("flaky")));
        }
        let best = fold.best_config.as_ref().expect("outer fold has a winner");
        assert_eq!(best.config.get("flaky__fail").and_then(ParameterValue::as_bool), Some(false));
    }
}

#[test]
fn test_rejected_candidate_value_fails_only_its_trial() {
    let knn = PipelineElement::new("knn", Box::new(KNeighborsClassifier::default()))
        .with_hyperparameter("n_neighbors", ParameterDomain::Values(vec![ParameterValue::Int(0), ParameterValue::Int(3)]));
    let mut hyperpipe = small(Pipeline::new(vec![knn.into()]));
    let result = hyperpipe.fit(&blobs(30)).expect("operation should succeed");

    assert_eq!(result.status, RunStatus::Completed);
    for fold in &result.outer_folds {
        assert_eq!(fold.tested_configs.len(), 2);
        let zero = &fold.tested_configs[0];
        assert!(zero.failed);
        assert!(zero.error.as_deref().is_some_and(|e| e.contains("n_neighbors")));
        assert!(!fold.tested_configs[1].failed);
        assert_eq!(fold.best_config.as_ref().map(|b| b.config_nr), Some(2));
    }
    assert_eq!(
        result.best_config.as_ref().and_then(|c| c.get("knn__n_neighbors")).and_then(ParameterValue::as_int),
        Some(3)
    );
}

#[test]
fn test_malformed_domain_rejected_before_search() {
    let knn = PipelineElement::new("knn", Box::new(KNeighborsClassifier::default()))
        .with_hyperparameter("n_neighbors", ParameterDomain::Discrete { low: 1, high: 5, step: 0 });
    let mut hyperpipe = small(Pipeline::new(vec![knn.into()]));
    let err = hyperpipe.fit(&blobs(30)).expect_err("zero step must be rejected");
    assert!(matches!(err, Error::Configuration(ref m) if m.contains("knn__n_neighbors")));
    assert!(hyperpipe.results().is_none());
}

/// Grid search that records every reported score
#[derive(Debug, Clone, Default)]
struct Recording {
    grid: GridSearch,
    told: Arc<Mutex<Vec<f64>>>,
}

impl Optimizer for Recording {
    fn prepare(&mut self, elements: &[PipelineNode], maximize: bool) -> crate::Result<()> {
        self.grid.prepare(elements, maximize)
    }

    fn ask(&mut self) -> Option<Configuration> {
        self.grid.ask()
    }

    fn tell(&mut self, _config: &Configuration, performance: f64) {
        if let Ok(mut told) = self.told.lock() {
            told.push(performance);
        }
    }

    fn name(&self) -> &str {
        "recording"
    }

    fn clone_boxed(&self) -> Box<dyn Optimizer> {
        Box::new(self.clone())
    }
}

#[test]
fn test_failed_and_rejected_configurations_reported_as_worst() {
    let pipeline = Pipeline::new(vec![
        PipelineElement::new("flaky", Box::new(Flaky::default()))
            .with_hyperparameter(
                "fail",
                ParameterDomain::Values(vec![ParameterValue::Bool(true), ParameterValue::Bool(false)]),
            )
            .into(),
        centroid().into(),
    ]);
    let recording = Recording::default();
    let told = Arc::clone(&recording.told);
    let mut hyperpipe = small(pipeline).with_optimizer(Box::new(recording));
    hyperpipe.fit(&blobs(30)).expect("operation should succeed");

    let told = told.lock().expect("operation should succeed").clone();
    assert_eq!(told.len(), 8);
    assert_eq!(told.iter().filter(|s| **s == f64::NEG_INFINITY).count(), 4);
    assert!(told.iter().filter(|s| s.is_finite()).all(|s| (0.0..=1.0).contains(s)));

    let switch = Switch::new("clf")
        .with_element(PipelineElement::new("centroid", Box::new(NearestCentroid::default())))
        .with_element(PipelineElement::new("dummy", Box::new(DummyClassifier::default())));
    let recording = Recording::default();
    let told = Arc::clone(&recording.told);
    let mut hyperpipe = small(Pipeline::new(vec![switch.into()]))
        .with_optimizer(Box::new(recording))
        .with_constraint(PerformanceConstraint::minimum("accuracy", 0.9).with_strategy(ConstraintStrategy::First));
    hyperpipe.fit(&blobs(60)).expect("operation should succeed");

    let told = told.lock().expect("operation should succeed").clone();
    assert_eq!(told.len(), 4);
    assert_eq!(told.iter().filter(|s| **s == f64::NEG_INFINITY).count(), 2);
}

#[test]
fn test_nan_validation_score_never_wins() {
    let mut registry = MetricRegistry::with_builtins();
    registry.register("spread", true, |t, p| {
        let constant = p.iter().all(|v| *v == p[0]);
        if constant {
            f64::NAN
        } else {
            t.iter().zip(p).filter(|(a, b)| a == b).count() as f64 / t.len() as f64
        }
    });
    let switch = Switch::new("clf")
        .with_element(PipelineElement::new("dummy", Box::new(DummyClassifier::default())))
        .with_element(PipelineElement::new("centroid", Box::new(NearestCentroid::default())));
    let mut hyperpipe = small(Pipeline::new(vec![switch.into()]))
        .with_registry(registry)
        .with_metrics(["accuracy", "spread"])
        .with_best_config_metric("spread");
    let result = hyperpipe.fit(&blobs(60)).expect("operation should succeed");

    for fold in &result.outer_folds {
        assert!(fold.tested_configs[0].validation_mean("spread").is_some_and(f64::is_nan));
        assert_eq!(fold.best_config.as_ref().map(|b| b.config_nr), Some(2));
    }
    let best = result.overall_best().expect("a finite winner exists");
    assert!(best.human_readable.contains("centroid"));
}

#[test]
fn test_overall_best_skips_non_finite_scores() {
    let fold = |fold_nr: usize, score: f64| {
        let mut tested = ConfigResult { config_nr: 1, ..ConfigResult::default() };
        tested.metrics_validation.insert("accuracy".to_string(), MetricSummary::from_values(&[score], false));
        OuterFoldResult {
            fold_nr,
            tested_configs: vec![tested],
            best_config: Some(OptimizationResult { config_nr: 1, ..OptimizationResult::default() }),
            ..OuterFoldResult::default()
        }
    };
    let mut result = PipeResult::new("nan", "accuracy", true);
    result.push_outer_fold(fold(1, f64::NAN));
    result.push_outer_fold(fold(2, 0.4));
    result.push_outer_fold(fold(3, 0.7));
    let best = result.overall_best().expect("a finite winner exists");
    assert_abs_diff_eq!(best.validation_mean("accuracy").unwrap_or_default(), 0.7, epsilon = 1e-12);

    let mut all_nan = PipeResult::new("nan", "accuracy", true);
    all_nan.push_outer_fold(fold(1, f64::NAN));
    assert!(all_nan.overall_best().is_none());
}

#[test]
fn test_all_failed_is_fatal() {
    let pipeline = Pipeline::new(vec![
        PipelineElement::new("flaky", Box::new(Flaky { fail: true })).into(),
        centroid().into(),
    ]);
    let store = Arc::new(InMemoryStore::new());
    let mut hyperpipe = small(pipeline).with_store(store.clone());
    let err = hyperpipe.fit(&blobs(30)).expect_err("every configuration fails");
    assert!(matches!(err, Error::AllConfigurationsFailed { fold_nr: 1, tested: 2 }));

    let saved = store.load("test").expect("failed run is persisted");
    assert_eq!(saved.status, RunStatus::Failed);
    assert!(saved.error.is_some());
}

#[test]
fn test_expired_deadline_yields_no_configurations() {
    let mut hyperpipe =
        small(scaled_centroid()).with_optimizer(Box::new(TimeBoxedRandomGridSearch::until(Instant::now())));
    let err = hyperpipe.fit(&blobs(30)).expect_err("no configuration is asked");
    assert!(matches!(err, Error::NoConfigurations(1)));
}

#[test]
fn test_constraint_rejects_but_records() {
    let switch = Switch::new("clf")
        .with_element(PipelineElement::new("centroid", Box::new(NearestCentroid::default())))
        .with_element(PipelineElement::new("dummy", Box::new(DummyClassifier::default())));
    let mut hyperpipe = small(Pipeline::new(vec![switch.into()]))
        .with_constraint(PerformanceConstraint::minimum("accuracy", 0.9).with_strategy(ConstraintStrategy::First));
    let result = hyperpipe.fit(&blobs(60)).expect("operation should succeed");

    for fold in &result.outer_folds {
        assert_eq!(fold.tested_configs.len(), 2);
        let rejected = &fold.tested_configs[1];
        assert!(rejected.human_readable.contains("dummy"));
        assert!(rejected.rejected_by.as_deref().is_some_and(|c| c.starts_with("MinimumPerformance")));
        assert_eq!(rejected.inner_folds.len(), 1);
        assert!(!rejected.is_eligible());
        assert_eq!(fold.best_config.as_ref().map(|b| b.config_nr), Some(1));
    }
}

#[test]
fn test_unknown_metric_is_not_found() {
    let mut hyperpipe = small(scaled_centroid()).with_metrics(["accuracy", "made_up"]);
    assert!(matches!(hyperpipe.fit(&blobs(30)), Err(Error::NotFound(_))));
}

#[test]
fn test_best_metric_must_be_listed() {
    let mut hyperpipe = small(scaled_centroid()).with_best_config_metric("r2");
    assert!(matches!(hyperpipe.fit(&blobs(30)), Err(Error::Configuration(_))));
}

#[test]
fn test_predict_requires_fit() {
    let mut hyperpipe = small(scaled_centroid());
    assert!(matches!(hyperpipe.predict(&blobs(4)), Err(Error::NotFitted(_))));

    let data = blobs(30);
    hyperpipe.fit(&data).expect("operation should succeed");
    let predictions = hyperpipe.predict(&data).expect("operation should succeed");
    assert_eq!(Some(predictions), data.y);
}

#[test]
fn test_store_failures_do_not_abort() {
    let mut hyperpipe = small(scaled_centroid()).with_store(Arc::new(BrokenStore));
    let result = hyperpipe.fit(&blobs(30)).expect("operation should succeed");
    assert_eq!(result.status, RunStatus::Completed);
}

#[test]
fn test_results_persisted() {
    let store = Arc::new(InMemoryStore::new());
    let mut hyperpipe = small(scaled_centroid()).with_store(store.clone());
    hyperpipe.fit(&blobs(30)).expect("operation should succeed");

    let saved = store.load("test").expect("operation should succeed");
    assert_eq!(Some(&saved), hyperpipe.results());
}

#[test]
fn test_parallel_outer_folds_match_sequential() {
    let data = blobs(40);
    let mut sequential = small(scaled_centroid()).with_cache(true);
    let mut parallel = small(scaled_centroid()).with_cache(true).with_n_jobs(2);
    let a = sequential.fit(&data).expect("operation should succeed").clone();
    let b = parallel.fit(&data).expect("operation should succeed").clone();

    assert_eq!(a.outer_folds.len(), b.outer_folds.len());
    for (fa, fb) in a.outer_folds.iter().zip(&b.outer_folds) {
        assert_eq!(fa.fold_nr, fb.fold_nr);
        assert_eq!(fa.best_config.as_ref().map(|c| &c.config), fb.best_config.as_ref().map(|c| &c.config));
        for (ca, cb) in fa.tested_configs.iter().zip(&fb.tested_configs) {
            assert_eq!(ca.config, cb.config);
            assert_eq!(ca.metrics_validation["accuracy"].values, cb.metrics_validation["accuracy"].values);
        }
    }
}

#[test]
fn test_holdout_outer_strategy() {
    let mut hyperpipe = small(scaled_centroid()).with_outer_cv(HoldoutSplit::new(0.25));
    let result = hyperpipe.fit(&blobs(40)).expect("operation should succeed");
    assert_eq!(result.outer_folds.len(), 1);
    assert_eq!(result.outer_folds[0].n_test, 10);
}

#[test]
fn test_save_predictions_and_suppressed_test() {
    let mut hyperpipe = small(scaled_centroid()).with_save_predictions(true).with_eval_final_performance(false);
    let result = hyperpipe.fit(&blobs(30)).expect("operation should succeed");
    let fold = &result.outer_folds[0];
    let inner = &fold.tested_configs[0].inner_folds[0];
    assert_eq!(inner.validation.y_pred.len(), inner.n_validation);
    assert_eq!(inner.validation.indices.len(), inner.n_validation);
    assert!(fold.best_config.as_ref().is_some_and(|b| b.test.is_none()));
    assert!(result.metrics_test.is_empty());
}

#[test]
fn test_time_report_lists_stages() {
    let mut hyperpipe = small(scaled_centroid()).with_cache(true);
    hyperpipe.fit(&blobs(30)).expect("operation should succeed");
    let report = hyperpipe.time_report();
    assert!(report.contains("scaler"));
    assert!(report.contains("clf"));
}

#[test]
fn test_metric_summary_statistics() {
    let summary = MetricSummary::from_values(&[1.0, 3.0], true);
    assert_abs_diff_eq!(summary.mean, 2.0);
    assert_abs_diff_eq!(summary.std, 1.0);
    assert_eq!(summary.values, vec![1.0, 3.0]);
    assert!(MetricSummary::from_values(&[1.0], false).values.is_empty());
}
