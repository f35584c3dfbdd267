//! Nested cross-validation controller

use std::sync::{Arc, Mutex, PoisonError};

use ndarray::Array1;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::Batch;
use crate::error::{Error, Result};
use crate::eval::{CrossValidation, Fold, KFold, MetricRegistry};
use crate::hpo::{GridSearch, Optimizer, PerformanceConstraint};
use crate::pipeline::builtin::{DummyClassifier, DummyRegressor};
use crate::pipeline::{Pipeline, PipelineElement, PipelineNode, StageCache};
use crate::trace::TimeMonitor;
use crate::tracking::ResultStore;

use super::results::{now_ms, ConfigResult, OptimizationResult, OuterFoldResult, PipeResult, RunStatus, ScoreInfo};
use super::trial::{evaluate_configuration, score, TrialContext};

/// Kind of learning problem; selects the dummy baseline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    #[default]
    Classification,
    Regression,
}

impl Task {
    fn dummy(self) -> PipelineNode {
        match self {
            Task::Classification => PipelineElement::new("dummy", Box::new(DummyClassifier::default())).into(),
            Task::Regression => PipelineElement::new("dummy", Box::new(DummyRegressor::default())).into(),
        }
    }
}

/// Hyperparameter search over a pipeline with nested cross-validation.
///
/// Outer folds estimate generalization; inner folds of each outer fold's
/// validation partition select the configuration.
#[derive(Debug)]
pub struct Hyperpipe {
    name: String,
    pipeline: Pipeline,
    optimizer: Box<dyn Optimizer>,
    outer_cv: CrossValidation,
    inner_cv: KFold,
    metrics: Vec<String>,
    best_config_metric: Option<String>,
    registry: MetricRegistry,
    constraints: Vec<PerformanceConstraint>,
    task: Task,
    cache: bool,
    single_subject: bool,
    n_jobs: usize,
    store: Option<Arc<dyn ResultStore>>,
    eval_final_performance: bool,
    save_predictions: bool,
    keep_raw: bool,
    monitor: TimeMonitor,
    results: Option<PipeResult>,
    optimum_pipe: Option<Pipeline>,
}

impl Hyperpipe {
    /// Grid search, 3 outer and 3 inner K-folds, accuracy
    pub fn new(name: impl Into<String>, pipeline: Pipeline) -> Self {
        Self {
            name: name.into(),
            pipeline,
            optimizer: Box::new(GridSearch::new()),
            outer_cv: KFold::new(3).into(),
            inner_cv: KFold::new(3),
            metrics: vec!["accuracy".to_string()],
            best_config_metric: None,
            registry: MetricRegistry::default(),
            constraints: Vec::new(),
            task: Task::default(),
            cache: false,
            single_subject: false,
            n_jobs: 1,
            store: None,
            eval_final_performance: true,
            save_predictions: false,
            keep_raw: true,
            monitor: TimeMonitor::new(),
            results: None,
            optimum_pipe: None,
        }
    }

    pub fn with_optimizer(mut self, optimizer: Box<dyn Optimizer>) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn with_outer_cv(mut self, cv: impl Into<CrossValidation>) -> Self {
        self.outer_cv = cv.into();
        self
    }

    pub fn with_inner_cv(mut self, cv: KFold) -> Self {
        self.inner_cv = cv;
        self
    }

    /// Metrics computed on every fold
    pub fn with_metrics<I, S>(mut self, metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metrics = metrics.into_iter().map(Into::into).collect();
        self
    }

    /// Metric used to pick the best configuration; defaults to the first metric
    pub fn with_best_config_metric(mut self, metric: impl Into<String>) -> Self {
        self.best_config_metric = Some(metric.into());
        self
    }

    pub fn with_registry(mut self, registry: MetricRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_constraint(mut self, constraint: PerformanceConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn with_task(mut self, task: Task) -> Self {
        self.task = task;
        self
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache = enabled;
        self
    }

    /// Reuse per-item outputs of `data_only` stages across folds
    pub fn with_single_subject_caching(mut self, enabled: bool) -> Self {
        self.single_subject = enabled;
        self
    }

    /// Number of outer folds processed concurrently
    pub fn with_n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = n_jobs.max(1);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn ResultStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_eval_final_performance(mut self, enabled: bool) -> Self {
        self.eval_final_performance = enabled;
        self
    }

    pub fn with_save_predictions(mut self, enabled: bool) -> Self {
        self.save_predictions = enabled;
        self
    }

    /// Keep raw per-fold metric values next to mean and std
    pub fn with_raw_metrics(mut self, enabled: bool) -> Self {
        self.keep_raw = enabled;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn metrics(&self) -> &[String] {
        &self.metrics
    }

    pub fn best_config_metric(&self) -> &str {
        self.best_config_metric
            .as_deref()
            .or_else(|| self.metrics.first().map(String::as_str))
            .unwrap_or("accuracy")
    }

    pub fn results(&self) -> Option<&PipeResult> {
        self.results.as_ref()
    }

    /// Pipeline refit with the overall best configuration on all data
    pub fn optimum_pipe(&self) -> Option<&Pipeline> {
        self.optimum_pipe.as_ref()
    }

    pub fn monitor(&self) -> &TimeMonitor {
        &self.monitor
    }

    pub fn time_report(&self) -> String {
        self.monitor.report()
    }

    fn check_setup(&self, data: &Batch) -> Result<bool> {
        self.pipeline.validate_structure()?;
        if !self.pipeline.is_estimator() {
            return Err(Error::Configuration(format!(
                "hyperpipe '{}' needs a pipeline ending in an estimator",
                self.name
            )));
        }
        if self.metrics.is_empty() {
            return Err(Error::Configuration("no metrics given".to_string()));
        }
        let best = self.best_config_metric();
        if !self.metrics.iter().any(|m| m == best) {
            return Err(Error::Configuration(format!("best_config_metric '{best}' is not among the metrics")));
        }
        for metric in self.metrics.iter().map(String::as_str).chain(self.constraints.iter().map(|c| c.metric())) {
            if !self.registry.contains(metric) {
                return Err(Error::NotFound(format!("metric '{metric}'")));
            }
        }
        data.validate()?;
        data.targets(&self.name)?;
        self.registry.greater_is_better(best)
    }

    /// Pipeline template shared by all trials of this run
    fn template(&self) -> Pipeline {
        let mut template = self.pipeline.clone().with_monitor(self.monitor.clone());
        template.set_cache(self.cache.then(StageCache::new));
        template.with_single_subject_caching(self.single_subject)
    }

    fn persist(&self, result: &PipeResult) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(result) {
                tracing::warn!(run = %result.name, error = %e, "failed to persist results");
            }
        }
    }

    /// Run the nested cross-validated search and refit the overall winner on `data`
    pub fn fit(&mut self, data: &Batch) -> Result<&PipeResult> {
        let maximize = self.check_setup(data)?;
        let outer_folds = self.outer_cv.split(data.n_samples())?;
        let template = self.template();
        let metric = self.best_config_metric().to_string();
        tracing::info!(
            hyperpipe = %self.name,
            outer_folds = outer_folds.len(),
            configurations = template.config_space().len(),
            metric = %metric,
            "starting hyperparameter search"
        );

        let shared = Mutex::new(PipeResult::new(self.name.clone(), metric, maximize));
        let outcome = self.run_outer_folds(&template, data, &outer_folds, maximize, &shared);
        let mut result = shared.into_inner().unwrap_or_else(PoisonError::into_inner);

        if let Err(e) = outcome.and_then(|()| self.finalize(&template, data, &mut result)) {
            result.status = RunStatus::Failed;
            result.error = Some(e.to_string());
            result.finished_ms = Some(now_ms());
            self.persist(&result);
            self.results = Some(result);
            return Err(e);
        }

        self.persist(&result);
        let stored = self.results.insert(result);
        Ok(&*stored)
    }

    fn run_outer_folds(
        &self,
        template: &Pipeline,
        data: &Batch,
        folds: &[Fold],
        maximize: bool,
        shared: &Mutex<PipeResult>,
    ) -> Result<()> {
        let run_one = |(i, fold): (usize, &Fold)| -> Result<()> {
            let outer = self.run_outer_fold(template, data, i + 1, fold, maximize)?;
            let mut result = shared.lock().unwrap_or_else(PoisonError::into_inner);
            result.push_outer_fold(outer);
            self.persist(&result);
            Ok(())
        };

        if self.n_jobs <= 1 || folds.len() <= 1 {
            return folds.iter().enumerate().try_for_each(run_one);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.n_jobs)
            .build()
            .map_err(|e| Error::Configuration(format!("cannot build worker pool: {e}")))?;
        pool.install(|| folds.par_iter().enumerate().try_for_each(run_one))
    }

    fn dummy_baseline(&self, validation: &Batch, test: &Batch, test_idx: &[usize]) -> Option<ScoreInfo> {
        let mut dummy = Pipeline::new(vec![self.task.dummy()]);
        let scored = dummy
            .fit(validation)
            .and_then(|()| score(&mut dummy, test, test_idx, &self.metrics, &self.registry, false));
        match scored {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::warn!(error = %e, "dummy baseline failed");
                None
            }
        }
    }

    fn fold_constraints(&self, dummy: Option<&ScoreInfo>) -> Result<Vec<PerformanceConstraint>> {
        let mut constraints = self.constraints.clone();
        for constraint in &mut constraints {
            constraint.set_greater_is_better(self.registry.greater_is_better(constraint.metric())?);
            if !constraint.needs_baseline() {
                continue;
            }
            match dummy.and_then(|d| d.metric(constraint.metric())) {
                Some(baseline) => constraint.set_baseline(baseline),
                None => tracing::warn!(constraint = %constraint, "no dummy baseline; constraint inactive"),
            }
        }
        Ok(constraints)
    }

    fn run_outer_fold(
        &self,
        template: &Pipeline,
        data: &Batch,
        fold_nr: usize,
        (train_idx, test_idx): &Fold,
        maximize: bool,
    ) -> Result<OuterFoldResult> {
        let validation = data.select(train_idx);
        let test = data.select(test_idx);
        tracing::info!(fold = fold_nr, n_train = train_idx.len(), n_test = test_idx.len(), "outer fold started");

        let dummy = self.dummy_baseline(&validation, &test, test_idx);
        let constraints = self.fold_constraints(dummy.as_ref())?;
        let inner_folds = self.inner_cv.split(validation.n_samples())?;
        let ctx = TrialContext {
            template,
            data: &validation,
            inner_folds: &inner_folds,
            metrics: &self.metrics,
            registry: &self.registry,
            constraints: &constraints,
            outer_fold_nr: fold_nr,
            save_predictions: self.save_predictions,
            keep_raw: self.keep_raw,
        };

        let metric = self.best_config_metric();
        let mut optimizer = self.optimizer.clone();
        optimizer.prepare(template.nodes(), maximize)?;
        let mut tested: Vec<ConfigResult> = Vec::new();
        while let Some(config) = optimizer.ask() {
            let result = evaluate_configuration(&ctx, tested.len() + 1, config)?;
            let worst = if maximize { f64::NEG_INFINITY } else { f64::INFINITY };
            let score = result
                .validation_mean(metric)
                .filter(|score| result.is_eligible() && score.is_finite())
                .unwrap_or(worst);
            optimizer.tell(&result.config, score);
            tested.push(result);
        }

        let outcome = self.select_and_refit(template, &ctx, fold_nr, &tested, &test, test_idx, maximize);
        if let Some(cache) = template.cache() {
            let dropped = cache.clear_scope_prefix(&format!("outer{fold_nr}_"));
            tracing::debug!(fold = fold_nr, dropped, "cache scope torn down");
        }
        let best_config = outcome?;

        tracing::info!(
            fold = fold_nr,
            best = %best_config.human_readable,
            test = ?best_config.test.as_ref().and_then(|t| t.metric(metric)),
            "outer fold finished"
        );
        Ok(OuterFoldResult {
            fold_nr,
            n_train: train_idx.len(),
            n_test: test_idx.len(),
            tested_configs: tested,
            best_config: Some(best_config),
            dummy,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn select_and_refit(
        &self,
        template: &Pipeline,
        ctx: &TrialContext<'_>,
        fold_nr: usize,
        tested: &[ConfigResult],
        test: &Batch,
        test_idx: &[usize],
        maximize: bool,
    ) -> Result<OptimizationResult> {
        if tested.is_empty() {
            return Err(Error::NoConfigurations(fold_nr));
        }
        let metric = self.best_config_metric();
        let best = tested
            .iter()
            .filter(|c| c.is_eligible())
            .filter_map(|c| c.validation_mean(metric).map(|score| (score, c)))
            .filter(|(score, _)| score.is_finite())
            .reduce(|best, candidate| {
                let better = if maximize { candidate.0 > best.0 } else { candidate.0 < best.0 };
                if better {
                    candidate
                } else {
                    best
                }
            })
            .map(|(_, c)| c)
            .ok_or(Error::AllConfigurationsFailed { fold_nr, tested: tested.len() })?;

        let mut pipeline = template.clone();
        pipeline.set_cache_scope(format!("outer{fold_nr}_refit"));
        pipeline.set_params(&best.config)?;
        pipeline.fit(ctx.data)?;
        let all_rows: Vec<usize> = (0..ctx.data.n_samples()).collect();
        let training = score(&mut pipeline, ctx.data, &all_rows, ctx.metrics, ctx.registry, ctx.save_predictions)?;
        let test_scores = if self.eval_final_performance {
            Some(score(&mut pipeline, test, test_idx, ctx.metrics, ctx.registry, ctx.save_predictions)?)
        } else {
            None
        };

        Ok(OptimizationResult {
            config_nr: best.config_nr,
            config: best.config.clone(),
            human_readable: best.human_readable.clone(),
            training,
            test: test_scores,
        })
    }

    /// Refit the overall winner on all data and close the result tree
    fn finalize(&mut self, template: &Pipeline, data: &Batch, result: &mut PipeResult) -> Result<()> {
        let best = result
            .overall_best()
            .map(|c| (c.config.clone(), c.human_readable.clone()))
            .ok_or(Error::AllConfigurationsFailed { fold_nr: 0, tested: result.n_tested() })?;

        let mut optimum = template.clone();
        optimum.set_cache_scope("optimum");
        optimum.set_params(&best.0)?;
        optimum.fit(data)?;
        if let Some(cache) = optimum.cache() {
            cache.clear_scope("optimum");
        }
        tracing::info!(hyperpipe = %self.name, best = %best.1, "optimum pipe fitted on all data");

        result.best_config = Some(best.0);
        result.best_config_human = Some(best.1);
        result.aggregate(self.keep_raw);
        result.status = RunStatus::Completed;
        result.finished_ms = Some(now_ms());
        for (name, summary) in &result.metrics_test {
            tracing::info!(metric = %name, mean = summary.mean, std = summary.std, "final test performance");
        }
        self.optimum_pipe = Some(optimum);
        Ok(())
    }

    /// Predict with the optimum pipe
    pub fn predict(&mut self, data: &Batch) -> Result<Array1<f64>> {
        self.optimum_pipe
            .as_mut()
            .ok_or_else(|| Error::NotFitted(format!("hyperpipe '{}' has not been fitted", self.name)))?
            .predict(data)
    }

    /// Transform with the optimum pipe
    pub fn transform(&mut self, data: &Batch) -> Result<Batch> {
        self.optimum_pipe
            .as_mut()
            .ok_or_else(|| Error::NotFitted(format!("hyperpipe '{}' has not been fitted", self.name)))?
            .transform(data)
    }
}
