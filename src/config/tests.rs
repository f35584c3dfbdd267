//! Document parsing and building tests

use super::*;
use crate::hpo::{ConstraintStrategy, ParameterDomain, ParameterValue};
use crate::validation::Task;
use crate::Error;

const DEMO: &str = r#"
name: demo
metrics: [accuracy, f1_score]
best_config_metric: accuracy
outer_cv: { n_splits: 2, shuffle: true, seed: 42 }
inner_cv: { n_splits: 3 }
optimizer: { strategy: grid }
eval_final_performance: true
cache: { enabled: true, single_subject: false }
task: classification
constraints:
  - { kind: minimum, metric: accuracy, threshold: 0.6, strategy: mean }
  - { kind: dummy, metric: accuracy, margin: 0.05, strategy: first }
elements:
  - element: StandardScaler
  - switch: reduce
    elements:
      - { element: SelectFirst, name: first5, params: { k: 5 } }
      - { element: Passthrough }
  - element: NearestCentroid
    hyperparameters:
      shrink: { values: [0.0, 0.5] }
"#;

#[test]
fn test_parse_demo_document() {
    let spec = parse_spec(DEMO).expect("operation should succeed");
    assert_eq!(spec.name, "demo");
    assert_eq!(spec.metrics, vec!["accuracy", "f1_score"]);
    assert_eq!(spec.outer_cv, CvSpec::KFold(KFoldSpec { n_splits: 2, shuffle: true, seed: 42 }));
    assert_eq!(spec.inner_cv, KFoldSpec { n_splits: 3, shuffle: true, seed: 42 });
    assert_eq!(spec.optimizer, OptimizerSpec::Grid);
    assert!(spec.cache.enabled);
    assert_eq!(spec.task, Task::Classification);
    assert_eq!(spec.constraints.len(), 2);
    assert_eq!(
        spec.constraints[0],
        ConstraintSpec::Minimum { metric: "accuracy".to_string(), threshold: 0.6, strategy: ConstraintStrategy::Mean }
    );
    assert_eq!(spec.elements.len(), 3);
    assert_eq!(spec.elements[1].name(), "reduce");
    assert_eq!(spec.elements[1].children()[0].name(), "first5");
    assert_eq!(spec.elements[1].children()[1].name(), "Passthrough");

    match &spec.elements[2] {
        NodeSpec::Element(e) => assert_eq!(
            e.hyperparameters["shrink"],
            ParameterDomain::Values(vec![ParameterValue::Float(0.0), ParameterValue::Float(0.5)])
        ),
        other => panic!("unexpected node {other:?}"),
    }
    match &spec.elements[1].children()[0] {
        NodeSpec::Element(e) => assert_eq!(e.params["k"], ParameterValue::Int(5)),
        other => panic!("unexpected node {other:?}"),
    }
}

#[test]
fn test_demo_document_validates_and_builds() {
    let spec = parse_spec(DEMO).expect("operation should succeed");
    validate_spec(&spec).expect("operation should succeed");
    let hyperpipe = build_hyperpipe(&spec).expect("operation should succeed");
    assert_eq!(hyperpipe.name(), "demo");
    assert_eq!(hyperpipe.best_config_metric(), "accuracy");
    assert_eq!(hyperpipe.metrics(), &["accuracy".to_string(), "f1_score".to_string()]);
    // 1 (scaler) x 2 (switch alternatives) x 2 (shrink values)
    assert_eq!(hyperpipe.pipeline().config_space().len(), 4);
}

#[test]
fn test_defaults_applied() {
    let spec = parse_spec("name: minimal\nelements:\n  - element: NearestCentroid\n").expect("operation should succeed");
    assert_eq!(spec.metrics, vec!["accuracy"]);
    assert_eq!(spec.outer_cv, CvSpec::KFold(KFoldSpec::default()));
    assert_eq!(spec.optimizer, OptimizerSpec::Grid);
    assert!(spec.eval_final_performance);
    assert!(!spec.save_predictions);
    assert!(!spec.cache.enabled);
    assert!(spec.n_jobs.is_none());
}

#[test]
fn test_parse_holdout_and_optimizers() {
    let spec = parse_spec(
        r#"
name: h
outer_cv: { test_size: 0.25 }
optimizer: { strategy: random_grid, k: 3, seed: 7 }
elements:
  - element: NearestCentroid
"#,
    )
    .expect("operation should succeed");
    assert_eq!(spec.outer_cv, CvSpec::Holdout(HoldoutSpec { test_size: 0.25, seed: 42 }));
    assert_eq!(spec.optimizer, OptimizerSpec::RandomGrid { k: Some(3), seed: 7 });

    let spec = parse_spec(
        r#"
name: t
optimizer: { strategy: timeboxed_random_grid, limit_seconds: 1.5 }
elements:
  - element: NearestCentroid
"#,
    )
    .expect("operation should succeed");
    assert_eq!(spec.optimizer, OptimizerSpec::TimeboxedRandomGrid { limit_seconds: 1.5, k: None, seed: 42 });
}

#[test]
fn test_parse_domains() {
    let spec = parse_spec(
        r#"
name: domains
elements:
  - element: KNeighborsClassifier
    hyperparameters:
      n_neighbors: { discrete: { low: 1, high: 7, step: 3 } }
  - element: StandardScaler
    test_disabled: true
    hyperparameters:
      with_mean: boolean
"#,
    )
    .expect("operation should succeed");
    match &spec.elements[0] {
        NodeSpec::Element(e) => {
            assert_eq!(e.hyperparameters["n_neighbors"], ParameterDomain::Discrete { low: 1, high: 7, step: 3 })
        }
        other => panic!("unexpected node {other:?}"),
    }
    match &spec.elements[1] {
        NodeSpec::Element(e) => {
            assert!(e.test_disabled);
            assert_eq!(e.hyperparameters["with_mean"], ParameterDomain::Boolean);
        }
        other => panic!("unexpected node {other:?}"),
    }
}

#[test]
fn test_parse_stack_and_branch() {
    let spec = parse_spec(
        r#"
name: composites
elements:
  - stack: both
    elements:
      - element: StandardScaler
      - element: Passthrough
  - branch: tuned
    local_search: { metric: accuracy, inner_cv: { n_splits: 2 } }
    elements:
      - element: KNeighborsClassifier
        hyperparameters:
          n_neighbors: { values: [1, 3] }
"#,
    )
    .expect("operation should succeed");
    assert!(matches!(&spec.elements[0], NodeSpec::Stack(s) if !s.voting && s.elements.len() == 2));
    match &spec.elements[1] {
        NodeSpec::Branch(b) => {
            let search = b.local_search.as_ref().expect("local search should be present");
            assert_eq!(search.metric, "accuracy");
            assert_eq!(search.inner_cv.n_splits, 2);
        }
        other => panic!("unexpected node {other:?}"),
    }

    let pipeline = build_pipeline(&spec).expect("operation should succeed");
    // self-optimizing branch hides its grid
    assert_eq!(pipeline.config_space().len(), 1);
}

#[test]
fn test_unknown_field_rejected() {
    let err = parse_spec("name: x\nepochs: 3\nelements:\n  - element: NearestCentroid\n").unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));

    let err = parse_spec("name: x\nelements:\n  - element: NearestCentroid\n    colour: red\n").unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[test]
fn test_build_rejects_bad_param() {
    let spec = parse_spec(
        r#"
name: p
elements:
  - element: KNeighborsClassifier
    params: { weights: distance }
"#,
    )
    .expect("operation should succeed");
    let err = build_hyperpipe(&spec).unwrap_err();
    assert!(matches!(err, Error::Configuration(ref m) if m.contains("weights")));
}

#[test]
fn test_build_rejects_invalid_document() {
    let mut spec = parse_spec(DEMO).expect("operation should succeed");
    spec.inner_cv.n_splits = 1;
    let err = build_hyperpipe(&spec).unwrap_err();
    assert!(matches!(err, Error::Configuration(ref m) if m.contains("n_splits")));
}

#[test]
fn test_estimator_allowed_as_intermediate_stage() {
    let spec = parse_spec(
        r#"
name: order
elements:
  - element: DummyClassifier
  - element: NearestCentroid
"#,
    )
    .expect("operation should succeed");
    assert!(build_pipeline(&spec).is_ok());
}

#[test]
fn test_build_optimizer_names() {
    let grid = build_optimizer(&OptimizerSpec::Grid).expect("operation should succeed");
    assert_eq!(grid.name(), "grid_search");
    let random = build_optimizer(&OptimizerSpec::RandomGrid { k: Some(2), seed: 1 }).expect("operation should succeed");
    assert_eq!(random.name(), "random_grid_search");
    let timed = build_optimizer(&OptimizerSpec::TimeboxedRandomGrid { limit_seconds: 0.5, k: None, seed: 1 })
        .expect("operation should succeed");
    assert_eq!(timed.name(), "timeboxed_random_grid_search");
    assert!(build_optimizer(&OptimizerSpec::TimeboxedRandomGrid { limit_seconds: -1.0, k: None, seed: 1 }).is_err());
}

#[test]
fn test_build_switch_routes_parameters() {
    let spec = parse_spec(DEMO).expect("operation should succeed");
    let pipeline = build_pipeline(&spec).expect("operation should succeed");
    let configs = pipeline.config_space().to_vec();
    assert!(configs.iter().all(|c| c.get("reduce__current_element").is_some()));
    assert!(configs.iter().all(|c| c.get("NearestCentroid__shrink").is_some()));
}

#[test]
fn test_load_spec_from_file() {
    let dir = tempfile::tempdir().expect("operation should succeed");
    let path = dir.path().join("demo.yaml");
    std::fs::write(&path, DEMO).expect("operation should succeed");
    let spec = load_spec(&path).expect("operation should succeed");
    assert_eq!(spec.name, "demo");

    let missing = load_spec(dir.path().join("missing.yaml")).unwrap_err();
    assert!(matches!(missing, Error::Configuration(ref m) if m.contains("missing.yaml")));
}

#[test]
fn test_output_dir_attaches_store() {
    let dir = tempfile::tempdir().expect("operation should succeed");
    let mut spec = parse_spec(DEMO).expect("operation should succeed");
    spec.output_dir = Some(dir.path().to_path_buf());
    assert!(build_hyperpipe(&spec).is_ok());
}
