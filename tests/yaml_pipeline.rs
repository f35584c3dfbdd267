//! YAML documents driven end to end

use afinar::config::{build_hyperpipe, load_spec, parse_spec};
use afinar::data::Batch;
use afinar::tracking::{JsonFileStore, ResultStore};
use afinar::validation::RunStatus;
use afinar::Error;
use ndarray::{Array1, Array2};

fn blobs(n: usize) -> Batch {
    let x = Array2::from_shape_fn((n, 4), |(i, j)| (i % 2) as f64 * 5.0 + (i * (j + 1)) as f64 * 0.01);
    let y = Array1::from_shape_fn(n, |i| (i % 2) as f64);
    Batch::new(x).with_targets(y)
}

fn document(output_dir: &std::path::Path) -> String {
    format!(
        r#"
name: yaml_run
metrics: [accuracy, f1_score]
best_config_metric: accuracy
outer_cv: {{ n_splits: 2 }}
inner_cv: {{ n_splits: 2 }}
cache: {{ enabled: true }}
output_dir: {}
constraints:
  - {{ kind: dummy, metric: accuracy, margin: 0.0 }}
elements:
  - element: StandardScaler
    test_disabled: true
  - switch: reduce
    elements:
      - {{ element: SelectFirst, name: first2, params: {{ k: 2 }} }}
      - {{ element: Passthrough }}
  - element: NearestCentroid
    hyperparameters:
      shrink: {{ values: [0.0, 0.5] }}
"#,
        output_dir.display()
    )
}

#[test]
fn test_document_runs_and_persists() {
    let dir = tempfile::tempdir().expect("operation should succeed");
    let spec = parse_spec(&document(dir.path())).expect("operation should succeed");
    let mut hyperpipe = build_hyperpipe(&spec).expect("operation should succeed");
    assert_eq!(hyperpipe.pipeline().config_space().len(), 8);

    let data = blobs(32);
    let result = hyperpipe.fit(&data).expect("operation should succeed").clone();
    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.outer_folds.len(), 2);
    assert!(result.outer_folds.iter().all(|o| o.tested_configs.len() == 8));
    assert!(result.outer_folds.iter().all(|o| o.dummy.is_some()));
    assert!(result.metrics_test.contains_key("accuracy"));
    assert!(result.metrics_test.contains_key("f1_score"));

    let human = result.best_config_human.as_deref().expect("operation should succeed");
    assert!(human.contains("NearestCentroid"));

    let store = JsonFileStore::new(dir.path());
    let stored = store.load("yaml_run").expect("operation should succeed");
    assert_eq!(stored.status, RunStatus::Completed);
    assert_eq!(stored.outer_folds.len(), 2);

    let predictions = hyperpipe.predict(&data).expect("operation should succeed");
    assert_eq!(predictions.len(), 32);
}

#[test]
fn test_load_validates() {
    let dir = tempfile::tempdir().expect("operation should succeed");
    let path = dir.path().join("bad.yaml");
    std::fs::write(
        &path,
        "name: bad\nmetrics: [accuracy]\nbest_config_metric: r2\nelements:\n  - element: NearestCentroid\n",
    )
    .expect("operation should succeed");
    let err = load_spec(&path).unwrap_err();
    assert!(matches!(err, Error::Configuration(ref m) if m.contains("r2")));
}

#[test]
fn test_single_subject_document() {
    let spec = parse_spec(
        r#"
name: per_item
outer_cv: { n_splits: 2 }
inner_cv: { n_splits: 2 }
cache: { enabled: true, single_subject: true }
elements:
  - { element: Passthrough, name: features, data_only: true }
  - element: KNeighborsClassifier
    hyperparameters:
      n_neighbors: { values: [1, 3] }
"#,
    )
    .expect("operation should succeed");
    let mut hyperpipe = build_hyperpipe(&spec).expect("operation should succeed");
    let result = hyperpipe.fit(&blobs(24)).expect("operation should succeed");
    assert_eq!(result.status, RunStatus::Completed);
    assert!(result.outer_folds.iter().all(|o| o.n_failed() == 0));
}
