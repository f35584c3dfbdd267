//! Property-based tests for document validation

use super::error::ValidationError;
use super::validator::validate_spec;
use crate::config::schema::*;
use proptest::prelude::*;
use std::collections::BTreeMap;

fn element(identifier: &str, name: String) -> NodeSpec {
    NodeSpec::Element(ElementSpec {
        element: identifier.to_string(),
        name: Some(name),
        params: BTreeMap::new(),
        hyperparameters: BTreeMap::new(),
        test_disabled: false,
        disabled: false,
        data_only: false,
    })
}

fn spec_with(outer_splits: usize, inner_splits: usize, n_transformers: usize) -> HyperpipeSpec {
    let mut elements: Vec<NodeSpec> =
        (0..n_transformers).map(|i| element("StandardScaler", format!("scale{i}"))).collect();
    elements.push(element("NearestCentroid", "clf".to_string()));
    HyperpipeSpec {
        name: "prop".to_string(),
        metrics: vec!["accuracy".to_string()],
        best_config_metric: None,
        outer_cv: CvSpec::KFold(KFoldSpec { n_splits: outer_splits, shuffle: true, seed: 42 }),
        inner_cv: KFoldSpec { n_splits: inner_splits, shuffle: true, seed: 42 },
        optimizer: OptimizerSpec::Grid,
        eval_final_performance: true,
        save_predictions: false,
        cache: CacheSpec::default(),
        task: Default::default(),
        constraints: Vec::new(),
        n_jobs: None,
        output_dir: None,
        elements,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_valid_spec_passes(outer in 2usize..12, inner in 2usize..12, n in 0usize..6) {
        prop_assert!(validate_spec(&spec_with(outer, inner, n)).is_ok());
    }

    #[test]
    fn prop_too_few_splits_rejected(splits in 0usize..2, n in 0usize..4) {
        let spec = spec_with(5, splits, n);
        prop_assert_eq!(validate_spec(&spec), Err(ValidationError::InvalidSplits(splits)));
    }

    #[test]
    fn prop_holdout_fraction_in_range_passes(test_size in 0.01f64..0.99) {
        let mut spec = spec_with(3, 3, 1);
        spec.outer_cv = CvSpec::Holdout(HoldoutSpec { test_size, seed: 7 });
        prop_assert!(validate_spec(&spec).is_ok());
    }

    #[test]
    fn prop_holdout_fraction_out_of_range_rejected(test_size in 1.0f64..100.0) {
        let mut spec = spec_with(3, 3, 1);
        spec.outer_cv = CvSpec::Holdout(HoldoutSpec { test_size, seed: 7 });
        prop_assert!(
            matches!(validate_spec(&spec), Err(ValidationError::InvalidTestSize(_))),
            "expected InvalidTestSize error"
        );
    }

    #[test]
    fn prop_names_with_separator_rejected(prefix in "[a-z]{1,8}", suffix in "[a-z]{0,8}") {
        let mut spec = spec_with(3, 3, 1);
        spec.elements[0] = element("StandardScaler", format!("{prefix}__{suffix}"));
        prop_assert!(
            matches!(validate_spec(&spec), Err(ValidationError::InvalidElementName(_))),
            "expected InvalidElementName error"
        );
    }
}
