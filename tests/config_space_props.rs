//! Property tests for configuration spaces and grid optimizers

use afinar::hpo::{GridSearch, Optimizer, ParameterDomain, ParameterValue, RandomGridSearch};
use afinar::pipeline::builtin::{NearestCentroid, SelectFirst};
use afinar::pipeline::{Pipeline, PipelineElement, PipelineNode, Switch};
use proptest::prelude::*;

fn int_values(n: usize) -> ParameterDomain {
    ParameterDomain::Values((1..=n as i64).map(ParameterValue::Int).collect())
}

/// One feature-selection stage per entry (with that many values for `k`), a switch over
/// `switch_sizes` alternatives and a final classifier
fn pipeline(stage_sizes: &[usize], switch_sizes: &[usize]) -> Pipeline {
    let mut nodes: Vec<PipelineNode> = stage_sizes
        .iter()
        .enumerate()
        .map(|(i, &n)| PipelineElement::new(format!("s{i}"), Box::new(SelectFirst::default())).with_hyperparameter("k", int_values(n)).into())
        .collect();
    if !switch_sizes.is_empty() {
        let mut switch = Switch::new("pick");
        for (i, &n) in switch_sizes.iter().enumerate() {
            switch = switch.with_element(
                PipelineElement::new(format!("alt{i}"), Box::new(SelectFirst::default())).with_hyperparameter("k", int_values(n)),
            );
        }
        nodes.push(switch.into());
    }
    nodes.push(PipelineElement::new("clf", Box::new(NearestCentroid::default())).into());
    Pipeline::new(nodes)
}

fn drain(optimizer: &mut dyn Optimizer) -> Vec<String> {
    std::iter::from_fn(|| optimizer.ask()).map(|c| c.to_string()).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_space_size_is_product_of_stages_and_sum_of_alternatives(
        stages in proptest::collection::vec(1usize..4, 0..4),
        alternatives in proptest::collection::vec(1usize..4, 0..4),
    ) {
        let expected_switch: usize = if alternatives.is_empty() { 1 } else { alternatives.iter().sum() };
        let expected = stages.iter().product::<usize>() * expected_switch;
        prop_assert_eq!(pipeline(&stages, &alternatives).config_space().len(), expected);
    }

    #[test]
    fn prop_grid_yields_every_configuration_once_in_stable_order(
        stages in proptest::collection::vec(1usize..4, 1..3),
        alternatives in proptest::collection::vec(1usize..3, 0..3),
    ) {
        let pipe = pipeline(&stages, &alternatives);
        let mut first = GridSearch::new();
        first.prepare(pipe.nodes(), true).expect("operation should succeed");
        let a = drain(&mut first);

        let mut second = GridSearch::new();
        second.prepare(pipe.nodes(), true).expect("operation should succeed");
        let b = drain(&mut second);

        prop_assert_eq!(a.len(), pipe.config_space().len());
        prop_assert_eq!(&a, &b);
        let mut unique = a.clone();
        unique.sort();
        unique.dedup();
        prop_assert_eq!(unique.len(), a.len());
    }

    #[test]
    fn prop_random_grid_samples_distinct_subset(
        stages in proptest::collection::vec(1usize..4, 1..3),
        k in 0usize..20,
        seed in any::<u64>(),
    ) {
        let pipe = pipeline(&stages, &[]);
        let total = pipe.config_space().len();
        let mut grid = GridSearch::new();
        grid.prepare(pipe.nodes(), true).expect("operation should succeed");
        let all = drain(&mut grid);

        let mut random = RandomGridSearch::new(k).with_seed(seed);
        random.prepare(pipe.nodes(), true).expect("operation should succeed");
        let sampled = drain(&mut random);

        prop_assert_eq!(sampled.len(), k.min(total));
        prop_assert!(sampled.iter().all(|c| all.contains(c)));
        let mut unique = sampled.clone();
        unique.sort();
        unique.dedup();
        prop_assert_eq!(unique.len(), sampled.len());
    }

    #[test]
    fn prop_every_configuration_applies(
        stages in proptest::collection::vec(1usize..3, 1..3),
        alternatives in proptest::collection::vec(1usize..3, 1..3),
    ) {
        let pipe = pipeline(&stages, &alternatives);
        for config in pipe.config_space().iter() {
            let mut candidate = pipe.clone();
            prop_assert!(candidate.set_params(&config).is_ok());
        }
    }
}
