//! Integration tests: fitness evaluation end to end

use fairfit::config::FitnessConfig;
use fairfit::data::{Column, Dataset};
use fairfit::fitness::{fitness_value, score_predictions, FitnessEvaluator};
use fairfit::training::ModelKind;
use fairfit::FairfitError;
use ndarray::Array1;

/// 100 rows, target and protected attribute each balanced 50/50 and
/// independent; `signal` determines the target exactly
fn balanced_dataset() -> Dataset {
    let n = 100;
    let target: Vec<f64> = (0..n).map(|i| (i % 2) as f64).collect();
    let sex: Vec<&str> = (0..n).map(|i| if (i / 2) % 2 == 0 { "female" } else { "male" }).collect();
    let signal: Vec<f64> = target.iter().map(|t| if *t == 1.0 { 5.0 } else { -5.0 }).collect();
    let age: Vec<f64> = (0..n).map(|i| 20.0 + (i % 37) as f64).collect();
    Dataset::new(vec![
        ("signal".to_string(), Column::numeric(signal)),
        ("age".to_string(), Column::numeric(age)),
        ("sex".to_string(), Column::categorical(sex)),
        ("label".to_string(), Column::numeric(target)),
    ])
    .unwrap()
}

#[test]
fn test_perfect_model_has_zero_fitness() {
    let evaluator = FitnessEvaluator::default();
    let breakdown = evaluator
        .evaluate(&balanced_dataset(), "sex", "label", ModelKind::LogisticRegression)
        .unwrap();

    assert_eq!(breakdown.n_test, 20);
    assert_eq!(breakdown.n_train, 80);
    assert_eq!(breakdown.performance.score, 1.0);
    assert_eq!(breakdown.fairness.total(), 0.0);
    assert_eq!(breakdown.fitness, 0.0);
}

#[test]
fn test_fitness_by_name() {
    let evaluator = FitnessEvaluator::default();
    let fitness = evaluator
        .fitness(&balanced_dataset(), "sex", "label", "logistic_regression")
        .unwrap();
    assert_eq!(fitness, 0.0);
}

#[test]
fn test_every_model_kind_is_deterministic() {
    let ds = balanced_dataset();
    let evaluator = FitnessEvaluator::new(FitnessConfig::new().with_random_state(7));
    for kind in ModelKind::ALL {
        let a = evaluator.evaluate(&ds, "sex", "label", kind).unwrap();
        let b = evaluator.evaluate(&ds, "sex", "label", kind).unwrap();
        assert_eq!(a.fitness.to_bits(), b.fitness.to_bits(), "{} not reproducible", kind);
        assert!(a.fitness >= 0.0);
        assert!(a.fitness >= a.fairness.total() - 1.0);
    }
}

#[test]
fn test_unsupported_model_kind() {
    let evaluator = FitnessEvaluator::default();
    let err = evaluator
        .fitness(&balanced_dataset(), "sex", "label", "naive_bayes")
        .unwrap_err();
    assert!(matches!(err, FairfitError::UnsupportedModelKind(name) if name == "naive_bayes"));
}

#[test]
fn test_all_positive_predictions_raise_performance_term() {
    let ds = balanced_dataset();
    let rows: Vec<usize> = (0..ds.n_rows()).collect();
    let predictions = Array1::ones(rows.len());

    let score = score_predictions(&ds, &rows, "sex", "label", &predictions).unwrap();
    assert_eq!(score.fairness.statistical_parity, 0.0);
    assert_eq!(score.fairness.disparity, 0.0);
    assert!(score.performance.score < 0.5);
    assert!(score.fitness > 0.5);
    assert_eq!(score.fitness, fitness_value(score.performance.score, &score.fairness));
}

#[test]
fn test_preparation_handles_missing_and_text_target() {
    let n = 40;
    let income: Vec<Option<f64>> = (0..n).map(|i| if i % 9 == 0 { None } else { Some(i as f64) }).collect();
    let label: Vec<&str> = (0..n).map(|i| if i >= 20 { "yes" } else { "no" }).collect();
    let race: Vec<Option<String>> = (0..n)
        .map(|i| if i == 3 { None } else { Some(if i % 3 == 0 { "x" } else { "y" }.to_string()) })
        .collect();
    let ds = Dataset::new(vec![
        ("income".to_string(), Column::Numeric(income)),
        ("race".to_string(), Column::Categorical(race)),
        ("label".to_string(), Column::categorical(label)),
    ])
    .unwrap();

    let breakdown = FitnessEvaluator::default()
        .evaluate(&ds, "race", "label", ModelKind::Knn)
        .unwrap();
    // The row with no race is dropped rather than assigned a group
    assert_eq!(breakdown.n_test + breakdown.n_train, 39);
    assert!(breakdown.fitness.is_finite());
}

#[test]
fn test_missing_columns_rejected() {
    let evaluator = FitnessEvaluator::default();
    let ds = balanced_dataset();
    assert!(matches!(
        evaluator.evaluate(&ds, "race", "label", ModelKind::Knn),
        Err(FairfitError::ColumnNotFound(_))
    ));
    assert!(matches!(
        evaluator.evaluate(&ds, "sex", "outcome", ModelKind::Knn),
        Err(FairfitError::ColumnNotFound(_))
    ));
}
