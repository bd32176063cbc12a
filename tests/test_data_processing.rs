//! Integration tests for data processing: conversion, preparation, encoding and loading

use fairfit::data::{load_dataset, one_hot_encode, Column, DataPreparer, Dataset, DefaultPreparer};
use fairfit::fitness::FitnessEvaluator;
use fairfit::training::ModelKind;
use polars::prelude::*;
use std::io::Write;

#[test]
fn test_from_dataframe_column_kinds() {
    let df = df!(
        "age" => &[25i64, 32, 47],
        "score" => &[0.5, 0.7, 0.9],
        "sex" => &["f", "m", "f"],
        "label" => &[1i64, 0, 1]
    )
    .unwrap();

    let ds = Dataset::from_dataframe(&df).unwrap();
    assert_eq!(ds.n_rows(), 3);
    assert_eq!(ds.column_names(), &["age", "score", "sex", "label"]);
    assert!(!ds.column("age").unwrap().is_categorical());
    assert!(ds.column("sex").unwrap().is_categorical());
    assert_eq!(ds.numeric_values("age").unwrap(), vec![25.0, 32.0, 47.0]);
}

#[test]
fn test_preparation_then_encoding() {
    let df = df!(
        "income" => &[Some(10.0), None, Some(30.0), Some(20.0)],
        "city" => &["paris", "oslo", "rome", "oslo"],
        "sex" => &["f", "m", "m", "f"],
        "label" => &["no", "yes", "yes", "no"]
    )
    .unwrap();
    let ds = Dataset::from_dataframe(&df).unwrap();
    let prepared = DefaultPreparer::new().prepare(&ds, "label", "sex").unwrap();

    // Mean imputation and sorted-level target encoding
    assert_eq!(prepared.numeric_values("income").unwrap()[1], 20.0);
    assert_eq!(prepared.numeric_values("label").unwrap(), vec![0.0, 1.0, 1.0, 0.0]);
    assert!(prepared.has_column("sex"));

    // Drop-first one-hot: oslo is the dropped level
    let features = one_hot_encode(&prepared, &["sex", "label"]).unwrap();
    assert_eq!(features.names, vec!["income", "city_paris", "city_rome"]);
    assert_eq!(features.values.row(0).to_vec(), vec![10.0, 1.0, 0.0]);
    assert_eq!(features.values.row(3).to_vec(), vec![20.0, 0.0, 0.0]);
    assert_eq!(features.rows, vec![0, 1, 2, 3]);
}

#[test]
fn test_non_binary_target_rejected() {
    let ds = Dataset::new(vec![
        ("x".to_string(), Column::numeric(vec![1.0, 2.0, 3.0])),
        ("label".to_string(), Column::categorical(vec!["low", "mid", "high"])),
    ])
    .unwrap();
    assert!(DefaultPreparer::new().prepare(&ds, "label", "x").is_err());
}

#[test]
fn test_csv_round_trip_to_fitness() {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(file, "hours,sex,label").unwrap();
    for i in 0..50 {
        let label = i % 2;
        let sex = if (i / 2) % 2 == 0 { "f" } else { "m" };
        writeln!(file, "{},{},{}", if label == 1 { 40 + i % 5 } else { 10 + i % 5 }, sex, label).unwrap();
    }
    file.flush().unwrap();

    let ds = load_dataset(file.path()).unwrap();
    assert_eq!(ds.n_rows(), 50);
    assert!(ds.column("sex").unwrap().is_categorical());

    let breakdown = FitnessEvaluator::default()
        .evaluate(&ds, "sex", "label", ModelKind::LogisticRegression)
        .unwrap();
    assert_eq!(breakdown.n_test, 10);
    assert_eq!(breakdown.fitness, 0.0);
}

#[test]
fn test_unsupported_extension() {
    let file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
    assert!(load_dataset(file.path()).is_err());
}
