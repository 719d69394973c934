//! End-to-end tests for churn model training and evaluation

mod common;

use shelfphi::pipeline::churn::{
    evaluate, load_customers, split_data, train, Label, ModelFamily, PredictorKind, TrainingOptions,
};
use polars::prelude::NamedFrom;
use shelfphi::pipeline::AnalysisError;

fn quick_options() -> TrainingOptions {
    TrainingOptions {
        mars_levels: 3,
        forest_levels: 2,
        ..TrainingOptions::default()
    }
}

fn drop_id() -> Vec<String> {
    vec!["CustomerID".to_string()]
}

#[test]
fn test_load_customers_from_csv() {
    let mut df = common::create_noisy_customers(200);
    let (_dir, path) = common::create_temp_csv(&mut df);

    let table = load_customers(&path, 1000, &[]).unwrap();

    // Rows 7, 57, 107 and 157 have no TotalCharges
    assert_eq!(table.dropped_rows, 4);
    assert_eq!(table.len(), 196);
    assert_eq!(
        table.predictor_names(),
        vec!["Tenure", "TotalCharges", "MonthlyCharges", "Contract", "PaymentMethod"]
    );
    let contract = &table.predictors[3];
    assert!(contract.is_categorical());
    assert!(matches!(contract.kind, PredictorKind::Categorical { .. }));
    assert_eq!(table.features.n_cols(), 5);
}

#[test]
fn test_drop_columns_are_not_predictors() {
    let mut df = common::create_separable_customers(10);
    let (_dir, path) = common::create_temp_csv(&mut df);

    let table = load_customers(&path, 1000, &drop_id()).unwrap();
    assert!(!table.predictor_names().contains(&"CustomerID".to_string()));
    assert_eq!(table.count(Label::Left), 10);
    assert_eq!(table.count(Label::Current), 10);
}

#[test]
fn test_separable_customers_end_to_end() {
    let mut df = common::create_separable_customers(30);
    let (_dir, path) = common::create_temp_csv(&mut df);
    let table = load_customers(&path, 1000, &drop_id()).unwrap();

    let options = quick_options();
    let (data, searches, model) = train(&table, &options).unwrap();
    assert_eq!(data.train_y.len(), 42);
    assert_eq!(data.test_y.len(), 18);
    assert_eq!(searches.len(), ModelFamily::ALL.len());

    let evaluation = evaluate(&model, &data, 0.5);
    assert_eq!(evaluation.test_auc, Some(1.0));
    assert_eq!(evaluation.confusion.true_left, 9);
    assert_eq!(evaluation.confusion.true_current, 9);
    assert_eq!(evaluation.accuracy, 1.0);

    // Nine leavers at 50 against nine stayers at 80
    let expected = 450.0 / 1170.0;
    assert!((evaluation.revenue_at_risk - expected).abs() < 1e-9);

    assert_eq!(evaluation.importance.len(), data.predictors.len());
    assert_eq!(evaluation.importance[0].scaled, 100.0);
}

#[test]
fn test_selected_model_has_best_cv_auc() {
    let mut df = common::create_noisy_customers(240);
    let (_dir, path) = common::create_temp_csv(&mut df);
    let table = load_customers(&path, 1000, &[]).unwrap();

    let (data, searches, model) = train(&table, &quick_options()).unwrap();
    let best = searches
        .iter()
        .filter_map(|s| s.best())
        .map(|s| s.mean_auc)
        .fold(f64::NEG_INFINITY, f64::max);
    assert_eq!(model.selected.cv_auc(), best);

    let evaluation = evaluate(&model, &data, 0.5);
    let auc = evaluation.test_auc.unwrap();
    assert!(auc > 0.6, "test AUC {}", auc);
    assert_eq!(evaluation.confusion.total(), data.test_y.len());
}

#[test]
fn test_training_is_reproducible() {
    let mut df = common::create_noisy_customers(150);
    let (_dir, path) = common::create_temp_csv(&mut df);
    let table = load_customers(&path, 1000, &[]).unwrap();
    let options = quick_options();

    let (data_a, searches_a, model_a) = train(&table, &options).unwrap();
    let (data_b, searches_b, model_b) = train(&table, &options).unwrap();

    assert_eq!(data_a.split, data_b.split);
    assert_eq!(
        serde_json::to_string(&searches_a).unwrap(),
        serde_json::to_string(&searches_b).unwrap()
    );
    assert_eq!(
        serde_json::to_string(&evaluate(&model_a, &data_a, 0.5)).unwrap(),
        serde_json::to_string(&evaluate(&model_b, &data_b, 0.5)).unwrap()
    );
}

#[test]
fn test_different_seed_changes_split() {
    let mut df = common::create_noisy_customers(150);
    let (_dir, path) = common::create_temp_csv(&mut df);
    let table = load_customers(&path, 1000, &[]).unwrap();

    let a = split_data(&table, &quick_options()).unwrap();
    let b = split_data(
        &table,
        &TrainingOptions {
            seed: 7,
            ..quick_options()
        },
    )
    .unwrap();
    assert_eq!(a.split.train.len(), b.split.train.len());
    assert_ne!(a.split.train, b.split.train);
}

#[test]
fn test_single_class_is_rejected() {
    let mut df = common::create_separable_customers(10);
    let status: Vec<&str> = vec!["Current"; 20];
    df.replace("Status", polars::prelude::Series::new("Status".into(), status))
        .unwrap();
    let (_dir, path) = common::create_temp_csv(&mut df);
    let table = load_customers(&path, 1000, &drop_id()).unwrap();

    let err = split_data(&table, &quick_options()).unwrap_err();
    assert!(matches!(err, AnalysisError::SingleClass(_)));
}

#[test]
fn test_unknown_status_is_rejected() {
    let mut df = common::create_separable_customers(5);
    let mut status: Vec<&str> = vec!["Left"; 10];
    status[3] = "Maybe";
    df.replace("Status", polars::prelude::Series::new("Status".into(), status))
        .unwrap();
    let (_dir, path) = common::create_temp_csv(&mut df);

    let err = load_customers(&path, 1000, &drop_id()).unwrap_err();
    assert!(err.to_string().contains("Maybe"));
}

#[test]
fn test_missing_required_column_is_rejected() {
    let mut df = common::create_separable_customers(5);
    let _ = df.drop_in_place("MonthlyCharges").unwrap();
    let (_dir, path) = common::create_temp_csv(&mut df);

    let err = load_customers(&path, 1000, &drop_id()).unwrap_err();
    assert!(err.to_string().contains("MonthlyCharges"));
}
