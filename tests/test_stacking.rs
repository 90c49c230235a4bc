//! Integration test: Stacking ensemble

use churnlab::ensemble::{EnsembleComposer, StackingConfig};
use churnlab::error::PipelineError;
use churnlab::explainability::ImportanceReporter;
use churnlab::training::{ranking_scores, Classifier, ModelFamily, ModelSpec, ParamSet, TrainedModel};
use ndarray::{Array1, Array2, Axis};

fn dataset(n: usize) -> (Array2<f64>, Array1<f64>) {
    let x = Array2::from_shape_fn((n, 2), |(i, j)| {
        let center = if i % 4 == 0 { 1.2 } else { -0.8 };
        center + (((i * 7 + j * 13) % 11) as f64 / 11.0 - 0.5) * 1.8
    });
    let y = Array1::from_iter((0..n).map(|i| if i % 4 == 0 { 1.0 } else { 0.0 }));
    (x, y)
}

fn fitted(family: ModelFamily, params: ParamSet, x: &Array2<f64>, y: &Array1<f64>) -> (String, TrainedModel) {
    let mut model = ModelSpec::new(family, params).build(3).unwrap();
    model.fit(x, y).unwrap();
    (family.to_string(), model)
}

fn bases(x: &Array2<f64>, y: &Array1<f64>) -> Vec<(String, TrainedModel)> {
    vec![
        fitted(ModelFamily::LogisticRegression, ParamSet::new(), x, y),
        fitted(ModelFamily::DecisionTree, ParamSet::new().with("max_depth", 3usize), x, y),
        fitted(ModelFamily::LinearSvm, ParamSet::new(), x, y),
    ]
}

fn composer(folds: usize) -> EnsembleComposer {
    EnsembleComposer::new(StackingConfig {
        folds,
        seed: 5,
        passthrough: false,
    })
}

#[test]
fn test_out_of_fold_rows_never_seen_by_their_base() {
    let (x, y) = dataset(80);
    let meta = ModelSpec::defaults(ModelFamily::LogisticRegression);
    let stack = composer(4).compose_stack(&bases(&x, &y), &meta, &x, &y).unwrap();

    let splits = stack.splits();
    assert_eq!(splits.len(), 4);
    let mut seen = vec![0usize; 80];
    for split in splits {
        assert!(split.test_indices.iter().all(|i| !split.train_indices.contains(i)));
        for &i in &split.test_indices {
            seen[i] += 1;
        }
    }
    assert!(seen.iter().all(|&c| c == 1));

    // Recompute the logistic regression column fold by fold
    let oof = stack.out_of_fold_features().unwrap();
    assert_eq!(oof.dim(), (80, 3));
    for split in splits {
        let mut model = ModelSpec::defaults(ModelFamily::LogisticRegression).build(3).unwrap();
        model
            .fit(
                &x.select(Axis(0), &split.train_indices),
                &y.select(Axis(0), &split.train_indices),
            )
            .unwrap();
        let expected = ranking_scores(&model, &x.select(Axis(0), &split.test_indices)).unwrap();
        for (&row, &score) in split.test_indices.iter().zip(expected.iter()) {
            assert!((oof[[row, 0]] - score).abs() < 1e-12);
        }
    }
}

#[test]
fn test_label_only_base_contributes_hard_labels() {
    let (x, y) = dataset(40);
    let meta = ModelSpec::defaults(ModelFamily::LogisticRegression);
    let stack = composer(4).compose_stack(&bases(&x, &y), &meta, &x, &y).unwrap();

    let svm_column = stack.out_of_fold_features().unwrap().column(2).to_owned();
    assert!(svm_column.iter().all(|&v| v == 0.0 || v == 1.0));
}

#[test]
fn test_capabilities_follow_meta_model() {
    let (x, y) = dataset(40);
    let with_proba = composer(4)
        .compose_stack(&bases(&x, &y), &ModelSpec::defaults(ModelFamily::LogisticRegression), &x, &y)
        .unwrap();
    assert!(with_proba.capabilities().supports_probability);
    assert!(!with_proba.capabilities().supports_importance);
    assert_eq!(with_proba.predict_proba(&x).unwrap().len(), 40);

    let labels_only = composer(4)
        .compose_stack(&bases(&x, &y), &ModelSpec::defaults(ModelFamily::LinearSvm), &x, &y)
        .unwrap();
    assert!(!labels_only.capabilities().supports_probability);
    assert!(matches!(
        labels_only.predict_proba(&x),
        Err(PipelineError::UnsupportedCapability { .. })
    ));
}

#[test]
fn test_stack_importance_is_unsupported() {
    let (x, y) = dataset(40);
    let meta = ModelSpec::defaults(ModelFamily::LogisticRegression);
    let stack = composer(4).compose_stack(&bases(&x, &y), &meta, &x, &y).unwrap();
    let names = vec!["a".to_string(), "b".to_string()];

    let err = ImportanceReporter::new().rank(&stack, &names).unwrap_err();
    assert!(err.is_capability_absence());
}

#[test]
fn test_passthrough_widens_meta_features() {
    let (x, y) = dataset(40);
    let stack = EnsembleComposer::new(StackingConfig {
        folds: 4,
        seed: 1,
        passthrough: true,
    })
    .compose_stack(&bases(&x, &y), &ModelSpec::defaults(ModelFamily::LogisticRegression), &x, &y)
    .unwrap();

    let oof = stack.out_of_fold_features().unwrap();
    assert_eq!(oof.ncols(), 5);
    assert_eq!(oof.column(3), x.column(0));
    assert_eq!(stack.predict(&x).unwrap().len(), 40);
}

#[test]
fn test_width_mismatch_on_predict() {
    let (x, y) = dataset(40);
    let stack = composer(4)
        .compose_stack(&bases(&x, &y), &ModelSpec::defaults(ModelFamily::LogisticRegression), &x, &y)
        .unwrap();
    let wrong = Array2::zeros((3, 5));
    assert!(matches!(stack.predict(&wrong), Err(PipelineError::ShapeError { .. })));
}
