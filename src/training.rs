//! Offline training: encode the table, split, fit the tree, score it.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use smartcore::api::SupervisedEstimator;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::metrics::accuracy;
use smartcore::model_selection::{cross_validate, train_test_split, KFold};

use crate::bundle::{ModelBundle, TrainingSummary};
use crate::classifier::{to_matrix, DecisionTreeModel, TreeClassifier, TreeParams};
use crate::encoder::{EncoderState, UnseenCategoryPolicy};
use crate::error::{Error, Result};
use crate::records::PatientRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Fraction of rows held out for the accuracy check. 0 trains on everything.
    pub test_size: f32,
    pub shuffle: bool,
    pub seed: u64,
    /// Run k-fold cross validation on the whole table when set.
    pub cv_folds: Option<usize>,
    pub tree: TreeParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            test_size: 0.1,
            shuffle: true,
            seed: 50,
            cv_folds: None,
            tree: TreeParams::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossValidationScores {
    pub folds: usize,
    pub mean_train_accuracy: f64,
    pub mean_test_accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    pub summary: TrainingSummary,
    pub cross_validation: Option<CrossValidationScores>,
}

/// Splits labelled records into encoded feature rows and targets.
pub fn feature_and_target(
    encoder: &EncoderState,
    records: &[PatientRecord],
) -> Result<(Vec<Vec<f64>>, Vec<i32>)> {
    let y = records
        .iter()
        .enumerate()
        .map(|(row, r)| {
            r.heart_disease
                .map(i32::from)
                .ok_or(Error::MissingLabel { row: row + 1 })
        })
        .collect::<Result<Vec<i32>>>()?;

    // The encoder was fitted on these rows, so every category is known.
    let x = encoder
        .encode_table(records, UnseenCategoryPolicy::Reject)?
        .into_iter()
        .map(|v| v.into_values())
        .collect();

    Ok((x, y))
}

fn held_out_rows(n: usize, test_size: f32) -> Result<usize> {
    if !(0.0..1.0).contains(&test_size) {
        return Err(Error::Training(format!(
            "test size must be in [0, 1), got {}",
            test_size
        )));
    }
    Ok((n as f32 * test_size) as usize)
}

fn cross_validation(
    x: &DenseMatrix<f64>,
    y: &Vec<i32>,
    folds: usize,
    config: &TrainingConfig,
) -> Result<CrossValidationScores> {
    if folds < 2 || folds > y.len() {
        return Err(Error::Training(format!(
            "cannot run {}-fold cross validation on {} rows",
            folds,
            y.len()
        )));
    }
    let cv = KFold::default()
        .with_n_splits(folds)
        .with_shuffle(config.shuffle)
        .with_seed(Some(config.seed));
    let results = cross_validate(
        TreeClassifier::new(),
        x,
        y,
        config.tree.to_parameters(),
        &cv,
        &accuracy,
    )
    .map_err(|e| Error::Training(format!("{}", e)))?;

    Ok(CrossValidationScores {
        folds,
        mean_train_accuracy: results.mean_train_score(),
        mean_test_accuracy: results.mean_test_score(),
    })
}

/// Fits encoder and classifier on `records` and bundles them.
pub fn train(
    records: &[PatientRecord],
    config: &TrainingConfig,
) -> Result<(ModelBundle, TrainingReport)> {
    let encoder = EncoderState::fit(records)?;
    let (rows, y) = feature_and_target(&encoder, records)?;
    let x = to_matrix(&rows)?;
    debug!("encoded {} rows onto {:?}", rows.len(), encoder.columns());

    let n_test = held_out_rows(rows.len(), config.test_size)?;
    let (classifier, summary) = if n_test == 0 {
        let classifier =
            DecisionTreeModel::fit(encoder.columns().to_vec(), &x, &y, &config.tree)?;
        let summary = TrainingSummary {
            rows: rows.len(),
            train_rows: rows.len(),
            test_rows: 0,
            test_accuracy: None,
        };
        (classifier, summary)
    } else {
        let (x_train, x_test, y_train, y_test) = train_test_split(
            &x,
            &y,
            config.test_size,
            config.shuffle,
            Some(config.seed),
        );
        let classifier =
            DecisionTreeModel::fit(encoder.columns().to_vec(), &x_train, &y_train, &config.tree)?;
        let predicted = classifier.predict_matrix(&x_test)?;
        let summary = TrainingSummary {
            rows: rows.len(),
            train_rows: y_train.len(),
            test_rows: y_test.len(),
            test_accuracy: Some(accuracy(&y_test, &predicted)),
        };
        (classifier, summary)
    };

    if let Some(score) = summary.test_accuracy {
        info!(
            "test accuracy {:.4} on {} held-out rows",
            score, summary.test_rows
        );
    }

    let cross_validation = match config.cv_folds {
        Some(folds) => {
            let scores = cross_validation(&x, &y, folds, config)?;
            info!(
                "{}-fold cross validation: train accuracy {:.4}, test accuracy {:.4}",
                folds, scores.mean_train_accuracy, scores.mean_test_accuracy
            );
            Some(scores)
        }
        None => None,
    };

    let report = TrainingReport {
        summary: summary.clone(),
        cross_validation,
    };
    Ok((ModelBundle::new(encoder, classifier, summary), report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Classifier;
    use crate::test_support::sample_records;

    #[test]
    fn holds_out_a_tenth_by_default() {
        let records = sample_records();
        let (_, report) = train(&records, &TrainingConfig::default()).unwrap();
        assert_eq!(report.summary.rows, 30);
        assert_eq!(report.summary.test_rows, 3);
        assert_eq!(report.summary.train_rows, 27);
        let accuracy = report.summary.test_accuracy.unwrap();
        assert!((0.0..=1.0).contains(&accuracy));
        assert!(report.cross_validation.is_none());
    }

    #[test]
    fn per_record_prediction_matches_batch_prediction() {
        let records = sample_records();
        let config = TrainingConfig {
            test_size: 0.0,
            ..TrainingConfig::default()
        };
        let (bundle, report) = train(&records, &config).unwrap();
        assert_eq!(report.summary.test_accuracy, None);

        let (rows, labels) = feature_and_target(&bundle.encoder, &records).unwrap();
        let batch = bundle.classifier.predict_rows(&rows).unwrap();
        for (record, expected) in records.iter().zip(&batch) {
            let vector = bundle
                .encoder
                .encode(record, UnseenCategoryPolicy::Reject)
                .unwrap();
            assert_eq!(bundle.classifier.predict(&vector).unwrap(), *expected);
        }

        let fitted = batch.iter().zip(&labels).filter(|(p, l)| p == l).count();
        assert!(fitted as f64 / labels.len() as f64 >= 0.9);
    }

    #[test]
    fn cross_validation_reports_scores() {
        let config = TrainingConfig {
            cv_folds: Some(3),
            ..TrainingConfig::default()
        };
        let (_, report) = train(&sample_records(), &config).unwrap();
        let scores = report.cross_validation.unwrap();
        assert_eq!(scores.folds, 3);
        assert!((0.0..=1.0).contains(&scores.mean_test_accuracy));
        assert!((0.0..=1.0).contains(&scores.mean_train_accuracy));
    }

    #[test]
    fn cross_validation_follows_the_seed() {
        let config = TrainingConfig {
            cv_folds: Some(5),
            seed: 7,
            ..TrainingConfig::default()
        };
        let records = sample_records();
        let (_, first) = train(&records, &config).unwrap();
        let (_, second) = train(&records, &config).unwrap();
        assert_eq!(first.cross_validation, second.cross_validation);

        let unshuffled = TrainingConfig {
            shuffle: false,
            ..config
        };
        let (_, third) = train(&records, &unshuffled).unwrap();
        let (_, fourth) = train(&records, &unshuffled).unwrap();
        assert_eq!(third.cross_validation, fourth.cross_validation);
    }

    #[test]
    fn unlabelled_rows_cannot_train() {
        let mut records = sample_records();
        records[4].heart_disease = None;
        let err = train(&records, &TrainingConfig::default()).unwrap_err();
        assert!(matches!(err, Error::MissingLabel { row: 5 }));
    }

    #[test]
    fn rejects_bad_test_size() {
        let config = TrainingConfig {
            test_size: 1.0,
            ..TrainingConfig::default()
        };
        assert!(matches!(
            train(&sample_records(), &config),
            Err(Error::Training(_))
        ));
    }
}
