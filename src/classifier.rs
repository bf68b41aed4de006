//! The risk classifier seam and its decision-tree implementation.

use log::info;
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_classifier::{
    DecisionTreeClassifier, DecisionTreeClassifierParameters, SplitCriterion,
};

use crate::encoder::EncodedFeatureVector;
use crate::error::{Error, Result};

pub type TreeClassifier = DecisionTreeClassifier<f64, i32, DenseMatrix<f64>, Vec<i32>>;

/// A fitted binary classifier over encoded feature vectors.
pub trait Classifier {
    /// Column order the model was trained on.
    fn feature_columns(&self) -> &[String];

    /// Labels for rows already laid out in [`Classifier::feature_columns`] order.
    fn predict_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<i32>>;

    fn predict(&self, vector: &EncodedFeatureVector) -> Result<i32> {
        if vector.columns() != self.feature_columns() {
            return Err(Error::ColumnMismatch {
                expected: self.feature_columns().to_vec(),
                found: vector.columns().to_vec(),
            });
        }
        self.predict_rows(&[vector.values().to_vec()])?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Prediction("classifier returned no label".to_string()))
    }
}

/// Decision tree hyper-parameters. Defaults grow the tree until leaves are pure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: Option<u16>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        TreeParams {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

impl TreeParams {
    pub fn to_parameters(&self) -> DecisionTreeClassifierParameters {
        let parameters = DecisionTreeClassifierParameters::default()
            .with_criterion(SplitCriterion::Gini)
            .with_min_samples_split(self.min_samples_split)
            .with_min_samples_leaf(self.min_samples_leaf);
        match self.max_depth {
            Some(depth) => parameters.with_max_depth(depth),
            None => parameters,
        }
    }
}

/// Converts row-major feature rows into a matrix readable by smartcore.
pub fn to_matrix(rows: &[Vec<f64>]) -> Result<DenseMatrix<f64>> {
    let nrows = rows.len();
    let ncols = rows.first().map(Vec::len).unwrap_or(0);
    if nrows == 0 || ncols == 0 {
        return Err(Error::Prediction("no feature rows".to_string()));
    }

    let mut values = Vec::with_capacity(nrows * ncols);
    for (i, row) in rows.iter().enumerate() {
        if row.len() != ncols {
            return Err(Error::Prediction(format!(
                "row {} has {} features, expected {}",
                i,
                row.len(),
                ncols
            )));
        }
        values.extend_from_slice(row);
    }

    Ok(DenseMatrix::new(nrows, ncols, values, false))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DecisionTreeModel {
    columns: Vec<String>,
    params: TreeParams,
    tree: TreeClassifier,
}

impl DecisionTreeModel {
    pub fn fit(
        columns: Vec<String>,
        x: &DenseMatrix<f64>,
        y: &Vec<i32>,
        params: &TreeParams,
    ) -> Result<Self> {
        info!(
            "fitting decision tree on {} rows x {} columns",
            y.len(),
            columns.len()
        );
        let tree = DecisionTreeClassifier::fit(x, y, params.to_parameters())
            .map_err(|e| Error::Training(format!("{}", e)))?;

        Ok(DecisionTreeModel {
            columns,
            params: params.clone(),
            tree,
        })
    }

    pub fn predict_matrix(&self, x: &DenseMatrix<f64>) -> Result<Vec<i32>> {
        self.tree
            .predict(x)
            .map_err(|e| Error::Prediction(format!("{}", e)))
    }
}

impl Classifier for DecisionTreeModel {
    fn feature_columns(&self) -> &[String] {
        &self.columns
    }

    fn predict_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<i32>> {
        if let Some(row) = rows.iter().find(|r| r.len() != self.columns.len()) {
            return Err(Error::Prediction(format!(
                "got {} features, model expects {}",
                row.len(),
                self.columns.len()
            )));
        }
        self.predict_matrix(&to_matrix(rows)?)
    }
}
