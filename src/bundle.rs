//! The persisted model artifact.
//!
//! The classifier, the sex label map and the training column order are only
//! meaningful together, so they are written and read as a single JSON document.

use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::classifier::{Classifier, DecisionTreeModel};
use crate::encoder::EncoderState;
use crate::error::{Error, Result};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub test_accuracy: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelBundle {
    pub format_version: u32,
    pub encoder: EncoderState,
    pub classifier: DecisionTreeModel,
    pub summary: TrainingSummary,
}

impl ModelBundle {
    pub fn new(encoder: EncoderState, classifier: DecisionTreeModel, summary: TrainingSummary) -> Self {
        ModelBundle {
            format_version: FORMAT_VERSION,
            encoder,
            classifier,
            summary,
        }
    }

    /// Parses and checks a bundle; `path` only labels errors.
    pub fn from_slice(bytes: &[u8], path: &Path) -> Result<Self> {
        let bundle: ModelBundle =
            serde_json::from_slice(bytes).map_err(|e| Error::model(path, e))?;

        if bundle.format_version != FORMAT_VERSION {
            return Err(Error::model(
                path,
                format!(
                    "format version {} is not supported (expected {})",
                    bundle.format_version, FORMAT_VERSION
                ),
            ));
        }
        if bundle.encoder.columns() != bundle.classifier.feature_columns() {
            return Err(Error::model(
                path,
                "encoder columns do not match classifier columns",
            ));
        }
        Ok(bundle)
    }

    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| Error::model(path, e))?;
        let bundle = Self::from_slice(&bytes, path)?;
        info!(
            "loaded model bundle {:?} ({} columns, trained on {} rows)",
            path,
            bundle.encoder.columns().len(),
            bundle.summary.rows
        );
        Ok(bundle)
    }

    /// Writes to a sibling temporary file first so a reader never sees a
    /// partial bundle.
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec(self)?;
        let staging = path.with_extension("tmp");
        tokio::fs::write(&staging, bytes).await?;
        tokio::fs::rename(&staging, path).await?;
        info!("saved model bundle to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_records;
    use crate::training::{train, TrainingConfig};

    #[tokio::test]
    async fn save_then_load_keeps_predictions() {
        let records = sample_records();
        let (bundle, _) = train(&records, &TrainingConfig::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("bundle.json");

        bundle.save(&path).await.unwrap();
        let loaded = ModelBundle::load(&path).await.unwrap();

        assert_eq!(loaded.encoder, bundle.encoder);
        assert_eq!(loaded.summary, bundle.summary);
        let rows: Vec<Vec<f64>> = bundle
            .encoder
            .encode_table(&records, Default::default())
            .unwrap()
            .into_iter()
            .map(|v| v.into_values())
            .collect();
        assert_eq!(
            loaded.classifier.predict_rows(&rows).unwrap(),
            bundle.classifier.predict_rows(&rows).unwrap()
        );
    }

    #[tokio::test]
    async fn missing_artifact_is_a_load_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModelBundle::load(dir.path().join("absent.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ModelLoadFailure { .. }));
    }

    #[test]
    fn rejects_other_format_versions() {
        let (bundle, _) = train(&sample_records(), &TrainingConfig::default()).unwrap();
        let mut value = serde_json::to_value(&bundle).unwrap();
        value["format_version"] = serde_json::json!(FORMAT_VERSION + 1);
        let bytes = serde_json::to_vec(&value).unwrap();

        let err = ModelBundle::from_slice(&bytes, Path::new("bundle.json")).unwrap_err();
        assert!(err.to_string().contains("format version"));
    }

    #[test]
    fn rejects_garbage() {
        let err = ModelBundle::from_slice(b"not json", Path::new("bundle.json")).unwrap_err();
        assert!(matches!(err, Error::ModelLoadFailure { .. }));
    }
}
