//! Prediction orchestration over a bundle loaded once at startup.

use std::fmt;
use std::path::Path;

use log::debug;
use serde::Serialize;

use crate::bundle::ModelBundle;
use crate::classifier::Classifier;
use crate::encoder::{EncodedFeatureVector, EncoderState, UnseenCategoryPolicy};
use crate::error::{Error, Result};
use crate::form::HEART_FORM;
use crate::records::{PatientRecord, RequestRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskVerdict {
    NoRisk,
    RiskPresent,
}

impl RiskVerdict {
    pub fn from_label(label: i32) -> Result<Self> {
        match label {
            0 => Ok(RiskVerdict::NoRisk),
            1 => Ok(RiskVerdict::RiskPresent),
            other => Err(Error::Prediction(format!(
                "classifier returned label {}, expected 0 or 1",
                other
            ))),
        }
    }

    pub fn label(self) -> i32 {
        match self {
            RiskVerdict::NoRisk => 0,
            RiskVerdict::RiskPresent => 1,
        }
    }

    /// Sentence shown to the user next to the prediction.
    pub fn message(self) -> &'static str {
        match self {
            RiskVerdict::NoRisk => "The patient is not at risk of heart disease",
            RiskVerdict::RiskPresent => "The patient is at risk of heart disease",
        }
    }
}

impl fmt::Display for RiskVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskVerdict::NoRisk => f.write_str("no risk"),
            RiskVerdict::RiskPresent => f.write_str("risk present"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assessment {
    pub features: EncodedFeatureVector,
    pub label: i32,
    pub verdict: RiskVerdict,
}

/// Encode, classify and map the label to a verdict.
pub fn assess<C: Classifier>(
    record: &PatientRecord,
    encoder: &EncoderState,
    classifier: &C,
    policy: UnseenCategoryPolicy,
) -> Result<Assessment> {
    let features = encoder.encode(record, policy)?;
    let label = classifier.predict(&features)?;
    let verdict = RiskVerdict::from_label(label)?;
    debug!("assessed {:?} as {}", record, verdict);
    Ok(Assessment {
        features,
        label,
        verdict,
    })
}

/// Read-only state shared by every prediction.
#[derive(Debug)]
pub struct ServiceContext {
    bundle: ModelBundle,
    policy: UnseenCategoryPolicy,
}

impl ServiceContext {
    pub fn new(bundle: ModelBundle, policy: UnseenCategoryPolicy) -> Self {
        ServiceContext { bundle, policy }
    }

    pub async fn load<P: AsRef<Path>>(path: P, policy: UnseenCategoryPolicy) -> Result<Self> {
        Ok(Self::new(ModelBundle::load(path).await?, policy))
    }

    pub fn bundle(&self) -> &ModelBundle {
        &self.bundle
    }

    pub fn assess(&self, record: &PatientRecord) -> Result<Assessment> {
        assess(
            record,
            &self.bundle.encoder,
            &self.bundle.classifier,
            self.policy,
        )
    }

    /// Checks a request against the form ranges and choices, then assesses it.
    pub fn assess_request(&self, record: &PatientRecord) -> Result<Assessment> {
        HEART_FORM.validate(record)?;
        self.assess(record)
    }

    /// Assesses every request row, keeping per-row validation failures. Any
    /// other failure aborts the batch.
    pub fn assess_batch(&self, rows: &[RequestRow]) -> Result<Vec<Result<Assessment>>> {
        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            match row.parse().and_then(|record| self.assess_request(&record)) {
                Err(e) if !e.is_validation() => return Err(e),
                outcome => results.push(outcome),
            }
        }
        Ok(results)
    }
}
