//! What the command line prints or writes: the batch prediction CSV, the
//! single prediction JSON and the explorer report.

use std::io;

use serde::Serialize;

use crate::error::Result;
use crate::explore::{ColumnSummary, DatasetListing, DatasetOverview, HistogramBin, ScatterPoint};
use crate::records::RequestRow;
use crate::service::Assessment;

/// One batch output row: the request as it was read, then its outcome.
#[derive(Debug, Serialize)]
struct BatchRow<'a> {
    #[serde(rename = "Age")]
    age: f64,
    #[serde(rename = "Sex")]
    sex: &'a str,
    #[serde(rename = "ChestPainType")]
    chest_pain_type: &'a str,
    #[serde(rename = "RestingBP")]
    resting_bp: f64,
    #[serde(rename = "Cholesterol")]
    cholesterol: f64,
    #[serde(rename = "FastingBS")]
    fasting_bs: u8,
    #[serde(rename = "RestingECG")]
    resting_ecg: &'a str,
    #[serde(rename = "MaxHR")]
    max_hr: f64,
    #[serde(rename = "ExerciseAngina")]
    exercise_angina: &'a str,
    #[serde(rename = "Oldpeak")]
    oldpeak: f64,
    #[serde(rename = "ST_Slope")]
    st_slope: &'a str,
    #[serde(rename = "HeartDiseasePrediction")]
    prediction: Option<i32>,
    #[serde(rename = "Verdict")]
    verdict: Option<String>,
    #[serde(rename = "Error")]
    error: Option<String>,
}

fn batch_row<'a>(row: &'a RequestRow, outcome: &Result<Assessment>) -> BatchRow<'a> {
    let (prediction, verdict, error) = match outcome {
        Ok(assessment) => (
            Some(assessment.label),
            Some(assessment.verdict.to_string()),
            None,
        ),
        Err(e) => (None, None, Some(e.to_string())),
    };
    BatchRow {
        age: row.age,
        sex: &row.sex,
        chest_pain_type: &row.chest_pain_type,
        resting_bp: row.resting_bp,
        cholesterol: row.cholesterol,
        fasting_bs: row.fasting_bs,
        resting_ecg: &row.resting_ecg,
        max_hr: row.max_hr,
        exercise_angina: &row.exercise_angina,
        oldpeak: row.oldpeak,
        st_slope: &row.st_slope,
        prediction,
        verdict,
        error,
    }
}

/// Writes one CSV row per request. Rejected rows carry the reason in the
/// `Error` column and leave the prediction empty.
pub fn write_batch<W: io::Write>(
    writer: W,
    rows: &[RequestRow],
    outcomes: &[Result<Assessment>],
) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for (row, outcome) in rows.iter().zip(outcomes) {
        writer.serialize(batch_row(row, outcome))?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct PredictionOutput<'a> {
    #[serde(flatten)]
    assessment: &'a Assessment,
    message: &'static str,
}

impl<'a> PredictionOutput<'a> {
    pub fn new(assessment: &'a Assessment) -> Self {
        PredictionOutput {
            assessment,
            message: assessment.verdict.message(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExploreReport {
    pub rows: usize,
    pub listing: DatasetListing,
    pub summary: Vec<ColumnSummary>,
    pub chest_pain_counts: Vec<(String, usize)>,
    pub age_histogram: Vec<HistogramBin>,
    pub age_cholesterol: Vec<ScatterPoint>,
}

impl ExploreReport {
    /// Gathers every explorer view; `listed` rows are included verbatim.
    pub fn build(overview: &DatasetOverview, listed: usize, bins: usize) -> Result<Self> {
        Ok(ExploreReport {
            rows: overview.height(),
            listing: overview.listing(listed)?,
            summary: overview.describe()?,
            chest_pain_counts: overview.chest_pain_counts()?,
            age_histogram: overview.age_histogram(bins)?,
            age_cholesterol: overview.age_cholesterol_series()?,
        })
    }
}
