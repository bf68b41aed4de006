//! Dataset browsing: listing, descriptive statistics and the two chart series.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use log::debug;
use polars::prelude::*;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::records::{PatientRecord, AGE, CHEST_PAIN_TYPE, CHOLESTEROL};

pub const DEFAULT_HISTOGRAM_BINS: usize = 20;

const COUNT: &str = "count";

/// Descriptive statistics of one numeric column. Statistics are `None` when
/// the column has too few values to define them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub column: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q25: Option<f64>,
    pub median: Option<f64>,
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

/// Leading rows of the frame, cell values as JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetListing {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub age: f64,
    pub cholesterol: f64,
}

/// Describes one column the way `pandas.DataFrame.describe` does: sample
/// standard deviation and linearly interpolated quartiles, nulls skipped.
pub fn summarize(series: &Series) -> Result<ColumnSummary> {
    let values = series.cast(&DataType::Float64)?;
    let values = values.f64()?;
    let count = values.len() - values.null_count();
    let quantile = |q| values.quantile(q, QuantileInterpolOptions::Linear);

    if count == 0 {
        return Ok(ColumnSummary {
            column: series.name().to_string(),
            count,
            mean: None,
            std: None,
            min: None,
            q25: None,
            median: None,
            q75: None,
            max: None,
        });
    }

    Ok(ColumnSummary {
        column: series.name().to_string(),
        count,
        mean: values.mean(),
        std: if count > 1 { values.std(1) } else { None },
        min: values.min(),
        q25: quantile(0.25)?,
        median: quantile(0.5)?,
        q75: quantile(0.75)?,
        max: values.max(),
    })
}

fn json_value(value: AnyValue) -> serde_json::Value {
    match value {
        AnyValue::Null => serde_json::Value::Null,
        AnyValue::Boolean(v) => v.into(),
        AnyValue::Utf8(v) => v.into(),
        AnyValue::Int64(v) => v.into(),
        AnyValue::Int32(v) => v.into(),
        AnyValue::UInt32(v) => v.into(),
        other => other
            .extract::<f64>()
            .map(serde_json::Value::from)
            .unwrap_or(serde_json::Value::Null),
    }
}

/// Equal-width bins spanning the data; the last bin is closed on the right.
pub fn histogram(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    let bins = bins.max(1);
    let (Some(min), Some(max)) = (
        values.iter().copied().reduce(f64::min),
        values.iter().copied().reduce(f64::max),
    ) else {
        return Vec::new();
    };
    let (min, max) = if min == max { (min - 0.5, max + 0.5) } else { (min, max) };
    let width = (max - min) / bins as f64;

    let mut counts = vec![0usize; bins];
    for v in values {
        let index = (((v - min) / width).floor() as usize).min(bins - 1);
        counts[index] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            lower: min + width * i as f64,
            upper: if i + 1 == bins { max } else { min + width * (i + 1) as f64 },
            count,
        })
        .collect()
}

/// The raw dataset held as a typed polars frame.
#[derive(Debug, Clone)]
pub struct DatasetOverview {
    df: DataFrame,
}

impl DatasetOverview {
    pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::dataset(path, e))?;
        let df = CsvReader::new(file)
            .has_header(true)
            .with_dtypes(Some(Arc::new(PatientRecord::raw_schema())))
            .finish()
            .map_err(|e| Error::dataset(path, e))?;
        debug!("loaded {:?} with shape {:?}", path, df.shape());
        Ok(DatasetOverview { df })
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    /// First `n` rows for listing.
    pub fn head(&self, n: usize) -> DataFrame {
        self.df.head(Some(n))
    }

    fn float_values(&self, column: &str) -> Result<Vec<f64>> {
        let series = self.df.column(column)?.cast(&DataType::Float64)?;
        let values = series.f64()?.into_iter().flatten().collect();
        Ok(values)
    }

    /// First `n` rows in serializable form, in frame column order.
    pub fn listing(&self, n: usize) -> Result<DatasetListing> {
        let head = self.head(n);
        let columns = head
            .get_column_names()
            .iter()
            .map(|c| c.to_string())
            .collect();
        let rows = (0..head.height())
            .map(|i| {
                head.get_columns()
                    .iter()
                    .map(|s| Ok(json_value(s.get(i)?)))
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(DatasetListing { columns, rows })
    }

    /// Summary of every numeric column, in frame order.
    pub fn describe(&self) -> Result<Vec<ColumnSummary>> {
        self.df
            .get_columns()
            .iter()
            .filter(|s| s.dtype().is_numeric())
            .map(summarize)
            .collect()
    }

    /// Value counts of the chest pain type, most frequent first.
    pub fn chest_pain_counts(&self) -> Result<Vec<(String, usize)>> {
        let counts = self
            .df
            .clone()
            .lazy()
            .groupby([col(CHEST_PAIN_TYPE)])
            .agg([count().alias(COUNT)])
            .sort_by_exprs([col(COUNT), col(CHEST_PAIN_TYPE)], [true, false], false)
            .collect()?;

        let values = counts.column(CHEST_PAIN_TYPE)?.utf8()?;
        let totals = counts.column(COUNT)?.cast(&DataType::UInt64)?;
        let pairs = values
            .into_iter()
            .zip(totals.u64()?.into_iter())
            .filter_map(|pair| match pair {
                (Some(value), Some(total)) => Some((value.to_string(), total as usize)),
                _ => None,
            })
            .collect();
        Ok(pairs)
    }

    pub fn age_histogram(&self, bins: usize) -> Result<Vec<HistogramBin>> {
        Ok(histogram(&self.float_values(AGE)?, bins))
    }

    pub fn age_cholesterol_series(&self) -> Result<Vec<ScatterPoint>> {
        let ages = self.df.column(AGE)?.cast(&DataType::Float64)?;
        let cholesterol = self.df.column(CHOLESTEROL)?.cast(&DataType::Float64)?;
        let points = ages
            .f64()?
            .into_iter()
            .zip(cholesterol.f64()?.into_iter())
            .filter_map(|pair| match pair {
                (Some(age), Some(cholesterol)) => Some(ScatterPoint { age, cholesterol }),
                _ => None,
            })
            .collect();
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::SAMPLE_CSV;

    fn overview() -> DatasetOverview {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heart.csv");
        std::fs::write(&path, SAMPLE_CSV).unwrap();
        DatasetOverview::read_csv(&path).unwrap()
    }

    #[test]
    fn summarize_matches_pandas_conventions() {
        let summary = summarize(&Series::new("x", &[1.0, 2.0, 3.0, 4.0])).unwrap();
        assert_eq!(summary.column, "x");
        assert_eq!(summary.count, 4);
        assert_eq!(summary.mean, Some(2.5));
        assert_eq!(summary.min, Some(1.0));
        assert_eq!(summary.q25, Some(1.75));
        assert_eq!(summary.median, Some(2.5));
        assert_eq!(summary.q75, Some(3.25));
        assert_eq!(summary.max, Some(4.0));
        let std = summary.std.unwrap();
        assert!((std - 1.2909944487358056).abs() < 1e-12);

        let single = summarize(&Series::new("y", &[7i64])).unwrap();
        assert_eq!(single.mean, Some(7.0));
        assert_eq!(single.std, None);

        let empty = summarize(&Series::new("z", &[None::<f64>, None])).unwrap();
        assert_eq!(empty.count, 0);
        assert_eq!(empty.mean, None);
        assert_eq!(empty.median, None);
    }

    #[test]
    fn histogram_covers_every_value() {
        let values: Vec<f64> = (0..=100).map(f64::from).collect();
        let bins = histogram(&values, 20);
        assert_eq!(bins.len(), 20);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), values.len());
        assert_eq!(bins[0].lower, 0.0);
        assert_eq!(bins[19].upper, 100.0);
        assert_eq!(bins[19].count, 6);

        let flat = histogram(&[3.0, 3.0], 4);
        assert_eq!(flat.iter().map(|b| b.count).sum::<usize>(), 2);
        assert!(histogram(&[], 4).is_empty());
    }

    #[test]
    fn loads_and_describes_dataset() {
        let overview = overview();
        assert_eq!(overview.height(), 30);
        assert_eq!(overview.head(5).height(), 5);

        let summary = overview.describe().unwrap();
        let columns: Vec<&str> = summary.iter().map(|s| s.column.as_str()).collect();
        assert_eq!(
            columns,
            ["Age", "RestingBP", "Cholesterol", "FastingBS", "MaxHR", "Oldpeak", "HeartDisease"]
        );
        let cholesterol = &summary[2];
        assert_eq!(cholesterol.min, Some(0.0));
        assert_eq!(cholesterol.max, Some(407.0));
    }

    #[test]
    fn chest_pain_counts_are_sorted() {
        let counts = overview().chest_pain_counts().unwrap();
        assert_eq!(
            counts,
            vec![
                ("ATA".to_string(), 12),
                ("ASY".to_string(), 10),
                ("NAP".to_string(), 5),
                ("TA".to_string(), 3),
            ]
        );
    }

    #[test]
    fn listing_comes_from_the_frame() {
        let listing = overview().listing(2).unwrap();
        assert_eq!(listing.columns.len(), 12);
        assert_eq!(listing.columns[0], "Age");
        assert_eq!(listing.rows.len(), 2);
        assert_eq!(listing.rows[0][0], serde_json::json!(40));
        assert_eq!(listing.rows[0][1], serde_json::json!("M"));
        assert_eq!(listing.rows[0][2], serde_json::json!("ATA"));
    }

    #[test]
    fn chart_series_have_one_point_per_row() {
        let overview = overview();
        let bins = overview.age_histogram(DEFAULT_HISTOGRAM_BINS).unwrap();
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 30);

        let points = overview.age_cholesterol_series().unwrap();
        assert_eq!(points.len(), 30);
        assert_eq!(
            points[0],
            ScatterPoint {
                age: 40.0,
                cholesterol: 289.0
            }
        );
    }
}
