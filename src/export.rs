//! Writes the encoded training table for inspection outside the crate.

use std::fs::File;
use std::path::{Path, PathBuf};

use log::info;
use polars::prelude::*;
use polars_io::parquet::ParquetWriter;

use crate::encoder::{EncoderState, UnseenCategoryPolicy};
use crate::error::{Error, Result};
use crate::records::{PatientRecord, HEART_DISEASE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteFormat {
    Csv,
    Parquet,
}

pub fn infer_file_type(path: &Path) -> Option<WriteFormat> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => Some(WriteFormat::Csv),
        Some(ext) if ext.eq_ignore_ascii_case("parquet") => Some(WriteFormat::Parquet),
        _ => None,
    }
}

/// One float column per encoded feature, plus the label when every row has one.
pub fn encoded_frame(encoder: &EncoderState, records: &[PatientRecord]) -> Result<DataFrame> {
    let vectors = encoder.encode_table(records, UnseenCategoryPolicy::Reject)?;

    let mut columns: Vec<Series> = encoder
        .columns()
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let values: Vec<f64> = vectors.iter().map(|v| v.values()[j]).collect();
            Series::new(name, values)
        })
        .collect();

    let labels: Option<Vec<i32>> = records
        .iter()
        .map(|r| r.heart_disease.map(i32::from))
        .collect();
    if let Some(labels) = labels {
        columns.push(Series::new(HEART_DISEASE, labels));
    }

    Ok(DataFrame::new(columns)?)
}

pub fn write_csv(path: &Path, df: &mut DataFrame) -> Result<()> {
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).finish(df)?;
    Ok(())
}

pub fn write_parquet(path: &Path, df: &mut DataFrame) -> Result<()> {
    let mut file = File::create(path)?;
    ParquetWriter::new(&mut file).finish(df)?;
    Ok(())
}

/// Writes the encoded table as CSV or Parquet depending on the file extension.
pub fn export_encoded(
    path: &Path,
    encoder: &EncoderState,
    records: &[PatientRecord],
) -> Result<()> {
    let format = infer_file_type(path).ok_or_else(|| Error::OutputFormat {
        path: PathBuf::from(path),
    })?;
    let mut df = encoded_frame(encoder, records)?;
    match format {
        WriteFormat::Csv => write_csv(path, &mut df)?,
        WriteFormat::Parquet => write_parquet(path, &mut df)?,
    }
    info!("wrote encoded table {:?} ({} rows)", path, df.height());
    Ok(())
}
