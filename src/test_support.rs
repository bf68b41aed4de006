use std::path::Path;

use crate::records::{parse_records, PatientRecord};

pub const SAMPLE_CSV: &str = include_str!("../tests/fixtures/heart_sample.csv");

pub fn sample_records() -> Vec<PatientRecord> {
    parse_records(SAMPLE_CSV.as_bytes(), Path::new("heart_sample.csv")).unwrap()
}
