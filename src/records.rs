//! Patient rows as they appear in the heart-disease dataset.
//!
//! Categorical columns are closed enums so a typo in the dataset or in a
//! request is rejected while parsing instead of producing a wrong one-hot
//! vector further down.

use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use log::debug;
use polars::prelude::{DataType, Field, Schema};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const AGE: &str = "Age";
pub const SEX: &str = "Sex";
pub const CHEST_PAIN_TYPE: &str = "ChestPainType";
pub const RESTING_BP: &str = "RestingBP";
pub const CHOLESTEROL: &str = "Cholesterol";
pub const FASTING_BS: &str = "FastingBS";
pub const RESTING_ECG: &str = "RestingECG";
pub const MAX_HR: &str = "MaxHR";
pub const EXERCISE_ANGINA: &str = "ExerciseAngina";
pub const OLDPEAK: &str = "Oldpeak";
pub const ST_SLOPE: &str = "ST_Slope";
pub const HEART_DISEASE: &str = "HeartDisease";

/// Numeric columns in dataset order.
pub const NUMERIC_COLUMNS: [&str; 6] = [AGE, RESTING_BP, CHOLESTEROL, FASTING_BS, MAX_HR, OLDPEAK];

/// A closed set of string codes used by one categorical column.
pub trait Category: Copy + Eq + Ord + fmt::Debug + 'static {
    /// Dataset column holding this category.
    const FIELD: &'static str;
    /// Every variant, in lexicographic code order.
    const ALL: &'static [Self];

    fn code(self) -> &'static str;
}

macro_rules! category {
    ($(#[$meta:meta])* $name:ident, $field:expr, { $($variant:ident => $code:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $code)]
                $variant,
            )+
        }

        impl Category for $name {
            const FIELD: &'static str = $field;
            const ALL: &'static [Self] = &[$($name::$variant),+];

            fn code(self) -> &'static str {
                match self {
                    $($name::$variant => $code,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.code())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($code => Ok($name::$variant),)+
                    other => Err(Error::UnknownCategoryValue {
                        field: $field,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

category!(Sex, SEX, {
    Female => "F",
    Male => "M",
});

category!(
    /// ASY asymptomatic, ATA atypical angina, NAP non-anginal pain, TA typical angina.
    ChestPainType, CHEST_PAIN_TYPE, {
    Asy => "ASY",
    Ata => "ATA",
    Nap => "NAP",
    Ta => "TA",
});

category!(RestingEcg, RESTING_ECG, {
    Lvh => "LVH",
    Normal => "Normal",
    St => "ST",
});

category!(ExerciseAngina, EXERCISE_ANGINA, {
    No => "N",
    Yes => "Y",
});

category!(StSlope, ST_SLOPE, {
    Down => "Down",
    Flat => "Flat",
    Up => "Up",
});

/// One dataset row. `heart_disease` is only present on training rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    #[serde(rename = "Age")]
    pub age: f64,
    #[serde(rename = "Sex")]
    pub sex: Sex,
    #[serde(rename = "ChestPainType")]
    pub chest_pain_type: ChestPainType,
    #[serde(rename = "RestingBP")]
    pub resting_bp: f64,
    #[serde(rename = "Cholesterol")]
    pub cholesterol: f64,
    #[serde(rename = "FastingBS")]
    pub fasting_bs: u8,
    #[serde(rename = "RestingECG")]
    pub resting_ecg: RestingEcg,
    #[serde(rename = "MaxHR")]
    pub max_hr: f64,
    #[serde(rename = "ExerciseAngina")]
    pub exercise_angina: ExerciseAngina,
    #[serde(rename = "Oldpeak")]
    pub oldpeak: f64,
    #[serde(rename = "ST_Slope")]
    pub st_slope: StSlope,
    #[serde(rename = "HeartDisease", default)]
    pub heart_disease: Option<u8>,
}

impl PatientRecord {
    /// Polars schema of the raw dataset file.
    pub fn raw_schema() -> Schema {
        Schema::from_iter(vec![
            Field::new(AGE, DataType::Int64),
            Field::new(SEX, DataType::Utf8),
            Field::new(CHEST_PAIN_TYPE, DataType::Utf8),
            Field::new(RESTING_BP, DataType::Int64),
            Field::new(CHOLESTEROL, DataType::Int64),
            Field::new(FASTING_BS, DataType::Int64),
            Field::new(RESTING_ECG, DataType::Utf8),
            Field::new(MAX_HR, DataType::Int64),
            Field::new(EXERCISE_ANGINA, DataType::Utf8),
            Field::new(OLDPEAK, DataType::Float64),
            Field::new(ST_SLOPE, DataType::Utf8),
            Field::new(HEART_DISEASE, DataType::Int64),
        ])
    }

    /// Value of one of [`NUMERIC_COLUMNS`].
    pub fn numeric(&self, column: &str) -> Option<f64> {
        match column {
            AGE => Some(self.age),
            RESTING_BP => Some(self.resting_bp),
            CHOLESTEROL => Some(self.cholesterol),
            FASTING_BS => Some(f64::from(self.fasting_bs)),
            MAX_HR => Some(self.max_hr),
            OLDPEAK => Some(self.oldpeak),
            _ => None,
        }
    }

    /// `(column, code)` of every one-hot encoded field, in encoding order.
    pub fn one_hot_fields(&self) -> [(&'static str, &'static str); 4] {
        [
            (CHEST_PAIN_TYPE, self.chest_pain_type.code()),
            (RESTING_ECG, self.resting_ecg.code()),
            (EXERCISE_ANGINA, self.exercise_angina.code()),
            (ST_SLOPE, self.st_slope.code()),
        ]
    }

    fn check_flags(&self) -> std::result::Result<(), String> {
        if self.fasting_bs > 1 {
            return Err(format!("FastingBS must be 0 or 1, got {}", self.fasting_bs));
        }
        match self.heart_disease {
            Some(label) if label > 1 => Err(format!("HeartDisease must be 0 or 1, got {}", label)),
            _ => Ok(()),
        }
    }
}

/// Reads every row of a dataset file. The label column is optional.
pub fn read_records<P: AsRef<Path>>(path: P) -> Result<Vec<PatientRecord>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| Error::dataset(path, e))?;
    parse_records(file, path)
}

/// Parses dataset rows from any reader; `origin` only labels errors.
pub fn parse_records<R: Read>(input: R, origin: &Path) -> Result<Vec<PatientRecord>> {
    let mut reader = csv::Reader::from_reader(input);
    let mut records = Vec::new();

    for (row, result) in reader.deserialize::<PatientRecord>().enumerate() {
        let record = result.map_err(|e| Error::dataset(origin, e))?;
        record
            .check_flags()
            .map_err(|reason| Error::dataset(origin, format!("row {}: {}", row + 1, reason)))?;
        records.push(record);
    }

    debug!("read {} records from {:?}", records.len(), origin);
    Ok(records)
}

/// A prediction request row as read from a batch file. Categorical codes are
/// kept as text so one bad row is reported on its own instead of failing the
/// whole file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRow {
    #[serde(rename = "Age")]
    pub age: f64,
    #[serde(rename = "Sex")]
    pub sex: String,
    #[serde(rename = "ChestPainType")]
    pub chest_pain_type: String,
    #[serde(rename = "RestingBP")]
    pub resting_bp: f64,
    #[serde(rename = "Cholesterol")]
    pub cholesterol: f64,
    #[serde(rename = "FastingBS")]
    pub fasting_bs: u8,
    #[serde(rename = "RestingECG")]
    pub resting_ecg: String,
    #[serde(rename = "MaxHR")]
    pub max_hr: f64,
    #[serde(rename = "ExerciseAngina")]
    pub exercise_angina: String,
    #[serde(rename = "Oldpeak")]
    pub oldpeak: f64,
    #[serde(rename = "ST_Slope")]
    pub st_slope: String,
}

impl RequestRow {
    /// Checks the categorical codes; the first unknown one is returned.
    pub fn parse(&self) -> Result<PatientRecord> {
        Ok(PatientRecord {
            age: self.age,
            sex: self.sex.parse()?,
            chest_pain_type: self.chest_pain_type.parse()?,
            resting_bp: self.resting_bp,
            cholesterol: self.cholesterol,
            fasting_bs: self.fasting_bs,
            resting_ecg: self.resting_ecg.parse()?,
            max_hr: self.max_hr,
            exercise_angina: self.exercise_angina.parse()?,
            oldpeak: self.oldpeak,
            st_slope: self.st_slope.parse()?,
            heart_disease: None,
        })
    }
}

impl From<&PatientRecord> for RequestRow {
    fn from(record: &PatientRecord) -> Self {
        RequestRow {
            age: record.age,
            sex: record.sex.to_string(),
            chest_pain_type: record.chest_pain_type.to_string(),
            resting_bp: record.resting_bp,
            cholesterol: record.cholesterol,
            fasting_bs: record.fasting_bs,
            resting_ecg: record.resting_ecg.to_string(),
            max_hr: record.max_hr,
            exercise_angina: record.exercise_angina.to_string(),
            oldpeak: record.oldpeak,
            st_slope: record.st_slope.to_string(),
        }
    }
}

/// Reads a batch of prediction requests. A label column, if present, is
/// ignored. Rows whose numbers do not parse make the file unreadable.
pub fn read_requests<P: AsRef<Path>>(path: P) -> Result<Vec<RequestRow>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| Error::dataset(path, e))?;
    parse_requests(file, path)
}

pub fn parse_requests<R: Read>(input: R, origin: &Path) -> Result<Vec<RequestRow>> {
    let mut reader = csv::Reader::from_reader(input);
    let rows = reader
        .deserialize::<RequestRow>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::dataset(origin, e))?;
    debug!("read {} requests from {:?}", rows.len(), origin);
    Ok(rows)
}
