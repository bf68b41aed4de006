//! Input form description for front ends, with the accepted value ranges.

use lazy_static::lazy_static;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::records::{
    Category, ChestPainType, ExerciseAngina, PatientRecord, RestingEcg, Sex, StSlope, AGE,
    CHEST_PAIN_TYPE, CHOLESTEROL, EXERCISE_ANGINA, FASTING_BS, MAX_HR, OLDPEAK, RESTING_BP,
    RESTING_ECG, SEX, ST_SLOPE,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChoiceOption {
    pub value: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    Number {
        min: f64,
        max: f64,
        default: f64,
        step: f64,
    },
    Choice {
        options: Vec<ChoiceOption>,
        default: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormField {
    pub name: &'static str,
    pub label: &'static str,
    #[serde(flatten)]
    pub kind: FieldKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormSchema {
    pub fields: Vec<FormField>,
}

fn number(name: &'static str, label: &'static str, min: f64, max: f64, default: f64, step: f64) -> FormField {
    FormField {
        name,
        label,
        kind: FieldKind::Number {
            min,
            max,
            default,
            step,
        },
    }
}

/// Options are listed in the order the form presents them, default first.
fn choice<C: Category>(label: &'static str, order: &[C]) -> FormField {
    FormField {
        name: C::FIELD,
        label,
        kind: FieldKind::Choice {
            options: order
                .iter()
                .map(|c| ChoiceOption {
                    value: c.code().to_string(),
                    label: c.code().to_string(),
                })
                .collect(),
            default: order[0].code().to_string(),
        },
    }
}

lazy_static! {
    pub static ref HEART_FORM: FormSchema = FormSchema {
        fields: vec![
            number(AGE, "Age", 1.0, 120.0, 40.0, 1.0),
            choice(SEX, &[Sex::Male, Sex::Female]),
            choice(
                "Chest Pain Type",
                &[ChestPainType::Ata, ChestPainType::Nap, ChestPainType::Asy, ChestPainType::Ta],
            ),
            number(RESTING_BP, "RestingBP", 50.0, 200.0, 120.0, 1.0),
            number(CHOLESTEROL, "Cholesterol", 100.0, 600.0, 200.0, 1.0),
            FormField {
                name: FASTING_BS,
                label: "FastingBS",
                kind: FieldKind::Choice {
                    options: vec![
                        ChoiceOption { value: "0".to_string(), label: "No".to_string() },
                        ChoiceOption { value: "1".to_string(), label: "Yes".to_string() },
                    ],
                    default: "0".to_string(),
                },
            },
            choice("RestingECG", &[RestingEcg::Normal, RestingEcg::St, RestingEcg::Lvh]),
            number(MAX_HR, "MaxHR", 50.0, 250.0, 150.0, 1.0),
            choice("Exercise Angina", &[ExerciseAngina::Yes, ExerciseAngina::No]),
            number(OLDPEAK, "Oldpeak", 0.0, 10.0, 1.0, 0.1),
            choice(ST_SLOPE, &[StSlope::Up, StSlope::Flat, StSlope::Down]),
        ],
    };
}

impl FormSchema {
    pub fn field(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Default numeric value of a field, if it is a number field.
    pub fn default_number(&self, name: &str) -> Option<f64> {
        match self.field(name).map(|f| &f.kind) {
            Some(FieldKind::Number { default, .. }) => Some(*default),
            _ => None,
        }
    }

    /// Checks a request record against the number ranges and choice lists.
    ///
    /// Training rows are not validated: the dataset contains values outside
    /// the form ranges.
    pub fn validate(&self, record: &PatientRecord) -> Result<()> {
        for field in &self.fields {
            match &field.kind {
                FieldKind::Number { min, max, .. } => {
                    let value = record.numeric(field.name).unwrap_or(f64::NAN);
                    if !(*min..=*max).contains(&value) {
                        return Err(Error::OutOfRange {
                            field: field.name,
                            value,
                            min: *min,
                            max: *max,
                        });
                    }
                }
                FieldKind::Choice { options, .. } => {
                    let value = match field.name {
                        SEX => record.sex.code().to_string(),
                        CHEST_PAIN_TYPE => record.chest_pain_type.code().to_string(),
                        FASTING_BS => record.fasting_bs.to_string(),
                        RESTING_ECG => record.resting_ecg.code().to_string(),
                        EXERCISE_ANGINA => record.exercise_angina.code().to_string(),
                        ST_SLOPE => record.st_slope.code().to_string(),
                        _ => continue,
                    };
                    if !options.iter().any(|o| o.value == value) {
                        return Err(Error::UnknownCategoryValue {
                            field: field.name,
                            value,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// A record holding every field's default value.
    pub fn default_record(&self) -> PatientRecord {
        let number = |name| self.default_number(name).unwrap_or_default();
        PatientRecord {
            age: number(AGE),
            sex: Sex::Male,
            chest_pain_type: ChestPainType::Ata,
            resting_bp: number(RESTING_BP),
            cholesterol: number(CHOLESTEROL),
            fasting_bs: 0,
            resting_ecg: RestingEcg::Normal,
            max_hr: number(MAX_HR),
            exercise_angina: ExerciseAngina::Yes,
            oldpeak: number(OLDPEAK),
            st_slope: StSlope::Up,
            heart_disease: None,
        }
    }
}
