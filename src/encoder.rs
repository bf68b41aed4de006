//! Feature encoding shared by training and prediction.
//!
//! Column layout follows the dataset: numeric columns and `Sex` keep their
//! dataset position, then one indicator column `<Field>_<Code>` per observed
//! category, grouped by field and sorted by code. `Sex` is label encoded with
//! codes assigned in lexicographic order of the observed values.

use std::collections::{BTreeMap, BTreeSet};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::records::{
    Category, PatientRecord, Sex, AGE, CHEST_PAIN_TYPE, CHOLESTEROL, EXERCISE_ANGINA, FASTING_BS,
    MAX_HR, OLDPEAK, RESTING_BP, RESTING_ECG, SEX, ST_SLOPE,
};

/// Columns copied straight from the record, in dataset order.
pub const BASE_COLUMNS: [&str; 7] = [AGE, SEX, RESTING_BP, CHOLESTEROL, FASTING_BS, MAX_HR, OLDPEAK];

/// Fields expanded into indicator columns, in encoding order.
pub const ONE_HOT_FIELDS: [&str; 4] = [CHEST_PAIN_TYPE, RESTING_ECG, EXERCISE_ANGINA, ST_SLOPE];

/// What to do with a category that never appeared in the training table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ArgEnum,
)]
pub enum UnseenCategoryPolicy {
    /// Fail with `UnknownCategoryValue`.
    #[default]
    Reject,
    /// Leave every indicator of the field at 0.
    ZeroFill,
}

pub fn indicator_column(field: &str, code: &str) -> String {
    format!("{}_{}", field, code)
}

/// Categories observed for one one-hot field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryGroup {
    pub field: String,
    pub codes: Vec<String>,
}

/// Everything learned from the training table that encoding depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderState {
    /// Sex values seen during fit; the index is the encoded value.
    sex_classes: Vec<Sex>,
    groups: Vec<CategoryGroup>,
    columns: Vec<String>,
}

/// A record after encoding, carrying the column names it is aligned to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncodedFeatureVector {
    columns: Vec<String>,
    values: Vec<f64>,
}

impl EncodedFeatureVector {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| self.values[i])
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }
}

impl EncoderState {
    /// Learns the sex label map, the observed categories and the column order.
    pub fn fit(records: &[PatientRecord]) -> Result<Self> {
        if records.is_empty() {
            return Err(Error::EmptyDataset);
        }

        let mut sex_classes: Vec<Sex> = records.iter().map(|r| r.sex).collect();
        sex_classes.sort_by_key(|s| s.code());
        sex_classes.dedup();

        let mut observed: Vec<BTreeSet<&'static str>> = vec![BTreeSet::new(); ONE_HOT_FIELDS.len()];
        for record in records {
            for (i, (_, code)) in record.one_hot_fields().iter().enumerate() {
                observed[i].insert(*code);
            }
        }

        let groups: Vec<CategoryGroup> = ONE_HOT_FIELDS
            .iter()
            .zip(observed)
            .map(|(field, codes)| CategoryGroup {
                field: field.to_string(),
                codes: codes.into_iter().map(str::to_string).collect(),
            })
            .collect();

        let mut columns: Vec<String> = BASE_COLUMNS.iter().map(|c| c.to_string()).collect();
        for group in &groups {
            for code in &group.codes {
                columns.push(indicator_column(&group.field, code));
            }
        }

        Ok(EncoderState {
            sex_classes,
            groups,
            columns,
        })
    }

    /// Canonical column order of every encoded vector.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn groups(&self) -> &[CategoryGroup] {
        &self.groups
    }

    /// `(sex, encoded value)` pairs of the fitted label map.
    pub fn sex_label_map(&self) -> Vec<(Sex, f64)> {
        self.sex_classes
            .iter()
            .enumerate()
            .map(|(i, s)| (*s, i as f64))
            .collect()
    }

    fn sex_value(&self, sex: Sex) -> Result<f64> {
        self.sex_classes
            .iter()
            .position(|s| *s == sex)
            .map(|i| i as f64)
            .ok_or_else(|| Error::UnknownCategoryValue {
                field: Sex::FIELD,
                value: sex.code().to_string(),
            })
    }

    /// Encodes one record and reindexes it onto the fitted columns.
    ///
    /// Indicator columns the record does not realise are 0. An unseen sex is
    /// always rejected; other unseen categories follow `policy`.
    pub fn encode(
        &self,
        record: &PatientRecord,
        policy: UnseenCategoryPolicy,
    ) -> Result<EncodedFeatureVector> {
        let mut own: BTreeMap<String, f64> = BTreeMap::new();
        own.insert(SEX.to_string(), self.sex_value(record.sex)?);
        for column in BASE_COLUMNS {
            if let Some(value) = record.numeric(column) {
                own.insert(column.to_string(), value);
            }
        }

        for (field, code) in record.one_hot_fields() {
            let column = indicator_column(field, code);
            if !self.columns.contains(&column) {
                match policy {
                    UnseenCategoryPolicy::Reject => {
                        return Err(Error::UnknownCategoryValue {
                            field,
                            value: code.to_string(),
                        })
                    }
                    UnseenCategoryPolicy::ZeroFill => {
                        warn!("{} {:?} was not seen in training, encoding as all zeros", field, code);
                        continue;
                    }
                }
            }
            own.insert(column, 1.0);
        }

        let values = self
            .columns
            .iter()
            .map(|c| own.get(c).copied().unwrap_or(0.0))
            .collect();

        Ok(EncodedFeatureVector {
            columns: self.columns.clone(),
            values,
        })
    }

    pub fn encode_table(
        &self,
        records: &[PatientRecord],
        policy: UnseenCategoryPolicy,
    ) -> Result<Vec<EncodedFeatureVector>> {
        records.iter().map(|r| self.encode(r, policy)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{ChestPainType, ExerciseAngina, RestingEcg, StSlope};
    use crate::test_support::sample_records;

    fn record(sex: Sex, chest_pain_type: ChestPainType) -> PatientRecord {
        PatientRecord {
            age: 50.0,
            sex,
            chest_pain_type,
            resting_bp: 130.0,
            cholesterol: 220.0,
            fasting_bs: 0,
            resting_ecg: RestingEcg::Normal,
            max_hr: 150.0,
            exercise_angina: ExerciseAngina::No,
            oldpeak: 1.0,
            st_slope: StSlope::Up,
            heart_disease: None,
        }
    }

    #[test]
    fn two_row_table_encodes_nap() {
        let table = vec![
            record(Sex::Male, ChestPainType::Ata),
            record(Sex::Female, ChestPainType::Nap),
        ];
        let state = EncoderState::fit(&table).unwrap();

        let encoded = state
            .encode(&record(Sex::Male, ChestPainType::Nap), UnseenCategoryPolicy::Reject)
            .unwrap();
        assert_eq!(encoded.get("Sex"), Some(1.0));
        assert_eq!(encoded.get("ChestPainType_ATA"), Some(0.0));
        assert_eq!(encoded.get("ChestPainType_NAP"), Some(1.0));
        assert_eq!(encoded.get("ChestPainType_ASY"), None);
    }

    #[test]
    fn sex_classes_are_sorted_once_and_unique() {
        let table = vec![
            record(Sex::Male, ChestPainType::Ata),
            record(Sex::Female, ChestPainType::Ata),
            record(Sex::Male, ChestPainType::Nap),
            record(Sex::Female, ChestPainType::Nap),
        ];
        let state = EncoderState::fit(&table).unwrap();
        assert_eq!(state.sex_label_map(), vec![(Sex::Female, 0.0), (Sex::Male, 1.0)]);

        let males = vec![record(Sex::Male, ChestPainType::Ata); 3];
        let state = EncoderState::fit(&males).unwrap();
        assert_eq!(state.sex_label_map(), vec![(Sex::Male, 0.0)]);
    }

    #[test]
    fn column_order_matches_dataset_layout() {
        let state = EncoderState::fit(&sample_records()).unwrap();
        let expected = [
            "Age",
            "Sex",
            "RestingBP",
            "Cholesterol",
            "FastingBS",
            "MaxHR",
            "Oldpeak",
            "ChestPainType_ASY",
            "ChestPainType_ATA",
            "ChestPainType_NAP",
            "ChestPainType_TA",
            "RestingECG_LVH",
            "RestingECG_Normal",
            "RestingECG_ST",
            "ExerciseAngina_N",
            "ExerciseAngina_Y",
            "ST_Slope_Down",
            "ST_Slope_Flat",
            "ST_Slope_Up",
        ];
        assert_eq!(state.columns(), expected);
        assert_eq!(state.sex_label_map(), vec![(Sex::Female, 0.0), (Sex::Male, 1.0)]);
    }

    #[test]
    fn every_vector_has_the_fitted_columns() {
        let records = sample_records();
        let state = EncoderState::fit(&records).unwrap();
        for vector in state.encode_table(&records, UnseenCategoryPolicy::Reject).unwrap() {
            assert_eq!(vector.columns(), state.columns());
            assert_eq!(vector.values().len(), state.columns().len());
        }
    }

    #[test]
    fn encoding_is_deterministic() {
        let records = sample_records();
        let state = EncoderState::fit(&records).unwrap();
        let first = state.encode(&records[3], UnseenCategoryPolicy::Reject).unwrap();
        let second = state.encode(&records[3], UnseenCategoryPolicy::Reject).unwrap();
        let bits = |v: &EncodedFeatureVector| v.values().iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&first), bits(&second));
    }

    #[test]
    fn one_indicator_set_per_group() {
        let records = sample_records();
        let state = EncoderState::fit(&records).unwrap();
        for record in &records {
            let encoded = state.encode(record, UnseenCategoryPolicy::Reject).unwrap();
            for group in state.groups() {
                let hot: f64 = group
                    .codes
                    .iter()
                    .map(|code| encoded.get(&indicator_column(&group.field, code)).unwrap())
                    .sum();
                assert_eq!(hot, 1.0, "{} of {:?}", group.field, record);
            }
        }
    }

    #[test]
    fn numeric_fields_pass_through() {
        let state = EncoderState::fit(&sample_records()).unwrap();
        let mut patient = record(Sex::Female, ChestPainType::Ta);
        patient.fasting_bs = 1;
        patient.oldpeak = 2.3;
        let encoded = state.encode(&patient, UnseenCategoryPolicy::Reject).unwrap();
        assert_eq!(&encoded.values()[..7], &[50.0, 0.0, 130.0, 220.0, 1.0, 150.0, 2.3]);
    }

    #[test]
    fn unseen_category_is_rejected_or_zero_filled() {
        let table = vec![
            record(Sex::Male, ChestPainType::Ata),
            record(Sex::Female, ChestPainType::Nap),
        ];
        let state = EncoderState::fit(&table).unwrap();
        let unseen = record(Sex::Male, ChestPainType::Asy);

        let err = state.encode(&unseen, UnseenCategoryPolicy::Reject).unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownCategoryValue { field: "ChestPainType", ref value } if value == "ASY"
        ));

        let encoded = state.encode(&unseen, UnseenCategoryPolicy::ZeroFill).unwrap();
        assert_eq!(encoded.get("ChestPainType_ATA"), Some(0.0));
        assert_eq!(encoded.get("ChestPainType_NAP"), Some(0.0));
        assert_eq!(encoded.columns(), state.columns());
    }

    #[test]
    fn unseen_sex_is_always_rejected() {
        let state = EncoderState::fit(&[record(Sex::Male, ChestPainType::Ata)]).unwrap();
        let female = record(Sex::Female, ChestPainType::Ata);
        for policy in [UnseenCategoryPolicy::Reject, UnseenCategoryPolicy::ZeroFill] {
            let err = state.encode(&female, policy).unwrap_err();
            assert!(matches!(err, Error::UnknownCategoryValue { field: "Sex", .. }));
        }
    }

    #[test]
    fn fit_requires_rows() {
        assert!(matches!(EncoderState::fit(&[]), Err(Error::EmptyDataset)));
    }
}
