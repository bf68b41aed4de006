//! Heart-disease risk prediction: a feature encoder shared by training and
//! inference, a persisted decision-tree bundle, and the dataset views a
//! dashboard needs.

pub mod bundle;
pub mod classifier;
pub mod encoder;
pub mod error;
pub mod explore;
pub mod export;
pub mod form;
pub mod records;
pub mod report;
pub mod service;
pub mod training;

#[cfg(test)]
mod test_support;

pub use bundle::ModelBundle;
pub use classifier::{Classifier, DecisionTreeModel, TreeParams};
pub use encoder::{EncodedFeatureVector, EncoderState, UnseenCategoryPolicy};
pub use error::{Error, Result};
pub use records::{read_records, read_requests, PatientRecord, RequestRow};
pub use service::{assess, Assessment, RiskVerdict, ServiceContext};
pub use training::{train, TrainingConfig, TrainingReport};
