//! Structural validation of DICOM datasets ahead of anonymization.
//!
//! A [`Validator`] runs a fixed pipeline of rules over a [`Dataset`] and
//! reports [`Finding`]s. An [`Extractor`] builds a minimal copy of a dataset
//! that only keeps a whitelist of identifying elements, which helps isolating
//! files that an anonymizer fails on.
//!
//! # Example
//!
//! ```
//! use dicom_core::VR;
//! use dicom_preflight::{tags, DataElement, Dataset, RuleId, Validator};
//!
//! let mut dataset = Dataset::new();
//! dataset.put(DataElement::new(tags::PATIENT_NAME, VR::PN, "Doe^John"));
//! dataset.put(DataElement::new(tags::SPECIFIC_CHARACTER_SET, VR::CS, "ISO_IR 100"));
//!
//! let report = Validator::default().run(&dataset);
//! assert_eq!(report.findings_for(RuleId::RequiredTags).count(), 4);
//! assert_eq!(report.findings_for(RuleId::CharacterSet).count(), 0);
//! ```

pub mod config;
pub mod convert;
pub mod dataset;
pub mod element;
pub mod extractor;
pub mod report;
pub mod rules;
pub mod validator;

#[cfg(test)]
mod test_utils;

use std::io::Read;
use std::path::Path;
use thiserror::Error;

pub use config::{Config, ConfigBuilder};
pub use dataset::{Dataset, FileMeta};
pub use dicom_dictionary_std::tags;
pub use element::{DataElement, ElementValue, Scalar};
pub use extractor::Extractor;
pub use report::DisplayLimits;
pub use rules::{Finding, RuleId, Severity};
pub use validator::{Report, Summary, Validator};

use config::ConfigError;
use convert::ConvertError;
use extractor::ExtractError;

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Convert(#[from] ConvertError),
}

impl Error {
    /// Returns `true` when the input could not be decoded as DICOM at all.
    pub fn is_read_error(&self) -> bool {
        matches!(self, Error::Convert(ConvertError::Read(_)))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A decoded dataset together with its validation report.
#[derive(Debug, Clone, PartialEq)]
pub struct Checked {
    pub dataset: Dataset,
    pub report: Report,
}

/// Validates DICOM files and writes minimal datasets, both driven by one [`Config`].
#[derive(Debug)]
pub struct Preflight {
    validator: Validator,
    extractor: Extractor,
}

impl Preflight {
    pub fn new(config: Config) -> Self {
        Self {
            validator: Validator::new(config.clone()),
            extractor: Extractor::new(config),
        }
    }

    /// Builds a preflight from a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::new(Config::from_json(json)?))
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Reads a DICOM file from `src` and validates it.
    pub fn check(&self, src: impl Read) -> Result<Checked> {
        let dataset = convert::read_dataset_from(src)?;
        Ok(self.checked(dataset))
    }

    /// Opens the DICOM file at `path` and validates it.
    pub fn check_file(&self, path: impl AsRef<Path>) -> Result<Checked> {
        let dataset = convert::read_dataset(path)?;
        Ok(self.checked(dataset))
    }

    /// Extracts the minimal dataset and writes it to `path`.
    pub fn write_minimal(&self, dataset: &Dataset, path: impl AsRef<Path>) -> Result<Dataset> {
        let minimal = self.extractor.extract(dataset)?;
        convert::write_dataset(&minimal, path)?;
        Ok(minimal)
    }

    fn checked(&self, dataset: Dataset) -> Checked {
        let report = self.validator.run(&dataset);
        Checked { dataset, report }
    }
}

impl Default for Preflight {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
