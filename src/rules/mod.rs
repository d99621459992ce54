mod character_set;
mod disallowed_vr;
mod private_tags;
mod required_tags;
mod sequence_integrity;

use character_set::CharacterSet;
use dicom_core::Tag;
use disallowed_vr::DisallowedVr;
use private_tags::PrivateTagVolume;
use required_tags::RequiredTags;
use sequence_integrity::SequenceIntegrity;
use serde::{Serialize, Serializer};
use std::fmt;

use crate::config::Config;
use crate::dataset::Dataset;
use crate::element::DataElement;

/// A single structural check over a dataset.
///
/// Rules are independent of each other and hold no state, so running the
/// same rule twice over the same dataset yields the same findings.
pub trait Rule: Send + Sync {
    fn id(&self) -> RuleId;

    fn check(&self, config: &Config, dataset: &Dataset) -> Vec<Finding>;
}

/// Identifies the rule that produced a [`Finding`].
#[derive(Serialize, Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[serde(rename_all = "kebab-case")]
pub enum RuleId {
    /// Required tags must be present and non-empty.
    RequiredTags,

    /// Binary or unknown VRs outside of the pixel data group.
    DisallowedVr,

    /// Sequence values must be iterable and hold no missing items.
    SequenceIntegrity,

    /// The number of private tags must stay below a threshold.
    PrivateTagVolume,

    /// Specific Character Set must be one of the allowed values.
    CharacterSet,
}

impl RuleId {
    /// All rules, in the order the validator runs them.
    pub const ALL: [RuleId; 5] = [
        RuleId::RequiredTags,
        RuleId::DisallowedVr,
        RuleId::SequenceIntegrity,
        RuleId::PrivateTagVolume,
        RuleId::CharacterSet,
    ];

    pub fn get_rule_struct(&self) -> Box<dyn Rule> {
        match self {
            RuleId::RequiredTags => Box::new(RequiredTags),
            RuleId::DisallowedVr => Box::new(DisallowedVr),
            RuleId::SequenceIntegrity => Box::new(SequenceIntegrity),
            RuleId::PrivateTagVolume => Box::new(PrivateTagVolume),
            RuleId::CharacterSet => Box::new(CharacterSet),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleId::RequiredTags => "required-tags",
            RuleId::DisallowedVr => "disallowed-vr",
            RuleId::SequenceIntegrity => "sequence-integrity",
            RuleId::PrivateTagVolume => "private-tag-volume",
            RuleId::CharacterSet => "character-set",
        }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("Warning"),
            Severity::Info => f.write_str("Info"),
        }
    }
}

/// One structural observation about a dataset. Findings are data, never errors.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Finding {
    pub severity: Severity,
    pub code: RuleId,
    pub message: String,
    #[serde(serialize_with = "serialize_tag")]
    pub tag: Option<Tag>,
}

impl Finding {
    pub fn warning(code: RuleId, message: impl Into<String>, tag: Option<Tag>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
            tag,
        }
    }

    pub fn info(code: RuleId, message: impl Into<String>, tag: Option<Tag>) -> Self {
        Self {
            severity: Severity::Info,
            code,
            message: message.into(),
            tag,
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.severity, self.message)
    }
}

fn serialize_tag<S>(tag: &Option<Tag>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match tag {
        Some(tag) => serializer.serialize_str(&format!("{tag}")),
        None => serializer.serialize_none(),
    }
}

/// `(0010,0010) (PatientName)`, or just the tag when there is no keyword.
pub(crate) fn describe(elem: &DataElement) -> String {
    match elem.keyword() {
        Some(keyword) => format!("{} ({keyword})", elem.tag()),
        None => format!("{}", elem.tag()),
    }
}
