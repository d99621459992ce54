use dicom_core::{Tag, VR};
use dicom_dictionary_std::uids;
use garde::Validate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

use crate::element::{tag_of, PIXEL_DATA_GROUP};
use crate::tags;

static UID_REGEX: OnceLock<Regex> = OnceLock::new();
const UID_PATTERN: &str = r"^(0|[1-9][0-9]*)(\.(0|[1-9][0-9]*))*$";

const UID_MAX_LENGTH: usize = 64;
const PRIVATE_TAG_THRESHOLD_DEFAULT: usize = 50;

#[derive(Error, Debug, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub enum ConfigError {
    #[error("invalid transfer syntax UID: {0}")]
    InvalidTransferSyntax(String),

    #[error("invalid tag: {0}")]
    InvalidTag(String),

    #[error("invalid VR: {0}")]
    InvalidVr(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(format!("{err}"))
    }
}

impl From<garde::Report> for ConfigError {
    fn from(report: garde::Report) -> Self {
        ConfigError::Invalid(format!("{report}"))
    }
}

/// The transfer syntax UID that minimal datasets are written with.
///
/// It must be a valid DICOM UID: dot separated numeric components without
/// leading zeros, no longer than 64 characters.
///
/// # Example
///
/// ```
/// use dicom_preflight::config::TransferSyntaxUid;
///
/// let uid = "1.2.840.10008.1.2.1".parse::<TransferSyntaxUid>().unwrap();
/// assert_eq!(uid.as_ref(), "1.2.840.10008.1.2.1");
///
/// assert!("1.02.3".parse::<TransferSyntaxUid>().is_err());
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq, Ord, PartialOrd)]
#[serde(try_from = "String", into = "String")]
pub struct TransferSyntaxUid(String);

impl TransferSyntaxUid {
    pub fn new(uid: &str) -> Result<Self, ConfigError> {
        let regex = UID_REGEX.get_or_init(|| Regex::new(UID_PATTERN).unwrap());

        if uid.len() > UID_MAX_LENGTH || !regex.is_match(uid) {
            return Err(ConfigError::InvalidTransferSyntax(format!(
                "{uid} must consist of dot separated numbers without leading zeros and be no longer than {UID_MAX_LENGTH} characters"
            )));
        }

        Ok(Self(uid.into()))
    }
}

impl Default for TransferSyntaxUid {
    fn default() -> Self {
        Self(uids::EXPLICIT_VR_LITTLE_ENDIAN.into())
    }
}

impl FromStr for TransferSyntaxUid {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransferSyntaxUid::new(s)
    }
}

impl TryFrom<String> for TransferSyntaxUid {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TransferSyntaxUid::new(&value)
    }
}

impl From<TransferSyntaxUid> for String {
    fn from(uid: TransferSyntaxUid) -> Self {
        uid.0
    }
}

impl AsRef<str> for TransferSyntaxUid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Parses a tag from `(GGGG,EEEE)`, `GGGG,EEEE`, `GGGGEEEE` or a dictionary keyword.
pub fn parse_tag(s: &str) -> Result<Tag, ConfigError> {
    let trimmed = s.trim();
    parse_tag_numbers(trimmed)
        .or_else(|| tag_of(trimmed))
        .ok_or_else(|| ConfigError::InvalidTag(format!("{s} is neither a tag nor a known keyword")))
}

fn parse_tag_numbers(s: &str) -> Option<Tag> {
    let s = s
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(s);
    let (group, element) = match s.split_once(',') {
        Some((group, element)) => (group.trim(), element.trim()),
        None if s.len() == 8 && s.is_char_boundary(4) => s.split_at(4),
        None => return None,
    };
    if group.len() != 4 || element.len() != 4 {
        return None;
    }
    let group = u16::from_str_radix(group, 16).ok()?;
    let element = u16::from_str_radix(element, 16).ok()?;
    Some(Tag(group, element))
}

pub fn parse_vr(s: &str) -> Result<VR, ConfigError> {
    VR::from_str(s.trim()).map_err(|_| ConfigError::InvalidVr(format!("{s} is not a VR code")))
}

// Tags are written as "(GGGG,EEEE)" strings
mod tag_list {
    use super::parse_tag;
    use dicom_core::Tag;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(tags: &[Tag], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(tags.iter().map(|tag| format!("{tag}")))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Tag>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|s| parse_tag(s).map_err(serde::de::Error::custom))
            .collect()
    }
}

mod vr_list {
    use super::parse_vr;
    use dicom_core::VR;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(vrs: &[VR], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(vrs.iter().map(|vr| String::from(vr.to_string())))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<VR>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|s| parse_vr(s).map_err(serde::de::Error::custom))
            .collect()
    }
}

mod group_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(group: &u16, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{group:04X}"))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u16, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        u16::from_str_radix(s.trim_start_matches("0x"), 16).map_err(|_| {
            serde::de::Error::custom(format!("group must be a 4 digit hex number, got: {s}"))
        })
    }
}

/// Configuration of the validation rules and of the minimal dataset extraction.
///
/// All fields have defaults, so a partial JSON document only overrides what it names.
///
/// # Fields
///
/// * `required_tags` - Tags that must be present and non-empty, checked in this order
/// * `disallowed_vrs` - VRs reported outside of the pixel data group
/// * `pixel_data_group` - Group exempt from the VR check (`7FE0`)
/// * `private_tag_threshold` - Private tag count above which a finding is reported
/// * `allowed_character_sets` - Accepted values of Specific Character Set
/// * `extraction_whitelist` - Keywords copied into a minimal dataset, in this order
/// * `output_transfer_syntax` - Transfer syntax of the minimal dataset
#[derive(Serialize, Deserialize, Validate, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    #[serde(with = "tag_list")]
    #[garde(skip)]
    required_tags: Vec<Tag>,

    #[serde(with = "vr_list")]
    #[garde(skip)]
    disallowed_vrs: Vec<VR>,

    #[serde(with = "group_hex")]
    #[garde(skip)]
    pixel_data_group: u16,

    #[garde(skip)]
    private_tag_threshold: usize,

    #[garde(inner(ascii, length(max = 64)))]
    allowed_character_sets: Vec<String>,

    #[garde(inner(alphanumeric, length(min = 1, max = 64)))]
    extraction_whitelist: Vec<String>,

    #[garde(skip)]
    output_transfer_syntax: TransferSyntaxUid,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            required_tags: vec![
                tags::SOP_INSTANCE_UID,
                tags::PATIENT_NAME,
                tags::PATIENT_ID,
                tags::STUDY_INSTANCE_UID,
                tags::SERIES_INSTANCE_UID,
            ],
            disallowed_vrs: vec![VR::OB, VR::OW, VR::OF, VR::OD, VR::OL, VR::OV, VR::UN],
            pixel_data_group: PIXEL_DATA_GROUP,
            private_tag_threshold: PRIVATE_TAG_THRESHOLD_DEFAULT,
            allowed_character_sets: ["", "ISO_IR 6", "ISO_IR 100", "ISO_IR 192"]
                .into_iter()
                .map(String::from)
                .collect(),
            extraction_whitelist: [
                "PatientName",
                "PatientID",
                "StudyInstanceUID",
                "SeriesInstanceUID",
                "SOPInstanceUID",
                "SOPClassUID",
                "Modality",
                "StudyDate",
                "SeriesDate",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            output_transfer_syntax: TransferSyntaxUid::default(),
        }
    }
}

impl Config {
    /// Parses a JSON configuration and checks its field constraints.
    ///
    /// # Example
    ///
    /// ```
    /// use dicom_preflight::config::Config;
    ///
    /// let config = Config::from_json(r#"{ "private_tag_threshold": 10 }"#).unwrap();
    /// assert_eq!(config.private_tag_threshold(), 10);
    /// assert_eq!(config.required_tags().len(), 5);
    /// ```
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn required_tags(&self) -> &[Tag] {
        &self.required_tags
    }

    pub fn disallowed_vrs(&self) -> &[VR] {
        &self.disallowed_vrs
    }

    pub fn is_disallowed_vr(&self, vr: VR) -> bool {
        self.disallowed_vrs.contains(&vr)
    }

    pub fn pixel_data_group(&self) -> u16 {
        self.pixel_data_group
    }

    pub fn private_tag_threshold(&self) -> usize {
        self.private_tag_threshold
    }

    pub fn allowed_character_sets(&self) -> &[String] {
        &self.allowed_character_sets
    }

    pub fn is_allowed_character_set(&self, value: &str) -> bool {
        self.allowed_character_sets
            .iter()
            .any(|allowed| allowed == value)
    }

    pub fn extraction_whitelist(&self) -> &[String] {
        &self.extraction_whitelist
    }

    pub fn output_transfer_syntax(&self) -> &TransferSyntaxUid {
        &self.output_transfer_syntax
    }
}

/// A builder for [`Config`], starting from the default profile.
///
/// # Example
///
/// ```
/// use dicom_preflight::config::ConfigBuilder;
/// use dicom_preflight::tags;
///
/// let config = ConfigBuilder::new()
///     .required_tags([tags::SOP_INSTANCE_UID, tags::MODALITY])
///     .private_tag_threshold(100)
///     .build();
/// assert_eq!(config.required_tags(), &[tags::SOP_INSTANCE_UID, tags::MODALITY]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigBuilder(Config);

impl ConfigBuilder {
    pub fn new() -> Self {
        ConfigBuilder(Config::default())
    }

    /// Replaces the list of required tags. Order is kept in the findings.
    pub fn required_tags(mut self, tags: impl IntoIterator<Item = Tag>) -> Self {
        self.0.required_tags = tags.into_iter().collect();
        self
    }

    /// Appends a single required tag.
    pub fn required_tag(mut self, tag: Tag) -> Self {
        if !self.0.required_tags.contains(&tag) {
            self.0.required_tags.push(tag);
        }
        self
    }

    pub fn disallowed_vrs(mut self, vrs: impl IntoIterator<Item = VR>) -> Self {
        self.0.disallowed_vrs = vrs.into_iter().collect();
        self
    }

    pub fn pixel_data_group(mut self, group: u16) -> Self {
        self.0.pixel_data_group = group;
        self
    }

    pub fn private_tag_threshold(mut self, threshold: usize) -> Self {
        self.0.private_tag_threshold = threshold;
        self
    }

    pub fn allowed_character_sets<S: Into<String>>(
        mut self,
        character_sets: impl IntoIterator<Item = S>,
    ) -> Self {
        self.0.allowed_character_sets = character_sets.into_iter().map(Into::into).collect();
        self
    }

    pub fn extraction_whitelist<S: Into<String>>(
        mut self,
        keywords: impl IntoIterator<Item = S>,
    ) -> Self {
        self.0.extraction_whitelist = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn output_transfer_syntax(mut self, uid: TransferSyntaxUid) -> Self {
        self.0.output_transfer_syntax = uid;
        self
    }

    pub fn build(self) -> Config {
        self.0
    }
}
