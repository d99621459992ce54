use dicom_core::{DataDictionary, Tag, VR};
use dicom_dictionary_std::StandardDataDictionary;
use std::fmt;
use thiserror::Error;

use crate::dataset::Dataset;

/// Group number of the pixel data element (7FE0,0010).
pub const PIXEL_DATA_GROUP: u16 = 0x7FE0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("malformed input: undefined length is not allowed for VR {vr} at {tag}")]
    UndefinedLength { tag: Tag, vr: VR },

    #[error("malformed input: {tag} is flagged empty but carries a value")]
    EmptyMismatch { tag: Tag },
}

pub type Result<T, E = ModelError> = std::result::Result<T, E>;

/// Tags with odd group numbers are private (vendor specific) tags.
pub fn is_private(tag: &Tag) -> bool {
    tag.group() % 2 != 0
}

pub fn is_pixel_data_group(tag: &Tag, group: u16) -> bool {
    tag.group() == group
}

/// Returns `true` for the VRs whose values are opaque byte payloads.
pub fn is_binary_vr(vr: VR) -> bool {
    matches!(
        vr,
        VR::OB | VR::OW | VR::OF | VR::OD | VR::OL | VR::OV | VR::UN
    )
}

/// Looks up the dictionary keyword of a tag, e.g. `PatientName` for `(0010,0010)`.
pub fn keyword_of(tag: Tag) -> Option<&'static str> {
    StandardDataDictionary.by_tag(tag).map(|entry| entry.alias)
}

/// Resolves a dictionary keyword back to its tag.
pub fn tag_of(keyword: &str) -> Option<Tag> {
    StandardDataDictionary
        .by_name(keyword)
        .map(|entry| entry.tag.inner())
}

/// A single (non-sequence) value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Str(String),
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Str(s) => f.write_str(s),
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::UInt(v) => write!(f, "{v}"),
            Scalar::Float(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Str(value.into())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Str(value)
    }
}

/// The value of a data element.
///
/// There is exactly one way to read it, [`DataElement::value`]. An element
/// without a value holds [`ElementValue::Empty`] and has `is_empty() == true`.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    Empty,
    Single(Scalar),
    Multi(Vec<Scalar>),
    /// Sequence items in storage order. `None` is a missing item placeholder.
    Items(Vec<Option<Dataset>>),
    Bytes(Vec<u8>),
}

impl ElementValue {
    pub fn is_empty(&self) -> bool {
        match self {
            ElementValue::Empty => true,
            ElementValue::Single(Scalar::Str(s)) => s.is_empty(),
            ElementValue::Single(_) => false,
            ElementValue::Multi(values) => values.is_empty(),
            ElementValue::Items(items) => items.is_empty(),
            ElementValue::Bytes(bytes) => bytes.is_empty(),
        }
    }

    /// Value multiplicity. Sequences and byte payloads count as one value.
    pub fn multiplicity(&self) -> u32 {
        match self {
            ElementValue::Multi(values) => values.len() as u32,
            v if v.is_empty() => 0,
            _ => 1,
        }
    }

    /// Returns the sequence items, or `None` when the value is not list-like.
    pub fn items(&self) -> Option<&[Option<Dataset>]> {
        match self {
            ElementValue::Items(items) => Some(items),
            _ => None,
        }
    }

    /// Textual form of a scalar or multi-valued value, joined with `\`.
    pub fn to_text(&self) -> Option<String> {
        match self {
            ElementValue::Empty => Some(String::new()),
            ElementValue::Single(v) => Some(v.to_string()),
            ElementValue::Multi(values) => Some(
                values
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("\\"),
            ),
            ElementValue::Items(_) | ElementValue::Bytes(_) => None,
        }
    }
}

impl From<&str> for ElementValue {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            ElementValue::Empty
        } else {
            ElementValue::Single(Scalar::from(value))
        }
    }
}

impl From<Scalar> for ElementValue {
    fn from(value: Scalar) -> Self {
        ElementValue::Single(value)
    }
}

impl From<Vec<u8>> for ElementValue {
    fn from(value: Vec<u8>) -> Self {
        ElementValue::Bytes(value)
    }
}

impl From<Vec<Dataset>> for ElementValue {
    fn from(items: Vec<Dataset>) -> Self {
        ElementValue::Items(items.into_iter().map(Some).collect())
    }
}

/// One tagged data element with all of its header facts as explicit fields.
#[derive(Debug, Clone, PartialEq)]
pub struct DataElement {
    tag: Tag,
    keyword: Option<String>,
    vr: VR,
    value_multiplicity: u32,
    value: ElementValue,
    is_empty: bool,
    is_undefined_length: bool,
}

impl DataElement {
    /// Creates a data element. The keyword comes from the standard dictionary
    /// and the multiplicity and emptiness are derived from the value.
    pub fn new(tag: Tag, vr: VR, value: impl Into<ElementValue>) -> Self {
        let value = value.into();
        Self {
            tag,
            keyword: keyword_of(tag).map(String::from),
            vr,
            value_multiplicity: value.multiplicity(),
            is_empty: value.is_empty(),
            value,
            is_undefined_length: false,
        }
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    /// Marks the element as encoded with undefined length.
    ///
    /// Only binary and sequence VRs may be encoded that way.
    pub fn with_undefined_length(mut self) -> Result<Self> {
        if !(is_binary_vr(self.vr) || self.vr == VR::SQ) {
            return Err(ModelError::UndefinedLength {
                tag: self.tag,
                vr: self.vr,
            });
        }
        self.is_undefined_length = true;
        Ok(self)
    }

    /// Checks a decoder supplied emptiness flag against the value.
    pub fn with_empty_flag(self, is_empty: bool) -> Result<Self> {
        if is_empty && !self.value.is_empty() {
            return Err(ModelError::EmptyMismatch { tag: self.tag });
        }
        Ok(self)
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn keyword(&self) -> Option<&str> {
        self.keyword.as_deref()
    }

    pub fn vr(&self) -> VR {
        self.vr
    }

    pub fn value_multiplicity(&self) -> u32 {
        self.value_multiplicity
    }

    pub fn value(&self) -> &ElementValue {
        &self.value
    }

    pub fn into_value(self) -> ElementValue {
        self.value
    }

    pub fn is_empty(&self) -> bool {
        self.is_empty
    }

    pub fn is_undefined_length(&self) -> bool {
        self.is_undefined_length
    }

    pub fn is_private(&self) -> bool {
        is_private(&self.tag)
    }

    /// Keyword for display, falling back to an empty string for private tags.
    pub(crate) fn keyword_or_blank(&self) -> &str {
        self.keyword().unwrap_or("")
    }
}
