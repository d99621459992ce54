//! Bridge between the element model and the `dicom-object` in-memory objects.
//!
//! Reading turns a decoded file into a [`Dataset`]; writing turns a [`Dataset`]
//! back into a [`DefaultDicomObject`] that dicom-object can encode.

use dicom_core::header::Header;
use dicom_core::value::{DataSetSequence, PixelFragmentSequence, Value as DicomValue, C};
use dicom_core::{Length, PrimitiveValue, Tag, VR};
use dicom_object::file::ReadPreamble;
use dicom_object::mem::InMemElement;
use dicom_object::{
    open_file, DefaultDicomObject, FileDicomObject, FileMetaTableBuilder, InMemDicomObject,
    OpenFileOptions,
};
use log::info;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

use crate::config::parse_tag;
use crate::dataset::{Dataset, FileMeta};
use crate::element::{is_binary_vr, DataElement, ElementValue, ModelError, Scalar};
use crate::tags;

#[derive(Error, Debug, PartialEq)]
pub enum ConvertError {
    #[error("failed to read DICOM data: {}", .0.to_lowercase())]
    Read(String),

    #[error("failed to write DICOM data: {}", .0.to_lowercase())]
    Write(String),

    #[error("invalid file meta: {}", .0.to_lowercase())]
    Meta(String),

    #[error("missing file meta entry {0}")]
    MissingMeta(Tag),

    #[error("cannot encode value of {tag}: {reason}")]
    Value { tag: Tag, reason: String },

    #[error("cannot encode sequence {tag}: item missing at index {index}")]
    UnencodableItem { tag: Tag, index: usize },

    #[error(transparent)]
    Malformed(#[from] ModelError),
}

pub type Result<T, E = ConvertError> = std::result::Result<T, E>;

/// Opens a DICOM file (with preamble) and converts it.
pub fn read_dataset(path: impl AsRef<Path>) -> Result<Dataset> {
    let obj = open_file(path.as_ref())
        .map_err(|e| ConvertError::Read(format!("{e}")))?;
    Dataset::from_file_object(&obj)
}

/// Reads a DICOM file (with preamble) from any byte source and converts it.
pub fn read_dataset_from(src: impl Read) -> Result<Dataset> {
    let obj = OpenFileOptions::new()
        .read_preamble(ReadPreamble::Always)
        .from_reader(src)
        .map_err(|e| ConvertError::Read(format!("{e}")))?;
    Dataset::from_file_object(&obj)
}

/// Encodes the dataset and writes it as a DICOM file.
pub fn write_dataset(dataset: &Dataset, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    dataset
        .to_file_object()?
        .write_to_file(path)
        .map_err(|e| ConvertError::Write(format!("{e}")))?;
    info!("wrote {} element(s) to {}", dataset.len(), path.display());
    Ok(())
}

impl Dataset {
    pub fn from_file_object(obj: &DefaultDicomObject) -> Result<Self> {
        let meta = obj.meta();
        let mut dataset = Dataset::with_meta(FileMeta::from_identity(
            meta.transfer_syntax(),
            meta.media_storage_sop_class_uid(),
            meta.media_storage_sop_instance_uid(),
        ));
        for elem in &**obj {
            dataset.put(convert_element(elem)?);
        }
        Ok(dataset)
    }

    /// Builds a dicom-object file object from this dataset and its file meta.
    ///
    /// # Errors
    ///
    /// Fails when one of the three identity entries of the file meta is
    /// missing, or when a value cannot be represented in its VR.
    pub fn to_file_object(&self) -> Result<DefaultDicomObject> {
        use ConvertError::MissingMeta;

        let file_meta = self.file_meta();
        let transfer_syntax = file_meta
            .transfer_syntax_uid()
            .ok_or(MissingMeta(tags::TRANSFER_SYNTAX_UID))?;
        let sop_class_uid = file_meta
            .media_storage_sop_class_uid()
            .ok_or(MissingMeta(tags::MEDIA_STORAGE_SOP_CLASS_UID))?;
        let sop_instance_uid = file_meta
            .media_storage_sop_instance_uid()
            .ok_or(MissingMeta(tags::MEDIA_STORAGE_SOP_INSTANCE_UID))?;

        let meta = FileMetaTableBuilder::new()
            .transfer_syntax(transfer_syntax)
            .media_storage_sop_class_uid(sop_class_uid)
            .media_storage_sop_instance_uid(sop_instance_uid)
            .build()
            .map_err(|e| ConvertError::Meta(format!("{e}")))?;

        let mut obj = FileDicomObject::new_empty_with_meta(meta);
        for elem in self.elements() {
            obj.put(to_dicom_element(elem)?);
        }
        Ok(obj)
    }
}

fn trim_text(text: &str) -> String {
    text.trim_end_matches(['\0', ' ']).to_string()
}

fn convert_object(obj: &InMemDicomObject) -> Result<Dataset> {
    obj.into_iter().map(convert_element).collect()
}

fn convert_items(items: &[InMemDicomObject]) -> Result<Vec<Option<Dataset>>> {
    items
        .iter()
        .map(|item| convert_object(item).map(Some))
        .collect()
}

fn convert_element(elem: &InMemElement) -> Result<DataElement> {
    let header = elem.header();
    let value = match elem.value() {
        DicomValue::Primitive(primitive) => convert_primitive(header.vr(), primitive),
        DicomValue::Sequence(seq) => ElementValue::Items(convert_items(seq.items())?),
        DicomValue::PixelSequence(seq) => {
            ElementValue::Bytes(seq.fragments().iter().flatten().copied().collect())
        }
    };

    let converted = DataElement::new(header.tag(), header.vr(), value);
    if header.len.is_undefined() {
        return Ok(converted.with_undefined_length()?);
    }
    Ok(converted)
}

fn convert_primitive(vr: VR, value: &PrimitiveValue) -> ElementValue {
    if let PrimitiveValue::Empty = value {
        return ElementValue::Empty;
    }
    if is_binary_vr(vr) {
        return ElementValue::Bytes(value.to_bytes().into_owned());
    }

    let scalars: Vec<Scalar> = match value {
        PrimitiveValue::U8(bytes) => return ElementValue::Bytes(bytes.to_vec()),
        PrimitiveValue::I16(v) => v.iter().map(|&x| Scalar::Int(x.into())).collect(),
        PrimitiveValue::I32(v) => v.iter().map(|&x| Scalar::Int(x.into())).collect(),
        PrimitiveValue::I64(v) => v.iter().map(|&x| Scalar::Int(x)).collect(),
        PrimitiveValue::U16(v) => v.iter().map(|&x| Scalar::UInt(x.into())).collect(),
        PrimitiveValue::U32(v) => v.iter().map(|&x| Scalar::UInt(x.into())).collect(),
        PrimitiveValue::U64(v) => v.iter().map(|&x| Scalar::UInt(x)).collect(),
        PrimitiveValue::F32(v) => v.iter().map(|&x| Scalar::Float(x.into())).collect(),
        PrimitiveValue::F64(v) => v.iter().map(|&x| Scalar::Float(x)).collect(),
        PrimitiveValue::Str(s) => vec![Scalar::Str(trim_text(s))],
        PrimitiveValue::Strs(v) => v.iter().map(|s| Scalar::Str(trim_text(s))).collect(),
        // dates, times and tags keep their textual form
        other => other
            .to_str()
            .split('\\')
            .map(|s| Scalar::Str(trim_text(s)))
            .collect(),
    };

    from_scalars(scalars)
}

fn from_scalars(mut scalars: Vec<Scalar>) -> ElementValue {
    match scalars.len() {
        0 => ElementValue::Empty,
        1 => match scalars.remove(0) {
            Scalar::Str(s) if s.is_empty() => ElementValue::Empty,
            scalar => ElementValue::Single(scalar),
        },
        _ => ElementValue::Multi(scalars),
    }
}

fn to_dicom_element(elem: &DataElement) -> Result<InMemElement> {
    let tag = elem.tag();
    let vr = elem.vr();
    let value: DicomValue<InMemDicomObject> = match elem.value() {
        ElementValue::Empty => PrimitiveValue::Empty.into(),
        ElementValue::Bytes(bytes) if elem.is_undefined_length() => {
            let fragments = vec![bytes.clone()];
            DicomValue::PixelSequence(PixelFragmentSequence::new(Vec::<u32>::new(), fragments))
        }
        ElementValue::Bytes(bytes) => PrimitiveValue::U8(bytes.iter().copied().collect()).into(),
        ElementValue::Single(scalar) => {
            let scalars = std::slice::from_ref(scalar);
            scalars_to_primitive(tag, vr, scalars)?.into()
        }
        ElementValue::Multi(scalars) => scalars_to_primitive(tag, vr, scalars)?.into(),
        ElementValue::Items(items) => {
            let items = items
                .iter()
                .enumerate()
                .map(|(index, item)| match item {
                    Some(item) => to_dicom_object(item),
                    None => Err(ConvertError::UnencodableItem { tag, index }),
                })
                .collect::<Result<Vec<_>>>()?;
            DicomValue::Sequence(DataSetSequence::new(items, Length::UNDEFINED))
        }
    };
    Ok(InMemElement::new(tag, vr, value))
}

fn to_dicom_object(dataset: &Dataset) -> Result<InMemDicomObject> {
    let mut obj = InMemDicomObject::new_empty();
    for elem in dataset.elements() {
        obj.put(to_dicom_element(elem)?);
    }
    Ok(obj)
}

fn scalars_to_primitive(tag: Tag, vr: VR, scalars: &[Scalar]) -> Result<PrimitiveValue> {
    let value = match vr {
        VR::US => PrimitiveValue::U16(ints(tag, vr, scalars)?),
        VR::UL => PrimitiveValue::U32(ints(tag, vr, scalars)?),
        VR::UV => PrimitiveValue::U64(ints(tag, vr, scalars)?),
        VR::SS => PrimitiveValue::I16(ints(tag, vr, scalars)?),
        VR::SL => PrimitiveValue::I32(ints(tag, vr, scalars)?),
        VR::SV => PrimitiveValue::I64(ints(tag, vr, scalars)?),
        VR::FL => PrimitiveValue::F32(narrow(floats(tag, vr, scalars)?)),
        VR::FD => PrimitiveValue::F64(floats(tag, vr, scalars)?),
        VR::AT => PrimitiveValue::Tags(tags_of(tag, vr, scalars)?),
        _ if scalars.len() == 1 => PrimitiveValue::Str(scalars[0].to_string()),
        _ => PrimitiveValue::Strs(scalars.iter().map(ToString::to_string).collect()),
    };
    Ok(value)
}

fn invalid_value(tag: Tag, vr: VR, scalar: &Scalar) -> ConvertError {
    ConvertError::Value {
        tag,
        reason: format!("{scalar} is not a valid {vr} value"),
    }
}

fn ints<T: TryFrom<i128>>(tag: Tag, vr: VR, scalars: &[Scalar]) -> Result<C<T>> {
    scalars
        .iter()
        .map(|scalar| {
            let value = match scalar {
                Scalar::Int(v) => Some(i128::from(*v)),
                Scalar::UInt(v) => Some(i128::from(*v)),
                Scalar::Float(v) if v.fract() == 0.0 => Some(*v as i128),
                Scalar::Float(_) => None,
                Scalar::Str(s) => s.trim().parse::<i128>().ok(),
            };
            value
                .and_then(|v| T::try_from(v).ok())
                .ok_or_else(|| invalid_value(tag, vr, scalar))
        })
        .collect()
}

fn narrow(values: C<f64>) -> C<f32> {
    values.into_iter().map(|v| v as f32).collect()
}

fn tags_of(tag: Tag, vr: VR, scalars: &[Scalar]) -> Result<C<Tag>> {
    scalars
        .iter()
        .map(|s| {
            parse_tag(&s.to_string()).map_err(|_| invalid_value(tag, vr, s))
        })
        .collect()
}

fn floats(tag: Tag, vr: VR, scalars: &[Scalar]) -> Result<C<f64>> {
    scalars
        .iter()
        .map(|scalar| {
            let value = match scalar {
                Scalar::Int(v) => Some(*v as f64),
                Scalar::UInt(v) => Some(*v as f64),
                Scalar::Float(v) => Some(*v),
                Scalar::Str(s) => s.trim().parse::<f64>().ok(),
            };
            value.ok_or_else(|| invalid_value(tag, vr, scalar))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use dicom_core::DataElement as DicomElement;

    use crate::element::ElementValue;
    use crate::test_utils::{make_complete_dataset, make_file_meta, CT_IMAGE_STORAGE};

    fn make_dicom_file_meta() -> dicom_object::FileMetaTable {
        FileMetaTableBuilder::new()
            .media_storage_sop_class_uid("1.2.3")
            .media_storage_sop_instance_uid("2.3.4")
            .transfer_syntax("1.2.840.10008.1.2.1") // Explicit VR Little Endian
            .build()
            .unwrap()
    }

    #[test]
    fn test_from_file_object() {
        let mut obj = FileDicomObject::new_empty_with_meta(make_dicom_file_meta());
        obj.put(DicomElement::new(
            tags::PATIENT_NAME,
            VR::PN,
            PrimitiveValue::from("Doe^John "),
        ));
        obj.put(DicomElement::new(
            tags::ROWS,
            VR::US,
            PrimitiveValue::from(512_u16),
        ));
        obj.put(DicomElement::new(
            Tag(0x0009, 0x1001),
            VR::UN,
            PrimitiveValue::from(vec![1u8, 2, 3, 4]),
        ));
        obj.put(DicomElement::new(
            tags::PATIENT_ID,
            VR::LO,
            PrimitiveValue::Empty,
        ));

        let ds = Dataset::from_file_object(&obj).unwrap();

        let file_meta = ds.file_meta();
        assert_eq!(
            file_meta.transfer_syntax_uid().as_deref(),
            Some("1.2.840.10008.1.2.1")
        );
        assert_eq!(
            ds.lookup(tags::PATIENT_NAME).map(|e| e.value()),
            Some(&ElementValue::from("Doe^John"))
        );
        assert_eq!(
            ds.lookup(tags::ROWS).map(|e| e.value()),
            Some(&ElementValue::Single(Scalar::UInt(512)))
        );
        assert_eq!(
            ds.lookup(Tag(0x0009, 0x1001)).map(|e| e.value()),
            Some(&ElementValue::Bytes(vec![1, 2, 3, 4]))
        );
        assert!(ds.lookup(tags::PATIENT_ID).unwrap().is_empty());
        assert_eq!(ds.len(), 4);
    }

    #[test]
    fn test_from_file_object_strips_uid_padding() {
        // odd length UIDs are padded with a trailing NUL in the file meta
        let obj = FileDicomObject::new_empty_with_meta(make_dicom_file_meta());
        assert_eq!(obj.meta().media_storage_sop_class_uid, "1.2.3\0");

        let ds = Dataset::from_file_object(&obj).unwrap();
        let file_meta = ds.file_meta();
        assert_eq!(
            file_meta.media_storage_sop_class_uid().as_deref(),
            Some("1.2.3")
        );
        assert_eq!(
            file_meta.media_storage_sop_instance_uid().as_deref(),
            Some("2.3.4")
        );
    }

    #[test]
    fn test_sequence_items_are_converted() {
        let mut item = InMemDicomObject::new_empty();
        item.put(DicomElement::new(
            tags::REFERENCED_SOP_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from("1.2.3.4"),
        ));

        let mut obj = FileDicomObject::new_empty_with_meta(make_dicom_file_meta());
        obj.put(DicomElement::new(
            tags::REFERENCED_IMAGE_SEQUENCE,
            VR::SQ,
            DicomValue::Sequence(DataSetSequence::new(vec![item], Length::UNDEFINED)),
        ));

        let ds = Dataset::from_file_object(&obj).unwrap();
        let seq = ds.lookup(tags::REFERENCED_IMAGE_SEQUENCE).unwrap();
        assert!(seq.is_undefined_length());
        let items = seq.value().items().unwrap();
        assert_eq!(items.len(), 1);
        let nested = items[0].as_ref().unwrap();
        let referenced = nested.lookup(tags::REFERENCED_SOP_INSTANCE_UID);
        assert_eq!(
            referenced.map(|e| e.value()),
            Some(&ElementValue::from("1.2.3.4"))
        );
    }

    #[test]
    fn test_to_file_object() {
        let mut ds = make_complete_dataset();
        let rows = ElementValue::Single(Scalar::UInt(256));
        ds.put(DataElement::new(tags::ROWS, VR::US, rows));

        let obj = ds.to_file_object().unwrap();
        assert_eq!(obj.meta().media_storage_sop_class_uid(), CT_IMAGE_STORAGE);
        assert_eq!(
            obj.element(tags::PATIENT_NAME).unwrap().to_str().unwrap(),
            "Doe^John"
        );
        let rows = obj.element(tags::ROWS).unwrap();
        assert_eq!(rows.to_int::<u16>().unwrap(), 256);
    }

    #[test]
    fn test_to_file_object_requires_meta() {
        let ds = Dataset::new();
        assert_eq!(
            ds.to_file_object().unwrap_err(),
            ConvertError::MissingMeta(tags::TRANSFER_SYNTAX_UID)
        );
    }

    #[test]
    fn test_missing_item_cannot_be_encoded() {
        let mut ds = Dataset::with_meta(make_file_meta());
        ds.put(DataElement::new(
            tags::REFERENCED_IMAGE_SEQUENCE,
            VR::SQ,
            ElementValue::Items(vec![Some(Dataset::new()), None]),
        ));
        assert_eq!(
            ds.to_file_object().unwrap_err(),
            ConvertError::UnencodableItem {
                tag: tags::REFERENCED_IMAGE_SEQUENCE,
                index: 1
            }
        );
    }

    #[test]
    fn test_invalid_numeric_value() {
        let mut ds = Dataset::with_meta(make_file_meta());
        ds.put(DataElement::new(tags::ROWS, VR::US, "not a number"));
        assert!(matches!(
            ds.to_file_object(),
            Err(ConvertError::Value { tag, .. }) if tag == tags::ROWS
        ));
    }

    #[test]
    fn test_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roundtrip.dcm");

        let ds = make_complete_dataset();
        write_dataset(&ds, &path).unwrap();
        let read = read_dataset(&path).unwrap();

        for elem in ds.elements() {
            assert_eq!(
                read.lookup(elem.tag()).map(|e| e.value()),
                Some(elem.value()),
                "value of {} should survive",
                elem.tag()
            );
        }
        assert_eq!(
            read.file_meta().media_storage_sop_instance_uid(),
            ds.file_meta().media_storage_sop_instance_uid()
        );

        let file = std::fs::File::open(&path).unwrap();
        let from_reader = read_dataset_from(file).unwrap();
        assert_eq!(from_reader.len(), read.len());
    }

    #[test]
    fn test_read_garbage() {
        let result = read_dataset_from(&b"definitely not a DICOM file"[..]);
        assert!(matches!(result, Err(ConvertError::Read(_))));
    }
}
