use dicom_core::Tag;
use log::{debug, warn};
use thiserror::Error;

use crate::config::Config;
use crate::dataset::{Dataset, FileMeta};
use crate::element::tag_of;
use crate::tags;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractError {
    #[error("missing identity tag {0}")]
    MissingIdentityTag(Tag),
}

pub type Result<T, E = ExtractError> = std::result::Result<T, E>;

/// Builds reduced copies of datasets that only keep a whitelist of elements.
///
/// The copy gets a fresh file meta header in the configured output transfer
/// syntax, with the media storage SOP class and instance UIDs taken from the
/// source's SOP Class UID and SOP Instance UID. Whitelisted elements that the
/// source does not have are skipped.
///
/// # Example
///
/// ```
/// use dicom_core::VR;
/// use dicom_preflight::{tags, DataElement, Dataset, Extractor};
///
/// let mut source = Dataset::new();
/// source.put(DataElement::new(tags::SOP_CLASS_UID, VR::UI, "1.2.840.10008.5.1.4.1.1.2"));
/// source.put(DataElement::new(tags::SOP_INSTANCE_UID, VR::UI, "2.25.42"));
/// source.put(DataElement::new(tags::PATIENT_ID, VR::LO, "12345"));
/// source.put(DataElement::new(tags::PATIENT_BIRTH_DATE, VR::DA, "19700101"));
///
/// let minimal = Extractor::default().extract(&source).unwrap();
/// assert!(minimal.lookup(tags::PATIENT_ID).is_some());
/// assert!(minimal.lookup(tags::PATIENT_BIRTH_DATE).is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extractor {
    config: Config,
}

impl Extractor {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Extracts the minimal dataset.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::MissingIdentityTag`] when the source has no
    /// (or an empty) SOP Class UID or SOP Instance UID. No dataset is produced then.
    pub fn extract(&self, source: &Dataset) -> Result<Dataset> {
        let sop_class_uid = identity_value(source, tags::SOP_CLASS_UID)?;
        let sop_instance_uid = identity_value(source, tags::SOP_INSTANCE_UID)?;

        let meta = FileMeta::from_identity(
            self.config.output_transfer_syntax().as_ref(),
            &sop_class_uid,
            &sop_instance_uid,
        );
        let mut minimal = Dataset::with_meta(meta);

        for keyword in self.config.extraction_whitelist() {
            let Some(tag) = tag_of(keyword) else {
                warn!("skipping unknown keyword {keyword} in extraction whitelist");
                continue;
            };
            match source.lookup(tag) {
                Some(elem) => {
                    minimal.put(elem.clone());
                }
                None => debug!("{keyword} {tag} not present in source, skipped"),
            }
        }

        Ok(minimal)
    }
}

fn identity_value(source: &Dataset, tag: Tag) -> Result<String> {
    source
        .lookup(tag)
        .filter(|elem| !elem.is_empty())
        .and_then(|elem| elem.value().to_text())
        .ok_or(ExtractError::MissingIdentityTag(tag))
}

#[cfg(test)]
mod tests {
    use super::*;

    use dicom_core::VR;

    use crate::config::ConfigBuilder;
    use crate::element::{DataElement, ElementValue};
    use crate::test_utils::{make_complete_dataset, CT_IMAGE_STORAGE, SOP_INSTANCE_UID};

    const WHITELIST: [Tag; 9] = [
        tags::PATIENT_NAME,
        tags::PATIENT_ID,
        tags::STUDY_INSTANCE_UID,
        tags::SERIES_INSTANCE_UID,
        tags::SOP_INSTANCE_UID,
        tags::SOP_CLASS_UID,
        tags::MODALITY,
        tags::STUDY_DATE,
        tags::SERIES_DATE,
    ];

    #[test]
    fn test_values_are_preserved() {
        let mut source = make_complete_dataset();
        source.put(DataElement::new(
            tags::PATIENT_BIRTH_DATE,
            VR::DA,
            "19700101",
        ));
        source.put(DataElement::new(
            Tag(0x0009, 0x1001),
            VR::UN,
            vec![1u8, 2, 3],
        ));

        let minimal = Extractor::default().extract(&source).unwrap();

        for tag in WHITELIST {
            assert_eq!(
                minimal.lookup(tag).map(|e| e.value()),
                source.lookup(tag).map(|e| e.value()),
                "value of {tag} should be copied"
            );
        }
        assert!(minimal.lookup(tags::PATIENT_BIRTH_DATE).is_none());
        assert!(minimal.lookup(Tag(0x0009, 0x1001)).is_none());
        assert_eq!(minimal.len(), 9);
    }

    #[test]
    fn test_whitelist_order() {
        let minimal = Extractor::default()
            .extract(&make_complete_dataset())
            .unwrap();
        let order: Vec<Tag> = minimal.elements().map(|e| e.tag()).collect();
        assert_eq!(order, WHITELIST.to_vec());
    }

    #[test]
    fn test_file_meta_is_synthesized() {
        let mut source = make_complete_dataset();
        *source.file_meta_mut() = FileMeta::from_identity("1.2.840.10008.1.2.4.50", "9.9", "8.8");

        let minimal = Extractor::default().extract(&source).unwrap();
        let meta = minimal.file_meta();
        assert_eq!(
            meta.transfer_syntax_uid().as_deref(),
            Some("1.2.840.10008.1.2.1")
        );
        assert_eq!(
            meta.media_storage_sop_class_uid().as_deref(),
            Some(CT_IMAGE_STORAGE)
        );
        assert_eq!(
            meta.media_storage_sop_instance_uid().as_deref(),
            Some(SOP_INSTANCE_UID)
        );
    }

    #[test]
    fn test_missing_optional_tags_are_skipped() {
        let source: Dataset = make_complete_dataset()
            .elements()
            .filter(|e| e.tag() != tags::MODALITY && e.tag() != tags::SERIES_DATE)
            .cloned()
            .collect();

        let minimal = Extractor::default().extract(&source).unwrap();
        assert_eq!(minimal.len(), 7);
        assert!(minimal.lookup(tags::MODALITY).is_none());
    }

    #[test]
    fn test_missing_sop_class_uid() {
        let source: Dataset = make_complete_dataset()
            .elements()
            .filter(|e| e.tag() != tags::SOP_CLASS_UID)
            .cloned()
            .collect();

        assert_eq!(
            Extractor::default().extract(&source),
            Err(ExtractError::MissingIdentityTag(tags::SOP_CLASS_UID))
        );
    }

    #[test]
    fn test_empty_sop_instance_uid() {
        let mut source = make_complete_dataset();
        source.put(DataElement::new(
            tags::SOP_INSTANCE_UID,
            VR::UI,
            ElementValue::Empty,
        ));

        assert_eq!(
            Extractor::default().extract(&source),
            Err(ExtractError::MissingIdentityTag(tags::SOP_INSTANCE_UID))
        );
    }

    #[test]
    fn test_result_is_independent_of_source() {
        let source = make_complete_dataset();
        let mut minimal = Extractor::default().extract(&source).unwrap();
        minimal.put(DataElement::new(tags::PATIENT_NAME, VR::PN, "Changed^Name"));

        assert_eq!(
            source.lookup(tags::PATIENT_NAME).map(|e| e.value()),
            Some(&ElementValue::from("Doe^John"))
        );
    }

    #[test]
    fn test_custom_whitelist_and_transfer_syntax() {
        let config = ConfigBuilder::new()
            .extraction_whitelist(["Modality", "NotAKeyword", "PatientID"])
            .output_transfer_syntax("1.2.840.10008.1.2".parse().unwrap())
            .build();

        let minimal = Extractor::new(config)
            .extract(&make_complete_dataset())
            .unwrap();
        let order: Vec<Tag> = minimal.elements().map(|e| e.tag()).collect();
        assert_eq!(order, vec![tags::MODALITY, tags::PATIENT_ID]);
        assert_eq!(
            minimal.file_meta().transfer_syntax_uid().as_deref(),
            Some("1.2.840.10008.1.2")
        );
    }
}
