use dicom_core::{Tag, VR};

use crate::dataset::{Dataset, FileMeta};
use crate::element::DataElement;
use crate::tags;

pub(crate) const CT_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.2";
pub(crate) const SOP_INSTANCE_UID: &str = "2.25.1234567890";

pub(crate) fn make_file_meta() -> FileMeta {
    FileMeta::from_identity("1.2.840.10008.1.2.1", CT_IMAGE_STORAGE, SOP_INSTANCE_UID)
}

/// A dataset holding all five required tags and the full default whitelist.
pub(crate) fn make_complete_dataset() -> Dataset {
    let mut ds = Dataset::with_meta(make_file_meta());
    for (tag, vr, value) in [
        (tags::SOP_CLASS_UID, VR::UI, CT_IMAGE_STORAGE),
        (tags::SOP_INSTANCE_UID, VR::UI, SOP_INSTANCE_UID),
        (tags::STUDY_DATE, VR::DA, "20240102"),
        (tags::SERIES_DATE, VR::DA, "20240103"),
        (tags::MODALITY, VR::CS, "CT"),
        (tags::PATIENT_NAME, VR::PN, "Doe^John"),
        (tags::PATIENT_ID, VR::LO, "12345"),
        (tags::STUDY_INSTANCE_UID, VR::UI, "2.25.1"),
        (tags::SERIES_INSTANCE_UID, VR::UI, "2.25.2"),
    ] {
        ds.put(DataElement::new(tag, vr, value));
    }
    ds
}

/// A dataset made of `count` private (odd group) elements only.
pub(crate) fn make_private_dataset(count: u16) -> Dataset {
    (0..count)
        .map(|i| DataElement::new(Tag(0x0029, 0x1000 + i), VR::LO, "VENDOR"))
        .collect()
}
