use dicom_core::{Tag, VR};
use std::collections::BTreeMap;

use crate::element::{is_private, tag_of, DataElement, ElementValue};
use crate::tags;

/// An ordered collection of data elements, uniquely keyed by tag.
///
/// Iteration follows insertion order. Putting an element whose tag is
/// already present replaces it in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementMap {
    elements: Vec<DataElement>,
    index: BTreeMap<Tag, usize>,
}

impl ElementMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, elem: DataElement) -> Option<DataElement> {
        match self.index.get(&elem.tag()) {
            Some(&position) => Some(std::mem::replace(&mut self.elements[position], elem)),
            None => {
                self.index.insert(elem.tag(), self.elements.len());
                self.elements.push(elem);
                None
            }
        }
    }

    pub fn get(&self, tag: Tag) -> Option<&DataElement> {
        let position = *self.index.get(&tag)?;
        self.elements.get(position)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DataElement> {
        self.elements.iter()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl FromIterator<DataElement> for ElementMap {
    fn from_iter<T: IntoIterator<Item = DataElement>>(iter: T) -> Self {
        let mut map = ElementMap::new();
        for elem in iter {
            map.put(elem);
        }
        map
    }
}

impl<'a> IntoIterator for &'a ElementMap {
    type Item = &'a DataElement;
    type IntoIter = std::slice::Iter<'a, DataElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// The file meta information header (group 0002) of a dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileMeta(ElementMap);

impl FileMeta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a file meta header holding the three identity entries.
    pub fn from_identity(
        transfer_syntax_uid: &str,
        media_storage_sop_class_uid: &str,
        media_storage_sop_instance_uid: &str,
    ) -> Self {
        let mut meta = FileMeta::new();
        meta.put(DataElement::new(
            tags::MEDIA_STORAGE_SOP_CLASS_UID,
            VR::UI,
            media_storage_sop_class_uid,
        ));
        meta.put(DataElement::new(
            tags::MEDIA_STORAGE_SOP_INSTANCE_UID,
            VR::UI,
            media_storage_sop_instance_uid,
        ));
        meta.put(DataElement::new(
            tags::TRANSFER_SYNTAX_UID,
            VR::UI,
            transfer_syntax_uid,
        ));
        meta
    }

    pub fn put(&mut self, elem: DataElement) -> Option<DataElement> {
        self.0.put(elem)
    }

    pub fn lookup(&self, tag: Tag) -> Option<&DataElement> {
        self.0.get(tag)
    }

    pub fn elements(&self) -> std::slice::Iter<'_, DataElement> {
        self.0.iter()
    }

    pub fn transfer_syntax_uid(&self) -> Option<String> {
        self.text_of(tags::TRANSFER_SYNTAX_UID)
    }

    pub fn media_storage_sop_class_uid(&self) -> Option<String> {
        self.text_of(tags::MEDIA_STORAGE_SOP_CLASS_UID)
    }

    pub fn media_storage_sop_instance_uid(&self) -> Option<String> {
        self.text_of(tags::MEDIA_STORAGE_SOP_INSTANCE_UID)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn text_of(&self, tag: Tag) -> Option<String> {
        self.lookup(tag)
            .filter(|elem| !elem.is_empty())
            .and_then(|elem| elem.value().to_text())
    }
}

/// A DICOM dataset: ordered data elements plus its file meta header.
///
/// Sequence items are datasets as well; their file meta is empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    elements: ElementMap,
    file_meta: FileMeta,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_meta(file_meta: FileMeta) -> Self {
        Self {
            elements: ElementMap::new(),
            file_meta,
        }
    }

    pub fn put(&mut self, elem: DataElement) -> Option<DataElement> {
        self.elements.put(elem)
    }

    /// Returns the element with the given tag, if present.
    pub fn lookup(&self, tag: Tag) -> Option<&DataElement> {
        self.elements.get(tag)
    }

    /// Returns the element for a dictionary keyword such as `"PatientID"`.
    pub fn lookup_keyword(&self, keyword: &str) -> Option<&DataElement> {
        match tag_of(keyword) {
            Some(tag) => self.lookup(tag),
            None => self
                .elements
                .iter()
                .find(|elem| elem.keyword() == Some(keyword)),
        }
    }

    /// Elements in construction order.
    pub fn elements(&self) -> std::slice::Iter<'_, DataElement> {
        self.elements.iter()
    }

    /// The value of an element of this dataset.
    pub fn value_of<'a>(&self, elem: &'a DataElement) -> &'a ElementValue {
        elem.value()
    }

    pub fn file_meta(&self) -> &FileMeta {
        &self.file_meta
    }

    pub fn file_meta_mut(&mut self) -> &mut FileMeta {
        &mut self.file_meta
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn private_tag_count(&self) -> usize {
        self.elements
            .iter()
            .filter(|elem| is_private(&elem.tag()))
            .count()
    }
}

impl FromIterator<DataElement> for Dataset {
    fn from_iter<T: IntoIterator<Item = DataElement>>(iter: T) -> Self {
        Self {
            elements: iter.into_iter().collect(),
            file_meta: FileMeta::new(),
        }
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a DataElement;
    type IntoIter = std::slice::Iter<'a, DataElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements()
    }
}
