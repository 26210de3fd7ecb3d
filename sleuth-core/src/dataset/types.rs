//! Elements, documents and datasets
//!
//! All of these are written once at ingestion and never mutated, so they are
//! shared freely behind `Arc` without locking.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{DatasetId, DocumentId, ElementId};

/// An immutable text span within a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub id: ElementId,
    pub document_id: DocumentId,
    /// Half-open char offsets into the document text
    pub begin: usize,
    pub end: usize,
    pub text: String,
}

impl Element {
    /// Element id derived from its document and ordinal position.
    #[must_use]
    pub fn id_for(document_id: &DocumentId, ordinal: usize) -> ElementId {
        ElementId::new(format!("{}-{}", document_id, ordinal))
    }
}

/// An ordered sequence of elements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub elements: Vec<Element>,
}

impl Document {
    /// Document id scoped to its dataset.
    #[must_use]
    pub fn id_for(dataset_id: &DatasetId, name: &str) -> DocumentId {
        DocumentId::new(format!("{}-{}", dataset_id, name))
    }

    /// Build a document from element texts.
    ///
    /// Offsets are computed as if the texts were joined by one separator char.
    #[must_use]
    pub fn from_texts<S: AsRef<str>>(dataset_id: &DatasetId, name: &str, texts: &[S]) -> Self {
        let id = Self::id_for(dataset_id, name);
        let mut begin = 0;
        let elements = texts
            .iter()
            .enumerate()
            .map(|(ordinal, text)| {
                let text = text.as_ref();
                let end = begin + text.chars().count();
                let element = Element {
                    id: Element::id_for(&id, ordinal),
                    document_id: id.clone(),
                    begin,
                    end,
                    text: text.to_string(),
                };
                begin = end + 1;
                element
            })
            .collect();
        Self { id, elements }
    }
}

/// A loaded dataset with an element index
#[derive(Debug, Clone)]
pub struct Dataset {
    id: DatasetId,
    documents: Vec<Document>,
    elements: Vec<Element>,
    element_index: HashMap<ElementId, usize>,
    document_index: HashMap<DocumentId, usize>,
}

impl Dataset {
    pub fn new(id: DatasetId, documents: Vec<Document>) -> Self {
        let elements: Vec<Element> = documents
            .iter()
            .flat_map(|doc| doc.elements.iter().cloned())
            .collect();
        let element_index = elements
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id.clone(), i))
            .collect();
        let document_index = documents
            .iter()
            .enumerate()
            .map(|(i, d)| (d.id.clone(), i))
            .collect();
        Self {
            id,
            documents,
            elements,
            element_index,
            document_index,
        }
    }

    pub fn id(&self) -> &DatasetId {
        &self.id
    }

    /// All elements in document order
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn total_elements(&self) -> usize {
        self.elements.len()
    }

    pub fn element(&self, id: &ElementId) -> Option<&Element> {
        self.element_index.get(id).map(|&i| &self.elements[i])
    }

    pub fn document(&self, id: &DocumentId) -> Option<&Document> {
        self.document_index.get(id).map(|&i| &self.documents[i])
    }

    pub fn contains_element(&self, id: &ElementId) -> bool {
        self.element_index.contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_dataset() -> Dataset {
        let ds = DatasetId::new("ds");
        Dataset::new(
            ds.clone(),
            vec![
                Document::from_texts(&ds, "doc1", &["first"]),
                Document::from_texts(&ds, "doc2", &["second", "third"]),
            ],
        )
    }

    #[test]
    fn from_texts_derives_ids_and_offsets() {
        let ds = DatasetId::new("my_test_dataset");
        let doc = Document::from_texts(
            &ds,
            "document3",
            &[
                "document 3 has three text elements, this is the first",
                "document 3 has three text elements, this is the second",
                "document 3 has three text elements, this is the third",
            ],
        );

        assert_eq!(doc.id.as_str(), "my_test_dataset-document3");
        let spans: Vec<(usize, usize)> = doc.elements.iter().map(|e| (e.begin, e.end)).collect();
        assert_eq!(spans, vec![(0, 53), (54, 108), (109, 162)]);
        assert_eq!(doc.elements[2].id.as_str(), "my_test_dataset-document3-2");
        assert_eq!(doc.elements[0].document_id, doc.id);
    }

    #[test]
    fn offsets_count_chars_not_bytes() {
        let ds = DatasetId::new("ds");
        let doc = Document::from_texts(&ds, "d", &["héllo", "x"]);
        assert_eq!(doc.elements[0].end, 5);
        assert_eq!(doc.elements[1].begin, 6);
    }

    #[test]
    fn dataset_indexes_elements_in_document_order() {
        let dataset = sample_dataset();

        assert_eq!(dataset.total_elements(), 3);
        let texts: Vec<&str> = dataset.elements().iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);

        let third = dataset.element(&ElementId::new("ds-doc2-1")).unwrap();
        assert_eq!(third.text, "third");
        assert!(!dataset.contains_element(&ElementId::new("ds-doc2-2")));
    }

    #[test]
    fn dataset_finds_documents_by_id() {
        let dataset = sample_dataset();
        let doc = dataset.document(&DocumentId::new("ds-doc2")).unwrap();
        assert_eq!(doc.elements.len(), 2);
        assert!(dataset.document(&DocumentId::new("ds-doc9")).is_none());
    }
}
