//! Prototype classifier
//!
//! Each element is embedded as an L2-normalized bag-of-words term frequency
//! vector. Training averages the embeddings of each class into a normalized
//! prototype; prediction compares an element against both prototypes with
//! cosine similarity.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
use tokenizers::{OffsetReferential, OffsetType, PreTokenizedString, PreTokenizer};
use tracing::{debug, warn};

use super::traits::{ClassifierTrainer, ModelHandle, Prediction, Predictor};
use crate::dataset::Element;
use crate::error::TrainingError;
use crate::labels::LabelSnapshot;
use crate::types::LabelValue;

type SparseVector = HashMap<String, f32>;

/// Lowercased word tokens; punctuation splits words and is dropped
fn tokenize(text: &str) -> Vec<String> {
    let mut pretokenized = PreTokenizedString::from(text);
    if let Err(e) = BertPreTokenizer.pre_tokenize(&mut pretokenized) {
        warn!(error = %e, "Pre-tokenization failed, text embeds as empty");
        return Vec::new();
    }
    pretokenized
        .get_splits(OffsetReferential::Original, OffsetType::Char)
        .into_iter()
        .map(|(token, _, _)| token)
        .filter(|token| token.chars().any(char::is_alphanumeric))
        .map(str::to_lowercase)
        .collect()
}

fn normalize(mut vector: SparseVector) -> SparseVector {
    let norm = vector.values().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.values_mut() {
            *value /= norm;
        }
    }
    vector
}

fn embed(text: &str) -> SparseVector {
    let mut vector = SparseVector::new();
    for token in tokenize(text) {
        *vector.entry(token).or_insert(0.0) += 1.0;
    }
    normalize(vector)
}

fn cosine(a: &SparseVector, b: &SparseVector) -> f32 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small
        .iter()
        .filter_map(|(token, x)| large.get(token).map(|y| x * y))
        .sum()
}

fn prototype<'a>(texts: impl Iterator<Item = &'a str>) -> Option<SparseVector> {
    let mut sum = SparseVector::new();
    let mut count = 0usize;
    for text in texts {
        for (token, weight) in embed(text) {
            *sum.entry(token).or_insert(0.0) += weight;
        }
        count += 1;
    }
    (count > 0).then(|| normalize(sum))
}

/// A trained pair of class prototypes
#[derive(Debug, Clone)]
pub struct PrototypeModel {
    positive: SparseVector,
    negative: SparseVector,
}

impl PrototypeModel {
    /// Positive-class score in [0, 1]; 0.5 when the text shares no terms
    /// with either prototype.
    pub fn score(&self, text: &str) -> f32 {
        let embedding = embed(text);
        let positive = cosine(&embedding, &self.positive).max(0.0);
        let negative = cosine(&embedding, &self.negative).max(0.0);
        let total = positive + negative;
        if total > 0.0 { positive / total } else { 0.5 }
    }
}

#[async_trait]
impl Predictor for PrototypeModel {
    async fn predict(&self, elements: &[Element]) -> Result<Vec<Prediction>, TrainingError> {
        Ok(elements
            .iter()
            .map(|element| Prediction::from_score(self.score(&element.text)))
            .collect())
    }
}

/// Trainer producing [`PrototypeModel`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct PrototypeTrainer;

impl PrototypeTrainer {
    pub fn new() -> Self {
        Self
    }

    /// Build the model synchronously
    pub fn fit(&self, snapshot: &LabelSnapshot) -> Result<PrototypeModel, TrainingError> {
        let texts_for = |value: LabelValue| {
            snapshot
                .examples
                .iter()
                .filter(move |example| example.value == value)
                .map(|example| example.element.text.as_str())
        };

        let positive = prototype(texts_for(LabelValue::True)).ok_or_else(|| {
            TrainingError::Trainer(format!(
                "category {} has no positive examples",
                snapshot.category_id
            ))
        })?;
        let negative = prototype(texts_for(LabelValue::False)).ok_or_else(|| {
            TrainingError::Trainer(format!(
                "category {} has no negative examples",
                snapshot.category_id
            ))
        })?;

        debug!(
            category = %snapshot.category_id,
            positive_terms = positive.len(),
            negative_terms = negative.len(),
            "Prototype model fitted"
        );
        Ok(PrototypeModel { positive, negative })
    }
}

#[async_trait]
impl ClassifierTrainer for PrototypeTrainer {
    async fn train(&self, snapshot: &LabelSnapshot) -> Result<ModelHandle, TrainingError> {
        let model = self.fit(snapshot)?;
        Ok(ModelHandle::new(Arc::new(model)))
    }
}
