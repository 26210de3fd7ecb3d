//! User label storage

pub mod store;

pub use store::{LabelCounts, LabelSnapshot, LabelStore, LabelWrite, LabeledElement};
