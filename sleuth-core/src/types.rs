//! Identifier newtypes and the closed label value set.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::OrchestratorError;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(
    /// Identifier of a workspace.
    WorkspaceId
);
string_id!(
    /// Identifier of a dataset a workspace is bound to.
    DatasetId
);
string_id!(
    /// Identifier of a document, `"{dataset}-{name}"`.
    DocumentId
);
string_id!(
    /// Identifier of an element, `"{document}-{ordinal}"`.
    ElementId
);
string_id!(
    /// Identifier of a category within a workspace.
    CategoryId
);

/// Identifier of a trained model, opaque to the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelId(pub Uuid);

impl ModelId {
    /// Create a new model ID with a UUIDv7 (time-ordered).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ModelId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user label (or model prediction) for one element and category.
///
/// `Unset` is only meaningful on writes: it clears the stored label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelValue {
    True,
    False,
    Unset,
}

impl LabelValue {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::True => "true",
            Self::False => "false",
            Self::Unset => "unset",
        }
    }

    /// Parse a boundary value, rejecting anything outside the closed set.
    pub fn parse(s: &str) -> Result<Self, OrchestratorError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Self::True),
            "false" => Ok(Self::False),
            "unset" | "" => Ok(Self::Unset),
            _ => Err(OrchestratorError::InvalidLabelValue(s.to_string())),
        }
    }

    /// Whether this value is stored (true/false) rather than a removal.
    #[must_use]
    pub fn is_set(&self) -> bool {
        !matches!(self, Self::Unset)
    }
}

impl From<bool> for LabelValue {
    fn from(value: bool) -> Self {
        if value { Self::True } else { Self::False }
    }
}

impl fmt::Display for LabelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
