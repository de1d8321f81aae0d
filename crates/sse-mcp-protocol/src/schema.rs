//! JSON Schema fragments used to describe tool parameters.

use serde::{Deserialize, Serialize};

/// A single property schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JsonSchema {
    String {
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Number {
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Integer {
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Boolean {
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
}

impl JsonSchema {
    pub fn string() -> Self {
        Self::String { description: None }
    }

    pub fn number() -> Self {
        Self::Number { description: None }
    }

    pub fn integer() -> Self {
        Self::Integer { description: None }
    }

    pub fn boolean() -> Self {
        Self::Boolean { description: None }
    }

    pub fn with_description(self, text: impl Into<String>) -> Self {
        let description = Some(text.into());
        match self {
            Self::String { .. } => Self::String { description },
            Self::Number { .. } => Self::Number { description },
            Self::Integer { .. } => Self::Integer { description },
            Self::Boolean { .. } => Self::Boolean { description },
        }
    }
}
