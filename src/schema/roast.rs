use serde::{Deserialize, Serialize};
use std::fmt;

/// Critique voice. Unrecognized names deserialize as [`CritiqueStyle::Brutal`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum CritiqueStyle {
    #[default]
    Brutal,
    Constructive,
    Educational,
    Funny,
    Security,
}

impl CritiqueStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Brutal => "brutal",
            Self::Constructive => "constructive",
            Self::Educational => "educational",
            Self::Funny => "funny",
            Self::Security => "security",
        }
    }
}

impl From<String> for CritiqueStyle {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "constructive" => Self::Constructive,
            "educational" => Self::Educational,
            "funny" => Self::Funny,
            "security" => Self::Security,
            _ => Self::Brutal,
        }
    }
}

impl fmt::Display for CritiqueStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionMode {
    #[default]
    None,
    Basic,
    Detailed,
}

impl SuggestionMode {
    pub fn is_enabled(self) -> bool {
        self != Self::None
    }
}

/// Knobs an auto-critique run was started with, echoed back with its results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoastParameters {
    pub style: CritiqueStyle,
    pub extensions: Option<Vec<String>>,
    pub directories: Option<Vec<String>>,
    pub file_count: usize,
    pub description: Option<String>,
    pub suggestions: SuggestionMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoastedFile {
    pub path: String,
    pub critique: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<String>,
}
