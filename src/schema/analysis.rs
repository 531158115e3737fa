use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-path critique outcome, nested for directories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AnalysisResult {
    File { critiques: Vec<String> },
    Directory { files: BTreeMap<String, AnalysisResult> },
    Error { message: String },
}

impl AnalysisResult {
    pub fn file(critiques: Vec<String>) -> Self {
        Self::File { critiques }
    }

    pub fn path_not_found() -> Self {
        Self::Error {
            message: "Path not found".to_string(),
        }
    }
}
