use serde::Serialize;
use thiserror::Error;

/// Non-fatal problems recorded alongside an analysis result.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisWarning {
    #[error("failed to parse {filename}: {reason}")]
    ParseFailure { filename: String, reason: String },

    #[error("no analyzer registered for {filename}")]
    UnsupportedLanguage { filename: String },

    #[error("enrichment failed for {element} ({node_type}) at line {line}: {reason}")]
    EnhancementFailure {
        element: String,
        node_type: String,
        line: usize,
        reason: String,
    },

    #[error("extension .{extension} reassigned from {previous} to {current}")]
    RegistryConflict {
        extension: String,
        previous: String,
        current: String,
    },
}

/// Failure raised by a semantic enricher for a single element.
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("{node_type} node has no `{field}` field")]
    MissingField {
        node_type: &'static str,
        field: &'static str,
    },

    #[error("node text is not valid UTF-8: {0}")]
    InvalidText(#[from] std::str::Utf8Error),
}
