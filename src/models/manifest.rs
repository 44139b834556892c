//! Extraction manifest: the JSON the external service returns.
//!
//! The service keys everything by human-authored text (question number and
//! sub-question text) because it never sees internal identifiers — it only
//! echoes back the skeleton it was given.

use serde::Deserialize;

use crate::{AppError, Result};

/// The student's extracted answer for one sub-question.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ManifestAnswer {
    /// Transcribed answer text.
    #[serde(default)]
    pub answer_text: Option<String>,
    /// Bare filename of a cropped visual inside the archive, if any.
    #[serde(default)]
    pub answer_visual: Option<String>,
}

/// One sub-question as echoed back by the service.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ManifestSubQuestion {
    /// Exact sub-question text the skeleton carried.
    pub sub_q_text_content: String,
    /// Extracted answer; absent when the student left it blank.
    #[serde(default)]
    pub student_answers: Option<ManifestAnswer>,
}

/// One question as echoed back by the service.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ManifestQuestion {
    /// Question number the skeleton carried.
    pub question_number: i64,
    /// Sub-questions under this number.
    #[serde(default)]
    pub sub_questions: Vec<ManifestSubQuestion>,
}

/// Top-level manifest document.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ExtractionManifest {
    /// Extracted questions; may be empty when nothing was transcribed.
    #[serde(default)]
    pub questions: Vec<ManifestQuestion>,
}

impl ExtractionManifest {
    /// Parse manifest JSON.
    ///
    /// The service sometimes wraps the document in a one-element array; the
    /// first element is used in that case.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Format` when the payload is not valid manifest JSON.
    pub fn from_json_slice(raw: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(raw)
            .map_err(|err| AppError::Format(format!("manifest is not valid JSON: {err}")))?;
        let document = match value {
            serde_json::Value::Array(mut items) if !items.is_empty() => items.remove(0),
            serde_json::Value::Array(_) => {
                return Err(AppError::Format("manifest array is empty".into()));
            }
            other => other,
        };
        serde_json::from_value(document)
            .map_err(|err| AppError::Format(format!("manifest shape mismatch: {err}")))
    }
}
