//! Structured extraction: turns resume text into the fixed JSON shape via the LLM.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::ingest::prompts::system_prompt;
use crate::llm_client::{strip_json_fences, ChatCompletion, LlmError};

/// Raw model output is cut to this many characters in logs.
const RAW_LOG_LIMIT: usize = 2000;
const EXPECTED_SKILLS: std::ops::RangeInclusive<usize> = 5..=10;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("language model call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("model output is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("model output has the wrong shape: {0}")]
    Shape(String),
}

/// The model's structured view of one resume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredExtraction {
    #[serde(default, deserialize_with = "null_as_default")]
    pub work_experience: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub skills: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub suggestions: Option<Vec<String>>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl StructuredExtraction {
    fn normalize(&mut self) {
        clean_entries(&mut self.work_experience);
        clean_entries(&mut self.skills);
        clean_entries(&mut self.tags);
        if let Some(suggestions) = self.suggestions.as_mut() {
            clean_entries(suggestions);
        }
        self.summary = self.summary.trim().to_string();
    }
}

fn clean_entries(entries: &mut Vec<String>) {
    for entry in entries.iter_mut() {
        let trimmed = entry.trim();
        if trimmed.len() != entry.len() {
            *entry = trimmed.to_string();
        }
    }
    entries.retain(|e| !e.is_empty());
}

/// Parses and shape-checks model output. Code fences are tolerated; anything other
/// than an object with string / string-array fields is rejected.
pub fn parse_structured(raw: &str) -> Result<StructuredExtraction, ExtractionError> {
    let body = strip_json_fences(raw);
    let value: Value = serde_json::from_str(body).map_err(ExtractionError::InvalidJson)?;

    if !value.is_object() {
        return Err(ExtractionError::Shape(format!(
            "expected a JSON object, got {}",
            json_kind(&value)
        )));
    }

    let mut extraction: StructuredExtraction =
        serde_json::from_value(value).map_err(|e| ExtractionError::Shape(e.to_string()))?;
    extraction.normalize();
    Ok(extraction)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Cuts `text` to at most `max_chars` characters on a char boundary.
/// Returns the kept slice and whether anything was dropped.
pub fn truncate_input(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (&text[..byte_idx], true),
        None => (text, false),
    }
}

fn skill_count_expected(count: usize) -> bool {
    EXPECTED_SKILLS.contains(&count)
}

/// Runs the structured-extraction call for one document. No retry here beyond the
/// client's single transient retry; parse failures are final.
pub async fn extract_structure(
    llm: &dyn ChatCompletion,
    text: &str,
    max_input_chars: usize,
    request_suggestions: bool,
) -> Result<StructuredExtraction, ExtractionError> {
    let (input, truncated) = truncate_input(text, max_input_chars);
    if truncated {
        warn!(
            "Resume text truncated from {} to {} characters before extraction",
            text.chars().count(),
            max_input_chars
        );
    }

    let raw = llm
        .complete_json(system_prompt(request_suggestions), input)
        .await?;

    let mut extraction = parse_structured(&raw).map_err(|e| {
        let (shown, cut) = truncate_input(&raw, RAW_LOG_LIMIT);
        error!(
            "Rejected model output ({e}); raw content{}: {shown}",
            if cut { " (truncated)" } else { "" }
        );
        e
    })?;

    if !request_suggestions && extraction.suggestions.take().is_some() {
        debug!("Discarding suggestions the model returned unasked");
    }

    if !skill_count_expected(extraction.skills.len()) {
        warn!(
            "Model returned {} skills, expected {}-{}",
            extraction.skills.len(),
            EXPECTED_SKILLS.start(),
            EXPECTED_SKILLS.end()
        );
    }

    Ok(extraction)
}
