//! Ask log: one JSONL line per `grk ask`, stored in `.grounded/asks.jsonl`.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::GrkError;
use crate::response::{GroundedAnswer, Usage};

/// One answered (or unanswerable) question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskLogEntry {
    pub timestamp: DateTime<Utc>,
    pub question: String,
    /// Scan the answer was grounded on.
    pub scan_id: String,
    pub chunk_count: usize,
    pub confidence: String,
    pub confidence_score: f64,
    #[serde(default)]
    pub insufficient_context: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(default)]
    pub usage: AskLogUsage,
}

/// Usage counters as stored in the log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AskLogUsage {
    pub referenced_chunks: usize,
    pub snippets: usize,
    pub prompt_chars: usize,
    pub completion_chars: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,
}

impl From<&Usage> for AskLogUsage {
    fn from(usage: &Usage) -> Self {
        Self {
            referenced_chunks: usage.referenced_chunks,
            snippets: usage.snippets,
            prompt_chars: usage.prompt_chars,
            completion_chars: usage.completion_chars,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        }
    }
}

impl AskLogEntry {
    pub fn new(question: impl Into<String>, scan_id: impl Into<String>, answer: &GroundedAnswer) -> Self {
        Self {
            timestamp: Utc::now(),
            question: question.into(),
            scan_id: scan_id.into(),
            chunk_count: answer.usage.chunks,
            confidence: answer.confidence.to_string(),
            confidence_score: answer.confidence_score,
            insufficient_context: answer.insufficient_context,
            model_id: answer.model_id.clone(),
            usage: AskLogUsage::from(&answer.usage),
        }
    }
}

/// Append an entry, creating the file if needed.
pub fn append_ask_log(path: &Path, entry: &AskLogEntry) -> Result<(), GrkError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| GrkError::LogIoError {
            path: parent.to_path_buf(),
            reason: format!("Failed to create log directory: {}", e),
        })?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| GrkError::LogIoError {
            path: path.to_path_buf(),
            reason: format!("Failed to open ask log: {}", e),
        })?;

    let json = serde_json::to_string(entry).map_err(|e| GrkError::LogIoError {
        path: path.to_path_buf(),
        reason: format!("Failed to serialize ask log entry: {}", e),
    })?;

    writeln!(file, "{}", json).map_err(|e| GrkError::LogIoError {
        path: path.to_path_buf(),
        reason: format!("Failed to write ask log entry: {}", e),
    })
}

/// Read every entry. A missing log is empty; malformed lines are skipped.
pub fn read_ask_log(path: &Path) -> Result<Vec<AskLogEntry>, GrkError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path).map_err(|e| GrkError::LogIoError {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut entries = Vec::new();
    for (line_num, line_result) in BufReader::new(file).lines().enumerate() {
        let line = line_result.map_err(|e| GrkError::LogIoError {
            path: path.to_path_buf(),
            reason: format!("Failed to read line {}: {}", line_num + 1, e),
        })?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<AskLogEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(e) => tracing::warn!(
                "Skipping malformed ask log line {} in {}: {}",
                line_num + 1,
                path.display(),
                e
            ),
        }
    }
    Ok(entries)
}
