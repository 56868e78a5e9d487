use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use strum_macros::Display;

/// A discovered fixture file, relative to the input root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FixtureFile {
    /// Path relative to the input root, always `/`-separated.
    pub relative_path: String,
    /// Absolute (or cwd-relative) path used for reading.
    pub full_path: PathBuf,
}

/// One named serialized value out of a fixture file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub name: String,
    pub raw: String,
}

/// A parsed snapshot entry, tagged with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedPayload {
    pub category: String,
    pub snapshot_name: String,
    pub source_file: String,
    pub value: Value,
}

/// The render-service input: always `{ "attachments": [...] }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedMessage(pub Value);

impl NormalizedMessage {
    pub fn to_json(&self) -> String {
        self.0.to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderJob {
    pub output_path: PathBuf,
    pub message: NormalizedMessage,
    /// `<file> [<snapshot name>]`, used in logs and collision reports.
    pub origin: String,
}

/// Bounding box of an element in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
pub struct ClipRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ClipRect {
    pub fn padded(self, padding: f64) -> Self {
        Self {
            x: self.x - padding,
            y: self.y - padding,
            width: self.width + padding * 2.0,
            height: self.height + padding * 2.0,
        }
    }
}

/// Per-job render lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum JobState {
    Pending,
    Submitted,
    Rendered,
    TimedOut,
    Failed,
    Retrying,
    FatalFailed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Rendered | Self::FatalFailed)
    }
}
