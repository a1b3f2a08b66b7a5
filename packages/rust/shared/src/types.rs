//! Core domain types shared by the intake pipelines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline invocation (time-sortable).
///
/// Stamped into every forensic entry so records from interleaved runs over
/// the same log directory remain attributable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// MappingRecord
// ---------------------------------------------------------------------------

/// One respondent/file-slot pair from the mapping spreadsheet.
///
/// A spreadsheet row yields one record per non-empty `File#n` column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRecord {
    /// Stable respondent identifier, as authored in the spreadsheet.
    pub respondent_id: String,
    /// 1-based `File#n` slot this filename occupies.
    pub column_index: u32,
    /// Source filename exactly as authored (may contain spaces).
    pub source_filename: String,
}

// ---------------------------------------------------------------------------
// ArtifactKind
// ---------------------------------------------------------------------------

/// Type tag for a discovered input artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    Document,
    Audio,
    Video,
    YoutubeLink,
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Document => "document",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::YoutubeLink => "youtube-link",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ResolvedIdentity
// ---------------------------------------------------------------------------

/// The canonical identity assigned to one artifact by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolvedIdentity {
    /// The artifact name matched a mapping record.
    Matched {
        respondent_id: String,
        column_index: u32,
    },
    /// No mapping key matched; `sanitized` is a filesystem-safe form of
    /// the original name.
    Unmatched { sanitized: String },
}

impl ResolvedIdentity {
    /// Whether this identity fell back to the unmatched marker.
    pub fn is_unmatched(&self) -> bool {
        matches!(self, Self::Unmatched { .. })
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Terminal state of one artifact within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    /// A content engine ran and an output was written.
    Processed,
    /// Hidden/system file convention; never renamed, never handed to an engine.
    SkippedHidden,
    /// A well-formed output already existed and force was not set.
    SkippedDuplicateOutput,
    /// The content engine failed; the batch continued.
    Error,
    /// Two source artifacts claimed the same canonical output name.
    Collision,
}

impl Outcome {
    /// Whether this outcome must make the process exit status nonzero.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Error | Self::Collision)
    }
}

// ---------------------------------------------------------------------------
// ArtifactProbe
// ---------------------------------------------------------------------------

/// Stable fingerprint of an input artifact: path identity plus size and
/// modification time. Recorded in forensic entries; never persisted as a
/// journal — idempotency decisions are re-derived from the filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactProbe {
    /// Artifact size in bytes.
    pub size: u64,
    /// Modification time, if the filesystem reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
}
