//! Append-only forensic audit log.
//!
//! One JSON Lines file per pipeline invocation, one record per artifact per
//! run. Entries are flushed eagerly — a later failure in the same run can
//! never lose an entry that was already recorded — and are never mutated or
//! deleted by normal operation.
//!
//! The forensic log is a durable artifact, distinct from diagnostic
//! `tracing` output: it is what an auditor reads to learn how every
//! artifact was identified and what happened to it.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use intake_shared::{ArtifactProbe, IntakeError, Outcome, ResolvedIdentity, Result, RunId};

// ---------------------------------------------------------------------------
// ForensicEntry
// ---------------------------------------------------------------------------

/// One durable record: how an artifact was identified and what happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForensicEntry {
    /// When the decision was recorded.
    pub timestamp: DateTime<Utc>,
    /// The invocation this record belongs to.
    pub run_id: RunId,
    /// Artifact name exactly as discovered.
    pub original_name: String,
    /// Resolved identity; absent for hidden/system skips, which are never
    /// resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<ResolvedIdentity>,
    /// Deterministic canonical output name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_name: Option<String>,
    /// Name actually written (differs from canonical when renaming is
    /// disabled).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_name: Option<String>,
    /// Terminal state of the artifact in this run.
    pub outcome: Outcome,
    /// Advisory findings attached by content engines (e.g. macro detected).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Error detail for `error`/`collision` outcomes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Input artifact fingerprint at decision time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe: Option<ArtifactProbe>,
    /// SHA-256 of the written output, when one was produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_sha256: Option<String>,
}

impl ForensicEntry {
    /// Start an entry for one artifact with the fields every record carries.
    pub fn new(run_id: &RunId, original_name: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            timestamp: Utc::now(),
            run_id: run_id.clone(),
            original_name: original_name.into(),
            identity: None,
            canonical_name: None,
            final_name: None,
            outcome,
            warnings: Vec::new(),
            error: None,
            probe: None,
            output_sha256: None,
        }
    }
}

// ---------------------------------------------------------------------------
// ForensicLogger
// ---------------------------------------------------------------------------

/// Append-only writer for forensic entries. Single writer per process;
/// each pipeline owns its own log path, so there is no cross-process
/// contention.
pub struct ForensicLogger {
    run_id: RunId,
    path: PathBuf,
    file: File,
    pending_warnings: HashMap<String, Vec<String>>,
}

impl ForensicLogger {
    /// Open a fresh session log `forensic-<UTC timestamp>.jsonl` under `dir`,
    /// creating the directory if needed. Appends if the file already exists
    /// (two sessions within the same second); entries stay attributable via
    /// their run id.
    pub fn open(dir: &Path, run_id: RunId) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| IntakeError::io(dir, e))?;

        let session = Utc::now().format("%Y%m%d-%H%M%S");
        let path = dir.join(format!("forensic-{session}.jsonl"));

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| IntakeError::io(&path, e))?;

        tracing::debug!(path = %path.display(), %run_id, "forensic log opened");

        Ok(Self {
            run_id,
            path,
            file,
            pending_warnings: HashMap::new(),
        })
    }

    /// Path of the session log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The run this logger stamps into every entry.
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Buffer advisory findings for an artifact. External content engines
    /// call this (through the pipeline) to attach findings to the
    /// artifact's entry without owning the log format; the findings are
    /// drained into the next [`record`](Self::record) for that name.
    pub fn warnings(&mut self, original_name: &str, findings: &[String]) {
        if findings.is_empty() {
            return;
        }
        self.pending_warnings
            .entry(original_name.to_string())
            .or_default()
            .extend(findings.iter().cloned());
    }

    /// Append one entry and flush immediately.
    pub fn record(&mut self, mut entry: ForensicEntry) -> Result<()> {
        if let Some(buffered) = self.pending_warnings.remove(&entry.original_name) {
            entry.warnings.extend(buffered);
        }

        let line = serde_json::to_string(&entry)
            .map_err(|e| IntakeError::validation(format!("unserializable entry: {e}")))?;

        writeln!(self.file, "{line}").map_err(|e| IntakeError::io(&self.path, e))?;
        self.file.flush().map_err(|e| IntakeError::io(&self.path, e))?;
        Ok(())
    }

    /// Append a non-artifact event (e.g. a mapping-key conflict) as its own
    /// durable line, outside the per-artifact entry schema.
    pub fn anomaly(&mut self, kind: &str, detail: serde_json::Value) -> Result<()> {
        let line = serde_json::json!({
            "timestamp": Utc::now(),
            "run_id": self.run_id,
            "anomaly": kind,
            "detail": detail,
        });

        writeln!(self.file, "{line}").map_err(|e| IntakeError::io(&self.path, e))?;
        self.file.flush().map_err(|e| IntakeError::io(&self.path, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_lines(path: &Path) -> Vec<serde_json::Value> {
        std::fs::read_to_string(path)
            .expect("read log")
            .lines()
            .map(|l| serde_json::from_str(l).expect("valid json line"))
            .collect()
    }

    #[test]
    fn records_are_appended_and_flushed_eagerly() {
        let dir = tempfile::tempdir().expect("tempdir");
        let run_id = RunId::new();
        let mut logger = ForensicLogger::open(dir.path(), run_id.clone()).expect("open");

        logger
            .record(ForensicEntry::new(&run_id, "a.pdf", Outcome::Processed))
            .expect("record");

        // Visible on disk before the logger is dropped.
        let lines = read_lines(logger.path());
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["original_name"], "a.pdf");
        assert_eq!(lines[0]["outcome"], "processed");

        logger
            .record(ForensicEntry::new(&run_id, "b.pdf", Outcome::SkippedHidden))
            .expect("record");
        assert_eq!(read_lines(logger.path()).len(), 2);
    }

    #[test]
    fn buffered_warnings_attach_to_matching_entry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let run_id = RunId::new();
        let mut logger = ForensicLogger::open(dir.path(), run_id.clone()).expect("open");

        logger.warnings("macro.docx", &["macro payload detected".to_string()]);

        // Unrelated entry does not pick up the findings.
        logger
            .record(ForensicEntry::new(&run_id, "clean.pdf", Outcome::Processed))
            .expect("record");

        logger
            .record(ForensicEntry::new(&run_id, "macro.docx", Outcome::Processed))
            .expect("record");

        let lines = read_lines(logger.path());
        assert!(lines[0].get("warnings").is_none());
        assert_eq!(lines[1]["warnings"][0], "macro payload detected");
    }

    #[test]
    fn anomaly_lines_carry_kind_and_detail() {
        let dir = tempfile::tempdir().expect("tempdir");
        let run_id = RunId::new();
        let mut logger = ForensicLogger::open(dir.path(), run_id).expect("open");

        logger
            .anomaly(
                "mapping_conflict",
                serde_json::json!({"key": "shared.pdf", "kept": "1", "rejected": "2"}),
            )
            .expect("anomaly");

        let lines = read_lines(logger.path());
        assert_eq!(lines[0]["anomaly"], "mapping_conflict");
        assert_eq!(lines[0]["detail"]["key"], "shared.pdf");
    }

    #[test]
    fn entry_roundtrips_through_json() {
        let run_id = RunId::new();
        let mut entry = ForensicEntry::new(&run_id, "x.pdf", Outcome::Error);
        entry.identity = Some(ResolvedIdentity::Unmatched {
            sanitized: "x.pdf".into(),
        });
        entry.error = Some("engine exited 1".into());

        let parsed: ForensicEntry =
            serde_json::from_str(&serde_json::to_string(&entry).unwrap()).unwrap();
        assert_eq!(parsed.original_name, "x.pdf");
        assert_eq!(parsed.outcome, Outcome::Error);
        assert_eq!(parsed.error.as_deref(), Some("engine exited 1"));
    }
}
