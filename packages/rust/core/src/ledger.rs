//! Filesystem-derived idempotency decisions.
//!
//! No journal is kept: whether an artifact's work is already done is
//! re-derived from the expected output's presence and shape every run.
//! A crash that leaves a half-written `.part` file behind fails the
//! well-formed check and the artifact is simply reprocessed next run.
//! The documented cost of this design is that a corrupted but
//! superficially valid prior output (present, non-empty) is treated as
//! complete — and that a legitimately empty output is indistinguishable
//! from no output.

use std::path::Path;

use chrono::{DateTime, Utc};

use intake_shared::ArtifactProbe;

/// Whether an artifact's content work must run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// No satisfactory output exists (or force was requested).
    Process,
    /// A well-formed output is already in place.
    Skip,
}

/// Decide whether processing may be skipped for one artifact.
///
/// Pure function of the filesystem state at `expected_output` and the
/// `force` flag; `force` always wins.
pub fn should_process(expected_output: &Path, force: bool) -> Decision {
    if force {
        return Decision::Process;
    }
    if output_is_well_formed(expected_output) {
        Decision::Skip
    } else {
        Decision::Process
    }
}

/// A prior output satisfies the request iff it exists as a regular file,
/// is non-empty, and is not a partial/temp artifact.
pub fn output_is_well_formed(path: &Path) -> bool {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if ext == "part" || ext == "tmp" {
        return false;
    }

    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.len() > 0,
        Err(_) => false,
    }
}

/// Fingerprint an input artifact: size plus modification time. Returns
/// `None` when the file cannot be stat'ed (it may have vanished between
/// discovery and processing).
pub fn probe_artifact(path: &Path) -> Option<ArtifactProbe> {
    let meta = std::fs::metadata(path).ok()?;
    let modified = meta
        .modified()
        .ok()
        .map(|t| DateTime::<Utc>::from(t));

    Some(ArtifactProbe {
        size: meta.len(),
        modified,
    })
}
