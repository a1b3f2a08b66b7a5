//! Input artifact discovery.
//!
//! Directory scans walk recursively in a deterministic order. A small fixed
//! set of OS metadata names is dropped silently (no forensic entry at all);
//! other dotfiles are surfaced as hidden so the run loop can log the skip.

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use walkdir::WalkDir;

use intake_engines::ArtifactSource;
use intake_shared::{ArtifactKind, ArtifactProbe, IntakeError, Result};

use crate::ledger::probe_artifact;

/// Names dropped during discovery with no forensic entry at all.
pub const IGNORED_NAMES: &[&str] = &[".DS_Store", "Thumbs.db", ".gitkeep"];

// ---------------------------------------------------------------------------
// InputArtifact
// ---------------------------------------------------------------------------

/// One discovered input: a file under an input directory or a URL from a
/// links file.
#[derive(Debug, Clone)]
pub struct InputArtifact {
    /// What the engine will be handed.
    pub source: ArtifactSource,
    /// Name as discovered — file name, or the raw URL for links. This is
    /// the `original_name` recorded in forensic entries.
    pub name: String,
    /// Names tried against the mapping index, in order. For files this is
    /// the file name; links also try their synthetic `youtube_<id>.json`
    /// name so caption outputs inherit a stable identity.
    pub lookup_names: Vec<String>,
    /// Type tag.
    pub kind: ArtifactKind,
    /// Hidden-file convention (leading dot): logged as skipped, never
    /// renamed, never passed to an engine.
    pub hidden: bool,
    /// Size/mtime fingerprint at discovery time (files only).
    pub probe: Option<ArtifactProbe>,
    /// When discovery saw this artifact.
    pub discovered_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Directory scan
// ---------------------------------------------------------------------------

/// Recursively discover files under `root`, sorted by path for
/// deterministic processing order. A missing root yields an empty set (the
/// media pipeline tolerates an absent audio or video directory).
pub fn scan_directory(root: &Path, kind: ArtifactKind) -> Result<Vec<InputArtifact>> {
    if !root.exists() {
        warn!(root = %root.display(), "input directory does not exist, nothing to scan");
        return Ok(Vec::new());
    }

    let mut artifacts = Vec::new();

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            IntakeError::io(root, std::io::Error::other(e.to_string()))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();

        if IGNORED_NAMES.contains(&name.as_str()) {
            debug!(%name, "ignoring OS metadata file");
            continue;
        }

        let path = entry.path().to_path_buf();
        artifacts.push(InputArtifact {
            probe: probe_artifact(&path),
            source: ArtifactSource::File(path),
            lookup_names: vec![name.clone()],
            hidden: name.starts_with('.'),
            name,
            kind,
            discovered_at: Utc::now(),
        });
    }

    debug!(root = %root.display(), count = artifacts.len(), "directory scan complete");
    Ok(artifacts)
}

// ---------------------------------------------------------------------------
// Links file
// ---------------------------------------------------------------------------

/// Read YouTube links: one URL per line, or the first column of a delimited
/// export (header lines that are not URLs are skipped). Lines that do not
/// yield a recognizable video id are kept — the engine reports them as
/// per-artifact errors so they appear in the forensic log.
pub fn read_links(path: &Path) -> Result<Vec<InputArtifact>> {
    let content = std::fs::read_to_string(path).map_err(|e| IntakeError::io(path, e))?;

    let mut artifacts = Vec::new();

    for line in content.lines() {
        let first_field = line
            .split(['\t', ','])
            .next()
            .unwrap_or_default()
            .trim()
            .trim_matches('"');

        if first_field.is_empty() {
            continue;
        }
        if !first_field.starts_with("http://") && !first_field.starts_with("https://") {
            debug!(line = %first_field, "skipping non-URL line in links file");
            continue;
        }

        let url = first_field.to_string();
        let mut lookup_names = vec![url.clone()];
        if let Some(id) = intake_engines::video_id(&url) {
            lookup_names.push(format!("youtube_{id}.json"));
        }

        artifacts.push(InputArtifact {
            source: ArtifactSource::Url(url.clone()),
            name: url,
            lookup_names,
            kind: ArtifactKind::YoutubeLink,
            hidden: false,
            probe: None,
            discovered_at: Utc::now(),
        });
    }

    debug!(path = %path.display(), count = artifacts.len(), "links file read");
    Ok(artifacts)
}
