//! The shared per-artifact run loop.
//!
//! All three pipelines execute the same pass: resolve identity, decide via
//! the ledger, delegate to the content engine, write the output atomically,
//! and record exactly one forensic entry per artifact regardless of outcome.
//! Only a mapping load failure or destination I/O aborts the run; every
//! other condition is isolated to its artifact.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use intake_engines::{ArtifactSource, ContentEngine, Extracted, Extraction, name_extension};
use intake_forensic::{ForensicEntry, ForensicLogger};
use intake_mapping::{
    MappingIndex, canonical_output_name, preserved_output_name, resolve, sanitize_name,
};
use intake_shared::{IntakeError, Outcome, ResolvedIdentity, Result, RunId};

use crate::discover::InputArtifact;
use crate::ledger::{Decision, should_process};

// ---------------------------------------------------------------------------
// Config & summary
// ---------------------------------------------------------------------------

/// Configuration shared by every pipeline invocation.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Destination directory for outputs. Must be creatable/writable;
    /// anything else aborts the run before any artifact is touched.
    pub output_dir: PathBuf,
    /// Forensic log directory for this pipeline.
    pub log_dir: PathBuf,
    /// Mapping spreadsheet; without one every artifact is unmatched.
    pub mapping_path: Option<PathBuf>,
    /// Highest `File#n` column scanned.
    pub max_file_columns: u32,
    /// Reprocess even when a well-formed output exists.
    pub force: bool,
    /// Rename outputs to their canonical identity. When disabled the
    /// original stem is preserved and only the forensic log records the
    /// intended identity.
    pub rename_enabled: bool,
}

/// Counts for one invocation.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Outputs written (or work staged by a deferring engine).
    pub processed: usize,
    /// Deferred engine outcomes (no output this run), included in `processed`.
    pub deferred: usize,
    /// Well-formed outputs already in place.
    pub skipped_existing: usize,
    /// Hidden/system files logged and left alone.
    pub skipped_hidden: usize,
    /// Artifacts that fell back to the unmatched identity.
    pub unmatched: usize,
    /// Per-artifact engine failures.
    pub errors: usize,
    /// Canonical output name collisions.
    pub collisions: usize,
    /// Wall time for the pass.
    pub elapsed: std::time::Duration,
    /// Session forensic log path.
    pub log_path: PathBuf,
}

impl RunSummary {
    /// Whether the process exit status must be nonzero.
    pub fn failed(&self) -> bool {
        self.errors > 0 || self.collisions > 0
    }
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

/// Run one pipeline pass over already-discovered artifacts.
///
/// Builds the mapping index, surfaces its key conflicts through the
/// forensic log, then walks the artifact list sequentially.
#[instrument(skip_all, fields(output = %config.output_dir.display(), artifacts = artifacts.len()))]
pub async fn run_pipeline(
    config: &PipelineConfig,
    artifacts: &[InputArtifact],
    engine: &dyn ContentEngine,
) -> Result<RunSummary> {
    let start = Instant::now();

    std::fs::create_dir_all(&config.output_dir)
        .map_err(|e| IntakeError::io(&config.output_dir, e))?;

    let index = match &config.mapping_path {
        Some(path) => MappingIndex::load(path, config.max_file_columns)?,
        None => {
            warn!("no mapping file supplied, every artifact will be unmatched");
            MappingIndex::default()
        }
    };

    let mut logger = ForensicLogger::open(&config.log_dir, RunId::new())?;
    let run_id = logger.run_id().clone();

    for conflict in index.conflicts() {
        logger.anomaly(
            "mapping_conflict",
            serde_json::json!({
                "key": conflict.key,
                "kept": conflict.kept,
                "rejected": conflict.rejected,
            }),
        )?;
    }

    info!(
        engine = engine.label(),
        mapping_records = index.len(),
        conflicts = index.conflicts().len(),
        force = config.force,
        rename = config.rename_enabled,
        "starting pipeline pass"
    );

    let mut summary = RunSummary {
        log_path: logger.path().to_path_buf(),
        ..RunSummary::default()
    };
    // Canonical/final names claimed so far this run → claiming artifact.
    let mut assigned: HashMap<String, String> = HashMap::new();

    for artifact in artifacts {
        if artifact.hidden {
            let mut entry = ForensicEntry::new(&run_id, &artifact.name, Outcome::SkippedHidden);
            entry.probe = artifact.probe.clone();
            logger.record(entry)?;
            summary.skipped_hidden += 1;
            continue;
        }

        // Files the engine does not handle never enter the artifact set.
        if let ArtifactSource::File(_) = &artifact.source {
            let supported = name_extension(&artifact.name)
                .is_some_and(|ext| engine.supports(&ext));
            if !supported {
                debug!(name = %artifact.name, "unsupported file format, skipping");
                continue;
            }
        }

        let identity = resolve_identity(artifact, &index);
        if identity.is_unmatched() {
            summary.unmatched += 1;
        }

        let canonical = canonical_output_name(&identity, engine.output_ext());
        let final_name = if config.rename_enabled {
            canonical.clone()
        } else {
            let stem_source = artifact
                .lookup_names
                .last()
                .map(String::as_str)
                .unwrap_or(&artifact.name);
            preserved_output_name(stem_source, engine.output_ext())
        };

        if let Some(first) = assigned.get(&final_name) {
            warn!(
                name = %artifact.name,
                %final_name,
                first = %first,
                "output collision, neither artifact overwritten"
            );
            logger.anomaly(
                "output_collision",
                serde_json::json!({
                    "output_name": final_name,
                    "first": first,
                    "second": artifact.name,
                }),
            )?;
            let mut entry = ForensicEntry::new(&run_id, &artifact.name, Outcome::Collision);
            entry.identity = Some(identity);
            entry.canonical_name = Some(canonical);
            entry.final_name = Some(final_name);
            entry.error = Some(format!("canonical output name already claimed by {first}"));
            entry.probe = artifact.probe.clone();
            logger.record(entry)?;
            summary.collisions += 1;
            continue;
        }
        assigned.insert(final_name.clone(), artifact.name.clone());

        let expected = config.output_dir.join(&final_name);

        if should_process(&expected, config.force) == Decision::Skip {
            let mut entry =
                ForensicEntry::new(&run_id, &artifact.name, Outcome::SkippedDuplicateOutput);
            entry.identity = Some(identity);
            entry.canonical_name = Some(canonical);
            entry.final_name = Some(final_name);
            entry.probe = artifact.probe.clone();
            logger.record(entry)?;
            summary.skipped_existing += 1;
            continue;
        }

        match engine.process(&artifact.source) {
            Ok(Extraction::Text(extracted)) => {
                logger.warnings(&artifact.name, &extracted.warnings);

                let payload = render_payload(engine, artifact, &identity, &extracted);
                write_atomic(&expected, payload.as_bytes())?;

                let mut entry = ForensicEntry::new(&run_id, &artifact.name, Outcome::Processed);
                entry.identity = Some(identity);
                entry.canonical_name = Some(canonical);
                entry.final_name = Some(final_name);
                entry.probe = artifact.probe.clone();
                entry.output_sha256 = Some(sha256_hex(payload.as_bytes()));
                logger.record(entry)?;
                summary.processed += 1;
            }
            Ok(Extraction::Deferred { note }) => {
                let mut entry = ForensicEntry::new(&run_id, &artifact.name, Outcome::Processed);
                entry.identity = Some(identity);
                entry.canonical_name = Some(canonical);
                entry.warnings.push(note);
                entry.probe = artifact.probe.clone();
                logger.record(entry)?;
                summary.processed += 1;
                summary.deferred += 1;
            }
            Err(e) => {
                warn!(name = %artifact.name, error = %e, "content engine failed, continuing");
                let mut entry = ForensicEntry::new(&run_id, &artifact.name, Outcome::Error);
                entry.identity = Some(identity);
                entry.canonical_name = Some(canonical);
                entry.final_name = Some(final_name);
                entry.error = Some(e.to_string());
                entry.probe = artifact.probe.clone();
                logger.record(entry)?;
                summary.errors += 1;
            }
        }
    }

    summary.elapsed = start.elapsed();

    info!(
        processed = summary.processed,
        skipped_existing = summary.skipped_existing,
        skipped_hidden = summary.skipped_hidden,
        unmatched = summary.unmatched,
        errors = summary.errors,
        collisions = summary.collisions,
        elapsed_ms = summary.elapsed.as_millis(),
        "pipeline pass complete"
    );

    Ok(summary)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Try each lookup name in order; the first match wins. The unmatched
/// fallback carries the last lookup name's sanitized form (for links that
/// is the synthetic `youtube_<id>.json` name).
fn resolve_identity(artifact: &InputArtifact, index: &MappingIndex) -> ResolvedIdentity {
    let mut fallback = None;
    for name in &artifact.lookup_names {
        let identity = resolve(name, index);
        if !identity.is_unmatched() {
            return identity;
        }
        fallback = Some(identity);
    }

    fallback.unwrap_or_else(|| ResolvedIdentity::Unmatched {
        sanitized: sanitize_name(&artifact.name),
    })
}

/// Serialize the output payload: raw text for document outputs, a
/// transcript JSON document for transcription outputs.
fn render_payload(
    engine: &dyn ContentEngine,
    artifact: &InputArtifact,
    identity: &ResolvedIdentity,
    extracted: &Extracted,
) -> String {
    if engine.output_ext() != "json" {
        return extracted.text.clone();
    }

    let filetype = match &artifact.source {
        ArtifactSource::File(_) => name_extension(&artifact.name).unwrap_or_default(),
        ArtifactSource::Url(_) => "youtube".to_string(),
    };

    let mut doc = serde_json::json!({
        "text": extracted.text,
        "filename": artifact.name,
        "filetype": filetype,
        "extracted_at": chrono::Utc::now(),
    });
    if let ResolvedIdentity::Matched {
        respondent_id,
        column_index,
    } = identity
    {
        doc["respondent_id"] = serde_json::json!(respondent_id);
        doc["file_column"] = serde_json::json!(column_index);
    }

    serde_json::to_string_pretty(&doc).expect("json document serializes")
}

/// Write bytes to a `.part` sibling and atomically rename into place, so a
/// crash mid-write leaves only an artifact the ledger will not accept.
fn write_atomic(target: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| IntakeError::validation(format!("bad output path: {}", target.display())))?;
    let tmp = target.with_file_name(format!("{file_name}.part"));

    std::fs::write(&tmp, bytes).map_err(|e| IntakeError::io(&tmp, e))?;
    std::fs::rename(&tmp, target).map_err(|e| IntakeError::io(target, e))?;
    Ok(())
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
