//! Cross-pipeline reconciliation: mapping records vs. accumulated outputs.
//!
//! A read-only, idempotent pass over the supplied output roots. Every
//! mapping record is probed for an output named `R{respondent_id}-{n}.*`
//! in any root; every output file that corresponds to no record (including
//! all `UNMATCHED_`-prefixed names) is reported as an orphan.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

use intake_mapping::{MappingIndex, canonical_stem};
use intake_shared::{IntakeError, MappingRecord, Result};

use crate::discover::IGNORED_NAMES;

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// Found/missing status of one mapping record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordStatus {
    /// The spreadsheet record.
    pub record: MappingRecord,
    /// First output found for the record's canonical stem, if any.
    pub found: Option<PathBuf>,
}

impl RecordStatus {
    /// Whether no output exists for this record in any root.
    pub fn is_missing(&self) -> bool {
        self.found.is_none()
    }
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    /// One row per mapping record, in registration order.
    pub rows: Vec<RecordStatus>,
    /// Output files corresponding to no mapping record.
    pub orphans: Vec<PathBuf>,
}

impl ReconciliationReport {
    /// Records with at least one output.
    pub fn found_count(&self) -> usize {
        self.rows.iter().filter(|r| !r.is_missing()).count()
    }

    /// Records with no output in any root.
    pub fn missing_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_missing()).count()
    }

    /// Whether every mapping record has an output.
    pub fn is_complete(&self) -> bool {
        self.missing_count() == 0
    }
}

// ---------------------------------------------------------------------------
// Reconcile
// ---------------------------------------------------------------------------

/// Compare the mapping index against the output trees of all pipelines.
#[instrument(skip_all, fields(records = index.len(), roots = output_roots.len()))]
pub fn reconcile(
    index: &MappingIndex,
    output_roots: &[PathBuf],
) -> Result<ReconciliationReport> {
    let outputs = collect_outputs(output_roots)?;

    // Canonical stem → first output carrying it, in deterministic order.
    let mut by_stem: HashMap<String, PathBuf> = HashMap::new();
    for path in &outputs {
        if let Some(stem) = output_stem(path) {
            by_stem.entry(stem).or_insert_with(|| path.clone());
        }
    }

    let rows: Vec<RecordStatus> = index
        .records()
        .iter()
        .map(|record| {
            let stem = canonical_stem(&record.respondent_id, record.column_index);
            RecordStatus {
                record: record.clone(),
                found: by_stem.get(&stem).cloned(),
            }
        })
        .collect();

    let known_stems: std::collections::HashSet<String> = index
        .records()
        .iter()
        .map(|r| canonical_stem(&r.respondent_id, r.column_index))
        .collect();

    let orphans: Vec<PathBuf> = outputs
        .into_iter()
        .filter(|path| {
            output_stem(path)
                .map(|stem| !known_stems.contains(&stem))
                .unwrap_or(true)
        })
        .collect();

    let report = ReconciliationReport { rows, orphans };

    info!(
        found = report.found_count(),
        missing = report.missing_count(),
        orphans = report.orphans.len(),
        "reconciliation complete"
    );

    Ok(report)
}

/// All output files under the given roots, sorted. Forensic logs, partial
/// artifacts, and hidden/system names are not outputs.
fn collect_outputs(roots: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut outputs = Vec::new();

    for root in roots {
        if !root.exists() {
            debug!(root = %root.display(), "output root does not exist, skipping");
            continue;
        }

        for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
            let entry = entry
                .map_err(|e| IntakeError::io(root, std::io::Error::other(e.to_string())))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy();
            if name.starts_with('.') || IGNORED_NAMES.contains(&name.as_ref()) {
                continue;
            }
            let ext = Path::new(name.as_ref())
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            if ext == "jsonl" || ext == "part" || ext == "tmp" {
                continue;
            }

            outputs.push(entry.path().to_path_buf());
        }
    }

    Ok(outputs)
}

/// Stem of an output name up to its first dot (`R42-1.txt` → `R42-1`).
fn output_stem(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_string_lossy();
    match name.split_once('.') {
        Some((stem, _)) if !stem.is_empty() => Some(stem.to_string()),
        _ => Some(name.into_owned()),
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Flat tabular rendering: one `(original-identifier, final/status)` line
/// per record, then orphans.
pub fn render_table(report: &ReconciliationReport) -> String {
    let mut out = String::new();

    for row in &report.rows {
        let status = match &row.found {
            Some(path) => format!("found  {}", path.display()),
            None => "MISSING".to_string(),
        };
        out.push_str(&format!(
            "{}\tFile#{}\t{}\t{status}\n",
            row.record.respondent_id, row.record.column_index, row.record.source_filename,
        ));
    }

    for orphan in &report.orphans {
        out.push_str(&format!("-\t-\t-\torphan {}\n", orphan.display()));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn index_from(content: &str) -> MappingIndex {
        let mut f = tempfile::NamedTempFile::new().expect("temp mapping");
        f.write_all(content.as_bytes()).expect("write mapping");
        MappingIndex::load(f.path(), 20).expect("load")
    }

    #[test]
    fn missing_record_is_reported() {
        let index = index_from(
            "Respondent ID\tFile#1\tFile#2\n\
             X\tfirst.pdf\tsecond.pdf\n",
        );
        let docs = tempfile::tempdir().unwrap();
        std::fs::write(docs.path().join("RX-1.txt"), "text").unwrap();

        let report = reconcile(&index, &[docs.path().to_path_buf()]).unwrap();

        assert_eq!(report.found_count(), 1);
        assert_eq!(report.missing_count(), 1);
        let missing: Vec<_> = report.rows.iter().filter(|r| r.is_missing()).collect();
        assert_eq!(missing[0].record.column_index, 2);
        assert!(!report.is_complete());
    }

    #[test]
    fn outputs_are_found_across_roots_and_extensions() {
        let index = index_from(
            "Respondent ID\tFile#1\tFile#2\n\
             7\tdoc.pdf\tclip.mp3\n",
        );
        let docs = tempfile::tempdir().unwrap();
        let audio = tempfile::tempdir().unwrap();
        std::fs::write(docs.path().join("R7-1.txt"), "text").unwrap();
        std::fs::write(audio.path().join("R7-2.json"), "{}").unwrap();

        let report = reconcile(
            &index,
            &[docs.path().to_path_buf(), audio.path().to_path_buf()],
        )
        .unwrap();

        assert!(report.is_complete());
        assert!(report.orphans.is_empty());
    }

    #[test]
    fn unmatched_outputs_are_orphans() {
        let index = index_from("Respondent ID\tFile#1\n1\tknown.pdf\n");
        let docs = tempfile::tempdir().unwrap();
        std::fs::write(docs.path().join("R1-1.txt"), "text").unwrap();
        std::fs::write(docs.path().join("UNMATCHED_mystery.pdf"), "text").unwrap();
        std::fs::write(docs.path().join("stray.txt"), "text").unwrap();

        let report = reconcile(&index, &[docs.path().to_path_buf()]).unwrap();

        assert!(report.is_complete());
        assert_eq!(report.orphans.len(), 2);
        let names: Vec<_> = report
            .orphans
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert!(names.contains(&"UNMATCHED_mystery.pdf".to_string()));
        assert!(names.contains(&"stray.txt".to_string()));
    }

    #[test]
    fn logs_partials_and_hidden_files_are_not_outputs() {
        let index = index_from("Respondent ID\tFile#1\n1\ta.pdf\n");
        let docs = tempfile::tempdir().unwrap();
        std::fs::write(docs.path().join("forensic-20260101-000000.jsonl"), "{}").unwrap();
        std::fs::write(docs.path().join("R1-1.txt.part"), "half").unwrap();
        std::fs::write(docs.path().join(".DS_Store"), "x").unwrap();

        let report = reconcile(&index, &[docs.path().to_path_buf()]).unwrap();

        assert_eq!(report.missing_count(), 1);
        assert!(report.orphans.is_empty());
    }

    #[test]
    fn pass_is_idempotent() {
        let index = index_from("Respondent ID\tFile#1\n5\ta.pdf\n");
        let docs = tempfile::tempdir().unwrap();
        std::fs::write(docs.path().join("R5-1.txt"), "text").unwrap();
        std::fs::write(docs.path().join("orphan.txt"), "text").unwrap();

        let roots = [docs.path().to_path_buf()];
        let first = reconcile(&index, &roots).unwrap();
        let second = reconcile(&index, &roots).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_root_is_tolerated() {
        let index = index_from("Respondent ID\tFile#1\n5\ta.pdf\n");
        let report =
            reconcile(&index, &[PathBuf::from("/nonexistent/outputs")]).unwrap();
        assert_eq!(report.missing_count(), 1);
    }

    #[test]
    fn table_rendering_lists_rows_and_orphans() {
        let index = index_from("Respondent ID\tFile#1\tFile#2\nX\ta.pdf\tb.pdf\n");
        let docs = tempfile::tempdir().unwrap();
        std::fs::write(docs.path().join("RX-1.txt"), "text").unwrap();
        std::fs::write(docs.path().join("UNMATCHED_c.pdf"), "text").unwrap();

        let report = reconcile(&index, &[docs.path().to_path_buf()]).unwrap();
        let table = render_table(&report);

        assert!(table.contains("X\tFile#1\ta.pdf\tfound"));
        assert!(table.contains("X\tFile#2\tb.pdf\tMISSING"));
        assert!(table.contains("orphan"));
        assert!(table.contains("UNMATCHED_c.pdf"));
    }
}
