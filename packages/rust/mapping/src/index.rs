//! Spreadsheet loading and the normalized-key lookup structure.
//!
//! Built once per pipeline invocation and discarded at the end — the index
//! is never persisted, so it always reflects the current spreadsheet. It is
//! immutable after construction and passed by reference to the resolver and
//! the reconciliation pass.

use std::collections::HashMap;
use std::path::Path;

use regex::Regex;
use tracing::{debug, info, warn};

use intake_shared::{IntakeError, MappingRecord, Result};

use crate::resolver::{fold_key, percent_decoded, percent_encoded};

// ---------------------------------------------------------------------------
// KeyConflict
// ---------------------------------------------------------------------------

/// Two mapping rows normalized to the same lookup key.
///
/// First registration wins; the conflict is retained so callers can surface
/// it through the forensic log instead of silently dropping a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyConflict {
    /// The normalized key both records claimed.
    pub key: String,
    /// The record that was registered first and kept.
    pub kept: MappingRecord,
    /// The record that lost the tie-break.
    pub rejected: MappingRecord,
}

// ---------------------------------------------------------------------------
// MappingIndex
// ---------------------------------------------------------------------------

/// Immutable lookup structure from normalized artifact names to
/// respondent/column pairs.
///
/// Every non-empty `File#n` cell produces exactly one canonical key
/// (trimmed, percent-decoded, case-folded). The literal, percent-decoded,
/// and percent-encoded spellings are registered as equivalent aliases of
/// the same record, each in case-preserved and case-folded form, so a
/// filename stored as `my file.pdf` and presented as `my%20file.pdf` (or
/// vice versa) resolves to the same identity.
#[derive(Debug, Default)]
pub struct MappingIndex {
    records: Vec<MappingRecord>,
    exact: HashMap<String, usize>,
    folded: HashMap<String, usize>,
    conflicts: Vec<KeyConflict>,
}

impl MappingIndex {
    /// Load the mapping spreadsheet at `path`.
    ///
    /// The file is a delimited tabular export; the delimiter is sniffed
    /// from the header line (tab-separated exports are common). A row
    /// missing its respondent identifier is skipped with a warning. A
    /// missing respondent-identifier column is fatal.
    pub fn load(path: &Path, max_file_columns: u32) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            IntakeError::mapping(format!("cannot read {}: {e}", path.display()))
        })?;

        let delimiter = sniff_delimiter(&content);
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(content.as_bytes());

        let headers = reader
            .headers()
            .map_err(|e| IntakeError::mapping(format!("cannot read header row: {e}")))?
            .clone();

        let respondent_col = headers
            .iter()
            .position(is_respondent_header)
            .ok_or_else(|| {
                IntakeError::mapping(format!(
                    "{} has no respondent-identifier column",
                    path.display()
                ))
            })?;

        let file_cols = file_columns(&headers, max_file_columns);
        if file_cols.is_empty() {
            warn!(path = %path.display(), "mapping has no File#n columns");
        }

        let mut index = Self::default();

        for (row_num, row) in reader.records().enumerate() {
            let row = row.map_err(|e| {
                IntakeError::mapping(format!("row {}: {e}", row_num + 2))
            })?;

            let respondent_id = row
                .get(respondent_col)
                .map(str::trim)
                .unwrap_or_default();
            if respondent_id.is_empty() {
                warn!(row = row_num + 2, "row has no respondent identifier, skipping");
                continue;
            }
            let respondent_id = normalize_respondent_id(respondent_id);

            for &(col_idx, column_index) in &file_cols {
                let Some(value) = row.get(col_idx) else {
                    continue;
                };
                let source_filename = value.trim();
                if source_filename.is_empty() {
                    continue;
                }

                index.register(MappingRecord {
                    respondent_id: respondent_id.clone(),
                    column_index,
                    source_filename: source_filename.to_string(),
                });
            }
        }

        info!(
            path = %path.display(),
            records = index.records.len(),
            conflicts = index.conflicts.len(),
            "mapping index built"
        );

        Ok(index)
    }

    /// Register one record under its canonical key and alias spellings.
    fn register(&mut self, record: MappingRecord) {
        let canonical = fold_key(&percent_decoded(&record.source_filename));

        if let Some(&existing) = self.folded.get(&canonical) {
            let kept = self.records[existing].clone();
            debug!(
                key = %canonical,
                kept_respondent = %kept.respondent_id,
                rejected_respondent = %record.respondent_id,
                "duplicate mapping key, first registration wins"
            );
            self.conflicts.push(KeyConflict {
                key: canonical,
                kept,
                rejected: record,
            });
            return;
        }

        let idx = self.records.len();

        for alias in [
            record.source_filename.clone(),
            percent_decoded(&record.source_filename),
            percent_encoded(&record.source_filename),
        ] {
            self.folded.entry(fold_key(&alias)).or_insert(idx);
            self.exact.entry(alias).or_insert(idx);
        }

        self.records.push(record);
    }

    /// Case-preserved exact lookup.
    pub fn get_exact(&self, name: &str) -> Option<&MappingRecord> {
        self.exact.get(name).map(|&i| &self.records[i])
    }

    /// Case-folded lookup (callers pass the name unfolded).
    pub fn get_folded(&self, name: &str) -> Option<&MappingRecord> {
        self.folded.get(&fold_key(name)).map(|&i| &self.records[i])
    }

    /// All registered records, in registration order.
    pub fn records(&self) -> &[MappingRecord] {
        &self.records
    }

    /// Conflicts observed during construction (first-registration-wins).
    pub fn conflicts(&self) -> &[KeyConflict] {
        &self.conflicts
    }

    /// Number of registered records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the index holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Header helpers
// ---------------------------------------------------------------------------

/// Sniff the column delimiter from the header line.
fn sniff_delimiter(content: &str) -> u8 {
    let header = content.lines().next().unwrap_or_default();
    if header.contains('\t') { b'\t' } else { b',' }
}

/// Whether a header cell names the respondent-identifier column.
fn is_respondent_header(header: &str) -> bool {
    let h = header.trim().to_ascii_lowercase();
    h == "respondent id" || h == "respondent_id"
}

/// Locate `File#n` columns: `(cell index, n)` for headers matching
/// `file #n` in any of its observed spellings ("File#1", "File #1", "file 1").
fn file_columns(headers: &csv::StringRecord, max: u32) -> Vec<(usize, u32)> {
    let re = Regex::new(r"(?i)^file\s*#?\s*(\d+)$").expect("file column pattern");

    headers
        .iter()
        .enumerate()
        .filter_map(|(i, h)| {
            let caps = re.captures(h.trim())?;
            let n: u32 = caps[1].parse().ok()?;
            (n >= 1 && n <= max).then_some((i, n))
        })
        .collect()
}

/// Normalize a respondent identifier.
///
/// Spreadsheet exports frequently deliver numeric ids as floats
/// ("114719606389.0"); those are folded back to their integer string form.
/// Non-numeric ids are kept verbatim.
fn normalize_respondent_id(raw: &str) -> String {
    match raw.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 9e15 => {
            format!("{}", f as i64)
        }
        _ => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_mapping(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().expect("temp mapping");
        f.write_all(content.as_bytes()).expect("write mapping");
        f
    }

    #[test]
    fn builds_from_tab_separated_export() {
        let f = write_mapping(
            "Respondent ID\tFile#1\tFile#2\n\
             114719606389\tmyrespondentFile.pdf\tsecond file.docx\n\
             200\t\tonly-second.pdf\n",
        );
        let index = MappingIndex::load(f.path(), 20).expect("load");

        assert_eq!(index.len(), 3);
        let rec = index.get_exact("myrespondentFile.pdf").expect("record");
        assert_eq!(rec.respondent_id, "114719606389");
        assert_eq!(rec.column_index, 1);

        let rec = index.get_exact("only-second.pdf").expect("record");
        assert_eq!(rec.respondent_id, "200");
        assert_eq!(rec.column_index, 2);
    }

    #[test]
    fn builds_from_comma_separated_export() {
        let f = write_mapping(
            "Respondent ID,File #1\n\
             42,answers.pdf\n",
        );
        let index = MappingIndex::load(f.path(), 20).expect("load");
        assert_eq!(index.len(), 1);
        assert_eq!(index.get_exact("answers.pdf").unwrap().respondent_id, "42");
    }

    #[test]
    fn space_and_percent_spellings_are_aliases() {
        let f = write_mapping(
            "Respondent ID\tFile#1\n\
             7\tmy answer file.pdf\n",
        );
        let index = MappingIndex::load(f.path(), 20).expect("load");

        assert!(index.get_exact("my answer file.pdf").is_some());
        assert!(index.get_exact("my%20answer%20file.pdf").is_some());
        assert_eq!(
            index.get_exact("my answer file.pdf").unwrap(),
            index.get_exact("my%20answer%20file.pdf").unwrap()
        );
    }

    #[test]
    fn row_without_respondent_id_is_skipped() {
        let f = write_mapping(
            "Respondent ID\tFile#1\n\
             \torphan.pdf\n\
             9\tkept.pdf\n",
        );
        let index = MappingIndex::load(f.path(), 20).expect("load");
        assert_eq!(index.len(), 1);
        assert!(index.get_exact("orphan.pdf").is_none());
    }

    #[test]
    fn missing_identifier_column_is_fatal() {
        let f = write_mapping("Name\tFile#1\nalice\ta.pdf\n");
        let err = MappingIndex::load(f.path(), 20).unwrap_err();
        assert!(matches!(err, IntakeError::Mapping { .. }));
    }

    #[test]
    fn missing_file_is_fatal() {
        let err =
            MappingIndex::load(Path::new("/nonexistent/mapping.csv"), 20).unwrap_err();
        assert!(matches!(err, IntakeError::Mapping { .. }));
    }

    #[test]
    fn duplicate_key_keeps_first_and_records_conflict() {
        let f = write_mapping(
            "Respondent ID\tFile#1\n\
             1\tshared.pdf\n\
             2\tShared.PDF\n",
        );
        let index = MappingIndex::load(f.path(), 20).expect("load");

        assert_eq!(index.len(), 1);
        assert_eq!(index.get_folded("shared.pdf").unwrap().respondent_id, "1");

        assert_eq!(index.conflicts().len(), 1);
        let conflict = &index.conflicts()[0];
        assert_eq!(conflict.kept.respondent_id, "1");
        assert_eq!(conflict.rejected.respondent_id, "2");
    }

    #[test]
    fn float_exported_ids_are_normalized() {
        let f = write_mapping(
            "respondent_id\tFile#1\n\
             114719606389.0\ta.pdf\n\
             not-a-number\tb.pdf\n",
        );
        let index = MappingIndex::load(f.path(), 20).expect("load");
        assert_eq!(index.get_exact("a.pdf").unwrap().respondent_id, "114719606389");
        assert_eq!(index.get_exact("b.pdf").unwrap().respondent_id, "not-a-number");
    }

    #[test]
    fn file_column_spellings() {
        let headers = csv::StringRecord::from(vec![
            "Respondent ID",
            "File#1",
            "File #2",
            "file 3",
            "File#21",
            "Profile",
        ]);
        let cols = file_columns(&headers, 20);
        assert_eq!(cols, vec![(1, 1), (2, 2), (3, 3)]);
    }
}
