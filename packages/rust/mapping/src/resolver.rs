//! Identity resolution and canonical output naming.
//!
//! [`resolve`] is a pure function of its inputs: given an unchanged
//! [`MappingIndex`], the same artifact name always yields the same
//! [`ResolvedIdentity`] and the same canonical output name, across
//! processes and across time. The idempotency ledger depends on this.

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

use intake_shared::ResolvedIdentity;

use crate::index::MappingIndex;

/// Prefix applied to the output name of every unmatched artifact.
pub const UNMATCHED_PREFIX: &str = "UNMATCHED_";

/// Characters escaped when producing the percent-encoded alias of a name.
/// Spaces are the case that occurs in practice (`my file.pdf` ↔
/// `my%20file.pdf`).
const ALIAS_ESCAPES: &AsciiSet = &CONTROLS.add(b' ');

// ---------------------------------------------------------------------------
// resolve
// ---------------------------------------------------------------------------

/// Resolve one artifact name against the mapping index.
///
/// Lookup priority, first hit wins:
/// 1. case-preserved exact match
/// 2. case-folded match
/// 3. percent-decoded / percent-encoded variant match (exact, then folded)
///
/// No match falls back to the unmatched identity carrying a
/// filesystem-safe form of the original name.
pub fn resolve(artifact_name: &str, index: &MappingIndex) -> ResolvedIdentity {
    if let Some(rec) = index.get_exact(artifact_name) {
        return matched(rec);
    }
    if let Some(rec) = index.get_folded(artifact_name) {
        return matched(rec);
    }

    for variant in [percent_decoded(artifact_name), percent_encoded(artifact_name)] {
        if variant == artifact_name {
            continue;
        }
        if let Some(rec) = index.get_exact(&variant) {
            return matched(rec);
        }
        if let Some(rec) = index.get_folded(&variant) {
            return matched(rec);
        }
    }

    ResolvedIdentity::Unmatched {
        sanitized: sanitize_name(artifact_name),
    }
}

fn matched(rec: &intake_shared::MappingRecord) -> ResolvedIdentity {
    ResolvedIdentity::Matched {
        respondent_id: rec.respondent_id.clone(),
        column_index: rec.column_index,
    }
}

// ---------------------------------------------------------------------------
// Canonical naming
// ---------------------------------------------------------------------------

/// Canonical output name for a resolved identity.
///
/// Matched identities become `R{respondent_id}-{column_index}.{output_ext}`;
/// unmatched identities keep their sanitized original name behind the
/// [`UNMATCHED_PREFIX`] marker.
pub fn canonical_output_name(
    identity: &ResolvedIdentity,
    output_ext: &str,
) -> String {
    match identity {
        ResolvedIdentity::Matched {
            respondent_id,
            column_index,
        } => format!("R{respondent_id}-{column_index}.{output_ext}"),
        ResolvedIdentity::Unmatched { sanitized } => {
            format!("{UNMATCHED_PREFIX}{sanitized}")
        }
    }
}

/// The extension-free stem a matched record's outputs carry
/// (`R{respondent_id}-{column_index}`). Reconciliation probes output trees
/// for `<stem>.*`.
pub fn canonical_stem(respondent_id: &str, column_index: u32) -> String {
    format!("R{respondent_id}-{column_index}")
}

/// Output name used when canonical renaming is disabled: the original stem
/// with the pipeline's output extension. The forensic log still records
/// the intended identity.
pub fn preserved_output_name(original: &str, output_ext: &str) -> String {
    let stem = match original.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => original,
    };
    format!("{}.{output_ext}", sanitize_name(stem))
}

/// Filesystem-safe form of a name: anything outside `[A-Za-z0-9._-]`
/// becomes `_`.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Key normalization (shared with the index)
// ---------------------------------------------------------------------------

/// Case-fold a lookup key after trimming.
pub(crate) fn fold_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Percent-decode a name; invalid sequences leave the input untouched.
pub(crate) fn percent_decoded(name: &str) -> String {
    percent_decode_str(name)
        .decode_utf8()
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| name.to_string())
}

/// Percent-encode the space-containing spelling of a name.
pub(crate) fn percent_encoded(name: &str) -> String {
    utf8_percent_encode(name, ALIAS_ESCAPES).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use intake_shared::ResolvedIdentity;

    fn index_from(content: &str) -> MappingIndex {
        let mut f = tempfile::NamedTempFile::new().expect("temp mapping");
        f.write_all(content.as_bytes()).expect("write mapping");
        MappingIndex::load(f.path(), 20).expect("load")
    }

    #[test]
    fn verbatim_source_filename_resolves_to_its_record() {
        let index = index_from(
            "Respondent ID\tFile#1\tFile#2\n\
             114719606389\tmyrespondentFile.pdf\tinterview notes.docx\n",
        );

        let id = resolve("myrespondentFile.pdf", &index);
        assert_eq!(
            id,
            ResolvedIdentity::Matched {
                respondent_id: "114719606389".into(),
                column_index: 1,
            }
        );
    }

    #[test]
    fn case_folded_match_is_second_priority() {
        let index = index_from("Respondent ID\tFile#1\n5\tAnswers.PDF\n");
        let id = resolve("answers.pdf", &index);
        assert!(matches!(id, ResolvedIdentity::Matched { column_index: 1, .. }));
    }

    #[test]
    fn encoding_equivalence() {
        let index = index_from("Respondent ID\tFile#1\n7\tmy answer file.pdf\n");

        let literal = resolve("my answer file.pdf", &index);
        let encoded = resolve("my%20answer%20file.pdf", &index);
        assert_eq!(literal, encoded);
        assert!(matches!(literal, ResolvedIdentity::Matched { .. }));
    }

    #[test]
    fn encoded_spreadsheet_entry_matches_literal_artifact() {
        let index = index_from("Respondent ID\tFile#1\n8\tmy%20answer.pdf\n");
        let id = resolve("my answer.pdf", &index);
        assert!(matches!(id, ResolvedIdentity::Matched { .. }));
    }

    #[test]
    fn resolution_is_deterministic() {
        let index = index_from(
            "Respondent ID\tFile#1\n\
             1\ta b.pdf\n",
        );
        let first = resolve("a%20b.pdf", &index);
        for _ in 0..10 {
            assert_eq!(resolve("a%20b.pdf", &index), first);
        }
    }

    #[test]
    fn unmatched_fallback_carries_sanitized_name() {
        let index = index_from("Respondent ID\tFile#1\n1\tknown.pdf\n");
        let id = resolve("some random/file.pdf", &index);
        assert_eq!(
            id,
            ResolvedIdentity::Unmatched {
                sanitized: "some_random_file.pdf".into()
            }
        );
    }

    #[test]
    fn canonical_name_for_matched_identity() {
        let id = ResolvedIdentity::Matched {
            respondent_id: "114719606389".into(),
            column_index: 1,
        };
        assert_eq!(canonical_output_name(&id, "txt"), "R114719606389-1.txt");
        assert_eq!(canonical_output_name(&id, "json"), "R114719606389-1.json");
    }

    #[test]
    fn canonical_name_for_unmatched_identity() {
        let id = ResolvedIdentity::Unmatched {
            sanitized: "someRandomFile.pdf".into(),
        };
        assert_eq!(
            canonical_output_name(&id, "txt"),
            "UNMATCHED_someRandomFile.pdf"
        );
    }

    #[test]
    fn preserved_name_swaps_extension() {
        assert_eq!(preserved_output_name("notes.docx", "txt"), "notes.txt");
        assert_eq!(preserved_output_name("no-extension", "json"), "no-extension.json");
        assert_eq!(preserved_output_name("two part.mp4", "json"), "two_part.json");
    }

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_name("a b/c:d.pdf"), "a_b_c_d.pdf");
        assert_eq!(sanitize_name("plain-name_1.txt"), "plain-name_1.txt");
    }

    #[test]
    fn canonical_stem_shape() {
        assert_eq!(canonical_stem("42", 3), "R42-3");
    }
}
