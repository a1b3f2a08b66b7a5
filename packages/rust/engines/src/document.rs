//! Document sanitization engine: PDF and DOCX to plain text.
//!
//! Extraction is delegated to external tools (`pdftotext`, `pandoc`).
//! Before extracting a DOCX, the OOXML container is scanned for an embedded
//! VBA macro payload; a hit is attached as an advisory warning and
//! extraction proceeds.

use std::path::Path;

use intake_shared::{IntakeError, Result};
use intake_shared::config::DocumentEngineConfig;

use crate::command::CommandSpec;
use crate::{ArtifactSource, ContentEngine, Extracted, Extraction};

/// Member name a macro-carrying OOXML archive always contains. Zip archives
/// store member names uncompressed in their headers, so a raw byte scan is
/// enough to flag the payload without unpacking.
const VBA_MEMBER: &[u8] = b"vbaProject.bin";

/// PDF/DOCX sanitization engine.
pub struct DocumentEngine {
    pdf: CommandSpec,
    docx: CommandSpec,
}

impl DocumentEngine {
    /// Build from the `[engines.document]` config section.
    pub fn from_config(config: &DocumentEngineConfig) -> Result<Self> {
        Ok(Self {
            pdf: CommandSpec::new(&config.pdf)?,
            docx: CommandSpec::new(&config.docx)?,
        })
    }

    fn extract(&self, path: &Path) -> Result<Extracted> {
        let input = path.to_string_lossy();
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "pdf" => {
                let text = self.pdf.run_capture_stdout(&input, "")?;
                Ok(Extracted {
                    text,
                    warnings: Vec::new(),
                })
            }
            "docx" => {
                let mut warnings = Vec::new();
                if has_macro_payload(path)? {
                    tracing::warn!(path = %path.display(), "macro payload detected");
                    warnings.push("vba macro payload detected".to_string());
                }
                let text = self.docx.run_capture_stdout(&input, "")?;
                Ok(Extracted { text, warnings })
            }
            other => Err(IntakeError::engine(format!(
                "unsupported document extension: {other}"
            ))),
        }
    }
}

impl ContentEngine for DocumentEngine {
    fn label(&self) -> &str {
        "document"
    }

    fn output_ext(&self) -> &str {
        "txt"
    }

    fn supports(&self, ext: &str) -> bool {
        matches!(ext, "pdf" | "docx")
    }

    fn process(&self, source: &ArtifactSource) -> Result<Extraction> {
        let ArtifactSource::File(path) = source else {
            return Err(IntakeError::engine("document engine expects a file"));
        };

        let extracted = self.extract(path)?;
        if extracted.text.trim().is_empty() {
            return Err(IntakeError::engine(format!(
                "{} produced no text",
                path.display()
            )));
        }
        Ok(Extraction::Text(extracted))
    }
}

/// Scan a file's raw bytes for the VBA project member name.
fn has_macro_payload(path: &Path) -> Result<bool> {
    let bytes = std::fs::read(path).map_err(|e| IntakeError::io(path, e))?;
    Ok(bytes
        .windows(VBA_MEMBER.len())
        .any(|window| window == VBA_MEMBER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn macro_payload_byte_scan() {
        let mut with_macro = tempfile::NamedTempFile::new().unwrap();
        with_macro
            .write_all(b"PK\x03\x04word/vbaProject.bin trailing bytes")
            .unwrap();
        assert!(has_macro_payload(with_macro.path()).unwrap());

        let mut clean = tempfile::NamedTempFile::new().unwrap();
        clean.write_all(b"PK\x03\x04word/document.xml").unwrap();
        assert!(!has_macro_payload(clean.path()).unwrap());
    }

    #[test]
    fn supported_extensions() {
        let engine = DocumentEngine::from_config(&DocumentEngineConfig::default()).unwrap();
        assert!(engine.supports("pdf"));
        assert!(engine.supports("docx"));
        assert!(!engine.supports("mp3"));
        assert_eq!(engine.output_ext(), "txt");
    }

    #[test]
    fn url_source_is_rejected() {
        let engine = DocumentEngine::from_config(&DocumentEngineConfig::default()).unwrap();
        let err = engine
            .process(&ArtifactSource::Url("https://example.com/a.pdf".into()))
            .unwrap_err();
        assert!(matches!(err, IntakeError::Engine { .. }));
    }

    #[test]
    fn extraction_via_substituted_command() {
        // Stand-in extractor: emits the input path on stdout.
        let config = DocumentEngineConfig {
            pdf: vec!["echo".into(), "text from {input}".into()],
            docx: DocumentEngineConfig::default().docx,
        };
        let engine = DocumentEngine::from_config(&config).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("sample.pdf");
        std::fs::write(&pdf, b"%PDF-1.4").unwrap();

        let result = engine.process(&ArtifactSource::File(pdf.clone())).unwrap();
        match result {
            Extraction::Text(extracted) => {
                assert!(extracted.text.contains("sample.pdf"));
                assert!(extracted.warnings.is_empty());
            }
            Extraction::Deferred { .. } => panic!("expected text"),
        }
    }

    #[test]
    fn empty_extraction_is_an_error() {
        let config = DocumentEngineConfig {
            pdf: vec!["true".into()],
            docx: DocumentEngineConfig::default().docx,
        };
        let engine = DocumentEngine::from_config(&config).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("empty.pdf");
        std::fs::write(&pdf, b"%PDF-1.4").unwrap();

        let err = engine.process(&ArtifactSource::File(pdf)).unwrap_err();
        assert!(err.to_string().contains("produced no text"));
    }
}
