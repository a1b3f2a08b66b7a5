//! Content-engine capability interface and the built-in engines.
//!
//! The pipelines treat content extraction as a pluggable capability: a
//! [`ContentEngine`] either returns extracted text (plus advisory warnings)
//! or fails, and any failure is a per-artifact, non-fatal condition for the
//! calling pipeline. The engines here delegate the heavy lifting to
//! external tools over subprocess boundaries (`pdftotext`, `pandoc`,
//! `ffmpeg`, `whisper`, `yt-dlp`); commands are configurable argv templates.

mod command;
mod document;
mod media;
mod youtube;

use std::path::PathBuf;

use intake_shared::Result;

pub use command::CommandSpec;
pub use document::DocumentEngine;
pub use media::TranscribeEngine;
pub use youtube::{YoutubeEngine, video_id};

// ---------------------------------------------------------------------------
// Inputs & outputs
// ---------------------------------------------------------------------------

/// What an engine is asked to process: a local file or a remote reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactSource {
    /// A file discovered under an input directory.
    File(PathBuf),
    /// A URL taken from a links file.
    Url(String),
}

/// Extracted text plus advisory findings for the forensic log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    /// The extracted/transcribed text.
    pub text: String,
    /// Advisory findings (e.g. "vba macro payload detected").
    pub warnings: Vec<String>,
}

/// Successful engine outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// Text payload ready to be written as the artifact's output.
    Text(Extracted),
    /// No output this run; the engine staged work elsewhere (e.g. a video
    /// downloaded for a later transcription pass).
    Deferred { note: String },
}

// ---------------------------------------------------------------------------
// ContentEngine
// ---------------------------------------------------------------------------

/// Pluggable content-extraction capability supplied by each pipeline.
///
/// Replaces ad hoc dispatch on file extension: the pipeline run loop asks
/// `supports` to filter artifacts and calls `process` only after the
/// idempotency ledger decides work is required.
pub trait ContentEngine {
    /// Engine name for tracing and forensic context.
    fn label(&self) -> &str;

    /// Extension of outputs this engine produces ("txt" or "json").
    fn output_ext(&self) -> &str;

    /// Whether this engine handles files with the given lowercase extension.
    fn supports(&self, ext: &str) -> bool;

    /// Extract content from one artifact. Errors are per-artifact and
    /// non-fatal to the batch.
    fn process(&self, source: &ArtifactSource) -> Result<Extraction>;
}

/// Lowercased extension of a file name, if any.
pub fn name_extension(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
