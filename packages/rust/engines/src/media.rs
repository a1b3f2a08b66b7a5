//! Audio/video transcription engine.
//!
//! Audio files go straight to the speech-to-text tool; video files are
//! first run through `ffmpeg` (16 kHz mono wav in a scratch directory,
//! removed afterwards). The transcriber writes `<stem>.txt` into a scratch
//! output directory which is read back and cleaned up.

use std::path::{Path, PathBuf};

use intake_shared::{IntakeError, Result};
use intake_shared::config::TranscribeEngineConfig;

use crate::command::CommandSpec;
use crate::{ArtifactSource, ContentEngine, Extracted, Extraction};

/// Extensions handled without an extraction step.
const AUDIO_EXTS: &[&str] = &["mp3", "wav", "m4a"];

/// Extensions routed through audio extraction first.
const VIDEO_EXTS: &[&str] = &["mp4", "mov", "avi", "mkv"];

/// Audio/video transcription engine.
pub struct TranscribeEngine {
    ffmpeg: CommandSpec,
    whisper: CommandSpec,
    scratch: PathBuf,
}

impl TranscribeEngine {
    /// Build from the `[engines.transcribe]` config section.
    pub fn from_config(config: &TranscribeEngineConfig) -> Result<Self> {
        Ok(Self {
            ffmpeg: CommandSpec::new(&config.ffmpeg)?,
            whisper: CommandSpec::new(&config.whisper)?,
            scratch: std::env::temp_dir().join(format!("intake-transcribe-{}", std::process::id())),
        })
    }

    fn ensure_scratch(&self) -> Result<()> {
        std::fs::create_dir_all(&self.scratch).map_err(|e| IntakeError::io(&self.scratch, e))
    }

    /// Run the transcriber over an audio file and read back its text.
    fn transcribe(&self, audio: &Path) -> Result<String> {
        self.ensure_scratch()?;

        self.whisper
            .run(&audio.to_string_lossy(), &self.scratch.to_string_lossy())?;

        let stem = audio
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| IntakeError::engine("audio path has no file stem"))?;
        let transcript_path = self.scratch.join(format!("{stem}.txt"));

        let text = std::fs::read_to_string(&transcript_path).map_err(|e| {
            IntakeError::engine(format!(
                "transcriber produced no readable transcript at {}: {e}",
                transcript_path.display()
            ))
        })?;
        let _ = std::fs::remove_file(&transcript_path);

        Ok(text)
    }

    /// Extract a 16 kHz mono wav from a video into the scratch directory.
    fn extract_audio(&self, video: &Path) -> Result<PathBuf> {
        self.ensure_scratch()?;

        let stem = video
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| IntakeError::engine("video path has no file stem"))?;
        let wav = self.scratch.join(format!("{stem}.wav"));

        self.ffmpeg
            .run(&video.to_string_lossy(), &wav.to_string_lossy())?;

        Ok(wav)
    }
}

impl ContentEngine for TranscribeEngine {
    fn label(&self) -> &str {
        "transcribe"
    }

    fn output_ext(&self) -> &str {
        "json"
    }

    fn supports(&self, ext: &str) -> bool {
        AUDIO_EXTS.contains(&ext) || VIDEO_EXTS.contains(&ext)
    }

    fn process(&self, source: &ArtifactSource) -> Result<Extraction> {
        let ArtifactSource::File(path) = source else {
            return Err(IntakeError::engine("transcribe engine expects a file"));
        };

        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let text = if VIDEO_EXTS.contains(&ext.as_str()) {
            let wav = self.extract_audio(path)?;
            let result = self.transcribe(&wav);
            let _ = std::fs::remove_file(&wav);
            result?
        } else {
            self.transcribe(path)?
        };

        if text.trim().is_empty() {
            return Err(IntakeError::engine(format!(
                "{} produced an empty transcript",
                path.display()
            )));
        }

        Ok(Extraction::Text(Extracted {
            text,
            warnings: Vec::new(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with_whisper(whisper: Vec<String>) -> TranscribeEngine {
        let config = TranscribeEngineConfig {
            whisper,
            ..TranscribeEngineConfig::default()
        };
        TranscribeEngine::from_config(&config).unwrap()
    }

    #[test]
    fn supported_extensions() {
        let engine = TranscribeEngine::from_config(&TranscribeEngineConfig::default()).unwrap();
        for ext in ["mp3", "wav", "m4a", "mp4", "mov", "avi", "mkv"] {
            assert!(engine.supports(ext), "{ext}");
        }
        assert!(!engine.supports("pdf"));
        assert_eq!(engine.output_ext(), "json");
    }

    #[test]
    fn audio_transcription_reads_back_stem_txt() {
        // Stand-in transcriber: writes <stem>.txt into the output dir.
        let engine = engine_with_whisper(vec![
            "sh".into(),
            "-c".into(),
            "echo 'hello transcript' > {output}/clip.txt".into(),
        ]);

        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("clip.mp3");
        std::fs::write(&audio, b"ID3fake").unwrap();

        let result = engine.process(&ArtifactSource::File(audio)).unwrap();
        match result {
            Extraction::Text(extracted) => {
                assert_eq!(extracted.text.trim(), "hello transcript");
            }
            Extraction::Deferred { .. } => panic!("expected text"),
        }
    }

    #[test]
    fn failed_transcriber_is_an_engine_error() {
        let engine = engine_with_whisper(vec!["false".into()]);

        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("clip.mp3");
        std::fs::write(&audio, b"ID3fake").unwrap();

        let err = engine.process(&ArtifactSource::File(audio)).unwrap_err();
        assert!(matches!(err, IntakeError::Engine { .. }));
    }

    #[test]
    fn missing_transcript_is_an_engine_error() {
        // Transcriber succeeds but writes nothing.
        let engine = engine_with_whisper(vec!["true".into()]);

        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("clip.mp3");
        std::fs::write(&audio, b"ID3fake").unwrap();

        let err = engine.process(&ArtifactSource::File(audio)).unwrap_err();
        assert!(err.to_string().contains("no readable transcript"));
    }
}
