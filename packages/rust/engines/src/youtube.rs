//! YouTube retrieval engine.
//!
//! Tries the caption track first (`yt-dlp --skip-download`), cleaning the
//! VTT cue file to plain text. When no captions exist, the video itself is
//! downloaded into the media pipeline's video input directory for a later
//! transcription pass — that outcome produces no transcript output in the
//! current run and is reported as deferred.

use std::path::{Path, PathBuf};

use regex::Regex;
use url::Url;

use intake_shared::{IntakeError, Result};
use intake_shared::config::YoutubeEngineConfig;

use crate::command::CommandSpec;
use crate::{ArtifactSource, ContentEngine, Extracted, Extraction};

/// YouTube caption/download engine.
pub struct YoutubeEngine {
    subs: CommandSpec,
    download: CommandSpec,
    video_dir: PathBuf,
    force: bool,
    scratch: PathBuf,
}

impl YoutubeEngine {
    /// Build from the `[engines.youtube]` config section.
    ///
    /// `video_dir` is where caption-less videos land for the media pipeline;
    /// `force` re-downloads a video even when it already exists there.
    pub fn from_config(
        config: &YoutubeEngineConfig,
        video_dir: impl Into<PathBuf>,
        force: bool,
    ) -> Result<Self> {
        Ok(Self {
            subs: CommandSpec::new(&config.subs)?,
            download: CommandSpec::new(&config.download)?,
            video_dir: video_dir.into(),
            force,
            scratch: std::env::temp_dir().join(format!("intake-youtube-{}", std::process::id())),
        })
    }

    /// Fetch the caption track for a video, if one exists.
    fn fetch_captions(&self, url: &str, id: &str) -> Result<Option<String>> {
        let dir = self.scratch.join(id);
        std::fs::create_dir_all(&dir).map_err(|e| IntakeError::io(&dir, e))?;

        let stem = dir.join("transcript");
        self.subs.run(url, &stem.to_string_lossy())?;

        let vtt = first_vtt(&dir)?;
        let Some(vtt_path) = vtt else {
            return Ok(None);
        };

        let raw = std::fs::read_to_string(&vtt_path).map_err(|e| IntakeError::io(&vtt_path, e))?;
        let _ = std::fs::remove_dir_all(&dir);

        let text = vtt_to_text(&raw);
        Ok((!text.trim().is_empty()).then_some(text))
    }

    /// Download the video for later transcription by the media pipeline.
    fn download_video(&self, url: &str, id: &str) -> Result<Extraction> {
        std::fs::create_dir_all(&self.video_dir)
            .map_err(|e| IntakeError::io(&self.video_dir, e))?;
        let video_path = self.video_dir.join(format!("youtube_{id}.mp4"));

        if video_path.exists() && !self.force {
            return Ok(Extraction::Deferred {
                note: format!("video already downloaded: {}", video_path.display()),
            });
        }

        self.download.run(url, &video_path.to_string_lossy())?;

        Ok(Extraction::Deferred {
            note: format!(
                "captions unavailable; video downloaded for transcription: {}",
                video_path.display()
            ),
        })
    }
}

impl ContentEngine for YoutubeEngine {
    fn label(&self) -> &str {
        "youtube"
    }

    fn output_ext(&self) -> &str {
        "json"
    }

    /// The link pipeline feeds URLs, not discovered files; extension
    /// filtering never applies to this engine.
    fn supports(&self, _ext: &str) -> bool {
        false
    }

    fn process(&self, source: &ArtifactSource) -> Result<Extraction> {
        let ArtifactSource::Url(url) = source else {
            return Err(IntakeError::engine("youtube engine expects a URL"));
        };

        let id = video_id(url)
            .ok_or_else(|| IntakeError::engine(format!("not a recognizable YouTube URL: {url}")))?;

        match self.fetch_captions(url, &id)? {
            Some(text) => Ok(Extraction::Text(Extracted {
                text,
                warnings: Vec::new(),
            })),
            None => self.download_video(url, &id),
        }
    }
}

// ---------------------------------------------------------------------------
// URL & VTT helpers
// ---------------------------------------------------------------------------

/// Extract the video id from the YouTube URL shapes seen in links files:
/// `youtube.com/watch?v=`, `youtube.com/v/<id>`, and `youtu.be/<id>`.
pub fn video_id(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    let host = url.host_str()?;

    match host {
        "www.youtube.com" | "youtube.com" => {
            if url.path() == "/watch" {
                url.query_pairs()
                    .find(|(k, _)| k == "v")
                    .map(|(_, v)| v.into_owned())
            } else if let Some(rest) = url.path().strip_prefix("/v/") {
                rest.split('/').next().map(str::to_string).filter(|s| !s.is_empty())
            } else {
                None
            }
        }
        "youtu.be" => {
            let id = url.path().trim_start_matches('/');
            (!id.is_empty()).then(|| id.split('/').next().unwrap_or(id).to_string())
        }
        _ => None,
    }
}

/// First `.vtt` file in a directory, if any.
fn first_vtt(dir: &Path) -> Result<Option<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| IntakeError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| IntakeError::io(dir, e))?;
        let path = entry.path();
        if path.extension().is_some_and(|e| e == "vtt") {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

/// Reduce a VTT cue file to plain transcript text: headers, cue timings,
/// inline tags, and consecutive duplicate lines (auto captions repeat the
/// rolling window) are stripped.
fn vtt_to_text(vtt: &str) -> String {
    let tag_re = Regex::new(r"<[^>]*>").expect("tag pattern");
    let mut lines: Vec<String> = Vec::new();

    for line in vtt.lines() {
        let line = line.trim();
        if line.is_empty()
            || line == "WEBVTT"
            || line.starts_with("Kind:")
            || line.starts_with("Language:")
            || line.starts_with("NOTE")
            || line.contains("-->")
            || line.chars().all(|c| c.is_ascii_digit())
        {
            continue;
        }

        let cleaned = tag_re.replace_all(line, "").trim().to_string();
        if cleaned.is_empty() {
            continue;
        }
        if lines.last().is_some_and(|prev| prev == &cleaned) {
            continue;
        }
        lines.push(cleaned);
    }

    lines.join("\n")
}
