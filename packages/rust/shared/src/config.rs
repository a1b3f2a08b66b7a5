//! Application configuration for the intake pipelines.
//!
//! User config lives at `~/.intake/intake.toml`.
//! CLI flags override environment toggles, which override config file
//! values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IntakeError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "intake.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".intake";

/// Environment toggle enabling/disabling canonical renaming.
pub const ENV_RENAME: &str = "INTAKE_RENAME";

/// Environment toggle setting the default of the `--force` flag.
pub const ENV_FORCE: &str = "INTAKE_FORCE";

// ---------------------------------------------------------------------------
// Config structs (matching intake.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// External content-engine commands.
    #[serde(default)]
    pub engines: EnginesConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Whether outputs are renamed to their canonical identity.
    /// When false, original filenames are preserved and only the forensic
    /// log records the intended identity.
    #[serde(default = "default_true")]
    pub rename_enabled: bool,

    /// Default value of the `--force` flag.
    #[serde(default)]
    pub force: bool,

    /// Forensic log directory, relative to the pipeline's output root
    /// unless absolute.
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    /// Highest `File#n` column scanned in the mapping spreadsheet.
    #[serde(default = "default_file_columns_max")]
    pub file_columns_max: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            rename_enabled: true,
            force: false,
            log_dir: default_log_dir(),
            file_columns_max: default_file_columns_max(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_log_dir() -> String {
    "logs".into()
}
fn default_file_columns_max() -> u32 {
    20
}

/// `[engines]` section — subprocess command templates.
///
/// Templates are argv vectors; `{input}` and `{output}` placeholders are
/// substituted at invocation time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnginesConfig {
    /// `[engines.document]` — document sanitization commands.
    #[serde(default)]
    pub document: DocumentEngineConfig,

    /// `[engines.transcribe]` — audio/video transcription commands.
    #[serde(default)]
    pub transcribe: TranscribeEngineConfig,

    /// `[engines.youtube]` — YouTube retrieval commands.
    #[serde(default)]
    pub youtube: YoutubeEngineConfig,
}

/// `[engines.document]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentEngineConfig {
    /// PDF text extraction command.
    #[serde(default = "default_pdf_cmd")]
    pub pdf: Vec<String>,

    /// DOCX text extraction command.
    #[serde(default = "default_docx_cmd")]
    pub docx: Vec<String>,
}

impl Default for DocumentEngineConfig {
    fn default() -> Self {
        Self {
            pdf: default_pdf_cmd(),
            docx: default_docx_cmd(),
        }
    }
}

fn default_pdf_cmd() -> Vec<String> {
    vec!["pdftotext".into(), "{input}".into(), "-".into()]
}
fn default_docx_cmd() -> Vec<String> {
    vec!["pandoc".into(), "--to=plain".into(), "{input}".into()]
}

/// `[engines.transcribe]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscribeEngineConfig {
    /// Audio extraction from video (16 kHz mono wav).
    #[serde(default = "default_ffmpeg_cmd")]
    pub ffmpeg: Vec<String>,

    /// Speech-to-text command; writes `<stem>.txt` into `{output}`.
    #[serde(default = "default_whisper_cmd")]
    pub whisper: Vec<String>,
}

impl Default for TranscribeEngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg_cmd(),
            whisper: default_whisper_cmd(),
        }
    }
}

fn default_ffmpeg_cmd() -> Vec<String> {
    [
        "ffmpeg", "-i", "{input}", "-vn", "-acodec", "pcm_s16le", "-ar", "16000", "-ac", "1",
        "-y", "{output}",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_whisper_cmd() -> Vec<String> {
    [
        "whisper", "{input}", "--model", "base", "--output_format", "txt", "--output_dir",
        "{output}",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// `[engines.youtube]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YoutubeEngineConfig {
    /// Caption retrieval command (`{input}` = URL, `{output}` = target stem).
    #[serde(default = "default_subs_cmd")]
    pub subs: Vec<String>,

    /// Video download command used when no captions exist.
    #[serde(default = "default_download_cmd")]
    pub download: Vec<String>,
}

impl Default for YoutubeEngineConfig {
    fn default() -> Self {
        Self {
            subs: default_subs_cmd(),
            download: default_download_cmd(),
        }
    }
}

fn default_subs_cmd() -> Vec<String> {
    [
        "yt-dlp", "--skip-download", "--write-auto-subs", "--write-subs", "--sub-langs", "en.*",
        "--sub-format", "vtt", "-o", "{output}", "{input}",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_download_cmd() -> Vec<String> {
    [
        "yt-dlp", "-f", "mp4", "--no-warnings", "-o", "{output}", "{input}",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

// ---------------------------------------------------------------------------
// Effective toggles
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Resolved renaming toggle: `INTAKE_RENAME` overrides the config value.
    pub fn rename_enabled(&self) -> bool {
        env_bool(ENV_RENAME).unwrap_or(self.defaults.rename_enabled)
    }

    /// Resolved default for `--force`: `INTAKE_FORCE` overrides the config value.
    pub fn force_default(&self) -> bool {
        env_bool(ENV_FORCE).unwrap_or(self.defaults.force)
    }
}

/// Parse a boolean environment toggle. Unset or unrecognized ⇒ `None`.
fn env_bool(name: &str) -> Option<bool> {
    match std::env::var(name) {
        Ok(v) => match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => {
                tracing::warn!(var = name, value = %v, "unrecognized boolean toggle, ignoring");
                None
            }
        },
        Err(_) => None,
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.intake/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| IntakeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.intake/intake.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| IntakeError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| IntakeError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| IntakeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| IntakeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| IntakeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("rename_enabled"));
        assert!(toml_str.contains("pdftotext"));
        assert!(toml_str.contains("yt-dlp"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert!(parsed.defaults.rename_enabled);
        assert_eq!(parsed.defaults.file_columns_max, 20);
        assert_eq!(parsed.engines.document.pdf[0], "pdftotext");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[defaults]
rename_enabled = false

[engines.document]
pdf = ["mupdf-tool", "{input}"]
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert!(!config.defaults.rename_enabled);
        assert_eq!(config.defaults.log_dir, "logs");
        assert_eq!(config.engines.document.pdf[0], "mupdf-tool");
        // Untouched section keeps its default command
        assert_eq!(config.engines.transcribe.whisper[0], "whisper");
    }

    #[test]
    fn env_bool_parsing() {
        // Use unique names to avoid interfering with other tests
        unsafe { std::env::set_var("INTAKE_TEST_TOGGLE_A", "true") };
        assert_eq!(env_bool("INTAKE_TEST_TOGGLE_A"), Some(true));
        unsafe { std::env::set_var("INTAKE_TEST_TOGGLE_A", "0") };
        assert_eq!(env_bool("INTAKE_TEST_TOGGLE_A"), Some(false));
        unsafe { std::env::set_var("INTAKE_TEST_TOGGLE_A", "maybe") };
        assert_eq!(env_bool("INTAKE_TEST_TOGGLE_A"), None);
        assert_eq!(env_bool("INTAKE_TEST_TOGGLE_UNSET_XYZ"), None);
    }
}
