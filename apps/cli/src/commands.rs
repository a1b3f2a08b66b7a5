//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use intake_core::{
    PipelineConfig, RunSummary, read_links, reconcile, render_table, run_pipeline,
    scan_directory,
};
use intake_engines::{DocumentEngine, TranscribeEngine, YoutubeEngine};
use intake_mapping::MappingIndex;
use intake_shared::{AppConfig, ArtifactKind, init_config, load_config};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Intake — attach survey-response artifacts to respondent records.
#[derive(Parser)]
#[command(
    name = "intake",
    version,
    about = "Ingest survey-response documents, recordings, and YouTube links against a respondent mapping.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Forensic log directory (defaults to <output>/logs).
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Sanitize documents (PDF/DOCX) into text outputs.
    Documents {
        /// Directory of input documents.
        input_dir: PathBuf,

        /// Directory for text outputs.
        output_dir: PathBuf,

        /// Mapping spreadsheet (delimited export).
        #[arg(short, long)]
        mapping: Option<PathBuf>,

        /// Reprocess artifacts that already have outputs.
        #[arg(short, long)]
        force: bool,
    },

    /// Transcribe audio and video recordings into JSON transcripts.
    Media {
        /// Directory of audio recordings.
        audio_input_dir: PathBuf,

        /// Directory of video recordings.
        video_input_dir: PathBuf,

        /// Directory for audio transcript outputs.
        audio_output_dir: PathBuf,

        /// Directory for video transcript outputs.
        video_output_dir: PathBuf,

        /// Mapping spreadsheet (delimited export).
        #[arg(short, long)]
        mapping: Option<PathBuf>,

        /// Reprocess artifacts that already have outputs.
        #[arg(short, long)]
        force: bool,
    },

    /// Fetch YouTube transcripts; download caption-less videos for the
    /// media pipeline.
    Youtube {
        /// File of YouTube links (one URL per line, or first column of a
        /// delimited export).
        links_file: PathBuf,

        /// Directory for transcript outputs.
        output_dir: PathBuf,

        /// Directory where caption-less videos are downloaded.
        video_dir: PathBuf,

        /// Mapping spreadsheet (delimited export).
        #[arg(short, long)]
        mapping: Option<PathBuf>,

        /// Reprocess links that already have outputs.
        #[arg(short, long)]
        force: bool,
    },

    /// Cross-check the mapping against accumulated pipeline outputs.
    Reconcile {
        /// Mapping spreadsheet (delimited export).
        mapping: PathBuf,

        /// Output roots to probe (documents/audio/video/YouTube).
        #[arg(required = true)]
        output_roots: Vec<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Documents {
            ref input_dir,
            ref output_dir,
            ref mapping,
            force,
        } => cmd_documents(&cli, input_dir, output_dir, mapping.as_deref(), force).await,
        Command::Media {
            ref audio_input_dir,
            ref video_input_dir,
            ref audio_output_dir,
            ref video_output_dir,
            ref mapping,
            force,
        } => {
            cmd_media(
                &cli,
                audio_input_dir,
                video_input_dir,
                audio_output_dir,
                video_output_dir,
                mapping.as_deref(),
                force,
            )
            .await
        }
        Command::Youtube {
            ref links_file,
            ref output_dir,
            ref video_dir,
            ref mapping,
            force,
        } => {
            cmd_youtube(&cli, links_file, output_dir, video_dir, mapping.as_deref(), force)
                .await
        }
        Command::Reconcile {
            ref mapping,
            ref output_roots,
        } => cmd_reconcile(mapping, output_roots).await,
        Command::Config { ref action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Pipeline commands
// ---------------------------------------------------------------------------

async fn cmd_documents(
    cli: &Cli,
    input_dir: &Path,
    output_dir: &Path,
    mapping: Option<&Path>,
    force: bool,
) -> Result<()> {
    if !input_dir.is_dir() {
        return Err(eyre!(
            "input directory '{}' does not exist",
            input_dir.display()
        ));
    }

    let config = load_config()?;
    let engine = DocumentEngine::from_config(&config.engines.document)?;

    let artifacts = scan_directory(input_dir, ArtifactKind::Document)?;
    info!(count = artifacts.len(), "discovered document artifacts");

    let pipeline = pipeline_config(cli, &config, output_dir, mapping, force);
    let spinner = spinner(format!("Processing {} document(s)", artifacts.len()));
    let summary = run_pipeline(&pipeline, &artifacts, &engine).await?;
    spinner.finish_and_clear();

    print_summary("Documents", &summary);
    fail_on_artifact_errors(&[summary])
}

async fn cmd_media(
    cli: &Cli,
    audio_input_dir: &Path,
    video_input_dir: &Path,
    audio_output_dir: &Path,
    video_output_dir: &Path,
    mapping: Option<&Path>,
    force: bool,
) -> Result<()> {
    if !audio_input_dir.is_dir() && !video_input_dir.is_dir() {
        return Err(eyre!(
            "neither audio input '{}' nor video input '{}' exists",
            audio_input_dir.display(),
            video_input_dir.display()
        ));
    }

    let config = load_config()?;
    let engine = TranscribeEngine::from_config(&config.engines.transcribe)?;

    let audio = scan_directory(audio_input_dir, ArtifactKind::Audio)?;
    let video = scan_directory(video_input_dir, ArtifactKind::Video)?;
    info!(
        audio = audio.len(),
        video = video.len(),
        "discovered media artifacts"
    );

    let spinner = spinner(format!(
        "Transcribing {} recording(s)",
        audio.len() + video.len()
    ));

    let audio_pipeline = pipeline_config(cli, &config, audio_output_dir, mapping, force);
    let audio_summary = run_pipeline(&audio_pipeline, &audio, &engine).await?;

    let video_pipeline = pipeline_config(cli, &config, video_output_dir, mapping, force);
    let video_summary = run_pipeline(&video_pipeline, &video, &engine).await?;

    spinner.finish_and_clear();

    print_summary("Audio", &audio_summary);
    print_summary("Video", &video_summary);
    fail_on_artifact_errors(&[audio_summary, video_summary])
}

async fn cmd_youtube(
    cli: &Cli,
    links_file: &Path,
    output_dir: &Path,
    video_dir: &Path,
    mapping: Option<&Path>,
    force: bool,
) -> Result<()> {
    if !links_file.is_file() {
        return Err(eyre!("links file '{}' does not exist", links_file.display()));
    }

    let config = load_config()?;
    let pipeline = pipeline_config(cli, &config, output_dir, mapping, force);
    let engine = YoutubeEngine::from_config(&config.engines.youtube, video_dir, pipeline.force)?;

    let artifacts = read_links(links_file)?;
    info!(count = artifacts.len(), "read YouTube links");

    let spinner = spinner(format!("Fetching {} link(s)", artifacts.len()));
    let summary = run_pipeline(&pipeline, &artifacts, &engine).await?;
    spinner.finish_and_clear();

    print_summary("YouTube", &summary);
    fail_on_artifact_errors(&[summary])
}

async fn cmd_reconcile(mapping: &Path, output_roots: &[PathBuf]) -> Result<()> {
    let config = load_config()?;
    let index = MappingIndex::load(mapping, config.defaults.file_columns_max)?;

    let report = reconcile(&index, output_roots)?;

    print!("{}", render_table(&report));
    println!();
    println!("  Mapping records: {}", report.rows.len());
    println!("  Found:           {}", report.found_count());
    println!("  Missing:         {}", report.missing_count());
    println!("  Orphans:         {}", report.orphans.len());
    println!();

    if !report.is_complete() {
        return Err(eyre!(
            "{} mapping record(s) have no output",
            report.missing_count()
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Assemble the shared pipeline config, resolving the force default and
/// the renaming toggle from config + environment.
fn pipeline_config(
    cli: &Cli,
    config: &AppConfig,
    output_dir: &Path,
    mapping: Option<&Path>,
    force_flag: bool,
) -> PipelineConfig {
    if mapping.is_none() {
        tracing::warn!("no --mapping supplied; every artifact will be unmatched");
    }

    PipelineConfig {
        output_dir: output_dir.to_path_buf(),
        log_dir: resolve_log_dir(cli, config, output_dir),
        mapping_path: mapping.map(Path::to_path_buf),
        max_file_columns: config.defaults.file_columns_max,
        force: force_flag || config.force_default(),
        rename_enabled: config.rename_enabled(),
    }
}

/// Forensic logs default to `<output>/logs`; `--log-dir` and an absolute
/// config value both win over that.
fn resolve_log_dir(cli: &Cli, config: &AppConfig, output_dir: &Path) -> PathBuf {
    if let Some(dir) = &cli.log_dir {
        return dir.clone();
    }
    let configured = Path::new(&config.defaults.log_dir);
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        output_dir.join(configured)
    }
}

fn spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner.set_message(message);
    spinner
}

fn print_summary(label: &str, summary: &RunSummary) {
    println!();
    println!("  {label} pass complete");
    println!("  Processed:  {}", summary.processed);
    if summary.deferred > 0 {
        println!("  Deferred:   {}", summary.deferred);
    }
    println!("  Skipped:    {}", summary.skipped_existing);
    if summary.skipped_hidden > 0 {
        println!("  Hidden:     {}", summary.skipped_hidden);
    }
    if summary.unmatched > 0 {
        println!("  Unmatched:  {}", summary.unmatched);
    }
    if summary.errors > 0 {
        println!("  Errors:     {}", summary.errors);
    }
    if summary.collisions > 0 {
        println!("  Collisions: {}", summary.collisions);
    }
    println!("  Log:        {}", summary.log_path.display());
    println!("  Time:       {:.1}s", summary.elapsed.as_secs_f64());
    println!();
}

/// Exit status contract: nonzero iff any artifact ended in error/collision,
/// regardless of how many were processed or skipped.
fn fail_on_artifact_errors(summaries: &[RunSummary]) -> Result<()> {
    let errors: usize = summaries.iter().map(|s| s.errors).sum();
    let collisions: usize = summaries.iter().map(|s| s.collisions).sum();

    if errors > 0 || collisions > 0 {
        return Err(eyre!(
            "{errors} artifact error(s), {collisions} collision(s) — see the forensic log"
        ));
    }
    Ok(())
}
