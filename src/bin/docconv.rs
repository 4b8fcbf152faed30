//! CLI binary for edgequake-docconv.
//!
//! A thin shim over the library crate that maps CLI flags to a
//! `ConversionPipeline` with command-backed collaborators and prints the
//! stage report.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_docconv::config::{OFFICE_HOME_KEY, TOOL_PATH_KEY};
use edgequake_docconv::pipeline::command::{
    CommandManifestGenerator, CommandRenderer, CommandTemplate, CommandThumbnailer,
    DEFAULT_RENDER_COMMAND, DEFAULT_THUMBNAIL_COMMAND,
};
use edgequake_docconv::pipeline::process::ProcessRunner;
use edgequake_docconv::{
    ClasspathOrder, Collaborators, ConfigSource, ConversionPipeline, ConversionRequest, FsLayout,
    FsMover, JsonConfigSource, MapConfigSource, PipelineConfig, ProgressCallback, RunOutcome,
    StageProgressCallback, StageReport, StageResult,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner naming the running stage, plus one
/// log line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl StageProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_stages: usize) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Running {total_stages} stages…"))
        ));
    }

    fn on_stage_start(&self, stage_name: &str) {
        self.bar.set_message(stage_name.to_string());
    }

    fn on_stage_complete(&self, result: &StageResult) {
        if result.succeeded {
            self.bar
                .println(format!("  {} {}", green("✓"), result.stage_name));
        } else {
            let detail = result.message.as_deref().unwrap_or("failed");
            let first_line = detail.lines().next().unwrap_or(detail);
            // Keep output tidy on long tool diagnostics.
            let msg = if first_line.chars().count() > 80 {
                format!("{}\u{2026}", first_line.chars().take(79).collect::<String>())
            } else {
                first_line.to_string()
            };
            self.bar.println(format!(
                "  {} {:<18} {}",
                red("✗"),
                result.stage_name,
                red(&msg)
            ));
        }
    }

    fn on_run_complete(&self, _report: &StageReport) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Full processing: office → PDF → thumbnails → slide rendering → manifest
  docconv deck.pptx --hash abc123 --room 1 --full \
      --tool-path /opt/jod --manifest-cmd "make-manifest {dest} {original} {pdf} {render}"

  # Input is already a PDF: thumbnails + rendering only
  docconv abc123.pdf --hash abc123 --room 1

  # Read tool.path / office.home.path from a JSON file, print the report as JSON
  docconv deck.odp --hash abc123 --room 1 --full --config docconv.json --json

COMMAND TEMPLATES:
  --thumb-cmd     placeholders {source} {dest} {size} {prefix}
  --render-cmd    placeholders {source_dir} {dest} {name}
  --manifest-cmd  placeholders {dest} {original} {pdf} {render}
  Templates are split on whitespace; a placeholder value containing spaces
  stays a single argument.

EXIT STATUS:
  0  every stage succeeded
  2  some stages failed
  1  nothing succeeded, or the run aborted

ENVIRONMENT VARIABLES:
  DOCCONV_TOOL_PATH     Directory with the converter archives
  DOCCONV_OFFICE_HOME   Office installation passed to the converter
  DOCCONV_UPLOAD_ROOT   Root of per-room output folders
  RUST_LOG              Override log filtering (e.g. edgequake_docconv=debug)
"#;

/// Convert an office document into PDF, thumbnails, and a slide rendering.
#[derive(Parser, Debug)]
#[command(
    name = "docconv",
    version,
    about = "Convert office documents into PDF, thumbnails, and slide renderings",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Uploaded document to convert. It is moved into the output folder.
    input: PathBuf,

    /// Content hash naming the output folder and artifacts.
    #[arg(long)]
    hash: String,

    /// Room identifier.
    #[arg(long, default_value = "1")]
    room: String,

    /// Run the office → PDF conversion first.
    #[arg(long)]
    full: bool,

    /// JSON file with `tool.path` / `office.home.path`.
    #[arg(long, env = "DOCCONV_CONFIG")]
    config: Option<PathBuf>,

    /// Directory with the converter archives (overrides the config file).
    #[arg(long, env = "DOCCONV_TOOL_PATH")]
    tool_path: Option<String>,

    /// Office installation passed as -Doffice.home (overrides the config file).
    #[arg(long, env = "DOCCONV_OFFICE_HOME")]
    office_home: Option<String>,

    /// Root of per-room output folders.
    #[arg(long, env = "DOCCONV_UPLOAD_ROOT", default_value = "./upload")]
    upload_root: PathBuf,

    /// Root of per-room upload folders. Defaults to the input's own directory.
    #[arg(long, env = "DOCCONV_UPLOAD_TEMP_ROOT")]
    upload_temp_root: Option<PathBuf>,

    /// Per-tool timeout in seconds.
    #[arg(long, env = "DOCCONV_TIMEOUT", default_value_t = 600)]
    timeout: u64,

    /// Thumbnail size in pixels.
    #[arg(long, env = "DOCCONV_THUMB_SIZE", default_value_t = 80)]
    thumb_size: u32,

    /// Sort classpath archives by name instead of directory order.
    #[arg(long)]
    sort_classpath: bool,

    /// Program launching the converter archive.
    #[arg(long, env = "DOCCONV_INTERPRETER", default_value = "java")]
    interpreter: String,

    /// Thumbnail command template.
    #[arg(long, env = "DOCCONV_THUMB_CMD", default_value = DEFAULT_THUMBNAIL_COMMAND)]
    thumb_cmd: String,

    /// Slide rendering command template.
    #[arg(long, env = "DOCCONV_RENDER_CMD", default_value = DEFAULT_RENDER_COMMAND)]
    render_cmd: String,

    /// Manifest command template. Without it the manifest stage fails.
    #[arg(long, env = "DOCCONV_MANIFEST_CMD")]
    manifest_cmd: Option<String>,

    /// Print the stage report as JSON.
    #[arg(long)]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

/// CLI overrides first, then the config file, then the default.
struct CliConfigSource {
    overrides: MapConfigSource,
    file: Option<JsonConfigSource>,
}

impl ConfigSource for CliConfigSource {
    fn get_config_value(&self, key: &str, default: &str) -> String {
        if let Some(v) = self.overrides.get(key) {
            return v.to_string();
        }
        match self.file {
            Some(ref f) => f.get_config_value(key, default),
            None => default.to_string(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build pipeline ───────────────────────────────────────────────────
    let config = build_config(&cli)?;
    let services = build_services(&cli, &config)?;
    let request = ConversionRequest::new(&cli.hash, &cli.room, cli.full, &cli.input)
        .context("Invalid request")?;

    let mut pipeline = ConversionPipeline::new(config, services);
    if show_progress {
        let cb: ProgressCallback = CliProgressCallback::new();
        pipeline = pipeline.with_progress(cb);
    }

    // ── Run ──────────────────────────────────────────────────────────────
    let report = pipeline.run(&request).await;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else if !cli.quiet {
        print_summary(&report);
    }

    Ok(match report.outcome() {
        RunOutcome::Success => ExitCode::SUCCESS,
        RunOutcome::Partial => ExitCode::from(2),
        RunOutcome::Failure => ExitCode::FAILURE,
    })
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli) -> Result<PipelineConfig> {
    let order = if cli.sort_classpath {
        ClasspathOrder::Sorted
    } else {
        ClasspathOrder::Listing
    };
    PipelineConfig::builder()
        .tool_timeout_secs(cli.timeout)
        .thumbnail_size(cli.thumb_size)
        .interpreter(&cli.interpreter)
        .classpath_order(order)
        .build()
        .context("Invalid configuration")
}

/// Wire the command-backed collaborators.
fn build_services(cli: &Cli, config: &PipelineConfig) -> Result<Collaborators> {
    let file = cli
        .config
        .as_ref()
        .map(JsonConfigSource::load)
        .transpose()
        .context("Failed to load configuration file")?;

    let mut overrides = MapConfigSource::new();
    if let Some(ref p) = cli.tool_path {
        overrides.set(TOOL_PATH_KEY, p);
    }
    if let Some(ref h) = cli.office_home {
        overrides.set(OFFICE_HOME_KEY, h);
    }

    let layout = match cli.upload_temp_root {
        Some(ref root) => FsLayout::new(&cli.upload_root, root),
        None => {
            let dir = cli
                .input
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            FsLayout::with_fixed_temp_dir(&cli.upload_root, dir)
        }
    };

    let manifest_cmd = match cli.manifest_cmd {
        Some(ref cmd) => cmd.as_str(),
        None => {
            warn!("No --manifest-cmd configured; the manifest stage will fail");
            ""
        }
    };

    let runner = ProcessRunner::new(Some(config.tool_timeout()));
    Ok(Collaborators {
        config_source: Arc::new(CliConfigSource { overrides, file }),
        layout: Arc::new(layout),
        mover: Arc::new(FsMover),
        thumbnailer: Arc::new(CommandThumbnailer::new(
            CommandTemplate::parse(&cli.thumb_cmd),
            runner.clone(),
        )),
        renderer: Arc::new(CommandRenderer::new(
            CommandTemplate::parse(&cli.render_cmd),
            runner.clone(),
        )),
        manifest: Arc::new(CommandManifestGenerator::new(
            CommandTemplate::parse(manifest_cmd),
            runner,
        )),
    })
}

fn print_summary(report: &StageReport) {
    if let Some(reason) = report.aborted() {
        eprintln!("{} {}", red("✘"), bold(reason));
        return;
    }
    let ok = report.len() - report.failed().len();
    let mark = match report.outcome() {
        RunOutcome::Success => green("✔"),
        RunOutcome::Partial => cyan("⚠"),
        RunOutcome::Failure => red("✘"),
    };
    eprintln!(
        "{} {}/{} stages succeeded",
        mark,
        bold(&ok.to_string()),
        report.len()
    );
    for stage in report.failed() {
        eprintln!(
            "   {} {}",
            stage.stage_name,
            dim(stage.message.as_deref().unwrap_or(""))
        );
    }
}
