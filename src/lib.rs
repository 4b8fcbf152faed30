//! # edgequake-docconv
//!
//! Convert an uploaded office document into a normalised PDF, a slide
//! rendering, and per-page thumbnails by driving external tools, then hand
//! the results to a manifest generator.
//!
//! ## Why a report instead of an error?
//!
//! Every stage is an independent external program and any of them may fail.
//! A thumbnail tool crashing should not throw away a perfectly good PDF, so
//! [`ConversionPipeline::run`] never returns `Err`: each stage's outcome is
//! recorded in a [`StageReport`] and the caller decides whether the run was a
//! success, a partial success, or a failure.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload
//!  │
//!  ├─ 0. Paths      <upload>/<room>/<hash>/ created (only fatal step)
//!  ├─ 1. Office     java -cp … -jar jodconverter*.jar in out.pdf   (full only)
//!  ├─ 2. Thumbs     thumbnailer(pdf or original)
//!  ├─ 3. Render     renderer(dest or upload dir)
//!  ├─ 4. Move       upload → <hash>/<original name>
//!  └─ 5. Manifest   manifest(dest, name, pdf?, render)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docconv::pipeline::command::{CommandManifestGenerator, CommandRenderer,
//!     CommandTemplate, CommandThumbnailer};
//! use edgequake_docconv::pipeline::process::ProcessRunner;
//! use edgequake_docconv::{Collaborators, ConversionPipeline, ConversionRequest, FsLayout,
//!     FsMover, MapConfigSource, PipelineConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::default();
//!     let runner = ProcessRunner::new(Some(config.tool_timeout()));
//!     let services = Collaborators {
//!         config_source: Arc::new(MapConfigSource::new().with("tool.path", "/opt/jod")),
//!         layout: Arc::new(FsLayout::new("/srv/upload", "/srv/upload-temp")),
//!         mover: Arc::new(FsMover),
//!         thumbnailer: Arc::new(CommandThumbnailer::imagemagick(runner.clone())),
//!         renderer: Arc::new(CommandRenderer::pdf2swf(runner.clone())),
//!         manifest: Arc::new(CommandManifestGenerator::new(
//!             CommandTemplate::parse("make-manifest {dest} {original} {render}"),
//!             runner,
//!         )),
//!     };
//!     let pipeline = ConversionPipeline::new(config, services);
//!
//!     let req = ConversionRequest::new("abc123", "1", true, "/srv/upload-temp/1/deck.pptx")?;
//!     let report = pipeline.run(&req).await;
//!     for stage in &report {
//!         eprintln!("{}: {}", stage.stage_name, stage.succeeded);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docconv` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod collaborators;
pub mod config;
pub mod convert;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod report;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use collaborators::{
    FileMover, FsLayout, FsMover, ManifestGenerator, PathLayout, Renderer, Thumbnailer,
};
pub use config::{
    ClasspathOrder, ConfigSource, JsonConfigSource, MapConfigSource, PipelineConfig,
    PipelineConfigBuilder,
};
pub use convert::{
    Collaborators, ConversionPipeline, ConversionRequest, STAGE_MOVE, STAGE_OPEN_OFFICE, STAGE_SWF,
    STAGE_THUMB, STAGE_XML,
};
pub use error::{DocConvError, ErrorKind, StageError};
pub use progress::{NoopProgressCallback, ProgressCallback, StageProgressCallback};
pub use report::{RunOutcome, StageReport, StageReportBuilder, StageResult};
