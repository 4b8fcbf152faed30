//! The conversion pipeline: sequence the stages and collect their outcomes.
//!
//! ## Stage order
//!
//! ```text
//! full processing:     processOpenOffice → processThumb(pdf) → processSWF(dest)  → [move] → processXML
//! partial processing:  processThumb(input) → processSWF(input dir)               → [move] → processXML
//! ```
//!
//! Every stage runs even if an earlier one failed; partial artifacts are
//! still useful and the caller reads the [`StageReport`] to decide what
//! happened. The relocation step is recorded as `moveFile` only when it
//! fails. The only early exit is a destination folder that cannot be created.

use crate::collaborators::{FileMover, ManifestGenerator, PathLayout, Renderer, Thumbnailer};
use crate::config::{ConfigSource, PipelineConfig};
use crate::error::{DocConvError, StageError};
use crate::pipeline::locate::ToolLocator;
use crate::pipeline::process::ProcessRunner;
use crate::progress::ProgressCallback;
use crate::report::{StageReport, StageReportBuilder, StageResult};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Office document → PDF.
pub const STAGE_OPEN_OFFICE: &str = "processOpenOffice";
/// Thumbnail generation.
pub const STAGE_THUMB: &str = "processThumb";
/// Slide rendering.
pub const STAGE_SWF: &str = "processSWF";
/// Relocation of the uploaded file; only recorded on failure.
pub const STAGE_MOVE: &str = "moveFile";
/// Manifest generation.
pub const STAGE_XML: &str = "processXML";

/// One document to convert.
///
/// Fields are validated on construction and cannot change afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    content_hash: String,
    room: String,
    full_processing: bool,
    input_file: PathBuf,
    file_name: String,
}

impl ConversionRequest {
    /// # Errors
    /// [`DocConvError::InvalidRequest`] when the hash or room is not a single
    /// path component, or `input_file` has no file name.
    pub fn new(
        content_hash: impl Into<String>,
        room: impl Into<String>,
        full_processing: bool,
        input_file: impl Into<PathBuf>,
    ) -> Result<Self, DocConvError> {
        let content_hash = content_hash.into();
        let room = room.into();
        let input_file = input_file.into();

        check_component("content hash", &content_hash)?;
        check_component("room", &room)?;
        let file_name = input_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                DocConvError::InvalidRequest(format!(
                    "input '{}' has no file name",
                    input_file.display()
                ))
            })?;

        Ok(Self {
            content_hash,
            room,
            full_processing,
            input_file,
            file_name,
        })
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn full_processing(&self) -> bool {
        self.full_processing
    }

    pub fn input_file(&self) -> &Path {
        &self.input_file
    }

    /// Original file name of the upload.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

fn check_component(what: &str, value: &str) -> Result<(), DocConvError> {
    let bad = value.trim().is_empty()
        || value == "."
        || value == ".."
        || value.contains(['/', '\\', '\0']);
    if bad {
        return Err(DocConvError::InvalidRequest(format!(
            "{what} '{value}' is not a valid directory name"
        )));
    }
    Ok(())
}

/// Everything the pipeline delegates to.
#[derive(Clone)]
pub struct Collaborators {
    pub config_source: Arc<dyn ConfigSource>,
    pub layout: Arc<dyn PathLayout>,
    pub mover: Arc<dyn FileMover>,
    pub thumbnailer: Arc<dyn Thumbnailer>,
    pub renderer: Arc<dyn Renderer>,
    pub manifest: Arc<dyn ManifestGenerator>,
}

/// Paths fixed at the start of a run.
#[derive(Debug)]
struct RunPaths {
    temp_dir: PathBuf,
    input: PathBuf,
    destination: PathBuf,
}

/// Runs the conversion stages for one request at a time.
///
/// The pipeline holds no per-run state, so one instance can serve many
/// concurrent runs (e.g. behind an `Arc` on a worker pool).
pub struct ConversionPipeline {
    config: PipelineConfig,
    services: Collaborators,
    locator: ToolLocator,
    runner: ProcessRunner,
    progress: Option<ProgressCallback>,
}

impl ConversionPipeline {
    pub fn new(config: PipelineConfig, services: Collaborators) -> Self {
        Self {
            locator: ToolLocator::new(&config),
            runner: ProcessRunner::new(Some(config.tool_timeout())),
            config,
            services,
            progress: None,
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Convert one uploaded document.
    ///
    /// Always returns a report. Stage failures are recorded in it; a
    /// destination folder that cannot be created ends the run early with
    /// [`StageReport::aborted`] set.
    pub async fn run(&self, req: &ConversionRequest) -> StageReport {
        let start = Instant::now();
        let mut report = StageReportBuilder::new();
        info!(
            "Starting conversion: {} (room {}, hash {}, full: {})",
            req.file_name(),
            req.room(),
            req.content_hash(),
            req.full_processing()
        );

        // ── Step 1: Resolve paths ────────────────────────────────────────
        let paths = match self.resolve_paths(req) {
            Ok(p) => p,
            Err(e) => {
                warn!("Aborting conversion of {}: {}", req.file_name(), e);
                let report = report.abort(&e);
                if let Some(ref cb) = self.progress {
                    cb.on_run_complete(&report);
                }
                return report;
            }
        };
        let dest = paths.destination.as_path();
        let hash = req.content_hash();
        let pdf_name = self.config.pdf_name(hash);
        let render_name = self.config.render_name(hash);

        if let Some(ref cb) = self.progress {
            cb.on_run_start(if req.full_processing() { 4 } else { 3 });
        }

        // ── Step 2: Convert, thumbnail, render ───────────────────────────
        let size = self.config.thumbnail_size;
        let prefix = self.config.thumbnail_prefix.as_str();
        let services = &self.services;
        if req.full_processing() {
            let pdf = dest.join(&pdf_name);
            self.stage(&mut report, STAGE_OPEN_OFFICE, self.office_to_pdf(&paths.input, &pdf))
                .await;
            self.stage(
                &mut report,
                STAGE_THUMB,
                services.thumbnailer.generate_thumbnails(&pdf, dest, size, prefix),
            )
            .await;
            self.stage(
                &mut report,
                STAGE_SWF,
                services.renderer.generate_rendering(dest, dest, hash),
            )
            .await;
        } else {
            self.stage(
                &mut report,
                STAGE_THUMB,
                services
                    .thumbnailer
                    .generate_thumbnails(&paths.input, dest, size, prefix),
            )
            .await;
            let source_dir = paths.input.parent().unwrap_or(paths.temp_dir.as_path());
            self.stage(
                &mut report,
                STAGE_SWF,
                services.renderer.generate_rendering(source_dir, dest, hash),
            )
            .await;
        }

        // ── Step 3: Relocate the upload ──────────────────────────────────
        if let Err(cause) = self.relocate(req.input_file(), &dest.join(req.file_name())).await {
            self.record(&mut report, StageResult::failure(STAGE_MOVE, cause));
        }

        // ── Step 4: Manifest ─────────────────────────────────────────────
        let pdf_for_manifest = req.full_processing().then_some(pdf_name.as_str());
        self.stage(
            &mut report,
            STAGE_XML,
            services.manifest.generate_manifest(
                dest,
                req.file_name(),
                pdf_for_manifest,
                &render_name,
            ),
        )
        .await;

        let report = report.finish();
        info!(
            "Conversion of {} finished: {:?}, {}/{} stages ok, {}ms",
            req.file_name(),
            report.outcome(),
            report.len() - report.failed().len(),
            report.len(),
            start.elapsed().as_millis()
        );
        if let Some(ref cb) = self.progress {
            cb.on_run_complete(&report);
        }
        report
    }

    /// Synchronous wrapper around [`ConversionPipeline::run`].
    ///
    /// Creates a temporary tokio runtime internally. Must not be called from
    /// inside an async context.
    pub fn run_blocking(&self, req: &ConversionRequest) -> StageReport {
        match tokio::runtime::Runtime::new() {
            Ok(rt) => rt.block_on(self.run(req)),
            Err(e) => StageReportBuilder::new().abort(&DocConvError::Internal(format!(
                "Failed to create tokio runtime: {e}"
            ))),
        }
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    fn resolve_paths(&self, req: &ConversionRequest) -> Result<RunPaths, DocConvError> {
        let layout = &self.services.layout;
        let temp_dir = layout.upload_temp_dir(req.room());
        let input = temp_dir.join(req.file_name());
        let room_dir = layout.upload_room_dir(req.room());
        let destination = layout
            .new_subdir(&room_dir, req.content_hash())
            .map_err(|e| DocConvError::DestinationUnavailable {
                path: room_dir.join(req.content_hash()),
                source: e,
            })?;
        debug!(
            "Input {}, destination {}",
            input.display(),
            destination.display()
        );
        Ok(RunPaths {
            temp_dir,
            input,
            destination,
        })
    }

    /// Locate the converter from the current configuration and run it.
    ///
    /// Discovery lists the tool directory, so it runs on the blocking pool.
    async fn office_to_pdf(&self, input: &Path, output: &Path) -> StageResult {
        const STAGE: &str = "doJodConvert";
        let source = &self.services.config_source;
        let tool_dir = source.tool_path();
        let office_home = source.office_home();
        let locator = self.locator.clone();
        let (input, output) = (input.to_path_buf(), output.to_path_buf());

        let located = tokio::task::spawn_blocking(move || {
            locator.locate(&tool_dir, office_home.as_deref(), &input, &output)
        })
        .await
        .unwrap_or_else(|e| Err(StageError::Internal(format!("locate task failed: {e}"))));

        match located {
            Ok(invocation) => self.runner.run(STAGE, &invocation).await,
            Err(e) => {
                warn!("{}: {}", STAGE, e);
                StageResult::failure(STAGE, e)
            }
        }
    }

    /// A move may fall back to copying across devices, so it runs on the blocking pool.
    async fn relocate(&self, src: &Path, dst: &Path) -> Result<(), StageError> {
        let mover = Arc::clone(&self.services.mover);
        let (from, to) = (src.to_path_buf(), dst.to_path_buf());
        tokio::task::spawn_blocking(move || mover.move_file(&from, &to))
            .await
            .map_err(|e| StageError::Internal(format!("move task failed: {e}")))?
            .map_err(|e| StageError::io("move", src, &e))
    }

    /// Run one stage future, converting a panic into a failed result.
    async fn stage<F>(&self, report: &mut StageReportBuilder, name: &str, fut: F)
    where
        F: Future<Output = StageResult>,
    {
        if let Some(ref cb) = self.progress {
            cb.on_stage_start(name);
        }
        let result = match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(result) => result.renamed(name),
            Err(panic) => StageResult::failure(name, StageError::Internal(panic_message(&*panic))),
        };
        self.record(report, result);
    }

    fn record(&self, report: &mut StageReportBuilder, result: StageResult) {
        if result.succeeded {
            debug!("{}: ok", result.stage_name);
        } else {
            warn!(
                "{}: failed: {}",
                result.stage_name,
                result.message.as_deref().unwrap_or("no detail")
            );
        }
        if let Some(ref cb) = self.progress {
            cb.on_stage_complete(&result);
        }
        if let Err(e) = report.push(result) {
            warn!("{}", e);
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("stage panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("stage panicked: {s}")
    } else {
        "stage panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_keeps_original_file_name() {
        let req = ConversionRequest::new("abc123", "1", false, "/tmp/upload/1/slides.odp").unwrap();
        assert_eq!(req.file_name(), "slides.odp");
        assert_eq!(req.content_hash(), "abc123");
        assert_eq!(req.room(), "1");
        assert!(!req.full_processing());
    }

    #[test]
    fn request_rejects_path_like_hash() {
        for hash in ["", "..", "a/b", "a\\b", "  "] {
            let err = ConversionRequest::new(hash, "1", true, "x.doc").unwrap_err();
            assert!(
                matches!(err, DocConvError::InvalidRequest(_)),
                "hash {hash:?}: {err}"
            );
        }
    }

    #[test]
    fn request_rejects_bad_room() {
        assert!(ConversionRequest::new("h", "../etc", true, "x.doc").is_err());
    }

    #[test]
    fn request_requires_file_name() {
        let err = ConversionRequest::new("h", "1", true, "/").unwrap_err();
        assert!(err.to_string().contains("no file name"));
    }

    #[test]
    fn panic_message_variants() {
        let p: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*p), "stage panicked: boom");
        let p: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*p), "stage panicked: bang");
        let p: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(&*p), "stage panicked");
    }
}
