//! Command-line backed collaborators.
//!
//! Thumbnails, slide renderings, and manifests are produced by external
//! programs configured as argv templates. Placeholders in `{name}` form are
//! substituted per call; anything else (ImageMagick's `%04d`, flags) passes
//! through untouched.
//!
//! | Collaborator | Placeholders |
//! |--------------|--------------|
//! | [`CommandThumbnailer`] | `{source}` `{dest}` `{size}` `{prefix}` |
//! | [`CommandRenderer`] | `{source_dir}` `{dest}` `{name}` |
//! | [`CommandManifestGenerator`] | `{dest}` `{original}` `{pdf}` `{render}` |

use crate::collaborators::{ManifestGenerator, Renderer, Thumbnailer};
use crate::error::StageError;
use crate::pipeline::process::{ProcessRunner, ToolInvocation};
use crate::report::StageResult;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::path::Path;

static RE_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([a-z_]+)\}").unwrap());

/// ImageMagick batch thumbnails, one PNG per page.
pub const DEFAULT_THUMBNAIL_COMMAND: &str =
    "convert -thumbnail {size} {source} {dest}/{prefix}-%04d.png";

/// pdf2swf slide rendering of `<name>.pdf` found in the source directory.
pub const DEFAULT_RENDER_COMMAND: &str = "pdf2swf {source_dir}/{name}.pdf -o {dest}/{name}.swf";

/// An argument vector with `{placeholder}` slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    argv: Vec<String>,
}

impl CommandTemplate {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
        }
    }

    /// Split on whitespace. No quoting; use [`CommandTemplate::new`] for
    /// arguments containing spaces.
    pub fn parse(line: &str) -> Self {
        Self::new(line.split_whitespace())
    }

    /// Substitute known placeholders. Unknown ones are left as written.
    pub fn render(&self, vars: &HashMap<&str, String>) -> Result<ToolInvocation, StageError> {
        ToolInvocation::from_argv(self.argv.iter().map(|arg| {
            RE_PLACEHOLDER
                .replace_all(arg, |caps: &Captures| match vars.get(&caps[1]) {
                    Some(v) => v.clone(),
                    None => caps[0].to_string(),
                })
                .into_owned()
        }))
    }
}

fn path_var(p: &Path) -> String {
    p.to_string_lossy().into_owned()
}

/// [`Thumbnailer`] running an external program.
#[derive(Debug, Clone)]
pub struct CommandThumbnailer {
    template: CommandTemplate,
    runner: ProcessRunner,
}

impl CommandThumbnailer {
    pub fn new(template: CommandTemplate, runner: ProcessRunner) -> Self {
        Self { template, runner }
    }

    pub fn imagemagick(runner: ProcessRunner) -> Self {
        Self::new(CommandTemplate::parse(DEFAULT_THUMBNAIL_COMMAND), runner)
    }
}

#[async_trait]
impl Thumbnailer for CommandThumbnailer {
    async fn generate_thumbnails(
        &self,
        source_file: &Path,
        dest_dir: &Path,
        size: u32,
        name_prefix: &str,
    ) -> StageResult {
        const STAGE: &str = "generateBatchThumb";
        let vars = HashMap::from([
            ("source", path_var(source_file)),
            ("dest", path_var(dest_dir)),
            ("size", size.to_string()),
            ("prefix", name_prefix.to_string()),
        ]);
        match self.template.render(&vars) {
            Ok(inv) => self.runner.run(STAGE, &inv).await,
            Err(e) => StageResult::failure(STAGE, e),
        }
    }
}

/// [`Renderer`] running an external program.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    template: CommandTemplate,
    runner: ProcessRunner,
}

impl CommandRenderer {
    pub fn new(template: CommandTemplate, runner: ProcessRunner) -> Self {
        Self { template, runner }
    }

    pub fn pdf2swf(runner: ProcessRunner) -> Self {
        Self::new(CommandTemplate::parse(DEFAULT_RENDER_COMMAND), runner)
    }
}

#[async_trait]
impl Renderer for CommandRenderer {
    async fn generate_rendering(
        &self,
        source_dir: &Path,
        dest_dir: &Path,
        base_name: &str,
    ) -> StageResult {
        const STAGE: &str = "generateSwf";
        let vars = HashMap::from([
            ("source_dir", path_var(source_dir)),
            ("dest", path_var(dest_dir)),
            ("name", base_name.to_string()),
        ]);
        match self.template.render(&vars) {
            Ok(inv) => self.runner.run(STAGE, &inv).await,
            Err(e) => StageResult::failure(STAGE, e),
        }
    }
}

/// [`ManifestGenerator`] running an external program.
///
/// `{pdf}` expands to an empty string when no PDF was produced.
#[derive(Debug, Clone)]
pub struct CommandManifestGenerator {
    template: CommandTemplate,
    runner: ProcessRunner,
}

impl CommandManifestGenerator {
    pub fn new(template: CommandTemplate, runner: ProcessRunner) -> Self {
        Self { template, runner }
    }
}

#[async_trait]
impl ManifestGenerator for CommandManifestGenerator {
    async fn generate_manifest(
        &self,
        dest_dir: &Path,
        original_file_name: &str,
        pdf_file_name: Option<&str>,
        render_file_name: &str,
    ) -> StageResult {
        const STAGE: &str = "generateXMLDocument";
        let vars = HashMap::from([
            ("dest", path_var(dest_dir)),
            ("original", original_file_name.to_string()),
            ("pdf", pdf_file_name.unwrap_or_default().to_string()),
            ("render", render_file_name.to_string()),
        ]);
        match self.template.render(&vars) {
            Ok(inv) => self.runner.run(STAGE, &inv).await,
            Err(e) => StageResult::failure(STAGE, e),
        }
    }
}
