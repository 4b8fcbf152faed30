//! Configuration types for the conversion pipeline.
//!
//! Two layers of configuration exist:
//!
//! * [`PipelineConfig`] — static knobs of the pipeline itself (timeouts,
//!   thumbnail size, archive naming), built via [`PipelineConfigBuilder`].
//! * [`ConfigSource`] — the key/value store the office-conversion stage reads
//!   on every run (`tool.path`, `office.home.path`). Looked up per run so an
//!   administrator can repoint the converter without restarting workers.

use crate::error::DocConvError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Key naming the directory holding the converter archive and its dependencies.
pub const TOOL_PATH_KEY: &str = "tool.path";
/// Fallback for [`TOOL_PATH_KEY`].
pub const DEFAULT_TOOL_PATH: &str = "./jod";
/// Key naming an office installation passed to the converter. Empty means "not passed".
pub const OFFICE_HOME_KEY: &str = "office.home.path";

/// Configuration for a [`crate::ConversionPipeline`].
///
/// # Example
/// ```rust
/// use edgequake_docconv::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .tool_timeout_secs(300)
///     .thumbnail_size(120)
///     .build()
///     .unwrap();
/// assert_eq!(config.thumbnail_size, 120);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Per-process timeout in seconds. Default: 600.
    ///
    /// Office conversion of a large presentation can take minutes; a timed-out
    /// process is killed and reported as a failed stage.
    pub tool_timeout_secs: u64,

    /// Thumbnail edge length in pixels. Default: 80.
    pub thumbnail_size: u32,

    /// File-name prefix for generated thumbnails. Default: "thumb".
    pub thumbnail_prefix: String,

    /// Prefix identifying the converter's own archive among its dependencies.
    /// Default: "jodconverter".
    pub main_archive_prefix: String,

    /// Extension (without dot) of the archives on the classpath. Default: "jar".
    pub archive_extension: String,

    /// Program used to launch the converter archive. Default: "java".
    pub interpreter: String,

    /// Extension of the normalised document. Default: "pdf".
    pub pdf_extension: String,

    /// Extension of the slide rendering. Default: "swf".
    pub render_extension: String,

    /// Order of classpath entries. Default: [`ClasspathOrder::Listing`].
    pub classpath_order: ClasspathOrder,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 600,
            thumbnail_size: 80,
            thumbnail_prefix: "thumb".to_string(),
            main_archive_prefix: "jodconverter".to_string(),
            archive_extension: "jar".to_string(),
            interpreter: "java".to_string(),
            pdf_extension: "pdf".to_string(),
            render_extension: "swf".to_string(),
            classpath_order: ClasspathOrder::default(),
        }
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    /// `<hash>.<pdf_extension>`
    pub fn pdf_name(&self, hash: &str) -> String {
        format!("{}.{}", hash, self.pdf_extension)
    }

    /// `<hash>.<render_extension>`
    pub fn render_name(&self, hash: &str) -> String {
        format!("{}.{}", hash, self.render_extension)
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn tool_timeout_secs(mut self, secs: u64) -> Self {
        self.config.tool_timeout_secs = secs;
        self
    }

    pub fn thumbnail_size(mut self, px: u32) -> Self {
        self.config.thumbnail_size = px;
        self
    }

    pub fn thumbnail_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.thumbnail_prefix = prefix.into();
        self
    }

    pub fn main_archive_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.main_archive_prefix = prefix.into();
        self
    }

    pub fn archive_extension(mut self, ext: impl Into<String>) -> Self {
        self.config.archive_extension = ext.into().trim_start_matches('.').to_string();
        self
    }

    pub fn interpreter(mut self, program: impl Into<String>) -> Self {
        self.config.interpreter = program.into();
        self
    }

    pub fn pdf_extension(mut self, ext: impl Into<String>) -> Self {
        self.config.pdf_extension = ext.into().trim_start_matches('.').to_string();
        self
    }

    pub fn render_extension(mut self, ext: impl Into<String>) -> Self {
        self.config.render_extension = ext.into().trim_start_matches('.').to_string();
        self
    }

    pub fn classpath_order(mut self, order: ClasspathOrder) -> Self {
        self.config.classpath_order = order;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, DocConvError> {
        let c = &self.config;
        if c.tool_timeout_secs == 0 {
            return Err(DocConvError::InvalidConfig(
                "Tool timeout must be ≥ 1 second".into(),
            ));
        }
        if c.thumbnail_size == 0 {
            return Err(DocConvError::InvalidConfig(
                "Thumbnail size must be ≥ 1 pixel".into(),
            ));
        }
        for (name, value) in [
            ("main archive prefix", &c.main_archive_prefix),
            ("archive extension", &c.archive_extension),
            ("interpreter", &c.interpreter),
            ("pdf extension", &c.pdf_extension),
            ("render extension", &c.render_extension),
        ] {
            if value.trim().is_empty() {
                return Err(DocConvError::InvalidConfig(format!(
                    "{name} must not be empty"
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How classpath entries are ordered on the converter's command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClasspathOrder {
    /// Whatever order the directory listing returns (legacy behaviour). (default)
    #[default]
    Listing,
    /// Lexicographic by file name, for reproducible command lines.
    Sorted,
}

// ── Key/value lookup ─────────────────────────────────────────────────────

/// Read-only key/value configuration lookup.
///
/// Implementations are shared by concurrent runs and must be safe for
/// concurrent reads.
pub trait ConfigSource: Send + Sync {
    /// Value for `key`, or `default` when the key is absent.
    fn get_config_value(&self, key: &str, default: &str) -> String;

    /// Directory holding the converter and its dependency archives.
    fn tool_path(&self) -> PathBuf {
        PathBuf::from(self.get_config_value(TOOL_PATH_KEY, DEFAULT_TOOL_PATH))
    }

    /// Office installation override; `None` when unset or blank.
    fn office_home(&self) -> Option<String> {
        let v = self.get_config_value(OFFICE_HOME_KEY, "");
        let v = v.trim();
        (!v.is_empty()).then(|| v.to_string())
    }
}

/// In-memory [`ConfigSource`].
#[derive(Debug, Clone, Default)]
pub struct MapConfigSource {
    values: HashMap<String, String>,
}

impl MapConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

impl ConfigSource for MapConfigSource {
    fn get_config_value(&self, key: &str, default: &str) -> String {
        self.values
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }
}

impl FromIterator<(String, String)> for MapConfigSource {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// [`ConfigSource`] backed by a flat JSON object file.
///
/// ```json
/// { "tool.path": "/opt/jod", "office.home.path": "/usr/lib/libreoffice" }
/// ```
///
/// Non-string scalar values are accepted and stored in their JSON text form.
#[derive(Debug, Clone)]
pub struct JsonConfigSource {
    path: PathBuf,
    inner: MapConfigSource,
}

impl JsonConfigSource {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DocConvError> {
        let path = path.as_ref().to_path_buf();
        let text = std::fs::read_to_string(&path).map_err(|e| DocConvError::ConfigFile {
            path: path.clone(),
            source: e,
        })?;
        let inner = Self::parse(&path, &text)?;
        Ok(Self { path, inner })
    }

    fn parse(path: &Path, text: &str) -> Result<MapConfigSource, DocConvError> {
        let parse_err = |detail: String| DocConvError::ConfigParse {
            path: path.to_path_buf(),
            detail,
        };
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| parse_err(e.to_string()))?;
        let object = value
            .as_object()
            .ok_or_else(|| parse_err("top-level value must be an object".into()))?;

        object
            .iter()
            .map(|(k, v)| match v {
                serde_json::Value::String(s) => Ok((k.clone(), s.clone())),
                serde_json::Value::Number(_) | serde_json::Value::Bool(_) => {
                    Ok((k.clone(), v.to_string()))
                }
                _ => Err(parse_err(format!("value for '{k}' must be a scalar"))),
            })
            .collect()
    }

    /// File this source was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for JsonConfigSource {
    fn get_config_value(&self, key: &str, default: &str) -> String {
        self.inner.get_config_value(key, default)
    }
}
