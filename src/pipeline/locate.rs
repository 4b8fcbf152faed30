//! Converter discovery: turn a directory of archives into a command line.
//!
//! The office converter ships as one main archive plus a directory full of
//! dependency archives. Every archive goes on the classpath; the one whose
//! file name starts with the configured prefix is the run target.

use crate::config::{ClasspathOrder, PipelineConfig};
use crate::error::StageError;
use crate::pipeline::process::ToolInvocation;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Archives found in a tool directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolArchives {
    /// Every archive, in classpath order.
    pub classpath: Vec<PathBuf>,
    /// The entry point archive.
    pub main_archive: PathBuf,
}

/// Builds the office-conversion command line from a tool directory.
#[derive(Debug, Clone)]
pub struct ToolLocator {
    interpreter: String,
    archive_extension: String,
    main_archive_prefix: String,
    order: ClasspathOrder,
}

impl ToolLocator {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            interpreter: config.interpreter.clone(),
            archive_extension: config.archive_extension.clone(),
            main_archive_prefix: config.main_archive_prefix.clone(),
            order: config.classpath_order,
        }
    }

    /// Enumerate archives in `tool_dir` and pick the main one.
    ///
    /// Blocking: lists the directory and canonicalises every archive path.
    ///
    /// # Errors
    /// * [`StageError::MissingToolDirectory`] if `tool_dir` is not a directory.
    /// * [`StageError::MainArchiveNotFound`] if no archive name starts with the prefix.
    pub fn discover(&self, tool_dir: &Path) -> Result<ToolArchives, StageError> {
        if !tool_dir.is_dir() {
            return Err(StageError::MissingToolDirectory {
                path: tool_dir.to_path_buf(),
            });
        }

        let suffix = format!(".{}", self.archive_extension);
        let entries =
            std::fs::read_dir(tool_dir).map_err(|e| StageError::io("list", tool_dir, &e))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StageError::io("list", tool_dir, &e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(&suffix) {
                names.push(name);
            }
        }
        if self.order == ClasspathOrder::Sorted {
            names.sort();
        }

        // Several matches: the last one in classpath order is the run target.
        let main = names
            .iter()
            .rev()
            .find(|n| n.starts_with(&self.main_archive_prefix))
            .ok_or_else(|| StageError::MainArchiveNotFound {
                dir: tool_dir.to_path_buf(),
                prefix: self.main_archive_prefix.clone(),
            })?;

        let main_archive = absolute(&tool_dir.join(main));
        let classpath = names.iter().map(|n| absolute(&tool_dir.join(n))).collect();
        debug!(
            "Found {} archives in {}, main: {}",
            names.len(),
            tool_dir.display(),
            main
        );

        Ok(ToolArchives {
            classpath,
            main_archive,
        })
    }

    /// Full converter invocation for `input` → `output`.
    ///
    /// Layout: `interpreter [-Doffice.home=H] (-cp ARCHIVE)… -jar MAIN INPUT OUTPUT`,
    /// with one `-cp` pair per archive and absolute paths throughout.
    pub fn locate(
        &self,
        tool_dir: &Path,
        office_home: Option<&str>,
        input: &Path,
        output: &Path,
    ) -> Result<ToolInvocation, StageError> {
        let archives = self.discover(tool_dir)?;

        let mut invocation = ToolInvocation::new(&self.interpreter);
        if let Some(home) = office_home.map(str::trim).filter(|h| !h.is_empty()) {
            invocation = invocation.arg(format!("-Doffice.home={home}"));
        }
        for archive in &archives.classpath {
            invocation = invocation
                .arg("-cp")
                .arg(archive.to_string_lossy());
        }
        Ok(invocation
            .arg("-jar")
            .arg(archives.main_archive.to_string_lossy())
            .arg(absolute(input).to_string_lossy())
            .arg(absolute(output).to_string_lossy()))
    }
}

/// Canonical path when it exists, otherwise an absolute one.
///
/// The converter's output file does not exist yet, so canonicalising its
/// parent keeps symlinked upload roots consistent with the input path.
pub(crate) fn absolute(path: &Path) -> PathBuf {
    if let Ok(p) = std::fs::canonicalize(path) {
        return p;
    }
    if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
        if let Ok(p) = std::fs::canonicalize(parent) {
            return p.join(name);
        }
    }
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tool_dir(files: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for f in files {
            std::fs::write(dir.path().join(f), b"PK").unwrap();
        }
        dir
    }

    fn locator() -> ToolLocator {
        ToolLocator::new(&PipelineConfig::default())
    }

    #[test]
    fn missing_directory() {
        let err = locator()
            .discover(Path::new("/definitely/not/a/jod/dir"))
            .unwrap_err();
        assert!(matches!(err, StageError::MissingToolDirectory { .. }));
        assert!(err.to_string().contains("missing tool directory"));
    }

    #[test]
    fn file_instead_of_directory() {
        let dir = tool_dir(&["jodconverter-core.jar"]);
        let err = locator()
            .discover(&dir.path().join("jodconverter-core.jar"))
            .unwrap_err();
        assert!(matches!(err, StageError::MissingToolDirectory { .. }));
    }

    #[test]
    fn main_archive_missing() {
        let dir = tool_dir(&["dep1.jar", "dep2.jar", "jodconverter.txt"]);
        let err = locator().discover(dir.path()).unwrap_err();
        assert!(matches!(err, StageError::MainArchiveNotFound { .. }));
        assert!(err.to_string().contains("main archive not found"));
    }

    #[test]
    fn every_archive_on_classpath_and_main_by_prefix() {
        let dir = tool_dir(&["dep1.jar", "jodconverter-core.jar", "dep2.jar", "README"]);
        let found = locator().discover(dir.path()).unwrap();

        assert_eq!(found.classpath.len(), 3);
        assert!(found
            .main_archive
            .to_string_lossy()
            .ends_with("jodconverter-core.jar"));
        assert!(found.classpath.contains(&found.main_archive));
        assert!(found.classpath.iter().all(|p| p.is_absolute()));
    }

    #[test]
    fn listing_order_matches_read_dir() {
        let dir = tool_dir(&["dep1.jar", "jodconverter-core.jar", "dep2.jar"]);
        let expected: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".jar"))
            .collect();
        let found = locator().discover(dir.path()).unwrap();
        let got: Vec<String> = found
            .classpath
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn sorted_order_is_lexicographic() {
        let dir = tool_dir(&["zeta.jar", "jodconverter-core.jar", "alpha.jar"]);
        let config = PipelineConfig::builder()
            .classpath_order(ClasspathOrder::Sorted)
            .build()
            .unwrap();
        let found = ToolLocator::new(&config).discover(dir.path()).unwrap();
        let got: Vec<_> = found
            .classpath
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(got, vec!["alpha.jar", "jodconverter-core.jar", "zeta.jar"]);
    }

    #[test]
    fn last_prefix_match_is_main_archive() {
        let dir = tool_dir(&["jodconverter-core-3.0.jar", "dep.jar", "jodconverter-2.2.jar"]);
        let config = PipelineConfig::builder()
            .classpath_order(ClasspathOrder::Sorted)
            .build()
            .unwrap();
        let found = ToolLocator::new(&config).discover(dir.path()).unwrap();
        assert!(found
            .main_archive
            .to_string_lossy()
            .ends_with("jodconverter-core-3.0.jar"));
        assert_eq!(found.classpath.len(), 3);
    }

    #[test]
    fn invocation_layout() {
        let dir = tool_dir(&["dep1.jar", "jodconverter-core.jar", "dep2.jar"]);
        let out = TempDir::new().unwrap();
        let input = out.path().join("slides.odp");
        std::fs::write(&input, b"x").unwrap();
        let output = out.path().join("abc123.pdf");

        let inv = locator()
            .locate(dir.path(), Some("/usr/lib/libreoffice"), &input, &output)
            .unwrap();

        assert_eq!(inv.executable, "java");
        assert_eq!(inv.args[0], "-Doffice.home=/usr/lib/libreoffice");
        assert_eq!(inv.args.iter().filter(|a| *a == "-cp").count(), 3);

        let n = inv.args.len();
        assert_eq!(inv.args[n - 4], "-jar");
        assert!(inv.args[n - 3].ends_with("jodconverter-core.jar"));
        assert!(inv.args[n - 2].ends_with("slides.odp"));
        assert!(inv.args[n - 1].ends_with("abc123.pdf"));
        assert!(Path::new(&inv.args[n - 1]).is_absolute());
    }

    #[test]
    fn blank_office_home_is_omitted() {
        let dir = tool_dir(&["jodconverter-core.jar"]);
        let inv = locator()
            .locate(dir.path(), Some("  "), Path::new("in.doc"), Path::new("out.pdf"))
            .unwrap();
        assert_eq!(inv.args[0], "-cp");
        assert!(!inv.args.iter().any(|a| a.starts_with("-Doffice.home")));
    }

    #[test]
    fn absolute_handles_missing_files() {
        let dir = TempDir::new().unwrap();
        let p = absolute(&dir.path().join("not-yet.pdf"));
        assert!(p.is_absolute());
        assert!(p.ends_with("not-yet.pdf"));
        assert!(absolute(Path::new("relative/x.pdf")).is_absolute());
    }
}
