//! Services the pipeline delegates to.
//!
//! The orchestrator only sequences stages; the actual thumbnail rendering,
//! slide rendering, and manifest writing happen behind these traits. Each is
//! injected as an `Arc<dyn …>` so tests substitute in-process fakes and
//! production wires in the command-backed implementations from
//! [`crate::pipeline::command`].

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::report::StageResult;

/// Renders per-page thumbnail images.
#[async_trait]
pub trait Thumbnailer: Send + Sync {
    async fn generate_thumbnails(
        &self,
        source_file: &Path,
        dest_dir: &Path,
        size: u32,
        name_prefix: &str,
    ) -> StageResult;
}

/// Produces the vector slide rendering.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn generate_rendering(&self, source_dir: &Path, dest_dir: &Path, base_name: &str)
        -> StageResult;
}

/// Writes the manifest describing the generated artifacts.
#[async_trait]
pub trait ManifestGenerator: Send + Sync {
    async fn generate_manifest(
        &self,
        dest_dir: &Path,
        original_file_name: &str,
        pdf_file_name: Option<&str>,
        render_file_name: &str,
    ) -> StageResult;
}

/// Upload directory layout.
pub trait PathLayout: Send + Sync {
    /// Where uploads for `room` wait before conversion.
    fn upload_temp_dir(&self, room: &str) -> PathBuf;

    /// Parent of the per-document output folders for `room`.
    fn upload_room_dir(&self, room: &str) -> PathBuf;

    /// `parent/name`, created if absent. Calling it again is a no-op.
    fn new_subdir(&self, parent: &Path, name: &str) -> io::Result<PathBuf> {
        let dir = parent.join(name);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

/// Moves a file to its final location.
pub trait FileMover: Send + Sync {
    /// Fails when `src` is missing or `dst` is not writable.
    fn move_file(&self, src: &Path, dst: &Path) -> io::Result<()>;
}

/// Filesystem [`PathLayout`].
///
/// * `upload_room_dir(room)` = `upload_root/room`
/// * `upload_temp_dir(room)` = `temp_root/room`, or a fixed directory for
///   every room when built with [`FsLayout::with_fixed_temp_dir`]
#[derive(Debug, Clone)]
pub struct FsLayout {
    upload_root: PathBuf,
    temp: TempLocation,
}

#[derive(Debug, Clone)]
enum TempLocation {
    PerRoom(PathBuf),
    Fixed(PathBuf),
}

impl FsLayout {
    pub fn new(upload_root: impl Into<PathBuf>, temp_root: impl Into<PathBuf>) -> Self {
        Self {
            upload_root: upload_root.into(),
            temp: TempLocation::PerRoom(temp_root.into()),
        }
    }

    /// Uploads for all rooms wait in `temp_dir` itself.
    pub fn with_fixed_temp_dir(upload_root: impl Into<PathBuf>, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_root: upload_root.into(),
            temp: TempLocation::Fixed(temp_dir.into()),
        }
    }
}

impl PathLayout for FsLayout {
    fn upload_temp_dir(&self, room: &str) -> PathBuf {
        match &self.temp {
            TempLocation::PerRoom(root) => root.join(room),
            TempLocation::Fixed(dir) => dir.clone(),
        }
    }

    fn upload_room_dir(&self, room: &str) -> PathBuf {
        self.upload_root.join(room)
    }
}

/// Rename-based [`FileMover`] that falls back to copy + remove across filesystems.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsMover;

impl FileMover for FsMover {
    fn move_file(&self, src: &Path, dst: &Path) -> io::Result<()> {
        if !src.exists() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("source '{}' does not exist", src.display()),
            ));
        }
        match std::fs::rename(src, dst) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                debug!("rename across devices, copying {}", src.display());
                copy_then_remove(src, dst, |p| std::fs::remove_file(p))
            }
            Err(e) => Err(e),
        }
    }
}

/// Copy `src` to `dst`, then remove `src`.
///
/// If `src` cannot be removed the copy is deleted again, so a failed move
/// never leaves the file in both places.
fn copy_then_remove(
    src: &Path,
    dst: &Path,
    remove: impl Fn(&Path) -> io::Result<()>,
) -> io::Result<()> {
    std::fs::copy(src, dst)?;
    if let Err(e) = remove(src) {
        if let Err(cleanup) = std::fs::remove_file(dst) {
            warn!("could not remove partial copy {}: {}", dst.display(), cleanup);
        }
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn per_room_layout() {
        let layout = FsLayout::new("/srv/upload", "/srv/upload-temp");
        assert_eq!(layout.upload_room_dir("7"), PathBuf::from("/srv/upload/7"));
        assert_eq!(layout.upload_temp_dir("7"), PathBuf::from("/srv/upload-temp/7"));
    }

    #[test]
    fn fixed_temp_layout() {
        let layout = FsLayout::with_fixed_temp_dir("/srv/upload", "/home/me/docs");
        assert_eq!(layout.upload_temp_dir("7"), PathBuf::from("/home/me/docs"));
        assert_eq!(layout.upload_temp_dir("8"), PathBuf::from("/home/me/docs"));
    }

    #[test]
    fn new_subdir_is_idempotent() {
        let root = TempDir::new().unwrap();
        let layout = FsLayout::new(root.path(), root.path());
        let a = layout.new_subdir(root.path(), "abc123").unwrap();
        std::fs::write(a.join("keep.txt"), b"x").unwrap();
        let b = layout.new_subdir(root.path(), "abc123").unwrap();
        assert_eq!(a, b);
        assert!(b.join("keep.txt").exists());
    }

    #[test]
    fn move_relocates_file() {
        let root = TempDir::new().unwrap();
        let src = root.path().join("slides.odp");
        let dst_dir = root.path().join("out");
        std::fs::create_dir(&dst_dir).unwrap();
        std::fs::write(&src, b"odp").unwrap();

        FsMover.move_file(&src, &dst_dir.join("slides.odp")).unwrap();
        assert!(!src.exists());
        assert_eq!(std::fs::read(dst_dir.join("slides.odp")).unwrap(), b"odp");
    }

    #[test]
    fn move_missing_source_fails() {
        let root = TempDir::new().unwrap();
        let err = FsMover
            .move_file(&root.path().join("gone.odp"), &root.path().join("x.odp"))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn move_into_missing_directory_fails() {
        let root = TempDir::new().unwrap();
        let src = root.path().join("a.odp");
        std::fs::write(&src, b"x").unwrap();
        let err = FsMover.move_file(&src, &root.path().join("no/such/dir/a.odp"));
        assert!(err.is_err());
        assert!(src.exists());
    }

    #[test]
    fn copy_fallback_moves_file() {
        let root = TempDir::new().unwrap();
        let src = root.path().join("deck.pptx");
        let dst = root.path().join("moved.pptx");
        std::fs::write(&src, b"pptx").unwrap();

        copy_then_remove(&src, &dst, |p| std::fs::remove_file(p)).unwrap();
        assert!(!src.exists());
        assert_eq!(std::fs::read(&dst).unwrap(), b"pptx");
    }

    #[test]
    fn copy_fallback_undoes_copy_when_source_stays() {
        let root = TempDir::new().unwrap();
        let src = root.path().join("deck.pptx");
        let dst = root.path().join("moved.pptx");
        std::fs::write(&src, b"pptx").unwrap();

        let err = copy_then_remove(&src, &dst, |_| {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
        })
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert!(src.exists());
        assert!(!dst.exists());
    }
}
