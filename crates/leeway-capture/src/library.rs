//! A directory of photos standing in for the device media library.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

use leeway_core::{DesignError, ImageHandle, Result};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "heic", "heif"];

/// Whether a path looks like a photo, judged by extension.
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

pub struct MediaLibrary {
    dir: PathBuf,
}

impl MediaLibrary {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The most recently modified photo in the library.
    pub async fn latest_image(&self) -> Result<ImageHandle> {
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(|e| {
            DesignError::CaptureFailed(format!(
                "could not open media library {}: {e}",
                self.dir.display()
            ))
        })?;

        let mut newest: Option<(SystemTime, PathBuf)> = None;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| DesignError::CaptureFailed(e.to_string()))?
        {
            let path = entry.path();
            if !is_image_path(&path) {
                continue;
            }
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            if newest.as_ref().map_or(true, |(best, _)| modified > *best) {
                newest = Some((modified, path));
            }
        }

        match newest {
            Some((_, path)) => {
                debug!(path = %path.display(), "Picked latest library photo");
                Ok(ImageHandle::new(path))
            }
            None => Err(DesignError::CaptureFailed(format!(
                "no photos in media library {}",
                self.dir.display()
            ))),
        }
    }

    /// Copy an image into the library. Returns where it now lives.
    pub async fn save(&self, handle: &ImageHandle) -> Result<PathBuf> {
        let source = handle.as_path();
        if self.contains(source).await {
            return Ok(source.to_path_buf());
        }

        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "photo.jpg".to_string());
        let target = self.dir.join(format!(
            "{}-{}",
            Utc::now().format("%Y%m%d-%H%M%S"),
            file_name
        ));

        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::copy(source, &target).await?;
        info!(target = %target.display(), "Saved photo to media library");
        Ok(target)
    }

    async fn contains(&self, path: &Path) -> bool {
        let (Ok(dir), Ok(file)) = (
            tokio::fs::canonicalize(&self.dir).await,
            tokio::fs::canonicalize(path).await,
        ) else {
            return false;
        };
        file.parent() == Some(dir.as_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn recognises_photo_extensions() {
        assert!(is_image_path(Path::new("a.JPG")));
        assert!(is_image_path(Path::new("dir/b.heic")));
        assert!(!is_image_path(Path::new("notes.txt")));
        assert!(!is_image_path(Path::new("noext")));
    }

    #[tokio::test]
    async fn latest_image_picks_newest_photo() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("old.jpg"), b"1").unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        std::fs::write(dir.path().join("new.png"), b"2").unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        std::fs::write(dir.path().join("newest.txt"), b"3").unwrap();
        std::fs::create_dir(dir.path().join("folder.jpg")).unwrap();

        let library = MediaLibrary::new(dir.path().to_path_buf());
        let handle = library.latest_image().await.unwrap();
        assert_eq!(handle.as_path(), dir.path().join("new.png"));
    }

    #[tokio::test]
    async fn empty_library_is_capture_failure() {
        let dir = tempfile::tempdir().unwrap();
        let library = MediaLibrary::new(dir.path().to_path_buf());
        let err = library.latest_image().await.unwrap_err();
        assert!(matches!(err, DesignError::CaptureFailed(_)));

        let missing = MediaLibrary::new(dir.path().join("missing"));
        assert!(missing.latest_image().await.is_err());
    }

    #[tokio::test]
    async fn save_copies_into_library_once() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("capture.jpg");
        std::fs::write(&source, b"photo").unwrap();

        let library = MediaLibrary::new(dir.path().join("library"));
        let saved = library.save(&ImageHandle::new(&source)).await.unwrap();
        assert!(saved.starts_with(library.dir()));
        assert!(saved.to_string_lossy().ends_with("-capture.jpg"));
        assert_eq!(std::fs::read(&saved).unwrap(), b"photo");

        // Saving a photo that is already in the library is a no-op.
        let again = library.save(&ImageHandle::new(&saved)).await.unwrap();
        assert_eq!(again, saved);
        assert_eq!(std::fs::read_dir(library.dir()).unwrap().count(), 1);
    }
}
