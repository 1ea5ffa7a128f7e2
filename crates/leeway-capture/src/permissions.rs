//! Capture permissions.
//!
//! On a phone these come from the platform prompt. Here they come from the
//! user's config: the camera is granted when `allow_camera` is set, and the
//! media library when `allow_media_library` is set and its directory exists.
//! Requesting library access creates the directory.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{info, warn};

use leeway_core::config::CaptureConfig;
use leeway_core::CapturePermissions;

#[async_trait]
pub trait PermissionProvider: Send + Sync {
    /// Current grants, without prompting.
    async fn check(&self) -> CapturePermissions;

    /// Ask for whatever is missing and return the resulting grants.
    async fn request(&self) -> CapturePermissions;
}

/// Permissions derived from configuration.
pub struct PolicyPermissions {
    allow_camera: bool,
    allow_media_library: bool,
    library_dir: PathBuf,
}

impl PolicyPermissions {
    pub fn new(allow_camera: bool, allow_media_library: bool, library_dir: PathBuf) -> Self {
        Self {
            allow_camera,
            allow_media_library,
            library_dir,
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(
            config.allow_camera,
            config.allow_media_library,
            config.library_dir.clone(),
        )
    }
}

#[async_trait]
impl PermissionProvider for PolicyPermissions {
    async fn check(&self) -> CapturePermissions {
        let library_ready = tokio::fs::metadata(&self.library_dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        CapturePermissions {
            camera: self.allow_camera,
            media_library: self.allow_media_library && library_ready,
        }
    }

    async fn request(&self) -> CapturePermissions {
        if self.allow_media_library {
            match tokio::fs::create_dir_all(&self.library_dir).await {
                Ok(()) => info!(dir = %self.library_dir.display(), "Media library ready"),
                Err(e) => warn!(
                    dir = %self.library_dir.display(),
                    error = %e,
                    "Could not create media library"
                ),
            }
        }
        self.check().await
    }
}
