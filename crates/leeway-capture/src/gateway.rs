use async_trait::async_trait;
use tracing::{info, instrument, warn};

use leeway_core::config::CaptureConfig;
use leeway_core::{
    CaptureGateway, CapturePermissions, DesignError, ImageHandle, ImageSource, Result,
};

use crate::camera::Camera;
use crate::library::MediaLibrary;
use crate::permissions::{PermissionProvider, PolicyPermissions};

/// Capture gateway over a camera command and a media-library directory.
pub struct DeviceGateway {
    permissions: Box<dyn PermissionProvider>,
    camera: Camera,
    library: MediaLibrary,
}

impl DeviceGateway {
    pub fn new(
        permissions: Box<dyn PermissionProvider>,
        camera: Camera,
        library: MediaLibrary,
    ) -> Self {
        Self {
            permissions,
            camera,
            library,
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(
            Box::new(PolicyPermissions::from_config(config)),
            Camera::from_config(config),
            MediaLibrary::new(config.library_dir.clone()),
        )
    }

    pub async fn check_permissions(&self) -> CapturePermissions {
        self.permissions.check().await
    }

    pub async fn request_permissions(&self) -> CapturePermissions {
        self.permissions.request().await
    }

    /// Check the combined grants and ask once for anything missing.
    async fn ensure_permissions(&self) -> Result<()> {
        if self.permissions.check().await.all_granted() {
            return Ok(());
        }

        let granted = self.permissions.request().await;
        if granted.all_granted() {
            return Ok(());
        }

        let mut missing = Vec::new();
        if !granted.camera {
            missing.push("camera");
        }
        if !granted.media_library {
            missing.push("media library");
        }
        warn!(missing = ?missing, "Capture permissions denied");
        Err(DesignError::PermissionDenied(format!(
            "{} access not granted",
            missing.join(" and ")
        )))
    }
}

#[async_trait]
impl CaptureGateway for DeviceGateway {
    #[instrument(skip(self))]
    async fn acquire_image(&self, source: &ImageSource) -> Result<ImageHandle> {
        self.ensure_permissions().await?;

        let handle = match source {
            ImageSource::Camera => ImageHandle::new(self.camera.capture().await?),
            ImageSource::Library => self.library.latest_image().await?,
            ImageSource::File(path) => match tokio::fs::metadata(path).await {
                Ok(meta) if meta.is_file() => ImageHandle::new(path.clone()),
                Ok(_) => {
                    return Err(DesignError::CaptureFailed(format!(
                        "{} is not a file",
                        path.display()
                    )))
                }
                Err(e) => {
                    return Err(DesignError::CaptureFailed(format!(
                        "cannot open {}: {e}",
                        path.display()
                    )))
                }
            },
        };

        info!(image = %handle, "Image acquired");
        Ok(handle)
    }

    #[instrument(skip(self))]
    async fn persist_image(&self, handle: &ImageHandle) -> bool {
        let mut granted = self.permissions.check().await;
        if !granted.media_library {
            granted = self.permissions.request().await;
        }
        if !granted.media_library {
            warn!("Media library permission not granted, photo not saved");
            return false;
        }

        match self.library.save(handle).await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Error saving to library");
                false
            }
        }
    }
}
