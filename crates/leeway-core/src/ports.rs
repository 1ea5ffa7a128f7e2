//! Service contracts the pipeline depends on.
//!
//! Image acquisition and the AI backend sit behind these traits so the
//! pipeline can be driven by real adapters or by in-memory fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::design::{DesignRequest, ImageHandle};
use crate::error::Result;

/// Where an image should come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageSource {
    /// Take a new photo with the camera.
    Camera,
    /// Use the most recent photo in the media library.
    Library,
    /// Use an existing image file.
    File(PathBuf),
}

impl std::fmt::Display for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageSource::Camera => write!(f, "camera"),
            ImageSource::Library => write!(f, "media library"),
            ImageSource::File(path) => write!(f, "file {}", path.display()),
        }
    }
}

/// Grants for the two capabilities image capture needs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturePermissions {
    pub camera: bool,
    pub media_library: bool,
}

impl CapturePermissions {
    pub fn all_granted(&self) -> bool {
        self.camera && self.media_library
    }
}

#[async_trait]
pub trait CaptureGateway: Send + Sync {
    /// Acquire an image, verifying permissions first.
    ///
    /// Fails with `PermissionDenied` when access is still missing after an
    /// explicit request, and with `CaptureFailed` for any other problem.
    async fn acquire_image(&self, source: &ImageSource) -> Result<ImageHandle>;

    /// Save an image to durable storage. Returns whether it was saved.
    async fn persist_image(&self, handle: &ImageHandle) -> bool;
}

#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Send the request to the backend and return its raw text output.
    async fn analyze(&self, request: &DesignRequest) -> Result<String>;

    /// Cheap reachability probe, independent of any analysis.
    async fn test_connection(&self) -> bool;
}
