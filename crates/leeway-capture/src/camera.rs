//! Runs an external camera command to take a photo.
//!
//! The command is configured as an argv list, e.g.
//! `["fswebcam", "--no-banner", "-r", "1280x720", "{output}"]`. `{output}` is
//! replaced by the path the photo must be written to; when absent, the path
//! is appended as the last argument.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, SystemTime};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use leeway_core::config::CaptureConfig;
use leeway_core::{DesignError, Result};

const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Photos kept in the capture directory. Older ones are deleted when a new
/// capture starts; photos worth keeping are copied to the media library.
pub const KEEP_CAPTURES: usize = 10;

/// The camera. Only one capture may run at a time.
pub struct Camera {
    command: Vec<String>,
    capture_dir: PathBuf,
    timeout: Duration,
    in_use: Mutex<()>,
}

impl Camera {
    pub fn new(command: Vec<String>, capture_dir: PathBuf, timeout: Duration) -> Self {
        Self {
            command,
            capture_dir,
            timeout,
            in_use: Mutex::new(()),
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(
            config.capture_command.clone(),
            config.capture_dir.clone(),
            Duration::from_secs(config.capture_timeout_secs),
        )
    }

    /// Whether a camera command is configured.
    pub fn is_available(&self) -> bool {
        !self.command.is_empty()
    }

    /// Take a photo and return the path it was written to.
    ///
    /// Dropping the returned future kills the camera process and frees the
    /// camera for the next capture.
    pub async fn capture(&self) -> Result<PathBuf> {
        let Some((program, args)) = self.command.split_first() else {
            return Err(DesignError::CaptureFailed(
                "No camera is configured (set capture.capture_command)".to_string(),
            ));
        };

        let Ok(_guard) = self.in_use.try_lock() else {
            return Err(DesignError::CaptureFailed("camera busy".to_string()));
        };

        tokio::fs::create_dir_all(&self.capture_dir)
            .await
            .map_err(|e| {
                DesignError::CaptureFailed(format!(
                    "could not create {}: {e}",
                    self.capture_dir.display()
                ))
            })?;
        self.prune_old_captures().await;
        let output = self.capture_dir.join(format!("{}.jpg", Uuid::new_v4()));
        let output_arg = output.display().to_string();

        let mut argv: Vec<String> = args
            .iter()
            .map(|arg| arg.replace(OUTPUT_PLACEHOLDER, &output_arg))
            .collect();
        if !args.iter().any(|arg| arg.contains(OUTPUT_PLACEHOLDER)) {
            argv.push(output_arg.clone());
        }

        info!(program = %program, output = %output.display(), "Starting camera capture");

        let mut child = Command::new(program)
            .args(&argv)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DesignError::CaptureFailed(format!("could not start {program}: {e}")))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let reader = BufReader::new(stderr);
                let mut lines = reader.lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "camera::stderr", "{}", line);
                }
            });
        }

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                error!("Camera process error: {}", e);
                return Err(DesignError::CaptureFailed(e.to_string()));
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "Camera capture timed out, killing process");
                if let Err(e) = child.kill().await {
                    error!("Failed to kill camera process: {}", e);
                }
                return Err(DesignError::CaptureFailed(format!(
                    "capture timed out after {} seconds",
                    self.timeout.as_secs()
                )));
            }
        };

        if !status.success() {
            return Err(DesignError::CaptureFailed(format!(
                "camera command exited with {status}"
            )));
        }

        match tokio::fs::metadata(&output).await {
            Ok(meta) if meta.len() > 0 => {
                info!(output = %output.display(), bytes = meta.len(), "Photo captured");
                Ok(output)
            }
            _ => Err(DesignError::CaptureFailed(
                "camera command produced no image".to_string(),
            )),
        }
    }

    /// Delete all but the newest `KEEP_CAPTURES - 1` photos, leaving room for
    /// the one about to be taken.
    async fn prune_old_captures(&self) {
        let Ok(mut entries) = tokio::fs::read_dir(&self.capture_dir).await else {
            return;
        };

        let mut captures = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("jpg") {
                continue;
            }
            match entry.metadata().await {
                Ok(meta) if meta.is_file() => {
                    captures.push((meta.modified().unwrap_or(SystemTime::UNIX_EPOCH), path));
                }
                _ => continue,
            }
        }
        if captures.len() < KEEP_CAPTURES {
            return;
        }

        captures.sort_by(|a, b| b.0.cmp(&a.0));
        for (_, path) in captures.into_iter().skip(KEEP_CAPTURES - 1) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!(path = %path.display(), "Removed old capture"),
                Err(e) => warn!(path = %path.display(), error = %e, "Could not remove old capture"),
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use leeway_core::ErrorKind;
    use std::sync::Arc;

    fn sh(script: &str, dir: &std::path::Path, timeout_ms: u64) -> Camera {
        Camera::new(
            vec![
                "sh".into(),
                "-c".into(),
                script.into(),
                "sh".into(),
                OUTPUT_PLACEHOLDER.into(),
            ],
            dir.to_path_buf(),
            Duration::from_millis(timeout_ms),
        )
    }

    #[tokio::test]
    async fn writes_photo_to_capture_dir() {
        let dir = tempfile::tempdir().unwrap();
        let camera = sh(r#"printf 'jpeg' > "$1""#, &dir.path().join("captures"), 5_000);

        let path = camera.capture().await.unwrap();
        assert!(path.starts_with(dir.path().join("captures")));
        assert_eq!(std::fs::read(&path).unwrap(), b"jpeg");
    }

    #[tokio::test]
    async fn output_path_is_appended_without_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let camera = Camera::new(
            vec!["sh".into(), "-c".into(), r#"printf 'x' > "$1""#.into(), "sh".into()],
            dir.path().to_path_buf(),
            Duration::from_secs(5),
        );
        assert!(camera.capture().await.is_ok());
    }

    #[tokio::test]
    async fn unconfigured_camera_fails() {
        let dir = tempfile::tempdir().unwrap();
        let camera = Camera::new(Vec::new(), dir.path().to_path_buf(), Duration::from_secs(1));
        assert!(!camera.is_available());
        let err = camera.capture().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CaptureFailed);
    }

    #[tokio::test]
    async fn failing_or_silent_commands_are_capture_failures() {
        let dir = tempfile::tempdir().unwrap();

        let err = sh("exit 3", dir.path(), 5_000).capture().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CaptureFailed);

        let err = sh("true", dir.path(), 5_000).capture().await.unwrap_err();
        assert!(err.to_string().contains("no image"));

        let missing = Camera::new(
            vec!["leeway-no-such-camera-binary".into()],
            dir.path().to_path_buf(),
            Duration::from_secs(1),
        );
        assert_eq!(missing.capture().await.unwrap_err().kind(), ErrorKind::CaptureFailed);
    }

    #[tokio::test]
    async fn slow_capture_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let err = sh("sleep 5", dir.path(), 200).capture().await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn camera_is_exclusive_while_capturing() {
        let dir = tempfile::tempdir().unwrap();
        let camera = sh(r#"sleep 0.3; printf 'x' > "$1""#, dir.path(), 5_000);

        let (first, second) = tokio::join!(camera.capture(), camera.capture());
        assert!(first.is_ok());
        assert!(second.unwrap_err().to_string().contains("camera busy"));
    }

    #[tokio::test]
    async fn aborted_capture_releases_camera() {
        let dir = tempfile::tempdir().unwrap();
        let camera = Arc::new(sh("sleep 5", dir.path(), 10_000));

        let slow = {
            let camera = camera.clone();
            tokio::spawn(async move { camera.capture().await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(camera.in_use.try_lock().is_err());

        slow.abort();
        let _ = slow.await;
        assert!(camera.in_use.try_lock().is_ok());
    }

    #[tokio::test]
    async fn old_captures_are_pruned() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..KEEP_CAPTURES + 5 {
            std::fs::write(dir.path().join(format!("old-{i}.jpg")), b"x").unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), b"keep").unwrap();

        let camera = sh(r#"printf 'new' > "$1""#, dir.path(), 5_000);
        let path = camera.capture().await.unwrap();

        let photos = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("jpg"))
            .count();
        assert_eq!(photos, KEEP_CAPTURES);
        assert!(path.exists());
        assert!(dir.path().join("notes.txt").exists());
    }
}
