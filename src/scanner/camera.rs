use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use tokio::sync::Mutex;

use super::frame::Frame;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// A video input as reported by enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDevice {
    pub device_id: String,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DimensionRange {
    pub min: u32,
    pub ideal: u32,
}

/// How the device is picked when opening a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceConstraint {
    /// `{ deviceId: { exact } }`
    DeviceId { exact: String },
    /// `{ facingMode: "environment" }`
    FacingMode(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoConstraints {
    pub width: DimensionRange,
    pub height: DimensionRange,
    #[serde(flatten)]
    pub device: DeviceConstraint,
}

impl VideoConstraints {
    /// An explicit device when one is selected, otherwise the rear camera.
    pub fn for_device(device_id: Option<&str>) -> Self {
        let device = match device_id {
            Some(id) => DeviceConstraint::DeviceId {
                exact: id.to_string(),
            },
            None => DeviceConstraint::FacingMode("environment".into()),
        };
        Self {
            width: DimensionRange {
                min: 640,
                ideal: 1280,
            },
            height: DimensionRange { min: 480, ideal: 720 },
            device,
        }
    }

    pub fn device_id(&self) -> Option<&str> {
        match &self.device {
            DeviceConstraint::DeviceId { exact } => Some(exact),
            DeviceConstraint::FacingMode(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrackCapabilities {
    pub torch: bool,
}

/// Host camera access.
pub trait CameraBackend: Send + Sync {
    fn enumerate_devices(&self) -> Result<Vec<VideoDevice>>;

    fn open_stream(&self, constraints: &VideoConstraints) -> Result<Box<dyn VideoStream>>;
}

/// An open video track. All calls may block.
pub trait VideoStream: Send {
    /// The frame currently shown, if the stream has produced one.
    fn grab_frame(&mut self) -> Result<Option<Frame>>;

    /// A full-resolution still at roughly the requested size.
    fn screenshot(&mut self, width: u32, height: u32) -> Result<Option<Frame>>;

    fn capabilities(&self) -> TrackCapabilities;

    fn apply_torch(&mut self, on: bool) -> Result<()>;

    /// Id of the device actually opened, when the host reports it.
    fn device_id(&self) -> Option<String>;

    fn stop(&mut self);
}

pub type SharedStream = Arc<Mutex<Box<dyn VideoStream>>>;

/// A freshly opened stream and whether the remembered device had to be dropped.
pub struct OpenedStream {
    pub stream: Box<dyn VideoStream>,
    pub constraints: VideoConstraints,
    pub fell_back: bool,
}

/// Enumerate video inputs. Failures surface as an empty list.
pub async fn enumerate(camera: Arc<dyn CameraBackend>) -> Vec<VideoDevice> {
    let result = tokio::task::spawn_blocking(move || camera.enumerate_devices()).await;
    match result {
        Ok(Ok(devices)) => devices,
        Ok(Err(err)) => {
            log_warn!("Camera enumeration failed: {err:#}");
            Vec::new()
        }
        Err(join_err) => {
            log_warn!("Camera enumeration worker join failed: {join_err}");
            Vec::new()
        }
    }
}

/// Open a stream for `preferred`, retrying once with the default camera when
/// the preferred device cannot be opened.
pub async fn open_with_fallback(
    camera: Arc<dyn CameraBackend>,
    preferred: Option<String>,
) -> Result<OpenedStream> {
    let constraints = VideoConstraints::for_device(preferred.as_deref());
    match open_blocking(Arc::clone(&camera), constraints.clone()).await {
        Ok(stream) => Ok(OpenedStream {
            stream,
            constraints,
            fell_back: false,
        }),
        Err(err) if preferred.is_some() => {
            log_warn!(
                "Failed to open camera {}: {err:#}; retrying with default",
                preferred.as_deref().unwrap_or_default()
            );
            let constraints = VideoConstraints::for_device(None);
            let stream = open_blocking(camera, constraints.clone())
                .await
                .context("camera unavailable after falling back to the default device")?;
            log_info!("Opened default camera after fallback");
            Ok(OpenedStream {
                stream,
                constraints,
                fell_back: true,
            })
        }
        Err(err) => Err(err.context("camera unavailable")),
    }
}

/// Run a blocking call against the shared stream on the blocking pool. The
/// stream lock is held for the duration of the call.
pub async fn with_stream<F, T>(stream: &SharedStream, call: F) -> Result<T>
where
    F: FnOnce(&mut dyn VideoStream) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let mut guard = Arc::clone(stream).lock_owned().await;
    tokio::task::spawn_blocking(move || call(&mut **guard))
        .await
        .map_err(|err| anyhow!("camera worker join failed: {err}"))?
}

async fn open_blocking(
    camera: Arc<dyn CameraBackend>,
    constraints: VideoConstraints,
) -> Result<Box<dyn VideoStream>> {
    tokio::task::spawn_blocking(move || camera.open_stream(&constraints))
        .await
        .map_err(|err| anyhow!("camera open worker join failed: {err}"))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::test_support::MockCamera;

    #[test]
    fn constraints_serialize_like_media_constraints() {
        let rear = serde_json::to_value(VideoConstraints::for_device(None)).unwrap();
        assert_eq!(rear["facingMode"], "environment");
        assert_eq!(rear["width"]["min"], 640);
        assert_eq!(rear["height"]["ideal"], 720);

        let chosen = serde_json::to_value(VideoConstraints::for_device(Some("cam-2"))).unwrap();
        assert_eq!(chosen["deviceId"]["exact"], "cam-2");
        assert!(chosen.get("facingMode").is_none());
    }

    #[tokio::test]
    async fn enumeration_failure_is_an_empty_list() {
        let camera = Arc::new(MockCamera::new().failing_enumeration());
        assert!(enumerate(camera).await.is_empty());
    }

    #[tokio::test]
    async fn stale_device_falls_back_once() {
        let camera = Arc::new(MockCamera::new().rejecting_device("gone"));
        let opened = open_with_fallback(camera.clone(), Some("gone".into()))
            .await
            .unwrap();
        assert!(opened.fell_back);
        assert_eq!(opened.constraints.device_id(), None);
        assert_eq!(camera.open_attempts(), 2);
    }

    #[tokio::test]
    async fn default_camera_failure_is_fatal() {
        let camera = Arc::new(MockCamera::new().without_camera());
        assert!(open_with_fallback(camera.clone(), None).await.is_err());
        assert_eq!(camera.open_attempts(), 1);

        assert!(open_with_fallback(camera.clone(), Some("cam-1".into()))
            .await
            .is_err());
        assert_eq!(camera.open_attempts(), 3);
    }
}
