use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::{ean::EanDecoder, frame::Frame, state::ScanMode};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

/// Where a frame came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FrameSource {
    /// Sampled from the running video stream.
    Live,
    /// A full-resolution screenshot.
    Still,
    /// A copy of the current live frame taken for stall recovery.
    Canvas,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Backend {
    NativeDetector,
    SoftwareDecoder,
}

/// Raw backend output before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub raw_value: String,
    pub format: Option<String>,
}

/// A decoded barcode, whichever backend produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanHit {
    pub text: String,
    pub backend: Backend,
    pub source: FrameSource,
}

impl ScanHit {
    /// First detection with a non-blank value wins.
    pub fn from_detections(
        detections: Vec<Detection>,
        backend: Backend,
        source: FrameSource,
    ) -> Option<Self> {
        detections.into_iter().find_map(|detection| {
            let text = detection.raw_value.trim();
            (!text.is_empty()).then(|| ScanHit {
                text: text.to_string(),
                backend,
                source,
            })
        })
    }
}

/// One detection backend. Implementations block; callers run them off the
/// async executor.
pub trait BarcodeDecoder: Send + Sync {
    fn backend(&self) -> Backend;

    /// Whether the backend can run on this host. Probed once per session.
    fn is_available(&self) -> bool;

    fn detect(&self, frame: &Frame, source: FrameSource) -> Result<Vec<Detection>>;

    /// Drop any per-session decoding state.
    fn reset(&self) {}
}

/// Registered backends in priority order.
#[derive(Clone)]
pub struct DecoderBackends {
    native: Option<Arc<dyn BarcodeDecoder>>,
    software: Option<Arc<dyn BarcodeDecoder>>,
}

impl DecoderBackends {
    pub fn new(
        native: Option<Arc<dyn BarcodeDecoder>>,
        software: Option<Arc<dyn BarcodeDecoder>>,
    ) -> Self {
        Self { native, software }
    }

    /// The built-in EAN decoder as the software backend, plus an optional
    /// platform detector.
    pub fn with_builtin(native: Option<Arc<dyn BarcodeDecoder>>) -> Self {
        Self::new(native, Some(Arc::new(EanDecoder)))
    }

    /// Availability of the platform detector alone.
    pub fn native_available(&self) -> bool {
        self.native.as_ref().is_some_and(|d| d.is_available())
    }

    pub fn probe(&self) -> ProbedBackends {
        ProbedBackends {
            native: self.native.clone().filter(|d| d.is_available()),
            software: self.software.clone().filter(|d| d.is_available()),
        }
    }
}

/// Backends that passed the availability probe.
#[derive(Clone)]
pub struct ProbedBackends {
    native: Option<Arc<dyn BarcodeDecoder>>,
    software: Option<Arc<dyn BarcodeDecoder>>,
}

impl ProbedBackends {
    pub fn native_available(&self) -> bool {
        self.native.is_some()
    }

    pub fn software_available(&self) -> bool {
        self.software.is_some()
    }

    pub fn mode(&self) -> ScanMode {
        ScanMode::select(self.native_available(), self.software_available())
    }

    pub fn reset(&self) {
        for decoder in self.native.iter().chain(self.software.iter()) {
            decoder.reset();
        }
    }

    /// Try every available backend in priority order on one frame. Backend
    /// errors count as "no result". Returns early once `cancel_token` fires.
    pub async fn detect(
        &self,
        frame: Arc<Frame>,
        source: FrameSource,
        cancel_token: &CancellationToken,
    ) -> Option<ScanHit> {
        for decoder in self.native.iter().chain(self.software.iter()) {
            let backend = decoder.backend();
            let result = tokio::task::spawn_blocking({
                let decoder = Arc::clone(decoder);
                let frame = Arc::clone(&frame);
                move || decoder.detect(&frame, source)
            })
            .await;

            if cancel_token.is_cancelled() {
                return None;
            }

            match result {
                Ok(Ok(detections)) => {
                    if let Some(hit) = ScanHit::from_detections(detections, backend, source) {
                        log_debug!("{backend:?} decoded {} from {source:?} frame", hit.text);
                        return Some(hit);
                    }
                }
                Ok(Err(err)) => log_debug!("{backend:?} failed on {source:?} frame: {err:#}"),
                Err(join_err) => log_warn!("{backend:?} worker join failed: {join_err}"),
            }
        }
        None
    }
}
