use std::{
    path::{Path, PathBuf},
    sync::{atomic::AtomicBool, Arc},
};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use log::{error, info, warn};
use serde::Serialize;
use tokio::{
    sync::{oneshot, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::settings::SettingsStore;

use super::{
    camera::{
        self, with_stream, CameraBackend, SharedStream, TrackCapabilities, VideoConstraints,
        VideoDevice,
    },
    config::ScannerConfig,
    decoder::{DecoderBackends, ProbedBackends, ScanHit},
    diagnostics::{self, Clipboard, DiagnosticsReport},
    loop_worker::{continuous_decode_loop, polled_capture_loop, LoopContext},
    state::{ScanEvent, ScanMode, ScanStatus},
};

/// A started scan. Resolves with at most one hit.
pub struct ScanSession {
    pub id: String,
    pub mode: ScanMode,
    rx: oneshot::Receiver<ScanHit>,
}

impl ScanSession {
    /// `None` when the session ended without a result.
    pub async fn wait(self) -> Option<ScanHit> {
        self.rx.await.ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TorchState {
    pub supported: bool,
    pub on: bool,
}

struct ActiveStream {
    stream: SharedStream,
    constraints: VideoConstraints,
    capabilities: TrackCapabilities,
}

struct RunningSession {
    id: String,
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

#[derive(Default)]
struct ControllerInner {
    devices: Vec<VideoDevice>,
    stream: Option<ActiveStream>,
    session: Option<RunningSession>,
    probed: Option<ProbedBackends>,
    torch_on: bool,
}

/// Owns the camera stream and at most one running scan session.
#[derive(Clone)]
pub struct ScannerController {
    camera: Arc<dyn CameraBackend>,
    backends: DecoderBackends,
    settings: SettingsStore,
    config: ScannerConfig,
    inner: Arc<Mutex<ControllerInner>>,
    status: Arc<Mutex<ScanStatus>>,
}

impl ScannerController {
    pub fn new(
        camera: Arc<dyn CameraBackend>,
        backends: DecoderBackends,
        settings: SettingsStore,
        config: ScannerConfig,
    ) -> Self {
        Self {
            camera,
            backends,
            settings,
            config,
            inner: Arc::new(Mutex::new(ControllerInner::default())),
            status: Arc::new(Mutex::new(ScanStatus::default())),
        }
    }

    /// Enumerate cameras for the device picker. Never fails; an inaccessible
    /// host yields an empty list.
    pub async fn mount(&self) -> Vec<VideoDevice> {
        let devices = camera::enumerate(Arc::clone(&self.camera)).await;
        info!("Scanner mounted with {} video inputs", devices.len());
        self.inner.lock().await.devices = devices.clone();
        devices
    }

    pub async fn devices(&self) -> Vec<VideoDevice> {
        self.inner.lock().await.devices.clone()
    }

    pub async fn start_session(&self) -> Result<ScanSession> {
        let mut inner = self.inner.lock().await;
        Self::stop_session_locked(&mut inner, &self.status).await;

        if inner.stream.is_none() {
            inner.stream = Some(self.acquire_stream().await?);
            inner.torch_on = false;
        }
        let stream = inner
            .stream
            .as_ref()
            .map(|active| Arc::clone(&active.stream))
            .ok_or_else(|| anyhow!("camera stream missing after acquisition"))?;

        // Availability is probed once per session and cached for diagnostics.
        let backends = self.backends.probe();
        let mode = backends.mode();
        inner.probed = Some(backends.clone());

        let session_id = Uuid::new_v4().to_string();
        self.status.lock().await.begin(session_id.clone(), mode);

        let (result_tx, rx) = oneshot::channel();
        let cancel_token = CancellationToken::new();
        let ctx = LoopContext {
            session_id: session_id.clone(),
            stream,
            backends,
            status: Arc::clone(&self.status),
            config: self.config.clone(),
            cancel_token: cancel_token.clone(),
            in_flight: Arc::new(AtomicBool::new(false)),
            result_tx: Some(result_tx),
        };

        let handle = match mode {
            ScanMode::Polling => tokio::spawn(polled_capture_loop(ctx)),
            ScanMode::Continuous => tokio::spawn(continuous_decode_loop(ctx)),
        };
        inner.session = Some(RunningSession {
            id: session_id.clone(),
            handle,
            cancel_token,
        });

        info!("Scan session {session_id} started in {mode:?} mode");
        Ok(ScanSession {
            id: session_id,
            mode,
            rx,
        })
    }

    pub async fn cancel_session(&self) {
        let mut inner = self.inner.lock().await;
        Self::stop_session_locked(&mut inner, &self.status).await;
    }

    /// Stop scanning and release the camera.
    pub async fn unmount(&self) {
        let mut inner = self.inner.lock().await;
        Self::stop_session_locked(&mut inner, &self.status).await;
        Self::release_stream_locked(&mut inner).await;
        info!("Scanner unmounted");
    }

    /// Persist (or clear, with `None`) the camera choice. An open stream is
    /// reacquired on the new device; a running session keeps going on it.
    pub async fn select_device(&self, device_id: Option<String>) -> Result<()> {
        self.settings.remember_device(device_id).await?;

        let mut inner = self.inner.lock().await;
        inner.torch_on = false;

        let Some(shared) = inner.stream.as_ref().map(|active| Arc::clone(&active.stream)) else {
            return Ok(());
        };

        let opened = match camera::open_with_fallback(
            Arc::clone(&self.camera),
            self.settings.selected_device(),
        )
        .await
        {
            Ok(opened) => opened,
            Err(err) => {
                let message = format!("{err:#}");
                error!("Camera reacquisition failed: {message}");
                Self::stop_session_locked(&mut inner, &self.status).await;
                // The old device is no longer the selected one.
                Self::release_stream_locked(&mut inner).await;
                self.status.lock().await.fatal_error = Some(message);
                return Err(err);
            }
        };
        if opened.fell_back {
            self.forget_device().await;
        }

        let capabilities = opened.stream.capabilities();
        let mut previous = std::mem::replace(&mut *shared.lock().await, opened.stream);
        tokio::task::spawn_blocking(move || previous.stop())
            .await
            .map_err(|err| anyhow!("camera stop worker join failed: {err}"))?;

        if let Some(active) = inner.stream.as_mut() {
            active.constraints = opened.constraints;
            active.capabilities = capabilities;
        }
        self.status.lock().await.fatal_error = None;
        info!("Camera switched");
        Ok(())
    }

    pub async fn torch(&self) -> TorchState {
        let inner = self.inner.lock().await;
        TorchState {
            supported: inner
                .stream
                .as_ref()
                .map(|active| active.capabilities.torch)
                .unwrap_or(false),
            on: inner.torch_on,
        }
    }

    /// Turn the torch on or off. Unsupported tracks and repeated values are
    /// no-ops; a rejected constraint is logged and leaves the state unchanged.
    pub async fn set_torch(&self, on: bool) -> TorchState {
        let mut inner = self.inner.lock().await;
        let Some(active) = inner.stream.as_ref() else {
            return TorchState {
                supported: false,
                on: false,
            };
        };
        if !active.capabilities.torch || inner.torch_on == on {
            return TorchState {
                supported: active.capabilities.torch,
                on: inner.torch_on,
            };
        }

        match with_stream(&active.stream, move |stream| stream.apply_torch(on)).await {
            Ok(()) => inner.torch_on = on,
            Err(err) => warn!("Failed to apply torch constraint: {err:#}"),
        }
        TorchState {
            supported: true,
            on: inner.torch_on,
        }
    }

    pub async fn toggle_torch(&self) -> TorchState {
        let current = self.torch().await;
        self.set_torch(!current.on).await
    }

    pub async fn status(&self) -> ScanStatus {
        self.status.lock().await.clone()
    }

    pub async fn diagnostics(&self) -> DiagnosticsReport {
        let (probed, constraints) = {
            let inner = self.inner.lock().await;
            (
                inner.probed.clone(),
                inner.stream.as_ref().map(|active| active.constraints.clone()),
            )
        };
        let status = self.status().await;

        DiagnosticsReport {
            timestamp: Utc::now(),
            user_agent: diagnostics::platform_descriptor(),
            native_detector_available: probed
                .as_ref()
                .map(ProbedBackends::native_available)
                .unwrap_or_else(|| self.backends.native_available()),
            software_decoder_available: probed.as_ref().map(ProbedBackends::software_available),
            selected_device_id: self.settings.selected_device(),
            attempts: status.attempts,
            last_result: status.last_result.map(|hit| hit.text),
            consecutive_failures: status.consecutive_failures,
            video_constraints: constraints,
        }
    }

    pub async fn export_diagnostics(
        &self,
        dir: &Path,
        clipboard: Option<&dyn Clipboard>,
    ) -> Result<PathBuf> {
        let report = self.diagnostics().await;
        diagnostics::export_report(&report, dir, clipboard).await
    }

    async fn acquire_stream(&self) -> Result<ActiveStream> {
        let opened =
            match camera::open_with_fallback(Arc::clone(&self.camera), self.settings.selected_device())
                .await
            {
                Ok(opened) => opened,
                Err(err) => {
                    let message = format!("{err:#}");
                    error!("Camera acquisition failed: {message}");
                    let mut status = self.status.lock().await;
                    status.fatal_error = Some(message);
                    return Err(err).context("scanning disabled until a camera is available");
                }
            };

        if opened.fell_back {
            self.forget_device().await;
        }
        self.status.lock().await.fatal_error = None;

        let capabilities = opened.stream.capabilities();
        if let Some(id) = opened.stream.device_id() {
            info!("Camera stream acquired on {id}");
        }
        Ok(ActiveStream {
            stream: Arc::new(Mutex::new(opened.stream)),
            constraints: opened.constraints,
            capabilities,
        })
    }

    async fn forget_device(&self) {
        if let Err(err) = self.settings.remember_device(None).await {
            warn!("Failed to clear remembered camera: {err:#}");
        }
    }

    async fn release_stream_locked(inner: &mut ControllerInner) {
        if let Some(active) = inner.stream.take() {
            if let Err(err) = with_stream(&active.stream, |stream| {
                stream.stop();
                Ok(())
            })
            .await
            {
                warn!("Failed to stop camera stream: {err:#}");
            }
        }
        inner.torch_on = false;
        inner.probed = None;
    }

    async fn stop_session_locked(inner: &mut ControllerInner, status: &Arc<Mutex<ScanStatus>>) {
        let Some(session) = inner.session.take() else {
            return;
        };
        session.cancel_token.cancel();
        if let Err(err) = session.handle.await {
            error!("Scan session {} task failed to join: {err}", session.id);
        }

        // The loop settles its own state; this covers a task that never ran.
        let mut status = status.lock().await;
        if status.session_id.as_deref() == Some(session.id.as_str()) {
            status.transition(ScanEvent::Cancel);
            status.settle();
        }
    }
}
