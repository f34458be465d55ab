//! In-memory camera, decoder and clipboard doubles for scanner tests.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use image::{GrayImage, Luma};

use super::{
    camera::{CameraBackend, TrackCapabilities, VideoConstraints, VideoDevice, VideoStream},
    decoder::{Backend, BarcodeDecoder, Detection, FrameSource},
    diagnostics::Clipboard,
    frame::Frame,
};

fn blank_frame() -> Frame {
    Frame::new(GrayImage::from_pixel(200, 50, Luma([128])))
}

/// Shared view into every stream a [`MockCamera`] hands out.
#[derive(Debug, Default)]
pub struct StreamProbe {
    pub torch_on: AtomicBool,
    pub torch_applies: AtomicUsize,
    pub stops: AtomicUsize,
}

pub struct MockStream {
    live: Option<Frame>,
    fail_grab: bool,
    still: Option<Frame>,
    torch: bool,
    fail_torch: bool,
    device_id: Option<String>,
    probe: Arc<StreamProbe>,
}

impl MockStream {
    /// Live frames show `frame`; no screenshots.
    pub fn showing(frame: Frame) -> Self {
        Self {
            live: Some(frame),
            fail_grab: false,
            still: None,
            torch: false,
            fail_torch: false,
            device_id: None,
            probe: Arc::default(),
        }
    }

    /// Live frames are flat gray; no screenshots.
    pub fn blank() -> Self {
        Self::showing(blank_frame())
    }

    pub fn with_screenshot(mut self, frame: Frame) -> Self {
        self.still = Some(frame);
        self
    }

    /// Every live frame grab errors.
    pub fn failing_grab(mut self) -> Self {
        self.fail_grab = true;
        self
    }
}

impl VideoStream for MockStream {
    fn grab_frame(&mut self) -> Result<Option<Frame>> {
        if self.fail_grab {
            bail!("video element not ready");
        }
        Ok(self.live.clone())
    }

    fn screenshot(&mut self, _width: u32, _height: u32) -> Result<Option<Frame>> {
        Ok(self.still.clone())
    }

    fn capabilities(&self) -> TrackCapabilities {
        TrackCapabilities { torch: self.torch }
    }

    fn apply_torch(&mut self, on: bool) -> Result<()> {
        self.probe.torch_applies.fetch_add(1, Ordering::SeqCst);
        if self.fail_torch {
            bail!("torch constraint rejected");
        }
        self.probe.torch_on.store(on, Ordering::SeqCst);
        Ok(())
    }

    fn device_id(&self) -> Option<String> {
        self.device_id.clone()
    }

    fn stop(&mut self) {
        self.probe.stops.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct MockCamera {
    devices: Vec<VideoDevice>,
    fail_enumeration: bool,
    rejected: Vec<String>,
    no_camera: bool,
    max_opens: Option<usize>,
    torch: bool,
    fail_torch: bool,
    live: Option<Frame>,
    opens: AtomicUsize,
    opened_with: Mutex<Vec<VideoConstraints>>,
    pub probe: Arc<StreamProbe>,
}

impl MockCamera {
    pub fn new() -> Self {
        Self {
            devices: vec![
                VideoDevice {
                    device_id: "cam-1".into(),
                    label: "Front".into(),
                },
                VideoDevice {
                    device_id: "cam-2".into(),
                    label: "Back".into(),
                },
            ],
            fail_enumeration: false,
            rejected: Vec::new(),
            no_camera: false,
            max_opens: None,
            torch: false,
            fail_torch: false,
            live: Some(blank_frame()),
            opens: AtomicUsize::new(0),
            opened_with: Mutex::new(Vec::new()),
            probe: Arc::default(),
        }
    }

    pub fn failing_enumeration(mut self) -> Self {
        self.fail_enumeration = true;
        self
    }

    pub fn rejecting_device(mut self, device_id: &str) -> Self {
        self.rejected.push(device_id.to_string());
        self
    }

    pub fn without_camera(mut self) -> Self {
        self.no_camera = true;
        self
    }

    /// Every open after the first `count` fails.
    pub fn allowing_opens(mut self, count: usize) -> Self {
        self.max_opens = Some(count);
        self
    }

    pub fn with_torch(mut self) -> Self {
        self.torch = true;
        self
    }

    pub fn with_failing_torch(mut self) -> Self {
        self.torch = true;
        self.fail_torch = true;
        self
    }

    pub fn showing(mut self, frame: Frame) -> Self {
        self.live = Some(frame);
        self
    }

    pub fn open_attempts(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn last_constraints(&self) -> Option<VideoConstraints> {
        self.opened_with.lock().ok()?.last().cloned()
    }
}

impl CameraBackend for MockCamera {
    fn enumerate_devices(&self) -> Result<Vec<VideoDevice>> {
        if self.fail_enumeration {
            bail!("enumeration not permitted");
        }
        Ok(self.devices.clone())
    }

    fn open_stream(&self, constraints: &VideoConstraints) -> Result<Box<dyn VideoStream>> {
        let attempt = self.opens.fetch_add(1, Ordering::SeqCst) + 1;
        if self.no_camera || self.max_opens.is_some_and(|max| attempt > max) {
            bail!("NotAllowedError: permission denied");
        }
        if let Some(id) = constraints.device_id() {
            if self.rejected.iter().any(|r| r == id) {
                bail!("OverconstrainedError: device {id} not found");
            }
        }
        self.opened_with
            .lock()
            .map_err(|_| anyhow!("constraint log poisoned"))?
            .push(constraints.clone());

        Ok(Box::new(MockStream {
            live: self.live.clone(),
            fail_grab: false,
            still: None,
            torch: self.torch,
            fail_torch: self.fail_torch,
            device_id: Some(constraints.device_id().unwrap_or("default").to_string()),
            probe: Arc::clone(&self.probe),
        }))
    }
}

pub struct MockDecoder {
    backend: Backend,
    available: bool,
    fail: bool,
    value: Option<String>,
    only_source: Option<FrameSource>,
    delay: Duration,
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    resets: AtomicUsize,
}

impl MockDecoder {
    fn with_backend(backend: Backend) -> Self {
        Self {
            backend,
            available: true,
            fail: false,
            value: None,
            only_source: None,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            resets: AtomicUsize::new(0),
        }
    }

    pub fn native() -> Self {
        Self::with_backend(Backend::NativeDetector)
    }

    pub fn software() -> Self {
        Self::with_backend(Backend::SoftwareDecoder)
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn returning(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }

    /// Report the value only for frames from `source`.
    pub fn only_for(mut self, source: FrameSource) -> Self {
        self.only_source = Some(source);
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

impl BarcodeDecoder for MockDecoder {
    fn backend(&self) -> Backend {
        self.backend
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn detect(&self, _frame: &Frame, source: FrameSource) -> Result<Vec<Detection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.fail {
            bail!("detector crashed");
        }
        if self.only_source.is_some_and(|only| only != source) {
            return Ok(Vec::new());
        }
        Ok(self
            .value
            .iter()
            .map(|value| Detection {
                raw_value: value.clone(),
                format: None,
            })
            .collect())
    }

    fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct MockClipboard {
    fail: bool,
    pub contents: Mutex<Option<String>>,
}

impl MockClipboard {
    pub fn failing() -> Self {
        Self {
            fail: true,
            contents: Mutex::new(None),
        }
    }

    pub fn text(&self) -> Option<String> {
        self.contents.lock().ok()?.clone()
    }
}

impl Clipboard for MockClipboard {
    fn write_text(&self, text: &str) -> Result<()> {
        if self.fail {
            bail!("clipboard permission denied");
        }
        *self
            .contents
            .lock()
            .map_err(|_| anyhow!("clipboard poisoned"))? = Some(text.to_string());
        Ok(())
    }
}
