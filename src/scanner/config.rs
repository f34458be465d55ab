use std::time::Duration;

/// Tunables for the acquisition loops.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Polled capture mode: time between screenshot attempts.
    pub poll_interval: Duration,

    /// Continuous mode: time between live-frame decodes.
    pub frame_interval: Duration,

    /// Continuous mode: stall-recovery timer period.
    pub stall_interval: Duration,
    /// Stall recovery fires when `attempts` is a positive multiple of this.
    pub stall_every_attempts: u32,

    /// "Nothing detected" hint once consecutive failures exceed this.
    pub failure_hint_after: u32,

    /// Still screenshot request size.
    pub screenshot_width: u32,
    pub screenshot_height: u32,

    /// Upper bound for one grab/screenshot/decode step.
    pub step_timeout: Duration,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1500),
            frame_interval: Duration::from_millis(500),
            stall_interval: Duration::from_millis(1500),
            stall_every_attempts: 6,
            failure_hint_after: 6,
            screenshot_width: 1920,
            screenshot_height: 1080,
            step_timeout: Duration::from_secs(5),
        }
    }
}

impl ScannerConfig {
    /// Stall recovery is due on this attempt count.
    pub fn stall_due(&self, attempts: u32) -> bool {
        self.stall_every_attempts > 0 && attempts > 0 && attempts % self.stall_every_attempts == 0
    }
}
