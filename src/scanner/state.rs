use serde::Serialize;

use super::decoder::ScanHit;

/// Acquisition strategy for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ScanMode {
    /// Periodic screenshots, live frame first.
    Polling,
    /// Persistent live-frame decoding with stall recovery.
    Continuous,
}

impl ScanMode {
    /// Continuous decoding only when the software decoder is the sole option.
    pub fn select(native_available: bool, software_available: bool) -> Self {
        if !native_available && software_available {
            ScanMode::Continuous
        } else {
            ScanMode::Polling
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ScanState {
    #[default]
    Idle,
    Polling,
    ContinuousDecoding,
    TearingDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanEvent {
    Start(ScanMode),
    FrameTick,
    Result,
    StallTimeout,
    Cancel,
}

impl ScanState {
    /// Next state for `event`; `None` when the event does not apply here.
    pub fn on(self, event: ScanEvent) -> Option<ScanState> {
        use ScanEvent::*;
        use ScanState::*;

        match (self, event) {
            (Idle, Start(ScanMode::Polling)) => Some(Polling),
            (Idle, Start(ScanMode::Continuous)) => Some(ContinuousDecoding),
            (Polling, FrameTick) => Some(Polling),
            (ContinuousDecoding, FrameTick | StallTimeout) => Some(ContinuousDecoding),
            (Polling | ContinuousDecoding, Result | Cancel) => Some(TearingDown),
            // Teardown always settles to idle.
            (TearingDown, _) => Some(Idle),
            _ => None,
        }
    }

    pub fn is_active(self) -> bool {
        matches!(self, ScanState::Polling | ScanState::ContinuousDecoding)
    }
}

/// Observable progress of the current (or last) session.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStatus {
    pub state: ScanState,
    pub mode: Option<ScanMode>,
    pub session_id: Option<String>,
    pub attempts: u32,
    pub consecutive_failures: u32,
    pub last_result: Option<ScanHit>,
    /// A result is pending delivery; no further attempts start.
    pub suppressed: bool,
    /// Set when the camera could not be acquired; cleared on the next success.
    pub fatal_error: Option<String>,
    pub nothing_detected_hint: bool,
}

impl ScanStatus {
    /// Apply `event`, ignoring events that do not fit the current state.
    pub fn transition(&mut self, event: ScanEvent) -> bool {
        match self.state.on(event) {
            Some(next) => {
                self.state = next;
                true
            }
            None => false,
        }
    }

    pub fn begin(&mut self, session_id: String, mode: ScanMode) {
        self.session_id = Some(session_id);
        self.mode = Some(mode);
        self.attempts = 0;
        self.consecutive_failures = 0;
        self.last_result = None;
        self.suppressed = false;
        self.fatal_error = None;
        self.nothing_detected_hint = false;
        self.transition(ScanEvent::Start(mode));
    }

    pub fn record_hit(&mut self, hit: ScanHit) {
        self.consecutive_failures = 0;
        self.nothing_detected_hint = false;
        self.suppressed = true;
        self.last_result = Some(hit);
    }

    pub fn record_miss(&mut self, hint_after: u32) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.nothing_detected_hint = self.consecutive_failures > hint_after;
    }

    /// Finish a teardown.
    pub fn settle(&mut self) {
        if self.state == ScanState::TearingDown {
            self.state = ScanState::Idle;
        }
    }

    /// True when this status belongs to `session_id` and may still start attempts.
    pub fn accepts_attempts(&self, session_id: &str) -> bool {
        self.state.is_active()
            && !self.suppressed
            && self.fatal_error.is_none()
            && self.session_id.as_deref() == Some(session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::decoder::{Backend, FrameSource};

    #[test]
    fn session_lifecycle() {
        let mut status = ScanStatus::default();
        assert!(!status.transition(ScanEvent::FrameTick));

        status.begin("s1".into(), ScanMode::Continuous);
        assert_eq!(status.state, ScanState::ContinuousDecoding);
        assert!(status.transition(ScanEvent::StallTimeout));
        assert!(status.accepts_attempts("s1"));
        assert!(!status.accepts_attempts("s2"));

        assert!(status.transition(ScanEvent::Result));
        assert_eq!(status.state, ScanState::TearingDown);
        assert!(status.transition(ScanEvent::Cancel));
        assert_eq!(status.state, ScanState::Idle);
    }

    #[test]
    fn polling_ignores_stall_timeouts() {
        assert_eq!(ScanState::Polling.on(ScanEvent::StallTimeout), None);
        assert_eq!(ScanState::Idle.on(ScanEvent::Result), None);
    }

    #[test]
    fn hint_after_more_than_six_misses() {
        let mut status = ScanStatus::default();
        for _ in 0..6 {
            status.record_miss(6);
        }
        assert!(!status.nothing_detected_hint);
        status.record_miss(6);
        assert!(status.nothing_detected_hint);

        status.record_hit(ScanHit {
            text: "1".into(),
            backend: Backend::SoftwareDecoder,
            source: FrameSource::Live,
        });
        assert_eq!(status.consecutive_failures, 0);
        assert!(!status.nothing_detected_hint);
        assert!(status.suppressed);
    }

    #[test]
    fn new_session_forgets_previous_result() {
        let mut status = ScanStatus::default();
        status.begin("s1".into(), ScanMode::Polling);
        status.record_hit(ScanHit {
            text: "96385074".into(),
            backend: Backend::NativeDetector,
            source: FrameSource::Still,
        });
        status.transition(ScanEvent::Result);
        status.settle();

        status.begin("s2".into(), ScanMode::Polling);
        assert!(status.last_result.is_none());
        assert!(status.accepts_attempts("s2"));
    }

    #[test]
    fn mode_selection() {
        assert_eq!(ScanMode::select(true, true), ScanMode::Polling);
        assert_eq!(ScanMode::select(false, true), ScanMode::Continuous);
        assert_eq!(ScanMode::select(false, false), ScanMode::Polling);
    }
}
