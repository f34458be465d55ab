use std::time::{Duration, Instant};

use serde::Serialize;

use crate::models::Product;

/// How long a first delete request stays armed.
pub const CONFIRMATION_WINDOW: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum DeleteOutcome {
    /// First request; repeat within the window to commit.
    ConfirmationRequired,
    Deleted { product: Product },
    NotFound,
}

/// Confirm-then-commit bookkeeping for product deletion.
#[derive(Debug)]
pub struct DeletionGuard {
    pending: Option<(String, Instant)>,
    window: Duration,
}

impl Default for DeletionGuard {
    fn default() -> Self {
        Self::new(CONFIRMATION_WINDOW)
    }
}

impl DeletionGuard {
    pub fn new(window: Duration) -> Self {
        Self {
            pending: None,
            window,
        }
    }

    /// Returns true when this request confirms an armed one for the same barcode.
    /// Otherwise the request (re)arms the confirmation.
    pub fn request(&mut self, barcode: &str, now: Instant) -> bool {
        let confirmed = matches!(
            &self.pending,
            Some((armed, at)) if armed == barcode && now.duration_since(*at) <= self.window
        );

        if confirmed {
            self.pending = None;
        } else {
            self.pending = Some((barcode.to_string(), now));
        }
        confirmed
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }

    pub fn is_armed_for(&self, barcode: &str, now: Instant) -> bool {
        matches!(
            &self.pending,
            Some((armed, at)) if armed == barcode && now.duration_since(*at) <= self.window
        )
    }
}
