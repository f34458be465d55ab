//! Camera acquisition and barcode decoding.

pub mod camera;
pub mod commands;
pub mod config;
pub mod controller;
pub mod decoder;
pub mod diagnostics;
pub mod ean;
pub mod frame;
pub mod loop_worker;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

pub use camera::{CameraBackend, VideoConstraints, VideoDevice, VideoStream};
pub use config::ScannerConfig;
pub use controller::{ScanSession, ScannerController, TorchState};
pub use decoder::{Backend, BarcodeDecoder, DecoderBackends, FrameSource, ScanHit};
pub use diagnostics::{Clipboard, DiagnosticsReport};
pub use frame::Frame;
pub use state::{ScanMode, ScanState, ScanStatus};
