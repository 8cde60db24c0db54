//! # hark-core
//!
//! Compatibility adapter for sound-trigger drivers.
//!
//! The vendor interface for always-on sound-trigger hardware exists in four
//! incompatible revisions. This crate probes which revision a driver
//! connection implements and presents one canonical surface over all of
//! them, adding the bookkeeping the raw drivers leave to their callers:
//! a loaded-model ceiling, microphone arbitration against external capture,
//! and an explicit-flush queue for driver-originated callbacks.
//!
//! ## Architecture
//!
//! ```text
//! caller ──► CompatAdapter ──► translate ──► SoundTriggerHwV0..V3 (driver)
//!               │    ▲
//!    tracker / arbiter │ flush_callbacks()
//!               │    │
//! driver events ──► EventBridge ──► CallbackDispatcher (FIFO queue)
//! driver death  ──► DeathBridge ──►        │
//! capture state ──► CaptureListenerBridge ─┘ (synchronous, takes the lock)
//! ```
//!
//! Driver-facing bridges only translate and enqueue. Callbacks reach the
//! caller exclusively through [`CompatAdapter::flush_callbacks`], on the
//! flushing thread, with no internal lock held.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod adapter;
pub mod capture;
pub mod dispatch;
pub mod error;
pub mod hal;
pub mod sim;
pub mod types;

// Convenience re-exports for downstream crates
pub use adapter::{AdapterOptions, CompatAdapter, RecoveryAction};
pub use capture::{CaptureStateListener, CaptureStateNotifier};
pub use dispatch::{DeathRecipient, GlobalCallback, ModelCallback};
pub use error::{HarkError, Result};
pub use hal::{DriverEndpoint, DriverRevision};
pub use types::{
    ModelKind, PhraseRecognitionEvent, PhraseSoundModel, Properties, RecognitionConfig,
    RecognitionEvent, SoundModel,
};
