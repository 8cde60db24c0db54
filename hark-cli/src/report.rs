//! Report shapes for a diagnostic run, plus the counting sinks that feed
//! them. Everything serializes to camelCase JSON, matching the core types.

use std::sync::atomic::{AtomicU32, Ordering};

use serde::Serialize;

use hark_core::{
    DeathRecipient, GlobalCallback, ModelCallback, ModelKind, PhraseRecognitionEvent, Properties,
    RecognitionEvent,
};
use hark_core::types::{ModelParameterRange, RecognitionStatus};

// ---------------------------------------------------------------------------
// Serializable report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeReport {
    pub requested_revision: String,
    pub bound_revision: String,
    pub interface_descriptor: String,
    pub properties: Properties,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelReport {
    pub index: usize,
    pub kind: ModelKind,
    pub handle: i32,
    pub started: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventReport {
    pub injected: u32,
    pub delivered: u32,
    pub delivered_phrase: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureReport {
    /// False on drivers that capture concurrently; no listener is registered
    /// and the rest of the fields stay zero.
    pub arbitration_enabled: bool,
    pub aborted_on_conflict: u32,
    pub start_rejected_during_conflict: bool,
    pub resources_available_after_release: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterReport {
    pub supported: bool,
    pub value_round_trip: Option<i32>,
    pub range: Option<ModelParameterRange>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeathReport {
    pub linked: bool,
    pub delivered: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioReport {
    pub probe: ProbeReport,
    pub models: Vec<ModelReport>,
    pub events: EventReport,
    pub capture: CaptureReport,
    pub force_event_supported: bool,
    pub parameters: ParameterReport,
    pub death: DeathReport,
}

// ---------------------------------------------------------------------------
// Counting sinks
// ---------------------------------------------------------------------------

/// Model callback counting deliveries instead of recording payloads.
#[derive(Default)]
pub struct CountingModelSink {
    events: AtomicU32,
    phrase_events: AtomicU32,
    aborted: AtomicU32,
}

impl CountingModelSink {
    pub fn events(&self) -> u32 {
        self.events.load(Ordering::SeqCst)
    }

    pub fn phrase_events(&self) -> u32 {
        self.phrase_events.load(Ordering::SeqCst)
    }

    pub fn aborted(&self) -> u32 {
        self.aborted.load(Ordering::SeqCst)
    }
}

impl ModelCallback for CountingModelSink {
    fn recognition_callback(&self, _model_handle: i32, event: &RecognitionEvent) {
        self.events.fetch_add(1, Ordering::SeqCst);
        if event.status == RecognitionStatus::Aborted {
            self.aborted.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn phrase_recognition_callback(&self, _model_handle: i32, event: &PhraseRecognitionEvent) {
        self.phrase_events.fetch_add(1, Ordering::SeqCst);
        if event.common.status == RecognitionStatus::Aborted {
            self.aborted.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[derive(Default)]
pub struct CountingGlobalSink {
    available: AtomicU32,
}

impl CountingGlobalSink {
    pub fn available(&self) -> u32 {
        self.available.load(Ordering::SeqCst)
    }
}

impl GlobalCallback for CountingGlobalSink {
    fn on_resources_available(&self) {
        self.available.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct CountingDeathSink {
    died: AtomicU32,
}

impl CountingDeathSink {
    pub fn died(&self) -> u32 {
        self.died.load(Ordering::SeqCst)
    }
}

impl DeathRecipient for CountingDeathSink {
    fn on_driver_died(&self) {
        self.died.fetch_add(1, Ordering::SeqCst);
    }
}
