//! Driver-side abstraction: one trait per interface revision.
//!
//! The vendor ships four incompatible revisions of the sound-trigger driver
//! interface. Each revision extends its predecessor, so the traits chain as
//! supertraits (`SoundTriggerHwV3: SoundTriggerHwV2: ...`). A concrete driver
//! connection implements [`DriverEndpoint`], whose checked accessors
//! (`as_v0()..as_v3()`) stand in for interface-descriptor probing; the adapter
//! probes once at construction and never again.
//!
//! ## Call conventions
//!
//! Entry points with a single status result return the raw driver status
//! (`Ok(0)` on success). Entry points with multi-value results take a reply
//! closure, matching the driver's continuation-style RPC: the implementation
//! invokes the closure exactly once before returning. An `Err` from any
//! method means the transport itself failed and is unrecoverable.
//!
//! Driver-originated events arrive on [`DriverCallbackV0`]/[`DriverCallbackV1`]
//! objects registered at load/start time. Implementations of those callbacks
//! must only enqueue work; calling back into the adapter would deadlock
//! against its internal lock.

pub mod wire;

use std::sync::Arc;

use crate::error::Result;

/// Driver status for a successful call.
pub const STATUS_OK: i32 = 0;

/// The four supported driver interface revisions, oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DriverRevision {
    V0,
    V1,
    V2,
    V3,
}

impl std::fmt::Display for DriverRevision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DriverRevision::V0 => "v0",
            DriverRevision::V1 => "v1",
            DriverRevision::V2 => "v2",
            DriverRevision::V3 => "v3",
        };
        f.write_str(name)
    }
}

/// Reply closure for load entry points: `(status, model_handle)`.
pub type LoadReply<'a> = &'a mut dyn FnMut(i32, i32);
/// Reply closure for base property fetches.
pub type PropertiesReply<'a> = &'a mut dyn FnMut(i32, wire::PropertiesV0);
/// Reply closure for extended property fetches.
pub type PropertiesV3Reply<'a> = &'a mut dyn FnMut(i32, wire::PropertiesV3);
/// Reply closure for parameter reads: `(status, value)`.
pub type ParameterReply<'a> = &'a mut dyn FnMut(i32, i32);
/// Reply closure for parameter range queries; `None` means unsupported.
pub type ParameterRangeReply<'a> = &'a mut dyn FnMut(i32, Option<wire::ModelParameterRangeV3>);

// ---------------------------------------------------------------------------
// Driver event callbacks
// ---------------------------------------------------------------------------

/// Event callback registered with v0 load/start entry points. Events carry
/// their model handle in the payload (`wire::RecognitionEventV0::model`).
pub trait DriverCallbackV0: Send + Sync {
    fn recognition_callback(&self, event: wire::RecognitionEventV0, cookie: i32);
    fn phrase_recognition_callback(&self, event: wire::PhraseRecognitionEventV0, cookie: i32);
}

/// v1 extension: events with shared-buffer payloads.
pub trait DriverCallbackV1: DriverCallbackV0 {
    fn recognition_callback_v1(&self, event: wire::RecognitionEventV1, cookie: i32);
    fn phrase_recognition_callback_v1(&self, event: wire::PhraseRecognitionEventV1, cookie: i32);
}

/// Receives the death notification for a linked driver connection.
pub trait DriverDeathRecipient: Send + Sync {
    fn driver_died(&self, cookie: u64);
}

// ---------------------------------------------------------------------------
// Revision traits
// ---------------------------------------------------------------------------

/// Baseline revision: inline payloads.
pub trait SoundTriggerHwV0: Send + Sync {
    fn get_properties(&self, reply: PropertiesReply<'_>) -> Result<()>;

    fn load_sound_model(
        &self,
        model: &wire::SoundModelV0,
        callback: Arc<dyn DriverCallbackV0>,
        cookie: i32,
        reply: LoadReply<'_>,
    ) -> Result<()>;

    fn load_phrase_sound_model(
        &self,
        model: &wire::PhraseSoundModelV0,
        callback: Arc<dyn DriverCallbackV0>,
        cookie: i32,
        reply: LoadReply<'_>,
    ) -> Result<()>;

    fn unload_sound_model(&self, model_handle: i32) -> Result<i32>;

    fn start_recognition(
        &self,
        model_handle: i32,
        config: &wire::RecognitionConfigV0,
        callback: Arc<dyn DriverCallbackV0>,
        cookie: i32,
    ) -> Result<i32>;

    fn stop_recognition(&self, model_handle: i32) -> Result<i32>;
}

/// v1: payloads move to shared buffers.
pub trait SoundTriggerHwV1: SoundTriggerHwV0 {
    fn load_sound_model_v1(
        &self,
        model: &wire::SoundModelV1,
        callback: Arc<dyn DriverCallbackV1>,
        cookie: i32,
        reply: LoadReply<'_>,
    ) -> Result<()>;

    fn load_phrase_sound_model_v1(
        &self,
        model: &wire::PhraseSoundModelV1,
        callback: Arc<dyn DriverCallbackV1>,
        cookie: i32,
        reply: LoadReply<'_>,
    ) -> Result<()>;

    fn start_recognition_v1(
        &self,
        model_handle: i32,
        config: &wire::RecognitionConfigV1,
        callback: Arc<dyn DriverCallbackV1>,
        cookie: i32,
    ) -> Result<i32>;
}

/// v2: adds the model-state query behind `force_recognition_event`.
pub trait SoundTriggerHwV2: SoundTriggerHwV1 {
    /// Requests an immediate forced event for an active model; the event
    /// itself arrives on the callback registered at load/start.
    fn get_model_state(&self, model_handle: i32) -> Result<i32>;
}

/// v3: extended properties, device-folding recognition config, parameters.
pub trait SoundTriggerHwV3: SoundTriggerHwV2 {
    fn get_properties_v3(&self, reply: PropertiesV3Reply<'_>) -> Result<()>;

    /// Unlike earlier revisions this entry takes no callback; events route
    /// through the callback registered at load time.
    fn start_recognition_v3(
        &self,
        model_handle: i32,
        config: &wire::RecognitionConfigV3,
    ) -> Result<i32>;

    fn get_parameter(&self, model_handle: i32, param: i32, reply: ParameterReply<'_>)
        -> Result<()>;

    fn set_parameter(&self, model_handle: i32, param: i32, value: i32) -> Result<i32>;

    fn query_parameter(
        &self,
        model_handle: i32,
        param: i32,
        reply: ParameterRangeReply<'_>,
    ) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// A concrete driver connection. The `as_*` accessors return `Some` for every
/// revision the connection implements; the adapter probes descending and
/// binds the highest. Every connection implements at least v0, the base of
/// the revision chain.
pub trait DriverEndpoint: Send + Sync {
    fn as_v0(self: Arc<Self>) -> Option<Arc<dyn SoundTriggerHwV0>>;
    fn as_v1(self: Arc<Self>) -> Option<Arc<dyn SoundTriggerHwV1>> {
        None
    }
    fn as_v2(self: Arc<Self>) -> Option<Arc<dyn SoundTriggerHwV2>> {
        None
    }
    fn as_v3(self: Arc<Self>) -> Option<Arc<dyn SoundTriggerHwV3>> {
        None
    }

    /// The connection's interface-descriptor string.
    fn interface_descriptor(&self) -> Result<String>;

    /// Registers a death recipient with the underlying connection. Returns
    /// whether the link was established.
    fn link_to_death(&self, recipient: Arc<dyn DriverDeathRecipient>, cookie: u64) -> Result<bool>;

    /// Removes a previously established death link (matched by pointer
    /// identity). Returns whether a link was removed.
    fn unlink_to_death(&self, recipient: &Arc<dyn DriverDeathRecipient>) -> Result<bool>;
}
