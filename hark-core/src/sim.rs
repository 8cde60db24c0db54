//! Simulated driver endpoint and capture notifier.
//!
//! A scriptable in-process stand-in for the real driver connection, so an
//! adapter lifecycle can be exercised end-to-end without hardware: pick the
//! implemented revision, script per-entry failure statuses, inspect the
//! recorded call log, and inject driver-side events or a death from the test
//! side. `hark-cli` runs its whole scenario against this module.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::capture::{CaptureStateListener, CaptureStateNotifier};
use crate::error::{HarkError, Result};
use crate::hal::{
    wire, DriverCallbackV0, DriverCallbackV1, DriverDeathRecipient, DriverEndpoint,
    DriverRevision, LoadReply, ParameterRangeReply, ParameterReply, PropertiesReply,
    PropertiesV3Reply, SoundTriggerHwV0, SoundTriggerHwV1, SoundTriggerHwV2, SoundTriggerHwV3,
    STATUS_OK,
};
use crate::types::recognition_mode;

// ---------------------------------------------------------------------------
// Call log
// ---------------------------------------------------------------------------

/// One recorded driver call, in arrival order. Wire arguments are kept whole
/// so callers can assert on translation output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    GetProperties,
    GetPropertiesV3,
    LoadSoundModel(wire::SoundModelV0),
    LoadSoundModelV1(wire::SoundModelV1),
    LoadPhraseSoundModel(wire::PhraseSoundModelV0),
    LoadPhraseSoundModelV1(wire::PhraseSoundModelV1),
    UnloadSoundModel(i32),
    StartRecognition(i32, wire::RecognitionConfigV0),
    StartRecognitionV1(i32, wire::RecognitionConfigV1),
    StartRecognitionV3(i32, wire::RecognitionConfigV3),
    StopRecognition(i32),
    GetModelState(i32),
    GetParameter(i32, i32),
    SetParameter(i32, i32, i32),
    QueryParameter(i32, i32),
    InterfaceDescriptor,
    LinkToDeath(u64),
    UnlinkToDeath,
}

/// Entry families whose reported status can be scripted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimOp {
    Properties,
    Load,
    Unload,
    Start,
    Stop,
    ModelState,
    Parameter,
}

#[derive(Clone)]
enum CallbackSlot {
    V0(Arc<dyn DriverCallbackV0>),
    V1(Arc<dyn DriverCallbackV1>),
}

struct SimState {
    calls: Vec<DriverCall>,
    statuses: HashMap<SimOp, i32>,
    fail_transport: bool,
    properties: wire::PropertiesV0,
    properties_v3: wire::PropertiesV3,
    descriptor: String,
    fixed_handle: Option<i32>,
    next_handle: i32,
    callback: Option<(i32, CallbackSlot)>,
    query_range: Option<wire::ModelParameterRangeV3>,
    parameter_value: i32,
    death_links: Vec<(Arc<dyn DriverDeathRecipient>, u64)>,
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Scriptable driver endpoint implementing every revision up to the one it is
/// constructed with.
pub struct SimDriver {
    revision: DriverRevision,
    state: Mutex<SimState>,
}

impl SimDriver {
    pub fn new(revision: DriverRevision) -> Self {
        let properties = wire::PropertiesV0 {
            implementor: "simulated".to_owned(),
            description: "simulated sound-trigger driver".to_owned(),
            version: 1,
            uuid: wire::RawUuid::default(),
            max_sound_models: 8,
            max_key_phrases: 2,
            max_users: 2,
            recognition_modes: recognition_mode::VOICE_TRIGGER
                | recognition_mode::GENERIC_TRIGGER,
            capture_transition: true,
            max_buffer_ms: 5000,
            concurrent_capture: false,
            trigger_in_event: false,
            power_consumption_mw: 10,
        };
        let properties_v3 = wire::PropertiesV3 {
            base: properties.clone(),
            supported_model_arch: "sim-arch-1".to_owned(),
            audio_capabilities: 0,
        };
        Self {
            revision,
            state: Mutex::new(SimState {
                calls: Vec::new(),
                statuses: HashMap::new(),
                fail_transport: false,
                properties,
                properties_v3,
                descriptor: format!("sound-trigger@{revision}"),
                fixed_handle: None,
                next_handle: 100,
                callback: None,
                query_range: None,
                parameter_value: 0,
                death_links: Vec::new(),
            }),
        }
    }

    pub fn revision(&self) -> DriverRevision {
        self.revision
    }

    // -- scripting ----------------------------------------------------------

    /// Scripts the status an entry family reports. Unscripted families report
    /// `STATUS_OK`.
    pub fn set_status(&self, op: SimOp, status: i32) {
        self.state.lock().statuses.insert(op, status);
    }

    /// Makes every entry fail at the transport layer instead of replying.
    pub fn set_transport_broken(&self, broken: bool) {
        self.state.lock().fail_transport = broken;
    }

    pub fn set_properties(&self, properties: wire::PropertiesV0) {
        let mut state = self.state.lock();
        state.properties_v3.base = properties.clone();
        state.properties = properties;
    }

    pub fn set_properties_v3(&self, properties: wire::PropertiesV3) {
        let mut state = self.state.lock();
        state.properties = properties.base.clone();
        state.properties_v3 = properties;
    }

    /// Flips the concurrent-capture capability while keeping the rest of the
    /// reported properties.
    pub fn set_concurrent_capture(&self, enabled: bool) {
        let mut state = self.state.lock();
        state.properties.concurrent_capture = enabled;
        state.properties_v3.base.concurrent_capture = enabled;
    }

    pub fn set_descriptor(&self, descriptor: impl Into<String>) {
        self.state.lock().descriptor = descriptor.into();
    }

    /// Makes every load reply with the same handle, the way some drivers
    /// reuse handle values. `None` restores auto-increment.
    pub fn set_fixed_handle(&self, handle: Option<i32>) {
        self.state.lock().fixed_handle = handle;
    }

    pub fn set_parameter_value(&self, value: i32) {
        self.state.lock().parameter_value = value;
    }

    /// Scripts the range reported by parameter queries; `None` reports the
    /// parameter as unsupported.
    pub fn set_query_range(&self, range: Option<wire::ModelParameterRangeV3>) {
        self.state.lock().query_range = range;
    }

    // -- inspection ---------------------------------------------------------

    pub fn calls(&self) -> Vec<DriverCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn death_link_count(&self) -> usize {
        self.state.lock().death_links.len()
    }

    // -- driver-side injection ----------------------------------------------

    /// Delivers a recognition event through the registered callback's base
    /// entry point, echoing the registration cookie.
    pub fn fire_recognition(&self, event: wire::RecognitionEventV0) {
        match self.callback_slot() {
            Some((cookie, CallbackSlot::V0(callback))) => {
                callback.recognition_callback(event, cookie);
            }
            Some((cookie, CallbackSlot::V1(callback))) => {
                callback.recognition_callback(event, cookie);
            }
            None => warn!("no callback registered; dropping injected event"),
        }
    }

    pub fn fire_phrase_recognition(&self, event: wire::PhraseRecognitionEventV0) {
        match self.callback_slot() {
            Some((cookie, CallbackSlot::V0(callback))) => {
                callback.phrase_recognition_callback(event, cookie);
            }
            Some((cookie, CallbackSlot::V1(callback))) => {
                callback.phrase_recognition_callback(event, cookie);
            }
            None => warn!("no callback registered; dropping injected event"),
        }
    }

    /// Delivers a shared-buffer event; requires a callback registered through
    /// a v1 entry point.
    pub fn fire_recognition_v1(&self, event: wire::RecognitionEventV1) {
        match self.callback_slot() {
            Some((cookie, CallbackSlot::V1(callback))) => {
                callback.recognition_callback_v1(event, cookie);
            }
            _ => warn!("no v1 callback registered; dropping injected event"),
        }
    }

    pub fn fire_phrase_recognition_v1(&self, event: wire::PhraseRecognitionEventV1) {
        match self.callback_slot() {
            Some((cookie, CallbackSlot::V1(callback))) => {
                callback.phrase_recognition_callback_v1(event, cookie);
            }
            _ => warn!("no v1 callback registered; dropping injected event"),
        }
    }

    /// Notifies every linked death recipient, as a dying driver process would.
    pub fn die(&self) {
        let links = {
            let state = self.state.lock();
            state.death_links.clone()
        };
        debug!(links = links.len(), "simulated driver death");
        for (recipient, cookie) in links {
            recipient.driver_died(cookie);
        }
    }

    // -- internals ----------------------------------------------------------

    fn status(&self, op: SimOp) -> i32 {
        self.state
            .lock()
            .statuses
            .get(&op)
            .copied()
            .unwrap_or(STATUS_OK)
    }

    fn check_transport(&self) -> Result<()> {
        if self.state.lock().fail_transport {
            Err(HarkError::Transport("simulated transport failure".to_owned()))
        } else {
            Ok(())
        }
    }

    fn record(&self, call: DriverCall) {
        self.state.lock().calls.push(call);
    }

    fn issue_handle(&self) -> i32 {
        let mut state = self.state.lock();
        match state.fixed_handle {
            Some(handle) => handle,
            None => {
                let handle = state.next_handle;
                state.next_handle += 1;
                handle
            }
        }
    }

    /// Clones the registration out of the lock so injected events never run
    /// a callback while the sim state is held.
    fn callback_slot(&self) -> Option<(i32, CallbackSlot)> {
        self.state.lock().callback.clone()
    }
}

impl SoundTriggerHwV0 for SimDriver {
    fn get_properties(&self, reply: PropertiesReply<'_>) -> Result<()> {
        self.check_transport()?;
        self.record(DriverCall::GetProperties);
        let properties = self.state.lock().properties.clone();
        reply(self.status(SimOp::Properties), properties);
        Ok(())
    }

    fn load_sound_model(
        &self,
        model: &wire::SoundModelV0,
        callback: Arc<dyn DriverCallbackV0>,
        cookie: i32,
        reply: LoadReply<'_>,
    ) -> Result<()> {
        self.check_transport()?;
        self.record(DriverCall::LoadSoundModel(model.clone()));
        let status = self.status(SimOp::Load);
        let handle = self.issue_handle();
        if status == STATUS_OK {
            self.state.lock().callback = Some((cookie, CallbackSlot::V0(callback)));
        }
        reply(status, handle);
        Ok(())
    }

    fn load_phrase_sound_model(
        &self,
        model: &wire::PhraseSoundModelV0,
        callback: Arc<dyn DriverCallbackV0>,
        cookie: i32,
        reply: LoadReply<'_>,
    ) -> Result<()> {
        self.check_transport()?;
        self.record(DriverCall::LoadPhraseSoundModel(model.clone()));
        let status = self.status(SimOp::Load);
        let handle = self.issue_handle();
        if status == STATUS_OK {
            self.state.lock().callback = Some((cookie, CallbackSlot::V0(callback)));
        }
        reply(status, handle);
        Ok(())
    }

    fn unload_sound_model(&self, model_handle: i32) -> Result<i32> {
        self.check_transport()?;
        self.record(DriverCall::UnloadSoundModel(model_handle));
        Ok(self.status(SimOp::Unload))
    }

    fn start_recognition(
        &self,
        model_handle: i32,
        config: &wire::RecognitionConfigV0,
        callback: Arc<dyn DriverCallbackV0>,
        cookie: i32,
    ) -> Result<i32> {
        self.check_transport()?;
        self.record(DriverCall::StartRecognition(model_handle, config.clone()));
        let status = self.status(SimOp::Start);
        if status == STATUS_OK {
            self.state.lock().callback = Some((cookie, CallbackSlot::V0(callback)));
        }
        Ok(status)
    }

    fn stop_recognition(&self, model_handle: i32) -> Result<i32> {
        self.check_transport()?;
        self.record(DriverCall::StopRecognition(model_handle));
        Ok(self.status(SimOp::Stop))
    }
}

impl SoundTriggerHwV1 for SimDriver {
    fn load_sound_model_v1(
        &self,
        model: &wire::SoundModelV1,
        callback: Arc<dyn DriverCallbackV1>,
        cookie: i32,
        reply: LoadReply<'_>,
    ) -> Result<()> {
        self.check_transport()?;
        self.record(DriverCall::LoadSoundModelV1(model.clone()));
        let status = self.status(SimOp::Load);
        let handle = self.issue_handle();
        if status == STATUS_OK {
            self.state.lock().callback = Some((cookie, CallbackSlot::V1(callback)));
        }
        reply(status, handle);
        Ok(())
    }

    fn load_phrase_sound_model_v1(
        &self,
        model: &wire::PhraseSoundModelV1,
        callback: Arc<dyn DriverCallbackV1>,
        cookie: i32,
        reply: LoadReply<'_>,
    ) -> Result<()> {
        self.check_transport()?;
        self.record(DriverCall::LoadPhraseSoundModelV1(model.clone()));
        let status = self.status(SimOp::Load);
        let handle = self.issue_handle();
        if status == STATUS_OK {
            self.state.lock().callback = Some((cookie, CallbackSlot::V1(callback)));
        }
        reply(status, handle);
        Ok(())
    }

    fn start_recognition_v1(
        &self,
        model_handle: i32,
        config: &wire::RecognitionConfigV1,
        callback: Arc<dyn DriverCallbackV1>,
        cookie: i32,
    ) -> Result<i32> {
        self.check_transport()?;
        self.record(DriverCall::StartRecognitionV1(model_handle, config.clone()));
        let status = self.status(SimOp::Start);
        if status == STATUS_OK {
            self.state.lock().callback = Some((cookie, CallbackSlot::V1(callback)));
        }
        Ok(status)
    }
}

impl SoundTriggerHwV2 for SimDriver {
    fn get_model_state(&self, model_handle: i32) -> Result<i32> {
        self.check_transport()?;
        self.record(DriverCall::GetModelState(model_handle));
        Ok(self.status(SimOp::ModelState))
    }
}

impl SoundTriggerHwV3 for SimDriver {
    fn get_properties_v3(&self, reply: PropertiesV3Reply<'_>) -> Result<()> {
        self.check_transport()?;
        self.record(DriverCall::GetPropertiesV3);
        let properties = self.state.lock().properties_v3.clone();
        reply(self.status(SimOp::Properties), properties);
        Ok(())
    }

    fn start_recognition_v3(
        &self,
        model_handle: i32,
        config: &wire::RecognitionConfigV3,
    ) -> Result<i32> {
        self.check_transport()?;
        self.record(DriverCall::StartRecognitionV3(model_handle, config.clone()));
        Ok(self.status(SimOp::Start))
    }

    fn get_parameter(
        &self,
        model_handle: i32,
        param: i32,
        reply: ParameterReply<'_>,
    ) -> Result<()> {
        self.check_transport()?;
        self.record(DriverCall::GetParameter(model_handle, param));
        let value = self.state.lock().parameter_value;
        reply(self.status(SimOp::Parameter), value);
        Ok(())
    }

    fn set_parameter(&self, model_handle: i32, param: i32, value: i32) -> Result<i32> {
        self.check_transport()?;
        self.record(DriverCall::SetParameter(model_handle, param, value));
        Ok(self.status(SimOp::Parameter))
    }

    fn query_parameter(
        &self,
        model_handle: i32,
        param: i32,
        reply: ParameterRangeReply<'_>,
    ) -> Result<()> {
        self.check_transport()?;
        self.record(DriverCall::QueryParameter(model_handle, param));
        let range = self.state.lock().query_range;
        reply(self.status(SimOp::Parameter), range);
        Ok(())
    }
}

impl DriverEndpoint for SimDriver {
    fn as_v0(self: Arc<Self>) -> Option<Arc<dyn SoundTriggerHwV0>> {
        Some(self)
    }

    fn as_v1(self: Arc<Self>) -> Option<Arc<dyn SoundTriggerHwV1>> {
        if self.revision >= DriverRevision::V1 {
            Some(self)
        } else {
            None
        }
    }

    fn as_v2(self: Arc<Self>) -> Option<Arc<dyn SoundTriggerHwV2>> {
        if self.revision >= DriverRevision::V2 {
            Some(self)
        } else {
            None
        }
    }

    fn as_v3(self: Arc<Self>) -> Option<Arc<dyn SoundTriggerHwV3>> {
        if self.revision >= DriverRevision::V3 {
            Some(self)
        } else {
            None
        }
    }

    fn interface_descriptor(&self) -> Result<String> {
        self.check_transport()?;
        self.record(DriverCall::InterfaceDescriptor);
        Ok(self.state.lock().descriptor.clone())
    }

    fn link_to_death(
        &self,
        recipient: Arc<dyn DriverDeathRecipient>,
        cookie: u64,
    ) -> Result<bool> {
        self.check_transport()?;
        self.record(DriverCall::LinkToDeath(cookie));
        self.state.lock().death_links.push((recipient, cookie));
        Ok(true)
    }

    fn unlink_to_death(&self, recipient: &Arc<dyn DriverDeathRecipient>) -> Result<bool> {
        self.check_transport()?;
        self.record(DriverCall::UnlinkToDeath);
        let mut state = self.state.lock();
        let before = state.death_links.len();
        state
            .death_links
            .retain(|(linked, _)| !Arc::ptr_eq(linked, recipient));
        Ok(state.death_links.len() < before)
    }
}

// ---------------------------------------------------------------------------
// Capture notifier
// ---------------------------------------------------------------------------

struct NotifierState {
    active: bool,
    listeners: Vec<Arc<dyn CaptureStateListener>>,
}

/// In-process capture-state source with a settable state.
pub struct SimCaptureNotifier {
    state: Mutex<NotifierState>,
}

impl SimCaptureNotifier {
    pub fn new(initially_active: bool) -> Self {
        Self {
            state: Mutex::new(NotifierState {
                active: initially_active,
                listeners: Vec::new(),
            }),
        }
    }

    /// Sets the capture state and notifies every listener of the new value.
    /// Listeners run outside the notifier lock; one of them may re-enter to
    /// unregister.
    pub fn set_state(&self, active: bool) {
        let listeners = {
            let mut state = self.state.lock();
            state.active = active;
            state.listeners.clone()
        };
        for listener in listeners {
            listener.on_capture_state_change(active);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }
}

impl CaptureStateNotifier for SimCaptureNotifier {
    fn register_listener(&self, listener: Arc<dyn CaptureStateListener>) -> bool {
        let mut state = self.state.lock();
        state.listeners.push(listener);
        state.active
    }

    fn unregister_listener(&self, listener: &Arc<dyn CaptureStateListener>) {
        self.state
            .lock()
            .listeners
            .retain(|registered| !Arc::ptr_eq(registered, listener));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revision_gates_the_endpoint_accessors() {
        let v1 = Arc::new(SimDriver::new(DriverRevision::V1));
        assert!(v1.clone().as_v0().is_some());
        assert!(v1.clone().as_v1().is_some());
        assert!(v1.clone().as_v2().is_none());
        assert!(v1.as_v3().is_none());

        let v3 = Arc::new(SimDriver::new(DriverRevision::V3));
        assert!(v3.clone().as_v2().is_some());
        assert!(v3.as_v3().is_some());
    }

    #[test]
    fn loads_auto_increment_unless_a_handle_is_fixed() {
        let sim = SimDriver::new(DriverRevision::V0);
        assert_eq!(sim.issue_handle(), 100);
        assert_eq!(sim.issue_handle(), 101);
        sim.set_fixed_handle(Some(29));
        assert_eq!(sim.issue_handle(), 29);
        assert_eq!(sim.issue_handle(), 29);
    }

    #[test]
    fn scripted_status_applies_to_its_family_only() {
        let sim = SimDriver::new(DriverRevision::V0);
        sim.set_status(SimOp::Start, -11);
        assert_eq!(sim.status(SimOp::Start), -11);
        assert_eq!(sim.status(SimOp::Stop), STATUS_OK);
    }

    #[test]
    fn notifier_reports_state_as_of_registration() {
        struct Recorder(Mutex<Vec<bool>>);
        impl CaptureStateListener for Recorder {
            fn on_capture_state_change(&self, active: bool) {
                self.0.lock().push(active);
            }
        }

        let notifier = SimCaptureNotifier::new(true);
        let listener = Arc::new(Recorder(Mutex::new(Vec::new())));
        let registered: Arc<dyn CaptureStateListener> = listener.clone();
        assert!(notifier.register_listener(registered.clone()));
        assert_eq!(notifier.listener_count(), 1);

        notifier.set_state(false);
        notifier.set_state(true);
        assert_eq!(*listener.0.lock(), vec![false, true]);

        notifier.unregister_listener(&registered);
        assert_eq!(notifier.listener_count(), 0);
        notifier.set_state(false);
        assert_eq!(*listener.0.lock(), vec![false, true]);
    }
}
