//! The canonical adapter over a probed driver connection.
//!
//! [`CompatAdapter`] gives callers one stable control surface regardless of
//! which interface revision the driver speaks:
//!
//! ```text
//!   caller ──► CompatAdapter ──► tracker / arbiter checks
//!                  │
//!                  ▼
//!            translate to wire shape ──► driver entry for the bound revision
//!
//!   driver event ──► EventBridge ──► dispatcher queue ──► flush_callbacks()
//!                                                         ──► canonical callback
//! ```
//!
//! All mutable state sits behind one `parking_lot::Mutex`, held across the
//! driver call of each mutating operation so the bookkeeping matches what the
//! driver actually accepted. Delivery via [`CompatAdapter::flush_callbacks`]
//! runs with the lock released, so a callback may immediately issue new
//! adapter calls.

mod arbiter;
mod binding;
mod bridge;
mod tracker;
mod translate;

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::capture::{CaptureStateListener, CaptureStateNotifier};
use crate::dispatch::{
    CallbackDispatcher, DeathRecipient, EventSender, GlobalCallback, ModelCallback, QueuedEvent,
    DEFAULT_QUEUE_CAPACITY,
};
use crate::error::{HarkError, Result};
use crate::hal::{DriverDeathRecipient, DriverEndpoint, DriverRevision, STATUS_OK};
use crate::types::{
    ModelKind, ModelParameterRange, PhraseRecognitionEvent, PhraseSoundModel, Properties,
    RecognitionConfig, RecognitionEvent, SoundModel,
};

use self::arbiter::{CaptureArbiter, CaptureEdge};
use self::binding::Binding;
use self::bridge::{CaptureListenerBridge, DeathBridge, EventBridge};
use self::tracker::{ResourceTracker, TrackedModel};

/// Action run when a caller demands a driver restart via [`CompatAdapter::reboot`].
pub type RecoveryAction = Box<dyn Fn() + Send + Sync>;

/// The wire cookie is pass-through; routing uses the callback object itself.
const DRIVER_COOKIE: i32 = 0;

/// Construction knobs; `Default` matches production use.
#[derive(Debug, Clone)]
pub struct AdapterOptions {
    /// Dispatcher slots before enqueueing starts dropping events.
    pub queue_capacity: usize,
    /// First cookie handed to the endpoint's death-link primitive; each link
    /// consumes the next value.
    pub death_cookie_seed: u64,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            death_cookie_seed: 0,
        }
    }
}

/// A death link as the endpoint knows it: the canonical recipient for unlink
/// lookups, and the exact bridge object handed to the endpoint.
struct DeathLink {
    recipient: Arc<dyn DeathRecipient>,
    wrapped: Arc<dyn DriverDeathRecipient>,
}

struct AdapterState {
    tracker: ResourceTracker,
    arbiter: CaptureArbiter,
    global_callback: Option<Arc<dyn GlobalCallback>>,
    death_links: Vec<DeathLink>,
    capture_listener: Option<Arc<dyn CaptureStateListener>>,
    next_death_cookie: u64,
}

pub struct CompatAdapter {
    binding: Binding,
    properties: Properties,
    dispatcher: CallbackDispatcher,
    sender: EventSender,
    notifier: Arc<dyn CaptureStateNotifier>,
    recovery: RecoveryAction,
    state: Mutex<AdapterState>,
}

impl std::fmt::Debug for CompatAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompatAdapter").finish_non_exhaustive()
    }
}

impl CompatAdapter {
    /// Probes the endpoint's revision, fetches the hardware properties, and
    /// on drivers without concurrent-capture support subscribes to the
    /// capture-state notifier.
    ///
    /// # Errors
    ///
    /// [`HarkError::NoSupportedRevision`] when the endpoint implements no
    /// known revision; [`HarkError::Driver`] / [`HarkError::Transport`] when
    /// the property fetch fails.
    pub fn create(
        endpoint: Arc<dyn DriverEndpoint>,
        notifier: Arc<dyn CaptureStateNotifier>,
        recovery: RecoveryAction,
    ) -> Result<Arc<Self>> {
        Self::create_with_options(endpoint, notifier, recovery, AdapterOptions::default())
    }

    pub fn create_with_options(
        endpoint: Arc<dyn DriverEndpoint>,
        notifier: Arc<dyn CaptureStateNotifier>,
        recovery: RecoveryAction,
        options: AdapterOptions,
    ) -> Result<Arc<Self>> {
        let binding = Binding::probe(endpoint)?;
        let properties = fetch_properties(&binding)?;
        info!(
            revision = %binding.revision(),
            implementor = %properties.implementor,
            max_models = properties.max_sound_models,
            concurrent_capture = properties.concurrent_capture,
            "driver bound"
        );

        let dispatcher = CallbackDispatcher::with_capacity(options.queue_capacity);
        let sender = dispatcher.sender();
        let max_models = properties.max_sound_models as usize;
        let concurrent_capture = properties.concurrent_capture;

        let adapter = Arc::new(Self {
            binding,
            properties,
            dispatcher,
            sender,
            notifier,
            recovery,
            state: Mutex::new(AdapterState {
                tracker: ResourceTracker::new(max_models),
                arbiter: CaptureArbiter::new(false),
                global_callback: None,
                death_links: Vec::new(),
                capture_listener: None,
                next_death_cookie: options.death_cookie_seed,
            }),
        });

        // A driver that can share the microphone needs no arbitration; only
        // subscribe when capture activity must displace recognitions.
        if !concurrent_capture {
            let listener: Arc<dyn CaptureStateListener> =
                Arc::new(CaptureListenerBridge::new(Arc::downgrade(&adapter)));
            let initially_busy = adapter.notifier.register_listener(listener.clone());
            let mut state = adapter.state.lock();
            state.capture_listener = Some(listener);
            state.arbiter = CaptureArbiter::new(initially_busy);
        }

        Ok(adapter)
    }

    /// The revision the construction probe bound.
    pub fn revision(&self) -> DriverRevision {
        self.binding.revision()
    }

    /// Hardware properties in canonical form, cached at construction.
    pub fn get_properties(&self) -> Properties {
        self.properties.clone()
    }

    // -- model lifecycle ----------------------------------------------------

    /// Loads a generic sound model, returning the driver's model handle.
    ///
    /// # Errors
    ///
    /// [`HarkError::ResourceContention`] when the model ceiling is reached;
    /// the driver is not called in that case.
    pub fn load_sound_model(
        &self,
        model: &SoundModel,
        callback: Arc<dyn ModelCallback>,
    ) -> Result<i32> {
        let mut state = self.state.lock();
        if state.tracker.at_capacity() {
            debug!(
                loaded = state.tracker.loaded_count(),
                "load denied; model ceiling reached"
            );
            return Err(HarkError::ResourceContention);
        }

        let bridge = Arc::new(EventBridge::new(self.sender.clone(), callback.clone()));
        let mut reply = None;
        match self.binding.revision() {
            DriverRevision::V0 => {
                let wire_model = translate::sound_model_v0(model);
                self.binding.v0().load_sound_model(
                    &wire_model,
                    bridge.clone(),
                    DRIVER_COOKIE,
                    &mut |status, handle| reply = Some((status, handle)),
                )?;
            }
            _ => {
                let wire_model = translate::sound_model_v1(model);
                self.binding.v1()?.load_sound_model_v1(
                    &wire_model,
                    bridge.clone(),
                    DRIVER_COOKIE,
                    &mut |status, handle| reply = Some((status, handle)),
                )?;
            }
        }
        let (status, handle) = reply.ok_or_else(missing_reply)?;
        check_status(status)?;

        state.tracker.register(
            handle,
            TrackedModel {
                kind: model.kind,
                callback,
                bridge,
                active: false,
            },
        );
        debug!(
            handle,
            loaded = state.tracker.loaded_count(),
            "sound model loaded"
        );
        Ok(handle)
    }

    /// Keyphrase counterpart of [`CompatAdapter::load_sound_model`].
    pub fn load_phrase_sound_model(
        &self,
        model: &PhraseSoundModel,
        callback: Arc<dyn ModelCallback>,
    ) -> Result<i32> {
        let mut state = self.state.lock();
        if state.tracker.at_capacity() {
            debug!(
                loaded = state.tracker.loaded_count(),
                "load denied; model ceiling reached"
            );
            return Err(HarkError::ResourceContention);
        }

        let bridge = Arc::new(EventBridge::new(self.sender.clone(), callback.clone()));
        let mut reply = None;
        match self.binding.revision() {
            DriverRevision::V0 => {
                let wire_model = translate::phrase_sound_model_v0(model);
                self.binding.v0().load_phrase_sound_model(
                    &wire_model,
                    bridge.clone(),
                    DRIVER_COOKIE,
                    &mut |status, handle| reply = Some((status, handle)),
                )?;
            }
            _ => {
                let wire_model = translate::phrase_sound_model_v1(model);
                self.binding.v1()?.load_phrase_sound_model_v1(
                    &wire_model,
                    bridge.clone(),
                    DRIVER_COOKIE,
                    &mut |status, handle| reply = Some((status, handle)),
                )?;
            }
        }
        let (status, handle) = reply.ok_or_else(missing_reply)?;
        check_status(status)?;

        state.tracker.register(
            handle,
            TrackedModel {
                kind: ModelKind::Keyphrase,
                callback,
                bridge,
                active: false,
            },
        );
        debug!(
            handle,
            loaded = state.tracker.loaded_count(),
            "phrase sound model loaded"
        );
        Ok(handle)
    }

    /// Unloads a loaded model. When this frees the last slot of a full
    /// tracker, one global `on_resources_available` is queued.
    ///
    /// Panics if `model_handle` was never loaded; that is a caller bug, not a
    /// driver condition.
    pub fn unload_sound_model(&self, model_handle: i32) -> Result<()> {
        let mut state = self.state.lock();
        state.tracker.expect_loaded(model_handle);
        let was_at_capacity = state.tracker.at_capacity();

        let status = self.binding.v0().unload_sound_model(model_handle)?;
        check_status(status)?;

        state.tracker.remove(model_handle);
        if was_at_capacity && !state.tracker.at_capacity() {
            if let Some(callback) = &state.global_callback {
                self.sender.send(QueuedEvent::ResourcesAvailable {
                    callback: callback.clone(),
                });
            }
            debug!("model ceiling cleared");
        }
        debug!(
            handle = model_handle,
            loaded = state.tracker.loaded_count(),
            "sound model unloaded"
        );
        Ok(())
    }

    // -- recognition --------------------------------------------------------

    /// Starts recognition on a loaded model. The capture device id and the
    /// capture stream handle travel inside the wire config on every revision.
    ///
    /// Panics if `model_handle` was never loaded.
    ///
    /// # Errors
    ///
    /// [`HarkError::ResourceContention`] while external capture holds the
    /// microphone; the driver is not called in that case.
    pub fn start_recognition(
        &self,
        model_handle: i32,
        device_id: i32,
        capture_handle: i32,
        config: &RecognitionConfig,
    ) -> Result<()> {
        let mut state = self.state.lock();
        let bridge = state.tracker.expect_loaded(model_handle).bridge.clone();
        if !state.arbiter.permits_start() {
            debug!(handle = model_handle, "start denied; capture in use");
            return Err(HarkError::ResourceContention);
        }

        let status = match self.binding.revision() {
            DriverRevision::V0 => {
                let wire_config =
                    translate::recognition_config_v0(config, device_id, capture_handle);
                self.binding.v0().start_recognition(
                    model_handle,
                    &wire_config,
                    bridge,
                    DRIVER_COOKIE,
                )?
            }
            DriverRevision::V1 | DriverRevision::V2 => {
                let wire_config =
                    translate::recognition_config_v1(config, device_id, capture_handle);
                self.binding.v1()?.start_recognition_v1(
                    model_handle,
                    &wire_config,
                    bridge,
                    DRIVER_COOKIE,
                )?
            }
            DriverRevision::V3 => {
                let wire_config =
                    translate::recognition_config_v3(config, device_id, capture_handle);
                self.binding
                    .v3()?
                    .start_recognition_v3(model_handle, &wire_config)?
            }
        };
        check_status(status)?;

        state.tracker.mark_active(model_handle);
        debug!(handle = model_handle, "recognition started");
        Ok(())
    }

    /// Stops recognition. Forwarded to the driver unconditionally, tracked or
    /// not, mirroring the driver's own tolerance for redundant stops.
    pub fn stop_recognition(&self, model_handle: i32) -> Result<()> {
        let mut state = self.state.lock();
        let status = self.binding.v0().stop_recognition(model_handle)?;
        check_status(status)?;
        state.tracker.mark_inactive_if_present(model_handle);
        debug!(handle = model_handle, "recognition stopped");
        Ok(())
    }

    /// Asks the driver to emit the model's current state as an immediate
    /// forced recognition event on the registered callback.
    ///
    /// # Errors
    ///
    /// [`HarkError::NotSupported`] below v2; the driver is not called.
    pub fn force_recognition_event(&self, model_handle: i32) -> Result<()> {
        if self.binding.revision() < DriverRevision::V2 {
            return Err(HarkError::NotSupported {
                revision: self.binding.revision(),
            });
        }
        let status = self.binding.v2()?.get_model_state(model_handle)?;
        check_status(status)
    }

    // -- model parameters ---------------------------------------------------

    /// Reads a tunable model parameter. Supported from v3 only.
    pub fn get_model_parameter(&self, model_handle: i32, param: i32) -> Result<i32> {
        if self.binding.revision() < DriverRevision::V3 {
            return Err(HarkError::NotSupported {
                revision: self.binding.revision(),
            });
        }
        let mut reply = None;
        self.binding
            .v3()?
            .get_parameter(model_handle, param, &mut |status, value| {
                reply = Some((status, value));
            })?;
        let (status, value) = reply.ok_or_else(missing_reply)?;
        check_status(status)?;
        Ok(value)
    }

    /// Writes a tunable model parameter. Supported from v3 only.
    pub fn set_model_parameter(&self, model_handle: i32, param: i32, value: i32) -> Result<()> {
        if self.binding.revision() < DriverRevision::V3 {
            return Err(HarkError::NotSupported {
                revision: self.binding.revision(),
            });
        }
        let status = self.binding.v3()?.set_parameter(model_handle, param, value)?;
        check_status(status)
    }

    /// Queries the valid range of a model parameter. `Ok(None)` means the
    /// parameter is unsupported; below v3 that answer is given without a
    /// driver call, since the entry point does not exist there.
    pub fn query_parameter(
        &self,
        model_handle: i32,
        param: i32,
    ) -> Result<Option<ModelParameterRange>> {
        if self.binding.revision() < DriverRevision::V3 {
            return Ok(None);
        }
        let mut reply = None;
        self.binding
            .v3()?
            .query_parameter(model_handle, param, &mut |status, range| {
                reply = Some((status, range));
            })?;
        let (status, range) = reply.ok_or_else(missing_reply)?;
        check_status(status)?;
        Ok(range.map(translate::parameter_range))
    }

    // -- callbacks and lifecycle --------------------------------------------

    /// Registers the global callback used for resource-availability notices.
    /// Bookkeeping only; the driver is not involved.
    pub fn register_callback(&self, callback: Arc<dyn GlobalCallback>) {
        self.state.lock().global_callback = Some(callback);
    }

    /// Links `recipient` to the driver connection's lifetime. The
    /// notification is delivered on flush, never inline from the transport's
    /// death thread.
    pub fn link_to_death(&self, recipient: Arc<dyn DeathRecipient>) -> Result<()> {
        let mut state = self.state.lock();
        let cookie = state.next_death_cookie;
        state.next_death_cookie += 1;

        let wrapped: Arc<dyn DriverDeathRecipient> =
            Arc::new(DeathBridge::new(self.sender.clone(), recipient.clone()));
        let linked = self
            .binding
            .endpoint()
            .link_to_death(wrapped.clone(), cookie)?;
        if !linked {
            return Err(HarkError::Transport("driver refused death link".to_owned()));
        }
        state.death_links.push(DeathLink { recipient, wrapped });
        Ok(())
    }

    /// Unlinks a previously linked recipient, matched by pointer identity.
    pub fn unlink_to_death(&self, recipient: &Arc<dyn DeathRecipient>) -> Result<()> {
        let mut state = self.state.lock();
        match state
            .death_links
            .iter()
            .position(|link| Arc::ptr_eq(&link.recipient, recipient))
        {
            Some(index) => {
                let link = state.death_links.remove(index);
                self.binding.endpoint().unlink_to_death(&link.wrapped)?;
                Ok(())
            }
            None => {
                warn!("unlink requested for an unknown death recipient");
                Ok(())
            }
        }
    }

    /// The driver connection's interface-descriptor string.
    pub fn interface_descriptor(&self) -> Result<String> {
        self.binding.endpoint().interface_descriptor()
    }

    /// Invokes the recovery action supplied at construction. The adapter
    /// itself makes no driver call; a hung or wedged driver is the reason
    /// this exists.
    pub fn reboot(&self) {
        warn!("driver reboot requested; invoking recovery action");
        (self.recovery)();
    }

    /// Delivers every queued callback in arrival order, then returns. Nothing
    /// reaches a canonical callback except through here.
    pub fn flush_callbacks(&self) {
        while let Some(event) = self.dispatcher.try_next() {
            if let Some(model_handle) = event.ended_model_handle() {
                self.state
                    .lock()
                    .tracker
                    .mark_inactive_if_present(model_handle);
            }
            event.deliver();
        }
    }

    /// Severs the adapter from its collaborators: unregisters the capture
    /// listener and drops local callback and death-link bookkeeping. No
    /// driver call is made; the connection itself belongs to the caller.
    pub fn detach(&self) {
        let listener = {
            let mut state = self.state.lock();
            state.global_callback = None;
            state.death_links.clear();
            state.capture_listener.take()
        };
        // Outside the state lock; the notifier may be mid-dispatch on
        // another thread.
        if let Some(listener) = listener {
            self.notifier.unregister_listener(&listener);
        }
        info!("adapter detached");
    }

    // -- capture arbitration ------------------------------------------------

    /// Entry point for the capture listener bridge. Runs on the notifier's
    /// thread; driver stops for displaced recognitions happen here,
    /// synchronously, before the update returns.
    pub(crate) fn handle_capture_state(&self, active: bool) {
        let mut state = self.state.lock();
        let Some(edge) = state.arbiter.observe(active) else {
            return;
        };
        match edge {
            CaptureEdge::BecameBusy => {
                let displaced = state.tracker.drain_active();
                info!(aborted = displaced.len(), "external capture active");
                for (model_handle, kind, callback) in displaced {
                    match self.binding.v0().stop_recognition(model_handle) {
                        Ok(status) if status == STATUS_OK => {}
                        Ok(status) => warn!(
                            handle = model_handle,
                            status, "driver stop failed while displacing recognition"
                        ),
                        Err(err) => error!(
                            handle = model_handle,
                            error = %err,
                            "driver transport failed while displacing recognition"
                        ),
                    }
                    match kind {
                        ModelKind::Generic => self.sender.send(QueuedEvent::Recognition {
                            callback,
                            model_handle,
                            event: RecognitionEvent::aborted(ModelKind::Generic),
                        }),
                        ModelKind::Keyphrase => {
                            self.sender.send(QueuedEvent::PhraseRecognition {
                                callback,
                                model_handle,
                                event: PhraseRecognitionEvent::aborted(),
                            })
                        }
                    }
                }
            }
            CaptureEdge::BecameFree => {
                info!("external capture released");
                if let Some(callback) = &state.global_callback {
                    self.sender.send(QueuedEvent::ResourcesAvailable {
                        callback: callback.clone(),
                    });
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Construction helpers
// ---------------------------------------------------------------------------

fn fetch_properties(binding: &Binding) -> Result<Properties> {
    match binding.revision() {
        DriverRevision::V3 => {
            let mut reply = None;
            binding.v3()?.get_properties_v3(&mut |status, properties| {
                reply = Some((status, properties));
            })?;
            let (status, properties) = reply.ok_or_else(missing_reply)?;
            check_status(status)?;
            Ok(translate::properties_v3(properties))
        }
        _ => {
            let mut reply = None;
            binding.v0().get_properties(&mut |status, properties| {
                reply = Some((status, properties));
            })?;
            let (status, properties) = reply.ok_or_else(missing_reply)?;
            check_status(status)?;
            Ok(translate::properties(properties))
        }
    }
}

fn missing_reply() -> HarkError {
    HarkError::Transport("driver returned no reply".to_owned())
}

fn check_status(status: i32) -> Result<()> {
    if status == STATUS_OK {
        Ok(())
    } else {
        Err(HarkError::Driver { status })
    }
}
