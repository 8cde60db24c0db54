//! Shims facing the driver and the capture notifier.
//!
//! The event and death bridges run on collaborator threads and only translate
//! and enqueue; they never touch the adapter lock or call back into the
//! driver. The capture listener bridge is different: it hands the update to
//! the adapter, which takes its lock to run the transition work inline.

use std::sync::{Arc, Weak};

use crate::capture::CaptureStateListener;
use crate::dispatch::{DeathRecipient, EventSender, ModelCallback, QueuedEvent};
use crate::hal::wire;
use crate::hal::{DriverCallbackV0, DriverCallbackV1, DriverDeathRecipient};

use super::{translate, CompatAdapter};

// ---------------------------------------------------------------------------
// Recognition events
// ---------------------------------------------------------------------------

/// Receives wire events for one loaded model and queues the canonical form.
///
/// Delivery routes to the callback captured at load time, while the handle
/// passed along comes from the event payload itself. The two can differ on
/// drivers that reuse handle values.
pub(crate) struct EventBridge {
    sender: EventSender,
    callback: Arc<dyn ModelCallback>,
}

impl EventBridge {
    pub(crate) fn new(sender: EventSender, callback: Arc<dyn ModelCallback>) -> Self {
        Self { sender, callback }
    }
}

impl DriverCallbackV0 for EventBridge {
    fn recognition_callback(&self, event: wire::RecognitionEventV0, _cookie: i32) {
        let (model_handle, event) = translate::recognition_event(event);
        self.sender.send(QueuedEvent::Recognition {
            callback: self.callback.clone(),
            model_handle,
            event,
        });
    }

    fn phrase_recognition_callback(&self, event: wire::PhraseRecognitionEventV0, _cookie: i32) {
        let (model_handle, event) = translate::phrase_recognition_event(event);
        self.sender.send(QueuedEvent::PhraseRecognition {
            callback: self.callback.clone(),
            model_handle,
            event,
        });
    }
}

impl DriverCallbackV1 for EventBridge {
    fn recognition_callback_v1(&self, event: wire::RecognitionEventV1, _cookie: i32) {
        let (model_handle, event) = translate::recognition_event_v1(event);
        self.sender.send(QueuedEvent::Recognition {
            callback: self.callback.clone(),
            model_handle,
            event,
        });
    }

    fn phrase_recognition_callback_v1(
        &self,
        event: wire::PhraseRecognitionEventV1,
        _cookie: i32,
    ) {
        let (model_handle, event) = translate::phrase_recognition_event_v1(event);
        self.sender.send(QueuedEvent::PhraseRecognition {
            callback: self.callback.clone(),
            model_handle,
            event,
        });
    }
}

// ---------------------------------------------------------------------------
// Death notification
// ---------------------------------------------------------------------------

/// Wraps a canonical death recipient behind the endpoint's native link. The
/// echoed cookie is ignored; routing is the bridge instance itself.
pub(crate) struct DeathBridge {
    sender: EventSender,
    recipient: Arc<dyn DeathRecipient>,
}

impl DeathBridge {
    pub(crate) fn new(sender: EventSender, recipient: Arc<dyn DeathRecipient>) -> Self {
        Self { sender, recipient }
    }
}

impl DriverDeathRecipient for DeathBridge {
    fn driver_died(&self, _cookie: u64) {
        self.sender.send(QueuedEvent::DriverDied {
            recipient: self.recipient.clone(),
        });
    }
}

// ---------------------------------------------------------------------------
// Capture state
// ---------------------------------------------------------------------------

/// Forwards notifier updates into the adapter. Holds a weak reference so a
/// detached or dropped adapter stops reacting even if the notifier keeps the
/// listener registered.
pub(crate) struct CaptureListenerBridge {
    adapter: Weak<CompatAdapter>,
}

impl CaptureListenerBridge {
    pub(crate) fn new(adapter: Weak<CompatAdapter>) -> Self {
        Self { adapter }
    }
}

impl CaptureStateListener for CaptureListenerBridge {
    fn on_capture_state_change(&self, active: bool) {
        if let Some(adapter) = self.adapter.upgrade() {
            adapter.handle_capture_state(active);
        }
    }
}
