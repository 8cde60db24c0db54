//! Canonical callback contracts and the explicit-flush event queue.
//!
//! Driver callbacks, death notifications and availability notices arrive on
//! collaborator threads (driver callback thread, notifier thread). Delivering
//! them inline would run caller code while a driver call is in flight or
//! while the adapter lock is held. Instead every producer enqueues a
//! [`QueuedEvent`] and delivery happens only when the owner calls
//! `flush_callbacks()`: FIFO, on the flushing thread, with no lock held.
//!
//! Each queued event captures its target callback at enqueue time, so a model
//! unloaded between enqueue and flush still receives its final events.

use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::error;

use crate::types::{PhraseRecognitionEvent, RecognitionEvent};

/// Queue slots before enqueueing starts dropping (and logging) events.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// Canonical callback traits
// ---------------------------------------------------------------------------

/// Per-model event sink, bound at load time.
///
/// The handle argument comes from the driver event payload, so late events
/// for a just-unloaded model still name the right target.
pub trait ModelCallback: Send + Sync {
    fn recognition_callback(&self, model_handle: i32, event: &RecognitionEvent);
    fn phrase_recognition_callback(&self, model_handle: i32, event: &PhraseRecognitionEvent);
}

/// Adapter-wide sink for resource-availability notices.
pub trait GlobalCallback: Send + Sync {
    /// A previously exhausted resource (model slot or microphone) freed up;
    /// rejected work may be retried.
    fn on_resources_available(&self);
}

/// Receives the bridged driver-death notification.
pub trait DeathRecipient: Send + Sync {
    fn on_driver_died(&self);
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

/// A single pending delivery.
pub(crate) enum QueuedEvent {
    Recognition {
        callback: Arc<dyn ModelCallback>,
        model_handle: i32,
        event: RecognitionEvent,
    },
    PhraseRecognition {
        callback: Arc<dyn ModelCallback>,
        model_handle: i32,
        event: PhraseRecognitionEvent,
    },
    ResourcesAvailable {
        callback: Arc<dyn GlobalCallback>,
    },
    DriverDied {
        recipient: Arc<dyn DeathRecipient>,
    },
}

impl QueuedEvent {
    fn kind_name(&self) -> &'static str {
        match self {
            QueuedEvent::Recognition { .. } => "recognition",
            QueuedEvent::PhraseRecognition { .. } => "phraseRecognition",
            QueuedEvent::ResourcesAvailable { .. } => "resourcesAvailable",
            QueuedEvent::DriverDied { .. } => "driverDied",
        }
    }

    /// The handle of a recognition event that ends its recognition, if any.
    /// The adapter uses this at flush time to move the model back to Loaded.
    pub(crate) fn ended_model_handle(&self) -> Option<i32> {
        match self {
            QueuedEvent::Recognition {
                model_handle,
                event,
                ..
            } if !event.recognition_still_active => Some(*model_handle),
            QueuedEvent::PhraseRecognition {
                model_handle,
                event,
                ..
            } if !event.common.recognition_still_active => Some(*model_handle),
            _ => None,
        }
    }

    /// Invokes the captured callback. Runs on the flushing thread; the caller
    /// must not hold any adapter lock.
    pub(crate) fn deliver(self) {
        match self {
            QueuedEvent::Recognition {
                callback,
                model_handle,
                event,
            } => callback.recognition_callback(model_handle, &event),
            QueuedEvent::PhraseRecognition {
                callback,
                model_handle,
                event,
            } => callback.phrase_recognition_callback(model_handle, &event),
            QueuedEvent::ResourcesAvailable { callback } => callback.on_resources_available(),
            QueuedEvent::DriverDied { recipient } => recipient.on_driver_died(),
        }
    }
}

/// Enqueue-only handle given to wire bridges and the death bridge. Cloneable
/// and lock-free, so producers can run on any collaborator thread.
#[derive(Clone)]
pub(crate) struct EventSender {
    tx: Sender<QueuedEvent>,
}

impl EventSender {
    pub(crate) fn send(&self, event: QueuedEvent) {
        if let Err(TrySendError::Full(event)) = self.tx.try_send(event) {
            error!(kind = event.kind_name(), "callback queue full; dropping event");
        }
    }
}

/// The bounded FIFO behind `flush_callbacks()`.
pub(crate) struct CallbackDispatcher {
    tx: Sender<QueuedEvent>,
    rx: Receiver<QueuedEvent>,
}

impl CallbackDispatcher {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self { tx, rx }
    }

    pub(crate) fn sender(&self) -> EventSender {
        EventSender {
            tx: self.tx.clone(),
        }
    }

    /// Pops the oldest pending event, if any. Draining and delivering are
    /// separate steps so the owner can update state between the two.
    pub(crate) fn try_next(&self) -> Option<QueuedEvent> {
        self.rx.try_recv().ok()
    }
}
