//! Boundary to the external capture-state signal.
//!
//! Elsewhere in the system an audio service knows whether some unrelated
//! client is actively capturing from the microphone. The adapter only needs a
//! yes/no signal plus change notifications, so the boundary is a plain
//! observer pair: the adapter registers a [`CaptureStateListener`] with the
//! system's [`CaptureStateNotifier`] and unregisters it on detach.

use std::sync::Arc;

/// Receives capture-state transitions. Invoked on the notifier's thread;
/// implementations keep the work short and never call back into the notifier.
pub trait CaptureStateListener: Send + Sync {
    fn on_capture_state_change(&self, active: bool);
}

/// The external service that knows whether capture is in use.
pub trait CaptureStateNotifier: Send + Sync {
    /// Registers a listener and returns the capture state as of registration,
    /// so no transition is lost between reading the state and subscribing.
    fn register_listener(&self, listener: Arc<dyn CaptureStateListener>) -> bool;

    /// Removes a previously registered listener (matched by pointer identity).
    fn unregister_listener(&self, listener: &Arc<dyn CaptureStateListener>);
}
