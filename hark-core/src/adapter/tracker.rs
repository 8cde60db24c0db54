//! Count-based bookkeeping of loaded models against the driver's ceiling.
//!
//! The ceiling counts loads, not distinct handles: a driver is free to hand
//! out the same handle twice, so an insert may overwrite an earlier entry
//! while the count still moves by one.

use std::collections::HashMap;
use std::sync::Arc;

use crate::dispatch::ModelCallback;
use crate::types::ModelKind;

use super::bridge::EventBridge;

/// Per-model state kept from load until unload.
pub(crate) struct TrackedModel {
    pub(crate) kind: ModelKind,
    pub(crate) callback: Arc<dyn ModelCallback>,
    pub(crate) bridge: Arc<EventBridge>,
    pub(crate) active: bool,
}

pub(crate) struct ResourceTracker {
    max_models: usize,
    loaded_count: usize,
    models: HashMap<i32, TrackedModel>,
}

impl ResourceTracker {
    pub(crate) fn new(max_models: usize) -> Self {
        Self {
            max_models,
            loaded_count: 0,
            models: HashMap::new(),
        }
    }

    pub(crate) fn at_capacity(&self) -> bool {
        self.loaded_count >= self.max_models
    }

    pub(crate) fn loaded_count(&self) -> usize {
        self.loaded_count
    }

    #[cfg(test)]
    pub(crate) fn active_count(&self) -> usize {
        self.models.values().filter(|model| model.active).count()
    }

    pub(crate) fn register(&mut self, handle: i32, model: TrackedModel) {
        self.loaded_count += 1;
        self.models.insert(handle, model);
    }

    /// Panics if `handle` was never loaded: asking about an unknown handle is
    /// a caller bug, not a driver condition.
    pub(crate) fn expect_loaded(&self, handle: i32) -> &TrackedModel {
        match self.models.get(&handle) {
            Some(model) => model,
            None => panic!("model handle {handle} is not loaded"),
        }
    }

    /// Removes the entry and decrements the load count. Panics if `handle`
    /// was never loaded.
    pub(crate) fn remove(&mut self, handle: i32) -> TrackedModel {
        match self.models.remove(&handle) {
            Some(model) => {
                self.loaded_count -= 1;
                model
            }
            None => panic!("model handle {handle} is not loaded"),
        }
    }

    pub(crate) fn mark_active(&mut self, handle: i32) {
        match self.models.get_mut(&handle) {
            Some(model) => model.active = true,
            None => panic!("model handle {handle} is not loaded"),
        }
    }

    /// Clears the active flag if the model is still tracked. Terminal events
    /// and stop requests may race an unload, so an unknown handle is fine.
    pub(crate) fn mark_inactive_if_present(&mut self, handle: i32) {
        if let Some(model) = self.models.get_mut(&handle) {
            model.active = false;
        }
    }

    /// Snapshots every recognizing model and clears their active flags.
    pub(crate) fn drain_active(&mut self) -> Vec<(i32, ModelKind, Arc<dyn ModelCallback>)> {
        let mut drained = Vec::new();
        for (handle, model) in self.models.iter_mut() {
            if model.active {
                model.active = false;
                drained.push((*handle, model.kind, model.callback.clone()));
            }
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::CallbackDispatcher;
    use crate::types::{PhraseRecognitionEvent, RecognitionEvent};

    struct NullCallback;

    impl ModelCallback for NullCallback {
        fn recognition_callback(&self, _model_handle: i32, _event: &RecognitionEvent) {}
        fn phrase_recognition_callback(
            &self,
            _model_handle: i32,
            _event: &PhraseRecognitionEvent,
        ) {
        }
    }

    fn entry(kind: ModelKind) -> TrackedModel {
        let dispatcher = CallbackDispatcher::with_capacity(4);
        let callback: Arc<dyn ModelCallback> = Arc::new(NullCallback);
        TrackedModel {
            kind,
            callback: callback.clone(),
            bridge: Arc::new(EventBridge::new(dispatcher.sender(), callback)),
            active: false,
        }
    }

    #[test]
    fn ceiling_counts_loads_not_distinct_handles() {
        let mut tracker = ResourceTracker::new(2);
        assert!(!tracker.at_capacity());
        tracker.register(29, entry(ModelKind::Generic));
        tracker.register(29, entry(ModelKind::Generic));
        assert!(tracker.at_capacity());
        assert_eq!(tracker.loaded_count(), 2);
    }

    #[test]
    fn remove_returns_below_capacity() {
        let mut tracker = ResourceTracker::new(1);
        tracker.register(7, entry(ModelKind::Keyphrase));
        assert!(tracker.at_capacity());
        let removed = tracker.remove(7);
        assert_eq!(removed.kind, ModelKind::Keyphrase);
        assert!(!tracker.at_capacity());
        assert_eq!(tracker.loaded_count(), 0);
    }

    #[test]
    #[should_panic(expected = "not loaded")]
    fn remove_of_unknown_handle_panics() {
        let mut tracker = ResourceTracker::new(4);
        tracker.remove(14);
    }

    #[test]
    #[should_panic(expected = "not loaded")]
    fn expect_loaded_of_unknown_handle_panics() {
        let tracker = ResourceTracker::new(4);
        tracker.expect_loaded(14);
    }

    #[test]
    fn drain_active_snapshots_and_clears_flags() {
        let mut tracker = ResourceTracker::new(4);
        tracker.register(1, entry(ModelKind::Generic));
        tracker.register(2, entry(ModelKind::Keyphrase));
        tracker.register(3, entry(ModelKind::Generic));
        tracker.mark_active(1);
        tracker.mark_active(2);
        assert_eq!(tracker.active_count(), 2);

        let mut drained = tracker.drain_active();
        drained.sort_by_key(|(handle, _, _)| *handle);
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].0, 1);
        assert_eq!(drained[0].1, ModelKind::Generic);
        assert_eq!(drained[1].0, 2);
        assert_eq!(drained[1].1, ModelKind::Keyphrase);
        assert_eq!(tracker.active_count(), 0);
        assert!(tracker.drain_active().is_empty());
    }

    #[test]
    fn mark_inactive_tolerates_unknown_handles() {
        let mut tracker = ResourceTracker::new(4);
        tracker.register(5, entry(ModelKind::Generic));
        tracker.mark_active(5);
        tracker.mark_inactive_if_present(17);
        assert_eq!(tracker.active_count(), 1);
        tracker.mark_inactive_if_present(5);
        assert_eq!(tracker.active_count(), 0);
    }
}
