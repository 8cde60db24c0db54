//! End-to-end walks over the simulated driver: every revision, the model
//! ceiling at production scale, capture displacement and driver death.

use std::sync::Arc;

use parking_lot::Mutex;

use hark_core::hal::wire;
use hark_core::sim::{DriverCall, SimCaptureNotifier, SimDriver};
use hark_core::types::{
    recognition_mode, ConfidenceLevel, Phrase, PhraseRecognitionExtra, RecognitionStatus,
};
use hark_core::{
    CompatAdapter, DeathRecipient, DriverRevision, GlobalCallback, HarkError, ModelCallback,
    ModelKind, PhraseRecognitionEvent, PhraseSoundModel, RecognitionConfig, RecognitionEvent,
    SoundModel,
};

// ---------------------------------------------------------------------------
// Recording fakes
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RecordingModel {
    events: Mutex<Vec<(i32, RecognitionEvent)>>,
    phrase_events: Mutex<Vec<(i32, PhraseRecognitionEvent)>>,
}

impl ModelCallback for RecordingModel {
    fn recognition_callback(&self, model_handle: i32, event: &RecognitionEvent) {
        self.events.lock().push((model_handle, event.clone()));
    }

    fn phrase_recognition_callback(&self, model_handle: i32, event: &PhraseRecognitionEvent) {
        self.phrase_events.lock().push((model_handle, event.clone()));
    }
}

#[derive(Default)]
struct CountingGlobal {
    available: Mutex<u32>,
}

impl GlobalCallback for CountingGlobal {
    fn on_resources_available(&self) {
        *self.available.lock() += 1;
    }
}

#[derive(Default)]
struct CountingDeath {
    died: Mutex<u32>,
}

impl DeathRecipient for CountingDeath {
    fn on_driver_died(&self) {
        *self.died.lock() += 1;
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn generic_model() -> SoundModel {
    SoundModel {
        kind: ModelKind::Generic,
        uuid: "12345678-2345-3456-4567-abcdef987654".parse().unwrap(),
        vendor_uuid: "87654321-5432-6543-7654-456789fedcba".parse().unwrap(),
        data: vec![91, 92, 93, 94, 95],
    }
}

fn phrase_model() -> PhraseSoundModel {
    PhraseSoundModel {
        common: SoundModel {
            kind: ModelKind::Keyphrase,
            ..generic_model()
        },
        phrases: vec![Phrase {
            id: 123,
            users: vec![5, 6, 7],
            locale: "locale".to_owned(),
            text: "text".to_owned(),
            recognition_modes: recognition_mode::VOICE_TRIGGER,
        }],
    }
}

fn config() -> RecognitionConfig {
    RecognitionConfig {
        capture_requested: true,
        phrase_extras: vec![PhraseRecognitionExtra {
            id: 123,
            confidence_level: 4,
            recognition_modes: 5,
            levels: vec![ConfidenceLevel {
                user_id: 234,
                level_percent: 34,
            }],
        }],
        data: vec![5, 4, 3, 2, 1],
        audio_capabilities: 0,
    }
}

fn phrase_event(model: i32) -> wire::PhraseRecognitionEventV0 {
    wire::PhraseRecognitionEventV0 {
        common: wire::RecognitionEventV0 {
            status: wire::recognition_status::SUCCESS,
            model_type: wire::model_type::KEYPHRASE,
            model,
            ..wire::RecognitionEventV0::default()
        },
        phrase_extras: vec![wire::PhraseRecognitionExtraV0 {
            id: 123,
            confidence_level: 87,
            recognition_modes: recognition_mode::VOICE_TRIGGER,
            levels: Vec::new(),
        }],
    }
}

fn create(
    sim: &Arc<SimDriver>,
    notifier: &Arc<SimCaptureNotifier>,
) -> Arc<CompatAdapter> {
    CompatAdapter::create(sim.clone(), notifier.clone(), Box::new(|| {})).unwrap()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn full_lifecycle_walks_every_revision() {
    for revision in [
        DriverRevision::V0,
        DriverRevision::V1,
        DriverRevision::V2,
        DriverRevision::V3,
    ] {
        let sim = Arc::new(SimDriver::new(revision));
        let notifier = Arc::new(SimCaptureNotifier::new(false));
        let adapter = create(&sim, &notifier);
        assert_eq!(adapter.revision(), revision);
        assert_eq!(
            adapter.interface_descriptor().unwrap(),
            format!("sound-trigger@{revision}")
        );

        let expected_arch = if revision == DriverRevision::V3 {
            "sim-arch-1"
        } else {
            ""
        };
        assert_eq!(
            adapter.get_properties().supported_model_arch,
            expected_arch,
            "properties shape for {revision}"
        );

        let callback = Arc::new(RecordingModel::default());
        let handle = adapter
            .load_phrase_sound_model(&phrase_model(), callback.clone())
            .unwrap();
        adapter.start_recognition(handle, 7, 8, &config()).unwrap();

        sim.fire_phrase_recognition(phrase_event(handle));
        adapter.flush_callbacks();
        {
            let events = callback.phrase_events.lock();
            assert_eq!(events.len(), 1, "one event delivered on {revision}");
            assert_eq!(events[0].0, handle);
            assert_eq!(events[0].1.common.status, RecognitionStatus::Success);
            assert_eq!(events[0].1.phrase_extras[0].confidence_level, 87);
        }

        adapter.stop_recognition(handle).unwrap();
        adapter.unload_sound_model(handle).unwrap();
        adapter.detach();
        assert_eq!(notifier.listener_count(), 0);

        let calls = sim.calls();
        let used_v1_load = calls
            .iter()
            .any(|call| matches!(call, DriverCall::LoadPhraseSoundModelV1(_)));
        assert_eq!(
            used_v1_load,
            revision >= DriverRevision::V1,
            "load entry family for {revision}"
        );
        match revision {
            DriverRevision::V0 => assert!(calls
                .iter()
                .any(|call| matches!(call, DriverCall::StartRecognition(..)))),
            DriverRevision::V1 | DriverRevision::V2 => assert!(calls
                .iter()
                .any(|call| matches!(call, DriverCall::StartRecognitionV1(..)))),
            DriverRevision::V3 => assert!(calls
                .iter()
                .any(|call| matches!(call, DriverCall::StartRecognitionV3(..)))),
        }
        assert!(calls.contains(&DriverCall::StopRecognition(handle)));
        assert!(calls.contains(&DriverCall::UnloadSoundModel(handle)));
    }
}

#[test]
fn model_ceiling_holds_at_production_scale_with_reused_handles() {
    let sim = Arc::new(SimDriver::new(DriverRevision::V2));
    sim.set_properties(wire::PropertiesV0 {
        max_sound_models: 456,
        ..wire::PropertiesV0::default()
    });
    sim.set_fixed_handle(Some(29));
    let notifier = Arc::new(SimCaptureNotifier::new(false));
    let adapter = create(&sim, &notifier);

    let callback = Arc::new(RecordingModel::default());
    let global = Arc::new(CountingGlobal::default());
    adapter.register_callback(global.clone());

    for _ in 0..456 {
        let handle = adapter
            .load_sound_model(&generic_model(), callback.clone())
            .unwrap();
        assert_eq!(handle, 29);
    }
    let err = adapter
        .load_sound_model(&generic_model(), callback.clone())
        .unwrap_err();
    assert!(matches!(err, HarkError::ResourceContention));

    adapter.unload_sound_model(29).unwrap();
    adapter.flush_callbacks();
    assert_eq!(*global.available.lock(), 1);

    adapter
        .load_sound_model(&generic_model(), callback)
        .unwrap();
}

#[test]
fn capture_conflict_displaces_every_active_recognition() {
    let sim = Arc::new(SimDriver::new(DriverRevision::V0));
    let notifier = Arc::new(SimCaptureNotifier::new(false));
    let adapter = create(&sim, &notifier);

    let generic_cb = Arc::new(RecordingModel::default());
    let phrase_cb = Arc::new(RecordingModel::default());
    let global = Arc::new(CountingGlobal::default());
    adapter.register_callback(global.clone());

    let generic = adapter
        .load_sound_model(&generic_model(), generic_cb.clone())
        .unwrap();
    let phrase = adapter
        .load_phrase_sound_model(&phrase_model(), phrase_cb.clone())
        .unwrap();
    adapter.start_recognition(generic, 1, 2, &config()).unwrap();
    adapter.start_recognition(phrase, 3, 4, &config()).unwrap();
    sim.clear_calls();

    notifier.set_state(true);
    let stops: Vec<i32> = sim
        .calls()
        .iter()
        .filter_map(|call| match call {
            DriverCall::StopRecognition(handle) => Some(*handle),
            _ => None,
        })
        .collect();
    assert_eq!(stops.len(), 2);
    assert!(stops.contains(&generic) && stops.contains(&phrase));

    let err = adapter
        .start_recognition(generic, 1, 2, &config())
        .unwrap_err();
    assert!(matches!(err, HarkError::ResourceContention));

    adapter.flush_callbacks();
    assert_eq!(generic_cb.events.lock().len(), 1);
    assert_eq!(
        generic_cb.events.lock()[0].1.status,
        RecognitionStatus::Aborted
    );
    assert_eq!(phrase_cb.phrase_events.lock().len(), 1);
    assert_eq!(
        phrase_cb.phrase_events.lock()[0].1.common.status,
        RecognitionStatus::Aborted
    );

    notifier.set_state(false);
    adapter.flush_callbacks();
    assert_eq!(*global.available.lock(), 1);

    adapter.start_recognition(generic, 1, 2, &config()).unwrap();
}

#[test]
fn driver_death_reaches_every_linked_recipient() {
    let sim = Arc::new(SimDriver::new(DriverRevision::V1));
    let notifier = Arc::new(SimCaptureNotifier::new(false));
    let adapter = create(&sim, &notifier);

    let first = Arc::new(CountingDeath::default());
    let second = Arc::new(CountingDeath::default());
    let first_link: Arc<dyn DeathRecipient> = first.clone();
    let second_link: Arc<dyn DeathRecipient> = second.clone();
    adapter.link_to_death(first_link.clone()).unwrap();
    adapter.link_to_death(second_link).unwrap();
    assert_eq!(sim.death_link_count(), 2);

    sim.die();
    adapter.flush_callbacks();
    assert_eq!(*first.died.lock(), 1);
    assert_eq!(*second.died.lock(), 1);

    adapter.unlink_to_death(&first_link).unwrap();
    assert_eq!(sim.death_link_count(), 1);
    sim.die();
    adapter.flush_callbacks();
    assert_eq!(*first.died.lock(), 1);
    assert_eq!(*second.died.lock(), 2);
}
