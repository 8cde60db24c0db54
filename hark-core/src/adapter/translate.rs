//! Conversions between the canonical records and each revision's wire shape.
//!
//! Conventions observed by the wire:
//! - v1 composites keep the full v0 record as a header but empty its inline
//!   byte field; the payload rides in a shared buffer instead.
//! - The capture device id and capture stream handle are call arguments on
//!   the canonical surface and config fields on the wire, for every revision.
//! - Wire events carry the model handle and a capture session id; the handle
//!   routes delivery, the session id is dropped.
//! - A wire FORCED status means the recognition is still running; that is the
//!   only source of the canonical still-active flag.

use uuid::Uuid;

use crate::hal::wire;
use crate::types::{
    channel_layout, mime, AudioConfig, AudioFormatDescription, AudioFormatKind, ModelKind,
    ModelParameterRange, Phrase, PhraseRecognitionEvent, PhraseRecognitionExtra,
    PhraseSoundModel, Properties, RecognitionConfig, RecognitionEvent, RecognitionStatus,
    SoundModel,
};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

pub(crate) fn raw_uuid(uuid: &Uuid) -> wire::RawUuid {
    let (time_low, time_mid, version_and_time_high, rest) = uuid.as_fields();
    let variant_and_clock_seq_high = u16::from_be_bytes([rest[0], rest[1]]);
    let mut node = [0u8; 6];
    node.copy_from_slice(&rest[2..8]);
    wire::RawUuid {
        time_low,
        time_mid,
        version_and_time_high,
        variant_and_clock_seq_high,
        node,
    }
}

pub(crate) fn canonical_uuid(raw: &wire::RawUuid) -> Uuid {
    let clock_seq = raw.variant_and_clock_seq_high.to_be_bytes();
    let rest = [
        clock_seq[0],
        clock_seq[1],
        raw.node[0],
        raw.node[1],
        raw.node[2],
        raw.node[3],
        raw.node[4],
        raw.node[5],
    ];
    Uuid::from_fields(raw.time_low, raw.time_mid, raw.version_and_time_high, &rest)
}

fn model_type_tag(kind: ModelKind) -> i32 {
    match kind {
        ModelKind::Generic => wire::model_type::GENERIC,
        ModelKind::Keyphrase => wire::model_type::KEYPHRASE,
    }
}

fn model_kind(tag: i32) -> ModelKind {
    match tag {
        wire::model_type::KEYPHRASE => ModelKind::Keyphrase,
        _ => ModelKind::Generic,
    }
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

/// Base properties; the v3-only fields take their documented defaults.
pub(crate) fn properties(base: wire::PropertiesV0) -> Properties {
    Properties {
        implementor: base.implementor,
        description: base.description,
        version: base.version,
        uuid: canonical_uuid(&base.uuid),
        max_sound_models: base.max_sound_models,
        max_key_phrases: base.max_key_phrases,
        max_users: base.max_users,
        recognition_modes: base.recognition_modes,
        capture_transition: base.capture_transition,
        max_buffer_ms: base.max_buffer_ms,
        concurrent_capture: base.concurrent_capture,
        trigger_in_event: base.trigger_in_event,
        power_consumption_mw: base.power_consumption_mw,
        supported_model_arch: String::new(),
        audio_capabilities: 0,
    }
}

pub(crate) fn properties_v3(extended: wire::PropertiesV3) -> Properties {
    let mut out = properties(extended.base);
    out.supported_model_arch = extended.supported_model_arch;
    out.audio_capabilities = extended.audio_capabilities;
    out
}

// ---------------------------------------------------------------------------
// Sound models
// ---------------------------------------------------------------------------

pub(crate) fn sound_model_v0(model: &SoundModel) -> wire::SoundModelV0 {
    wire::SoundModelV0 {
        model_type: model_type_tag(model.kind),
        uuid: raw_uuid(&model.uuid),
        vendor_uuid: raw_uuid(&model.vendor_uuid),
        data: model.data.clone(),
    }
}

pub(crate) fn sound_model_v1(model: &SoundModel) -> wire::SoundModelV1 {
    let mut header = sound_model_v0(model);
    let data = wire::SharedBuffer::from_bytes(std::mem::take(&mut header.data));
    wire::SoundModelV1 { header, data }
}

fn phrase_v0(phrase: &Phrase) -> wire::PhraseV0 {
    wire::PhraseV0 {
        id: phrase.id,
        recognition_modes: phrase.recognition_modes,
        users: phrase.users.clone(),
        locale: phrase.locale.clone(),
        text: phrase.text.clone(),
    }
}

pub(crate) fn phrase_sound_model_v0(model: &PhraseSoundModel) -> wire::PhraseSoundModelV0 {
    wire::PhraseSoundModelV0 {
        common: sound_model_v0(&model.common),
        phrases: model.phrases.iter().map(phrase_v0).collect(),
    }
}

pub(crate) fn phrase_sound_model_v1(model: &PhraseSoundModel) -> wire::PhraseSoundModelV1 {
    wire::PhraseSoundModelV1 {
        common: sound_model_v1(&model.common),
        phrases: model.phrases.iter().map(phrase_v0).collect(),
    }
}

// ---------------------------------------------------------------------------
// Recognition configuration
// ---------------------------------------------------------------------------

fn phrase_extra_v0(extra: &PhraseRecognitionExtra) -> wire::PhraseRecognitionExtraV0 {
    wire::PhraseRecognitionExtraV0 {
        id: extra.id,
        confidence_level: extra.confidence_level,
        recognition_modes: extra.recognition_modes,
        levels: extra
            .levels
            .iter()
            .map(|level| wire::ConfidenceLevelV0 {
                user_id: level.user_id,
                level_percent: level.level_percent,
            })
            .collect(),
    }
}

fn phrase_extra(extra: &wire::PhraseRecognitionExtraV0) -> PhraseRecognitionExtra {
    PhraseRecognitionExtra {
        id: extra.id,
        confidence_level: extra.confidence_level,
        recognition_modes: extra.recognition_modes,
        levels: extra
            .levels
            .iter()
            .map(|level| crate::types::ConfidenceLevel {
                user_id: level.user_id,
                level_percent: level.level_percent,
            })
            .collect(),
    }
}

pub(crate) fn recognition_config_v0(
    config: &RecognitionConfig,
    capture_device: i32,
    capture_handle: i32,
) -> wire::RecognitionConfigV0 {
    wire::RecognitionConfigV0 {
        capture_handle,
        capture_device,
        capture_requested: config.capture_requested,
        phrases: config.phrase_extras.iter().map(phrase_extra_v0).collect(),
        data: config.data.clone(),
    }
}

pub(crate) fn recognition_config_v1(
    config: &RecognitionConfig,
    capture_device: i32,
    capture_handle: i32,
) -> wire::RecognitionConfigV1 {
    let mut header = recognition_config_v0(config, capture_device, capture_handle);
    let data = wire::SharedBuffer::from_bytes(std::mem::take(&mut header.data));
    wire::RecognitionConfigV1 { header, data }
}

pub(crate) fn recognition_config_v3(
    config: &RecognitionConfig,
    capture_device: i32,
    capture_handle: i32,
) -> wire::RecognitionConfigV3 {
    wire::RecognitionConfigV3 {
        base: recognition_config_v1(config, capture_device, capture_handle),
        audio_capabilities: config.audio_capabilities,
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

fn recognition_status(wire_status: i32) -> RecognitionStatus {
    match wire_status {
        wire::recognition_status::SUCCESS => RecognitionStatus::Success,
        wire::recognition_status::ABORT => RecognitionStatus::Aborted,
        wire::recognition_status::FORCED => RecognitionStatus::Forced,
        _ => RecognitionStatus::Failure,
    }
}

fn audio_config(config: &wire::AudioConfigV0) -> AudioConfig {
    let channel_layout_mask = match config.channel_mask {
        wire::legacy_audio::CHANNEL_IN_MONO => channel_layout::MONO,
        wire::legacy_audio::CHANNEL_IN_STEREO => channel_layout::STEREO,
        _ => 0,
    };
    let format = match config.format {
        wire::legacy_audio::FORMAT_MP3 => AudioFormatDescription {
            kind: AudioFormatKind::NonPcm,
            encoding: mime::AUDIO_MPEG.to_owned(),
        },
        _ => AudioFormatDescription {
            kind: AudioFormatKind::Pcm,
            encoding: mime::AUDIO_RAW.to_owned(),
        },
    };
    AudioConfig {
        sample_rate_hz: config.sample_rate_hz,
        channel_layout_mask,
        format,
    }
}

/// Returns `(model_handle, event)`; the handle rides inside the wire event.
pub(crate) fn recognition_event(event: wire::RecognitionEventV0) -> (i32, RecognitionEvent) {
    let still_active = event.status == wire::recognition_status::FORCED;
    let canonical = RecognitionEvent {
        status: recognition_status(event.status),
        kind: model_kind(event.model_type),
        capture_available: event.capture_available,
        capture_delay_ms: event.capture_delay_ms,
        capture_preamble_ms: event.capture_preamble_ms,
        trigger_in_data: event.trigger_in_data,
        audio_config: audio_config(&event.audio_config),
        data: event.data,
        recognition_still_active: still_active,
    };
    (event.model, canonical)
}

pub(crate) fn recognition_event_v1(event: wire::RecognitionEventV1) -> (i32, RecognitionEvent) {
    let mut header = event.header;
    header.data = event.data.as_slice().to_vec();
    recognition_event(header)
}

pub(crate) fn phrase_recognition_event(
    event: wire::PhraseRecognitionEventV0,
) -> (i32, PhraseRecognitionEvent) {
    let (handle, common) = recognition_event(event.common);
    let canonical = PhraseRecognitionEvent {
        common,
        phrase_extras: event.phrase_extras.iter().map(phrase_extra).collect(),
    };
    (handle, canonical)
}

pub(crate) fn phrase_recognition_event_v1(
    event: wire::PhraseRecognitionEventV1,
) -> (i32, PhraseRecognitionEvent) {
    let (handle, common) = recognition_event_v1(event.common);
    let canonical = PhraseRecognitionEvent {
        common,
        phrase_extras: event.phrase_extras.iter().map(phrase_extra).collect(),
    };
    (handle, canonical)
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

pub(crate) fn parameter_range(range: wire::ModelParameterRangeV3) -> ModelParameterRange {
    ModelParameterRange {
        min_inclusive: range.start,
        max_inclusive: range.end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConfidenceLevel;

    const MODEL_UUID: &str = "12345678-2345-3456-4567-abcdef987654";
    const VENDOR_UUID: &str = "87654321-5432-6543-7654-456789fedcba";

    fn sample_generic_model() -> SoundModel {
        SoundModel {
            kind: ModelKind::Generic,
            uuid: MODEL_UUID.parse().unwrap(),
            vendor_uuid: VENDOR_UUID.parse().unwrap(),
            data: vec![91, 92, 93, 94, 95],
        }
    }

    fn sample_phrase_model() -> PhraseSoundModel {
        let mut common = sample_generic_model();
        common.kind = ModelKind::Keyphrase;
        PhraseSoundModel {
            common,
            phrases: vec![Phrase {
                id: 123,
                users: vec![5, 6, 7],
                locale: "locale".into(),
                text: "text".into(),
                recognition_modes: crate::types::recognition_mode::USER_AUTHENTICATION
                    | crate::types::recognition_mode::USER_IDENTIFICATION,
            }],
        }
    }

    fn sample_config() -> RecognitionConfig {
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
            audio_capabilities: crate::types::audio_capability::ECHO_CANCELLATION
                | crate::types::audio_capability::NOISE_SUPPRESSION,
        }
    }

    fn structured_uuid() -> wire::RawUuid {
        wire::RawUuid {
            time_low: 1,
            time_mid: 2,
            version_and_time_high: 3,
            variant_and_clock_seq_high: 4,
            node: [5, 6, 7, 8, 9, 10],
        }
    }

    fn wire_properties() -> wire::PropertiesV0 {
        wire::PropertiesV0 {
            implementor: "implementor".into(),
            description: "description".into(),
            version: 123,
            uuid: structured_uuid(),
            max_sound_models: 456,
            max_key_phrases: 567,
            max_users: 678,
            recognition_modes: 0xF,
            capture_transition: true,
            max_buffer_ms: 321,
            concurrent_capture: false,
            trigger_in_event: true,
            power_consumption_mw: 432,
        }
    }

    fn wire_event(handle: i32, status: i32) -> wire::RecognitionEventV0 {
        wire::RecognitionEventV0 {
            status,
            model_type: wire::model_type::GENERIC,
            model: handle,
            capture_available: true,
            capture_session: 9999,
            capture_delay_ms: 234,
            capture_preamble_ms: 345,
            trigger_in_data: true,
            audio_config: wire::AudioConfigV0 {
                sample_rate_hz: 456,
                channel_mask: wire::legacy_audio::CHANNEL_IN_MONO,
                format: wire::legacy_audio::FORMAT_MP3,
            },
            data: vec![31, 32, 33],
        }
    }

    #[test]
    fn uuid_round_trips_through_the_structured_form() {
        let canonical: Uuid = MODEL_UUID.parse().unwrap();
        let raw = raw_uuid(&canonical);
        assert_eq!(canonical_uuid(&raw), canonical);

        assert_eq!(
            canonical_uuid(&structured_uuid()).to_string(),
            "00000001-0002-0003-0004-05060708090a"
        );
    }

    #[test]
    fn base_properties_default_the_extended_fields() {
        let out = properties(wire_properties());
        assert_eq!(out.implementor, "implementor");
        assert_eq!(out.version, 123);
        assert_eq!(out.uuid.to_string(), "00000001-0002-0003-0004-05060708090a");
        assert_eq!(out.max_sound_models, 456);
        assert_eq!(out.max_key_phrases, 567);
        assert_eq!(out.max_users, 678);
        assert_eq!(out.recognition_modes, 0xF);
        assert!(out.capture_transition);
        assert_eq!(out.max_buffer_ms, 321);
        assert!(out.trigger_in_event);
        assert_eq!(out.power_consumption_mw, 432);
        assert_eq!(out.supported_model_arch, "");
        assert_eq!(out.audio_capabilities, 0);
    }

    #[test]
    fn extended_properties_carry_the_v3_fields() {
        let out = properties_v3(wire::PropertiesV3 {
            base: wire_properties(),
            supported_model_arch: "supportedModelArch".into(),
            audio_capabilities: 0x3,
        });
        assert_eq!(out.supported_model_arch, "supportedModelArch");
        assert_eq!(out.audio_capabilities, 0x3);
    }

    #[test]
    fn generic_model_keeps_inline_payload_on_v0() {
        let out = sound_model_v0(&sample_generic_model());
        assert_eq!(out.model_type, wire::model_type::GENERIC);
        assert_eq!(canonical_uuid(&out.uuid).to_string(), MODEL_UUID);
        assert_eq!(canonical_uuid(&out.vendor_uuid).to_string(), VENDOR_UUID);
        assert_eq!(out.data, vec![91, 92, 93, 94, 95]);
    }

    #[test]
    fn v1_model_moves_payload_into_the_shared_buffer() {
        let out = sound_model_v1(&sample_generic_model());
        assert!(out.header.data.is_empty());
        assert_eq!(out.data.as_slice(), &[91, 92, 93, 94, 95]);
        assert_eq!(canonical_uuid(&out.header.uuid).to_string(), MODEL_UUID);
    }

    #[test]
    fn phrase_model_translates_its_phrase_records() {
        let out = phrase_sound_model_v0(&sample_phrase_model());
        assert_eq!(out.common.model_type, wire::model_type::KEYPHRASE);
        assert_eq!(out.phrases.len(), 1);
        assert_eq!(out.phrases[0].id, 123);
        assert_eq!(out.phrases[0].users, vec![5, 6, 7]);
        assert_eq!(out.phrases[0].locale, "locale");
        assert_eq!(out.phrases[0].text, "text");
        assert_eq!(out.phrases[0].recognition_modes, 0x6);

        let v1 = phrase_sound_model_v1(&sample_phrase_model());
        assert!(v1.common.header.data.is_empty());
        assert_eq!(v1.common.data.as_slice(), &[91, 92, 93, 94, 95]);
        assert_eq!(v1.phrases.len(), 1);
    }

    #[test]
    fn config_folds_capture_identifiers_into_the_wire_record() {
        let out = recognition_config_v0(&sample_config(), 203, 204);
        assert!(out.capture_requested);
        assert_eq!(out.capture_device, 203);
        assert_eq!(out.capture_handle, 204);
        assert_eq!(out.phrases.len(), 1);
        assert_eq!(out.phrases[0].id, 123);
        assert_eq!(out.phrases[0].confidence_level, 4);
        assert_eq!(out.phrases[0].recognition_modes, 5);
        assert_eq!(out.phrases[0].levels[0].user_id, 234);
        assert_eq!(out.phrases[0].levels[0].level_percent, 34);
        assert_eq!(out.data, vec![5, 4, 3, 2, 1]);
    }

    #[test]
    fn v1_config_moves_payload_into_the_shared_buffer() {
        let out = recognition_config_v1(&sample_config(), 505, 506);
        assert_eq!(out.header.capture_device, 505);
        assert_eq!(out.header.capture_handle, 506);
        assert!(out.header.data.is_empty());
        assert_eq!(out.data.as_slice(), &[5, 4, 3, 2, 1]);
    }

    #[test]
    fn v3_config_adds_audio_capabilities() {
        let out = recognition_config_v3(&sample_config(), 808, 909);
        assert_eq!(out.base.header.capture_device, 808);
        assert_eq!(out.base.header.capture_handle, 909);
        assert_eq!(out.audio_capabilities, 0x3);
    }

    #[test]
    fn abort_event_translates_with_legacy_audio_mapping() {
        let (handle, event) = recognition_event(wire_event(85, wire::recognition_status::ABORT));
        assert_eq!(handle, 85);
        assert_eq!(event.status, RecognitionStatus::Aborted);
        assert_eq!(event.kind, ModelKind::Generic);
        assert!(event.capture_available);
        assert_eq!(event.capture_delay_ms, 234);
        assert_eq!(event.capture_preamble_ms, 345);
        assert!(event.trigger_in_data);
        assert_eq!(event.audio_config.sample_rate_hz, 456);
        assert_eq!(event.audio_config.channel_layout_mask, channel_layout::MONO);
        assert_eq!(event.audio_config.format.kind, AudioFormatKind::NonPcm);
        assert_eq!(event.audio_config.format.encoding, mime::AUDIO_MPEG);
        assert_eq!(event.data, vec![31, 32, 33]);
        assert!(!event.recognition_still_active);
    }

    #[test]
    fn forced_event_is_marked_still_active() {
        let (handle, event) = recognition_event(wire_event(87, wire::recognition_status::FORCED));
        assert_eq!(handle, 87);
        assert_eq!(event.status, RecognitionStatus::Forced);
        assert!(event.recognition_still_active);
    }

    #[test]
    fn v1_event_reads_payload_from_the_shared_buffer() {
        let mut header = wire_event(92, wire::recognition_status::SUCCESS);
        header.data.clear();
        let (handle, event) = recognition_event_v1(wire::RecognitionEventV1 {
            header,
            data: wire::SharedBuffer::from_bytes(vec![31, 32, 33]),
        });
        assert_eq!(handle, 92);
        assert_eq!(event.status, RecognitionStatus::Success);
        assert_eq!(event.data, vec![31, 32, 33]);
    }

    #[test]
    fn phrase_event_translates_extras() {
        let wire_event = wire::PhraseRecognitionEventV0 {
            common: wire_event(102, wire::recognition_status::FORCED),
            phrase_extras: vec![wire::PhraseRecognitionExtraV0 {
                id: 123,
                confidence_level: 52,
                recognition_modes: 0x9,
                levels: vec![wire::ConfidenceLevelV0 {
                    user_id: 31,
                    level_percent: 43,
                }],
            }],
        };
        let (handle, event) = phrase_recognition_event(wire_event);
        assert_eq!(handle, 102);
        assert_eq!(event.common.status, RecognitionStatus::Forced);
        assert!(event.common.recognition_still_active);
        assert_eq!(event.phrase_extras.len(), 1);
        assert_eq!(event.phrase_extras[0].id, 123);
        assert_eq!(event.phrase_extras[0].confidence_level, 52);
        assert_eq!(event.phrase_extras[0].recognition_modes, 0x9);
        assert_eq!(event.phrase_extras[0].levels[0].user_id, 31);
        assert_eq!(event.phrase_extras[0].levels[0].level_percent, 43);
    }

    #[test]
    fn unknown_wire_status_maps_to_failure() {
        let (_, event) = recognition_event(wire_event(1, 77));
        assert_eq!(event.status, RecognitionStatus::Failure);
        assert!(!event.recognition_still_active);
    }

    #[test]
    fn parameter_range_maps_start_end_to_inclusive_bounds() {
        let out = parameter_range(wire::ModelParameterRangeV3 { start: 34, end: 45 });
        assert_eq!(out.min_inclusive, 34);
        assert_eq!(out.max_inclusive, 45);
    }
}
