//! Canonical data model shared by every driver revision.
//!
//! These are the records the adapter's callers see. They never change shape
//! with the bound revision; `adapter::translate` maps them to and from the
//! per-revision wire records in `hal::wire`.
//!
//! | Record | Purpose |
//! |--------|---------|
//! | [`Properties`] | Immutable hardware capabilities |
//! | [`SoundModel`] / [`PhraseSoundModel`] | Loadable model payloads |
//! | [`RecognitionConfig`] | Per-start tuning (thresholds, payload) |
//! | [`RecognitionEvent`] / [`PhraseRecognitionEvent`] | Driver-originated results |
//! | [`ModelParameterRange`] | Valid range for a tunable model parameter |
//!
//! Everything serializes with serde (camelCase) so diagnostic tools can dump
//! state as JSON.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Recognition-mode bitmask values (`Properties::recognition_modes`,
/// `Phrase::recognition_modes`).
pub mod recognition_mode {
    pub const VOICE_TRIGGER: u32 = 0x1;
    pub const USER_IDENTIFICATION: u32 = 0x2;
    pub const USER_AUTHENTICATION: u32 = 0x4;
    pub const GENERIC_TRIGGER: u32 = 0x8;
}

/// Audio-capability bitmask values (revision 3 drivers only).
pub mod audio_capability {
    pub const ECHO_CANCELLATION: u32 = 0x1;
    pub const NOISE_SUPPRESSION: u32 = 0x2;
}

/// Canonical channel-layout masks carried in [`AudioConfig`].
pub mod channel_layout {
    pub const MONO: u32 = 0x1;
    pub const STEREO: u32 = 0x3;
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

/// Immutable hardware capabilities, fetched once per adapter instance.
///
/// `supported_model_arch` and `audio_capabilities` only exist on revision 3
/// drivers; earlier revisions report `""` and `0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Properties {
    pub implementor: String,
    pub description: String,
    pub version: i32,
    pub uuid: Uuid,
    /// Hard ceiling on concurrently loaded models; enforced by the adapter
    /// without involving the driver.
    pub max_sound_models: u32,
    pub max_key_phrases: u32,
    pub max_users: u32,
    /// Bitmask of `recognition_mode` values.
    pub recognition_modes: u32,
    pub capture_transition: bool,
    pub max_buffer_ms: u32,
    /// Whether the hardware keeps recognizing while another client captures
    /// audio. When false, the adapter aborts recognitions on capture conflict.
    pub concurrent_capture: bool,
    pub trigger_in_event: bool,
    pub power_consumption_mw: u32,
    pub supported_model_arch: String,
    /// Bitmask of `audio_capability` values.
    pub audio_capabilities: u32,
}

// ---------------------------------------------------------------------------
// Sound models
// ---------------------------------------------------------------------------

/// Distinguishes plain acoustic models from key-phrase models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Generic,
    Keyphrase,
}

/// A loadable sound model. The payload travels by value here; the transport
/// representation (inline bytes or shared buffer) is a wire concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoundModel {
    pub kind: ModelKind,
    pub uuid: Uuid,
    pub vendor_uuid: Uuid,
    /// Opaque model bytes, interpreted only by the driver.
    pub data: Vec<u8>,
}

/// A key-phrase model: common payload plus one record per trained phrase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhraseSoundModel {
    pub common: SoundModel,
    pub phrases: Vec<Phrase>,
}

/// A single trained phrase within a [`PhraseSoundModel`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phrase {
    pub id: i32,
    /// User ids authorized to trigger this phrase.
    pub users: Vec<i32>,
    pub locale: String,
    pub text: String,
    /// Bitmask of `recognition_mode` values.
    pub recognition_modes: u32,
}

// ---------------------------------------------------------------------------
// Recognition configuration
// ---------------------------------------------------------------------------

/// Confidence threshold for one enrolled user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceLevel {
    pub user_id: i32,
    pub level_percent: i32,
}

/// Per-phrase recognition tuning, also reported back in phrase events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhraseRecognitionExtra {
    pub id: i32,
    pub confidence_level: i32,
    /// Bitmask of `recognition_mode` values.
    pub recognition_modes: u32,
    pub levels: Vec<ConfidenceLevel>,
}

/// Parameters for one `start_recognition` call. The capture device id and
/// capture stream handle are separate call arguments, not part of this record;
/// the adapter folds them into the wire config for every revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionConfig {
    pub capture_requested: bool,
    pub phrase_extras: Vec<PhraseRecognitionExtra>,
    /// Opaque driver-specific payload.
    pub data: Vec<u8>,
    /// Requested `audio_capability` bits; only revision 3 drivers honor it.
    pub audio_capabilities: u32,
}

// ---------------------------------------------------------------------------
// Recognition events
// ---------------------------------------------------------------------------

/// Outcome of a recognition, as reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecognitionStatus {
    Success,
    /// The recognition was cut short, either by the driver or by the adapter
    /// on capture conflict.
    Aborted,
    Failure,
    /// Produced by `force_recognition_event`; the model keeps recognizing.
    Forced,
}

/// How the trailing audio bytes of an event are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormatKind {
    Pcm,
    NonPcm,
}

/// MIME strings used in [`AudioFormatDescription::encoding`].
pub mod mime {
    pub const AUDIO_RAW: &str = "audio/raw";
    pub const AUDIO_MPEG: &str = "audio/mpeg";
}

/// Canonical audio format descriptor (kind + MIME encoding), replacing the
/// packed integer codes of the legacy wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioFormatDescription {
    pub kind: AudioFormatKind,
    pub encoding: String,
}

impl AudioFormatDescription {
    pub fn pcm_raw() -> Self {
        Self {
            kind: AudioFormatKind::Pcm,
            encoding: mime::AUDIO_RAW.to_owned(),
        }
    }
}

/// Format of audio surrounding a trigger, attached to recognition events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioConfig {
    pub sample_rate_hz: u32,
    /// `channel_layout` mask.
    pub channel_layout_mask: u32,
    pub format: AudioFormatDescription,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 0,
            channel_layout_mask: 0,
            format: AudioFormatDescription::pcm_raw(),
        }
    }
}

/// A recognition result for a generic model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionEvent {
    pub status: RecognitionStatus,
    pub kind: ModelKind,
    pub capture_available: bool,
    pub capture_delay_ms: u32,
    pub capture_preamble_ms: u32,
    pub trigger_in_data: bool,
    pub audio_config: AudioConfig,
    /// Opaque trailing bytes (trigger audio when `trigger_in_data` is set).
    pub data: Vec<u8>,
    /// True only for forced events; the model is still recognizing and needs
    /// no restart.
    pub recognition_still_active: bool,
}

impl RecognitionEvent {
    /// An otherwise-empty event with status [`RecognitionStatus::Aborted`],
    /// used when the adapter itself cuts a recognition short.
    pub fn aborted(kind: ModelKind) -> Self {
        Self {
            status: RecognitionStatus::Aborted,
            kind,
            capture_available: false,
            capture_delay_ms: 0,
            capture_preamble_ms: 0,
            trigger_in_data: false,
            audio_config: AudioConfig::default(),
            data: Vec::new(),
            recognition_still_active: false,
        }
    }
}

/// A recognition result for a key-phrase model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhraseRecognitionEvent {
    pub common: RecognitionEvent,
    pub phrase_extras: Vec<PhraseRecognitionExtra>,
}

impl PhraseRecognitionEvent {
    /// Phrase-model counterpart of [`RecognitionEvent::aborted`].
    pub fn aborted() -> Self {
        Self {
            common: RecognitionEvent::aborted(ModelKind::Keyphrase),
            phrase_extras: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Model parameters
// ---------------------------------------------------------------------------

/// Inclusive range of valid values for a tunable model parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelParameterRange {
    pub min_inclusive: i32,
    pub max_inclusive: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn properties_serialize_with_camel_case_fields() {
        let properties = Properties {
            implementor: "implementor".into(),
            description: "description".into(),
            version: 123,
            uuid: "00000001-0002-0003-0004-05060708090a".parse().unwrap(),
            max_sound_models: 456,
            max_key_phrases: 567,
            max_users: 678,
            recognition_modes: recognition_mode::VOICE_TRIGGER
                | recognition_mode::GENERIC_TRIGGER,
            capture_transition: true,
            max_buffer_ms: 321,
            concurrent_capture: false,
            trigger_in_event: true,
            power_consumption_mw: 432,
            supported_model_arch: String::new(),
            audio_capabilities: 0,
        };

        let json = serde_json::to_value(&properties).expect("serialize properties");
        assert_eq!(json["maxSoundModels"], 456);
        assert_eq!(json["uuid"], "00000001-0002-0003-0004-05060708090a");
        assert_eq!(json["concurrentCapture"], false);
        assert_eq!(json["powerConsumptionMw"], 432);

        let round_trip: Properties =
            serde_json::from_value(json).expect("deserialize properties");
        assert_eq!(round_trip, properties);
    }

    #[test]
    fn recognition_event_serializes_with_lowercase_status() {
        let event = RecognitionEvent {
            status: RecognitionStatus::Forced,
            kind: ModelKind::Generic,
            capture_available: true,
            capture_delay_ms: 234,
            capture_preamble_ms: 345,
            trigger_in_data: true,
            audio_config: AudioConfig {
                sample_rate_hz: 456,
                channel_layout_mask: channel_layout::MONO,
                format: AudioFormatDescription {
                    kind: AudioFormatKind::NonPcm,
                    encoding: mime::AUDIO_MPEG.to_owned(),
                },
            },
            data: vec![31, 32, 33],
            recognition_still_active: true,
        };

        let json = serde_json::to_value(&event).expect("serialize event");
        assert_eq!(json["status"], "forced");
        assert_eq!(json["kind"], "generic");
        assert_eq!(json["recognitionStillActive"], true);
        assert_eq!(json["audioConfig"]["format"]["encoding"], "audio/mpeg");

        let round_trip: RecognitionEvent =
            serde_json::from_value(json).expect("deserialize event");
        assert_eq!(round_trip, event);
    }

    #[test]
    fn aborted_events_carry_empty_payloads() {
        let generic = RecognitionEvent::aborted(ModelKind::Generic);
        assert_eq!(generic.status, RecognitionStatus::Aborted);
        assert_eq!(generic.kind, ModelKind::Generic);
        assert!(generic.data.is_empty());
        assert!(!generic.recognition_still_active);

        let phrase = PhraseRecognitionEvent::aborted();
        assert_eq!(phrase.common.status, RecognitionStatus::Aborted);
        assert_eq!(phrase.common.kind, ModelKind::Keyphrase);
        assert!(phrase.phrase_extras.is_empty());
    }

    #[test]
    fn recognition_mode_bits_are_distinct() {
        let all = recognition_mode::VOICE_TRIGGER
            | recognition_mode::USER_IDENTIFICATION
            | recognition_mode::USER_AUTHENTICATION
            | recognition_mode::GENERIC_TRIGGER;
        assert_eq!(all, 0xF);
        assert_eq!(
            audio_capability::ECHO_CANCELLATION | audio_capability::NOISE_SUPPRESSION,
            0x3
        );
    }
}
