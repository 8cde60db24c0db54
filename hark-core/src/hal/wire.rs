//! Revision-specific wire records, as the driver exchanges them.
//!
//! Revision lineage, mirrored by the composite records below:
//!
//! | Revision | Change over predecessor |
//! |----------|-------------------------|
//! | v0 | Baseline; payloads travel inline |
//! | v1 | Payloads move to shared buffers; headers keep their byte field empty |
//! | v2 | Adds model-state query (no new records) |
//! | v3 | Extended properties, extended recognition config, parameter ranges |
//!
//! Field layouts and constants follow the vendor interface definitions; the
//! canonical counterparts live in [`crate::types`].

use std::sync::Arc;

/// Wire model-type tags.
pub mod model_type {
    pub const KEYPHRASE: i32 = 0;
    pub const GENERIC: i32 = 1;
}

/// Wire recognition-status codes carried in events.
pub mod recognition_status {
    pub const SUCCESS: i32 = 0;
    pub const ABORT: i32 = 1;
    pub const FAILURE: i32 = 2;
    /// Reported for model-state queries; the recognition stays active.
    pub const FORCED: i32 = 3;
}

/// Legacy packed audio codes used by the wire audio config.
pub mod legacy_audio {
    pub const CHANNEL_IN_MONO: i32 = 0x10;
    pub const CHANNEL_IN_STEREO: i32 = 0xC;
    pub const FORMAT_PCM_16_BIT: i32 = 0x1;
    pub const FORMAT_MP3: i32 = 0x0100_0000;
}

/// The structured UUID layout used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawUuid {
    pub time_low: u32,
    pub time_mid: u16,
    pub version_and_time_high: u16,
    pub variant_and_clock_seq_high: u16,
    pub node: [u8; 6],
}

/// A shared-memory payload handle, as v1+ transports model bytes and event
/// data. Cloning shares the underlying allocation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SharedBuffer(Arc<[u8]>);

impl SharedBuffer {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes.into())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ---------------------------------------------------------------------------
// v0 records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PropertiesV0 {
    pub implementor: String,
    pub description: String,
    pub version: i32,
    pub uuid: RawUuid,
    pub max_sound_models: u32,
    pub max_key_phrases: u32,
    pub max_users: u32,
    pub recognition_modes: u32,
    pub capture_transition: bool,
    pub max_buffer_ms: u32,
    pub concurrent_capture: bool,
    pub trigger_in_event: bool,
    pub power_consumption_mw: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SoundModelV0 {
    pub model_type: i32,
    pub uuid: RawUuid,
    pub vendor_uuid: RawUuid,
    /// Inline payload; emptied in v1 composites.
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PhraseV0 {
    pub id: i32,
    pub recognition_modes: u32,
    pub users: Vec<i32>,
    pub locale: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PhraseSoundModelV0 {
    pub common: SoundModelV0,
    pub phrases: Vec<PhraseV0>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfidenceLevelV0 {
    pub user_id: i32,
    pub level_percent: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PhraseRecognitionExtraV0 {
    pub id: i32,
    pub confidence_level: i32,
    pub recognition_modes: u32,
    pub levels: Vec<ConfidenceLevelV0>,
}

/// v0 recognition config. The capture device and stream handle the caller
/// passes to `start_recognition` land in the two leading fields.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecognitionConfigV0 {
    pub capture_handle: i32,
    pub capture_device: i32,
    pub capture_requested: bool,
    pub phrases: Vec<PhraseRecognitionExtraV0>,
    pub data: Vec<u8>,
}

/// Packed-integer audio format, as v0 events describe trigger audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AudioConfigV0 {
    pub sample_rate_hz: u32,
    pub channel_mask: i32,
    pub format: i32,
}

/// v0 recognition event. Unlike the canonical event it names its model handle
/// (`model`) and a capture session id the canonical layer drops.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecognitionEventV0 {
    pub status: i32,
    pub model_type: i32,
    pub model: i32,
    pub capture_available: bool,
    pub capture_session: i32,
    pub capture_delay_ms: u32,
    pub capture_preamble_ms: u32,
    pub trigger_in_data: bool,
    pub audio_config: AudioConfigV0,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PhraseRecognitionEventV0 {
    pub common: RecognitionEventV0,
    pub phrase_extras: Vec<PhraseRecognitionExtraV0>,
}

// ---------------------------------------------------------------------------
// v1 composites (payloads in shared buffers, header byte fields empty)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SoundModelV1 {
    pub header: SoundModelV0,
    pub data: SharedBuffer,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PhraseSoundModelV1 {
    pub common: SoundModelV1,
    pub phrases: Vec<PhraseV0>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecognitionConfigV1 {
    pub header: RecognitionConfigV0,
    pub data: SharedBuffer,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecognitionEventV1 {
    pub header: RecognitionEventV0,
    pub data: SharedBuffer,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PhraseRecognitionEventV1 {
    pub common: RecognitionEventV1,
    pub phrase_extras: Vec<PhraseRecognitionExtraV0>,
}

// ---------------------------------------------------------------------------
// v3 extensions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PropertiesV3 {
    pub base: PropertiesV0,
    pub supported_model_arch: String,
    pub audio_capabilities: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecognitionConfigV3 {
    pub base: RecognitionConfigV1,
    pub audio_capabilities: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModelParameterRangeV3 {
    pub start: i32,
    pub end: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_buffer_clones_share_contents() {
        let buffer = SharedBuffer::from_bytes(vec![91, 92, 93]);
        let clone = buffer.clone();
        assert_eq!(clone.as_slice(), &[91, 92, 93]);
        assert_eq!(buffer, clone);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn shared_buffer_default_is_empty() {
        let buffer = SharedBuffer::default();
        assert!(buffer.is_empty());
        assert_eq!(buffer.as_slice(), &[] as &[u8]);
    }
}
