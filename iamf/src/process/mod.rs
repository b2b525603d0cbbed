//! Encoder-side processing: timing, parameter management, and assembly.

use crate::obu::audio_element::AudioElementObu;
use crate::obu::audio_frame::AudioFrameObu;
use crate::obu::codec_config::CodecConfigObu;
use crate::obu::parameter_block::ParameterBlockObu;

/// Stream assembly into the final byte order.
pub mod assemble;

/// The external codec encoder seam and the LPCM passthrough packer.
pub mod codec;

/// Loudness calculator seam.
pub mod loudness;

/// Per-element demixing parameter state.
pub mod parameters;

/// Sample arrangement for the passthrough renderer.
pub mod render;

/// Monotonic per-substream and per-parameter clocks.
pub mod timing;

/// An Audio Element OBU joined with the Codec Config it references.
#[derive(Debug, Clone)]
pub struct AudioElementWithData {
    pub obu: AudioElementObu,
    pub codec_config: CodecConfigObu,
}

/// An audio frame with its allocated timestamps.
#[derive(Debug, Clone)]
pub struct AudioFrameWithData {
    pub obu: AudioFrameObu,
    pub start_timestamp: i64,
    pub end_timestamp: i64,
    pub audio_element_id: u32,
}

/// A parameter block with its allocated timestamps.
#[derive(Debug, Clone)]
pub struct ParameterBlockWithData {
    pub obu: ParameterBlockObu,
    pub start_timestamp: i64,
    pub end_timestamp: i64,
}
