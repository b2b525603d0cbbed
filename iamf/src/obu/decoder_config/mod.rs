//! Per-codec decoder configuration records embedded in a Codec Config OBU.

use anyhow::Result;

use crate::utils::bit_buffer::{ReadBitBuffer, WriteBitBuffer};

pub mod aac;
pub mod flac;
pub mod lpcm;
pub mod opus;

pub use aac::AacDecoderConfig;
pub use flac::FlacDecoderConfig;
pub use lpcm::LpcmDecoderConfig;
pub use opus::OpusDecoderConfig;

#[derive(Debug, Clone, PartialEq)]
pub enum DecoderConfig {
    Lpcm(LpcmDecoderConfig),
    Opus(OpusDecoderConfig),
    Flac(FlacDecoderConfig),
    Aac(AacDecoderConfig),
}

impl DecoderConfig {
    pub fn validate(&self, num_samples_per_frame: u32) -> Result<()> {
        match self {
            Self::Lpcm(config) => config.validate(),
            Self::Opus(config) => config.validate(),
            Self::Flac(config) => config.validate(num_samples_per_frame),
            Self::Aac(config) => config.validate(),
        }
    }

    pub fn validate_and_write(
        &self,
        num_samples_per_frame: u32,
        wb: &mut WriteBitBuffer,
    ) -> Result<()> {
        self.validate(num_samples_per_frame)?;
        match self {
            Self::Lpcm(config) => config.write(wb),
            Self::Opus(config) => config.write(wb),
            Self::Flac(config) => config.write(wb),
            Self::Aac(config) => config.write(wb),
        }
    }

    pub fn input_sample_rate(&self) -> Result<u32> {
        match self {
            Self::Lpcm(config) => Ok(config.sample_rate),
            Self::Opus(config) => Ok(config.input_sample_rate),
            Self::Flac(config) => Ok(config.stream_info()?.sample_rate),
            Self::Aac(config) => config.output_sample_rate(),
        }
    }

    pub fn output_sample_rate(&self) -> Result<u32> {
        match self {
            Self::Lpcm(config) => Ok(config.sample_rate),
            Self::Opus(_) => Ok(opus::OPUS_OUTPUT_SAMPLE_RATE),
            Self::Flac(config) => Ok(config.stream_info()?.sample_rate),
            Self::Aac(config) => config.output_sample_rate(),
        }
    }

    /// Native bit depth the loudness pipeline measures against.
    pub fn bit_depth_to_measure_loudness(&self) -> Result<u8> {
        match self {
            Self::Lpcm(config) => Ok(config.sample_size),
            Self::Opus(_) => Ok(16),
            Self::Flac(config) => Ok(config.stream_info()?.bits_per_sample),
            Self::Aac(_) => Ok(16),
        }
    }

    pub fn read(codec: super::codec_config::CodecId, rb: &mut ReadBitBuffer) -> Result<Self> {
        use super::codec_config::CodecId;
        match codec {
            CodecId::Lpcm => LpcmDecoderConfig::read(rb).map(Self::Lpcm),
            CodecId::Opus => OpusDecoderConfig::read(rb).map(Self::Opus),
            CodecId::Flac => FlacDecoderConfig::read(rb).map(Self::Flac),
            CodecId::AacLc => AacDecoderConfig::read(rb).map(Self::Aac),
        }
    }
}
