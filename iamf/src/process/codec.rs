//! The codec encoder seam.
//!
//! External codec libraries sit behind [`FrameEncoder`]; only LPCM is
//! encoded in-process, as a passthrough packer. The Opus/AAC/FLAC settings
//! records carry the user-metadata knobs those external encoders consume.

use anyhow::Result;

use crate::obu::decoder_config::lpcm::{LpcmDecoderConfig, LpcmFormatFlags};
use crate::utils::errors::CodecConfigError;

/// One frame in, one coded payload out. Instances are single-substream and
/// not shared across threads.
pub trait FrameEncoder {
    /// Samples the decoder will discard from the stream start (codec delay).
    fn number_of_samples_to_delay(&self) -> u32 {
        0
    }

    /// Encodes one frame of `(time, channel)` samples.
    fn encode_frame(&mut self, samples: &[Vec<i32>]) -> Result<Vec<u8>>;
}

/// Packs samples at the configured width and byte order, unmodified.
#[derive(Debug, Clone)]
pub struct LpcmFrameEncoder {
    sample_format_flags: LpcmFormatFlags,
    sample_size: u8,
}

impl LpcmFrameEncoder {
    pub fn new(decoder_config: &LpcmDecoderConfig) -> Result<Self> {
        decoder_config.validate()?;
        Ok(Self {
            sample_format_flags: decoder_config.sample_format_flags,
            sample_size: decoder_config.sample_size,
        })
    }
}

impl FrameEncoder for LpcmFrameEncoder {
    fn encode_frame(&mut self, samples: &[Vec<i32>]) -> Result<Vec<u8>> {
        let bytes_per_sample = usize::from(self.sample_size / 8);
        let num_channels = samples.first().map_or(0, Vec::len);
        let mut frame = Vec::with_capacity(samples.len() * num_channels * bytes_per_sample);

        for tick in samples {
            for &sample in tick {
                let raw = (sample as u32).to_be_bytes();
                let significant = &raw[4 - bytes_per_sample..];
                match self.sample_format_flags {
                    LpcmFormatFlags::BigEndian => frame.extend_from_slice(significant),
                    LpcmFormatFlags::LittleEndian => {
                        frame.extend(significant.iter().rev());
                    }
                }
            }
        }
        Ok(frame)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpusApplication {
    #[default]
    Audio,
    Voip,
    RestrictedLowdelay,
}

/// Knobs forwarded to an external Opus encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpusEncoderSettings {
    pub target_bitrate_per_channel: u32,
    pub use_float_api: bool,
    pub application: OpusApplication,
}

impl Default for OpusEncoderSettings {
    fn default() -> Self {
        Self {
            target_bitrate_per_channel: 48000,
            use_float_api: true,
            application: OpusApplication::Audio,
        }
    }
}

/// Knobs forwarded to an external AAC-LC encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AacEncoderSettings {
    pub enable_afterburner: bool,
    pub bitrate_mode: u32,
    pub signaling_mode: u32,
}

/// Knobs forwarded to an external FLAC encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlacEncoderSettings {
    pub compression_level: u32,
}

/// Creates the in-process encoder for a codec, or reports the codec as
/// external.
pub fn new_lpcm_encoder(decoder_config: &LpcmDecoderConfig) -> Result<Box<dyn FrameEncoder>> {
    Ok(Box::new(LpcmFrameEncoder::new(decoder_config)?))
}

/// Guard for codecs whose encoders are not linked into this build.
pub fn external_codec_unavailable(codec_name: &'static str) -> anyhow::Error {
    CodecConfigError::ExternalEncoderUnavailable(codec_name).into()
}
