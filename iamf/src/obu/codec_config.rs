//! Codec Config OBUs.
//!
//! Declares the codec identity, frame size, and roll distance shared by
//! every substream that references it, and embeds the per-codec decoder
//! configuration. Derived sample rates are cached at construction so the
//! temporal pipeline can query them without re-deriving.

use anyhow::{Result, bail};

use crate::obu::decoder_config::DecoderConfig;
use crate::obu::header::{ObuHeader, ObuType};
use crate::obu::ObuBase;
use crate::utils::bit_buffer::{ReadBitBuffer, WriteBitBuffer};
use crate::utils::errors::CodecConfigError;

/// 4CC codec identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecId {
    /// `ipcm`
    Lpcm,
    /// `Opus`
    Opus,
    /// `fLaC`
    Flac,
    /// `mp4a`
    AacLc,
}

impl CodecId {
    pub fn code(&self) -> u32 {
        u32::from_be_bytes(match self {
            Self::Lpcm => *b"ipcm",
            Self::Opus => *b"Opus",
            Self::Flac => *b"fLaC",
            Self::AacLc => *b"mp4a",
        })
    }

    pub fn from_code(code: u32) -> Result<Self> {
        match &code.to_be_bytes() {
            b"ipcm" => Ok(Self::Lpcm),
            b"Opus" => Ok(Self::Opus),
            b"fLaC" => Ok(Self::Flac),
            b"mp4a" => Ok(Self::AacLc),
            _ => bail!(CodecConfigError::UnknownCodecId(code)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Lpcm => "ipcm",
            Self::Opus => "Opus",
            Self::Flac => "fLaC",
            Self::AacLc => "mp4a",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodecConfig {
    pub codec_id: CodecId,
    pub num_samples_per_frame: u32,
    pub audio_roll_distance: i16,
    pub decoder_config: DecoderConfig,
}

impl CodecConfig {
    /// Checks that the decoder config variant matches `codec_id`.
    fn validate_decoder_config_matches(&self) -> Result<()> {
        let matches = matches!(
            (&self.codec_id, &self.decoder_config),
            (CodecId::Lpcm, DecoderConfig::Lpcm(_))
                | (CodecId::Opus, DecoderConfig::Opus(_))
                | (CodecId::Flac, DecoderConfig::Flac(_))
                | (CodecId::AacLc, DecoderConfig::Aac(_))
        );
        if !matches {
            bail!(CodecConfigError::DecoderConfigMismatch(self.codec_id.name()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodecConfigObu {
    pub header: ObuHeader,
    pub codec_config_id: u32,
    pub codec_config: CodecConfig,

    // Cached by `new` after the decoder-config self-check passes.
    input_sample_rate: u32,
    output_sample_rate: u32,
    bit_depth_to_measure_loudness: u8,
}

impl CodecConfigObu {
    pub fn new(
        mut header: ObuHeader,
        codec_config_id: u32,
        codec_config: CodecConfig,
    ) -> Result<Self> {
        header.obu_type = ObuType::CodecConfig;

        codec_config.validate_decoder_config_matches()?;
        codec_config
            .decoder_config
            .validate(codec_config.num_samples_per_frame)?;

        let input_sample_rate = codec_config.decoder_config.input_sample_rate()?;
        let output_sample_rate = codec_config.decoder_config.output_sample_rate()?;
        let bit_depth_to_measure_loudness =
            codec_config.decoder_config.bit_depth_to_measure_loudness()?;

        Ok(Self {
            header,
            codec_config_id,
            codec_config,
            input_sample_rate,
            output_sample_rate,
            bit_depth_to_measure_loudness,
        })
    }

    /// Sample rate of the audio fed into the encoder.
    pub fn input_sample_rate(&self) -> u32 {
        self.input_sample_rate
    }

    /// Sample rate a decoder reconstructs. Differs from the input rate only
    /// for Opus, which always decodes at 48 kHz.
    pub fn output_sample_rate(&self) -> u32 {
        self.output_sample_rate
    }

    pub fn bit_depth_to_measure_loudness(&self) -> u8 {
        self.bit_depth_to_measure_loudness
    }

    pub fn num_samples_per_frame(&self) -> u32 {
        self.codec_config.num_samples_per_frame
    }

    pub fn validate_and_read_payload(header: ObuHeader, rb: &mut ReadBitBuffer) -> Result<Self> {
        let codec_config_id = rb.read_uleb128()?;
        let codec_id = CodecId::from_code(rb.read_unsigned_literal(32)?)?;
        let num_samples_per_frame = rb.read_uleb128()?;
        let audio_roll_distance = rb.read_signed16()?;
        let decoder_config = DecoderConfig::read(codec_id, rb)?;

        if num_samples_per_frame == 0 {
            bail!(CodecConfigError::ZeroSamplesPerFrame);
        }

        Self::new(
            header,
            codec_config_id,
            CodecConfig {
                codec_id,
                num_samples_per_frame,
                audio_roll_distance,
                decoder_config,
            },
        )
    }
}

impl ObuBase for CodecConfigObu {
    fn header(&self) -> &ObuHeader {
        &self.header
    }

    fn validate_and_write_payload(&self, wb: &mut WriteBitBuffer) -> Result<()> {
        if self.codec_config.num_samples_per_frame == 0 {
            bail!(CodecConfigError::ZeroSamplesPerFrame);
        }
        self.codec_config.validate_decoder_config_matches()?;

        wb.write_uleb128(self.codec_config_id)?;
        wb.write_unsigned_literal(self.codec_config.codec_id.code(), 32)?;
        wb.write_uleb128(self.codec_config.num_samples_per_frame)?;
        wb.write_signed16(self.codec_config.audio_roll_distance)?;
        self.codec_config
            .decoder_config
            .validate_and_write(self.codec_config.num_samples_per_frame, wb)
    }
}
