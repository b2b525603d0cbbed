//! Opus decoder configuration.
//!
//! Fields follow the Opus identification header, but are serialized
//! big-endian like every other field in the bitstream. The decode side of an
//! Opus substream always runs at 48 kHz regardless of the input rate.

use anyhow::{Result, bail};

use crate::utils::bit_buffer::{ReadBitBuffer, WriteBitBuffer};
use crate::utils::errors::CodecConfigError;

pub const OPUS_OUTPUT_SAMPLE_RATE: u32 = 48000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpusDecoderConfig {
    pub version: u8,
    pub output_channel_count: u8,
    pub pre_skip: u16,
    pub input_sample_rate: u32,
    pub output_gain: i16,
    pub mapping_family: u8,
}

impl Default for OpusDecoderConfig {
    fn default() -> Self {
        Self {
            version: 1,
            output_channel_count: 2,
            pre_skip: 0,
            input_sample_rate: 48000,
            output_gain: 0,
            mapping_family: 0,
        }
    }
}

impl OpusDecoderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            bail!(CodecConfigError::InvalidOpusVersion(self.version));
        }
        Ok(())
    }

    pub fn write(&self, wb: &mut WriteBitBuffer) -> Result<()> {
        wb.write_unsigned_literal(u32::from(self.version), 8)?;
        wb.write_unsigned_literal(u32::from(self.output_channel_count), 8)?;
        wb.write_unsigned_literal(u32::from(self.pre_skip), 16)?;
        wb.write_unsigned_literal(self.input_sample_rate, 32)?;
        wb.write_signed16(self.output_gain)?;
        wb.write_unsigned_literal(u32::from(self.mapping_family), 8)
    }

    pub fn read(rb: &mut ReadBitBuffer) -> Result<Self> {
        let config = Self {
            version: rb.read_unsigned_literal(8)? as u8,
            output_channel_count: rb.read_unsigned_literal(8)? as u8,
            pre_skip: rb.read_unsigned_literal(16)? as u16,
            input_sample_rate: rb.read_unsigned_literal(32)?,
            output_gain: rb.read_signed16()?,
            mapping_family: rb.read_unsigned_literal(8)? as u8,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::bit_buffer::LebGenerator;
    use anyhow::Result;

    #[test]
    fn serializes_big_endian() -> Result<()> {
        let config = OpusDecoderConfig {
            pre_skip: 312,
            input_sample_rate: 48000,
            ..Default::default()
        };
        let mut wb = WriteBitBuffer::new(LebGenerator::default());
        config.write(&mut wb)?;
        assert_eq!(
            wb.into_bytes()?,
            vec![1, 2, 0x01, 0x38, 0x00, 0x00, 0xbb, 0x80, 0, 0, 0]
        );
        Ok(())
    }

    #[test]
    fn round_trips() -> Result<()> {
        let config = OpusDecoderConfig {
            pre_skip: 120,
            input_sample_rate: 16000,
            output_gain: -3,
            ..Default::default()
        };
        let mut wb = WriteBitBuffer::new(LebGenerator::default());
        config.write(&mut wb)?;
        let bytes = wb.into_bytes()?;

        let mut rb = ReadBitBuffer::from_slice(&bytes);
        assert_eq!(OpusDecoderConfig::read(&mut rb)?, config);
        Ok(())
    }

    #[test]
    fn rejects_unknown_versions() {
        let config = OpusDecoderConfig {
            version: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
