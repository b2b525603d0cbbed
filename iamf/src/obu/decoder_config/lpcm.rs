//! LPCM decoder configuration.

use anyhow::{Result, bail};

use crate::utils::bit_buffer::{ReadBitBuffer, WriteBitBuffer};
use crate::utils::errors::CodecConfigError;

pub const LEGAL_LPCM_SAMPLE_RATES: [u32; 5] = [16000, 32000, 44100, 48000, 96000];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LpcmFormatFlags {
    #[default]
    BigEndian,
    LittleEndian,
}

impl LpcmFormatFlags {
    pub fn code(&self) -> u8 {
        match self {
            Self::BigEndian => 0,
            Self::LittleEndian => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LpcmDecoderConfig {
    pub sample_format_flags: LpcmFormatFlags,
    pub sample_size: u8,
    pub sample_rate: u32,
}

impl LpcmDecoderConfig {
    pub fn validate(&self) -> Result<()> {
        if !LEGAL_LPCM_SAMPLE_RATES.contains(&self.sample_rate) {
            bail!(CodecConfigError::InvalidLpcmSampleRate(self.sample_rate));
        }
        if !matches!(self.sample_size, 16 | 24 | 32) {
            bail!(CodecConfigError::InvalidLpcmSampleSize(self.sample_size));
        }
        Ok(())
    }

    pub fn write(&self, wb: &mut WriteBitBuffer) -> Result<()> {
        wb.write_unsigned_literal(u32::from(self.sample_format_flags.code()), 8)?;
        wb.write_unsigned_literal(u32::from(self.sample_size), 8)?;
        wb.write_unsigned_literal(self.sample_rate, 32)
    }

    pub fn read(_rb: &mut ReadBitBuffer) -> Result<Self> {
        bail!(CodecConfigError::DecoderConfigReadUnimplemented("LPCM"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::bit_buffer::LebGenerator;
    use anyhow::Result;

    #[test]
    fn serializes_all_fields() -> Result<()> {
        let config = LpcmDecoderConfig {
            sample_format_flags: LpcmFormatFlags::LittleEndian,
            sample_size: 24,
            sample_rate: 44100,
        };
        let mut wb = WriteBitBuffer::new(LebGenerator::default());
        config.write(&mut wb)?;
        assert_eq!(wb.into_bytes()?, vec![1, 24, 0x00, 0x00, 0xac, 0x44]);
        Ok(())
    }

    #[test]
    fn rejects_illegal_sample_rates() {
        for sample_rate in [0, 8000, 22050, 23000, 196000] {
            let config = LpcmDecoderConfig {
                sample_format_flags: LpcmFormatFlags::BigEndian,
                sample_size: 16,
                sample_rate,
            };
            assert!(config.validate().is_err(), "sample_rate={sample_rate}");
        }
    }

    #[test]
    fn accepts_legal_sample_rates() {
        for sample_rate in LEGAL_LPCM_SAMPLE_RATES {
            let config = LpcmDecoderConfig {
                sample_format_flags: LpcmFormatFlags::BigEndian,
                sample_size: 16,
                sample_rate,
            };
            assert!(config.validate().is_ok(), "sample_rate={sample_rate}");
        }
    }

    #[test]
    fn rejects_illegal_sample_sizes() {
        for sample_size in [0, 8, 20, 33] {
            let config = LpcmDecoderConfig {
                sample_format_flags: LpcmFormatFlags::BigEndian,
                sample_size,
                sample_rate: 48000,
            };
            assert!(config.validate().is_err(), "sample_size={sample_size}");
        }
    }

    #[test]
    fn read_is_unimplemented() {
        let bytes = [0u8; 6];
        let mut rb = ReadBitBuffer::from_slice(&bytes);
        assert!(LpcmDecoderConfig::read(&mut rb).is_err());
    }
}
