//! AAC-LC decoder configuration.
//!
//! A trimmed `DecoderConfigDescriptor` in the ISO 14496-1 expandable-tag
//! style wrapping the `AudioSpecificConfig`. Only the AAC-LC object type
//! with the implicit one-byte size form is produced.

use anyhow::{Result, bail};

use crate::utils::bit_buffer::{ReadBitBuffer, WriteBitBuffer};
use crate::utils::errors::CodecConfigError;

pub const AAC_DECODER_CONFIG_DESCRIPTOR_TAG: u8 = 0x04;
pub const AAC_DECODER_SPECIFIC_INFO_TAG: u8 = 0x05;
pub const AAC_OBJECT_TYPE_INDICATION: u8 = 0x40;
pub const AAC_AUDIO_OBJECT_TYPE_LC: u8 = 2;

const SAMPLE_FREQUENCIES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];
const FREQUENCY_INDEX_ESCAPE: u8 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GaSpecificConfig {
    pub frame_length_flag: bool,
    pub depends_on_core_coder: bool,
    pub extension_flag: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSpecificConfig {
    pub audio_object_type: u8,
    /// 4-bit index into the frequency table; 15 escapes to a 24-bit rate.
    pub sample_frequency_index: u8,
    pub sampling_frequency: u32,
    pub channel_configuration: u8,
    pub ga_specific_config: GaSpecificConfig,
}

impl AudioSpecificConfig {
    pub fn output_sample_rate(&self) -> Result<u32> {
        if self.sample_frequency_index == FREQUENCY_INDEX_ESCAPE {
            return Ok(self.sampling_frequency);
        }
        SAMPLE_FREQUENCIES
            .get(self.sample_frequency_index as usize)
            .copied()
            .ok_or_else(|| {
                CodecConfigError::InvalidAacFrequencyIndex(self.sample_frequency_index).into()
            })
    }

    fn size_bytes(&self) -> u32 {
        // 5 + 4 + [24] + 4 + 3 bits, rounded up to bytes.
        if self.sample_frequency_index == FREQUENCY_INDEX_ESCAPE {
            5
        } else {
            2
        }
    }

    fn write(&self, wb: &mut WriteBitBuffer) -> Result<()> {
        wb.write_unsigned_literal(u32::from(self.audio_object_type), 5)?;
        wb.write_unsigned_literal(u32::from(self.sample_frequency_index), 4)?;
        if self.sample_frequency_index == FREQUENCY_INDEX_ESCAPE {
            wb.write_unsigned_literal(self.sampling_frequency, 24)?;
        }
        wb.write_unsigned_literal(u32::from(self.channel_configuration), 4)?;
        wb.write_bool(self.ga_specific_config.frame_length_flag)?;
        wb.write_bool(self.ga_specific_config.depends_on_core_coder)?;
        wb.write_bool(self.ga_specific_config.extension_flag)
    }

    fn read(rb: &mut ReadBitBuffer) -> Result<Self> {
        let audio_object_type = rb.read_unsigned_literal(5)? as u8;
        let sample_frequency_index = rb.read_unsigned_literal(4)? as u8;
        let sampling_frequency = if sample_frequency_index == FREQUENCY_INDEX_ESCAPE {
            rb.read_unsigned_literal(24)?
        } else {
            0
        };
        Ok(Self {
            audio_object_type,
            sample_frequency_index,
            sampling_frequency,
            channel_configuration: rb.read_unsigned_literal(4)? as u8,
            ga_specific_config: GaSpecificConfig {
                frame_length_flag: rb.read_bool()?,
                depends_on_core_coder: rb.read_bool()?,
                extension_flag: rb.read_bool()?,
            },
        })
    }
}

impl Default for AudioSpecificConfig {
    fn default() -> Self {
        Self {
            audio_object_type: AAC_AUDIO_OBJECT_TYPE_LC,
            sample_frequency_index: 3, // 48000
            sampling_frequency: 0,
            channel_configuration: 2,
            ga_specific_config: GaSpecificConfig {
                frame_length_flag: false,
                depends_on_core_coder: false,
                extension_flag: false,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AacDecoderConfig {
    pub buffer_size_db: u32,
    pub max_bitrate: u32,
    pub average_bit_rate: u32,
    pub audio_specific_config: AudioSpecificConfig,
}

impl Default for AacDecoderConfig {
    fn default() -> Self {
        Self {
            buffer_size_db: 0,
            max_bitrate: 0,
            average_bit_rate: 0,
            audio_specific_config: AudioSpecificConfig::default(),
        }
    }
}

impl AacDecoderConfig {
    pub fn output_sample_rate(&self) -> Result<u32> {
        self.audio_specific_config.output_sample_rate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.audio_specific_config.audio_object_type != AAC_AUDIO_OBJECT_TYPE_LC {
            bail!(CodecConfigError::DecoderConfigMismatch("mp4a"));
        }
        self.output_sample_rate().map(|_| ())
    }

    pub fn write(&self, wb: &mut WriteBitBuffer) -> Result<()> {
        let asc_size = self.audio_specific_config.size_bytes();
        // object_type_indication + stream byte + buffer_size_db + two
        // bitrates + the DecoderSpecificInfo tag, size, and payload.
        let descriptor_size = 1 + 1 + 3 + 4 + 4 + 2 + asc_size;

        wb.write_unsigned_literal(u32::from(AAC_DECODER_CONFIG_DESCRIPTOR_TAG), 8)?;
        wb.write_unsigned_literal(descriptor_size, 8)?;
        wb.write_unsigned_literal(u32::from(AAC_OBJECT_TYPE_INDICATION), 8)?;
        // stream_type (6), upstream (1), reserved (1).
        wb.write_unsigned_literal(0x05, 6)?;
        wb.write_bool(false)?;
        wb.write_bool(true)?;
        wb.write_unsigned_literal(self.buffer_size_db, 24)?;
        wb.write_unsigned_literal(self.max_bitrate, 32)?;
        wb.write_unsigned_literal(self.average_bit_rate, 32)?;

        wb.write_unsigned_literal(u32::from(AAC_DECODER_SPECIFIC_INFO_TAG), 8)?;
        wb.write_unsigned_literal(asc_size, 8)?;
        self.audio_specific_config.write(wb)
    }

    pub fn read(rb: &mut ReadBitBuffer) -> Result<Self> {
        let tag = rb.read_unsigned_literal(8)? as u8;
        if tag != AAC_DECODER_CONFIG_DESCRIPTOR_TAG {
            bail!(CodecConfigError::DecoderConfigMismatch("mp4a"));
        }
        let _descriptor_size = rb.read_unsigned_literal(8)?;
        let object_type_indication = rb.read_unsigned_literal(8)? as u8;
        if object_type_indication != AAC_OBJECT_TYPE_INDICATION {
            bail!(CodecConfigError::DecoderConfigMismatch("mp4a"));
        }
        let _stream_byte = rb.read_unsigned_literal(8)?;

        let config = Self {
            buffer_size_db: rb.read_unsigned_literal(24)?,
            max_bitrate: rb.read_unsigned_literal(32)?,
            average_bit_rate: rb.read_unsigned_literal(32)?,
            audio_specific_config: {
                let tag = rb.read_unsigned_literal(8)? as u8;
                if tag != AAC_DECODER_SPECIFIC_INFO_TAG {
                    bail!(CodecConfigError::DecoderConfigMismatch("mp4a"));
                }
                let size = rb.read_unsigned_literal(8)?;
                let asc = AudioSpecificConfig::read(rb)?;
                // Skip padding up to the declared size.
                let bits_read: u64 = if asc.sample_frequency_index == FREQUENCY_INDEX_ESCAPE {
                    40
                } else {
                    16
                };
                let padding = (u64::from(size) * 8).saturating_sub(bits_read);
                if padding > 0 {
                    rb.read_bytes((padding / 8) as usize)?;
                }
                asc
            },
        };
        config.validate()?;
        Ok(config)
    }
}
