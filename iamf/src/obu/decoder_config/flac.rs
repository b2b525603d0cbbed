//! FLAC decoder configuration.
//!
//! A sequence of FLAC metadata blocks; the first must be STREAMINFO. Block
//! kinds other than STREAMINFO are carried as opaque bytes.

use anyhow::{Result, bail};

use crate::utils::bit_buffer::{ReadBitBuffer, WriteBitBuffer};
use crate::utils::errors::CodecConfigError;

pub const FLAC_BLOCK_TYPE_STREAMINFO: u8 = 0;

const STREAMINFO_PAYLOAD_SIZE: u32 = 34;

/// STREAMINFO fields, stored in their logical form.
///
/// `number_of_channels` and `bits_per_sample` are stored as actual counts;
/// the wire carries them minus one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlacStreamInfo {
    pub minimum_block_size: u16,
    pub maximum_block_size: u16,
    pub minimum_frame_size: u32,
    pub maximum_frame_size: u32,
    pub sample_rate: u32,
    pub number_of_channels: u8,
    pub bits_per_sample: u8,
    pub total_samples_in_stream: u64,
    pub md5_signature: [u8; 16],
}

impl FlacStreamInfo {
    fn write(&self, wb: &mut WriteBitBuffer) -> Result<()> {
        wb.write_unsigned_literal(u32::from(self.minimum_block_size), 16)?;
        wb.write_unsigned_literal(u32::from(self.maximum_block_size), 16)?;
        wb.write_unsigned_literal(self.minimum_frame_size, 24)?;
        wb.write_unsigned_literal(self.maximum_frame_size, 24)?;
        wb.write_unsigned_literal(self.sample_rate, 20)?;
        wb.write_unsigned_literal(u32::from(self.number_of_channels) - 1, 3)?;
        wb.write_unsigned_literal(u32::from(self.bits_per_sample) - 1, 5)?;
        wb.write_unsigned_literal64(self.total_samples_in_stream, 36)?;
        wb.write_bytes(&self.md5_signature)
    }

    fn read(rb: &mut ReadBitBuffer) -> Result<Self> {
        Ok(Self {
            minimum_block_size: rb.read_unsigned_literal(16)? as u16,
            maximum_block_size: rb.read_unsigned_literal(16)? as u16,
            minimum_frame_size: rb.read_unsigned_literal(24)?,
            maximum_frame_size: rb.read_unsigned_literal(24)?,
            sample_rate: rb.read_unsigned_literal(20)?,
            number_of_channels: rb.read_unsigned_literal(3)? as u8 + 1,
            bits_per_sample: rb.read_unsigned_literal(5)? as u8 + 1,
            total_samples_in_stream: rb.read_unsigned_literal64(36)?,
            md5_signature: {
                let bytes = rb.read_bytes(16)?;
                let mut md5 = [0u8; 16];
                md5.copy_from_slice(&bytes);
                md5
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlacBlockData {
    StreamInfo(FlacStreamInfo),
    Raw(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlacMetaBlock {
    pub last_metadata_block_flag: bool,
    pub block_type: u8,
    pub data: FlacBlockData,
}

impl FlacMetaBlock {
    fn payload_size(&self) -> u32 {
        match &self.data {
            FlacBlockData::StreamInfo(_) => STREAMINFO_PAYLOAD_SIZE,
            FlacBlockData::Raw(bytes) => bytes.len() as u32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlacDecoderConfig {
    pub metadata_blocks: Vec<FlacMetaBlock>,
}

impl FlacDecoderConfig {
    pub fn stream_info(&self) -> Result<&FlacStreamInfo> {
        match self.metadata_blocks.first().map(|block| &block.data) {
            Some(FlacBlockData::StreamInfo(info)) => Ok(info),
            _ => bail!(CodecConfigError::FlacMissingStreamInfo),
        }
    }

    pub fn validate(&self, num_samples_per_frame: u32) -> Result<()> {
        let stream_info = self.stream_info()?;

        // FLAC frames in the bitstream carry a constant block size matching
        // the codec config.
        if u32::from(stream_info.minimum_block_size) != num_samples_per_frame
            || u32::from(stream_info.maximum_block_size) != num_samples_per_frame
        {
            bail!(CodecConfigError::FlacBlockSizeMismatch {
                expected: num_samples_per_frame,
                min: stream_info.minimum_block_size,
                max: stream_info.maximum_block_size,
            });
        }

        for (i, block) in self.metadata_blocks.iter().enumerate() {
            let is_last = i + 1 == self.metadata_blocks.len();
            if block.last_metadata_block_flag != is_last {
                bail!(CodecConfigError::FlacBadLastBlockFlag);
            }
        }
        Ok(())
    }

    pub fn write(&self, wb: &mut WriteBitBuffer) -> Result<()> {
        for block in &self.metadata_blocks {
            wb.write_bool(block.last_metadata_block_flag)?;
            wb.write_unsigned_literal(u32::from(block.block_type), 7)?;
            wb.write_unsigned_literal(block.payload_size(), 24)?;
            match &block.data {
                FlacBlockData::StreamInfo(info) => info.write(wb)?,
                FlacBlockData::Raw(bytes) => wb.write_bytes(bytes)?,
            }
        }
        Ok(())
    }

    pub fn read(rb: &mut ReadBitBuffer) -> Result<Self> {
        let mut metadata_blocks = Vec::new();
        loop {
            let last_metadata_block_flag = rb.read_bool()?;
            let block_type = rb.read_unsigned_literal(7)? as u8;
            let length = rb.read_unsigned_literal(24)?;

            let data = if block_type == FLAC_BLOCK_TYPE_STREAMINFO {
                FlacBlockData::StreamInfo(FlacStreamInfo::read(rb)?)
            } else {
                FlacBlockData::Raw(rb.read_bytes(length as usize)?)
            };

            metadata_blocks.push(FlacMetaBlock {
                last_metadata_block_flag,
                block_type,
                data,
            });

            if last_metadata_block_flag {
                break;
            }
        }

        let config = Self { metadata_blocks };
        config.stream_info()?;
        Ok(config)
    }
}
