//! The common OBU header.
//!
//! Every OBU starts with one packed byte
//! (`obu_type << 3 | redundant << 2 | trimming << 1 | extension`), the
//! `obu_size` LEB128, and the optional trimming and extension-header fields.
//! `obu_size` counts every byte after itself, the payload included.

use anyhow::{Result, bail};

use crate::utils::bit_buffer::{ReadBitBuffer, WriteBitBuffer};
use crate::utils::errors::ObuError;

/// 5-bit OBU type tag.
///
/// Audio frames with substream ids 0..=17 have their own implicit types;
/// the reserved range is preserved on write and tolerated on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObuType {
    CodecConfig,
    AudioElement,
    MixPresentation,
    ParameterBlock,
    TemporalDelimiter,
    AudioFrame,
    /// Implicit-id audio frame; the wrapped id is in `0..=17`.
    AudioFrameId(u8),
    /// Reserved type codes 24..=30.
    Reserved(u8),
    IaSequenceHeader,
}

impl ObuType {
    pub const MAX_IMPLICIT_AUDIO_FRAME_ID: u8 = 17;

    pub fn code(&self) -> u8 {
        match self {
            Self::CodecConfig => 0,
            Self::AudioElement => 1,
            Self::MixPresentation => 2,
            Self::ParameterBlock => 3,
            Self::TemporalDelimiter => 4,
            Self::AudioFrame => 5,
            Self::AudioFrameId(id) => 6 + id,
            Self::Reserved(code) => *code,
            Self::IaSequenceHeader => 31,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::CodecConfig,
            1 => Self::AudioElement,
            2 => Self::MixPresentation,
            3 => Self::ParameterBlock,
            4 => Self::TemporalDelimiter,
            5 => Self::AudioFrame,
            6..=23 => Self::AudioFrameId(code - 6),
            24..=30 => Self::Reserved(code),
            _ => Self::IaSequenceHeader,
        }
    }

    pub fn is_audio_frame(&self) -> bool {
        matches!(self, Self::AudioFrame | Self::AudioFrameId(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::CodecConfig => "Codec Config",
            Self::AudioElement => "Audio Element",
            Self::MixPresentation => "Mix Presentation",
            Self::ParameterBlock => "Parameter Block",
            Self::TemporalDelimiter => "Temporal Delimiter",
            Self::AudioFrame | Self::AudioFrameId(_) => "Audio Frame",
            Self::Reserved(_) => "Reserved",
            Self::IaSequenceHeader => "IA Sequence Header",
        }
    }
}

impl std::fmt::Display for ObuType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObuHeader {
    pub obu_type: ObuType,
    pub obu_redundant_copy: bool,
    pub obu_trimming_status_flag: bool,
    pub obu_extension_flag: bool,

    /// Present on the wire iff `obu_trimming_status_flag`. Written end first.
    pub num_samples_to_trim_at_end: u32,
    pub num_samples_to_trim_at_start: u32,

    /// Present on the wire iff `obu_extension_flag`, prefixed by its length.
    pub extension_header_bytes: Vec<u8>,
}

impl ObuHeader {
    pub fn new(obu_type: ObuType) -> Self {
        Self {
            obu_type,
            obu_redundant_copy: false,
            obu_trimming_status_flag: false,
            obu_extension_flag: false,
            num_samples_to_trim_at_end: 0,
            num_samples_to_trim_at_start: 0,
            extension_header_bytes: Vec::new(),
        }
    }

    pub fn extension_header_size(&self) -> u32 {
        self.extension_header_bytes.len() as u32
    }

    /// Flag legality shared by every OBU kind.
    pub fn validate(&self) -> Result<()> {
        if self.obu_trimming_status_flag && !self.obu_type.is_audio_frame() {
            bail!(ObuError::TrimmingNotAllowed(self.obu_type.name()));
        }

        if self.obu_redundant_copy
            && matches!(
                self.obu_type,
                ObuType::TemporalDelimiter | ObuType::IaSequenceHeader
            )
        {
            bail!(ObuError::RedundantCopyNotAllowed(self.obu_type.name()));
        }

        Ok(())
    }

    /// Validates the header and writes it, sizing `obu_size` for a payload of
    /// `payload_size` bytes plus the optional header fields.
    pub fn validate_and_write(&self, payload_size: usize, wb: &mut WriteBitBuffer) -> Result<()> {
        self.validate()?;

        let leb = wb.leb_generator();
        let mut obu_size = payload_size as u64;
        if self.obu_trimming_status_flag {
            obu_size += leb.uleb128_len(self.num_samples_to_trim_at_end)? as u64;
            obu_size += leb.uleb128_len(self.num_samples_to_trim_at_start)? as u64;
        }
        if self.obu_extension_flag {
            obu_size += leb.uleb128_len(self.extension_header_size())? as u64;
            obu_size += self.extension_header_bytes.len() as u64;
        }
        if obu_size > u64::from(u32::MAX) {
            bail!(ObuError::ObuSizeTooLarge(obu_size));
        }

        wb.write_unsigned_literal(u32::from(self.obu_type.code()), 5)?;
        wb.write_bool(self.obu_redundant_copy)?;
        wb.write_bool(self.obu_trimming_status_flag)?;
        wb.write_bool(self.obu_extension_flag)?;
        wb.write_uleb128(obu_size as u32)?;

        if self.obu_trimming_status_flag {
            wb.write_uleb128(self.num_samples_to_trim_at_end)?;
            wb.write_uleb128(self.num_samples_to_trim_at_start)?;
        }
        if self.obu_extension_flag {
            wb.write_uleb128(self.extension_header_size())?;
            wb.write_bytes(&self.extension_header_bytes)?;
        }

        Ok(())
    }

    /// Reads and validates a header, returning it with the payload size in
    /// bytes still to be consumed.
    pub fn read_and_validate(rb: &mut ReadBitBuffer) -> Result<(Self, u64)> {
        let obu_type = ObuType::from_code(rb.read_unsigned_literal(5)? as u8);
        let obu_redundant_copy = rb.read_bool()?;
        let obu_trimming_status_flag = rb.read_bool()?;
        let obu_extension_flag = rb.read_bool()?;

        let obu_size = u64::from(rb.read_uleb128()?);
        let position_after_size = rb.position()?;

        let mut header = Self {
            obu_type,
            obu_redundant_copy,
            obu_trimming_status_flag,
            obu_extension_flag,
            num_samples_to_trim_at_end: 0,
            num_samples_to_trim_at_start: 0,
            extension_header_bytes: Vec::new(),
        };

        if obu_trimming_status_flag {
            header.num_samples_to_trim_at_end = rb.read_uleb128()?;
            header.num_samples_to_trim_at_start = rb.read_uleb128()?;
        }
        if obu_extension_flag {
            let extension_header_size = rb.read_uleb128()?;
            header.extension_header_bytes = rb.read_bytes(extension_header_size as usize)?;
        }
        header.validate()?;

        let consumed = (rb.position()? - position_after_size) / 8;
        if consumed > obu_size {
            bail!(ObuError::PayloadOverrun {
                expected: obu_size,
                consumed,
            });
        }

        Ok((header, obu_size - consumed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::bit_buffer::{LebGenerationMode, LebGenerator};
    use anyhow::Result;

    fn write_header(header: &ObuHeader, payload_size: usize) -> Result<Vec<u8>> {
        let mut wb = WriteBitBuffer::new(LebGenerator::default());
        header.validate_and_write(payload_size, &mut wb)?;
        wb.into_bytes()
    }

    #[test]
    fn first_byte_packs_type_and_flags() -> Result<()> {
        let mut header = ObuHeader::new(ObuType::AudioElement);
        header.obu_redundant_copy = true;
        let bytes = write_header(&header, 0)?;
        assert_eq!(bytes, vec![1 << 3 | 1 << 2, 0]);
        Ok(())
    }

    #[test]
    fn obu_size_counts_payload_and_optional_fields() -> Result<()> {
        let mut header = ObuHeader::new(ObuType::AudioFrameId(0));
        header.obu_trimming_status_flag = true;
        header.num_samples_to_trim_at_end = 128;
        header.num_samples_to_trim_at_start = 1;

        // trim_end takes two LEB bytes, trim_start one, payload ten.
        let bytes = write_header(&header, 10)?;
        assert_eq!(bytes, vec![6 << 3 | 1 << 1, 13, 0x80, 0x01, 1]);
        Ok(())
    }

    #[test]
    fn extension_header_bytes_are_written_verbatim() -> Result<()> {
        let mut header = ObuHeader::new(ObuType::CodecConfig);
        header.obu_extension_flag = true;
        header.extension_header_bytes = vec![0xde, 0xad];

        let bytes = write_header(&header, 0)?;
        assert_eq!(bytes, vec![1, 3, 2, 0xde, 0xad]);
        Ok(())
    }

    #[test]
    fn fixed_size_leb_generator_affects_every_header_leb() -> Result<()> {
        let mut header = ObuHeader::new(ObuType::AudioFrameId(1));
        header.obu_trimming_status_flag = true;
        header.num_samples_to_trim_at_end = 2;

        let mut wb =
            WriteBitBuffer::new(LebGenerator::new(LebGenerationMode::FixedSize(2))?);
        header.validate_and_write(1, &mut wb)?;
        let bytes = wb.into_bytes()?;
        assert_eq!(
            bytes,
            vec![7 << 3 | 1 << 1, 0x85, 0x00, 0x82, 0x00, 0x80, 0x00]
        );
        Ok(())
    }

    #[test]
    fn trimming_is_rejected_outside_audio_frames() {
        let mut header = ObuHeader::new(ObuType::CodecConfig);
        header.obu_trimming_status_flag = true;
        assert!(header.validate().is_err());

        let mut header = ObuHeader::new(ObuType::AudioFrame);
        header.obu_trimming_status_flag = true;
        assert!(header.validate().is_ok());
    }

    #[test]
    fn redundant_copies_of_sequence_markers_are_rejected() {
        for obu_type in [ObuType::TemporalDelimiter, ObuType::IaSequenceHeader] {
            let mut header = ObuHeader::new(obu_type);
            header.obu_redundant_copy = true;
            assert!(header.validate().is_err());
        }

        let mut header = ObuHeader::new(ObuType::MixPresentation);
        header.obu_redundant_copy = true;
        assert!(header.validate().is_ok());
    }

    #[test]
    fn headers_round_trip() -> Result<()> {
        let mut header = ObuHeader::new(ObuType::AudioFrame);
        header.obu_trimming_status_flag = true;
        header.num_samples_to_trim_at_end = 64;
        header.obu_extension_flag = true;
        header.extension_header_bytes = b"extra".to_vec();

        let bytes = write_header(&header, 7)?;
        let mut rb = ReadBitBuffer::from_slice(&bytes);
        let (read_header, payload_size) = ObuHeader::read_and_validate(&mut rb)?;
        assert_eq!(read_header, header);
        assert_eq!(payload_size, 7);
        Ok(())
    }

    #[test]
    fn every_type_code_round_trips() {
        for code in 0..=31u8 {
            assert_eq!(ObuType::from_code(code).code(), code);
        }
    }
}
