//! Temporal Delimiter OBUs. Empty payload; one per temporal unit.

use anyhow::Result;

use crate::obu::header::{ObuHeader, ObuType};
use crate::obu::ObuBase;
use crate::utils::bit_buffer::{ReadBitBuffer, WriteBitBuffer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporalDelimiterObu {
    pub header: ObuHeader,
}

impl TemporalDelimiterObu {
    pub fn new(mut header: ObuHeader) -> Self {
        header.obu_type = ObuType::TemporalDelimiter;
        Self { header }
    }

    pub fn validate_and_read_payload(header: ObuHeader, _rb: &mut ReadBitBuffer) -> Result<Self> {
        Ok(Self { header })
    }
}

impl ObuBase for TemporalDelimiterObu {
    fn header(&self) -> &ObuHeader {
        &self.header
    }

    fn validate_and_write_payload(&self, _wb: &mut WriteBitBuffer) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::bit_buffer::{LebGenerationMode, LebGenerator};
    use anyhow::Result;

    #[test]
    fn constructor_sets_obu_type() {
        let obu = TemporalDelimiterObu::new(ObuHeader::new(ObuType::CodecConfig));
        assert_eq!(obu.header.obu_type, ObuType::TemporalDelimiter);
    }

    #[test]
    fn default_delimiter_is_two_bytes() -> Result<()> {
        let obu = TemporalDelimiterObu::new(ObuHeader::new(ObuType::TemporalDelimiter));
        let mut wb = WriteBitBuffer::new(LebGenerator::default());
        obu.validate_and_write(&mut wb)?;
        assert_eq!(wb.into_bytes()?, vec![4 << 3, 0]);
        Ok(())
    }

    #[test]
    fn extension_header_is_carried_in_obu_size() -> Result<()> {
        let mut header = ObuHeader::new(ObuType::TemporalDelimiter);
        header.obu_extension_flag = true;
        header.extension_header_bytes = b"extra".to_vec();
        let obu = TemporalDelimiterObu::new(header);

        let mut wb = WriteBitBuffer::new(LebGenerator::default());
        obu.validate_and_write(&mut wb)?;
        assert_eq!(
            wb.into_bytes()?,
            vec![4 << 3 | 1, 6, 5, b'e', b'x', b't', b'r', b'a']
        );
        Ok(())
    }

    #[test]
    fn fixed_size_leb2_extension_header_matches_the_reference_bytes() -> Result<()> {
        let mut header = ObuHeader::new(ObuType::TemporalDelimiter);
        header.obu_extension_flag = true;
        header.extension_header_bytes = b"extra".to_vec();
        let obu = TemporalDelimiterObu::new(header);

        let mut wb =
            WriteBitBuffer::new(LebGenerator::new(LebGenerationMode::FixedSize(2))?);
        obu.validate_and_write(&mut wb)?;
        assert_eq!(
            wb.into_bytes()?,
            vec![
                4 << 3 | 1,
                // `obu_size`.
                0x87, 0x00,
                // `extension_header_size`.
                0x85, 0x00,
                // `extension_header_bytes`.
                b'e', b'x', b't', b'r', b'a',
            ]
        );
        Ok(())
    }

    #[test]
    fn redundant_copies_and_trimming_are_illegal() {
        let mut header = ObuHeader::new(ObuType::TemporalDelimiter);
        header.obu_redundant_copy = true;
        let obu = TemporalDelimiterObu::new(header);
        let mut wb = WriteBitBuffer::new(LebGenerator::default());
        assert!(obu.validate_and_write(&mut wb).is_err());

        let mut header = ObuHeader::new(ObuType::TemporalDelimiter);
        header.obu_trimming_status_flag = true;
        let obu = TemporalDelimiterObu::new(header);
        let mut wb = WriteBitBuffer::new(LebGenerator::default());
        assert!(obu.validate_and_write(&mut wb).is_err());
    }

    #[test]
    fn round_trips_through_the_reader() -> Result<()> {
        let obu = TemporalDelimiterObu::new(ObuHeader::new(ObuType::TemporalDelimiter));
        let mut wb = WriteBitBuffer::new(LebGenerator::default());
        obu.validate_and_write(&mut wb)?;
        let bytes = wb.into_bytes()?;

        let mut rb = ReadBitBuffer::from_slice(&bytes);
        match crate::obu::read_obu(&mut rb)? {
            crate::obu::DecodedObu::TemporalDelimiter(read_obu) => assert_eq!(read_obu, obu),
            other => panic!("expected a temporal delimiter, got {other:?}"),
        }
        Ok(())
    }
}
