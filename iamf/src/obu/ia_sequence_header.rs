//! IA Sequence Header OBUs.
//!
//! Opens an IA sequence: the `iAMF` 4CC plus the primary and additional
//! profile bytes.

use anyhow::{Result, bail};

use crate::obu::header::{ObuHeader, ObuType};
use crate::obu::ObuBase;
use crate::utils::bit_buffer::{ReadBitBuffer, WriteBitBuffer};
use crate::utils::errors::ObuError;

/// The 4CC `iAMF`.
pub const IA_CODE: u32 = u32::from_be_bytes(*b"iAMF");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProfileVersion {
    #[default]
    Simple,
    Base,
    Reserved(u8),
}

impl ProfileVersion {
    pub fn code(&self) -> u8 {
        match self {
            Self::Simple => 0,
            Self::Base => 1,
            Self::Reserved(code) => *code,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Simple,
            1 => Self::Base,
            _ => Self::Reserved(code),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IaSequenceHeaderObu {
    pub header: ObuHeader,
    pub ia_code: u32,
    pub primary_profile: ProfileVersion,
    pub additional_profile: ProfileVersion,
}

impl IaSequenceHeaderObu {
    pub fn new(
        mut header: ObuHeader,
        primary_profile: ProfileVersion,
        additional_profile: ProfileVersion,
    ) -> Self {
        header.obu_type = ObuType::IaSequenceHeader;
        Self {
            header,
            ia_code: IA_CODE,
            primary_profile,
            additional_profile,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.ia_code != IA_CODE {
            bail!(ObuError::InvalidIaCode(self.ia_code));
        }
        Ok(())
    }

    pub fn validate_and_read_payload(header: ObuHeader, rb: &mut ReadBitBuffer) -> Result<Self> {
        let obu = Self {
            header,
            ia_code: rb.read_unsigned_literal(32)?,
            primary_profile: ProfileVersion::from_code(rb.read_unsigned_literal(8)? as u8),
            additional_profile: ProfileVersion::from_code(rb.read_unsigned_literal(8)? as u8),
        };
        obu.validate()?;
        Ok(obu)
    }
}

impl ObuBase for IaSequenceHeaderObu {
    fn header(&self) -> &ObuHeader {
        &self.header
    }

    fn validate_and_write_payload(&self, wb: &mut WriteBitBuffer) -> Result<()> {
        self.validate()?;
        wb.write_unsigned_literal(self.ia_code, 32)?;
        wb.write_unsigned_literal(u32::from(self.primary_profile.code()), 8)?;
        wb.write_unsigned_literal(u32::from(self.additional_profile.code()), 8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::bit_buffer::LebGenerator;
    use anyhow::Result;

    fn write_obu(obu: &IaSequenceHeaderObu) -> Result<Vec<u8>> {
        let mut wb = WriteBitBuffer::new(LebGenerator::default());
        obu.validate_and_write(&mut wb)?;
        wb.into_bytes()
    }

    #[test]
    fn serializes_the_ia_code_and_profiles() -> Result<()> {
        let obu = IaSequenceHeaderObu::new(
            ObuHeader::new(ObuType::IaSequenceHeader),
            ProfileVersion::Simple,
            ProfileVersion::Base,
        );
        assert_eq!(
            write_obu(&obu)?,
            vec![31 << 3, 6, b'i', b'A', b'M', b'F', 0, 1]
        );
        Ok(())
    }

    #[test]
    fn a_corrupt_ia_code_fails_validation() {
        let mut obu = IaSequenceHeaderObu::new(
            ObuHeader::new(ObuType::IaSequenceHeader),
            ProfileVersion::Simple,
            ProfileVersion::Simple,
        );
        obu.ia_code = 0;
        assert!(write_obu(&obu).is_err());
    }

    #[test]
    fn redundant_copies_are_illegal() {
        let mut header = ObuHeader::new(ObuType::IaSequenceHeader);
        header.obu_redundant_copy = true;
        let obu =
            IaSequenceHeaderObu::new(header, ProfileVersion::Simple, ProfileVersion::Simple);
        let mut wb = WriteBitBuffer::new(LebGenerator::default());
        assert!(obu.validate_and_write(&mut wb).is_err());
    }

    #[test]
    fn round_trips_through_the_reader() -> Result<()> {
        let obu = IaSequenceHeaderObu::new(
            ObuHeader::new(ObuType::IaSequenceHeader),
            ProfileVersion::Base,
            ProfileVersion::Base,
        );
        let bytes = write_obu(&obu)?;

        let mut rb = ReadBitBuffer::from_slice(&bytes);
        match crate::obu::read_obu(&mut rb)? {
            crate::obu::DecodedObu::IaSequenceHeader(read_obu) => assert_eq!(read_obu, obu),
            other => panic!("expected a sequence header, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn read_rejects_a_wrong_ia_code() {
        let bytes = [31 << 3, 6, b'x', b'A', b'M', b'F', 0, 0];
        let mut rb = ReadBitBuffer::from_slice(&bytes);
        assert!(crate::obu::read_obu(&mut rb).is_err());
    }
}
