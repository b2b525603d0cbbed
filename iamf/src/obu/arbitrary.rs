//! Arbitrary OBUs.
//!
//! User-supplied OBUs of any type, spliced into the stream at a named hook.
//! The payload is written verbatim; the header is still validated, so an
//! arbitrary OBU cannot smuggle illegal flags into the stream.

use anyhow::Result;

use crate::obu::header::{ObuHeader, ObuType};
use crate::obu::ObuBase;
use crate::utils::bit_buffer::WriteBitBuffer;

/// Where in the assembled stream an arbitrary OBU lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertionHook {
    BeforeDescriptors,
    AfterIaSequenceHeader,
    AfterCodecConfigs,
    AfterDescriptors,
    /// Inside the temporal loop, right after the delimiter of the unit whose
    /// start tick matches.
    AfterTemporalDelimiter(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArbitraryObu {
    pub header: ObuHeader,
    pub payload: Vec<u8>,
    pub insertion_hook: InsertionHook,
}

impl ArbitraryObu {
    pub fn new(obu_type: ObuType, payload: Vec<u8>, insertion_hook: InsertionHook) -> Self {
        Self {
            header: ObuHeader::new(obu_type),
            payload,
            insertion_hook,
        }
    }

    /// Writes every OBU whose hook matches, in their declared order.
    pub fn write_obus_with_hook(
        insertion_hook: InsertionHook,
        arbitrary_obus: &[ArbitraryObu],
        wb: &mut WriteBitBuffer,
    ) -> Result<()> {
        for obu in arbitrary_obus {
            if obu.insertion_hook == insertion_hook {
                obu.validate_and_write(wb)?;
            }
        }
        Ok(())
    }
}

impl ObuBase for ArbitraryObu {
    fn header(&self) -> &ObuHeader {
        &self.header
    }

    fn validate_and_write_payload(&self, wb: &mut WriteBitBuffer) -> Result<()> {
        wb.write_bytes(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::bit_buffer::LebGenerator;
    use anyhow::Result;

    #[test]
    fn payload_is_written_verbatim() -> Result<()> {
        let obu = ArbitraryObu::new(
            ObuType::Reserved(24),
            vec![0x01, 0x02],
            InsertionHook::BeforeDescriptors,
        );
        let mut wb = WriteBitBuffer::new(LebGenerator::default());
        obu.validate_and_write(&mut wb)?;
        assert_eq!(wb.into_bytes()?, vec![24 << 3, 2, 0x01, 0x02]);
        Ok(())
    }

    #[test]
    fn only_matching_hooks_are_written() -> Result<()> {
        let obus = vec![
            ArbitraryObu::new(ObuType::Reserved(24), vec![1], InsertionHook::BeforeDescriptors),
            ArbitraryObu::new(
                ObuType::Reserved(25),
                vec![2],
                InsertionHook::AfterDescriptors,
            ),
            ArbitraryObu::new(ObuType::Reserved(26), vec![3], InsertionHook::BeforeDescriptors),
        ];

        let mut wb = WriteBitBuffer::new(LebGenerator::default());
        ArbitraryObu::write_obus_with_hook(InsertionHook::BeforeDescriptors, &obus, &mut wb)?;
        assert_eq!(wb.into_bytes()?, vec![24 << 3, 1, 1, 26 << 3, 1, 3]);
        Ok(())
    }

    #[test]
    fn temporal_hooks_match_on_their_tick() -> Result<()> {
        let obus = vec![ArbitraryObu::new(
            ObuType::Reserved(24),
            vec![9],
            InsertionHook::AfterTemporalDelimiter(128),
        )];

        let mut wb = WriteBitBuffer::new(LebGenerator::default());
        ArbitraryObu::write_obus_with_hook(
            InsertionHook::AfterTemporalDelimiter(0),
            &obus,
            &mut wb,
        )?;
        assert!(wb.into_bytes()?.is_empty());

        let mut wb = WriteBitBuffer::new(LebGenerator::default());
        ArbitraryObu::write_obus_with_hook(
            InsertionHook::AfterTemporalDelimiter(128),
            &obus,
            &mut wb,
        )?;
        assert_eq!(wb.into_bytes()?, vec![24 << 3, 1, 9]);
        Ok(())
    }

    #[test]
    fn illegal_header_flags_still_fail() {
        let mut obu = ArbitraryObu::new(
            ObuType::TemporalDelimiter,
            Vec::new(),
            InsertionHook::BeforeDescriptors,
        );
        obu.header.obu_redundant_copy = true;

        let mut wb = WriteBitBuffer::new(LebGenerator::default());
        assert!(obu.validate_and_write(&mut wb).is_err());
    }
}
