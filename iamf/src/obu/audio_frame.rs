//! Audio Frame OBUs.
//!
//! Substreams 0..=17 use an implicit-id OBU type; larger ids fall back to
//! the generic type that spells the id out in the payload.

use anyhow::{Result, bail};

use crate::obu::header::{ObuHeader, ObuType};
use crate::obu::ObuBase;
use crate::utils::bit_buffer::WriteBitBuffer;
use crate::utils::errors::ObuError;

fn obu_type_for_substream(substream_id: u32) -> ObuType {
    if substream_id <= u32::from(ObuType::MAX_IMPLICIT_AUDIO_FRAME_ID) {
        ObuType::AudioFrameId(substream_id as u8)
    } else {
        ObuType::AudioFrame
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrameObu {
    pub header: ObuHeader,
    audio_substream_id: u32,
    pub audio_frame: Vec<u8>,
}

impl AudioFrameObu {
    pub fn new(mut header: ObuHeader, substream_id: u32, audio_frame: Vec<u8>) -> Self {
        header.obu_type = obu_type_for_substream(substream_id);
        Self {
            header,
            audio_substream_id: substream_id,
            audio_frame,
        }
    }

    pub fn substream_id(&self) -> u32 {
        self.audio_substream_id
    }
}

impl ObuBase for AudioFrameObu {
    fn header(&self) -> &ObuHeader {
        &self.header
    }

    fn validate_and_write_payload(&self, wb: &mut WriteBitBuffer) -> Result<()> {
        match self.header.obu_type {
            // The generic type spells the id out; implicit types imply it.
            ObuType::AudioFrame => wb.write_uleb128(self.audio_substream_id)?,
            ObuType::AudioFrameId(id) => {
                if u32::from(id) != self.audio_substream_id {
                    bail!(ObuError::SubstreamIdMismatch {
                        implied: u32::from(id),
                        actual: self.audio_substream_id,
                    });
                }
            }
            _ => bail!(ObuError::SubstreamIdMismatch {
                implied: u32::from(self.header.obu_type.code()),
                actual: self.audio_substream_id,
            }),
        }
        wb.write_bytes(&self.audio_frame)
    }
}
