//! Parameter Block OBUs.
//!
//! A parameter block carries one or more subblocks of type-specific payload
//! for a declared parameter stream. The wire shape depends on the stream's
//! definition: mode-1 definitions put the duration layout inline, mode-0
//! definitions pin it in the descriptor, so each block holds the per-id
//! metadata it was authored against.

use anyhow::{Result, bail};

use crate::obu::demixing_info::DemixingInfoParameterData;
use crate::obu::header::{ObuHeader, ObuType};
use crate::obu::param_definitions::{
    PARAM_DEFINITION_TYPE_DEMIXING, PARAM_DEFINITION_TYPE_MIX_GAIN,
    PARAM_DEFINITION_TYPE_RECON_GAIN, ParamDefinition,
};
use crate::obu::ObuBase;
use crate::utils::bit_buffer::WriteBitBuffer;
use crate::utils::errors::ParamError;

/// The definition context a parameter block is serialized against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerIdParameterMetadata {
    pub param_definition_type: u32,
    pub param_definition: ParamDefinition,
}

/// Animated mix gain carried by one subblock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixGainParameterData {
    Step {
        start_point_value: i16,
    },
    Linear {
        start_point_value: i16,
        end_point_value: i16,
    },
    Bezier {
        start_point_value: i16,
        end_point_value: i16,
        control_point_value: i16,
        control_point_relative_time: u8,
    },
}

impl MixGainParameterData {
    pub fn animation_type(&self) -> u32 {
        match self {
            Self::Step { .. } => 0,
            Self::Linear { .. } => 1,
            Self::Bezier { .. } => 2,
        }
    }

    fn write(&self, wb: &mut WriteBitBuffer) -> Result<()> {
        wb.write_uleb128(self.animation_type())?;
        match *self {
            Self::Step { start_point_value } => wb.write_signed16(start_point_value),
            Self::Linear {
                start_point_value,
                end_point_value,
            } => {
                wb.write_signed16(start_point_value)?;
                wb.write_signed16(end_point_value)
            }
            Self::Bezier {
                start_point_value,
                end_point_value,
                control_point_value,
                control_point_relative_time,
            } => {
                wb.write_signed16(start_point_value)?;
                wb.write_signed16(end_point_value)?;
                wb.write_signed16(control_point_value)?;
                wb.write_unsigned_literal(u32::from(control_point_relative_time), 8)
            }
        }
    }
}

/// Recon gain for one scalable layer: a channel bitmask plus one gain byte
/// per set bit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReconGainElement {
    pub recon_gain_flag: u32,
    pub recon_gain: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReconGainInfoParameterData {
    pub recon_gain_elements: Vec<ReconGainElement>,
}

impl ReconGainInfoParameterData {
    fn write(&self, wb: &mut WriteBitBuffer) -> Result<()> {
        for element in &self.recon_gain_elements {
            let expected = element.recon_gain_flag.count_ones() as usize;
            if element.recon_gain.len() != expected {
                bail!(ParamError::SubblockIndexOutOfRange {
                    index: element.recon_gain.len(),
                    num_subblocks: expected,
                });
            }
            wb.write_uleb128(element.recon_gain_flag)?;
            wb.write_bytes(&element.recon_gain)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterData {
    MixGain(MixGainParameterData),
    Demixing(DemixingInfoParameterData),
    ReconGain(ReconGainInfoParameterData),
    /// Length-prefixed opaque payload for extended parameter types.
    Extension(Vec<u8>),
}

impl ParameterData {
    fn matches_type(&self, param_definition_type: u32) -> bool {
        match self {
            Self::MixGain(_) => param_definition_type == PARAM_DEFINITION_TYPE_MIX_GAIN,
            Self::Demixing(_) => param_definition_type == PARAM_DEFINITION_TYPE_DEMIXING,
            Self::ReconGain(_) => param_definition_type == PARAM_DEFINITION_TYPE_RECON_GAIN,
            Self::Extension(_) => {
                param_definition_type
                    >= crate::obu::param_definitions::PARAM_DEFINITION_TYPE_RESERVED_START
            }
        }
    }

    fn write(&self, wb: &mut WriteBitBuffer) -> Result<()> {
        match self {
            Self::MixGain(data) => data.write(wb),
            Self::Demixing(data) => data.write(wb),
            Self::ReconGain(data) => data.write(wb),
            Self::Extension(bytes) => {
                wb.write_uleb128(bytes.len() as u32)?;
                wb.write_bytes(bytes)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSubblock {
    pub subblock_duration: u32,
    pub param_data: ParameterData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterBlockObu {
    pub header: ObuHeader,
    pub parameter_id: u32,
    pub duration: u32,
    pub constant_subblock_duration: u32,
    pub subblocks: Vec<ParameterSubblock>,
    pub per_id_metadata: PerIdParameterMetadata,
}

impl ParameterBlockObu {
    pub fn new(
        mut header: ObuHeader,
        parameter_id: u32,
        duration: u32,
        constant_subblock_duration: u32,
        subblocks: Vec<ParameterSubblock>,
        per_id_metadata: PerIdParameterMetadata,
    ) -> Result<Self> {
        header.obu_type = ObuType::ParameterBlock;
        let obu = Self {
            header,
            parameter_id,
            duration,
            constant_subblock_duration,
            subblocks,
            per_id_metadata,
        };
        obu.validate()?;
        Ok(obu)
    }

    pub fn num_subblocks(&self) -> u32 {
        self.subblocks.len() as u32
    }

    pub fn subblock_duration(&self, index: usize) -> Result<u32> {
        let subblock = self.subblocks.get(index).ok_or(ParamError::SubblockIndexOutOfRange {
            index,
            num_subblocks: self.subblocks.len(),
        })?;
        Ok(if self.constant_subblock_duration == 0 {
            subblock.subblock_duration
        } else {
            self.constant_subblock_duration
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.constant_subblock_duration == 0 {
            let actual: u32 = self
                .subblocks
                .iter()
                .map(|subblock| subblock.subblock_duration)
                .sum();
            if actual != self.duration {
                bail!(ParamError::SubblockDurationSumMismatch {
                    expected: self.duration,
                    actual,
                });
            }
        } else {
            let expected = self.duration.div_ceil(self.constant_subblock_duration);
            if self.num_subblocks() != expected {
                bail!(ParamError::SubblockIndexOutOfRange {
                    index: self.subblocks.len(),
                    num_subblocks: expected as usize,
                });
            }
        }

        let param_definition_type = self.per_id_metadata.param_definition_type;
        for subblock in &self.subblocks {
            if !subblock.param_data.matches_type(param_definition_type) {
                bail!(ParamError::NotADemixingBlock(self.parameter_id));
            }
        }
        Ok(())
    }

    /// First subblock's demixing payload, if this is a demixing block.
    pub fn demixing_info(&self) -> Result<&DemixingInfoParameterData> {
        match self.subblocks.first().map(|subblock| &subblock.param_data) {
            Some(ParameterData::Demixing(data)) => Ok(data),
            _ => bail!(ParamError::NotADemixingBlock(self.parameter_id)),
        }
    }
}

impl ObuBase for ParameterBlockObu {
    fn header(&self) -> &ObuHeader {
        &self.header
    }

    fn validate_and_write_payload(&self, wb: &mut WriteBitBuffer) -> Result<()> {
        self.validate()?;

        wb.write_uleb128(self.parameter_id)?;

        // Mode-1 streams carry the duration layout in every block; mode-0
        // streams pinned it in the definition.
        let inline_duration = self.per_id_metadata.param_definition.param_definition_mode;
        let explicit_subblocks = self.constant_subblock_duration == 0;
        if inline_duration {
            wb.write_uleb128(self.duration)?;
            wb.write_uleb128(self.constant_subblock_duration)?;
            if explicit_subblocks {
                wb.write_uleb128(self.num_subblocks())?;
            }
        }

        for subblock in &self.subblocks {
            if inline_duration && explicit_subblocks {
                wb.write_uleb128(subblock.subblock_duration)?;
            }
            subblock.param_data.write(wb)?;
        }
        Ok(())
    }
}
