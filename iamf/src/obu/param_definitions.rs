//! Parameter definitions.
//!
//! Declarations of parameter streams attached to audio elements or mixes.
//! Mode-0 definitions pin the duration and subblock layout here; mode-1
//! definitions defer them to each parameter block.

use anyhow::{Result, bail};

use crate::obu::demixing_info::DefaultDemixingInfoParameterData;
use crate::utils::bit_buffer::{ReadBitBuffer, WriteBitBuffer};
use crate::utils::errors::ParamError;

pub const PARAM_DEFINITION_TYPE_MIX_GAIN: u32 = 0;
pub const PARAM_DEFINITION_TYPE_DEMIXING: u32 = 1;
pub const PARAM_DEFINITION_TYPE_RECON_GAIN: u32 = 2;
/// First tag of the extended (opaque) range.
pub const PARAM_DEFINITION_TYPE_RESERVED_START: u32 = 3;

/// Fields common to every non-extended parameter definition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParamDefinition {
    pub parameter_id: u32,
    pub parameter_rate: u32,
    pub param_definition_mode: bool,
    pub reserved: u8,

    // Mode-0 only.
    pub duration: u32,
    pub constant_subblock_duration: u32,
    /// Explicit per-subblock durations, used iff mode 0 and
    /// `constant_subblock_duration == 0`.
    pub subblock_durations: Vec<u32>,
}

impl ParamDefinition {
    pub fn validate(&self) -> Result<()> {
        if self.parameter_rate == 0 {
            bail!(ParamError::ZeroParameterRate(self.parameter_id));
        }
        if !self.param_definition_mode && self.constant_subblock_duration == 0 {
            let actual: u32 = self.subblock_durations.iter().sum();
            if actual != self.duration {
                bail!(ParamError::SubblockDurationSumMismatch {
                    expected: self.duration,
                    actual,
                });
            }
        }
        Ok(())
    }

    pub fn write(&self, wb: &mut WriteBitBuffer) -> Result<()> {
        wb.write_uleb128(self.parameter_id)?;
        wb.write_uleb128(self.parameter_rate)?;
        wb.write_bool(self.param_definition_mode)?;
        wb.write_unsigned_literal(u32::from(self.reserved), 7)?;

        if !self.param_definition_mode {
            wb.write_uleb128(self.duration)?;
            wb.write_uleb128(self.constant_subblock_duration)?;
            if self.constant_subblock_duration == 0 {
                wb.write_uleb128(self.subblock_durations.len() as u32)?;
                for &duration in &self.subblock_durations {
                    wb.write_uleb128(duration)?;
                }
            }
        }
        Ok(())
    }

    pub fn read(rb: &mut ReadBitBuffer) -> Result<Self> {
        let parameter_id = rb.read_uleb128()?;
        let parameter_rate = rb.read_uleb128()?;
        let param_definition_mode = rb.read_bool()?;
        let reserved = rb.read_unsigned_literal(7)? as u8;

        let mut param_definition = Self {
            parameter_id,
            parameter_rate,
            param_definition_mode,
            reserved,
            ..Default::default()
        };

        if !param_definition_mode {
            param_definition.duration = rb.read_uleb128()?;
            param_definition.constant_subblock_duration = rb.read_uleb128()?;
            if param_definition.constant_subblock_duration == 0 {
                let num_subblocks = rb.read_uleb128()?;
                for _ in 0..num_subblocks {
                    param_definition.subblock_durations.push(rb.read_uleb128()?);
                }
            }
        }
        Ok(param_definition)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MixGainParamDefinition {
    pub base: ParamDefinition,
    /// Q7.8 dB applied when no parameter block overrides it.
    pub default_mix_gain: i16,
}

impl MixGainParamDefinition {
    pub fn validate(&self) -> Result<()> {
        self.base.validate()
    }

    pub fn write(&self, wb: &mut WriteBitBuffer) -> Result<()> {
        self.validate()?;
        self.base.write(wb)?;
        wb.write_signed16(self.default_mix_gain)
    }

    pub fn read(rb: &mut ReadBitBuffer) -> Result<Self> {
        Ok(Self {
            base: ParamDefinition::read(rb)?,
            default_mix_gain: rb.read_signed16()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DemixingParamDefinition {
    pub base: ParamDefinition,
    pub default_demixing_info_parameter_data: DefaultDemixingInfoParameterData,
}

impl DemixingParamDefinition {
    pub fn validate(&self) -> Result<()> {
        if self.base.param_definition_mode {
            bail!(ParamError::ParamDefinitionModeMustBeZero("Demixing"));
        }
        self.base.validate()
    }

    pub fn write(&self, wb: &mut WriteBitBuffer) -> Result<()> {
        self.validate()?;
        self.base.write(wb)?;
        self.default_demixing_info_parameter_data.write(wb)
    }

    pub fn read(rb: &mut ReadBitBuffer) -> Result<Self> {
        Ok(Self {
            base: ParamDefinition::read(rb)?,
            default_demixing_info_parameter_data: DefaultDemixingInfoParameterData::read(rb)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReconGainParamDefinition {
    pub base: ParamDefinition,
}

impl ReconGainParamDefinition {
    pub fn validate(&self) -> Result<()> {
        if self.base.param_definition_mode {
            bail!(ParamError::ParamDefinitionModeMustBeZero("Recon Gain"));
        }
        self.base.validate()
    }

    pub fn write(&self, wb: &mut WriteBitBuffer) -> Result<()> {
        self.validate()?;
        self.base.write(wb)
    }

    pub fn read(rb: &mut ReadBitBuffer) -> Result<Self> {
        Ok(Self {
            base: ParamDefinition::read(rb)?,
        })
    }
}

/// Opaque definition for tags in the reserved range.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtendedParamDefinition {
    pub param_definition_type: u32,
    pub param_definition_bytes: Vec<u8>,
}

impl ExtendedParamDefinition {
    pub fn write(&self, wb: &mut WriteBitBuffer) -> Result<()> {
        wb.write_uleb128(self.param_definition_bytes.len() as u32)?;
        wb.write_bytes(&self.param_definition_bytes)
    }
}

/// One parameter definition with its wire tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamDefinitionVariant {
    MixGain(MixGainParamDefinition),
    Demixing(DemixingParamDefinition),
    ReconGain(ReconGainParamDefinition),
    Extended(ExtendedParamDefinition),
}

impl ParamDefinitionVariant {
    pub fn param_definition_type(&self) -> u32 {
        match self {
            Self::MixGain(_) => PARAM_DEFINITION_TYPE_MIX_GAIN,
            Self::Demixing(_) => PARAM_DEFINITION_TYPE_DEMIXING,
            Self::ReconGain(_) => PARAM_DEFINITION_TYPE_RECON_GAIN,
            Self::Extended(extended) => extended.param_definition_type,
        }
    }

    /// Common fields, absent for extended definitions.
    pub fn base(&self) -> Option<&ParamDefinition> {
        match self {
            Self::MixGain(definition) => Some(&definition.base),
            Self::Demixing(definition) => Some(&definition.base),
            Self::ReconGain(definition) => Some(&definition.base),
            Self::Extended(_) => None,
        }
    }

    /// Writes the type tag followed by the definition body.
    pub fn validate_and_write(&self, wb: &mut WriteBitBuffer) -> Result<()> {
        wb.write_uleb128(self.param_definition_type())?;
        match self {
            Self::MixGain(definition) => definition.write(wb),
            Self::Demixing(definition) => definition.write(wb),
            Self::ReconGain(definition) => definition.write(wb),
            Self::Extended(definition) => definition.write(wb),
        }
    }
}
