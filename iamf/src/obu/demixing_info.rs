//! Demixing parameter data and the fixed down-mix coefficient tables.

use anyhow::{Result, bail};

use crate::utils::bit_buffer::{ReadBitBuffer, WriteBitBuffer};
use crate::utils::errors::ParamError;

/// `w_idx` stays inside `[0, W_IDX_MAX]`.
pub const W_IDX_MAX: i32 = 10;

/// `w(w_idx)` lookup table.
const W_TABLE: [f64; 11] = [
    0.0, 0.0179, 0.0391, 0.0658, 0.1038, 0.25, 0.4170, 0.5556, 0.5984, 0.6199, 0.6302,
];

/// 3-bit demixing mode.
///
/// The `..N` modes share coefficients with their plain counterparts but walk
/// `w_idx` up instead of down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DMixPMode {
    #[default]
    Mode1,
    Mode2,
    Mode3,
    Reserved1,
    Mode1N,
    Mode2N,
    Mode3N,
    Reserved2,
}

impl DMixPMode {
    pub fn code(&self) -> u8 {
        match self {
            Self::Mode1 => 0,
            Self::Mode2 => 1,
            Self::Mode3 => 2,
            Self::Reserved1 => 3,
            Self::Mode1N => 4,
            Self::Mode2N => 5,
            Self::Mode3N => 6,
            Self::Reserved2 => 7,
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Self::Mode1),
            1 => Ok(Self::Mode2),
            2 => Ok(Self::Mode3),
            3 => Ok(Self::Reserved1),
            4 => Ok(Self::Mode1N),
            5 => Ok(Self::Mode2N),
            6 => Ok(Self::Mode3N),
            7 => Ok(Self::Reserved2),
            _ => bail!(ParamError::ReservedDMixPMode(code)),
        }
    }

    /// `(alpha, beta, gamma, delta, w_idx_offset)` for this mode.
    pub fn to_down_mix_coefficients(&self) -> Result<(f64, f64, f64, f64, i32)> {
        match self {
            Self::Mode1 => Ok((1.0, 1.0, 0.707, 0.707, -1)),
            Self::Mode2 => Ok((1.0, 1.0, 0.707, 0.5, -1)),
            Self::Mode3 => Ok((1.0, 0.866, 0.866, 0.866, -1)),
            Self::Mode1N => Ok((1.0, 1.0, 0.707, 0.707, 1)),
            Self::Mode2N => Ok((1.0, 1.0, 0.707, 0.5, 1)),
            Self::Mode3N => Ok((1.0, 0.866, 0.866, 0.866, 1)),
            Self::Reserved1 | Self::Reserved2 => {
                bail!(ParamError::ReservedDMixPMode(self.code()))
            }
        }
    }
}

/// Looks up `w` for a `w_idx` in `[0, 10]`.
pub fn w_from_w_idx(w_idx: i32) -> Result<f64> {
    if !(0..=W_IDX_MAX).contains(&w_idx) {
        bail!(ParamError::WIdxOutOfRange(w_idx));
    }
    Ok(W_TABLE[w_idx as usize])
}

/// Advances `w_idx` by the mode's offset, saturating at the table edges.
pub fn next_w_idx(w_idx: i32, w_idx_offset: i32) -> i32 {
    (w_idx + w_idx_offset).clamp(0, W_IDX_MAX)
}

/// Demixing payload of one parameter subblock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DemixingInfoParameterData {
    pub dmixp_mode: DMixPMode,
    pub reserved: u8,
}

impl DemixingInfoParameterData {
    pub fn write(&self, wb: &mut WriteBitBuffer) -> Result<()> {
        wb.write_unsigned_literal(u32::from(self.dmixp_mode.code()), 3)?;
        wb.write_unsigned_literal(u32::from(self.reserved), 5)
    }

    pub fn read(rb: &mut ReadBitBuffer) -> Result<Self> {
        Ok(Self {
            dmixp_mode: DMixPMode::from_code(rb.read_unsigned_literal(3)? as u8)?,
            reserved: rb.read_unsigned_literal(5)? as u8,
        })
    }
}

/// Defaults carried by a demixing parameter definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DefaultDemixingInfoParameterData {
    pub dmixp_mode: DMixPMode,
    pub reserved: u8,
    pub default_w: u8,
    pub reserved_for_future_use: u8,
}

impl DefaultDemixingInfoParameterData {
    pub fn write(&self, wb: &mut WriteBitBuffer) -> Result<()> {
        wb.write_unsigned_literal(u32::from(self.dmixp_mode.code()), 3)?;
        wb.write_unsigned_literal(u32::from(self.reserved), 5)?;
        wb.write_unsigned_literal(u32::from(self.default_w), 4)?;
        wb.write_unsigned_literal(u32::from(self.reserved_for_future_use), 4)
    }

    pub fn read(rb: &mut ReadBitBuffer) -> Result<Self> {
        Ok(Self {
            dmixp_mode: DMixPMode::from_code(rb.read_unsigned_literal(3)? as u8)?,
            reserved: rb.read_unsigned_literal(5)? as u8,
            default_w: rb.read_unsigned_literal(4)? as u8,
            reserved_for_future_use: rb.read_unsigned_literal(4)? as u8,
        })
    }
}
