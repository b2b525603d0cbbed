//! The parameters manager.
//!
//! Holds, per parameter id, the single staged demixing parameter block and,
//! per audio element, the evolving `w_idx` state. The manager works
//! frame-by-frame: stage a block, query parameters for each element, then
//! advance each element with `update_demixing_state` before its next frame.
//! Elements sharing one parameter id progress in lockstep; the manager never
//! looks ahead past the staged block.

use std::collections::HashMap;

use anyhow::{Result, bail};
use log::debug;

use crate::obu::demixing_info::{next_w_idx, w_from_w_idx, DMixPMode};
use crate::obu::param_definitions::ParamDefinitionVariant;
use crate::process::{AudioElementWithData, ParameterBlockWithData};
use crate::utils::errors::ParamError;

/// Down-mix coefficients resolved for one audio frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DownMixingParams {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub delta: f64,
    pub w_idx_offset: i32,
    pub w_idx_used: i32,
    pub w: f64,
    /// True when the values came from a staged parameter block rather than
    /// the definition defaults.
    pub in_bitstream: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WIdxUpdateRule {
    /// The first processed frame always uses the starting `w_idx`.
    FirstFrame,
    /// Later frames step by the mode's offset.
    Normal,
}

#[derive(Debug)]
struct DemixingState {
    parameter_id: u32,
    default_dmixp_mode: DMixPMode,
    default_w_idx: i32,

    /// `wIdx(k - 1)`: the index of the frame just processed.
    previous_w_idx: i32,
    /// `wIdx(k)`: the index used for the current frame.
    w_idx: i32,
    /// Timestamp of the next frame to process.
    next_timestamp: i64,
    update_rule: WIdxUpdateRule,
}

/// The staged block, reduced to what demixing consumes.
#[derive(Debug, Clone, Copy)]
struct StagedDemixingBlock {
    start_timestamp: i64,
    end_timestamp: i64,
    dmixp_mode: DMixPMode,
}

#[derive(Debug, Default)]
pub struct ParametersManager {
    /// Audio element id to demixing state.
    demixing_states: HashMap<u32, DemixingState>,
    /// Parameter id to the most recently staged block. Depth one: a new add
    /// replaces the previous block.
    staged_blocks: HashMap<u32, StagedDemixingBlock>,
}

impl ParametersManager {
    /// Builds the per-element demixing states from the descriptors.
    pub fn initialize(audio_elements: &HashMap<u32, AudioElementWithData>) -> Result<Self> {
        let mut demixing_states = HashMap::new();

        for (&audio_element_id, audio_element) in audio_elements {
            let mut demixing_definitions = audio_element
                .obu
                .audio_element_params
                .iter()
                .filter_map(|param| match param {
                    ParamDefinitionVariant::Demixing(definition) => Some(definition),
                    _ => None,
                });

            let Some(definition) = demixing_definitions.next() else {
                continue;
            };
            if demixing_definitions.next().is_some() {
                bail!(ParamError::MultipleDemixingDefinitions(audio_element_id));
            }

            let defaults = &definition.default_demixing_info_parameter_data;
            demixing_states.insert(
                audio_element_id,
                DemixingState {
                    parameter_id: definition.base.parameter_id,
                    default_dmixp_mode: defaults.dmixp_mode,
                    default_w_idx: i32::from(defaults.default_w),
                    previous_w_idx: 0,
                    w_idx: 0,
                    next_timestamp: 0,
                    update_rule: WIdxUpdateRule::FirstFrame,
                },
            );
        }

        Ok(Self {
            demixing_states,
            staged_blocks: HashMap::new(),
        })
    }

    /// Whether an element declares a demixing parameter definition. The
    /// assembler uses this to decide whether to request parameters at all.
    pub fn demixing_param_definition_available(&self, audio_element_id: u32) -> bool {
        self.demixing_states.contains_key(&audio_element_id)
    }

    /// Stages a demixing parameter block as the pending source for its
    /// parameter id, replacing any previous block.
    pub fn add_demixing_parameter_block(
        &mut self,
        parameter_block: &ParameterBlockWithData,
    ) -> Result<()> {
        let demixing_info = parameter_block.obu.demixing_info()?;
        self.staged_blocks.insert(
            parameter_block.obu.parameter_id,
            StagedDemixingBlock {
                start_timestamp: parameter_block.start_timestamp,
                end_timestamp: parameter_block.end_timestamp,
                dmixp_mode: demixing_info.dmixp_mode,
            },
        );
        Ok(())
    }

    /// Resolves down-mixing parameters for an element's current frame.
    ///
    /// Falls back to the definition defaults when no staged block matches;
    /// fails when the element's clock lags the staged block, since that
    /// means a peer element already pulled the stream ahead.
    pub fn get_down_mixing_parameters(
        &mut self,
        audio_element_id: u32,
    ) -> Result<DownMixingParams> {
        let Some(state) = self.demixing_states.get_mut(&audio_element_id) else {
            // Elements without a demixing definition quietly get defaults.
            return Ok(DownMixingParams::default());
        };

        let staged_block = self.staged_blocks.get(&state.parameter_id);
        let from_block = match staged_block {
            Some(block) if block.start_timestamp == state.next_timestamp => Some(block),
            Some(block) if block.start_timestamp > state.next_timestamp => {
                bail!(ParamError::DemixingSyncLost {
                    audio_element_id,
                    expected: state.next_timestamp,
                    staged: block.start_timestamp,
                });
            }
            // A block behind the clock was already consumed for this frame
            // window; treat it as absent.
            _ => None,
        };

        match from_block {
            Some(block) => {
                let (alpha, beta, gamma, delta, w_idx_offset) =
                    block.dmixp_mode.to_down_mix_coefficients()?;
                let w_idx = match state.update_rule {
                    WIdxUpdateRule::FirstFrame => state.previous_w_idx,
                    WIdxUpdateRule::Normal => next_w_idx(state.previous_w_idx, w_idx_offset),
                };
                state.w_idx = w_idx;
                Ok(DownMixingParams {
                    alpha,
                    beta,
                    gamma,
                    delta,
                    w_idx_offset,
                    w_idx_used: w_idx,
                    w: w_from_w_idx(w_idx)?,
                    in_bitstream: true,
                })
            }
            None => {
                let (alpha, beta, gamma, delta, w_idx_offset) =
                    state.default_dmixp_mode.to_down_mix_coefficients()?;
                state.w_idx = state.default_w_idx;
                Ok(DownMixingParams {
                    alpha,
                    beta,
                    gamma,
                    delta,
                    w_idx_offset,
                    w_idx_used: state.default_w_idx,
                    w: w_from_w_idx(state.default_w_idx)?,
                    in_bitstream: false,
                })
            }
        }
    }

    /// Advances an element past the frame at `expected_timestamp`.
    ///
    /// Consumes the staged block if it supplied that frame. Elements without
    /// a demixing definition accept any timestamp; whether that masks
    /// upstream bookkeeping bugs is an open question, so it is logged.
    pub fn update_demixing_state(
        &mut self,
        audio_element_id: u32,
        expected_timestamp: i64,
    ) -> Result<()> {
        let Some(state) = self.demixing_states.get_mut(&audio_element_id) else {
            debug!(
                "update_demixing_state: audio element {audio_element_id} has no demixing \
                 definition; accepting timestamp {expected_timestamp} unchecked"
            );
            return Ok(());
        };

        let Some(staged_block) = self.staged_blocks.get(&state.parameter_id) else {
            // Nothing staged for this parameter id, nothing to validate.
            return Ok(());
        };

        if state.next_timestamp != expected_timestamp {
            bail!(ParamError::UnexpectedUpdateTimestamp {
                audio_element_id,
                expected: state.next_timestamp,
                actual: expected_timestamp,
            });
        }

        if staged_block.start_timestamp == state.next_timestamp {
            state.previous_w_idx = state.w_idx;
            state.next_timestamp = staged_block.end_timestamp;
            state.update_rule = WIdxUpdateRule::Normal;
        }
        Ok(())
    }
}
