//! The global timing module.
//!
//! Hands out monotonic timestamps, in audio-sample ticks from program
//! start, for every substream and every parameter stream. Each clock
//! advances independently; a single clock's intervals are non-overlapping
//! and strictly increasing by construction.

use std::collections::HashMap;

use anyhow::{Result, bail};
use log::error;

use crate::obu::codec_config::CodecConfigObu;
use crate::obu::param_definitions::ParamDefinition;
use crate::process::AudioElementWithData;
use crate::utils::errors::{ParamError, TimingError};

#[derive(Debug, Clone)]
struct TimingData {
    /// Ticks per second; bookkeeping only, the tick arithmetic is
    /// rate-agnostic.
    #[allow(dead_code)]
    rate: u32,
    /// Where this stream began. Always 0 for streams started at program
    /// start.
    global_start_timestamp: i64,
    /// End of the most recently allocated interval.
    timestamp: i64,
}

impl TimingData {
    fn new(rate: u32) -> Self {
        Self {
            rate,
            global_start_timestamp: 0,
            timestamp: 0,
        }
    }
}

#[derive(Debug, Default)]
pub struct GlobalTimingModule {
    audio_frame_timing_data: HashMap<u32, TimingData>,
    parameter_block_timing_data: HashMap<u32, TimingData>,
}

impl GlobalTimingModule {
    /// Registers every substream and parameter stream of the program.
    ///
    /// `stray_parameter_ids` lists parameter blocks present in the user
    /// metadata without a declared definition; they are assigned an implicit
    /// rate taken from a Codec Config, so at least one must exist.
    pub fn initialize(
        audio_elements: &HashMap<u32, AudioElementWithData>,
        codec_configs: &HashMap<u32, CodecConfigObu>,
        param_definitions: &HashMap<u32, ParamDefinition>,
        stray_parameter_ids: &[u32],
    ) -> Result<Self> {
        let mut module = Self::default();

        for audio_element in audio_elements.values() {
            let rate = audio_element.codec_config.output_sample_rate();
            for &substream_id in &audio_element.obu.audio_substream_ids {
                if module
                    .audio_frame_timing_data
                    .insert(substream_id, TimingData::new(rate))
                    .is_some()
                {
                    bail!(TimingError::DuplicateSubstreamId(substream_id));
                }
            }
        }

        for (&parameter_id, param_definition) in param_definitions {
            if param_definition.parameter_rate == 0 {
                bail!(ParamError::ZeroParameterRate(parameter_id));
            }
            module
                .parameter_block_timing_data
                .insert(parameter_id, TimingData::new(param_definition.parameter_rate));
        }

        for &parameter_id in stray_parameter_ids {
            if module.parameter_block_timing_data.contains_key(&parameter_id) {
                continue;
            }
            // Undeclared parameter streams tick at a codec config rate.
            let implicit_rate = codec_configs
                .keys()
                .min()
                .and_then(|codec_config_id| codec_configs.get(codec_config_id))
                .map(CodecConfigObu::output_sample_rate)
                .ok_or(TimingError::StrayParameterBlocksWithoutCodecConfig)?;
            module
                .parameter_block_timing_data
                .insert(parameter_id, TimingData::new(implicit_rate));
        }

        Ok(module)
    }

    /// Allocates `[clock, clock + duration)` for a substream and advances it.
    pub fn get_next_audio_frame_timestamps(
        &mut self,
        substream_id: u32,
        duration: u32,
    ) -> Result<(i64, i64)> {
        let timing_data = self
            .audio_frame_timing_data
            .get_mut(&substream_id)
            .ok_or(TimingError::UnknownSubstreamId(substream_id))?;

        let start_timestamp = timing_data.timestamp;
        timing_data.timestamp += i64::from(duration);
        Ok((start_timestamp, timing_data.timestamp))
    }

    /// Allocates the next parameter block interval, checking the declared
    /// start against the clock.
    pub fn get_next_parameter_block_timestamps(
        &mut self,
        parameter_id: u32,
        input_start_timestamp: i64,
        duration: u32,
    ) -> Result<(i64, i64)> {
        let timing_data = self
            .parameter_block_timing_data
            .get_mut(&parameter_id)
            .ok_or(TimingError::UnknownParameterId(parameter_id))?;

        if timing_data.timestamp != input_start_timestamp {
            bail!(TimingError::UnexpectedParameterBlockStart {
                parameter_id,
                expected: timing_data.timestamp,
                actual: input_start_timestamp,
            });
        }

        let start_timestamp = timing_data.timestamp;
        timing_data.timestamp += i64::from(duration);
        Ok((start_timestamp, timing_data.timestamp))
    }

    /// Checks that a parameter stream's coverage spans the substream's
    /// audio so far: `param_start <= frame_start && param_end >= frame_end`.
    pub fn validate_parameter_block_covers_audio_frame(
        &self,
        parameter_id: u32,
        parameter_block_start: i64,
        parameter_block_end: i64,
        substream_id: u32,
    ) -> Result<()> {
        let timing_data = self
            .audio_frame_timing_data
            .get(&substream_id)
            .ok_or(TimingError::UnknownSubstreamId(substream_id))?;

        let frame_start = timing_data.global_start_timestamp;
        let frame_end = timing_data.timestamp;
        if parameter_block_start > frame_start || parameter_block_end < frame_end {
            let err = TimingError::ParameterBlockDoesNotCoverAudioFrame {
                parameter_id,
                param_start: parameter_block_start,
                param_end: parameter_block_end,
                substream_id,
                frame_start,
                frame_end,
            };
            error!("{err}");
            bail!(err);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obu::audio_element::{AudioElementObu, AudioElementType};
    use crate::obu::codec_config::{CodecConfig, CodecConfigObu, CodecId};
    use crate::obu::decoder_config::lpcm::{LpcmDecoderConfig, LpcmFormatFlags};
    use crate::obu::decoder_config::DecoderConfig;
    use crate::obu::header::{ObuHeader, ObuType};
    use anyhow::Result;

    const CODEC_CONFIG_ID: u32 = 0;
    const SAMPLE_RATE: u32 = 48000;
    const FIRST_SUBSTREAM_ID: u32 = 1000;

    fn lpcm_codec_config(sample_rate: u32) -> CodecConfigObu {
        CodecConfigObu::new(
            ObuHeader::new(ObuType::CodecConfig),
            CODEC_CONFIG_ID,
            CodecConfig {
                codec_id: CodecId::Lpcm,
                num_samples_per_frame: 64,
                audio_roll_distance: 0,
                decoder_config: DecoderConfig::Lpcm(LpcmDecoderConfig {
                    sample_format_flags: LpcmFormatFlags::BigEndian,
                    sample_size: 16,
                    sample_rate,
                }),
            },
        )
        .unwrap()
    }

    fn ambisonics_mono_element(
        audio_element_id: u32,
        substream_ids: Vec<u32>,
    ) -> AudioElementWithData {
        let mut obu = AudioElementObu::new(
            ObuHeader::new(ObuType::AudioElement),
            audio_element_id,
            AudioElementType::SceneBased,
            0,
            CODEC_CONFIG_ID,
        );
        let count = substream_ids.len() as u8;
        obu.initialize_audio_substreams(u32::from(count));
        obu.audio_substream_ids = substream_ids;
        obu.initialize_ambisonics_mono(count, count);
        AudioElementWithData {
            obu,
            codec_config: lpcm_codec_config(SAMPLE_RATE),
        }
    }

    fn initialize_with_elements(
        elements: Vec<AudioElementWithData>,
    ) -> Result<GlobalTimingModule> {
        let audio_elements: HashMap<u32, AudioElementWithData> = elements
            .into_iter()
            .map(|element| (element.obu.audio_element_id, element))
            .collect();
        let codec_configs =
            HashMap::from([(CODEC_CONFIG_ID, lpcm_codec_config(SAMPLE_RATE))]);
        GlobalTimingModule::initialize(&audio_elements, &codec_configs, &HashMap::new(), &[])
    }

    fn mode0_definition(parameter_id: u32, parameter_rate: u32) -> ParamDefinition {
        ParamDefinition {
            parameter_id,
            parameter_rate,
            param_definition_mode: false,
            duration: 64,
            constant_subblock_duration: 64,
            ..Default::default()
        }
    }

    #[test]
    fn one_substream_advances_monotonically() -> Result<()> {
        let mut timing = initialize_with_elements(vec![ambisonics_mono_element(
            0,
            vec![FIRST_SUBSTREAM_ID],
        )])?;

        assert_eq!(
            timing.get_next_audio_frame_timestamps(FIRST_SUBSTREAM_ID, 128)?,
            (0, 128)
        );
        assert_eq!(
            timing.get_next_audio_frame_timestamps(FIRST_SUBSTREAM_ID, 128)?,
            (128, 256)
        );
        assert_eq!(
            timing.get_next_audio_frame_timestamps(FIRST_SUBSTREAM_ID, 128)?,
            (256, 384)
        );
        Ok(())
    }

    #[test]
    fn unknown_substreams_are_rejected() -> Result<()> {
        let mut timing =
            initialize_with_elements(vec![ambisonics_mono_element(0, vec![0])])?;
        assert!(timing.get_next_audio_frame_timestamps(9999, 128).is_err());
        Ok(())
    }

    #[test]
    fn duplicate_substream_ids_fail_initialization() {
        let result = initialize_with_elements(vec![
            ambisonics_mono_element(0, vec![FIRST_SUBSTREAM_ID]),
            ambisonics_mono_element(1, vec![FIRST_SUBSTREAM_ID]),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn substream_clocks_advance_independently() -> Result<()> {
        let mut timing = initialize_with_elements(vec![
            ambisonics_mono_element(0, vec![1000]),
            ambisonics_mono_element(1, vec![2000]),
        ])?;

        assert_eq!(timing.get_next_audio_frame_timestamps(1000, 128)?, (0, 128));
        assert_eq!(
            timing.get_next_audio_frame_timestamps(1000, 128)?,
            (128, 256)
        );
        assert_eq!(timing.get_next_audio_frame_timestamps(2000, 256)?, (0, 256));
        assert_eq!(
            timing.get_next_audio_frame_timestamps(2000, 256)?,
            (256, 512)
        );
        Ok(())
    }

    #[test]
    fn parameter_clocks_verify_the_declared_start() -> Result<()> {
        let codec_configs = HashMap::from([(CODEC_CONFIG_ID, lpcm_codec_config(SAMPLE_RATE))]);
        let param_definitions = HashMap::from([(0u32, mode0_definition(0, SAMPLE_RATE))]);
        let mut timing = GlobalTimingModule::initialize(
            &HashMap::new(),
            &codec_configs,
            &param_definitions,
            &[],
        )?;

        assert_eq!(
            timing.get_next_parameter_block_timestamps(0, 0, 64)?,
            (0, 64)
        );
        assert_eq!(
            timing.get_next_parameter_block_timestamps(0, 64, 64)?,
            (64, 128)
        );
        assert_eq!(
            timing.get_next_parameter_block_timestamps(0, 128, 64)?,
            (128, 192)
        );

        // Declaring a start behind or ahead of the clock fails.
        assert!(timing.get_next_parameter_block_timestamps(0, 128, 64).is_err());
        Ok(())
    }

    #[test]
    fn stray_parameter_blocks_tick_at_the_codec_config_rate() -> Result<()> {
        let codec_configs = HashMap::from([(CODEC_CONFIG_ID, lpcm_codec_config(SAMPLE_RATE))]);
        let mut timing =
            GlobalTimingModule::initialize(&HashMap::new(), &codec_configs, &HashMap::new(), &[0])?;

        assert_eq!(
            timing.get_next_parameter_block_timestamps(0, 0, 64)?,
            (0, 64)
        );
        assert_eq!(
            timing.get_next_parameter_block_timestamps(0, 64, 64)?,
            (64, 128)
        );
        Ok(())
    }

    #[test]
    fn stray_parameter_blocks_without_codec_configs_fail() {
        let result = GlobalTimingModule::initialize(
            &HashMap::new(),
            &HashMap::new(),
            &HashMap::new(),
            &[0],
        );
        assert!(result.is_err());
    }

    #[test]
    fn zero_parameter_rates_fail_initialization() {
        let codec_configs = HashMap::from([(CODEC_CONFIG_ID, lpcm_codec_config(SAMPLE_RATE))]);
        let param_definitions = HashMap::from([(0u32, mode0_definition(0, 0))]);
        let result = GlobalTimingModule::initialize(
            &HashMap::new(),
            &codec_configs,
            &param_definitions,
            &[],
        );
        assert!(result.is_err());
    }

    #[test]
    fn parameter_coverage_checks_the_stream_so_far() -> Result<()> {
        let mut timing = initialize_with_elements(vec![ambisonics_mono_element(
            0,
            vec![FIRST_SUBSTREAM_ID],
        )])?;
        timing.get_next_audio_frame_timestamps(FIRST_SUBSTREAM_ID, 512)?;
        timing.get_next_audio_frame_timestamps(FIRST_SUBSTREAM_ID, 512)?;

        assert!(timing
            .validate_parameter_block_covers_audio_frame(0, 0, 1024, FIRST_SUBSTREAM_ID)
            .is_ok());
        // Ends one tick early.
        assert!(timing
            .validate_parameter_block_covers_audio_frame(0, 0, 1023, FIRST_SUBSTREAM_ID)
            .is_err());
        // Starts late.
        assert!(timing
            .validate_parameter_block_covers_audio_frame(0, 1, 1024, FIRST_SUBSTREAM_ID)
            .is_err());
        // Starts late with the same duration.
        assert!(timing
            .validate_parameter_block_covers_audio_frame(0, 1, 1025, FIRST_SUBSTREAM_ID)
            .is_err());
        Ok(())
    }
}
