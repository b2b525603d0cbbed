//! The OBU assembler.
//!
//! Orders and emits descriptor OBUs followed by per-timestamp temporal
//! units, splicing in arbitrary OBUs at their declared hooks. Any error is
//! fatal: the assembler propagates it and emits nothing further.

use std::collections::BTreeMap;

use anyhow::Result;
use log::debug;

use crate::obu::arbitrary::{ArbitraryObu, InsertionHook};
use crate::obu::audio_element::AudioElementObu;
use crate::obu::codec_config::CodecConfigObu;
use crate::obu::header::ObuHeader;
use crate::obu::ia_sequence_header::IaSequenceHeaderObu;
use crate::obu::mix_presentation::MixPresentationObu;
use crate::obu::temporal_delimiter::TemporalDelimiterObu;
use crate::obu::{ObuBase, ObuType};
use crate::process::{AudioFrameWithData, ParameterBlockWithData};
use crate::utils::bit_buffer::{LebGenerator, WriteBitBuffer};

#[derive(Debug)]
pub struct ObuAssembler {
    leb_generator: LebGenerator,
}

impl ObuAssembler {
    pub fn new(leb_generator: LebGenerator) -> Self {
        Self { leb_generator }
    }

    /// Emits the descriptor OBUs in their canonical order, with arbitrary
    /// OBUs spliced at the descriptor-phase hooks.
    pub fn write_descriptor_obus(
        &self,
        ia_sequence_header: &IaSequenceHeaderObu,
        codec_configs: &[CodecConfigObu],
        audio_elements: &[AudioElementObu],
        mix_presentations: &[MixPresentationObu],
        arbitrary_obus: &[ArbitraryObu],
        wb: &mut WriteBitBuffer,
    ) -> Result<()> {
        ArbitraryObu::write_obus_with_hook(InsertionHook::BeforeDescriptors, arbitrary_obus, wb)?;
        ia_sequence_header.validate_and_write(wb)?;
        ArbitraryObu::write_obus_with_hook(
            InsertionHook::AfterIaSequenceHeader,
            arbitrary_obus,
            wb,
        )?;

        for codec_config in codec_configs {
            codec_config.validate_and_write(wb)?;
        }
        ArbitraryObu::write_obus_with_hook(InsertionHook::AfterCodecConfigs, arbitrary_obus, wb)?;

        for audio_element in audio_elements {
            audio_element.validate_and_write(wb)?;
        }
        for mix_presentation in mix_presentations {
            mix_presentation.validate_and_write(wb)?;
        }
        ArbitraryObu::write_obus_with_hook(InsertionHook::AfterDescriptors, arbitrary_obus, wb)?;
        Ok(())
    }

    /// Emits one temporal unit: a delimiter, the tick's hook OBUs, every
    /// substream's frame, then the parameter blocks starting at the tick.
    pub fn write_temporal_unit(
        &self,
        timestamp: i64,
        audio_frames: &[&AudioFrameWithData],
        parameter_blocks: &[&ParameterBlockWithData],
        arbitrary_obus: &[ArbitraryObu],
        wb: &mut WriteBitBuffer,
    ) -> Result<()> {
        TemporalDelimiterObu::new(ObuHeader::new(ObuType::TemporalDelimiter))
            .validate_and_write(wb)?;
        ArbitraryObu::write_obus_with_hook(
            InsertionHook::AfterTemporalDelimiter(timestamp),
            arbitrary_obus,
            wb,
        )?;

        for audio_frame in audio_frames {
            audio_frame.obu.validate_and_write(wb)?;
        }
        for parameter_block in parameter_blocks {
            parameter_block.obu.validate_and_write(wb)?;
        }

        debug!(
            "temporal unit at {timestamp}: {} audio frames, {} parameter blocks",
            audio_frames.len(),
            parameter_blocks.len()
        );
        Ok(())
    }

    /// Produces the complete stream: descriptors, then one temporal unit
    /// per start timestamp in ascending order.
    #[allow(clippy::too_many_arguments)]
    pub fn assemble(
        &self,
        ia_sequence_header: &IaSequenceHeaderObu,
        codec_configs: &[CodecConfigObu],
        audio_elements: &[AudioElementObu],
        mix_presentations: &[MixPresentationObu],
        audio_frames: &[AudioFrameWithData],
        parameter_blocks: &[ParameterBlockWithData],
        arbitrary_obus: &[ArbitraryObu],
    ) -> Result<Vec<u8>> {
        let mut wb = WriteBitBuffer::new(self.leb_generator);
        self.write_descriptor_obus(
            ia_sequence_header,
            codec_configs,
            audio_elements,
            mix_presentations,
            arbitrary_obus,
            &mut wb,
        )?;

        let mut frames_by_tick: BTreeMap<i64, Vec<&AudioFrameWithData>> = BTreeMap::new();
        for audio_frame in audio_frames {
            frames_by_tick
                .entry(audio_frame.start_timestamp)
                .or_default()
                .push(audio_frame);
        }
        let mut blocks_by_tick: BTreeMap<i64, Vec<&ParameterBlockWithData>> = BTreeMap::new();
        for parameter_block in parameter_blocks {
            blocks_by_tick
                .entry(parameter_block.start_timestamp)
                .or_default()
                .push(parameter_block);
        }

        let ticks: std::collections::BTreeSet<i64> = frames_by_tick
            .keys()
            .chain(blocks_by_tick.keys())
            .copied()
            .collect();
        for timestamp in ticks {
            let frames = frames_by_tick.get(&timestamp).map_or(&[][..], Vec::as_slice);
            let blocks = blocks_by_tick.get(&timestamp).map_or(&[][..], Vec::as_slice);
            self.write_temporal_unit(timestamp, frames, blocks, arbitrary_obus, &mut wb)?;
        }

        wb.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obu::audio_element::{AudioElementObu, AudioElementType};
    use crate::obu::audio_frame::AudioFrameObu;
    use crate::obu::codec_config::{CodecConfig, CodecId};
    use crate::obu::decoder_config::lpcm::{LpcmDecoderConfig, LpcmFormatFlags};
    use crate::obu::decoder_config::DecoderConfig;
    use crate::obu::demixing_info::DemixingInfoParameterData;
    use crate::obu::ia_sequence_header::ProfileVersion;
    use crate::obu::param_definitions::{
        DemixingParamDefinition, MixGainParamDefinition, ParamDefinition, ParamDefinitionVariant,
        PARAM_DEFINITION_TYPE_DEMIXING,
    };
    use crate::obu::parameter_block::{
        ParameterBlockObu, ParameterData, ParameterSubblock, PerIdParameterMetadata,
    };
    use crate::obu::mix_presentation::{
        Layout, LoudnessInfo, MixPresentationLayout, MixPresentationObu, MixPresentationSubMix,
        RenderingConfig, SoundSystem, SubMixAudioElement,
    };
    use crate::utils::bit_buffer::ReadBitBuffer;
    use anyhow::Result;

    fn codec_config() -> CodecConfigObu {
        CodecConfigObu::new(
            ObuHeader::new(ObuType::CodecConfig),
            0,
            CodecConfig {
                codec_id: CodecId::Lpcm,
                num_samples_per_frame: 8,
                audio_roll_distance: 0,
                decoder_config: DecoderConfig::Lpcm(LpcmDecoderConfig {
                    sample_format_flags: LpcmFormatFlags::BigEndian,
                    sample_size: 16,
                    sample_rate: 48000,
                }),
            },
        )
        .unwrap()
    }

    fn audio_element() -> AudioElementObu {
        let mut obu = AudioElementObu::new(
            ObuHeader::new(ObuType::AudioElement),
            10,
            AudioElementType::SceneBased,
            0,
            0,
        );
        obu.initialize_audio_substreams(1);
        obu.audio_substream_ids = vec![0];
        obu.initialize_ambisonics_mono(1, 1);
        obu.audio_element_params = vec![ParamDefinitionVariant::Demixing(
            DemixingParamDefinition {
                base: ParamDefinition {
                    parameter_id: 99,
                    parameter_rate: 48000,
                    param_definition_mode: false,
                    duration: 8,
                    constant_subblock_duration: 8,
                    ..Default::default()
                },
                ..Default::default()
            },
        )];
        obu
    }

    fn mix_presentation() -> MixPresentationObu {
        MixPresentationObu::new(
            ObuHeader::new(ObuType::MixPresentation),
            20,
            vec!["en-us".to_string()],
            vec!["Mix".to_string()],
            vec![MixPresentationSubMix {
                audio_elements: vec![SubMixAudioElement {
                    audio_element_id: 10,
                    localized_element_annotations: vec!["Element".to_string()],
                    rendering_config: RenderingConfig::default(),
                    element_mix_gain: MixGainParamDefinition {
                        base: ParamDefinition {
                            parameter_id: 100,
                            parameter_rate: 48000,
                            param_definition_mode: true,
                            ..Default::default()
                        },
                        default_mix_gain: 0,
                    },
                }],
                output_mix_gain: MixGainParamDefinition {
                    base: ParamDefinition {
                        parameter_id: 101,
                        parameter_rate: 48000,
                        param_definition_mode: true,
                        ..Default::default()
                    },
                    default_mix_gain: 0,
                },
                layouts: vec![MixPresentationLayout {
                    loudness_layout: Layout::LoudspeakersSsConvention {
                        sound_system: SoundSystem::A0_2_0,
                    },
                    loudness: LoudnessInfo::default(),
                }],
            }],
        )
    }

    fn audio_frame(start_timestamp: i64) -> AudioFrameWithData {
        AudioFrameWithData {
            obu: AudioFrameObu::new(
                ObuHeader::new(ObuType::AudioFrame),
                0,
                vec![0xaa; 4],
            ),
            start_timestamp,
            end_timestamp: start_timestamp + 8,
            audio_element_id: 10,
        }
    }

    fn parameter_block(start_timestamp: i64) -> ParameterBlockWithData {
        ParameterBlockWithData {
            obu: ParameterBlockObu::new(
                ObuHeader::new(ObuType::ParameterBlock),
                99,
                8,
                8,
                vec![ParameterSubblock {
                    subblock_duration: 8,
                    param_data: ParameterData::Demixing(DemixingInfoParameterData::default()),
                }],
                PerIdParameterMetadata {
                    param_definition_type: PARAM_DEFINITION_TYPE_DEMIXING,
                    param_definition: ParamDefinition {
                        parameter_id: 99,
                        parameter_rate: 48000,
                        param_definition_mode: false,
                        duration: 8,
                        constant_subblock_duration: 8,
                        ..Default::default()
                    },
                },
            )
            .unwrap(),
            start_timestamp,
            end_timestamp: start_timestamp + 8,
        }
    }

    fn obu_type_codes(bytes: &[u8]) -> Result<Vec<u8>> {
        let mut rb = ReadBitBuffer::from_slice(bytes);
        let mut codes = Vec::new();
        while rb.available()? > 0 {
            let (header, payload_size) = ObuHeader::read_and_validate(&mut rb)?;
            rb.read_bytes(payload_size as usize)?;
            codes.push(header.obu_type.code());
        }
        Ok(codes)
    }

    #[test]
    fn descriptors_come_in_canonical_order() -> Result<()> {
        let assembler = ObuAssembler::new(LebGenerator::default());
        let ia_sequence_header = IaSequenceHeaderObu::new(
            ObuHeader::new(ObuType::IaSequenceHeader),
            ProfileVersion::Simple,
            ProfileVersion::Simple,
        );
        let bytes = assembler.assemble(
            &ia_sequence_header,
            &[codec_config()],
            &[audio_element()],
            &[mix_presentation()],
            &[],
            &[],
            &[],
        )?;

        assert_eq!(obu_type_codes(&bytes)?, vec![31, 0, 1, 2]);
        Ok(())
    }

    #[test]
    fn temporal_units_group_frames_and_blocks_by_tick() -> Result<()> {
        let assembler = ObuAssembler::new(LebGenerator::default());
        let ia_sequence_header = IaSequenceHeaderObu::new(
            ObuHeader::new(ObuType::IaSequenceHeader),
            ProfileVersion::Simple,
            ProfileVersion::Simple,
        );
        let bytes = assembler.assemble(
            &ia_sequence_header,
            &[codec_config()],
            &[audio_element()],
            &[mix_presentation()],
            &[audio_frame(0), audio_frame(8)],
            &[parameter_block(0), parameter_block(8)],
            &[],
        )?;

        // Descriptors, then two temporal units of delimiter + frame + block.
        assert_eq!(
            obu_type_codes(&bytes)?,
            vec![31, 0, 1, 2, 4, 6, 3, 4, 6, 3]
        );
        Ok(())
    }

    #[test]
    fn arbitrary_obus_land_at_their_hooks() -> Result<()> {
        let assembler = ObuAssembler::new(LebGenerator::default());
        let ia_sequence_header = IaSequenceHeaderObu::new(
            ObuHeader::new(ObuType::IaSequenceHeader),
            ProfileVersion::Simple,
            ProfileVersion::Simple,
        );
        let arbitrary_obus = vec![
            ArbitraryObu::new(
                ObuType::Reserved(24),
                vec![],
                InsertionHook::BeforeDescriptors,
            ),
            ArbitraryObu::new(
                ObuType::Reserved(25),
                vec![],
                InsertionHook::AfterIaSequenceHeader,
            ),
            ArbitraryObu::new(
                ObuType::Reserved(26),
                vec![],
                InsertionHook::AfterCodecConfigs,
            ),
            ArbitraryObu::new(
                ObuType::Reserved(27),
                vec![],
                InsertionHook::AfterDescriptors,
            ),
            ArbitraryObu::new(
                ObuType::Reserved(28),
                vec![],
                InsertionHook::AfterTemporalDelimiter(8),
            ),
        ];
        let bytes = assembler.assemble(
            &ia_sequence_header,
            &[codec_config()],
            &[audio_element()],
            &[mix_presentation()],
            &[audio_frame(0), audio_frame(8)],
            &[],
            &arbitrary_obus,
        )?;

        assert_eq!(
            obu_type_codes(&bytes)?,
            vec![24, 31, 25, 0, 26, 1, 2, 27, 4, 6, 4, 28, 6]
        );
        Ok(())
    }

    #[test]
    fn a_failing_obu_aborts_assembly() {
        let assembler = ObuAssembler::new(LebGenerator::default());
        let mut header = ObuHeader::new(ObuType::IaSequenceHeader);
        header.obu_redundant_copy = true;
        let bad_sequence_header = IaSequenceHeaderObu::new(
            header,
            ProfileVersion::Simple,
            ProfileVersion::Simple,
        );

        let result = assembler.assemble(
            &bad_sequence_header,
            &[codec_config()],
            &[audio_element()],
            &[mix_presentation()],
            &[],
            &[],
            &[],
        );
        assert!(result.is_err());
    }
}
