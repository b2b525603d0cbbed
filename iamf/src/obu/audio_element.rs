//! Audio Element OBUs.
//!
//! An audio element groups coded substreams under one codec config and one
//! type-specific layout: scalable channel layers, ambisonics (mono or
//! projection mapping), or an opaque extension. Construction is staged: set
//! the scalar fields, size the substream id array, then build the variant
//! config before write-time validation runs the cross-field checks.

use std::collections::HashSet;

use anyhow::{Result, bail};

use crate::obu::header::{ObuHeader, ObuType};
use crate::obu::param_definitions::{PARAM_DEFINITION_TYPE_MIX_GAIN, ParamDefinitionVariant};
use crate::obu::ObuBase;
use crate::utils::bit_buffer::WriteBitBuffer;
use crate::utils::errors::AudioElementError;

/// Highest legal ambisonics channel count, order 14.
pub const MAX_AMBISONICS_CHANNEL_COUNT: u32 = 225;

/// Channel mapping entry marking an ACN as dropped.
pub const AMBISONICS_ACN_DROPPED: u8 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioElementType {
    ChannelBased,
    SceneBased,
    Reserved(u8),
}

impl AudioElementType {
    pub fn code(&self) -> u8 {
        match self {
            Self::ChannelBased => 0,
            Self::SceneBased => 1,
            Self::Reserved(code) => *code,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::ChannelBased,
            1 => Self::SceneBased,
            _ => Self::Reserved(code),
        }
    }
}

/// 4-bit loudspeaker layout of one scalable channel layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoudspeakerLayout {
    Mono,
    #[default]
    Stereo,
    Layout5_1,
    Layout5_1_2,
    Layout5_1_4,
    Layout7_1,
    Layout7_1_2,
    Layout7_1_4,
    Layout3_1_2,
    Binaural,
    Reserved(u8),
}

impl LoudspeakerLayout {
    pub fn code(&self) -> u8 {
        match self {
            Self::Mono => 0,
            Self::Stereo => 1,
            Self::Layout5_1 => 2,
            Self::Layout5_1_2 => 3,
            Self::Layout5_1_4 => 4,
            Self::Layout7_1 => 5,
            Self::Layout7_1_2 => 6,
            Self::Layout7_1_4 => 7,
            Self::Layout3_1_2 => 8,
            Self::Binaural => 9,
            Self::Reserved(code) => *code,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Mono,
            1 => Self::Stereo,
            2 => Self::Layout5_1,
            3 => Self::Layout5_1_2,
            4 => Self::Layout5_1_4,
            5 => Self::Layout7_1,
            6 => Self::Layout7_1_2,
            7 => Self::Layout7_1_4,
            8 => Self::Layout3_1_2,
            9 => Self::Binaural,
            _ => Self::Reserved(code),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChannelAudioLayerConfig {
    pub loudspeaker_layout: LoudspeakerLayout,
    pub output_gain_is_present_flag: bool,
    pub recon_gain_is_present_flag: bool,
    pub reserved_a: u8,
    pub substream_count: u8,
    pub coupled_substream_count: u8,

    // Written iff `output_gain_is_present_flag`.
    pub output_gain_flag: u8,
    pub reserved_b: u8,
    pub output_gain: i16,
}

impl ChannelAudioLayerConfig {
    fn write(&self, wb: &mut WriteBitBuffer) -> Result<()> {
        wb.write_unsigned_literal(u32::from(self.loudspeaker_layout.code()), 4)?;
        wb.write_bool(self.output_gain_is_present_flag)?;
        wb.write_bool(self.recon_gain_is_present_flag)?;
        wb.write_unsigned_literal(u32::from(self.reserved_a), 2)?;
        wb.write_unsigned_literal(u32::from(self.substream_count), 8)?;
        wb.write_unsigned_literal(u32::from(self.coupled_substream_count), 8)?;
        if self.output_gain_is_present_flag {
            wb.write_unsigned_literal(u32::from(self.output_gain_flag), 6)?;
            wb.write_unsigned_literal(u32::from(self.reserved_b), 2)?;
            wb.write_signed16(self.output_gain)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScalableChannelLayoutConfig {
    pub reserved: u8,
    pub channel_audio_layer_configs: Vec<ChannelAudioLayerConfig>,
}

impl ScalableChannelLayoutConfig {
    pub fn num_layers(&self) -> u8 {
        self.channel_audio_layer_configs.len() as u8
    }

    pub fn validate(&self, num_substreams: u32) -> Result<()> {
        let num_layers = self.num_layers();
        if num_layers == 0 || num_layers > 6 {
            bail!(AudioElementError::InvalidNumLayers(num_layers));
        }

        let actual: u32 = self
            .channel_audio_layer_configs
            .iter()
            .map(|layer| u32::from(layer.substream_count))
            .sum();
        if actual != num_substreams {
            bail!(AudioElementError::LayerSubstreamCountMismatch {
                expected: num_substreams,
                actual,
            });
        }

        let has_binaural = self
            .channel_audio_layer_configs
            .iter()
            .any(|layer| layer.loudspeaker_layout == LoudspeakerLayout::Binaural);
        if has_binaural && num_layers != 1 {
            bail!(AudioElementError::BinauralRequiresOneLayer);
        }
        Ok(())
    }

    fn write(&self, wb: &mut WriteBitBuffer) -> Result<()> {
        wb.write_unsigned_literal(u32::from(self.num_layers()), 3)?;
        wb.write_unsigned_literal(u32::from(self.reserved), 5)?;
        for layer in &self.channel_audio_layer_configs {
            layer.write(wb)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AmbisonicsMonoConfig {
    pub output_channel_count: u8,
    pub substream_count: u8,
    /// One entry per ACN: a substream index, or 255 for a dropped channel.
    pub channel_mapping: Vec<u8>,
}

impl AmbisonicsMonoConfig {
    pub fn validate(&self, num_substreams: u32) -> Result<()> {
        validate_ambisonics_channel_count(u32::from(self.output_channel_count))?;

        if self.substream_count > self.output_channel_count {
            bail!(AudioElementError::TooManyAmbisonicsSubstreams {
                substreams: self.substream_count,
                channels: self.output_channel_count,
            });
        }
        if u32::from(self.substream_count) != num_substreams {
            bail!(AudioElementError::LayerSubstreamCountMismatch {
                expected: num_substreams,
                actual: u32::from(self.substream_count),
            });
        }
        if self.channel_mapping.len() != usize::from(self.output_channel_count) {
            bail!(AudioElementError::DemixingMatrixSizeMismatch {
                expected: usize::from(self.output_channel_count),
                actual: self.channel_mapping.len(),
            });
        }

        let mut seen = HashSet::new();
        for &entry in &self.channel_mapping {
            if entry == AMBISONICS_ACN_DROPPED {
                continue;
            }
            if entry >= self.substream_count {
                bail!(AudioElementError::ChannelMappingOutOfRange {
                    entry,
                    substreams: self.substream_count,
                });
            }
            seen.insert(entry);
        }
        for substream in 0..self.substream_count {
            if !seen.contains(&substream) {
                bail!(AudioElementError::ChannelMappingMissingSubstream(substream));
            }
        }
        Ok(())
    }

    fn write(&self, wb: &mut WriteBitBuffer) -> Result<()> {
        wb.write_unsigned_literal(u32::from(self.output_channel_count), 8)?;
        wb.write_unsigned_literal(u32::from(self.substream_count), 8)?;
        wb.write_bytes(&self.channel_mapping)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AmbisonicsProjectionConfig {
    pub output_channel_count: u8,
    pub substream_count: u8,
    pub coupled_substream_count: u8,
    /// Row-major `(substream_count + coupled_substream_count) x
    /// output_channel_count` Q15 matrix.
    pub demixing_matrix: Vec<i16>,
}

impl AmbisonicsProjectionConfig {
    pub fn validate(&self, num_substreams: u32) -> Result<()> {
        validate_ambisonics_channel_count(u32::from(self.output_channel_count))?;

        if self.coupled_substream_count > self.substream_count {
            bail!(AudioElementError::TooManyCoupledSubstreams {
                coupled: self.coupled_substream_count,
                substreams: self.substream_count,
            });
        }
        if u32::from(self.substream_count) != num_substreams {
            bail!(AudioElementError::LayerSubstreamCountMismatch {
                expected: num_substreams,
                actual: u32::from(self.substream_count),
            });
        }

        let expected = (usize::from(self.substream_count)
            + usize::from(self.coupled_substream_count))
            * usize::from(self.output_channel_count);
        if self.demixing_matrix.len() != expected {
            bail!(AudioElementError::DemixingMatrixSizeMismatch {
                expected,
                actual: self.demixing_matrix.len(),
            });
        }
        Ok(())
    }

    fn write(&self, wb: &mut WriteBitBuffer) -> Result<()> {
        wb.write_unsigned_literal(u32::from(self.output_channel_count), 8)?;
        wb.write_unsigned_literal(u32::from(self.substream_count), 8)?;
        wb.write_unsigned_literal(u32::from(self.coupled_substream_count), 8)?;
        for &coefficient in &self.demixing_matrix {
            wb.write_signed16(coefficient)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtensionConfig {
    pub audio_element_config_bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioElementConfig {
    ScalableChannelLayout(ScalableChannelLayoutConfig),
    AmbisonicsMono(AmbisonicsMonoConfig),
    AmbisonicsProjection(AmbisonicsProjectionConfig),
    Extension(ExtensionConfig),
}

/// Smallest legal ambisonics channel count at or above `n`.
pub fn next_valid_output_channel_count(n: u32) -> Result<u32> {
    for order in 0u32..=14 {
        let channel_count = (order + 1) * (order + 1);
        if channel_count >= n {
            return Ok(channel_count);
        }
    }
    bail!(AudioElementError::NoValidAmbisonicsChannelCount(n))
}

fn validate_ambisonics_channel_count(channel_count: u32) -> Result<()> {
    if channel_count == 0
        || channel_count > MAX_AMBISONICS_CHANNEL_COUNT
        || next_valid_output_channel_count(channel_count)? != channel_count
    {
        bail!(AudioElementError::InvalidAmbisonicsChannelCount(channel_count));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioElementObu {
    pub header: ObuHeader,
    pub audio_element_id: u32,
    pub audio_element_type: AudioElementType,
    pub reserved: u8,
    pub codec_config_id: u32,
    pub audio_substream_ids: Vec<u32>,
    pub audio_element_params: Vec<ParamDefinitionVariant>,
    pub config: AudioElementConfig,
}

impl AudioElementObu {
    pub fn new(
        mut header: ObuHeader,
        audio_element_id: u32,
        audio_element_type: AudioElementType,
        reserved: u8,
        codec_config_id: u32,
    ) -> Self {
        header.obu_type = ObuType::AudioElement;
        Self {
            header,
            audio_element_id,
            audio_element_type,
            reserved,
            codec_config_id,
            audio_substream_ids: Vec::new(),
            audio_element_params: Vec::new(),
            config: AudioElementConfig::Extension(ExtensionConfig::default()),
        }
    }

    /// Sizes the substream id array; ids are filled in afterwards.
    pub fn initialize_audio_substreams(&mut self, num_substreams: u32) {
        self.audio_substream_ids = vec![0; num_substreams as usize];
    }

    pub fn num_substreams(&self) -> u32 {
        self.audio_substream_ids.len() as u32
    }

    pub fn initialize_scalable_channel_layout(
        &mut self,
        num_layers: u8,
        reserved: u8,
    ) -> Result<()> {
        if num_layers == 0 || num_layers > 6 {
            bail!(AudioElementError::InvalidNumLayers(num_layers));
        }
        self.config = AudioElementConfig::ScalableChannelLayout(ScalableChannelLayoutConfig {
            reserved,
            channel_audio_layer_configs: vec![
                ChannelAudioLayerConfig::default();
                usize::from(num_layers)
            ],
        });
        Ok(())
    }

    pub fn initialize_ambisonics_mono(&mut self, output_channel_count: u8, substream_count: u8) {
        self.config = AudioElementConfig::AmbisonicsMono(AmbisonicsMonoConfig {
            output_channel_count,
            substream_count,
            channel_mapping: vec![0; usize::from(output_channel_count)],
        });
    }

    pub fn initialize_ambisonics_projection(
        &mut self,
        output_channel_count: u8,
        substream_count: u8,
        coupled_substream_count: u8,
    ) {
        let rows = usize::from(substream_count) + usize::from(coupled_substream_count);
        self.config = AudioElementConfig::AmbisonicsProjection(AmbisonicsProjectionConfig {
            output_channel_count,
            substream_count,
            coupled_substream_count,
            demixing_matrix: vec![0; rows * usize::from(output_channel_count)],
        });
    }

    pub fn initialize_extension_config(&mut self, audio_element_config_bytes: Vec<u8>) {
        self.config = AudioElementConfig::Extension(ExtensionConfig {
            audio_element_config_bytes,
        });
    }

    fn validate_params(&self) -> Result<()> {
        let mut seen_types = HashSet::new();
        for param in &self.audio_element_params {
            let param_definition_type = param.param_definition_type();
            if param_definition_type == PARAM_DEFINITION_TYPE_MIX_GAIN
                && self.audio_element_type == AudioElementType::ChannelBased
            {
                bail!(AudioElementError::MixGainInChannelBasedElement);
            }
            if !seen_types.insert(param_definition_type) {
                bail!(AudioElementError::DuplicateParamDefinitionType(
                    param_definition_type
                ));
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.validate_params()?;

        match (&self.audio_element_type, &self.config) {
            (AudioElementType::ChannelBased, AudioElementConfig::ScalableChannelLayout(config)) => {
                if self.audio_substream_ids.is_empty() {
                    bail!(AudioElementError::NoSubstreams);
                }
                config.validate(self.num_substreams())
            }
            (AudioElementType::SceneBased, AudioElementConfig::AmbisonicsMono(config)) => {
                config.validate(self.num_substreams())
            }
            (AudioElementType::SceneBased, AudioElementConfig::AmbisonicsProjection(config)) => {
                config.validate(self.num_substreams())
            }
            (AudioElementType::Reserved(_), AudioElementConfig::Extension(_)) => Ok(()),
            _ => bail!(AudioElementError::ConfigTypeMismatch(
                self.audio_element_type.code()
            )),
        }
    }
}

impl ObuBase for AudioElementObu {
    fn header(&self) -> &ObuHeader {
        &self.header
    }

    fn validate_and_write_payload(&self, wb: &mut WriteBitBuffer) -> Result<()> {
        self.validate()?;

        wb.write_uleb128(self.audio_element_id)?;
        wb.write_unsigned_literal(u32::from(self.audio_element_type.code()), 3)?;
        wb.write_unsigned_literal(u32::from(self.reserved), 5)?;
        wb.write_uleb128(self.codec_config_id)?;

        wb.write_uleb128(self.num_substreams())?;
        for &substream_id in &self.audio_substream_ids {
            wb.write_uleb128(substream_id)?;
        }

        wb.write_uleb128(self.audio_element_params.len() as u32)?;
        for param in &self.audio_element_params {
            param.validate_and_write(wb)?;
        }

        match &self.config {
            AudioElementConfig::ScalableChannelLayout(config) => config.write(wb),
            AudioElementConfig::AmbisonicsMono(config) => {
                wb.write_uleb128(0)?;
                config.write(wb)
            }
            AudioElementConfig::AmbisonicsProjection(config) => {
                wb.write_uleb128(1)?;
                config.write(wb)
            }
            AudioElementConfig::Extension(config) => {
                wb.write_uleb128(config.audio_element_config_bytes.len() as u32)?;
                wb.write_bytes(&config.audio_element_config_bytes)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obu::demixing_info::DefaultDemixingInfoParameterData;
    use crate::obu::param_definitions::{
        DemixingParamDefinition, ExtendedParamDefinition, MixGainParamDefinition, ParamDefinition,
        PARAM_DEFINITION_TYPE_RESERVED_START,
    };
    use crate::utils::bit_buffer::LebGenerator;
    use anyhow::Result;

    fn demixing_param() -> ParamDefinitionVariant {
        ParamDefinitionVariant::Demixing(DemixingParamDefinition {
            base: ParamDefinition {
                parameter_id: 4,
                parameter_rate: 5,
                param_definition_mode: false,
                reserved: 0,
                duration: 64,
                constant_subblock_duration: 64,
                subblock_durations: Vec::new(),
            },
            default_demixing_info_parameter_data: DefaultDemixingInfoParameterData::default(),
        })
    }

    fn stereo_element() -> AudioElementObu {
        let mut obu = AudioElementObu::new(
            ObuHeader::new(ObuType::AudioElement),
            1,
            AudioElementType::ChannelBased,
            0,
            2,
        );
        obu.initialize_audio_substreams(1);
        obu.audio_substream_ids = vec![3];
        obu.audio_element_params = vec![demixing_param()];
        obu.initialize_scalable_channel_layout(1, 0).unwrap();
        if let AudioElementConfig::ScalableChannelLayout(config) = &mut obu.config {
            config.channel_audio_layer_configs[0] = ChannelAudioLayerConfig {
                loudspeaker_layout: LoudspeakerLayout::Stereo,
                output_gain_is_present_flag: true,
                recon_gain_is_present_flag: true,
                reserved_a: 0,
                substream_count: 1,
                coupled_substream_count: 1,
                output_gain_flag: 1,
                reserved_b: 0,
                output_gain: 1,
            };
        }
        obu
    }

    fn write_obu(obu: &AudioElementObu) -> Result<Vec<u8>> {
        let mut wb = WriteBitBuffer::new(LebGenerator::default());
        obu.validate_and_write(&mut wb)?;
        wb.into_bytes()
    }

    #[test]
    fn constructor_sets_obu_type() {
        let obu = stereo_element();
        assert_eq!(obu.header.obu_type, ObuType::AudioElement);
    }

    #[test]
    fn scalable_channel_element_is_bit_exact() -> Result<()> {
        let bytes = write_obu(&stereo_element())?;
        assert_eq!(
            bytes,
            vec![
                // Header.
                1 << 3, 21,
                // `audio_element_id`, type byte, `codec_config_id`.
                1, 0 << 5, 2,
                // `num_substreams`, ids, `num_parameters`.
                1, 3, 1,
                // Demixing parameter definition with its tag.
                1, 4, 5, 0x00, 64, 64, 0, 0,
                // `num_layers` (3) + reserved (5).
                1 << 5,
                // Layer: layout (4), gain flags (2), reserved (2).
                1 << 4 | 1 << 3 | 1 << 2,
                // `substream_count`, `coupled_substream_count`.
                1, 1,
                // `output_gain_flag` (6) + reserved (2), `output_gain`.
                1 << 2, 0, 1,
            ]
        );
        Ok(())
    }

    #[test]
    fn ambisonics_mono_foa_serializes_its_mapping() -> Result<()> {
        let mut obu = AudioElementObu::new(
            ObuHeader::new(ObuType::AudioElement),
            5,
            AudioElementType::SceneBased,
            0,
            2,
        );
        obu.initialize_audio_substreams(4);
        obu.audio_substream_ids = vec![10, 11, 12, 13];
        obu.initialize_ambisonics_mono(4, 4);
        if let AudioElementConfig::AmbisonicsMono(config) = &mut obu.config {
            config.channel_mapping = vec![0, 1, 2, 3];
        }

        let bytes = write_obu(&obu)?;
        // Tail: ambisonics_mode 0, then the mono config.
        assert_eq!(&bytes[bytes.len() - 7..], &[0, 4, 4, 0, 1, 2, 3]);
        Ok(())
    }

    #[test]
    fn redundant_copy_is_legal_for_audio_elements() -> Result<()> {
        let mut obu = stereo_element();
        obu.header.obu_redundant_copy = true;
        let bytes = write_obu(&obu)?;
        assert_eq!(bytes[0], 1 << 3 | 1 << 2);
        Ok(())
    }

    #[test]
    fn trimming_flag_is_rejected() {
        let mut obu = stereo_element();
        obu.header.obu_trimming_status_flag = true;
        assert!(write_obu(&obu).is_err());
    }

    #[test]
    fn zero_substreams_is_rejected() {
        let mut obu = stereo_element();
        obu.audio_substream_ids.clear();
        assert!(write_obu(&obu).is_err());
    }

    #[test]
    fn mix_gain_params_are_rejected_in_channel_based_elements() {
        let mut obu = stereo_element();
        obu.audio_element_params =
            vec![ParamDefinitionVariant::MixGain(MixGainParamDefinition::default())];
        assert!(write_obu(&obu).is_err());
    }

    #[test]
    fn duplicate_param_definition_types_are_rejected() {
        let mut obu = stereo_element();
        obu.audio_element_params = vec![demixing_param(), demixing_param()];
        assert!(write_obu(&obu).is_err());

        // Extended definitions must be distinct by tag as well.
        let extended = |tag| {
            ParamDefinitionVariant::Extended(ExtendedParamDefinition {
                param_definition_type: tag,
                param_definition_bytes: Vec::new(),
            })
        };
        obu.audio_element_params = vec![
            extended(PARAM_DEFINITION_TYPE_RESERVED_START),
            extended(PARAM_DEFINITION_TYPE_RESERVED_START),
        ];
        assert!(write_obu(&obu).is_err());

        obu.audio_element_params = vec![
            extended(PARAM_DEFINITION_TYPE_RESERVED_START),
            extended(PARAM_DEFINITION_TYPE_RESERVED_START + 1),
        ];
        assert!(write_obu(&obu).is_ok());
    }

    #[test]
    fn extended_param_definitions_serialize_with_leb_tags() -> Result<()> {
        let mut obu = stereo_element();
        obu.audio_element_params = vec![ParamDefinitionVariant::Extended(ExtendedParamDefinition {
            param_definition_type: u32::MAX,
            param_definition_bytes: b"extra".to_vec(),
        })];

        let bytes = write_obu(&obu)?;
        // After id, type, codec_config_id, num_substreams, ids, num_params:
        // five tag bytes, the size, and the payload.
        assert_eq!(
            &bytes[8..19],
            &[0xff, 0xff, 0xff, 0xff, 0x0f, 5, b'e', b'x', b't', b'r', b'a']
        );
        Ok(())
    }

    #[test]
    fn layer_substream_counts_must_sum_to_num_substreams() {
        let mut obu = stereo_element();
        obu.initialize_audio_substreams(3);
        obu.audio_substream_ids = vec![3, 4, 5];
        assert!(write_obu(&obu).is_err());
    }

    #[test]
    fn binaural_is_exclusive_to_single_layer_configs() {
        let mut obu = stereo_element();
        obu.initialize_audio_substreams(2);
        obu.audio_substream_ids = vec![3, 4];
        obu.initialize_scalable_channel_layout(2, 0).unwrap();
        if let AudioElementConfig::ScalableChannelLayout(config) = &mut obu.config {
            config.channel_audio_layer_configs[0].loudspeaker_layout = LoudspeakerLayout::Binaural;
            config.channel_audio_layer_configs[0].substream_count = 1;
            config.channel_audio_layer_configs[1].loudspeaker_layout = LoudspeakerLayout::Stereo;
            config.channel_audio_layer_configs[1].substream_count = 1;
        }
        assert!(write_obu(&obu).is_err());
    }

    #[test]
    fn ambisonics_mapping_must_cover_every_substream() {
        let mut obu = AudioElementObu::new(
            ObuHeader::new(ObuType::AudioElement),
            5,
            AudioElementType::SceneBased,
            0,
            2,
        );
        obu.initialize_audio_substreams(2);
        obu.audio_substream_ids = vec![10, 11];
        obu.initialize_ambisonics_mono(4, 2);

        // Substream 1 never appears.
        if let AudioElementConfig::AmbisonicsMono(config) = &mut obu.config {
            config.channel_mapping = vec![0, 0, AMBISONICS_ACN_DROPPED, AMBISONICS_ACN_DROPPED];
        }
        assert!(write_obu(&obu).is_err());

        // Entry out of range.
        if let AudioElementConfig::AmbisonicsMono(config) = &mut obu.config {
            config.channel_mapping = vec![0, 1, 2, AMBISONICS_ACN_DROPPED];
        }
        assert!(write_obu(&obu).is_err());

        // Dropped ACNs are fine once every substream appears.
        if let AudioElementConfig::AmbisonicsMono(config) = &mut obu.config {
            config.channel_mapping = vec![0, 1, AMBISONICS_ACN_DROPPED, AMBISONICS_ACN_DROPPED];
        }
        assert!(write_obu(&obu).is_ok());
    }

    #[test]
    fn projection_matrix_size_is_validated() {
        let mut obu = AudioElementObu::new(
            ObuHeader::new(ObuType::AudioElement),
            6,
            AudioElementType::SceneBased,
            0,
            2,
        );
        obu.initialize_audio_substreams(2);
        obu.audio_substream_ids = vec![20, 21];
        obu.initialize_ambisonics_projection(4, 2, 1);
        assert!(write_obu(&obu).is_ok());

        if let AudioElementConfig::AmbisonicsProjection(config) = &mut obu.config {
            config.demixing_matrix.pop();
        }
        assert!(write_obu(&obu).is_err());
    }

    #[test]
    fn coupled_substreams_cannot_exceed_substreams() {
        let mut obu = AudioElementObu::new(
            ObuHeader::new(ObuType::AudioElement),
            6,
            AudioElementType::SceneBased,
            0,
            2,
        );
        obu.initialize_audio_substreams(1);
        obu.audio_substream_ids = vec![20];
        obu.initialize_ambisonics_projection(4, 1, 2);
        assert!(write_obu(&obu).is_err());
    }

    #[test]
    fn next_valid_output_channel_count_rounds_up_to_squares() -> Result<()> {
        assert_eq!(next_valid_output_channel_count(0)?, 1);
        assert_eq!(next_valid_output_channel_count(1)?, 1);
        assert_eq!(next_valid_output_channel_count(2)?, 4);
        assert_eq!(next_valid_output_channel_count(5)?, 9);
        assert_eq!(next_valid_output_channel_count(10)?, 16);
        assert_eq!(next_valid_output_channel_count(225)?, 225);
        assert!(next_valid_output_channel_count(226).is_err());
        Ok(())
    }
}
