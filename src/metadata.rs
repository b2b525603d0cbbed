//! The user metadata document.
//!
//! A JSON sidecar describing the whole program: descriptors, per-element
//! WAV inputs, parameter blocks, and arbitrary OBUs. Deserialized with
//! serde and lowered into validated descriptor OBUs.

use std::collections::HashMap;

use anyhow::{Context, Result, bail, ensure};
use log::debug;
use serde::Deserialize;

use iamf::obu::arbitrary::{ArbitraryObu, InsertionHook};
use iamf::obu::audio_element::{
    AudioElementConfig, AudioElementObu, AudioElementType, ChannelAudioLayerConfig,
    LoudspeakerLayout,
};
use iamf::obu::codec_config::{CodecConfig, CodecConfigObu, CodecId};
use iamf::obu::decoder_config::aac::AacDecoderConfig;
use iamf::obu::decoder_config::flac::{
    FlacBlockData, FlacDecoderConfig, FlacMetaBlock, FlacStreamInfo, FLAC_BLOCK_TYPE_STREAMINFO,
};
use iamf::obu::decoder_config::lpcm::{LpcmDecoderConfig, LpcmFormatFlags};
use iamf::obu::decoder_config::opus::OpusDecoderConfig;
use iamf::obu::decoder_config::DecoderConfig;
use iamf::obu::demixing_info::{DMixPMode, DefaultDemixingInfoParameterData};
use iamf::obu::header::{ObuHeader, ObuType};
use iamf::obu::ia_sequence_header::{IaSequenceHeaderObu, ProfileVersion};
use iamf::obu::mix_presentation::{
    AnchorElement, AnchoredLoudness, HeadphonesRenderingMode, Layout, LoudnessInfo,
    MixPresentationLayout, MixPresentationObu, MixPresentationSubMix, RenderingConfig,
    SoundSystem, SubMixAudioElement, LOUDNESS_INFO_TYPE_ANCHORED_LOUDNESS,
    LOUDNESS_INFO_TYPE_TRUE_PEAK,
};
use iamf::obu::param_definitions::{
    DemixingParamDefinition, MixGainParamDefinition, ParamDefinition, ParamDefinitionVariant,
    ReconGainParamDefinition, PARAM_DEFINITION_TYPE_DEMIXING, PARAM_DEFINITION_TYPE_MIX_GAIN,
    PARAM_DEFINITION_TYPE_RECON_GAIN,
};
use iamf::obu::parameter_block::PerIdParameterMetadata;
use iamf::process::AudioElementWithData;
use iamf::utils::bit_buffer::{LebGenerationMode, LebGenerator};

#[derive(Debug, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub leb_generator: LebGeneratorMetadata,
    pub ia_sequence_header: IaSequenceHeaderMetadata,
    #[serde(default)]
    pub codec_config_metadata: Vec<CodecConfigMetadata>,
    #[serde(default)]
    pub audio_element_metadata: Vec<AudioElementMetadata>,
    #[serde(default)]
    pub mix_presentation_metadata: Vec<MixPresentationMetadata>,
    #[serde(default)]
    pub audio_frame_metadata: Vec<AudioFrameMetadata>,
    #[serde(default)]
    pub parameter_block_metadata: Vec<ParameterBlockMetadata>,
    #[serde(default)]
    pub arbitrary_obu_metadata: Vec<ArbitraryObuMetadata>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LebGeneratorMetadata {
    #[default]
    Minimum,
    FixedSize(usize),
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileMetadata {
    #[default]
    Simple,
    Base,
}

impl ProfileMetadata {
    fn to_profile(self) -> ProfileVersion {
        match self {
            Self::Simple => ProfileVersion::Simple,
            Self::Base => ProfileVersion::Base,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct IaSequenceHeaderMetadata {
    #[serde(default)]
    pub primary_profile: ProfileMetadata,
    #[serde(default)]
    pub additional_profile: ProfileMetadata,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecIdMetadata {
    Lpcm,
    Opus,
    Flac,
    AacLc,
}

fn default_sample_rate() -> u32 {
    48000
}

fn default_sample_size() -> u8 {
    16
}

fn default_num_channels() -> u8 {
    2
}

#[derive(Debug, Deserialize)]
pub struct CodecConfigMetadata {
    pub codec_config_id: u32,
    pub codec_id: CodecIdMetadata,
    pub num_samples_per_frame: u32,
    #[serde(default)]
    pub audio_roll_distance: i16,

    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_sample_size")]
    pub sample_size: u8,
    #[serde(default)]
    pub little_endian: bool,
    #[serde(default = "default_num_channels")]
    pub num_channels: u8,

    #[serde(default)]
    pub opus: OpusSettingsMetadata,
    #[serde(default)]
    pub aac: AacSettingsMetadata,
    #[serde(default)]
    pub flac: FlacSettingsMetadata,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct OpusSettingsMetadata {
    #[serde(default = "default_sample_rate")]
    pub target_bitrate_per_channel: u32,
    #[serde(default)]
    pub use_float_api: bool,
    #[serde(default)]
    pub application: OpusApplicationMetadata,
}

impl Default for OpusSettingsMetadata {
    fn default() -> Self {
        Self {
            target_bitrate_per_channel: default_sample_rate(),
            use_float_api: false,
            application: OpusApplicationMetadata::Audio,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpusApplicationMetadata {
    #[default]
    Audio,
    Voip,
    RestrictedLowdelay,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct AacSettingsMetadata {
    #[serde(default)]
    pub enable_afterburner: bool,
    #[serde(default)]
    pub bitrate_mode: u32,
    #[serde(default)]
    pub signaling_mode: u32,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct FlacSettingsMetadata {
    #[serde(default)]
    pub compression_level: u32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioElementTypeMetadata {
    ChannelBased,
    SceneBased,
}

#[derive(Debug, Deserialize)]
pub struct AudioElementMetadata {
    pub audio_element_id: u32,
    pub audio_element_type: AudioElementTypeMetadata,
    pub codec_config_id: u32,
    pub audio_substream_ids: Vec<u32>,

    #[serde(default)]
    pub scalable_channel_layouts: Vec<ChannelAudioLayerMetadata>,
    #[serde(default)]
    pub ambisonics_mono: Option<AmbisonicsMonoMetadata>,
    #[serde(default)]
    pub ambisonics_projection: Option<AmbisonicsProjectionMetadata>,

    #[serde(default)]
    pub demixing_param: Option<DemixingParamMetadata>,
    #[serde(default)]
    pub recon_gain_param: Option<ReconGainParamMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelAudioLayerMetadata {
    pub loudspeaker_layout: LoudspeakerLayoutMetadata,
    pub substream_count: u8,
    #[serde(default)]
    pub coupled_substream_count: u8,
    #[serde(default)]
    pub recon_gain_is_present_flag: bool,
    /// Presence implies `output_gain_is_present_flag`.
    #[serde(default)]
    pub output_gain: Option<i16>,
    #[serde(default)]
    pub output_gain_flag: u8,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub enum LoudspeakerLayoutMetadata {
    #[serde(rename = "mono")]
    Mono,
    #[serde(rename = "stereo")]
    Stereo,
    #[serde(rename = "5.1")]
    Layout5_1,
    #[serde(rename = "5.1.2")]
    Layout5_1_2,
    #[serde(rename = "5.1.4")]
    Layout5_1_4,
    #[serde(rename = "7.1")]
    Layout7_1,
    #[serde(rename = "7.1.2")]
    Layout7_1_2,
    #[serde(rename = "7.1.4")]
    Layout7_1_4,
    #[serde(rename = "3.1.2")]
    Layout3_1_2,
    #[serde(rename = "binaural")]
    Binaural,
}

impl LoudspeakerLayoutMetadata {
    pub fn to_layout(self) -> LoudspeakerLayout {
        match self {
            Self::Mono => LoudspeakerLayout::Mono,
            Self::Stereo => LoudspeakerLayout::Stereo,
            Self::Layout5_1 => LoudspeakerLayout::Layout5_1,
            Self::Layout5_1_2 => LoudspeakerLayout::Layout5_1_2,
            Self::Layout5_1_4 => LoudspeakerLayout::Layout5_1_4,
            Self::Layout7_1 => LoudspeakerLayout::Layout7_1,
            Self::Layout7_1_2 => LoudspeakerLayout::Layout7_1_2,
            Self::Layout7_1_4 => LoudspeakerLayout::Layout7_1_4,
            Self::Layout3_1_2 => LoudspeakerLayout::Layout3_1_2,
            Self::Binaural => LoudspeakerLayout::Binaural,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AmbisonicsMonoMetadata {
    pub output_channel_count: u8,
    pub substream_count: u8,
    pub channel_mapping: Vec<u8>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AmbisonicsProjectionMetadata {
    pub output_channel_count: u8,
    pub substream_count: u8,
    #[serde(default)]
    pub coupled_substream_count: u8,
    pub demixing_matrix: Vec<i16>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DMixPModeMetadata {
    #[default]
    Mode1,
    Mode2,
    Mode3,
    Mode1N,
    Mode2N,
    Mode3N,
}

impl DMixPModeMetadata {
    pub fn to_mode(self) -> DMixPMode {
        match self {
            Self::Mode1 => DMixPMode::Mode1,
            Self::Mode2 => DMixPMode::Mode2,
            Self::Mode3 => DMixPMode::Mode3,
            Self::Mode1N => DMixPMode::Mode1N,
            Self::Mode2N => DMixPMode::Mode2N,
            Self::Mode3N => DMixPMode::Mode3N,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DemixingParamMetadata {
    pub parameter_id: u32,
    pub parameter_rate: u32,
    pub duration: u32,
    #[serde(default)]
    pub default_dmixp_mode: DMixPModeMetadata,
    #[serde(default)]
    pub default_w: u8,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ReconGainParamMetadata {
    pub parameter_id: u32,
    pub parameter_rate: u32,
    pub duration: u32,
}

#[derive(Debug, Deserialize)]
pub struct MixPresentationMetadata {
    pub mix_presentation_id: u32,
    pub annotations_language: Vec<String>,
    pub localized_presentation_annotations: Vec<String>,
    pub sub_mixes: Vec<SubMixMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct SubMixMetadata {
    pub audio_elements: Vec<SubMixElementMetadata>,
    pub output_mix_gain: MixGainMetadata,
    pub layouts: Vec<LayoutMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct SubMixElementMetadata {
    pub audio_element_id: u32,
    pub localized_element_annotations: Vec<String>,
    #[serde(default)]
    pub headphones_rendering_mode: HeadphonesRenderingModeMetadata,
    pub element_mix_gain: MixGainMetadata,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadphonesRenderingModeMetadata {
    #[default]
    Stereo,
    Binaural,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MixGainMetadata {
    pub parameter_id: u32,
    #[serde(default = "default_sample_rate")]
    pub parameter_rate: u32,
    #[serde(default)]
    pub default_mix_gain: i16,
}

impl MixGainMetadata {
    fn to_definition(self) -> MixGainParamDefinition {
        MixGainParamDefinition {
            base: ParamDefinition {
                parameter_id: self.parameter_id,
                parameter_rate: self.parameter_rate,
                param_definition_mode: true,
                ..Default::default()
            },
            default_mix_gain: self.default_mix_gain,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LayoutMetadata {
    /// ITU-2051 sound system letter "a" through "j"; absent means binaural.
    #[serde(default)]
    pub sound_system: Option<String>,
    pub loudness: LoudnessMetadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoudnessMetadata {
    #[serde(default)]
    pub integrated_loudness: i16,
    #[serde(default)]
    pub digital_peak: i16,
    #[serde(default)]
    pub true_peak: Option<i16>,
    #[serde(default)]
    pub anchored_loudness: Vec<AnchorMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnchorMetadata {
    pub anchor_element: AnchorElementMetadata,
    pub value: i16,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorElementMetadata {
    Unknown,
    Dialogue,
    Album,
}

impl LoudnessMetadata {
    /// The loudness a user-provided calculator hands back verbatim.
    pub fn to_loudness_info(&self) -> LoudnessInfo {
        let mut info_type = 0;
        if self.true_peak.is_some() {
            info_type |= LOUDNESS_INFO_TYPE_TRUE_PEAK;
        }
        if !self.anchored_loudness.is_empty() {
            info_type |= LOUDNESS_INFO_TYPE_ANCHORED_LOUDNESS;
        }
        LoudnessInfo {
            info_type,
            integrated_loudness: self.integrated_loudness,
            digital_peak: self.digital_peak,
            true_peak: self.true_peak.unwrap_or_default(),
            anchored_loudness: AnchoredLoudness {
                anchor_elements: self
                    .anchored_loudness
                    .iter()
                    .map(|anchor| {
                        (
                            match anchor.anchor_element {
                                AnchorElementMetadata::Unknown => AnchorElement::Unknown,
                                AnchorElementMetadata::Dialogue => AnchorElement::Dialogue,
                                AnchorElementMetadata::Album => AnchorElement::Album,
                            },
                            anchor.value,
                        )
                    })
                    .collect(),
            },
            layout_extension_bytes: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AudioFrameMetadata {
    pub wav_filename: String,
    pub audio_element_id: u32,
    pub channel_ids: Vec<u32>,
    pub channel_labels: Vec<String>,
    #[serde(default)]
    pub samples_to_trim_at_start: u32,
    #[serde(default)]
    pub samples_to_trim_at_end: u32,
}

#[derive(Debug, Deserialize)]
pub struct ParameterBlockMetadata {
    pub parameter_id: u32,
    pub start_timestamp: i64,
    pub duration: u32,
    pub constant_subblock_duration: u32,
    pub subblocks: Vec<ParameterSubblockMetadata>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ParameterSubblockMetadata {
    #[serde(default)]
    pub subblock_duration: u32,
    #[serde(default)]
    pub dmixp_mode: Option<DMixPModeMetadata>,
    #[serde(default)]
    pub mix_gain: Option<i16>,
}

#[derive(Debug, Deserialize)]
pub struct ArbitraryObuMetadata {
    pub obu_type: u8,
    #[serde(default)]
    pub payload: Vec<u8>,
    pub insertion_hook: InsertionHookMetadata,
    #[serde(default)]
    pub insertion_tick: i64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertionHookMetadata {
    BeforeDescriptors,
    AfterIaSequenceHeader,
    AfterCodecConfigs,
    AfterDescriptors,
    AfterTemporalDelimiter,
}

/// The lowered program: validated descriptors plus the side tables the
/// temporal phase needs.
pub struct Program {
    pub leb_generator: LebGenerator,
    pub ia_sequence_header: IaSequenceHeaderObu,
    pub codec_configs: Vec<CodecConfigObu>,
    pub audio_elements: Vec<AudioElementObu>,
    pub mix_presentations: Vec<MixPresentationObu>,
    pub audio_elements_with_data: HashMap<u32, AudioElementWithData>,
    pub param_definitions: HashMap<u32, ParamDefinition>,
    pub per_id_metadata: HashMap<u32, PerIdParameterMetadata>,
    pub stray_parameter_ids: Vec<u32>,
    pub arbitrary_obus: Vec<ArbitraryObu>,
}

impl UserMetadata {
    pub fn build_program(&self) -> Result<Program> {
        let leb_generator = match self.leb_generator {
            LebGeneratorMetadata::Minimum => LebGenerator::new(LebGenerationMode::Minimum)?,
            LebGeneratorMetadata::FixedSize(size) => {
                LebGenerator::new(LebGenerationMode::FixedSize(size))?
            }
        };

        let ia_sequence_header = IaSequenceHeaderObu::new(
            ObuHeader::new(ObuType::IaSequenceHeader),
            self.ia_sequence_header.primary_profile.to_profile(),
            self.ia_sequence_header.additional_profile.to_profile(),
        );

        let mut codec_configs = Vec::new();
        let mut codec_configs_by_id = HashMap::new();
        for codec_config_metadata in &self.codec_config_metadata {
            let obu = codec_config_metadata
                .build_obu()
                .with_context(|| {
                    format!(
                        "codec config {}",
                        codec_config_metadata.codec_config_id
                    )
                })?;
            codec_configs_by_id.insert(codec_config_metadata.codec_config_id, obu.clone());
            codec_configs.push(obu);
        }

        let mut param_definitions = HashMap::new();
        let mut per_id_metadata = HashMap::new();
        let mut register_definition =
            |param_definition_type: u32, base: &ParamDefinition| {
                param_definitions.insert(base.parameter_id, base.clone());
                per_id_metadata.insert(
                    base.parameter_id,
                    PerIdParameterMetadata {
                        param_definition_type,
                        param_definition: base.clone(),
                    },
                );
            };

        let mut audio_elements = Vec::new();
        let mut audio_elements_with_data = HashMap::new();
        for element_metadata in &self.audio_element_metadata {
            let codec_config = codec_configs_by_id
                .get(&element_metadata.codec_config_id)
                .with_context(|| {
                    format!(
                        "audio element {} references unknown codec config {}",
                        element_metadata.audio_element_id, element_metadata.codec_config_id
                    )
                })?;
            let obu = element_metadata.build_obu()?;

            for param in &obu.audio_element_params {
                if let Some(base) = param.base() {
                    register_definition(param.param_definition_type(), base);
                }
            }

            audio_elements_with_data.insert(
                element_metadata.audio_element_id,
                AudioElementWithData {
                    obu: obu.clone(),
                    codec_config: codec_config.clone(),
                },
            );
            audio_elements.push(obu);
        }

        let mut mix_presentations = Vec::new();
        for mix_metadata in &self.mix_presentation_metadata {
            let obu = mix_metadata.build_obu(&audio_elements_with_data)?;
            for sub_mix in &obu.sub_mixes {
                for audio_element in &sub_mix.audio_elements {
                    register_definition(
                        PARAM_DEFINITION_TYPE_MIX_GAIN,
                        &audio_element.element_mix_gain.base,
                    );
                }
                register_definition(PARAM_DEFINITION_TYPE_MIX_GAIN, &sub_mix.output_mix_gain.base);
            }
            mix_presentations.push(obu);
        }

        // Parameter blocks whose id no descriptor declares get an implicit
        // rate from a codec config at timing initialization.
        let mut stray_parameter_ids = Vec::new();
        for block_metadata in &self.parameter_block_metadata {
            if !param_definitions.contains_key(&block_metadata.parameter_id)
                && !stray_parameter_ids.contains(&block_metadata.parameter_id)
            {
                stray_parameter_ids.push(block_metadata.parameter_id);
            }
        }

        let mut arbitrary_obus = Vec::new();
        for arbitrary_metadata in &self.arbitrary_obu_metadata {
            let insertion_hook = match arbitrary_metadata.insertion_hook {
                InsertionHookMetadata::BeforeDescriptors => InsertionHook::BeforeDescriptors,
                InsertionHookMetadata::AfterIaSequenceHeader => {
                    InsertionHook::AfterIaSequenceHeader
                }
                InsertionHookMetadata::AfterCodecConfigs => InsertionHook::AfterCodecConfigs,
                InsertionHookMetadata::AfterDescriptors => InsertionHook::AfterDescriptors,
                InsertionHookMetadata::AfterTemporalDelimiter => {
                    InsertionHook::AfterTemporalDelimiter(arbitrary_metadata.insertion_tick)
                }
            };
            arbitrary_obus.push(ArbitraryObu::new(
                ObuType::from_code(arbitrary_metadata.obu_type),
                arbitrary_metadata.payload.clone(),
                insertion_hook,
            ));
        }

        for frame_metadata in &self.audio_frame_metadata {
            frame_metadata.validate(&audio_elements_with_data)?;
        }

        Ok(Program {
            leb_generator,
            ia_sequence_header,
            codec_configs,
            audio_elements,
            mix_presentations,
            audio_elements_with_data,
            param_definitions,
            per_id_metadata,
            stray_parameter_ids,
            arbitrary_obus,
        })
    }
}

impl CodecConfigMetadata {
    fn build_obu(&self) -> Result<CodecConfigObu> {
        let (codec_id, decoder_config) = match self.codec_id {
            CodecIdMetadata::Lpcm => (
                CodecId::Lpcm,
                DecoderConfig::Lpcm(LpcmDecoderConfig {
                    sample_format_flags: if self.little_endian {
                        LpcmFormatFlags::LittleEndian
                    } else {
                        LpcmFormatFlags::BigEndian
                    },
                    sample_size: self.sample_size,
                    sample_rate: self.sample_rate,
                }),
            ),
            CodecIdMetadata::Opus => {
                debug!(
                    "codec config {}: Opus at {} bps/channel, use_float_api={}, application={:?}",
                    self.codec_config_id,
                    self.opus.target_bitrate_per_channel,
                    self.opus.use_float_api,
                    self.opus.application
                );
                (
                    CodecId::Opus,
                    DecoderConfig::Opus(OpusDecoderConfig {
                        input_sample_rate: self.sample_rate,
                        ..Default::default()
                    }),
                )
            }
            CodecIdMetadata::Flac => {
                debug!(
                    "codec config {}: FLAC at compression level {}",
                    self.codec_config_id, self.flac.compression_level
                );
                (
                    CodecId::Flac,
                    DecoderConfig::Flac(FlacDecoderConfig {
                        metadata_blocks: vec![FlacMetaBlock {
                            last_metadata_block_flag: true,
                            block_type: FLAC_BLOCK_TYPE_STREAMINFO,
                            data: FlacBlockData::StreamInfo(FlacStreamInfo {
                                minimum_block_size: self.num_samples_per_frame as u16,
                                maximum_block_size: self.num_samples_per_frame as u16,
                                minimum_frame_size: 0,
                                maximum_frame_size: 0,
                                sample_rate: self.sample_rate,
                                number_of_channels: self.num_channels,
                                bits_per_sample: self.sample_size,
                                total_samples_in_stream: 0,
                                md5_signature: [0; 16],
                            }),
                        }],
                    }),
                )
            }
            CodecIdMetadata::AacLc => {
                debug!(
                    "codec config {}: AAC-LC, afterburner={}, bitrate_mode={}, signaling_mode={}",
                    self.codec_config_id,
                    self.aac.enable_afterburner,
                    self.aac.bitrate_mode,
                    self.aac.signaling_mode
                );
                (
                    CodecId::AacLc,
                    DecoderConfig::Aac(AacDecoderConfig {
                        audio_specific_config: aac_audio_specific_config(self.sample_rate),
                        ..Default::default()
                    }),
                )
            }
        };

        CodecConfigObu::new(
            ObuHeader::new(ObuType::CodecConfig),
            self.codec_config_id,
            CodecConfig {
                codec_id,
                num_samples_per_frame: self.num_samples_per_frame,
                audio_roll_distance: self.audio_roll_distance,
                decoder_config,
            },
        )
    }
}

fn aac_audio_specific_config(
    sample_rate: u32,
) -> iamf::obu::decoder_config::aac::AudioSpecificConfig {
    use iamf::obu::decoder_config::aac::AudioSpecificConfig;

    const TABLE: [(u32, u8); 13] = [
        (96000, 0),
        (88200, 1),
        (64000, 2),
        (48000, 3),
        (44100, 4),
        (32000, 5),
        (24000, 6),
        (22050, 7),
        (16000, 8),
        (12000, 9),
        (11025, 10),
        (8000, 11),
        (7350, 12),
    ];
    match TABLE.iter().find(|(rate, _)| *rate == sample_rate) {
        Some(&(_, index)) => AudioSpecificConfig {
            sample_frequency_index: index,
            ..Default::default()
        },
        None => AudioSpecificConfig {
            sample_frequency_index: 15,
            sampling_frequency: sample_rate,
            ..Default::default()
        },
    }
}

impl AudioElementMetadata {
    fn build_obu(&self) -> Result<AudioElementObu> {
        let audio_element_type = match self.audio_element_type {
            AudioElementTypeMetadata::ChannelBased => AudioElementType::ChannelBased,
            AudioElementTypeMetadata::SceneBased => AudioElementType::SceneBased,
        };
        let mut obu = AudioElementObu::new(
            ObuHeader::new(ObuType::AudioElement),
            self.audio_element_id,
            audio_element_type,
            0,
            self.codec_config_id,
        );
        obu.initialize_audio_substreams(self.audio_substream_ids.len() as u32);
        obu.audio_substream_ids = self.audio_substream_ids.clone();

        match self.audio_element_type {
            AudioElementTypeMetadata::ChannelBased => {
                ensure!(
                    !self.scalable_channel_layouts.is_empty(),
                    "channel-based audio element {} declares no layers",
                    self.audio_element_id
                );
                obu.initialize_scalable_channel_layout(
                    self.scalable_channel_layouts.len() as u8,
                    0,
                )?;
                if let AudioElementConfig::ScalableChannelLayout(config) = &mut obu.config {
                    for (layer, layer_metadata) in config
                        .channel_audio_layer_configs
                        .iter_mut()
                        .zip(&self.scalable_channel_layouts)
                    {
                        *layer = ChannelAudioLayerConfig {
                            loudspeaker_layout: layer_metadata.loudspeaker_layout.to_layout(),
                            output_gain_is_present_flag: layer_metadata.output_gain.is_some(),
                            recon_gain_is_present_flag: layer_metadata.recon_gain_is_present_flag,
                            reserved_a: 0,
                            substream_count: layer_metadata.substream_count,
                            coupled_substream_count: layer_metadata.coupled_substream_count,
                            output_gain_flag: layer_metadata.output_gain_flag,
                            reserved_b: 0,
                            output_gain: layer_metadata.output_gain.unwrap_or_default(),
                        };
                    }
                }
            }
            AudioElementTypeMetadata::SceneBased => match (
                &self.ambisonics_mono,
                &self.ambisonics_projection,
            ) {
                (Some(mono), None) => {
                    obu.initialize_ambisonics_mono(mono.output_channel_count, mono.substream_count);
                    if let AudioElementConfig::AmbisonicsMono(config) = &mut obu.config {
                        config.channel_mapping = mono.channel_mapping.clone();
                    }
                }
                (None, Some(projection)) => {
                    obu.initialize_ambisonics_projection(
                        projection.output_channel_count,
                        projection.substream_count,
                        projection.coupled_substream_count,
                    );
                    if let AudioElementConfig::AmbisonicsProjection(config) = &mut obu.config {
                        config.demixing_matrix = projection.demixing_matrix.clone();
                    }
                }
                _ => bail!(
                    "scene-based audio element {} needs exactly one ambisonics config",
                    self.audio_element_id
                ),
            },
        }

        if let Some(demixing) = &self.demixing_param {
            obu.audio_element_params
                .push(ParamDefinitionVariant::Demixing(DemixingParamDefinition {
                    base: ParamDefinition {
                        parameter_id: demixing.parameter_id,
                        parameter_rate: demixing.parameter_rate,
                        param_definition_mode: false,
                        duration: demixing.duration,
                        constant_subblock_duration: demixing.duration,
                        ..Default::default()
                    },
                    default_demixing_info_parameter_data: DefaultDemixingInfoParameterData {
                        dmixp_mode: demixing.default_dmixp_mode.to_mode(),
                        default_w: demixing.default_w,
                        ..Default::default()
                    },
                }));
        }
        if let Some(recon_gain) = &self.recon_gain_param {
            obu.audio_element_params
                .push(ParamDefinitionVariant::ReconGain(ReconGainParamDefinition {
                    base: ParamDefinition {
                        parameter_id: recon_gain.parameter_id,
                        parameter_rate: recon_gain.parameter_rate,
                        param_definition_mode: false,
                        duration: recon_gain.duration,
                        constant_subblock_duration: recon_gain.duration,
                        ..Default::default()
                    },
                }));
        }

        obu.validate()?;
        Ok(obu)
    }
}

impl MixPresentationMetadata {
    fn build_obu(
        &self,
        audio_elements: &HashMap<u32, AudioElementWithData>,
    ) -> Result<MixPresentationObu> {
        let mut sub_mixes = Vec::new();
        for sub_mix_metadata in &self.sub_mixes {
            let mut elements = Vec::new();
            for element_metadata in &sub_mix_metadata.audio_elements {
                ensure!(
                    audio_elements.contains_key(&element_metadata.audio_element_id),
                    "mix presentation {} references unknown audio element {}",
                    self.mix_presentation_id,
                    element_metadata.audio_element_id
                );
                elements.push(SubMixAudioElement {
                    audio_element_id: element_metadata.audio_element_id,
                    localized_element_annotations: element_metadata
                        .localized_element_annotations
                        .clone(),
                    rendering_config: RenderingConfig {
                        headphones_rendering_mode: match element_metadata.headphones_rendering_mode
                        {
                            HeadphonesRenderingModeMetadata::Stereo => {
                                HeadphonesRenderingMode::Stereo
                            }
                            HeadphonesRenderingModeMetadata::Binaural => {
                                HeadphonesRenderingMode::Binaural
                            }
                        },
                        ..Default::default()
                    },
                    element_mix_gain: element_metadata.element_mix_gain.to_definition(),
                });
            }

            let mut layouts = Vec::new();
            for layout_metadata in &sub_mix_metadata.layouts {
                let loudness_layout = match &layout_metadata.sound_system {
                    Some(letter) => Layout::LoudspeakersSsConvention {
                        sound_system: sound_system_from_letter(letter)?,
                    },
                    None => Layout::Binaural,
                };
                layouts.push(MixPresentationLayout {
                    loudness_layout,
                    loudness: layout_metadata.loudness.to_loudness_info(),
                });
            }

            sub_mixes.push(MixPresentationSubMix {
                audio_elements: elements,
                output_mix_gain: sub_mix_metadata.output_mix_gain.to_definition(),
                layouts,
            });
        }

        let obu = MixPresentationObu::new(
            ObuHeader::new(ObuType::MixPresentation),
            self.mix_presentation_id,
            self.annotations_language.clone(),
            self.localized_presentation_annotations.clone(),
            sub_mixes,
        );
        obu.validate()?;
        Ok(obu)
    }
}

fn sound_system_from_letter(letter: &str) -> Result<SoundSystem> {
    Ok(match letter.to_ascii_lowercase().as_str() {
        "a" => SoundSystem::A0_2_0,
        "b" => SoundSystem::B0_5_0,
        "c" => SoundSystem::C2_5_0,
        "d" => SoundSystem::D4_5_0,
        "e" => SoundSystem::E4_5_1,
        "f" => SoundSystem::F3_7_0,
        "g" => SoundSystem::G4_9_0,
        "h" => SoundSystem::H9_10_3,
        "i" => SoundSystem::I0_7_0,
        "j" => SoundSystem::J4_7_0,
        other => bail!("unknown sound system {other:?}"),
    })
}

impl AudioFrameMetadata {
    fn validate(&self, audio_elements: &HashMap<u32, AudioElementWithData>) -> Result<()> {
        let element = audio_elements
            .get(&self.audio_element_id)
            .with_context(|| {
                format!(
                    "audio frame metadata references unknown audio element {}",
                    self.audio_element_id
                )
            })?;
        ensure!(
            self.channel_ids.len() == self.channel_labels.len(),
            "channel_ids and channel_labels differ in length for {}",
            self.wav_filename
        );

        let num_samples_per_frame = element.codec_config.num_samples_per_frame();
        ensure!(
            self.samples_to_trim_at_start + self.samples_to_trim_at_end <= num_samples_per_frame,
            "trims exceed one frame ({num_samples_per_frame} samples) for {}",
            self.wav_filename
        );
        Ok(())
    }
}

impl ParameterBlockMetadata {
    /// The serialization context for this block, synthesizing a mode-1
    /// context for stray parameter ids.
    pub fn per_id_metadata(
        &self,
        declared: &HashMap<u32, PerIdParameterMetadata>,
    ) -> PerIdParameterMetadata {
        declared.get(&self.parameter_id).cloned().unwrap_or_else(|| {
            let param_definition_type = match self.subblocks.first() {
                Some(subblock) if subblock.mix_gain.is_some() => PARAM_DEFINITION_TYPE_MIX_GAIN,
                Some(subblock) if subblock.dmixp_mode.is_some() => PARAM_DEFINITION_TYPE_DEMIXING,
                _ => PARAM_DEFINITION_TYPE_RECON_GAIN,
            };
            PerIdParameterMetadata {
                param_definition_type,
                param_definition: ParamDefinition {
                    parameter_id: self.parameter_id,
                    parameter_rate: default_sample_rate(),
                    param_definition_mode: true,
                    ..Default::default()
                },
            }
        })
    }
}
