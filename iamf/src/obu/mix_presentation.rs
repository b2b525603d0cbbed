//! Mix Presentation OBUs.
//!
//! A mix presentation names the renderable mixes of a program: localized
//! annotations, one or more sub mixes referencing audio elements with their
//! mix gains and rendering configs, and a loudness table per target layout.

use anyhow::{Result, bail};

use crate::obu::header::{ObuHeader, ObuType};
use crate::obu::param_definitions::MixGainParamDefinition;
use crate::obu::ObuBase;
use crate::utils::bit_buffer::WriteBitBuffer;
use crate::utils::errors::MixPresentationError;

/// `info_type` bit: a true peak field follows the digital peak.
pub const LOUDNESS_INFO_TYPE_TRUE_PEAK: u8 = 1;
/// `info_type` bit: an anchored loudness table is present.
pub const LOUDNESS_INFO_TYPE_ANCHORED_LOUDNESS: u8 = 2;
/// Any of these bits carries an opaque layout extension.
pub const LOUDNESS_INFO_TYPE_ANY_EXTENSION: u8 = 0b1111_1100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeadphonesRenderingMode {
    #[default]
    Stereo,
    Binaural,
    Reserved2,
    Reserved3,
}

impl HeadphonesRenderingMode {
    pub fn code(&self) -> u8 {
        match self {
            Self::Stereo => 0,
            Self::Binaural => 1,
            Self::Reserved2 => 2,
            Self::Reserved3 => 3,
        }
    }
}

/// ITU-2051-3 sound system (layouts "A" 0+2+0 through "J" 4+7+0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SoundSystem {
    #[default]
    A0_2_0,
    B0_5_0,
    C2_5_0,
    D4_5_0,
    E4_5_1,
    F3_7_0,
    G4_9_0,
    H9_10_3,
    I0_7_0,
    J4_7_0,
    Reserved(u8),
}

impl SoundSystem {
    pub fn code(&self) -> u8 {
        match self {
            Self::A0_2_0 => 0,
            Self::B0_5_0 => 1,
            Self::C2_5_0 => 2,
            Self::D4_5_0 => 3,
            Self::E4_5_1 => 4,
            Self::F3_7_0 => 5,
            Self::G4_9_0 => 6,
            Self::H9_10_3 => 7,
            Self::I0_7_0 => 8,
            Self::J4_7_0 => 9,
            Self::Reserved(code) => *code,
        }
    }
}

/// A playback layout a loudness entry was measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// `layout_type` 2: a loudspeaker sound system.
    LoudspeakersSsConvention { sound_system: SoundSystem },
    /// `layout_type` 3.
    Binaural,
    /// `layout_type` 0 or 1.
    Reserved { layout_type: u8 },
}

impl Layout {
    fn write(&self, wb: &mut WriteBitBuffer) -> Result<()> {
        match self {
            Self::LoudspeakersSsConvention { sound_system } => {
                wb.write_unsigned_literal(2, 2)?;
                wb.write_unsigned_literal(u32::from(sound_system.code()), 4)?;
                wb.write_unsigned_literal(0, 2)
            }
            Self::Binaural => {
                wb.write_unsigned_literal(3, 2)?;
                wb.write_unsigned_literal(0, 6)
            }
            Self::Reserved { layout_type } => {
                if *layout_type > 1 {
                    bail!(MixPresentationError::UnknownLayoutType(*layout_type));
                }
                wb.write_unsigned_literal(u32::from(*layout_type), 2)?;
                wb.write_unsigned_literal(0, 6)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorElement {
    Unknown,
    Dialogue,
    Album,
    Reserved(u8),
}

impl AnchorElement {
    pub fn code(&self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Dialogue => 1,
            Self::Album => 2,
            Self::Reserved(code) => *code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnchoredLoudness {
    pub anchor_elements: Vec<(AnchorElement, i16)>,
}

/// Loudness measurements for one layout, Q7.8 dB fields.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoudnessInfo {
    pub info_type: u8,
    pub integrated_loudness: i16,
    pub digital_peak: i16,
    /// Meaningful iff `info_type & LOUDNESS_INFO_TYPE_TRUE_PEAK`.
    pub true_peak: i16,
    /// Meaningful iff `info_type & LOUDNESS_INFO_TYPE_ANCHORED_LOUDNESS`.
    pub anchored_loudness: AnchoredLoudness,
    /// Meaningful iff any extension bit of `info_type` is set.
    pub layout_extension_bytes: Vec<u8>,
}

impl LoudnessInfo {
    pub fn write(&self, wb: &mut WriteBitBuffer) -> Result<()> {
        wb.write_unsigned_literal(u32::from(self.info_type), 8)?;
        wb.write_signed16(self.integrated_loudness)?;
        wb.write_signed16(self.digital_peak)?;
        if self.info_type & LOUDNESS_INFO_TYPE_TRUE_PEAK != 0 {
            wb.write_signed16(self.true_peak)?;
        }
        if self.info_type & LOUDNESS_INFO_TYPE_ANCHORED_LOUDNESS != 0 {
            wb.write_unsigned_literal(self.anchored_loudness.anchor_elements.len() as u32, 8)?;
            for (anchor_element, loudness) in &self.anchored_loudness.anchor_elements {
                wb.write_unsigned_literal(u32::from(anchor_element.code()), 8)?;
                wb.write_signed16(*loudness)?;
            }
        }
        if self.info_type & LOUDNESS_INFO_TYPE_ANY_EXTENSION != 0 {
            wb.write_uleb128(self.layout_extension_bytes.len() as u32)?;
            wb.write_bytes(&self.layout_extension_bytes)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenderingConfig {
    pub headphones_rendering_mode: HeadphonesRenderingMode,
    pub reserved: u8,
    pub rendering_config_extension_bytes: Vec<u8>,
}

impl RenderingConfig {
    fn write(&self, wb: &mut WriteBitBuffer) -> Result<()> {
        wb.write_unsigned_literal(u32::from(self.headphones_rendering_mode.code()), 2)?;
        wb.write_unsigned_literal(u32::from(self.reserved), 6)?;
        wb.write_uleb128(self.rendering_config_extension_bytes.len() as u32)?;
        wb.write_bytes(&self.rendering_config_extension_bytes)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubMixAudioElement {
    pub audio_element_id: u32,
    /// One localized label per declared annotation language.
    pub localized_element_annotations: Vec<String>,
    pub rendering_config: RenderingConfig,
    pub element_mix_gain: MixGainParamDefinition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MixPresentationLayout {
    pub loudness_layout: Layout,
    pub loudness: LoudnessInfo,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MixPresentationSubMix {
    pub audio_elements: Vec<SubMixAudioElement>,
    pub output_mix_gain: MixGainParamDefinition,
    pub layouts: Vec<MixPresentationLayout>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MixPresentationObu {
    pub header: ObuHeader,
    pub mix_presentation_id: u32,
    /// Annotation languages, e.g. `en-us`; every localized annotation list
    /// in the OBU carries exactly this many entries.
    pub annotations_language: Vec<String>,
    pub localized_presentation_annotations: Vec<String>,
    pub sub_mixes: Vec<MixPresentationSubMix>,
}

impl MixPresentationObu {
    pub fn new(
        mut header: ObuHeader,
        mix_presentation_id: u32,
        annotations_language: Vec<String>,
        localized_presentation_annotations: Vec<String>,
        sub_mixes: Vec<MixPresentationSubMix>,
    ) -> Self {
        header.obu_type = ObuType::MixPresentation;
        Self {
            header,
            mix_presentation_id,
            annotations_language,
            localized_presentation_annotations,
            sub_mixes,
        }
    }

    pub fn count_label(&self) -> u32 {
        self.annotations_language.len() as u32
    }

    pub fn validate(&self) -> Result<()> {
        let count_label = self.count_label();
        if self.localized_presentation_annotations.len() != count_label as usize {
            bail!(MixPresentationError::AnnotationCountMismatch {
                count_label,
                field: "localized_presentation_annotations",
                actual: self.localized_presentation_annotations.len(),
            });
        }
        if self.sub_mixes.is_empty() {
            bail!(MixPresentationError::NoSubMixes);
        }
        for sub_mix in &self.sub_mixes {
            for audio_element in &sub_mix.audio_elements {
                if audio_element.localized_element_annotations.len() != count_label as usize {
                    bail!(MixPresentationError::AnnotationCountMismatch {
                        count_label,
                        field: "localized_element_annotations",
                        actual: audio_element.localized_element_annotations.len(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl ObuBase for MixPresentationObu {
    fn header(&self) -> &ObuHeader {
        &self.header
    }

    fn validate_and_write_payload(&self, wb: &mut WriteBitBuffer) -> Result<()> {
        self.validate()?;

        wb.write_uleb128(self.mix_presentation_id)?;
        wb.write_uleb128(self.count_label())?;
        for language in &self.annotations_language {
            wb.write_string(language)?;
        }
        for annotation in &self.localized_presentation_annotations {
            wb.write_string(annotation)?;
        }

        wb.write_uleb128(self.sub_mixes.len() as u32)?;
        for sub_mix in &self.sub_mixes {
            wb.write_uleb128(sub_mix.audio_elements.len() as u32)?;
            for audio_element in &sub_mix.audio_elements {
                wb.write_uleb128(audio_element.audio_element_id)?;
                for annotation in &audio_element.localized_element_annotations {
                    wb.write_string(annotation)?;
                }
                audio_element.rendering_config.write(wb)?;
                audio_element.element_mix_gain.write(wb)?;
            }
            sub_mix.output_mix_gain.write(wb)?;

            wb.write_uleb128(sub_mix.layouts.len() as u32)?;
            for layout in &sub_mix.layouts {
                layout.loudness_layout.write(wb)?;
                layout.loudness.write(wb)?;
            }
        }
        Ok(())
    }
}
