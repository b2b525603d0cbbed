//! Error types shared across the crate.
//!
//! Each subsystem has its own error enum; every fallible operation surfaces
//! them through `anyhow::Result` without retrying. [`StatusKind`] groups the
//! enums into the coarse categories callers branch on.

/// Coarse classification of every error the crate can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    /// Malformed caller input: illegal sample rate, missing label, bad field value.
    InvalidArgument,
    /// Descriptor state is internally inconsistent.
    FailedPrecondition,
    /// Reading an OBU kind this build does not decode.
    Unimplemented,
    /// A buffer or variable-width integer ran out of room.
    ResourceExhausted,
    /// A value does not fit the declared field width.
    OutOfRange,
    /// The bitstream ended mid-OBU.
    DataLoss,
}

#[derive(thiserror::Error, Debug)]
pub enum LebError {
    #[error("ULEB128 continuation past {0} bytes")]
    ContinuationTooLong(usize),

    #[error("Decoded LEB128 does not fit in 32 bits")]
    DecodedValueTooWide,

    #[error("Value {value} does not fit in a {size}-byte LEB128")]
    FixedSizeOverflow { value: u64, size: usize },

    #[error("Fixed-size LEB128 length must be in [1, 8]. Got {0}")]
    InvalidFixedSize(usize),

    #[error("Unexpected end of buffer while reading LEB128")]
    UnexpectedEof,
}

impl LebError {
    pub fn kind(&self) -> StatusKind {
        match self {
            Self::ContinuationTooLong(_) | Self::FixedSizeOverflow { .. } => {
                StatusKind::ResourceExhausted
            }
            Self::DecodedValueTooWide => StatusKind::OutOfRange,
            Self::InvalidFixedSize(_) => StatusKind::InvalidArgument,
            Self::UnexpectedEof => StatusKind::DataLoss,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum BitBufferError {
    #[error("Cannot write {num_bits} bits of value {value:#X}: upper bits are set")]
    ValueTooWide { value: u64, num_bits: u32 },

    #[error("Bit width must be in [1, 64]. Got {0}")]
    InvalidBitWidth(u32),

    #[error("Buffer is not byte aligned (bit offset {0})")]
    NotByteAligned(u64),

    #[error("Unexpected end of buffer: wanted {wanted} bits, {available} remain")]
    UnexpectedEof { wanted: u64, available: u64 },

    #[error("String exceeds {0} bytes without a NUL terminator")]
    StringTooLong(usize),
}

impl BitBufferError {
    pub fn kind(&self) -> StatusKind {
        match self {
            Self::ValueTooWide { .. } => StatusKind::OutOfRange,
            Self::InvalidBitWidth(_) | Self::StringTooLong(_) => StatusKind::InvalidArgument,
            Self::NotByteAligned(_) => StatusKind::FailedPrecondition,
            Self::UnexpectedEof { .. } => StatusKind::DataLoss,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ObuError {
    #[error("obu_trimming_status_flag is only legal on audio frame OBUs. Got {0}")]
    TrimmingNotAllowed(&'static str),

    #[error("obu_redundant_copy is not legal for {0}")]
    RedundantCopyNotAllowed(&'static str),

    #[error("obu_size {0} exceeds the 32-bit maximum")]
    ObuSizeTooLarge(u64),

    #[error("OBU payload ran past obu_size: expected {expected} bytes, consumed {consumed}")]
    PayloadOverrun { expected: u64, consumed: u64 },

    #[error("Reading {0} OBUs is not implemented")]
    ReadUnimplemented(&'static str),

    #[error("obu_type implies substream id {implied}, the frame carries {actual}")]
    SubstreamIdMismatch { implied: u32, actual: u32 },

    #[error("Invalid ia_code. Read {0:#010X}, expected 0x69414D46")]
    InvalidIaCode(u32),

    #[error("Unknown primary_profile {0}")]
    UnknownProfile(u8),
}

impl ObuError {
    pub fn kind(&self) -> StatusKind {
        match self {
            Self::TrimmingNotAllowed(_)
            | Self::RedundantCopyNotAllowed(_)
            | Self::SubstreamIdMismatch { .. } => StatusKind::FailedPrecondition,
            Self::ObuSizeTooLarge(_) => StatusKind::ResourceExhausted,
            Self::PayloadOverrun { .. } => StatusKind::DataLoss,
            Self::ReadUnimplemented(_) => StatusKind::Unimplemented,
            Self::InvalidIaCode(_) | Self::UnknownProfile(_) => StatusKind::InvalidArgument,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum CodecConfigError {
    #[error("Unknown codec_id {0:#010X}")]
    UnknownCodecId(u32),

    #[error("num_samples_per_frame must be > 0")]
    ZeroSamplesPerFrame,

    #[error("Invalid LPCM sample_rate {0}")]
    InvalidLpcmSampleRate(u32),

    #[error("Invalid LPCM sample_size {0}")]
    InvalidLpcmSampleSize(u8),

    #[error("Invalid LPCM sample_format_flags {0}")]
    InvalidLpcmFormatFlags(u8),

    #[error("Opus decoder config version must be 1. Got {0}")]
    InvalidOpusVersion(u8),

    #[error("Reading the {0} decoder config is not implemented")]
    DecoderConfigReadUnimplemented(&'static str),

    #[error("No {0} encoder is linked into this build")]
    ExternalEncoderUnavailable(&'static str),

    #[error("decoder_config does not match codec_id {0}")]
    DecoderConfigMismatch(&'static str),

    #[error("FLAC decoder config must start with a STREAMINFO block")]
    FlacMissingStreamInfo,

    #[error("FLAC last_metadata_block_flag must be set on the final block only")]
    FlacBadLastBlockFlag,

    #[error("FLAC block size range [{min}, {max}] must pin num_samples_per_frame {expected}")]
    FlacBlockSizeMismatch { expected: u32, min: u16, max: u16 },

    #[error("Invalid AAC sampling frequency index {0}")]
    InvalidAacFrequencyIndex(u8),
}

impl CodecConfigError {
    pub fn kind(&self) -> StatusKind {
        match self {
            Self::DecoderConfigReadUnimplemented(_) | Self::ExternalEncoderUnavailable(_) => {
                StatusKind::Unimplemented
            }
            Self::FlacMissingStreamInfo
            | Self::FlacBadLastBlockFlag
            | Self::FlacBlockSizeMismatch { .. } => StatusKind::FailedPrecondition,
            _ => StatusKind::InvalidArgument,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum AudioElementError {
    #[error("num_substreams must be > 0")]
    NoSubstreams,

    #[error("num_layers must be in [1, 6]. Got {0}")]
    InvalidNumLayers(u8),

    #[error("Per-layer substream counts sum to {actual}, element declares {expected}")]
    LayerSubstreamCountMismatch { expected: u32, actual: u32 },

    #[error("Binaural layout requires exactly one layer")]
    BinauralRequiresOneLayer,

    #[error("Ambisonics channel count must be a square in [1, 225]. Got {0}")]
    InvalidAmbisonicsChannelCount(u32),

    #[error("Ambisonics substream_count {substreams} exceeds output_channel_count {channels}")]
    TooManyAmbisonicsSubstreams { substreams: u8, channels: u8 },

    #[error("channel_mapping entry {entry} is not below substream_count {substreams}")]
    ChannelMappingOutOfRange { entry: u8, substreams: u8 },

    #[error("Substream index {0} never appears in channel_mapping")]
    ChannelMappingMissingSubstream(u8),

    #[error("coupled_substream_count {coupled} exceeds substream_count {substreams}")]
    TooManyCoupledSubstreams { coupled: u8, substreams: u8 },

    #[error("demixing_matrix has {actual} entries, expected {expected}")]
    DemixingMatrixSizeMismatch { expected: usize, actual: usize },

    #[error("Duplicate param_definition_type {0} in audio element")]
    DuplicateParamDefinitionType(u32),

    #[error("Mix gain parameter definitions are not allowed in channel-based audio elements")]
    MixGainInChannelBasedElement,

    #[error("No valid ambisonics channel count >= {0}")]
    NoValidAmbisonicsChannelCount(u32),

    #[error("audio_element_type {0} does not match the element config variant")]
    ConfigTypeMismatch(u8),
}

impl AudioElementError {
    pub fn kind(&self) -> StatusKind {
        match self {
            Self::InvalidAmbisonicsChannelCount(_) | Self::NoValidAmbisonicsChannelCount(_) => {
                StatusKind::InvalidArgument
            }
            _ => StatusKind::FailedPrecondition,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum MixPresentationError {
    #[error("count_label is {count_label} but {field} has {actual} entries")]
    AnnotationCountMismatch {
        count_label: u32,
        field: &'static str,
        actual: usize,
    },

    #[error("A mix presentation requires at least one sub mix")]
    NoSubMixes,

    #[error("Unknown anchor_element {0}")]
    UnknownAnchorElement(u8),

    #[error("Unknown layout_type {0}")]
    UnknownLayoutType(u8),
}

impl MixPresentationError {
    pub fn kind(&self) -> StatusKind {
        match self {
            Self::AnnotationCountMismatch { .. } | Self::NoSubMixes => {
                StatusKind::FailedPrecondition
            }
            Self::UnknownAnchorElement(_) | Self::UnknownLayoutType(_) => {
                StatusKind::InvalidArgument
            }
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ParamError {
    #[error("parameter_rate must be > 0 for parameter_id {0}")]
    ZeroParameterRate(u32),

    #[error("dmixp_mode {0} is reserved")]
    ReservedDMixPMode(u8),

    #[error("w_idx {0} is outside [0, 10]")]
    WIdxOutOfRange(i32),

    #[error("Audio element {0} declares more than one demixing parameter definition")]
    MultipleDemixingDefinitions(u32),

    #[error(
        "Audio element {audio_element_id} expects demixing parameters at {expected}, \
         staged block starts at {staged}"
    )]
    DemixingSyncLost {
        audio_element_id: u32,
        expected: i64,
        staged: i64,
    },

    #[error("Expected next demixing timestamp {expected} for audio element {audio_element_id}, got {actual}")]
    UnexpectedUpdateTimestamp {
        audio_element_id: u32,
        expected: i64,
        actual: i64,
    },

    #[error("Parameter block for parameter_id {0} carries no demixing payload")]
    NotADemixingBlock(u32),

    #[error("Unknown animation_type {0}")]
    UnknownAnimationType(u32),

    #[error("{0} parameter definitions require param_definition_mode 0")]
    ParamDefinitionModeMustBeZero(&'static str),

    #[error("Subblock durations sum to {actual}, declared duration is {expected}")]
    SubblockDurationSumMismatch { expected: u32, actual: u32 },

    #[error("Subblock index {index} out of range: {num_subblocks} subblocks")]
    SubblockIndexOutOfRange { index: usize, num_subblocks: usize },
}

impl ParamError {
    pub fn kind(&self) -> StatusKind {
        match self {
            Self::ZeroParameterRate(_)
            | Self::ReservedDMixPMode(_)
            | Self::UnknownAnimationType(_)
            | Self::SubblockIndexOutOfRange { .. } => StatusKind::InvalidArgument,
            Self::WIdxOutOfRange(_) => StatusKind::OutOfRange,
            Self::MultipleDemixingDefinitions(_)
            | Self::NotADemixingBlock(_)
            | Self::ParamDefinitionModeMustBeZero(_)
            | Self::SubblockDurationSumMismatch { .. } => StatusKind::FailedPrecondition,
            Self::DemixingSyncLost { .. } | Self::UnexpectedUpdateTimestamp { .. } => {
                StatusKind::FailedPrecondition
            }
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum TimingError {
    #[error("Unknown substream_id {0}")]
    UnknownSubstreamId(u32),

    #[error("Unknown parameter_id {0}")]
    UnknownParameterId(u32),

    #[error("Duplicate substream_id {0} across audio elements")]
    DuplicateSubstreamId(u32),

    #[error("Parameter block for parameter_id {parameter_id} starts at {actual}, expected {expected}")]
    UnexpectedParameterBlockStart {
        parameter_id: u32,
        expected: i64,
        actual: i64,
    },

    #[error(
        "Parameter stream {parameter_id} [{param_start}, {param_end}) does not cover \
         substream {substream_id} [{frame_start}, {frame_end})"
    )]
    ParameterBlockDoesNotCoverAudioFrame {
        parameter_id: u32,
        param_start: i64,
        param_end: i64,
        substream_id: u32,
        frame_start: i64,
        frame_end: i64,
    },

    #[error("Stray parameter blocks require at least one codec config to derive a rate")]
    StrayParameterBlocksWithoutCodecConfig,
}

impl TimingError {
    pub fn kind(&self) -> StatusKind {
        match self {
            Self::UnknownSubstreamId(_) | Self::UnknownParameterId(_) => {
                StatusKind::InvalidArgument
            }
            Self::DuplicateSubstreamId(_) | Self::StrayParameterBlocksWithoutCodecConfig => {
                StatusKind::InvalidArgument
            }
            Self::UnexpectedParameterBlockStart { .. }
            | Self::ParameterBlockDoesNotCoverAudioFrame { .. } => StatusKind::FailedPrecondition,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("Label {0} is missing from the labeled frame")]
    MissingLabel(String),

    #[error("Label {label} has {actual} samples, expected {expected}")]
    LabelLengthMismatch {
        label: String,
        expected: usize,
        actual: usize,
    },

    #[error("Trimming {trim} samples from a {len}-sample frame is implausible")]
    ImplausibleTrim { trim: usize, len: usize },

    #[error("No channel order known for loudspeaker_layout {0}")]
    UnknownChannelOrder(u8),
}

impl RenderError {
    pub fn kind(&self) -> StatusKind {
        match self {
            Self::MissingLabel(_) | Self::UnknownChannelOrder(_) => StatusKind::InvalidArgument,
            Self::LabelLengthMismatch { .. } | Self::ImplausibleTrim { .. } => {
                StatusKind::FailedPrecondition
            }
        }
    }
}
