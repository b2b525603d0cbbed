//! Encoder-side model of IAMF (Immersive Audio Model and Formats)
//! bitstreams.
//!
//! ## Bitstream Organization
//!
//! **External Structure**: a sequence of typed Open Bitstream Units (OBUs)
//! behind a common header with LEB128-sized payloads.
//! **Internal Structure**: descriptor OBUs (IA Sequence Header, Codec
//! Config, Audio Element, Mix Presentation) followed by temporal units of
//! audio frames and parameter blocks.
//!
//! ## Quick Start
//!
//! Steps for producing a stream:
//!
//! 1. Build descriptor OBUs and validate them against each other
//! 2. Allocate timestamps through [`process::timing::GlobalTimingModule`]
//! 3. Resolve demixing state per frame with
//!    [`process::parameters::ParametersManager`]
//! 4. Emit bytes with [`process::assemble::ObuAssembler`]
//!
//! ```rust
//! use iamf::obu::codec_config::{CodecConfig, CodecConfigObu, CodecId};
//! use iamf::obu::decoder_config::lpcm::{LpcmDecoderConfig, LpcmFormatFlags};
//! use iamf::obu::decoder_config::DecoderConfig;
//! use iamf::obu::header::{ObuHeader, ObuType};
//! use iamf::obu::ObuBase;
//! use iamf::utils::bit_buffer::{LebGenerator, WriteBitBuffer};
//!
//! let obu = CodecConfigObu::new(
//!     ObuHeader::new(ObuType::CodecConfig),
//!     0,
//!     CodecConfig {
//!         codec_id: CodecId::Lpcm,
//!         num_samples_per_frame: 64,
//!         audio_roll_distance: 0,
//!         decoder_config: DecoderConfig::Lpcm(LpcmDecoderConfig {
//!             sample_format_flags: LpcmFormatFlags::BigEndian,
//!             sample_size: 16,
//!             sample_rate: 48000,
//!         }),
//!     },
//! )?;
//!
//! let mut wb = WriteBitBuffer::new(LebGenerator::default());
//! obu.validate_and_write(&mut wb)?;
//! let bytes = wb.into_bytes()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

/// OBU data structures and their serialization.
///
/// - **Header** ([`obu::header`]): the packed first byte, `obu_size`,
///   trimming and extension fields
/// - **Descriptors** ([`obu::codec_config`], [`obu::audio_element`],
///   [`obu::mix_presentation`]): the validated program graph
/// - **Per-frame carriers** ([`obu::audio_frame`], [`obu::parameter_block`],
///   [`obu::temporal_delimiter`]): temporal-unit contents
pub mod obu;

/// Encoder-side processing.
///
/// - **Timing** ([`process::timing`]): monotonic per-stream clocks
/// - **Parameters** ([`process::parameters`]): demixing state evolution
/// - **Assembly** ([`process::assemble`]): descriptor and temporal-unit
///   ordering
pub mod process;

/// Supporting infrastructure.
///
/// - **Bit I/O** ([`utils::bit_buffer`]): bit-level reading/writing and
///   LEB128 codecs
/// - **Errors** ([`utils::errors`]): typed error enums
pub mod utils;
