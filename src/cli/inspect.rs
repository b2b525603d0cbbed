//! The inspect command: walk an IAMF stream and report its OBUs.

use std::collections::BTreeMap;
use std::fs;

use anyhow::{Context, Result};
use log::{info, warn};

use iamf::obu::{read_obu, DecodedObu};
use iamf::utils::bit_buffer::ReadBitBuffer;
use iamf::utils::errors::{CodecConfigError, ObuError};

use crate::cli::command::InspectArgs;

pub fn cmd_inspect(args: &InspectArgs) -> Result<()> {
    let bytes =
        fs::read(&args.input).with_context(|| format!("reading {}", args.input.display()))?;
    let mut rb = ReadBitBuffer::from_slice(&bytes);

    let mut obu_count = 0usize;
    let mut undecoded: BTreeMap<&'static str, usize> = BTreeMap::new();

    while rb.available()? > 0 {
        let offset = rb.position()? / 8;
        match read_obu(&mut rb) {
            Ok(DecodedObu::TemporalDelimiter(_)) => {
                info!("{offset:>8}  Temporal Delimiter");
            }
            Ok(DecodedObu::IaSequenceHeader(obu)) => {
                info!(
                    "{offset:>8}  IA Sequence Header: primary_profile={}, additional_profile={}",
                    obu.primary_profile.code(),
                    obu.additional_profile.code()
                );
            }
            Ok(DecodedObu::CodecConfig(obu)) => {
                info!(
                    "{offset:>8}  Codec Config {}: codec={}, {} samples/frame, {} Hz out",
                    obu.codec_config_id,
                    obu.codec_config.codec_id.name(),
                    obu.num_samples_per_frame(),
                    obu.output_sample_rate()
                );
            }
            // The payload was consumed either way; keep walking on
            // unimplemented kinds.
            Err(err) => {
                if let Some(ObuError::ReadUnimplemented(name)) = err.downcast_ref::<ObuError>() {
                    info!("{offset:>8}  {name} (payload not decoded)");
                    *undecoded.entry(name).or_default() += 1;
                } else if let Some(CodecConfigError::DecoderConfigReadUnimplemented(codec)) =
                    err.downcast_ref::<CodecConfigError>()
                {
                    info!("{offset:>8}  Codec Config ({codec} decoder config not decoded)");
                    *undecoded.entry("Codec Config").or_default() += 1;
                } else {
                    return Err(err.context(format!("malformed OBU at byte {offset}")));
                }
            }
        }
        obu_count += 1;
    }

    info!("{obu_count} OBUs in {} bytes", bytes.len());
    for (name, count) in &undecoded {
        warn!("{count} {name} OBUs were skipped, not decoded");
    }
    Ok(())
}
