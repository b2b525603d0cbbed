//! The encode command: user metadata plus WAV audio in, an IAMF stream out.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result, bail, ensure};
use indicatif::{MultiProgress, ProgressBar};
use log::{debug, info};

use iamf::obu::audio_element::AudioElementConfig;
use iamf::obu::audio_frame::AudioFrameObu;
use iamf::obu::codec_config::{CodecConfigObu, CodecId};
use iamf::obu::decoder_config::DecoderConfig;
use iamf::obu::header::{ObuHeader, ObuType};
use iamf::obu::parameter_block::{
    MixGainParameterData, ParameterBlockObu, ParameterData, ParameterSubblock,
};
use iamf::process::assemble::ObuAssembler;
use iamf::process::codec::{external_codec_unavailable, new_lpcm_encoder, FrameEncoder};
use iamf::process::loudness::{LoudnessCalculator, UserProvidedLoudnessCalculator};
use iamf::process::parameters::ParametersManager;
use iamf::process::render::{arrange_samples_to_render, LabeledFrame};
use iamf::process::timing::GlobalTimingModule;
use iamf::process::{AudioFrameWithData, ParameterBlockWithData};

use crate::cli::command::EncodeArgs;
use crate::metadata::{ParameterBlockMetadata, UserMetadata};
use crate::wav::WAVReader;

/// Per-element encoding plan: input frames split across substreams.
struct ElementPlan {
    audio_element_id: u32,
    substream_ids: Vec<u32>,
    channels_per_substream: Vec<usize>,
    /// Frame-sized batches of `(time, channel)` samples, zero padded at end.
    frames: Vec<Vec<Vec<i32>>>,
    frame_duration: u32,
    samples_to_trim_at_start: u32,
    samples_to_trim_at_end: u32,
    encoder: Box<dyn FrameEncoder>,
    demixing_parameter_id: Option<u32>,
}

pub fn cmd_encode(args: &EncodeArgs, pb: Option<&MultiProgress>) -> Result<()> {
    let metadata_text = fs::read_to_string(&args.metadata)
        .with_context(|| format!("reading {}", args.metadata.display()))?;
    let user_metadata: UserMetadata =
        serde_json::from_str(&metadata_text).context("parsing user metadata")?;
    let mut program = user_metadata.build_program()?;

    let codec_configs_by_id: HashMap<u32, CodecConfigObu> = program
        .codec_configs
        .iter()
        .map(|codec_config| (codec_config.codec_config_id, codec_config.clone()))
        .collect();

    let mut timing = GlobalTimingModule::initialize(
        &program.audio_elements_with_data,
        &codec_configs_by_id,
        &program.param_definitions,
        &program.stray_parameter_ids,
    )?;
    let mut parameters_manager = ParametersManager::initialize(&program.audio_elements_with_data)?;

    // Allocate parameter block timestamps in metadata order; the timing
    // module holds each stream to its declared starts.
    let mut parameter_blocks = Vec::new();
    for block_metadata in &user_metadata.parameter_block_metadata {
        parameter_blocks.push(build_parameter_block(
            block_metadata,
            &program.per_id_metadata,
            &mut timing,
        )?);
    }

    // Queue demixing blocks for frame-locked staging.
    let mut demixing_queues: HashMap<u32, VecDeque<ParameterBlockWithData>> = HashMap::new();
    let mut parameter_coverage_end: HashMap<u32, i64> = HashMap::new();
    for block in &parameter_blocks {
        parameter_coverage_end.insert(block.obu.parameter_id, block.end_timestamp);
        if block.obu.demixing_info().is_ok() {
            demixing_queues
                .entry(block.obu.parameter_id)
                .or_default()
                .push_back(block.clone());
        }
    }

    let wav_dir = args
        .input_wav_dir
        .clone()
        .or_else(|| args.metadata.parent().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));

    let mut element_plans = Vec::new();
    for frame_metadata in &user_metadata.audio_frame_metadata {
        let element = program
            .audio_elements_with_data
            .get(&frame_metadata.audio_element_id)
            .with_context(|| {
                format!("unknown audio element {}", frame_metadata.audio_element_id)
            })?;
        element_plans.push(load_element_plan(frame_metadata, element, &wav_dir)?);
    }

    let max_frame_count = element_plans
        .iter()
        .map(|plan| plan.frames.len())
        .max()
        .unwrap_or(0);
    let progress = pb.map(|multi| multi.add(ProgressBar::new(max_frame_count as u64)));

    // Temporal phase: advance every element one frame per pass so elements
    // sharing a demixing parameter stream stay in lockstep.
    let mut audio_frames = Vec::new();
    for frame_index in 0..max_frame_count {
        for plan in &mut element_plans {
            if frame_index >= plan.frames.len() {
                continue;
            }
            let frame_start = frame_index as i64 * i64::from(plan.frame_duration);

            if let Some(parameter_id) = plan.demixing_parameter_id {
                if let Some(queue) = demixing_queues.get_mut(&parameter_id) {
                    // Only one block is staged at a time; the manager must
                    // not look past it.
                    if queue
                        .front()
                        .is_some_and(|block| block.start_timestamp == frame_start)
                    {
                        if let Some(block) = queue.pop_front() {
                            parameters_manager.add_demixing_parameter_block(&block)?;
                        }
                    }
                }
                let down_mixing_params =
                    parameters_manager.get_down_mixing_parameters(plan.audio_element_id)?;
                debug!(
                    "element {} frame {}: w_idx={} w={:.4}",
                    plan.audio_element_id,
                    frame_index,
                    down_mixing_params.w_idx_used,
                    down_mixing_params.w
                );
            }

            encode_element_frame(plan, frame_index, &mut timing, &mut audio_frames)?;

            if plan.demixing_parameter_id.is_some() {
                parameters_manager.update_demixing_state(plan.audio_element_id, frame_start)?;
            }
        }
        if let Some(progress) = &progress {
            progress.inc(1);
        }
    }
    if let Some(progress) = &progress {
        progress.finish_and_clear();
    }

    // Substreams must be covered by the parameter streams that were
    // actually supplied; defaults-only elements carry no blocks to check.
    for plan in &element_plans {
        if let Some(parameter_id) = plan.demixing_parameter_id {
            if let Some(&coverage_end) = parameter_coverage_end.get(&parameter_id) {
                for &substream_id in &plan.substream_ids {
                    timing.validate_parameter_block_covers_audio_frame(
                        parameter_id,
                        0,
                        coverage_end,
                        substream_id,
                    )?;
                }
            }
        }
    }

    finalize_loudness(&mut program.mix_presentations, &element_plans)?;

    let assembler = ObuAssembler::new(program.leb_generator);
    let bytes = assembler.assemble(
        &program.ia_sequence_header,
        &program.codec_configs,
        &program.audio_elements,
        &program.mix_presentations,
        &audio_frames,
        &parameter_blocks,
        &program.arbitrary_obus,
    )?;

    fs::write(&args.output, &bytes)
        .with_context(|| format!("writing {}", args.output.display()))?;
    info!(
        "Wrote {} bytes: {} audio frames, {} parameter blocks, {} audio elements",
        bytes.len(),
        audio_frames.len(),
        parameter_blocks.len(),
        program.audio_elements.len()
    );
    Ok(())
}

/// How many input channels each substream carries: coupled substreams take
/// two, the rest one.
fn channels_per_substream(config: &AudioElementConfig) -> Vec<usize> {
    match config {
        AudioElementConfig::ScalableChannelLayout(config) => config
            .channel_audio_layer_configs
            .iter()
            .flat_map(|layer| {
                let coupled = usize::from(layer.coupled_substream_count);
                let total = usize::from(layer.substream_count);
                std::iter::repeat(2)
                    .take(coupled)
                    .chain(std::iter::repeat(1).take(total - coupled))
            })
            .collect(),
        AudioElementConfig::AmbisonicsMono(config) => {
            vec![1; usize::from(config.substream_count)]
        }
        AudioElementConfig::AmbisonicsProjection(config) => {
            let coupled = usize::from(config.coupled_substream_count);
            let total = usize::from(config.substream_count);
            std::iter::repeat(2)
                .take(coupled)
                .chain(std::iter::repeat(1).take(total - coupled))
                .collect()
        }
        AudioElementConfig::Extension(_) => Vec::new(),
    }
}

fn load_element_plan(
    frame_metadata: &crate::metadata::AudioFrameMetadata,
    element: &iamf::process::AudioElementWithData,
    wav_dir: &std::path::Path,
) -> Result<ElementPlan> {
    let codec_config = &element.codec_config;
    let decoder_config = &codec_config.codec_config.decoder_config;
    let encoder = match (&codec_config.codec_config.codec_id, decoder_config) {
        (CodecId::Lpcm, DecoderConfig::Lpcm(lpcm)) => new_lpcm_encoder(lpcm)?,
        (codec_id, _) => return Err(external_codec_unavailable(codec_id.name())),
    };

    let channels = channels_per_substream(&element.obu.config);
    let total_channels: usize = channels.iter().sum();
    ensure!(
        total_channels == frame_metadata.channel_labels.len(),
        "audio element {} expects {} channels, metadata labels {}",
        element.obu.audio_element_id,
        total_channels,
        frame_metadata.channel_labels.len()
    );

    let wav_path = wav_dir.join(&frame_metadata.wav_filename);
    let mut reader = WAVReader::new(
        File::open(&wav_path).with_context(|| format!("opening {}", wav_path.display()))?,
    )?;
    ensure!(
        reader.sample_rate() == codec_config.input_sample_rate(),
        "{} has sample rate {}, codec config expects {}",
        frame_metadata.wav_filename,
        reader.sample_rate(),
        codec_config.input_sample_rate()
    );
    for &channel_id in &frame_metadata.channel_ids {
        ensure!(
            channel_id < u32::from(reader.num_channels()),
            "{} has no channel {}",
            frame_metadata.wav_filename,
            channel_id
        );
    }

    let num_samples_per_frame = codec_config.num_samples_per_frame() as usize;
    let mut frames = Vec::new();
    let mut padded_samples = 0u32;
    loop {
        let wav_frames = reader.read_frames(num_samples_per_frame)?;
        if wav_frames.is_empty() {
            break;
        }

        // Route WAV channels to labels, then arrange in label order.
        let mut labeled_frame = LabeledFrame::default();
        for (label, &channel_id) in frame_metadata
            .channel_labels
            .iter()
            .zip(&frame_metadata.channel_ids)
        {
            labeled_frame.label_to_samples.insert(
                label.clone(),
                wav_frames
                    .iter()
                    .map(|frame| frame[channel_id as usize])
                    .collect(),
            );
        }
        let mut arranged =
            arrange_samples_to_render(&labeled_frame, &frame_metadata.channel_labels)?;

        if arranged.len() < num_samples_per_frame {
            padded_samples = (num_samples_per_frame - arranged.len()) as u32;
            arranged.resize(num_samples_per_frame, vec![0; total_channels]);
        }
        frames.push(arranged);
    }
    ensure!(
        !frames.is_empty(),
        "{} holds no samples",
        frame_metadata.wav_filename
    );

    Ok(ElementPlan {
        audio_element_id: element.obu.audio_element_id,
        substream_ids: element.obu.audio_substream_ids.clone(),
        channels_per_substream: channels,
        frames,
        frame_duration: codec_config.num_samples_per_frame(),
        samples_to_trim_at_start: frame_metadata.samples_to_trim_at_start,
        samples_to_trim_at_end: frame_metadata.samples_to_trim_at_end + padded_samples,
        encoder,
        demixing_parameter_id: element.obu.audio_element_params.iter().find_map(|param| {
            match param {
                iamf::obu::param_definitions::ParamDefinitionVariant::Demixing(definition) => {
                    Some(definition.base.parameter_id)
                }
                _ => None,
            }
        }),
    })
}

fn encode_element_frame(
    plan: &mut ElementPlan,
    frame_index: usize,
    timing: &mut GlobalTimingModule,
    audio_frames: &mut Vec<AudioFrameWithData>,
) -> Result<()> {
    let is_first = frame_index == 0;
    let is_last = frame_index + 1 == plan.frames.len();
    let frame = &plan.frames[frame_index];

    let mut channel_offset = 0;
    for (&substream_id, &num_channels) in
        plan.substream_ids.iter().zip(&plan.channels_per_substream)
    {
        let substream_samples: Vec<Vec<i32>> = frame
            .iter()
            .map(|tick| tick[channel_offset..channel_offset + num_channels].to_vec())
            .collect();
        channel_offset += num_channels;

        let coded_frame = plan.encoder.encode_frame(&substream_samples)?;

        let mut header = ObuHeader::new(ObuType::AudioFrame);
        let trim_at_start = if is_first { plan.samples_to_trim_at_start } else { 0 };
        let trim_at_end = if is_last { plan.samples_to_trim_at_end } else { 0 };
        if trim_at_start > 0 || trim_at_end > 0 {
            header.obu_trimming_status_flag = true;
            header.num_samples_to_trim_at_start = trim_at_start;
            header.num_samples_to_trim_at_end = trim_at_end;
        }

        let (start_timestamp, end_timestamp) =
            timing.get_next_audio_frame_timestamps(substream_id, plan.frame_duration)?;
        audio_frames.push(AudioFrameWithData {
            obu: AudioFrameObu::new(header, substream_id, coded_frame),
            start_timestamp,
            end_timestamp,
            audio_element_id: plan.audio_element_id,
        });
    }
    Ok(())
}

fn build_parameter_block(
    block_metadata: &ParameterBlockMetadata,
    per_id_metadata: &HashMap<u32, iamf::obu::parameter_block::PerIdParameterMetadata>,
    timing: &mut GlobalTimingModule,
) -> Result<ParameterBlockWithData> {
    let metadata = block_metadata.per_id_metadata(per_id_metadata);

    let mut subblocks = Vec::new();
    for subblock_metadata in &block_metadata.subblocks {
        let param_data = match (subblock_metadata.dmixp_mode, subblock_metadata.mix_gain) {
            (Some(dmixp_mode), None) => ParameterData::Demixing(
                iamf::obu::demixing_info::DemixingInfoParameterData {
                    dmixp_mode: dmixp_mode.to_mode(),
                    reserved: 0,
                },
            ),
            (None, Some(mix_gain)) => ParameterData::MixGain(MixGainParameterData::Step {
                start_point_value: mix_gain,
            }),
            _ => bail!(
                "parameter block for id {} needs exactly one payload per subblock",
                block_metadata.parameter_id
            ),
        };
        subblocks.push(ParameterSubblock {
            subblock_duration: if block_metadata.constant_subblock_duration == 0 {
                subblock_metadata.subblock_duration
            } else {
                block_metadata.constant_subblock_duration
            },
            param_data,
        });
    }

    let (start_timestamp, end_timestamp) = timing.get_next_parameter_block_timestamps(
        block_metadata.parameter_id,
        block_metadata.start_timestamp,
        block_metadata.duration,
    )?;

    Ok(ParameterBlockWithData {
        obu: ParameterBlockObu::new(
            ObuHeader::new(ObuType::ParameterBlock),
            block_metadata.parameter_id,
            block_metadata.duration,
            block_metadata.constant_subblock_duration,
            subblocks,
            metadata,
        )?,
        start_timestamp,
        end_timestamp,
    })
}

/// Runs every mix's loudness through the user-provided calculator, which
/// ignores the rendered samples and echoes the metadata loudness back.
fn finalize_loudness(
    mix_presentations: &mut [iamf::obu::mix_presentation::MixPresentationObu],
    element_plans: &[ElementPlan],
) -> Result<()> {
    for mix_presentation in mix_presentations.iter_mut() {
        for sub_mix in &mut mix_presentation.sub_mixes {
            let rendered_element_ids: Vec<u32> = sub_mix
                .audio_elements
                .iter()
                .map(|audio_element| audio_element.audio_element_id)
                .collect();
            for layout in &mut sub_mix.layouts {
                let mut calculator =
                    UserProvidedLoudnessCalculator::new(layout.loudness.clone());
                for plan in element_plans
                    .iter()
                    .filter(|plan| rendered_element_ids.contains(&plan.audio_element_id))
                {
                    for frame in &plan.frames {
                        for tick in frame {
                            calculator.accumulate_loudness_for_samples(tick)?;
                        }
                    }
                }
                layout.loudness = calculator.query_loudness()?;
            }
        }
    }
    Ok(())
}
