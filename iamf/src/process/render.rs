//! Sample arrangement for the passthrough renderer.
//!
//! Turns a labeled frame into `(time, channel)` samples for a named output
//! arrangement, honoring trims and falling back to demixed labels.

use std::collections::HashMap;

use anyhow::{Result, bail};

use crate::obu::audio_element::LoudspeakerLayout;
use crate::utils::errors::RenderError;

/// Prefix of labels reconstructed by the demixer, e.g. `D_R2` for `R2`.
pub const DEMIXED_LABEL_PREFIX: &str = "D_";

/// Per-label channel samples of one frame, with pending trims.
#[derive(Debug, Clone, Default)]
pub struct LabeledFrame {
    pub samples_to_trim_at_end: usize,
    pub samples_to_trim_at_start: usize,
    pub label_to_samples: HashMap<String, Vec<i32>>,
}

impl LabeledFrame {
    /// Finds samples for a label, or for its demixed counterpart.
    fn samples_for_label(&self, label: &str) -> Option<&Vec<i32>> {
        self.label_to_samples
            .get(label)
            .or_else(|| {
                self.label_to_samples
                    .get(&format!("{DEMIXED_LABEL_PREFIX}{label}"))
            })
    }
}

/// Arranges the frame's samples in `(time, channel)` axes.
///
/// Slots named by an empty label are zero filled. Samples covered by the
/// frame's trims are omitted. Labels missing from the frame (directly or via
/// their demixed counterpart) fail, as do labels of unequal length and trims
/// longer than the frame.
pub fn arrange_samples_to_render(
    labeled_frame: &LabeledFrame,
    ordered_labels: &[String],
) -> Result<Vec<Vec<i32>>> {
    let mut columns: Vec<Option<&Vec<i32>>> = Vec::with_capacity(ordered_labels.len());
    let mut num_samples: Option<usize> = None;

    for label in ordered_labels {
        if label.is_empty() {
            columns.push(None);
            continue;
        }
        let samples = labeled_frame
            .samples_for_label(label)
            .ok_or_else(|| RenderError::MissingLabel(label.clone()))?;

        match num_samples {
            None => num_samples = Some(samples.len()),
            Some(expected) if expected != samples.len() => {
                bail!(RenderError::LabelLengthMismatch {
                    label: label.clone(),
                    expected,
                    actual: samples.len(),
                });
            }
            Some(_) => {}
        }
        columns.push(Some(samples));
    }

    let num_samples = num_samples.unwrap_or(0);
    let trim = labeled_frame.samples_to_trim_at_start + labeled_frame.samples_to_trim_at_end;
    if trim > num_samples {
        bail!(RenderError::ImplausibleTrim {
            trim,
            len: num_samples,
        });
    }

    let start = labeled_frame.samples_to_trim_at_start;
    let end = num_samples - labeled_frame.samples_to_trim_at_end;
    let mut samples_to_render = Vec::with_capacity(end - start);
    for tick in start..end {
        samples_to_render.push(
            columns
                .iter()
                .map(|column| column.map_or(0, |samples| samples[tick]))
                .collect(),
        );
    }
    Ok(samples_to_render)
}

/// Input channel order of a scalable loudspeaker layout.
pub fn lookup_input_channel_order(layout: LoudspeakerLayout) -> Result<Vec<&'static str>> {
    let order: &[&'static str] = match layout {
        LoudspeakerLayout::Mono => &["M"],
        LoudspeakerLayout::Stereo | LoudspeakerLayout::Binaural => &["L2", "R2"],
        LoudspeakerLayout::Layout5_1 => &["L5", "R5", "C", "LFE", "Ls5", "Rs5"],
        LoudspeakerLayout::Layout5_1_2 => {
            &["L5", "R5", "C", "LFE", "Ls5", "Rs5", "Ltf2", "Rtf2"]
        }
        LoudspeakerLayout::Layout5_1_4 => &[
            "L5", "R5", "C", "LFE", "Ls5", "Rs5", "Ltf4", "Rtf4", "Ltb4", "Rtb4",
        ],
        LoudspeakerLayout::Layout7_1 => {
            &["L7", "R7", "C", "LFE", "Lss7", "Rss7", "Lrs7", "Rrs7"]
        }
        LoudspeakerLayout::Layout7_1_2 => &[
            "L7", "R7", "C", "LFE", "Lss7", "Rss7", "Lrs7", "Rrs7", "Ltf2", "Rtf2",
        ],
        LoudspeakerLayout::Layout7_1_4 => &[
            "L7", "R7", "C", "LFE", "Lss7", "Rss7", "Lrs7", "Rrs7", "Ltf4", "Rtf4", "Ltb4",
            "Rtb4",
        ],
        LoudspeakerLayout::Layout3_1_2 => &["L3", "R3", "C", "LFE", "Ltf3", "Rtf3"],
        LoudspeakerLayout::Reserved(code) => bail!(RenderError::UnknownChannelOrder(code)),
    };
    Ok(order.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn frame(entries: &[(&str, &[i32])]) -> LabeledFrame {
        LabeledFrame {
            label_to_samples: entries
                .iter()
                .map(|(label, samples)| (label.to_string(), samples.to_vec()))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn empty_frames_arrange_to_nothing() -> Result<()> {
        assert!(arrange_samples_to_render(&LabeledFrame::default(), &[])?.is_empty());
        Ok(())
    }

    #[test]
    fn samples_arrange_in_time_channel_axes() -> Result<()> {
        let frame = frame(&[("L2", &[0, 1, 2]), ("R2", &[10, 11, 12])]);
        let samples = arrange_samples_to_render(&frame, &labels(&["L2", "R2"]))?;
        assert_eq!(samples, vec![vec![0, 10], vec![1, 11], vec![2, 12]]);
        Ok(())
    }

    #[test]
    fn demixed_labels_substitute_for_missing_originals() -> Result<()> {
        let frame = frame(&[("M", &[75]), ("L2", &[50]), ("D_R2", &[100])]);
        let samples = arrange_samples_to_render(&frame, &labels(&["L2", "R2"]))?;
        assert_eq!(samples, vec![vec![50, 100]]);
        Ok(())
    }

    #[test]
    fn extra_labels_are_ignored() -> Result<()> {
        let frame = frame(&[("L2", &[0]), ("R2", &[10]), ("LFE", &[999])]);
        let samples = arrange_samples_to_render(&frame, &labels(&["L2", "R2"]))?;
        assert_eq!(samples, vec![vec![0, 10]]);
        Ok(())
    }

    #[test]
    fn empty_labels_become_silent_channels() -> Result<()> {
        let frame = frame(&[("A0", &[1, 2]), ("A2", &[201, 202]), ("A3", &[301, 302])]);
        let samples = arrange_samples_to_render(&frame, &labels(&["A0", "", "A2", "A3"]))?;
        assert_eq!(
            samples,
            vec![vec![1, 0, 201, 301], vec![2, 0, 202, 302]]
        );
        Ok(())
    }

    #[test]
    fn trimmed_samples_are_omitted() -> Result<()> {
        let mut frame = frame(&[("M", &[999, 100, 999, 999])]);
        frame.samples_to_trim_at_start = 1;
        frame.samples_to_trim_at_end = 2;
        let samples = arrange_samples_to_render(&frame, &labels(&["M"]))?;
        assert_eq!(samples, vec![vec![100]]);
        Ok(())
    }

    #[test]
    fn trimming_the_whole_frame_yields_empty_output() -> Result<()> {
        let mut frame = frame(&[("M", &[999, 999, 999, 999])]);
        frame.samples_to_trim_at_start = 4;
        let samples = arrange_samples_to_render(&frame, &labels(&["M"]))?;
        assert!(samples.is_empty());
        Ok(())
    }

    #[test]
    fn unequal_label_lengths_fail() {
        let frame = frame(&[("L2", &[0, 1]), ("R2", &[10])]);
        assert!(arrange_samples_to_render(&frame, &labels(&["L2", "R2"])).is_err());
    }

    #[test]
    fn over_trimming_fails() {
        let mut frame = frame(&[("L2", &[0, 1]), ("R2", &[10, 11])]);
        frame.samples_to_trim_at_start = 2;
        frame.samples_to_trim_at_end = 1;
        assert!(arrange_samples_to_render(&frame, &labels(&["L2", "R2"])).is_err());
    }

    #[test]
    fn missing_labels_fail() {
        let frame = frame(&[("L2", &[0]), ("R2", &[10])]);
        assert!(arrange_samples_to_render(&frame, &labels(&["M"])).is_err());
    }

    #[test]
    fn channel_orders_cover_the_scalable_layouts() -> Result<()> {
        assert_eq!(lookup_input_channel_order(LoudspeakerLayout::Mono)?, vec!["M"]);
        assert_eq!(
            lookup_input_channel_order(LoudspeakerLayout::Stereo)?,
            vec!["L2", "R2"]
        );
        assert_eq!(
            lookup_input_channel_order(LoudspeakerLayout::Layout7_1_4)?.len(),
            12
        );
        assert!(lookup_input_channel_order(LoudspeakerLayout::Reserved(15)).is_err());
        Ok(())
    }
}
