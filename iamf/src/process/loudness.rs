//! Loudness calculation seam.
//!
//! Real measurement backends plug in behind [`LoudnessCalculator`]; the
//! user-provided variant trusts the metadata and echoes it back.

use anyhow::Result;

use crate::obu::mix_presentation::LoudnessInfo;

pub trait LoudnessCalculator {
    /// Feeds one batch of rendered samples into the measurement.
    fn accumulate_loudness_for_samples(&mut self, samples: &[i32]) -> Result<()>;

    /// The loudness measured so far.
    fn query_loudness(&self) -> Result<LoudnessInfo>;
}

/// Ignores every accumulated sample and returns the user's loudness as is.
#[derive(Debug, Clone)]
pub struct UserProvidedLoudnessCalculator {
    loudness: LoudnessInfo,
}

impl UserProvidedLoudnessCalculator {
    pub fn new(loudness: LoudnessInfo) -> Self {
        Self { loudness }
    }
}

impl LoudnessCalculator for UserProvidedLoudnessCalculator {
    fn accumulate_loudness_for_samples(&mut self, _samples: &[i32]) -> Result<()> {
        Ok(())
    }

    fn query_loudness(&self) -> Result<LoudnessInfo> {
        Ok(self.loudness.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obu::mix_presentation::{
        AnchorElement, AnchoredLoudness, LOUDNESS_INFO_TYPE_ANCHORED_LOUDNESS,
        LOUDNESS_INFO_TYPE_TRUE_PEAK,
    };
    use anyhow::Result;

    fn user_loudness() -> LoudnessInfo {
        LoudnessInfo {
            info_type: LOUDNESS_INFO_TYPE_TRUE_PEAK | LOUDNESS_INFO_TYPE_ANCHORED_LOUDNESS,
            integrated_loudness: 100,
            digital_peak: 200,
            true_peak: 300,
            anchored_loudness: AnchoredLoudness {
                anchor_elements: vec![(AnchorElement::Dialogue, 400)],
            },
            ..Default::default()
        }
    }

    #[test]
    fn accumulate_always_succeeds() -> Result<()> {
        let mut calculator = UserProvidedLoudnessCalculator::new(user_loudness());
        calculator.accumulate_loudness_for_samples(&[1, 2, 3, 4])?;
        calculator.accumulate_loudness_for_samples(&[])?;
        calculator.accumulate_loudness_for_samples(&[i32::MAX])?;
        Ok(())
    }

    #[test]
    fn query_returns_the_input_verbatim() -> Result<()> {
        let mut calculator = UserProvidedLoudnessCalculator::new(user_loudness());
        calculator.accumulate_loudness_for_samples(&[1, 2, 3, 4])?;
        calculator.accumulate_loudness_for_samples(&[99999])?;
        assert_eq!(calculator.query_loudness()?, user_loudness());
        Ok(())
    }
}
