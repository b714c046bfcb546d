use crate::{convert_to_grayscale, TrackerError};
use opencv::prelude::*;
use opencv::{core, dnn, imgproc};
use std::collections::BTreeMap;

/// Output order of the FER+ network.
pub const FER_PLUS_LABELS: [&str; 8] = [
    "neutral", "happy", "surprise", "sad", "angry", "disgust", "fear", "contempt",
];

const FER_PLUS_INPUT_SIZE: i32 = 64;

/// Classifies the emotion shown by a cropped color face region.
pub trait EmotionClassify {
    fn classify(&mut self, face: &Mat) -> anyhow::Result<Option<EmotionReading>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmotionReading {
    pub dominant: String,
    /// Percentages in [0, 100] keyed by emotion name.
    pub scores: BTreeMap<String, f32>,
}

impl EmotionReading {
    /// Picks the highest scoring emotion. Returns `None` for an empty distribution.
    pub fn from_scores(scores: BTreeMap<String, f32>) -> Option<Self> {
        let dominant = scores
            .iter()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(label, _)| label.clone())?;
        Some(Self { dominant, scores })
    }

    pub fn confidence(&self) -> f32 {
        self.scores.get(&self.dominant).copied().unwrap_or(0.0)
    }
}

/// Softmax over raw network logits, scaled to percentages.
pub fn logits_to_percentages(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|logit| (logit - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum == 0.0 || !sum.is_finite() {
        return vec![0.0; logits.len()];
    }
    exps.iter().map(|value| value / sum * 100.0).collect()
}

pub fn reading_from_logits(logits: &[f32]) -> Result<Option<EmotionReading>, TrackerError> {
    if logits.len() != FER_PLUS_LABELS.len() {
        return Err(TrackerError::UnexpectedModelOutput {
            expected: FER_PLUS_LABELS.len(),
            actual: logits.len(),
        });
    }
    let scores = FER_PLUS_LABELS
        .iter()
        .zip(logits_to_percentages(logits))
        .map(|(label, score)| (label.to_string(), score))
        .collect();
    Ok(EmotionReading::from_scores(scores))
}

/// FER+ emotion network run through OpenCV's dnn module.
pub struct FerPlusClassifier {
    net: dnn::Net,
}

impl FerPlusClassifier {
    pub fn new(model_path: &str) -> anyhow::Result<Self> {
        let net = dnn::read_net_from_onnx(model_path)?;
        log::info!("Loaded emotion model from {}", model_path);
        Ok(Self { net })
    }
}

impl EmotionClassify for FerPlusClassifier {
    fn classify(&mut self, face: &Mat) -> anyhow::Result<Option<EmotionReading>> {
        if face.rows() == 0 || face.cols() == 0 {
            return Ok(None);
        }
        let gray = convert_to_grayscale(face)?;
        let mut resized = Mat::default();
        imgproc::resize(
            &gray,
            &mut resized,
            core::Size::new(FER_PLUS_INPUT_SIZE, FER_PLUS_INPUT_SIZE),
            0.0,
            0.0,
            imgproc::INTER_AREA,
        )?;

        // network expects raw 0-255 intensities
        let blob = dnn::blob_from_image(
            &resized,
            1.0,
            core::Size::new(FER_PLUS_INPUT_SIZE, FER_PLUS_INPUT_SIZE),
            core::Scalar::default(),
            false,
            false,
            core::CV_32F,
        )?;
        self.net.set_input_def(&blob)?;
        let output = self.net.forward_single_def()?;
        let logits = output.data_typed::<f32>()?;

        Ok(reading_from_logits(logits)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn percentages_sum_to_one_hundred() {
        let percentages = logits_to_percentages(&[1.0, 2.0, 3.0, 0.5]);
        let sum: f32 = percentages.iter().sum();
        assert_relative_eq!(sum, 100.0, epsilon = 1e-3);
        assert!(percentages[2] > percentages[1]);
    }

    #[test]
    fn equal_logits_split_evenly() {
        let percentages = logits_to_percentages(&[0.0; 4]);
        for value in percentages {
            assert_relative_eq!(value, 25.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn large_logits_do_not_overflow() {
        let percentages = logits_to_percentages(&[1000.0, 999.0]);
        assert!(percentages.iter().all(|value| value.is_finite()));
        assert!(percentages[0] > percentages[1]);
    }

    #[test]
    fn dominant_is_highest_logit() {
        let logits = [0.1, 4.0, 0.2, 0.3, 0.0, -1.0, 0.5, 0.0];
        let reading = reading_from_logits(&logits).unwrap().unwrap();
        assert_eq!(reading.dominant, "happy");
        assert_eq!(reading.scores.len(), 8);
        assert!(reading.confidence() > 50.0);
    }

    #[test]
    fn wrong_output_width_is_rejected() {
        let error = reading_from_logits(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(
            error,
            TrackerError::UnexpectedModelOutput {
                expected: 8,
                actual: 2
            }
        ));
    }

    #[test]
    fn missing_dominant_score_reads_as_zero() {
        let reading = EmotionReading {
            dominant: "sad".to_owned(),
            scores: BTreeMap::new(),
        };
        assert_eq!(reading.confidence(), 0.0);
    }

    #[test]
    fn empty_distribution_has_no_reading() {
        assert!(EmotionReading::from_scores(BTreeMap::new()).is_none());
    }
}
