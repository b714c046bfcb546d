pub mod analysis;
pub mod capture;
pub mod detector;
pub mod emotion;
pub mod overlay;

pub use analysis::{AnalysisCache, AnalysisOutcome, BoundingBox, FrameAnalyzer};
pub use capture::{run_capture_loop, CameraSource, FrameDisplay, FrameSource, LoopExit, LoopSummary, Window};
pub use detector::{DetectorConfig, FaceDetect, FaceDetector};
pub use emotion::{EmotionClassify, EmotionReading, FerPlusClassifier};
pub use overlay::{format_confidence, LabelLayout, OverlayRenderer, OverlayStyle};

use opencv::imgproc;
use opencv::prelude::*;
use thiserror::Error;

pub fn convert_to_grayscale(image: &Mat) -> anyhow::Result<Mat> {
    let mut gray: Mat = Mat::default();
    imgproc::cvt_color_def(image, &mut gray, imgproc::COLOR_BGR2GRAY)?;
    Ok(gray)
}

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Unable to open camera {0}")]
    CameraUnavailable(i32),
    #[error("Failed to load cascade classifier from {0}")]
    CascadeNotLoaded(String),
    #[error("Analysis interval must be at least 1")]
    InvalidInterval,
    #[error("Emotion model returned {actual} scores, expected {expected}")]
    UnexpectedModelOutput { expected: usize, actual: usize },
    #[error("OpenCV error {0:?}")]
    OpenCvError(#[from] opencv::Error),
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_frames::solid_frame;

    #[test]
    fn grayscale_has_single_channel() {
        let frame = solid_frame(40, 30, (10.0, 20.0, 30.0));
        let gray = convert_to_grayscale(&frame).unwrap();
        assert_eq!(gray.channels(), 1);
        assert_eq!(gray.cols(), 40);
        assert_eq!(gray.rows(), 30);
    }
}
