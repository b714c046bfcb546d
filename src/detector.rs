use crate::analysis::BoundingBox;
use crate::TrackerError;
use opencv::prelude::*;
use opencv::{core, objdetect};

pub const DEFAULT_CASCADE: &str = "haarcascades/haarcascade_frontalface_default.xml";

/// Detects faces in a grayscale image.
pub trait FaceDetect {
    fn detect(&mut self, grayscale: &Mat) -> anyhow::Result<Vec<BoundingBox>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    pub scale_factor: f64,
    pub min_neighbors: i32,
    pub min_face_size: i32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 5,
            min_face_size: 30,
        }
    }
}

pub struct FaceDetector {
    classifier: objdetect::CascadeClassifier,
    config: DetectorConfig,
}

impl FaceDetector {
    /// Loads the frontal face cascade bundled with OpenCV.
    pub fn new(config: DetectorConfig) -> anyhow::Result<Self> {
        let xml = core::find_file_def(DEFAULT_CASCADE)?;
        Self::from_file(&xml, config)
    }

    pub fn from_file(path: &str, config: DetectorConfig) -> anyhow::Result<Self> {
        let classifier = objdetect::CascadeClassifier::new(path)?;
        if classifier.empty()? {
            return Err(TrackerError::CascadeNotLoaded(path.to_owned()).into());
        }
        log::info!("Loaded face cascade from {}", path);
        Ok(Self { classifier, config })
    }
}

impl FaceDetect for FaceDetector {
    fn detect(&mut self, grayscale: &Mat) -> anyhow::Result<Vec<BoundingBox>> {
        let mut faces = core::Vector::<core::Rect>::new();

        self.classifier.detect_multi_scale(
            grayscale,
            &mut faces,
            self.config.scale_factor,
            self.config.min_neighbors,
            objdetect::CASCADE_SCALE_IMAGE,
            core::Size {
                width: self.config.min_face_size,
                height: self.config.min_face_size,
            },
            core::Size {
                width: 0,
                height: 0,
            },
        )?;
        Ok(faces.into_iter().map(BoundingBox::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_frontal_face_tuning() {
        let config = DetectorConfig::default();
        assert_eq!(config.scale_factor, 1.1);
        assert_eq!(config.min_neighbors, 5);
        assert_eq!(config.min_face_size, 30);
    }

    #[test]
    fn missing_cascade_file_is_an_error() {
        let result = FaceDetector::from_file("does/not/exist.xml", DetectorConfig::default());
        assert!(result.is_err());
    }
}
