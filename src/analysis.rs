use crate::detector::FaceDetect;
use crate::emotion::{EmotionClassify, EmotionReading};
use crate::{convert_to_grayscale, TrackerError};
use opencv::core;
use opencv::prelude::*;

pub const DEFAULT_ANALYSIS_INTERVAL: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Intersection with a `frame_width` x `frame_height` image, `None` when they don't overlap.
    pub fn clamp_to(&self, frame_width: i32, frame_height: i32) -> Option<BoundingBox> {
        let left = self.x.max(0);
        let top = self.y.max(0);
        let right = (self.x + self.width).min(frame_width);
        let bottom = (self.y + self.height).min(frame_height);
        if right <= left || bottom <= top {
            return None;
        }
        Some(BoundingBox::new(left, top, right - left, bottom - top))
    }
}

impl From<core::Rect> for BoundingBox {
    fn from(rect: core::Rect) -> Self {
        Self::new(rect.x, rect.y, rect.width, rect.height)
    }
}

impl From<BoundingBox> for core::Rect {
    fn from(bounding_box: BoundingBox) -> Self {
        core::Rect::new(
            bounding_box.x,
            bounding_box.y,
            bounding_box.width,
            bounding_box.height,
        )
    }
}

/// Latest analysis result, carried across frames until the next analysis frame replaces it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisCache {
    frame_index: u64,
    last_box: Option<BoundingBox>,
    last_label: Option<String>,
    last_confidence: Option<f32>,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn last_box(&self) -> Option<BoundingBox> {
        self.last_box
    }

    /// Only ever set after a box, so a label never exists without one.
    pub fn last_label(&self) -> Option<&str> {
        self.last_label.as_deref()
    }

    pub fn last_confidence(&self) -> Option<f32> {
        self.last_confidence
    }

    /// Stores a detected face. Without a reading the previous label is kept.
    pub fn record(&mut self, bounding_box: BoundingBox, reading: Option<&EmotionReading>) {
        self.last_box = Some(bounding_box);
        if let Some(reading) = reading {
            self.last_label = Some(reading.dominant.clone());
            self.last_confidence = Some(reading.confidence());
        }
    }

    fn advance(&mut self) -> u64 {
        let index = self.frame_index;
        self.frame_index += 1;
        index
    }
}

#[derive(Debug)]
pub enum AnalysisOutcome {
    /// Not an analysis frame.
    Skipped,
    NoFace,
    Detected {
        bounding_box: BoundingBox,
        reading: Option<EmotionReading>,
    },
    Failed(anyhow::Error),
}

impl AnalysisOutcome {
    pub fn ran(&self) -> bool {
        !matches!(self, AnalysisOutcome::Skipped)
    }
}

/// Runs detection and classification on every `interval`-th frame.
pub struct FrameAnalyzer<D, C> {
    detector: D,
    classifier: C,
    interval: u64,
}

impl<D: FaceDetect, C: EmotionClassify> FrameAnalyzer<D, C> {
    pub fn new(detector: D, classifier: C, interval: u64) -> Result<Self, TrackerError> {
        if interval == 0 {
            return Err(TrackerError::InvalidInterval);
        }
        Ok(Self {
            detector,
            classifier,
            interval,
        })
    }

    pub fn is_analysis_frame(&self, frame_index: u64) -> bool {
        frame_index % self.interval == 0
    }

    pub fn analyze(&mut self, frame: &Mat, cache: &mut AnalysisCache) -> AnalysisOutcome {
        let frame_index = cache.advance();
        if !self.is_analysis_frame(frame_index) {
            return AnalysisOutcome::Skipped;
        }

        match self.detect_and_classify(frame) {
            Ok(Some((bounding_box, reading))) => {
                log::debug!(
                    "Frame {}: face at {:?}, emotion {:?}",
                    frame_index,
                    bounding_box,
                    reading.as_ref().map(|reading| &reading.dominant)
                );
                cache.record(bounding_box, reading.as_ref());
                AnalysisOutcome::Detected {
                    bounding_box,
                    reading,
                }
            }
            Ok(None) => {
                log::debug!("Frame {}: no face", frame_index);
                AnalysisOutcome::NoFace
            }
            Err(error) => {
                log::error!("Error during emotion analysis: {:?}", error);
                AnalysisOutcome::Failed(error)
            }
        }
    }

    fn detect_and_classify(
        &mut self,
        frame: &Mat,
    ) -> anyhow::Result<Option<(BoundingBox, Option<EmotionReading>)>> {
        let frame_grayscale = convert_to_grayscale(frame)?;
        let faces = self.detector.detect(&frame_grayscale)?;

        let Some(&bounding_box) = faces.first() else {
            return Ok(None);
        };

        let reading = match bounding_box.clamp_to(frame.cols(), frame.rows()) {
            Some(region) => {
                let mut face_region = Mat::default();
                Mat::roi(frame, region.into())?.copy_to(&mut face_region)?;
                self.classifier.classify(&face_region)?
            }
            None => None,
        };
        Ok(Some((bounding_box, reading)))
    }
}
