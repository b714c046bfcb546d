use crate::analysis::{AnalysisCache, BoundingBox};
use opencv::core::{Point, Rect, Scalar, Size};
use opencv::imgproc;
use opencv::prelude::*;

/// Horizontal padding added to the measured label text.
const LABEL_PADDING: i32 = 30;
const LABEL_VERTICAL_PADDING: i32 = 20;
/// Extra room between the label background's top edge and the text.
const LABEL_TOP_MARGIN: i32 = 15;
const TEXT_INSET: i32 = 10;
const TEXT_GAP: i32 = 10;
const TEXT_BASELINE_OFFSET: i32 = 10;

/// Font settings for one piece of label text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub font_face: i32,
    pub font_scale: f64,
    pub thickness: i32,
}

impl TextStyle {
    pub fn measure(&self, text: &str) -> anyhow::Result<Size> {
        let mut base_line = 0;
        let size = imgproc::get_text_size(
            text,
            self.font_face,
            self.font_scale,
            self.thickness,
            &mut base_line,
        )?;
        Ok(size)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OverlayStyle {
    pub box_color: Scalar,
    pub box_thickness: i32,
    pub background_color: Scalar,
    pub text_color: Scalar,
    pub emotion_text: TextStyle,
    pub confidence_text: TextStyle,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            box_color: Scalar::new(0.0, 0.0, 255.0, 0.0),
            box_thickness: 2,
            background_color: Scalar::new(0.0, 0.0, 0.0, 0.0),
            text_color: Scalar::new(255.0, 255.0, 255.0, 0.0),
            emotion_text: TextStyle {
                font_face: imgproc::FONT_HERSHEY_SIMPLEX,
                font_scale: 1.25,
                thickness: 3,
            },
            confidence_text: TextStyle {
                font_face: imgproc::FONT_HERSHEY_SIMPLEX,
                font_scale: 0.75,
                thickness: 2,
            },
        }
    }
}

/// "(94.6%)"
pub fn format_confidence(confidence: f32) -> String {
    format!("({:.1}%)", confidence)
}

/// Placement of the label background and its two strings above a face box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelLayout {
    pub background: Rect,
    pub emotion_origin: Point,
    pub confidence_origin: Point,
}

impl LabelLayout {
    /// Centers the background over the box. Its width never exceeds the box width.
    pub fn compute(bounding_box: BoundingBox, emotion_size: Size, confidence_size: Size) -> Self {
        let BoundingBox { x, y, width, .. } = bounding_box;

        let background_width =
            (emotion_size.width + confidence_size.width + LABEL_PADDING).min(width);
        let background_height =
            emotion_size.height.max(confidence_size.height) + LABEL_VERTICAL_PADDING;
        let center_x = x + width / 2;
        let start_x = center_x - background_width / 2;
        let top = y - background_height - LABEL_TOP_MARGIN;

        let text_y = y - TEXT_BASELINE_OFFSET;
        Self {
            background: Rect::new(start_x, top, background_width, y - top),
            emotion_origin: Point::new(start_x + TEXT_INSET, text_y),
            confidence_origin: Point::new(
                start_x + TEXT_INSET + emotion_size.width + TEXT_GAP,
                text_y,
            ),
        }
    }
}

/// Draws the cached face box and emotion label onto frames.
#[derive(Debug, Clone, Default)]
pub struct OverlayRenderer {
    style: OverlayStyle,
}

impl OverlayRenderer {
    pub fn new(style: OverlayStyle) -> Self {
        Self { style }
    }

    pub fn render(&self, frame: &mut Mat, cache: &AnalysisCache) -> anyhow::Result<()> {
        let Some(bounding_box) = cache.last_box() else {
            return Ok(());
        };
        self.draw_face_box(frame, bounding_box)?;

        if let Some(label) = cache.last_label() {
            let confidence = cache.last_confidence().unwrap_or(0.0);
            self.draw_emotion_label(frame, bounding_box, label, confidence)?;
        }
        Ok(())
    }

    fn draw_face_box(&self, frame: &mut Mat, bounding_box: BoundingBox) -> anyhow::Result<()> {
        imgproc::rectangle_points(
            frame,
            Point::new(bounding_box.x, bounding_box.y),
            Point::new(
                bounding_box.x + bounding_box.width,
                bounding_box.y + bounding_box.height,
            ),
            self.style.box_color,
            self.style.box_thickness,
            imgproc::LINE_8,
            0,
        )?;
        Ok(())
    }

    fn draw_emotion_label(
        &self,
        frame: &mut Mat,
        bounding_box: BoundingBox,
        label: &str,
        confidence: f32,
    ) -> anyhow::Result<()> {
        let emotion_text = label.to_uppercase();
        let confidence_text = format_confidence(confidence);

        let emotion_size = self.style.emotion_text.measure(&emotion_text)?;
        let confidence_size = self.style.confidence_text.measure(&confidence_text)?;
        let layout = LabelLayout::compute(bounding_box, emotion_size, confidence_size);

        imgproc::rectangle_points(
            frame,
            layout.background.tl(),
            layout.background.br(),
            self.style.background_color,
            imgproc::FILLED,
            imgproc::LINE_8,
            0,
        )?;

        for (text, origin, text_style) in [
            (&emotion_text, layout.emotion_origin, &self.style.emotion_text),
            (
                &confidence_text,
                layout.confidence_origin,
                &self.style.confidence_text,
            ),
        ] {
            imgproc::put_text(
                frame,
                text,
                origin,
                text_style.font_face,
                text_style.font_scale,
                self.style.text_color,
                text_style.thickness,
                imgproc::LINE_8,
                false,
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotion::EmotionReading;
    use crate::test_frames::{pixel, solid_frame};
    use opencv::core;
    use std::collections::BTreeMap;

    const RED: (u8, u8, u8) = (0, 0, 255);
    const GREY: (f64, f64, f64) = (128.0, 128.0, 128.0);

    fn cache_with(bounding_box: BoundingBox, label: Option<(&str, f32)>) -> AnalysisCache {
        let mut cache = AnalysisCache::new();
        let reading = label.and_then(|(label, confidence)| {
            EmotionReading::from_scores(BTreeMap::from([(label.to_owned(), confidence)]))
        });
        cache.record(bounding_box, reading.as_ref());
        cache
    }

    #[test]
    fn confidence_has_one_decimal_and_percent_sign() {
        assert_eq!(format_confidence(94.567), "(94.6%)");
        assert_eq!(format_confidence(0.0), "(0.0%)");
        assert_eq!(format_confidence(100.0), "(100.0%)");
    }

    #[test]
    fn wide_text_is_clamped_to_box_width() {
        let bounding_box = BoundingBox::new(100, 200, 80, 80);
        let layout = LabelLayout::compute(bounding_box, Size::new(150, 27), Size::new(90, 16));

        assert_eq!(layout.background.width, 80);
        assert_eq!(layout.background.x, 100);
        assert_eq!(layout.background.height, 27 + 20 + 15);
        assert_eq!(layout.background.y + layout.background.height, 200);
    }

    #[test]
    fn narrow_text_is_centered_over_box() {
        let bounding_box = BoundingBox::new(100, 200, 300, 300);
        let layout = LabelLayout::compute(bounding_box, Size::new(100, 27), Size::new(60, 16));

        // 100 + 60 + 30 = 190, centered on x = 250
        assert_eq!(layout.background.width, 190);
        assert_eq!(layout.background.x, 250 - 95);
        assert_eq!(layout.emotion_origin, Point::new(155 + 10, 190));
        assert_eq!(layout.confidence_origin, Point::new(155 + 10 + 100 + 10, 190));
    }

    #[test]
    fn background_never_wider_than_box() {
        for box_width in [0, 1, 17, 64, 150, 400] {
            for text_width in [0, 10, 120, 500] {
                let layout = LabelLayout::compute(
                    BoundingBox::new(50, 120, box_width, 60),
                    Size::new(text_width, 20),
                    Size::new(text_width / 2, 12),
                );
                assert!(layout.background.width <= box_width);
            }
        }
    }

    #[test]
    fn empty_cache_draws_nothing() {
        let mut frame = solid_frame(200, 200, GREY);
        let reference = solid_frame(200, 200, GREY);

        OverlayRenderer::default()
            .render(&mut frame, &AnalysisCache::new())
            .unwrap();

        let mut diff = Mat::default();
        core::absdiff(&frame, &reference, &mut diff).unwrap();
        let gray = crate::convert_to_grayscale(&diff).unwrap();
        assert_eq!(core::count_non_zero(&gray).unwrap(), 0);
    }

    #[test]
    fn box_without_label_draws_only_rectangle() {
        let mut frame = solid_frame(300, 300, GREY);
        let cache = cache_with(BoundingBox::new(100, 150, 80, 80), None);

        OverlayRenderer::default().render(&mut frame, &cache).unwrap();

        assert_eq!(pixel(&frame, 100, 190), RED);
        // label area above the box stays untouched
        assert_eq!(pixel(&frame, 140, 140), (128, 128, 128));
    }

    #[test]
    fn label_background_is_drawn_above_box() {
        let mut frame = solid_frame(400, 400, GREY);
        let cache = cache_with(BoundingBox::new(100, 200, 200, 150), Some(("happy", 94.567)));

        OverlayRenderer::default().render(&mut frame, &cache).unwrap();

        assert_eq!(pixel(&frame, 100, 275), RED);
        // left edge of the background sits inside the box span, just above it
        let style = OverlayStyle::default();
        let emotion_size = style.emotion_text.measure("HAPPY").unwrap();
        let confidence_size = style.confidence_text.measure("(94.6%)").unwrap();
        let layout = LabelLayout::compute(
            BoundingBox::new(100, 200, 200, 150),
            emotion_size,
            confidence_size,
        );
        assert_eq!(pixel(&frame, layout.background.x + 1, layout.background.y + 1), (0, 0, 0));
        assert_eq!(pixel(&frame, layout.background.x - 1, 195), (128, 128, 128));
    }
}
