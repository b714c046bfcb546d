use crate::analysis::{AnalysisCache, FrameAnalyzer};
use crate::detector::FaceDetect;
use crate::emotion::EmotionClassify;
use crate::overlay::OverlayRenderer;
use crate::TrackerError;
use opencv::prelude::*;
use opencv::{highgui, videoio};

/// Delay passed to `wait_key` while polling for the quit key.
const KEY_POLL_DELAY_MS: i32 = 1;

pub trait FrameSource {
    /// `Ok(None)` when the source has no frame to give.
    fn next_frame(&mut self) -> anyhow::Result<Option<Mat>>;
    fn release(&mut self) -> anyhow::Result<()>;
}

pub trait FrameDisplay {
    fn show(&mut self, frame: &Mat) -> anyhow::Result<()>;
    /// Polls user input once.
    fn stop_requested(&mut self) -> anyhow::Result<bool>;
    fn close(&mut self) -> anyhow::Result<()>;
}

pub struct CameraSource {
    capture: videoio::VideoCapture,
}

impl CameraSource {
    pub fn new(index: i32) -> anyhow::Result<Self> {
        let capture = videoio::VideoCapture::new(index, videoio::CAP_ANY)?;
        let opened = videoio::VideoCapture::is_opened(&capture)?;
        if !opened {
            return Err(TrackerError::CameraUnavailable(index).into());
        }
        log::info!("Opened camera {}", index);
        Ok(Self { capture })
    }
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> anyhow::Result<Option<Mat>> {
        let mut frame = Mat::default();
        let grabbed = self.capture.read(&mut frame)?;
        if !grabbed || frame.size()?.width == 0 {
            return Ok(None);
        }
        Ok(Some(frame))
    }

    fn release(&mut self) -> anyhow::Result<()> {
        self.capture.release()?;
        Ok(())
    }
}

/// A highgui window that closes the session when `quit_key` is pressed.
pub struct Window {
    name: String,
    quit_key: char,
}

impl Window {
    pub fn new(name: &str, quit_key: char) -> anyhow::Result<Self> {
        highgui::named_window_def(name)?;
        Ok(Self {
            name: name.to_owned(),
            quit_key,
        })
    }

    /// Blocks until any key is pressed.
    pub fn wait_for_any_key(&self) -> anyhow::Result<()> {
        highgui::wait_key(0)?;
        Ok(())
    }
}

impl FrameDisplay for Window {
    fn show(&mut self, frame: &Mat) -> anyhow::Result<()> {
        highgui::imshow(&self.name, frame)?;
        Ok(())
    }

    fn stop_requested(&mut self) -> anyhow::Result<bool> {
        let key = highgui::wait_key(KEY_POLL_DELAY_MS)?;
        Ok(is_key(key, self.quit_key))
    }

    fn close(&mut self) -> anyhow::Result<()> {
        highgui::destroy_window(&self.name)?;
        Ok(())
    }
}

/// `wait_key` returns -1 when nothing was pressed and may carry modifier bits above the low byte.
pub fn is_key(key_code: i32, key: char) -> bool {
    key_code >= 0 && (key_code & 0xFF) as u32 == key as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    StopRequested,
    /// The source returned no frame.
    SourceExhausted,
    /// The source returned an error.
    ReadFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSummary {
    /// Frames displayed.
    pub frames: u64,
    pub exit: LoopExit,
}

/// Read, analyze, render and display frames until the source runs dry or the user asks to stop.
///
/// `source` and `display` are released exactly once whichever way the loop ends.
pub fn run_capture_loop<S, W, D, C>(
    source: &mut S,
    display: &mut W,
    analyzer: &mut FrameAnalyzer<D, C>,
    renderer: &OverlayRenderer,
    cache: &mut AnalysisCache,
) -> anyhow::Result<LoopSummary>
where
    S: FrameSource,
    W: FrameDisplay,
    D: FaceDetect,
    C: EmotionClassify,
{
    let result = frame_loop(source, display, analyzer, renderer, cache);

    let released = source.release();
    let closed = display.close();

    let summary = result?;
    released?;
    closed?;
    log::info!(
        "Capture loop finished after {} frames: {:?}",
        summary.frames,
        summary.exit
    );
    Ok(summary)
}

fn frame_loop<S, W, D, C>(
    source: &mut S,
    display: &mut W,
    analyzer: &mut FrameAnalyzer<D, C>,
    renderer: &OverlayRenderer,
    cache: &mut AnalysisCache,
) -> anyhow::Result<LoopSummary>
where
    S: FrameSource,
    W: FrameDisplay,
    D: FaceDetect,
    C: EmotionClassify,
{
    let mut frames = 0;
    loop {
        let mut frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                log::warn!("Failed to grab frame");
                return Ok(LoopSummary {
                    frames,
                    exit: LoopExit::SourceExhausted,
                });
            }
            Err(error) => {
                log::error!("Failed to read from camera: {:?}", error);
                return Ok(LoopSummary {
                    frames,
                    exit: LoopExit::ReadFailed,
                });
            }
        };

        // failures are logged by the analyzer and the cached overlay is drawn regardless
        _ = analyzer.analyze(&frame, cache);
        renderer.render(&mut frame, cache)?;
        display.show(&frame)?;
        frames += 1;

        if display.stop_requested()? {
            return Ok(LoopSummary {
                frames,
                exit: LoopExit::StopRequested,
            });
        }
    }
}
