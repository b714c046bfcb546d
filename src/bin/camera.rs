use clap::Parser;
use face_emotion::analysis::DEFAULT_ANALYSIS_INTERVAL;
use face_emotion::{
    run_capture_loop, AnalysisCache, CameraSource, DetectorConfig, FaceDetector,
    FerPlusClassifier, FrameAnalyzer, OverlayRenderer, Window,
};

#[derive(Parser, Debug)]
#[command(about = "Live webcam face emotion overlay")]
struct Args {
    /// Camera device index.
    #[clap(long, default_value_t = 0)]
    camera: i32,

    /// Haar cascade file. Defaults to the frontal face cascade shipped with OpenCV.
    #[clap(long)]
    cascade: Option<String>,

    /// FER+ emotion model in ONNX format.
    #[clap(long, default_value = "models/emotion-ferplus-8.onnx")]
    emotion_model: String,

    /// Run detection and classification every N frames.
    #[clap(long, default_value_t = DEFAULT_ANALYSIS_INTERVAL)]
    analysis_interval: u64,

    #[clap(long, default_value_t = 1.1)]
    scale_factor: f64,

    #[clap(long, default_value_t = 5)]
    min_neighbors: i32,

    /// Smallest face side in pixels.
    #[clap(long, default_value_t = 30)]
    min_face_size: i32,

    #[clap(long, default_value = "Camera")]
    window: String,

    /// Key that closes the window.
    #[clap(long, default_value_t = 'q')]
    quit_key: char,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args: Args = Args::parse();

    let detector_config = DetectorConfig {
        scale_factor: args.scale_factor,
        min_neighbors: args.min_neighbors,
        min_face_size: args.min_face_size,
    };
    let face_detector = match &args.cascade {
        Some(path) => FaceDetector::from_file(path, detector_config)?,
        None => FaceDetector::new(detector_config)?,
    };
    let classifier = FerPlusClassifier::new(&args.emotion_model)?;
    let mut analyzer = FrameAnalyzer::new(face_detector, classifier, args.analysis_interval)?;
    let renderer = OverlayRenderer::default();

    let mut camera_source = CameraSource::new(args.camera)?;
    let mut window = Window::new(&args.window, args.quit_key)?;
    let mut cache = AnalysisCache::new();

    let summary = run_capture_loop(
        &mut camera_source,
        &mut window,
        &mut analyzer,
        &renderer,
        &mut cache,
    )?;
    log::info!("Stopped: {:?}", summary.exit);
    Ok(())
}
