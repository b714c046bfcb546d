use clap::Parser;
use face_emotion::{
    AnalysisCache, AnalysisOutcome, DetectorConfig, FaceDetector, FerPlusClassifier,
    FrameAnalyzer, FrameDisplay, OverlayRenderer, Window,
};
use opencv::prelude::*;

#[derive(Parser, Debug)]
#[command(about = "Annotate a single image with face emotion")]
struct Args {
    /// Image to analyze.
    image: String,

    /// Write the annotated image here.
    #[clap(short, long)]
    output: Option<String>,

    /// Haar cascade file. Defaults to the frontal face cascade shipped with OpenCV.
    #[clap(long)]
    cascade: Option<String>,

    /// FER+ emotion model in ONNX format.
    #[clap(long, default_value = "models/emotion-ferplus-8.onnx")]
    emotion_model: String,

    /// Don't open a window.
    #[clap(long)]
    headless: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args: Args = Args::parse();

    let mut frame = opencv::imgcodecs::imread_def(&args.image)?;
    if frame.size()?.width == 0 {
        anyhow::bail!("Unable to read image {}", args.image);
    }

    let face_detector = match &args.cascade {
        Some(path) => FaceDetector::from_file(path, DetectorConfig::default())?,
        None => FaceDetector::new(DetectorConfig::default())?,
    };
    let classifier = FerPlusClassifier::new(&args.emotion_model)?;
    // a single frame is always an analysis frame
    let mut analyzer = FrameAnalyzer::new(face_detector, classifier, 1)?;
    let mut cache = AnalysisCache::new();

    match analyzer.analyze(&frame, &mut cache) {
        AnalysisOutcome::Detected {
            bounding_box,
            reading,
        } => match reading {
            Some(reading) => println!(
                "face at {:?}: {} {:.1}%",
                bounding_box,
                reading.dominant,
                reading.confidence()
            ),
            None => println!("face at {:?}: no emotion reading", bounding_box),
        },
        AnalysisOutcome::NoFace | AnalysisOutcome::Skipped => println!("no face found"),
        AnalysisOutcome::Failed(error) => return Err(error),
    }

    OverlayRenderer::default().render(&mut frame, &cache)?;

    if let Some(output) = &args.output {
        opencv::imgcodecs::imwrite_def(output, &frame)?;
        log::info!("Wrote {}", output);
    }

    if !args.headless {
        let mut window = Window::new("face emotion", 'q')?;
        window.show(&frame)?;
        window.wait_for_any_key()?;
        window.close()?;
    }

    Ok(())
}
