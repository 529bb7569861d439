use std::path::PathBuf;

use anyhow::bail;
use clap::Args;
use dataset_common::config::ProjectConfig;
use dataset_common::detector::{Detector, PRELABEL_CONFIDENCE};
use dataset_common::prelabel::Prelabeler;
use dataset_common::translation::resolve_detector_mapping;
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort_common::YoloDetector;

#[derive(Debug, Args)]
pub struct PrelabelArgs {
    /// Yolov8 onnx model file to use.
    #[arg(long, short, default_value = "_models/yolov8s.onnx")]
    model: PathBuf,
    /// Whether to attempt to use `cuda` hw acceleration.
    /// This may silently fail and fallback to cpu acceleration presently.
    #[arg(long, action, default_value = "false")]
    cuda: bool,
    /// Minimum detection confidence.
    #[arg(long, default_value_t = PRELABEL_CONFIDENCE)]
    confidence: f32,
    /// Frame Store split to label.
    #[arg(long, default_value = "train")]
    split: String,
}

pub fn prelabel(config: &ProjectConfig, args: &PrelabelArgs) -> anyhow::Result<()> {
    let (ep, ep_name) = if args.cuda {
        (CUDAExecutionProvider::default().build(), "cuda")
    } else {
        (CPUExecutionProvider::default().build(), "cpu")
    };
    ort::init().with_execution_providers([ep]).commit()?;

    let mut detector = YoloDetector::new(&args.model)?;
    log::info!("Prepared ort {ep_name} session with model: {:?}", args.model);

    let mapping = resolve_detector_mapping(
        detector.class_names(),
        config.classes(),
        &config.work.activities,
    );
    if mapping.is_empty() {
        bail!(
            "none of the detector classes matches an activity of '{}'; add activities such as 'persona' or 'teclado' with `ffmpeg_dataset setup`",
            config.work_type()
        );
    }
    for (detector_id, project_id) in &mapping {
        log::info!(
            "{} -> {}",
            detector.class_names().name(*detector_id).unwrap_or("?"),
            config.classes().name(*project_id).unwrap_or("?")
        );
    }

    let store = config.frame_store();
    let summary = Prelabeler::new(&mut detector, mapping)
        .with_confidence(args.confidence)
        .run(&store, &args.split)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
