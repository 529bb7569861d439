use anyhow::bail;
use clap::Args;
use dataset_common::config::ProjectConfig;
use dataset_common::status::{LabelingStatus, MIN_LABELS_FOR_TRAINING};
use dataset_common::training::{Trainer, TrainingPlan, YoloCliTrainer};

#[derive(Debug, Args)]
pub struct TrainArgs {
    /// Print the training command without running it.
    #[arg(long, action, default_value = "false")]
    dry_run: bool,
    /// Train even with fewer labeled images than recommended.
    #[arg(long, action, default_value = "false")]
    force: bool,
}

pub fn train(config: &ProjectConfig, args: &TrainArgs) -> anyhow::Result<()> {
    let status = LabelingStatus::collect(config)?;
    if !status.ready_to_train() {
        if !args.force && !args.dry_run {
            bail!(
                "only {} labeled images, at least {MIN_LABELS_FOR_TRAINING} are needed (pass --force to train anyway)",
                status.labeled
            );
        }
        log::warn!("Training with only {} labeled images", status.labeled);
    }

    let plan = TrainingPlan::resolve(config);
    if args.dry_run {
        println!("yolo detect train {}", plan.to_args().join(" "));
        return Ok(());
    }

    let mut trainer = YoloCliTrainer::new()?;
    let weights = trainer.train(&plan)?;
    println!("Training finished; best weights at {weights:?}");
    Ok(())
}
