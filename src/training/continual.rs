//! Continual Training Loop
//!
//! The top-level orchestrator. Datasets are trained strictly in the resolved
//! order, one at a time: each gets a fresh rehearser and a fresh trainer,
//! a fixed number of epochs with a fixed iteration budget per epoch, the
//! periodic checkpoint policy after every epoch and a final checkpoint when
//! its epoch loop finishes. Continuity lives in the training-order
//! curriculum and the checkpoint lineage, not in parameter carry-over, so
//! models are deliberately not reused across datasets.
//!
//! Any error (loader construction, model construction, a training step, a
//! checkpoint write) propagates immediately; there is no retry and no
//! partial-dataset skip.

use std::path::PathBuf;

use burn::module::AutodiffModule;
use burn::tensor::backend::AutodiffBackend;
use tracing::info;

use super::trainer::RehearserTrainer;
use super::{CHECKPOINT_INTERVAL, EPOCHS_PER_DATASET, TRAIN_ITERS_PER_EPOCH};
use crate::checkpoint::CheckpointManager;
use crate::config::RunConfig;
use crate::dataset::{build_data_loaders, resolve_training_sets, LoaderBundle};
use crate::model::{build_rehearser, ModelSelection, Rehearser, StyleTransfer};
use crate::seeding::apply_determinism;
use crate::utils::error::{RehearserError, Result};

/// Epoch and iteration budgets of the continual loop.
///
/// Defaults are the production values; tests shrink them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinualSchedule {
    /// Epochs to train on each dataset
    pub epochs_per_dataset: usize,
    /// Save a periodic checkpoint every this many epochs
    pub checkpoint_interval: usize,
    /// Optimization iterations per epoch
    pub train_iters: usize,
}

impl Default for ContinualSchedule {
    fn default() -> Self {
        Self {
            epochs_per_dataset: EPOCHS_PER_DATASET,
            checkpoint_interval: CHECKPOINT_INTERVAL,
            train_iters: TRAIN_ITERS_PER_EPOCH,
        }
    }
}

impl ContinualSchedule {
    /// Reject schedules the loop cannot run
    pub fn validate(&self) -> Result<()> {
        if self.epochs_per_dataset == 0 {
            return Err(RehearserError::Config(
                "epochs_per_dataset must be at least 1".to_string(),
            ));
        }
        if self.train_iters == 0 {
            return Err(RehearserError::Config(
                "train_iters must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of one dataset's training run
#[derive(Debug)]
pub struct DatasetReport {
    /// Dataset name
    pub name: String,
    /// Rehearser variant that was trained
    pub variant: &'static str,
    /// Epochs completed
    pub epochs: usize,
    /// Mean reconstruction loss per epoch
    pub epoch_losses: Vec<f64>,
    /// Paths of the periodic checkpoints, in save order
    pub periodic_checkpoints: Vec<PathBuf>,
    /// Path of the final checkpoint
    pub final_checkpoint: PathBuf,
}

/// Outcome of a whole continual run
#[derive(Debug)]
pub struct RunSummary {
    /// Per-dataset reports, in visit order
    pub datasets: Vec<DatasetReport>,
    /// Names of the testing-only datasets that were prepared
    pub testing_only: Vec<String>,
}

/// Run the full continual training sequence.
///
/// Applies determinism seeding, resolves the dataset order, materializes
/// the loaders and trains every dataset in sequence.
pub fn run_continual_training<B: AutodiffBackend>(
    config: &RunConfig,
    schedule: &ContinualSchedule,
    device: &B::Device,
) -> Result<RunSummary> {
    config.validate()?;
    schedule.validate()?;
    let selection = ModelSelection::from_config(config)?;

    // Seeding happens before any loader or model construction.
    apply_determinism::<B>(config.seed);

    let spec = resolve_training_sets(config.setting)?;
    let (train_bundles, test_bundles) = build_data_loaders(config, &spec)?;
    info!(
        "Data prepared: {} training datasets, {} testing-only datasets",
        train_bundles.len(),
        test_bundles.len()
    );

    let testing_only = test_bundles.iter().map(|b| b.name.clone()).collect();
    run_with_bundles::<B>(config, schedule, &selection, train_bundles, testing_only, device)
}

/// Train every bundle in order with a fresh model each.
///
/// Split out of [`run_continual_training`] so tests can drive the loop with
/// synthetic datasets and a shrunken schedule.
pub fn run_with_bundles<B: AutodiffBackend>(
    config: &RunConfig,
    schedule: &ContinualSchedule,
    selection: &ModelSelection,
    bundles: Vec<LoaderBundle>,
    testing_only: Vec<String>,
    device: &B::Device,
) -> Result<RunSummary> {
    schedule.validate()?;
    let manager = CheckpointManager::new(&config.logs_dir, schedule.checkpoint_interval)?;

    let mut datasets = Vec::with_capacity(bundles.len());
    for mut bundle in bundles {
        info!(
            "Start training on '{}' ({} identities, {} samples; {} test batches, {} init batches ready)",
            bundle.name,
            bundle.num_classes,
            bundle.test_loader.num_samples(),
            bundle.test_loader.num_batches(),
            bundle.init_loader.num_batches()
        );

        let report = match build_rehearser::<B>(selection, device) {
            Rehearser::KernelLearning(model) => {
                train_dataset::<B, _>(model, selection, config, schedule, &manager, &mut bundle, device)?
            }
            Rehearser::End2End(model) => {
                train_dataset::<B, _>(model, selection, config, schedule, &manager, &mut bundle, device)?
            }
            Rehearser::DeepNet(model) => {
                train_dataset::<B, _>(model, selection, config, schedule, &manager, &mut bundle, device)?
            }
        };
        datasets.push(report);
    }

    info!("Continual training complete: {} datasets", datasets.len());
    Ok(RunSummary {
        datasets,
        testing_only,
    })
}

/// Run the epoch loop for one dataset and apply the checkpoint policy.
fn train_dataset<B, M>(
    model: M,
    selection: &ModelSelection,
    config: &RunConfig,
    schedule: &ContinualSchedule,
    manager: &CheckpointManager,
    bundle: &mut LoaderBundle,
    device: &B::Device,
) -> Result<DatasetReport>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + StyleTransfer<B>,
{
    let mut trainer = RehearserTrainer::new(model, config, device.clone());
    let mut epoch_losses = Vec::with_capacity(schedule.epochs_per_dataset);
    let mut periodic_checkpoints = Vec::new();
    let mut last_epoch = 0;

    for epoch in 0..schedule.epochs_per_dataset {
        let loss = trainer.train(
            epoch,
            &mut bundle.train_loader,
            schedule.train_iters,
            &bundle.name,
        )?;
        epoch_losses.push(loss);

        if let Some(path) =
            manager.save_periodic::<B, M>(trainer.model(), &bundle.name, epoch)?
        {
            periodic_checkpoints.push(path);
        }
        last_epoch = epoch;
    }

    let final_checkpoint = manager.save_final::<B, M>(trainer.model(), &bundle.name, last_epoch)?;

    info!(
        "Finished '{}': {} epochs, {} periodic checkpoints, final at {:?}",
        bundle.name,
        schedule.epochs_per_dataset,
        periodic_checkpoints.len(),
        final_checkpoint
    );

    Ok(DatasetReport {
        name: bundle.name.clone(),
        variant: selection.variant_name(),
        epochs: schedule.epochs_per_dataset,
        epoch_losses,
        periodic_checkpoints,
        final_checkpoint,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule_uses_production_budgets() {
        let schedule = ContinualSchedule::default();
        assert_eq!(schedule.epochs_per_dataset, 60);
        assert_eq!(schedule.checkpoint_interval, 10);
        assert_eq!(schedule.train_iters, 400);
    }

    #[test]
    fn test_empty_schedule_is_rejected() {
        let schedule = ContinualSchedule {
            epochs_per_dataset: 0,
            ..Default::default()
        };
        assert!(schedule.validate().is_err());

        let schedule = ContinualSchedule {
            train_iters: 0,
            ..Default::default()
        };
        assert!(schedule.validate().is_err());
    }

    #[cfg(feature = "ndarray")]
    mod loop_tests {
        use super::*;
        use crate::config::ColorStyle;
        use crate::dataset::{bundle_from_dataset, ReidDataset, StyleAugmenter};
        use burn::backend::Autodiff;

        type TestBackend = Autodiff<burn_ndarray::NdArray>;

        fn test_config(logs_dir: std::path::PathBuf) -> RunConfig {
            RunConfig {
                batch_size: 4,
                num_instances: 2,
                height: 16,
                width: 8,
                lr: 0.01,
                warmup_step: 0,
                print_freq: 100,
                seed: Some(7),
                end_to_end: true,
                logs_dir,
                ..Default::default()
            }
        }

        fn synthetic_bundle(name: &str, config: &RunConfig, stream: u64) -> LoaderBundle {
            let dataset = ReidDataset::synthetic(
                name,
                2,
                2,
                16,
                8,
                StyleAugmenter::new(ColorStyle::Rgb, false),
            );
            bundle_from_dataset(dataset, config, stream)
        }

        #[test]
        fn test_short_run_visits_datasets_in_order_with_one_final_checkpoint_each() {
            let dir = tempfile::tempdir().unwrap();
            let config = test_config(dir.path().join("ckpt"));
            let schedule = ContinualSchedule {
                epochs_per_dataset: 3,
                checkpoint_interval: 10,
                train_iters: 1,
            };
            let selection = ModelSelection::from_config(&config).unwrap();
            let bundles = vec![
                synthetic_bundle("alpha", &config, 0),
                synthetic_bundle("beta", &config, 1),
            ];

            let summary = run_with_bundles::<TestBackend>(
                &config,
                &schedule,
                &selection,
                bundles,
                vec![],
                &Default::default(),
            )
            .unwrap();

            let names: Vec<&str> = summary.datasets.iter().map(|d| d.name.as_str()).collect();
            assert_eq!(names, vec!["alpha", "beta"]);

            for report in &summary.datasets {
                assert_eq!(report.epochs, 3);
                assert_eq!(report.epoch_losses.len(), 3);
                // 3 < 10, so the periodic policy never fires.
                assert!(report.periodic_checkpoints.is_empty());
                assert!(report.final_checkpoint.exists());
                assert_eq!(report.variant, "end-to-end");
            }

            // Exactly one record per dataset on disk.
            let records: Vec<String> = std::fs::read_dir(dir.path().join("ckpt"))
                .unwrap()
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .filter(|n| n.ends_with(".mpk"))
                .collect();
            assert_eq!(records.len(), 2);
            assert!(records.contains(&"alpha_rehearser.mpk".to_string()));
            assert!(records.contains(&"beta_rehearser.mpk".to_string()));
        }

        #[test]
        fn test_periodic_policy_fires_on_longer_runs() {
            let dir = tempfile::tempdir().unwrap();
            let config = test_config(dir.path().join("ckpt"));
            let schedule = ContinualSchedule {
                epochs_per_dataset: 4,
                checkpoint_interval: 2,
                train_iters: 1,
            };
            let selection = ModelSelection::from_config(&config).unwrap();
            let bundles = vec![synthetic_bundle("alpha", &config, 0)];

            let summary = run_with_bundles::<TestBackend>(
                &config,
                &schedule,
                &selection,
                bundles,
                vec![],
                &Default::default(),
            )
            .unwrap();

            let report = &summary.datasets[0];
            // interval 2 over 4 epochs saves after epochs 1 and 3
            assert_eq!(report.periodic_checkpoints.len(), 2);
            assert!(report.periodic_checkpoints[0].ends_with("alpha_rehearser_1.mpk"));
            assert!(report.periodic_checkpoints[1].ends_with("alpha_rehearser_3.mpk"));
        }

        #[test]
        fn test_missing_variant_flag_fails_before_any_data_access() {
            let dir = tempfile::tempdir().unwrap();
            let config = RunConfig {
                end_to_end: false,
                ..test_config(dir.path().join("ckpt"))
            };

            let err = run_continual_training::<TestBackend>(
                &config,
                &ContinualSchedule::default(),
                &Default::default(),
            )
            .unwrap_err();
            assert!(matches!(err, RehearserError::Config(_)));
        }
    }
}
