//! Training: the per-epoch trainer adapter and the continual training loop
//! that sequences datasets, models and checkpoints.

pub mod continual;
pub mod trainer;

pub use continual::{
    run_continual_training, run_with_bundles, ContinualSchedule, DatasetReport, RunSummary,
};
pub use trainer::{RehearserOptimizer, RehearserTrainer};

/// Epoch budget for each dataset in the continual sequence
pub const EPOCHS_PER_DATASET: usize = 60;

/// Periodic checkpoint interval, in epochs
pub const CHECKPOINT_INTERVAL: usize = 10;

/// Optimization iterations per epoch
pub const TRAIN_ITERS_PER_EPOCH: usize = 400;
