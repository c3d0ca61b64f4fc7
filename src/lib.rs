//! # lreid-rehearser
//!
//! Continual training of a "rehearser" network for lifelong person
//! re-identification, built on the Burn framework. The rehearser is a
//! generative style-transfer model; training runs sequentially over a fixed
//! order of re-id datasets, giving each dataset a fresh model, a fixed epoch
//! budget and periodic checkpoints.
//!
//! ## Modules
//!
//! - `config`: the immutable run configuration resolved from the CLI
//! - `seeding`: backend seeding and explicit per-component RNG streams
//! - `dataset`: training-order resolution, re-id dataset scanning, loaders
//! - `model`: the three rehearser variants and their factory
//! - `training`: the per-epoch trainer and the continual training loop
//! - `checkpoint`: periodic/final checkpoint persistence
//! - `utils`: error types and logging
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use lreid_rehearser::backend::{default_device, TrainingBackend};
//! use lreid_rehearser::training::{run_continual_training, ContinualSchedule};
//! use lreid_rehearser::RunConfig;
//!
//! let config = RunConfig { end_to_end: true, ..Default::default() };
//! let summary = run_continual_training::<TrainingBackend>(
//!     &config,
//!     &ContinualSchedule::default(),
//!     &default_device(),
//! )?;
//! ```

pub mod backend;
pub mod checkpoint;
pub mod config;
pub mod dataset;
pub mod model;
pub mod seeding;
pub mod training;
pub mod utils;

// Re-export commonly used items for convenience
pub use checkpoint::{CheckpointManager, CheckpointMeta};
pub use config::{ColorStyle, OptimizerKind, RunConfig};
pub use dataset::{
    build_data_loaders, resolve_training_sets, DatasetId, DatasetSpec, LoaderBundle, ReidDataset,
};
pub use model::{build_rehearser, Backbone, ModelSelection, Rehearser, StyleTransfer};
pub use training::{run_continual_training, ContinualSchedule, DatasetReport, RunSummary};
pub use utils::error::{RehearserError, Result};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
