//! Run Configuration Module
//!
//! Defines the immutable run configuration resolved once at process start:
//! loader settings, optimizer hyperparameters, paths, the dataset-order
//! setting and the rehearser variant selection flags.

use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::utils::error::{RehearserError, Result};

/// Training-order settings accepted by configuration validation.
///
/// Only setting `1` has a defined training order; the remaining declared
/// values are reserved and rejected at resolution time.
pub const DECLARED_SETTINGS: &[u32] = &[1, 2, 51, 52, 53, 54, 55];

/// Optimizer choice for the trainer adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum OptimizerKind {
    /// Stochastic gradient descent with momentum
    #[value(name = "SGD")]
    Sgd,
    /// Adam
    #[value(name = "Adam")]
    Adam,
}

/// Colour style used when deriving the style-transfer source images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum ColorStyle {
    /// Keep the RGB channels untouched
    #[value(name = "rgb")]
    Rgb,
    /// Push chroma toward luminance (Lab-style desaturation)
    #[value(name = "lab")]
    Lab,
}

/// Immutable configuration for one continual training run
///
/// Constructed from the CLI at process start and read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Training batch size
    pub batch_size: usize,

    /// Data-loading worker count (accepted for loader configuration;
    /// host-side loading in this implementation is synchronous)
    pub workers: usize,

    /// Input image height
    pub height: usize,

    /// Input image width
    pub width: usize,

    /// Instances per identity in a training batch; each minibatch consists
    /// of `batch_size / num_instances` identities. `0` disables
    /// identity-balanced sampling.
    pub num_instances: usize,

    /// Optimizer choice
    pub optimizer: OptimizerKind,

    /// Base learning rate
    pub lr: f64,

    /// SGD momentum
    pub momentum: f64,

    /// Weight decay (L2 penalty)
    pub weight_decay: f32,

    /// Epochs of linear learning-rate warmup
    pub warmup_step: usize,

    /// Seed for all random sources; absent means no seeding
    pub seed: Option<u64>,

    /// Log every N training iterations
    pub print_freq: usize,

    /// Root directory holding one sub-directory per dataset
    pub data_dir: PathBuf,

    /// Output directory for logs and checkpoints
    pub logs_dir: PathBuf,

    /// Training-order setting id
    pub setting: u32,

    /// Colour style for the style-transfer source images
    pub color_style: ColorStyle,

    /// Apply blur when deriving style-transfer source images
    pub blur: bool,

    /// Select the kernel-prediction rehearser
    pub learn_kernel: bool,

    /// Select the end-to-end shallow-convolution rehearser
    pub end_to_end: bool,

    /// Select the backbone-reconstruction rehearser
    pub deep_net: bool,

    /// Use the mobile backbone for the kernel-prediction rehearser
    pub mobile: bool,

    /// Number of distribution-transfer kernels
    pub n_kernel: usize,

    /// Convolution group count of each distribution-transfer kernel
    pub groups: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            batch_size: 128,
            workers: 8,
            height: 256,
            width: 128,
            num_instances: 4,
            optimizer: OptimizerKind::Sgd,
            lr: 0.008,
            momentum: 0.9,
            weight_decay: 1e-4,
            warmup_step: 10,
            seed: None,
            print_freq: 200,
            data_dir: PathBuf::from("data"),
            logs_dir: PathBuf::from("logs"),
            setting: 1,
            color_style: ColorStyle::Rgb,
            blur: false,
            learn_kernel: false,
            end_to_end: false,
            deep_net: false,
            mobile: false,
            n_kernel: 1,
            groups: 1,
        }
    }
}

impl RunConfig {
    /// Validate the configuration
    ///
    /// Model-selection flags are validated separately by
    /// [`crate::model::ModelSelection::from_config`]; this checks everything
    /// else that can be rejected before any loader or model is built.
    pub fn validate(&self) -> Result<()> {
        if !DECLARED_SETTINGS.contains(&self.setting) {
            return Err(RehearserError::Config(format!(
                "setting {} is not one of the declared values {:?}",
                self.setting, DECLARED_SETTINGS
            )));
        }

        if self.batch_size == 0 {
            return Err(RehearserError::Config(
                "batch_size must be greater than 0".to_string(),
            ));
        }

        if self.num_instances > 0 && self.batch_size % self.num_instances != 0 {
            return Err(RehearserError::Config(format!(
                "batch_size ({}) must be divisible by num_instances ({})",
                self.batch_size, self.num_instances
            )));
        }

        if self.height == 0 || self.width == 0 || self.height % 8 != 0 || self.width % 8 != 0 {
            return Err(RehearserError::Config(format!(
                "height and width must be positive multiples of 8, got {}x{}",
                self.height, self.width
            )));
        }

        if self.n_kernel == 0 {
            return Err(RehearserError::Config(
                "n_kernel must be at least 1".to_string(),
            ));
        }

        // Kernels operate on the 3 colour channels, so groups must divide 3.
        if self.groups == 0 || 3 % self.groups != 0 {
            return Err(RehearserError::Config(format!(
                "groups must divide the 3 colour channels, got {}",
                self.groups
            )));
        }

        if self.lr <= 0.0 {
            return Err(RehearserError::Config(format!(
                "learning rate must be positive, got {}",
                self.lr
            )));
        }

        Ok(())
    }
}
