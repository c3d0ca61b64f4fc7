//! Continual rehearser training CLI
//!
//! Trains the rehearser network sequentially over the configured dataset
//! order, writing checkpoints and the run/results logs into the logs
//! directory.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tracing::info;

use lreid_rehearser::backend::{backend_name, default_device, TrainingBackend};
use lreid_rehearser::training::{run_continual_training, ContinualSchedule};
use lreid_rehearser::utils::logging::{init_logging, run_timestamp, LogConfig, ResultsLog};
use lreid_rehearser::{ColorStyle, OptimizerKind, RunConfig};

/// Continual training for lifelong person re-identification
#[derive(Parser, Debug)]
#[command(name = "lreid-rehearser")]
#[command(version)]
#[command(about = "Continual training for lifelong person re-identification", long_about = None)]
struct Cli {
    /// Training batch size
    #[arg(short = 'b', long, default_value_t = 128)]
    batch_size: usize,

    /// Data-loading workers
    #[arg(short = 'j', long, default_value_t = 8)]
    workers: usize,

    /// Input height
    #[arg(long, default_value_t = 256)]
    height: usize,

    /// Input width
    #[arg(long, default_value_t = 128)]
    width: usize,

    /// Each minibatch consists of (batch_size // num_instances) identities,
    /// and each identity has num_instances instances; 0 disables
    /// identity-balanced sampling
    #[arg(long, default_value_t = 4)]
    num_instances: usize,

    /// Optimizer
    #[arg(long, value_enum, default_value = "SGD")]
    optimizer: OptimizerKind,

    /// Learning rate of new parameters
    #[arg(long, default_value_t = 0.008)]
    lr: f64,

    /// SGD momentum
    #[arg(long, default_value_t = 0.9)]
    momentum: f64,

    /// Weight decay
    #[arg(long, default_value_t = 1e-4)]
    weight_decay: f32,

    /// Epochs of linear learning-rate warmup
    #[arg(long, default_value_t = 10)]
    warmup_step: usize,

    /// Seed for all random sources; omit for non-deterministic runs
    #[arg(long)]
    seed: Option<u64>,

    /// Log every N training iterations
    #[arg(long, default_value_t = 200)]
    print_freq: usize,

    /// Root directory holding one sub-directory per dataset
    #[arg(long, value_name = "PATH", default_value = "data")]
    data_dir: PathBuf,

    /// Output directory for logs and checkpoints
    #[arg(long, value_name = "PATH", default_value = "logs")]
    logs_dir: PathBuf,

    /// Training order setting
    #[arg(long, default_value_t = 1)]
    setting: u32,

    /// Data augmentation strategy
    #[arg(long = "color_style", value_enum, default_value = "rgb")]
    color_style: ColorStyle,

    /// Learnable style transfer kernel
    #[arg(long = "learn_kernel")]
    learn_kernel: bool,

    /// Adopt blur augmentation
    #[arg(long)]
    blur: bool,

    /// Number of distribution-transfer kernels
    #[arg(long = "n_kernel", default_value_t = 1)]
    n_kernel: usize,

    /// Convolution group number of each distribution-transfer kernel
    #[arg(long, default_value_t = 1)]
    groups: usize,

    /// Learn shallow convolution layers
    #[arg(long = "end_to_end")]
    end_to_end: bool,

    /// Learn to reconstruct with a deep backbone
    #[arg(long = "deep_net")]
    deep_net: bool,

    /// Use the mobile backbone for the synthetic models
    #[arg(long)]
    mobile: bool,
}

impl Cli {
    fn into_config(self) -> RunConfig {
        RunConfig {
            batch_size: self.batch_size,
            workers: self.workers,
            height: self.height,
            width: self.width,
            num_instances: self.num_instances,
            optimizer: self.optimizer,
            lr: self.lr,
            momentum: self.momentum,
            weight_decay: self.weight_decay,
            warmup_step: self.warmup_step,
            seed: self.seed,
            print_freq: self.print_freq,
            data_dir: self.data_dir,
            logs_dir: self.logs_dir,
            setting: self.setting,
            color_style: self.color_style,
            blur: self.blur,
            learn_kernel: self.learn_kernel,
            end_to_end: self.end_to_end,
            deep_net: self.deep_net,
            mobile: self.mobile,
            n_kernel: self.n_kernel,
            groups: self.groups,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.into_config();
    config.validate()?;

    std::fs::create_dir_all(&config.logs_dir)?;
    let timestamp = run_timestamp();

    let log_path = config.logs_dir.join(format!("log_{}.txt", timestamp));
    if let Err(e) = init_logging(&LogConfig::default(), Some(&log_path)) {
        eprintln!("Warning: {}", e);
    }

    let results = ResultsLog::create(config.logs_dir.join(format!("log_res_{}.txt", timestamp)))?;

    info!("==========");
    info!("Args: {:?}", config);
    info!("==========");
    info!("Backend: {}", backend_name());

    let device = default_device();
    let summary =
        run_continual_training::<TrainingBackend>(&config, &ContinualSchedule::default(), &device)?;

    for report in &summary.datasets {
        let final_loss = report.epoch_losses.last().copied().unwrap_or(0.0);
        results.append(&format!(
            "{}: variant={} epochs={} final_loss={:.4} checkpoint={}",
            report.name,
            report.variant,
            report.epochs,
            final_loss,
            report.final_checkpoint.display()
        ))?;
    }
    if !summary.testing_only.is_empty() {
        results.append(&format!("testing-only: {}", summary.testing_only.join(", ")))?;
    }

    println!();
    println!("{}", "Continual training complete!".green().bold());
    for report in &summary.datasets {
        println!(
            "  {} {} epochs, {} checkpoints, final at {:?}",
            report.name.cyan(),
            report.epochs,
            report.periodic_checkpoints.len() + 1,
            report.final_checkpoint
        );
    }
    println!("  Results log: {:?}", results.path());

    Ok(())
}
