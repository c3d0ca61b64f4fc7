//! Rehearser Trainer Adapter
//!
//! Wraps one rehearser model together with its optimizer and runs one epoch
//! of training at a time: exactly `train_iters` optimization steps against
//! the dataset's train loader, minimizing the reconstruction error between
//! the rehearsed output and the target image. Learning rate follows a linear
//! warmup over the configured number of epochs.

use burn::{
    module::AutodiffModule,
    optim::{
        adaptor::OptimizerAdaptor, decay::WeightDecayConfig, momentum::MomentumConfig, Adam,
        AdamConfig, GradientsParams, Optimizer, Sgd, SgdConfig,
    },
    tensor::{backend::AutodiffBackend, ElementConversion},
};
use tracing::{debug, info};

use crate::config::{OptimizerKind, RunConfig};
use crate::dataset::{ReidBatcher, TrainLoader};
use crate::model::StyleTransfer;
use crate::utils::error::{RehearserError, Result};

/// Optimizer selected by the run configuration
pub enum RehearserOptimizer<B, M>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    Sgd(OptimizerAdaptor<Sgd<B::InnerBackend>, M, B>),
    Adam(OptimizerAdaptor<Adam<B::InnerBackend>, M, B>),
}

impl<B, M> RehearserOptimizer<B, M>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    fn from_config(config: &RunConfig) -> Self {
        match config.optimizer {
            OptimizerKind::Sgd => Self::Sgd(
                SgdConfig::new()
                    .with_momentum(Some(
                        MomentumConfig::new().with_momentum(config.momentum),
                    ))
                    .with_weight_decay(Some(WeightDecayConfig::new(config.weight_decay.into())))
                    .init(),
            ),
            OptimizerKind::Adam => Self::Adam(
                AdamConfig::new()
                    .with_weight_decay(Some(WeightDecayConfig::new(config.weight_decay.into())))
                    .init(),
            ),
        }
    }

    fn step(&mut self, lr: f64, model: M, grads: GradientsParams) -> M {
        match self {
            Self::Sgd(optimizer) => optimizer.step(lr, model, grads),
            Self::Adam(optimizer) => optimizer.step(lr, model, grads),
        }
    }
}

/// Trains one rehearser on one dataset, an epoch at a time
pub struct RehearserTrainer<B, M>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + StyleTransfer<B>,
{
    model: M,
    optimizer: RehearserOptimizer<B, M>,
    batcher: ReidBatcher<B>,
    base_lr: f64,
    warmup_step: usize,
    print_freq: usize,
}

impl<B, M> RehearserTrainer<B, M>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + StyleTransfer<B>,
{
    /// Create a fresh trainer around a freshly built model
    pub fn new(model: M, config: &RunConfig, device: B::Device) -> Self {
        Self {
            model,
            optimizer: RehearserOptimizer::from_config(config),
            batcher: ReidBatcher::new(device, config.height, config.width),
            base_lr: config.lr,
            warmup_step: config.warmup_step,
            print_freq: config.print_freq.max(1),
        }
    }

    /// The model in its current training state
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Learning rate for an epoch: linear warmup, then the base rate
    pub fn epoch_lr(&self, epoch: usize) -> f64 {
        if self.warmup_step == 0 || epoch >= self.warmup_step {
            self.base_lr
        } else {
            self.base_lr * (epoch as f64 + 1.0) / self.warmup_step as f64
        }
    }

    /// Run one epoch of `train_iters` optimization steps.
    ///
    /// Returns the mean reconstruction loss over the epoch. A non-finite
    /// loss aborts the run as a training-step error.
    pub fn train(
        &mut self,
        epoch: usize,
        loader: &mut TrainLoader,
        train_iters: usize,
        dataset_name: &str,
    ) -> Result<f64> {
        let lr = self.epoch_lr(epoch);
        let mut total_loss = 0.0f64;

        debug!(
            "Epoch {} on '{}': {} iterations at lr {:.6}",
            epoch, dataset_name, train_iters, lr
        );

        for iteration in 0..train_iters {
            let items = loader.next_batch()?;
            let batch = self.batcher.batch(&items);

            let output = self.model.forward(batch.inputs);
            let diff = output - batch.targets;
            let loss = (diff.clone() * diff).mean();

            let loss_value: f64 = loss.clone().into_scalar().elem();
            if !loss_value.is_finite() {
                return Err(RehearserError::TrainingStep {
                    dataset: dataset_name.to_string(),
                    epoch,
                    reason: format!("non-finite loss {} at iteration {}", loss_value, iteration),
                });
            }
            total_loss += loss_value;

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &self.model);
            self.model = self.optimizer.step(lr, self.model.clone(), grads);

            if (iteration + 1) % self.print_freq == 0 || iteration + 1 == train_iters {
                info!(
                    "Epoch: [{}][{}/{}] Loss {:.4} (avg {:.4})",
                    epoch,
                    iteration + 1,
                    train_iters,
                    loss_value,
                    total_loss / (iteration + 1) as f64
                );
            }
        }

        let avg_loss = if train_iters > 0 {
            total_loss / train_iters as f64
        } else {
            0.0
        };

        info!(
            "Epoch {} on '{}' done: avg loss {:.4}",
            epoch, dataset_name, avg_loss
        );
        Ok(avg_loss)
    }
}

#[cfg(test)]
#[cfg(feature = "ndarray")]
mod tests {
    use super::*;
    use crate::config::ColorStyle;
    use crate::dataset::{bundle_from_dataset, ReidDataset, StyleAugmenter};
    use crate::model::End2End;
    use burn::backend::Autodiff;

    type TestBackend = Autodiff<burn_ndarray::NdArray>;

    fn test_config() -> RunConfig {
        RunConfig {
            batch_size: 4,
            num_instances: 2,
            height: 16,
            width: 8,
            lr: 0.01,
            warmup_step: 4,
            print_freq: 100,
            seed: Some(42),
            ..Default::default()
        }
    }

    fn trainer(config: &RunConfig) -> RehearserTrainer<TestBackend, End2End<TestBackend>> {
        let device = Default::default();
        let model = End2End::<TestBackend>::new(1, &device);
        RehearserTrainer::new(model, config, device)
    }

    #[test]
    fn test_warmup_ramps_linearly() {
        let trainer = trainer(&test_config());

        assert!((trainer.epoch_lr(0) - 0.0025).abs() < 1e-9);
        assert!((trainer.epoch_lr(1) - 0.005).abs() < 1e-9);
        assert!((trainer.epoch_lr(3) - 0.01).abs() < 1e-9);
        assert!((trainer.epoch_lr(10) - 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_no_warmup_uses_base_rate() {
        let config = RunConfig {
            warmup_step: 0,
            ..test_config()
        };
        assert!((trainer(&config).epoch_lr(0) - 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_one_epoch_yields_finite_loss() {
        let config = test_config();
        let dataset = ReidDataset::synthetic(
            "alpha",
            4,
            2,
            16,
            8,
            StyleAugmenter::new(ColorStyle::Lab, false),
        );
        let mut bundle = bundle_from_dataset(dataset, &config, 0);
        let mut trainer = trainer(&config);

        let loss = trainer
            .train(0, &mut bundle.train_loader, 2, "alpha")
            .unwrap();
        assert!(loss.is_finite());
        assert!(loss >= 0.0);
    }

    #[test]
    fn test_adam_optimizer_steps() {
        let config = RunConfig {
            optimizer: OptimizerKind::Adam,
            lr: 0.001,
            ..test_config()
        };
        let dataset = ReidDataset::synthetic(
            "beta",
            2,
            2,
            16,
            8,
            StyleAugmenter::new(ColorStyle::Rgb, true),
        );
        let mut bundle = bundle_from_dataset(dataset, &config, 0);
        let mut trainer = trainer(&config);

        assert!(trainer
            .train(0, &mut bundle.train_loader, 1, "beta")
            .is_ok());
    }
}
