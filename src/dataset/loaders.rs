//! Loader Provider
//!
//! Builds the per-dataset loader bundles the continual loop consumes: an
//! endless identity-balanced train loader plus sequential test and init
//! loaders. Each train loader owns its own seeded RNG, so shuffling is
//! reproducible without any process-global random state.

use std::collections::{BTreeMap, VecDeque};

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use super::augmentation::StyleAugmenter;
use super::reid::{ReidDataset, ReidItem};
use super::sequencer::DatasetSpec;
use crate::config::RunConfig;
use crate::seeding::{component_rng, streams};
use crate::utils::error::{RehearserError, Result};

/// Endless shuffling loader for training.
///
/// With `num_instances > 0` batches are identity-balanced: each refill walks
/// the identities in shuffled order and contributes `num_instances` samples
/// per identity, so a batch holds `batch_size / num_instances` identities.
/// Otherwise plain shuffled batches are produced.
#[derive(Debug)]
pub struct TrainLoader {
    dataset: ReidDataset,
    batch_size: usize,
    num_instances: usize,
    rng: ChaCha8Rng,
    pending: VecDeque<usize>,
}

impl TrainLoader {
    pub fn new(
        dataset: ReidDataset,
        batch_size: usize,
        num_instances: usize,
        rng: ChaCha8Rng,
    ) -> Self {
        Self {
            dataset,
            batch_size,
            num_instances,
            rng,
            pending: VecDeque::new(),
        }
    }

    /// Next batch of training pairs; cycles the dataset indefinitely
    pub fn next_batch(&mut self) -> Result<Vec<ReidItem>> {
        if self.pending.len() < self.batch_size {
            self.refill();
        }
        if self.pending.is_empty() {
            return Err(RehearserError::data_load(
                self.dataset.name(),
                "dataset has no samples to draw a batch from",
            ));
        }

        let take = self.batch_size.min(self.pending.len());
        let mut items = Vec::with_capacity(take);
        while items.len() < take {
            match self.pending.pop_front() {
                Some(index) => items.push(self.dataset.item(index)?),
                None => break,
            }
        }

        Ok(items)
    }

    fn refill(&mut self) {
        if self.num_instances > 1 {
            let mut by_pid: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
            for (index, pid) in self.dataset.pids().into_iter().enumerate() {
                by_pid.entry(pid).or_default().push(index);
            }

            let mut groups: Vec<Vec<usize>> = by_pid.into_values().collect();
            groups.shuffle(&mut self.rng);

            for mut indices in groups {
                indices.shuffle(&mut self.rng);
                // Cycle when an identity has fewer samples than requested.
                for k in 0..self.num_instances {
                    self.pending.push_back(indices[k % indices.len()]);
                }
            }
        } else {
            use burn::data::dataset::Dataset;
            let mut indices: Vec<usize> = (0..self.dataset.len()).collect();
            indices.shuffle(&mut self.rng);
            self.pending.extend(indices);
        }
    }

    /// Underlying dataset
    pub fn dataset(&self) -> &ReidDataset {
        &self.dataset
    }
}

/// Sequential, non-shuffling loader for evaluation and initialization passes
#[derive(Debug, Clone)]
pub struct EvalLoader {
    dataset: ReidDataset,
    batch_size: usize,
}

impl EvalLoader {
    pub fn new(dataset: ReidDataset, batch_size: usize) -> Self {
        Self {
            dataset,
            batch_size,
        }
    }

    /// Number of batches in one full pass
    pub fn num_batches(&self) -> usize {
        use burn::data::dataset::Dataset;
        self.dataset.len().div_ceil(self.batch_size)
    }

    /// The `index`-th batch of one sequential pass
    pub fn batch(&self, index: usize) -> Result<Vec<ReidItem>> {
        use burn::data::dataset::Dataset;

        let start = index * self.batch_size;
        let end = (start + self.batch_size).min(self.dataset.len());
        if start >= end {
            return Err(RehearserError::data_load(
                self.dataset.name(),
                format!("batch index {} out of range", index),
            ));
        }

        (start..end).map(|i| self.dataset.item(i)).collect()
    }

    /// Total number of samples
    pub fn num_samples(&self) -> usize {
        use burn::data::dataset::Dataset;
        self.dataset.len()
    }
}

/// Everything the loop needs for one dataset
#[derive(Debug)]
pub struct LoaderBundle {
    /// The dataset handle
    pub dataset: ReidDataset,
    /// Number of identities
    pub num_classes: usize,
    /// Endless shuffling training loader
    pub train_loader: TrainLoader,
    /// Sequential evaluation loader
    pub test_loader: EvalLoader,
    /// Sequential initialization loader
    pub init_loader: EvalLoader,
    /// Dataset name
    pub name: String,
}

/// Build a bundle around an already-constructed dataset.
///
/// `stream` keeps train-loader RNG streams distinct across datasets.
pub fn bundle_from_dataset(dataset: ReidDataset, config: &RunConfig, stream: u64) -> LoaderBundle {
    let rng = component_rng(config.seed, streams::TRAIN_LOADER + stream);
    let num_classes = dataset.num_ids();
    let name = dataset.name().to_string();

    LoaderBundle {
        train_loader: TrainLoader::new(
            dataset.clone(),
            config.batch_size,
            config.num_instances,
            rng,
        ),
        test_loader: EvalLoader::new(dataset.clone(), config.batch_size),
        init_loader: EvalLoader::new(dataset.clone(), config.batch_size),
        num_classes,
        name,
        dataset,
    }
}

/// Materialize loader bundles for every training and testing-only dataset.
///
/// Datasets are scanned from `{data_dir}/{name}`; a missing or empty
/// directory is a fatal data-load error.
pub fn build_data_loaders(
    config: &RunConfig,
    spec: &DatasetSpec,
) -> Result<(Vec<LoaderBundle>, Vec<LoaderBundle>)> {
    let augmenter = StyleAugmenter::new(config.color_style, config.blur);

    let mut train_bundles = Vec::with_capacity(spec.training.len());
    for (index, id) in spec.training.iter().enumerate() {
        let dataset = ReidDataset::scan(
            &config.data_dir,
            id.as_str(),
            config.height,
            config.width,
            augmenter,
        )?;
        info!(
            "Prepared training dataset '{}': {} identities",
            id,
            dataset.num_ids()
        );
        train_bundles.push(bundle_from_dataset(dataset, config, index as u64));
    }

    let mut test_bundles = Vec::with_capacity(spec.testing_only.len());
    for (index, id) in spec.testing_only.iter().enumerate() {
        let dataset = ReidDataset::scan(
            &config.data_dir,
            id.as_str(),
            config.height,
            config.width,
            augmenter,
        )?;
        info!(
            "Prepared testing-only dataset '{}': {} identities",
            id,
            dataset.num_ids()
        );
        test_bundles.push(bundle_from_dataset(dataset, config, 1000 + index as u64));
    }

    Ok((train_bundles, test_bundles))
}
