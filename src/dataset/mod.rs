//! Dataset handling: training-order resolution, re-id dataset scanning,
//! style-source derivation and loader construction.

pub mod augmentation;
pub mod loaders;
pub mod reid;
pub mod sequencer;

pub use augmentation::StyleAugmenter;
pub use loaders::{build_data_loaders, bundle_from_dataset, EvalLoader, LoaderBundle, TrainLoader};
pub use reid::{ReidBatch, ReidBatcher, ReidDataset, ReidItem};
pub use sequencer::{resolve_training_sets, DatasetId, DatasetSpec, ALL_DATASETS};
