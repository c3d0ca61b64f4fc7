//! Checkpoint Manager
//!
//! Persists rehearser parameter state under identifiers derived from the
//! dataset name and epoch: `{dataset}_rehearser_{epoch}` for periodic saves
//! (every `interval` epochs) and `{dataset}_rehearser` for the final save of
//! a dataset run. Every save writes the burn record plus a small JSON
//! sidecar carrying the epoch number, both through a temporary name followed
//! by a rename so a partial write is never observable. Identifier collisions
//! overwrite the previous checkpoint.

use std::fs;
use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::record::CompactRecorder;
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::utils::error::{RehearserError, Result};

/// Epoch metadata stored next to each model record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    /// Number of completed epochs at save time (1-based)
    pub epoch: usize,
}

/// Saves model checkpoints according to the loop's cadence policy
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir: PathBuf,
    interval: usize,
}

impl CheckpointManager {
    /// Create a manager writing into `dir`, creating it if needed
    pub fn new(dir: impl Into<PathBuf>, interval: usize) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| RehearserError::CheckpointIo {
            path: dir.clone(),
            source: e,
        })?;
        Ok(Self { dir, interval })
    }

    /// Directory checkpoints are written into
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether the periodic policy fires after the given 0-indexed epoch
    pub fn periodic_due(&self, epoch: usize) -> bool {
        self.interval > 0 && (epoch + 1) % self.interval == 0
    }

    /// Identifier of a periodic checkpoint
    pub fn periodic_identifier(dataset: &str, epoch: usize) -> String {
        format!("{}_rehearser_{}", dataset, epoch)
    }

    /// Identifier of a dataset's final checkpoint
    pub fn final_identifier(dataset: &str) -> String {
        format!("{}_rehearser", dataset)
    }

    /// Apply the periodic policy after an epoch.
    ///
    /// Returns the record path when a checkpoint was written, `None` when
    /// the epoch is off-cadence.
    pub fn save_periodic<B: Backend, M: Module<B>>(
        &self,
        model: &M,
        dataset: &str,
        epoch: usize,
    ) -> Result<Option<PathBuf>> {
        if !self.periodic_due(epoch) {
            return Ok(None);
        }
        let identifier = Self::periodic_identifier(dataset, epoch);
        self.save::<B, M>(model, &identifier, epoch).map(Some)
    }

    /// Write the final checkpoint of a dataset run
    pub fn save_final<B: Backend, M: Module<B>>(
        &self,
        model: &M,
        dataset: &str,
        epoch: usize,
    ) -> Result<PathBuf> {
        let identifier = Self::final_identifier(dataset);
        self.save::<B, M>(model, &identifier, epoch)
    }

    fn save<B: Backend, M: Module<B>>(
        &self,
        model: &M,
        identifier: &str,
        epoch: usize,
    ) -> Result<PathBuf> {
        let record_path = self.dir.join(format!("{}.mpk", identifier));

        // The recorder appends its own extension, so the temporary stem
        // becomes `.{identifier}.tmp.mpk` on disk.
        let tmp_stem = self.dir.join(format!(".{}.tmp", identifier));
        let tmp_record = self.dir.join(format!(".{}.tmp.mpk", identifier));

        let recorder = CompactRecorder::new();
        model
            .clone()
            .save_file(tmp_stem, &recorder)
            .map_err(|e| RehearserError::checkpoint(&record_path, e))?;
        fs::rename(&tmp_record, &record_path).map_err(|e| RehearserError::CheckpointIo {
            path: record_path.clone(),
            source: e,
        })?;

        let meta = CheckpointMeta { epoch: epoch + 1 };
        let meta_path = self.dir.join(format!("{}.meta.json", identifier));
        let tmp_meta = self.dir.join(format!(".{}.meta.tmp", identifier));
        let json = serde_json::to_string_pretty(&meta)
            .map_err(|e| RehearserError::checkpoint(&meta_path, e))?;
        fs::write(&tmp_meta, json).map_err(|e| RehearserError::CheckpointIo {
            path: meta_path.clone(),
            source: e,
        })?;
        fs::rename(&tmp_meta, &meta_path).map_err(|e| RehearserError::CheckpointIo {
            path: meta_path.clone(),
            source: e,
        })?;

        info!(
            "Checkpoint saved to {:?} (epoch {})",
            record_path, meta.epoch
        );
        Ok(record_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_periodic_cadence_over_sixty_epochs() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path(), 10).unwrap();

        let due: Vec<usize> = (0..60).filter(|&e| manager.periodic_due(e)).collect();
        assert_eq!(due, vec![9, 19, 29, 39, 49, 59]);
    }

    #[test]
    fn test_short_run_never_triggers_periodic_saves() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path(), 10).unwrap();

        assert!((0..3).all(|e| !manager.periodic_due(e)));
    }

    #[test]
    fn test_identifiers_are_unique_per_dataset_and_epoch() {
        let periodic: Vec<String> = [9, 19, 29]
            .iter()
            .map(|&e| CheckpointManager::periodic_identifier("market1501", e))
            .collect();
        assert_eq!(periodic[0], "market1501_rehearser_9");

        let mut unique = periodic.clone();
        unique.push(CheckpointManager::final_identifier("market1501"));
        unique.push(CheckpointManager::periodic_identifier("cuhk03", 9));
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 5);
    }

    #[cfg(feature = "ndarray")]
    mod save_tests {
        use super::*;
        use crate::model::End2End;

        type B = burn_ndarray::NdArray;

        #[test]
        fn test_save_writes_record_and_meta() {
            let dir = tempfile::tempdir().unwrap();
            let manager = CheckpointManager::new(dir.path(), 10).unwrap();
            let device = Default::default();
            let model = End2End::<B>::new(1, &device);

            let path = manager.save_final(&model, "market1501", 59).unwrap();
            assert!(path.exists());
            assert_eq!(path.file_name().unwrap(), "market1501_rehearser.mpk");

            let meta: CheckpointMeta = serde_json::from_str(
                &std::fs::read_to_string(dir.path().join("market1501_rehearser.meta.json"))
                    .unwrap(),
            )
            .unwrap();
            assert_eq!(meta.epoch, 60);

            // The temporary names must not survive the rename.
            let leftovers: Vec<_> = std::fs::read_dir(dir.path())
                .unwrap()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_name().to_string_lossy().contains(".tmp"))
                .collect();
            assert!(leftovers.is_empty());
        }

        #[test]
        fn test_same_identifier_overwrites() {
            let dir = tempfile::tempdir().unwrap();
            let manager = CheckpointManager::new(dir.path(), 10).unwrap();
            let device = Default::default();
            let model = End2End::<B>::new(1, &device);

            manager.save_final(&model, "cuhk03", 1).unwrap();
            manager.save_final(&model, "cuhk03", 2).unwrap();

            let records: Vec<_> = std::fs::read_dir(dir.path())
                .unwrap()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_name().to_string_lossy().ends_with(".mpk"))
                .collect();
            assert_eq!(records.len(), 1);

            let meta: CheckpointMeta = serde_json::from_str(
                &std::fs::read_to_string(dir.path().join("cuhk03_rehearser.meta.json")).unwrap(),
            )
            .unwrap();
            assert_eq!(meta.epoch, 3);
        }

        #[test]
        fn test_off_cadence_epoch_skips_periodic_save() {
            let dir = tempfile::tempdir().unwrap();
            let manager = CheckpointManager::new(dir.path(), 10).unwrap();
            let device = Default::default();
            let model = End2End::<B>::new(1, &device);

            assert!(manager
                .save_periodic(&model, "msmt17", 3)
                .unwrap()
                .is_none());
            let saved = manager.save_periodic(&model, "msmt17", 9).unwrap();
            assert!(saved.unwrap().ends_with("msmt17_rehearser_9.mpk"));
        }
    }
}
