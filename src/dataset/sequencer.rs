//! Dataset Sequencer
//!
//! Resolves a training-order `setting` id into the ordered list of datasets
//! to train on plus the disjoint set of datasets reserved for testing only.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::DECLARED_SETTINGS;
use crate::utils::error::{RehearserError, Result};

/// The person re-identification datasets this system knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatasetId {
    Market1501,
    Dukemtmc,
    Msmt17,
    CuhkSysu,
    Cuhk03,
}

/// The fixed universe of known datasets
pub const ALL_DATASETS: [DatasetId; 5] = [
    DatasetId::Market1501,
    DatasetId::Dukemtmc,
    DatasetId::Msmt17,
    DatasetId::CuhkSysu,
    DatasetId::Cuhk03,
];

impl DatasetId {
    /// Canonical dataset name, also the sub-directory name under the data root
    pub fn as_str(self) -> &'static str {
        match self {
            DatasetId::Market1501 => "market1501",
            DatasetId::Dukemtmc => "dukemtmc",
            DatasetId::Msmt17 => "msmt17",
            DatasetId::CuhkSysu => "cuhk_sysu",
            DatasetId::Cuhk03 => "cuhk03",
        }
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved training order plus the held-out testing-only datasets
///
/// Invariant: the two sets are disjoint and every training dataset is drawn
/// from [`ALL_DATASETS`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSpec {
    /// Datasets to train on, in order
    pub training: Vec<DatasetId>,
    /// Datasets reserved for evaluation only
    pub testing_only: Vec<DatasetId>,
}

/// Resolve the training order for a `setting` id.
///
/// Setting `1` is the only order with a defined resolution; the remaining
/// declared values are reserved and reported as configuration errors, and
/// undeclared values are rejected outright.
pub fn resolve_training_sets(setting: u32) -> Result<DatasetSpec> {
    if !DECLARED_SETTINGS.contains(&setting) {
        return Err(RehearserError::Config(format!(
            "setting {} is not one of the declared values {:?}",
            setting, DECLARED_SETTINGS
        )));
    }

    let training: Vec<DatasetId> = match setting {
        1 => vec![
            DatasetId::Market1501,
            DatasetId::CuhkSysu,
            DatasetId::Msmt17,
            DatasetId::Dukemtmc,
            DatasetId::Cuhk03,
        ],
        other => {
            return Err(RehearserError::Config(format!(
                "training order for setting {} is not specified",
                other
            )))
        }
    };

    let testing_only: Vec<DatasetId> = ALL_DATASETS
        .iter()
        .copied()
        .filter(|id| !training.contains(id))
        .collect();

    Ok(DatasetSpec {
        training,
        testing_only,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setting_one_order() {
        let spec = resolve_training_sets(1).unwrap();
        let names: Vec<&str> = spec.training.iter().map(|id| id.as_str()).collect();
        assert_eq!(
            names,
            vec!["market1501", "cuhk_sysu", "msmt17", "dukemtmc", "cuhk03"]
        );
    }

    #[test]
    fn test_setting_one_has_no_testing_only_sets() {
        let spec = resolve_training_sets(1).unwrap();
        assert!(spec.testing_only.is_empty());
    }

    #[test]
    fn test_training_and_testing_are_disjoint() {
        let spec = resolve_training_sets(1).unwrap();
        for id in &spec.testing_only {
            assert!(!spec.training.contains(id));
        }
    }

    #[test]
    fn test_undeclared_setting_rejected() {
        let err = resolve_training_sets(3).unwrap_err();
        assert!(matches!(err, RehearserError::Config(_)));
    }

    #[test]
    fn test_declared_but_unspecified_setting_errors_at_resolution() {
        for setting in [2u32, 51, 52, 53, 54, 55] {
            let err = resolve_training_sets(setting).unwrap_err();
            let text = format!("{}", err);
            assert!(text.contains(&setting.to_string()), "message: {}", text);
        }
    }
}
