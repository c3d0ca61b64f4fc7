//! Model Factory
//!
//! Validates the mutually exclusive variant-selection flags into a closed
//! `ModelSelection` and instantiates exactly one fresh rehearser from it.
//! The continual loop calls the factory once per dataset, so no model state
//! ever crosses dataset boundaries.

use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{BaselineNet, End2End, KernelLearning, Rehearser};
use crate::config::RunConfig;
use crate::utils::error::{RehearserError, Result};

/// Backbone of the kernel-prediction rehearser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Backbone {
    MobileV3,
    ShuffleNetV2,
}

impl Backbone {
    /// Canonical backbone tag
    pub fn as_str(self) -> &'static str {
        match self {
            Backbone::MobileV3 => "mobile-v3",
            Backbone::ShuffleNetV2 => "shufflenet_v2",
        }
    }

    /// Channel widths of the convolutional backbone
    fn widths(self) -> [usize; 3] {
        match self {
            Backbone::MobileV3 => [16, 24, 40],
            Backbone::ShuffleNetV2 => [24, 48, 96],
        }
    }
}

/// The validated rehearser variant choice
///
/// Exactly one of the three CLI selector flags must be set; zero or several
/// flags are configuration errors instead of a deferred crash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelSelection {
    KernelLearning {
        n_kernel: usize,
        groups: usize,
        backbone: Backbone,
    },
    EndToEnd {
        n_kernel: usize,
    },
    DeepNet,
}

impl ModelSelection {
    /// Validate the selector flags of a run configuration.
    pub fn from_config(config: &RunConfig) -> Result<Self> {
        let selected = [config.learn_kernel, config.end_to_end, config.deep_net]
            .iter()
            .filter(|&&flag| flag)
            .count();

        match selected {
            0 => Err(RehearserError::Config(
                "no rehearser variant selected; pass exactly one of \
                 --learn_kernel, --end_to_end, --deep_net"
                    .to_string(),
            )),
            1 => Ok(if config.learn_kernel {
                let backbone = if config.mobile {
                    Backbone::MobileV3
                } else {
                    Backbone::ShuffleNetV2
                };
                ModelSelection::KernelLearning {
                    n_kernel: config.n_kernel,
                    groups: config.groups,
                    backbone,
                }
            } else if config.end_to_end {
                ModelSelection::EndToEnd {
                    n_kernel: config.n_kernel,
                }
            } else {
                ModelSelection::DeepNet
            }),
            _ => Err(RehearserError::Config(
                "--learn_kernel, --end_to_end and --deep_net are mutually \
                 exclusive; pass exactly one"
                    .to_string(),
            )),
        }
    }

    /// Human-readable variant name
    pub fn variant_name(&self) -> &'static str {
        match self {
            ModelSelection::KernelLearning { .. } => "kernel-learning",
            ModelSelection::EndToEnd { .. } => "end-to-end",
            ModelSelection::DeepNet => "deep-net",
        }
    }

    /// Backbone tag, for the kernel-prediction variant
    pub fn backbone(&self) -> Option<Backbone> {
        match self {
            ModelSelection::KernelLearning { backbone, .. } => Some(*backbone),
            _ => None,
        }
    }
}

/// Instantiate a fresh rehearser on the given device.
pub fn build_rehearser<B: Backend>(selection: &ModelSelection, device: &B::Device) -> Rehearser<B> {
    match selection {
        ModelSelection::KernelLearning {
            n_kernel,
            groups,
            backbone,
        } => {
            info!(
                "Creating kernel-prediction rehearser ({} backbone, {} kernels, {} groups)",
                backbone.as_str(),
                n_kernel,
                groups
            );
            Rehearser::KernelLearning(KernelLearning::new(
                *n_kernel,
                *groups,
                backbone.widths(),
                device,
            ))
        }
        ModelSelection::EndToEnd { n_kernel } => {
            info!("Creating end-to-end rehearser ({} kernels)", n_kernel);
            Rehearser::End2End(End2End::new(*n_kernel, device))
        }
        ModelSelection::DeepNet => {
            info!("Creating backbone-reconstruction rehearser");
            Rehearser::DeepNet(BaselineNet::new(device))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_flags(learn_kernel: bool, end_to_end: bool, deep_net: bool) -> RunConfig {
        RunConfig {
            learn_kernel,
            end_to_end,
            deep_net,
            ..Default::default()
        }
    }

    #[test]
    fn test_learn_kernel_with_mobile_backbone() {
        let config = RunConfig {
            mobile: true,
            n_kernel: 2,
            groups: 3,
            ..config_with_flags(true, false, false)
        };
        let selection = ModelSelection::from_config(&config).unwrap();
        assert_eq!(selection.backbone().unwrap().as_str(), "mobile-v3");
        assert_eq!(
            selection,
            ModelSelection::KernelLearning {
                n_kernel: 2,
                groups: 3,
                backbone: Backbone::MobileV3
            }
        );
    }

    #[test]
    fn test_learn_kernel_default_backbone() {
        let config = config_with_flags(true, false, false);
        let selection = ModelSelection::from_config(&config).unwrap();
        assert_eq!(selection.backbone().unwrap().as_str(), "shufflenet_v2");
    }

    #[test]
    fn test_end_to_end_variant() {
        let config = config_with_flags(false, true, false);
        let selection = ModelSelection::from_config(&config).unwrap();
        assert_eq!(selection.variant_name(), "end-to-end");
        assert!(selection.backbone().is_none());
    }

    #[test]
    fn test_deep_net_variant() {
        let config = config_with_flags(false, false, true);
        let selection = ModelSelection::from_config(&config).unwrap();
        assert_eq!(selection, ModelSelection::DeepNet);
    }

    #[test]
    fn test_no_flag_is_a_configuration_error() {
        let config = config_with_flags(false, false, false);
        let err = ModelSelection::from_config(&config).unwrap_err();
        assert!(matches!(err, RehearserError::Config(_)));
    }

    #[test]
    fn test_multiple_flags_are_a_configuration_error() {
        let config = config_with_flags(true, true, false);
        assert!(ModelSelection::from_config(&config).is_err());

        let config = config_with_flags(true, true, true);
        assert!(ModelSelection::from_config(&config).is_err());
    }

    #[cfg(feature = "ndarray")]
    #[test]
    fn test_factory_builds_each_variant() {
        use crate::model::StyleTransfer;
        use burn::tensor::Tensor;

        type B = burn_ndarray::NdArray;
        let device = Default::default();

        let kernel = build_rehearser::<B>(
            &ModelSelection::KernelLearning {
                n_kernel: 1,
                groups: 1,
                backbone: Backbone::ShuffleNetV2,
            },
            &device,
        );
        assert_eq!(kernel.variant_name(), "kernel-learning");

        let end2end = build_rehearser::<B>(&ModelSelection::EndToEnd { n_kernel: 1 }, &device);
        assert_eq!(end2end.variant_name(), "end-to-end");

        let deep = build_rehearser::<B>(&ModelSelection::DeepNet, &device);
        assert_eq!(deep.variant_name(), "deep-net");

        // The enum forwards like any of its variants.
        let input = Tensor::<B, 4>::zeros([1, 3, 16, 8], &device);
        assert_eq!(end2end.forward(input).dims(), [1, 3, 16, 8]);
    }
}
