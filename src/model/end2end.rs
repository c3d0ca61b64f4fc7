//! End-to-end rehearser
//!
//! Learns the style transfer directly through a shallow convolution stack.
//! The stack predicts a residual over the input, with its width scaled by
//! the number of distribution-transfer kernels.

use burn::{
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        PaddingConfig2d, Relu,
    },
    tensor::{backend::Backend, Tensor},
};

use super::StyleTransfer;

/// Shallow convolutional rehearser
#[derive(Module, Debug)]
pub struct End2End<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    conv3: Conv2d<B>,
    relu: Relu,
}

impl<B: Backend> End2End<B> {
    /// Create a new end-to-end rehearser with width `8 * n_kernel`
    pub fn new(n_kernel: usize, device: &B::Device) -> Self {
        let width = 8 * n_kernel;

        let conv1 = Conv2dConfig::new([3, width], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .init(device);
        let conv2 = Conv2dConfig::new([width, width], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .init(device);
        let conv3 = Conv2dConfig::new([width, 3], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .init(device);

        Self {
            conv1,
            conv2,
            conv3,
            relu: Relu::new(),
        }
    }
}

impl<B: Backend> StyleTransfer<B> for End2End<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.relu.forward(self.conv1.forward(images.clone()));
        let x = self.relu.forward(self.conv2.forward(x));
        let residual = self.conv3.forward(x);

        (images + residual).clamp(0.0, 1.0)
    }
}
