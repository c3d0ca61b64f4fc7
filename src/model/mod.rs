//! Rehearser model architectures
//!
//! Three variants of the generative style-transfer ("rehearser") network:
//! kernel prediction (`KernelLearning`), a shallow end-to-end convolution
//! stack (`End2End`) and a backbone-reconstruction baseline (`BaselineNet`).
//! All map an image batch to an image batch of the same shape.

pub mod baseline;
pub mod end2end;
pub mod factory;
pub mod kernel_learning;

pub use baseline::BaselineNet;
pub use end2end::End2End;
pub use factory::{build_rehearser, Backbone, ModelSelection};
pub use kernel_learning::KernelLearning;

use burn::{
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        PaddingConfig2d, Relu,
    },
    tensor::{backend::Backend, Tensor},
};

/// Image-to-image forward pass shared by all rehearser variants
pub trait StyleTransfer<B: Backend> {
    /// Transform a `[batch, 3, height, width]` image batch into an image
    /// batch of the same shape with values in `[0, 1]`.
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4>;
}

/// A convolutional block with Conv2d, ReLU, and optional MaxPool
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    conv: Conv2d<B>,
    relu: Relu,
    pool: Option<MaxPool2d>,
}

impl<B: Backend> ConvBlock<B> {
    /// Create a new convolutional block
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        with_pool: bool,
        device: &B::Device,
    ) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [kernel_size, kernel_size])
            .with_padding(PaddingConfig2d::Same)
            .init(device);

        let pool = if with_pool {
            Some(MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init())
        } else {
            None
        };

        Self {
            conv,
            relu: Relu::new(),
            pool,
        }
    }

    /// Forward pass through the block
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.relu.forward(x);

        match &self.pool {
            Some(pool) => pool.forward(x),
            None => x,
        }
    }
}

/// The single active rehearser instance for one dataset's training run
#[derive(Debug)]
pub enum Rehearser<B: Backend> {
    KernelLearning(KernelLearning<B>),
    End2End(End2End<B>),
    DeepNet(BaselineNet<B>),
}

impl<B: Backend> Rehearser<B> {
    /// Human-readable variant name
    pub fn variant_name(&self) -> &'static str {
        match self {
            Rehearser::KernelLearning(_) => "kernel-learning",
            Rehearser::End2End(_) => "end-to-end",
            Rehearser::DeepNet(_) => "deep-net",
        }
    }
}

impl<B: Backend> StyleTransfer<B> for Rehearser<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        match self {
            Rehearser::KernelLearning(model) => model.forward(images),
            Rehearser::End2End(model) => model.forward(images),
            Rehearser::DeepNet(model) => model.forward(images),
        }
    }
}
