//! Backbone-reconstruction rehearser
//!
//! A deeper encoder/decoder that learns to reconstruct the target style:
//! three strided convolutional blocks compress the image, three transposed
//! convolutions expand it back to full resolution.

use burn::{
    module::Module,
    nn::{
        conv::{ConvTranspose2d, ConvTranspose2dConfig},
        Relu,
    },
    tensor::{activation::sigmoid, backend::Backend, Tensor},
};

use super::{ConvBlock, StyleTransfer};

/// Encoder/decoder reconstruction rehearser
#[derive(Module, Debug)]
pub struct BaselineNet<B: Backend> {
    enc1: ConvBlock<B>,
    enc2: ConvBlock<B>,
    enc3: ConvBlock<B>,
    dec1: ConvTranspose2d<B>,
    dec2: ConvTranspose2d<B>,
    dec3: ConvTranspose2d<B>,
    relu: Relu,
}

impl<B: Backend> BaselineNet<B> {
    /// Create a new reconstruction rehearser
    pub fn new(device: &B::Device) -> Self {
        let enc1 = ConvBlock::new(3, 32, 3, true, device);
        let enc2 = ConvBlock::new(32, 64, 3, true, device);
        let enc3 = ConvBlock::new(64, 128, 3, true, device);

        // Kernel 4, stride 2, padding 1 doubles each spatial dimension.
        let dec1 = ConvTranspose2dConfig::new([128, 64], [4, 4])
            .with_stride([2, 2])
            .with_padding([1, 1])
            .init(device);
        let dec2 = ConvTranspose2dConfig::new([64, 32], [4, 4])
            .with_stride([2, 2])
            .with_padding([1, 1])
            .init(device);
        let dec3 = ConvTranspose2dConfig::new([32, 3], [4, 4])
            .with_stride([2, 2])
            .with_padding([1, 1])
            .init(device);

        Self {
            enc1,
            enc2,
            enc3,
            dec1,
            dec2,
            dec3,
            relu: Relu::new(),
        }
    }
}

impl<B: Backend> StyleTransfer<B> for BaselineNet<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.enc1.forward(images);
        let x = self.enc2.forward(x);
        let x = self.enc3.forward(x);

        let x = self.relu.forward(self.dec1.forward(x));
        let x = self.relu.forward(self.dec2.forward(x));
        sigmoid(self.dec3.forward(x))
    }
}
