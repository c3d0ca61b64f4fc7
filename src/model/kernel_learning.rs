//! Kernel-prediction rehearser
//!
//! A small convolutional backbone summarizes the input image, and a linear
//! head predicts `n_kernel` candidate 3x3 colour-transfer kernels together
//! with mixture weights and a bias. The blended kernel is applied per pixel,
//! so the module learns an input-conditioned colour mapping rather than
//! fixed convolution weights. `groups == 3` restricts the kernels to
//! per-channel (diagonal) form.

use burn::{
    module::Module,
    nn::{
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        Linear, LinearConfig,
    },
    tensor::{activation::softmax, backend::Backend, Tensor, TensorData},
};

use super::{ConvBlock, StyleTransfer};

/// Rehearser that predicts distribution-transfer kernels per input image
#[derive(Module, Debug)]
pub struct KernelLearning<B: Backend> {
    block1: ConvBlock<B>,
    block2: ConvBlock<B>,
    block3: ConvBlock<B>,
    pool: AdaptiveAvgPool2d,
    head: Linear<B>,
    n_kernel: usize,
    groups: usize,
}

impl<B: Backend> KernelLearning<B> {
    /// Create a new kernel-prediction rehearser.
    ///
    /// `widths` are the backbone channel widths (chosen per backbone by the
    /// model factory).
    pub fn new(n_kernel: usize, groups: usize, widths: [usize; 3], device: &B::Device) -> Self {
        let block1 = ConvBlock::new(3, widths[0], 3, true, device);
        let block2 = ConvBlock::new(widths[0], widths[1], 3, true, device);
        let block3 = ConvBlock::new(widths[1], widths[2], 3, true, device);

        let pool = AdaptiveAvgPool2dConfig::new([1, 1]).init();

        // n_kernel 3x3 kernels + n_kernel mixture logits + 3 bias values
        let head = LinearConfig::new(widths[2], n_kernel * 9 + n_kernel + 3).init(device);

        Self {
            block1,
            block2,
            block3,
            pool,
            head,
            n_kernel,
            groups,
        }
    }

    /// Number of distribution-transfer kernels
    pub fn n_kernel(&self) -> usize {
        self.n_kernel
    }

    /// Convolution group count of each kernel
    pub fn groups(&self) -> usize {
        self.groups
    }

    /// Predict the blended colour kernel and bias for each image.
    ///
    /// Returns `([batch, 3, 3], [batch, 1, 3])`.
    fn predict_kernel(&self, images: Tensor<B, 4>) -> (Tensor<B, 3>, Tensor<B, 3>) {
        let device = images.device();
        let [batch, _, _, _] = images.dims();
        let k = self.n_kernel;

        let features = self.block3.forward(self.block2.forward(self.block1.forward(images)));
        let pooled = self.pool.forward(features);
        let [_, channels, _, _] = pooled.dims();
        let params = self.head.forward(pooled.reshape([batch, channels]));

        let kernels = params
            .clone()
            .slice([0..batch, 0..k * 9])
            .reshape([batch, k, 9]);
        let mix = softmax(params.clone().slice([0..batch, k * 9..k * 9 + k]), 1)
            .reshape([batch, k, 1]);
        let bias = params
            .slice([0..batch, k * 9 + k..k * 9 + k + 3])
            .reshape([batch, 1, 3]);

        let blended = (kernels * mix).sum_dim(1).reshape([batch, 3, 3]);

        // Residual around the identity mapping; with groups == 3 the learned
        // part is restricted to the diagonal.
        let eye = [1.0f32, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
        let mask_data: Vec<f32> = if self.groups == 3 {
            eye.to_vec()
        } else {
            vec![1.0; 9]
        };
        let mask = Tensor::<B, 3>::from_floats(TensorData::new(mask_data, [1, 3, 3]), &device);
        let identity = Tensor::<B, 3>::from_floats(TensorData::new(eye.to_vec(), [1, 3, 3]), &device);

        (blended * mask + identity, bias)
    }
}

impl<B: Backend> StyleTransfer<B> for KernelLearning<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        let [batch, channels, height, width] = images.dims();
        let (kernel, bias) = self.predict_kernel(images.clone());

        // Apply the colour kernel per pixel: [B, HW, 3] x [B, 3, 3]
        let pixels = images
            .reshape([batch, channels, height * width])
            .swap_dims(1, 2);
        let transferred = pixels.matmul(kernel.swap_dims(1, 2)) + bias;

        transferred
            .swap_dims(1, 2)
            .reshape([batch, channels, height, width])
            .clamp(0.0, 1.0)
    }
}

#[cfg(test)]
#[cfg(feature = "ndarray")]
mod tests {
    use super::*;

    type TestBackend = burn_ndarray::NdArray;

    #[test]
    fn test_output_shape_matches_input() {
        let device = Default::default();
        let model = KernelLearning::<TestBackend>::new(2, 1, [8, 12, 16], &device);

        let input = Tensor::<TestBackend, 4>::zeros([2, 3, 16, 8], &device);
        let output = model.forward(input);

        assert_eq!(output.dims(), [2, 3, 16, 8]);
    }

    #[test]
    fn test_output_stays_in_unit_range() {
        let device = Default::default();
        let model = KernelLearning::<TestBackend>::new(1, 3, [8, 12, 16], &device);

        let input = Tensor::<TestBackend, 4>::ones([1, 3, 16, 8], &device);
        let output = model.forward(input);

        let values: Vec<f32> = output.into_data().to_vec().unwrap();
        assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
    }
}
