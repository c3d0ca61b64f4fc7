//! Style-source derivation
//!
//! The rehearser is trained to undo a fixed style perturbation: the loader
//! feeds it a perturbed copy of each image as input and the original as
//! target. The perturbation is a deterministic function of the run
//! configuration so epochs stay comparable.

use crate::config::ColorStyle;

/// Derives the style-transfer source image from an original
#[derive(Debug, Clone, Copy)]
pub struct StyleAugmenter {
    color_style: ColorStyle,
    blur: bool,
}

impl StyleAugmenter {
    pub fn new(color_style: ColorStyle, blur: bool) -> Self {
        Self { color_style, blur }
    }

    /// Apply the configured perturbation to a CHW float image in `[0, 1]`
    pub fn apply(&self, image: &[f32], height: usize, width: usize) -> Vec<f32> {
        debug_assert_eq!(image.len(), 3 * height * width);

        let mut out = match self.color_style {
            ColorStyle::Rgb => image.to_vec(),
            ColorStyle::Lab => desaturate(image, height, width),
        };

        if self.blur {
            out = box_blur(&out, height, width);
        }

        out
    }
}

/// Push chroma halfway toward the luminance channel
fn desaturate(image: &[f32], height: usize, width: usize) -> Vec<f32> {
    let plane = height * width;
    let mut out = vec![0.0f32; 3 * plane];

    for i in 0..plane {
        let r = image[i];
        let g = image[plane + i];
        let b = image[2 * plane + i];
        let luma = 0.299 * r + 0.587 * g + 0.114 * b;

        out[i] = luma + 0.5 * (r - luma);
        out[plane + i] = luma + 0.5 * (g - luma);
        out[2 * plane + i] = luma + 0.5 * (b - luma);
    }

    out
}

/// 3x3 box blur per channel, clamped borders
fn box_blur(image: &[f32], height: usize, width: usize) -> Vec<f32> {
    let plane = height * width;
    let mut out = vec![0.0f32; 3 * plane];

    for c in 0..3 {
        let src = &image[c * plane..(c + 1) * plane];
        let dst = &mut out[c * plane..(c + 1) * plane];

        for y in 0..height {
            for x in 0..width {
                let mut sum = 0.0f32;
                for dy in -1i64..=1 {
                    for dx in -1i64..=1 {
                        let sy = (y as i64 + dy).clamp(0, height as i64 - 1) as usize;
                        let sx = (x as i64 + dx).clamp(0, width as i64 - 1) as usize;
                        sum += src[sy * width + sx];
                    }
                }
                dst[y * width + x] = sum / 9.0;
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant_image(value: f32, height: usize, width: usize) -> Vec<f32> {
        vec![value; 3 * height * width]
    }

    #[test]
    fn test_rgb_without_blur_is_identity() {
        let augmenter = StyleAugmenter::new(ColorStyle::Rgb, false);
        let image: Vec<f32> = (0..3 * 4 * 4).map(|i| i as f32 / 48.0).collect();
        assert_eq!(augmenter.apply(&image, 4, 4), image);
    }

    #[test]
    fn test_lab_reduces_chroma() {
        let augmenter = StyleAugmenter::new(ColorStyle::Lab, false);
        // Pure red pixel: chroma should shrink toward luminance.
        let mut image = constant_image(0.0, 1, 1);
        image[0] = 1.0;
        let out = augmenter.apply(&image, 1, 1);
        assert!(out[0] < 1.0);
        assert!(out[1] > 0.0);
    }

    #[test]
    fn test_blur_preserves_constant_images() {
        let augmenter = StyleAugmenter::new(ColorStyle::Rgb, true);
        let image = constant_image(0.5, 4, 4);
        let out = augmenter.apply(&image, 4, 4);
        for v in out {
            assert!((v - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn test_blur_smooths_edges() {
        let augmenter = StyleAugmenter::new(ColorStyle::Rgb, true);
        let mut image = constant_image(0.0, 3, 3);
        image[4] = 1.0; // centre pixel of the first channel
        let out = augmenter.apply(&image, 3, 3);
        assert!(out[4] < 1.0);
        assert!(out[0] > 0.0);
    }
}
