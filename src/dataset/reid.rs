//! Person re-identification dataset handle
//!
//! Scans one dataset directory (e.g. `data/market1501`) into an in-memory
//! index of identity-labelled image samples, and turns samples into
//! (style-source, original) training pairs. Images are loaded lazily; tests
//! use in-memory synthetic samples instead of files.
//!
//! Re-id file names carry the person id and camera as a prefix, e.g.
//! `0002_c1s1_000451_03.jpg`: person `2` seen by camera `1`. Negative ids
//! mark junk/distractor images and are skipped.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use burn::data::dataset::Dataset;
use burn::prelude::*;
use image::imageops::FilterType;
use image::ImageReader;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::augmentation::StyleAugmenter;
use crate::utils::error::{RehearserError, Result};

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// Where a sample's pixels come from
#[derive(Debug, Clone)]
enum ImageSource {
    /// Image file on disk, decoded and resized on access
    File(PathBuf),
    /// Pre-built CHW float image at the dataset's resolution (tests)
    Memory(Vec<f32>),
}

/// One identity-labelled sample
#[derive(Debug, Clone)]
struct ReidSample {
    source: ImageSource,
    /// Contiguous person-id label in `0..num_ids`
    pid: usize,
    /// Camera index parsed from the file name (0 when unknown)
    cam: usize,
}

/// A training pair ready for batching
#[derive(Debug, Clone)]
pub struct ReidItem {
    /// Style-source image, CHW floats in `[0, 1]`
    pub input: Vec<f32>,
    /// Original image the rehearser should produce, same layout
    pub target: Vec<f32>,
    /// Person-id label
    pub pid: usize,
    /// Camera index
    pub cam: usize,
}

/// One person re-identification dataset
#[derive(Debug, Clone)]
pub struct ReidDataset {
    name: String,
    samples: Vec<ReidSample>,
    num_ids: usize,
    height: usize,
    width: usize,
    augmenter: StyleAugmenter,
}

impl ReidDataset {
    /// Scan `root/name` for identity-labelled images.
    ///
    /// Fails if the directory is missing or contains no usable samples.
    pub fn scan(
        root: &Path,
        name: &str,
        height: usize,
        width: usize,
        augmenter: StyleAugmenter,
    ) -> Result<Self> {
        let dir = root.join(name);
        if !dir.is_dir() {
            return Err(RehearserError::data_load(
                name,
                format!("directory {:?} does not exist", dir),
            ));
        }

        info!("Scanning dataset '{}' at {:?}", name, dir);

        let mut entries: Vec<(PathBuf, i64, usize)> = Vec::new();
        for entry in WalkDir::new(&dir).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if !path.is_file() || !has_image_extension(path) {
                continue;
            }
            let stem = match path.file_stem().and_then(|s| s.to_str()) {
                Some(stem) => stem,
                None => continue,
            };
            if let Some((raw_pid, cam)) = parse_identity(stem) {
                if raw_pid < 0 {
                    continue; // junk/distractor image
                }
                entries.push((path.to_path_buf(), raw_pid, cam));
            }
        }

        if entries.is_empty() {
            return Err(RehearserError::data_load(
                name,
                format!("no identity-labelled images found under {:?}", dir),
            ));
        }

        entries.sort_by(|a, b| a.0.cmp(&b.0));

        // Relabel raw person ids to a contiguous 0..num_ids range.
        let mut pid_map: BTreeMap<i64, usize> = BTreeMap::new();
        for (_, raw_pid, _) in &entries {
            let next = pid_map.len();
            pid_map.entry(*raw_pid).or_insert(next);
        }

        let samples: Vec<ReidSample> = entries
            .into_iter()
            .map(|(path, raw_pid, cam)| ReidSample {
                source: ImageSource::File(path),
                pid: pid_map[&raw_pid],
                cam,
            })
            .collect();

        let num_ids = pid_map.len();
        debug!(
            "Dataset '{}': {} samples, {} identities",
            name,
            samples.len(),
            num_ids
        );

        Ok(Self {
            name: name.to_string(),
            samples,
            num_ids,
            height,
            width,
            augmenter,
        })
    }

    /// Build an in-memory dataset with deterministic pixel patterns.
    ///
    /// Used by tests and demos; `per_id` samples for each of `num_ids`
    /// identities.
    pub fn synthetic(
        name: &str,
        num_ids: usize,
        per_id: usize,
        height: usize,
        width: usize,
        augmenter: StyleAugmenter,
    ) -> Self {
        let plane = height * width;
        let mut samples = Vec::with_capacity(num_ids * per_id);

        for pid in 0..num_ids {
            for instance in 0..per_id {
                let mut image = vec![0.0f32; 3 * plane];
                for c in 0..3 {
                    let base = ((pid * 31 + instance * 7 + c * 13) % 97) as f32 / 97.0;
                    for (i, value) in image[c * plane..(c + 1) * plane].iter_mut().enumerate() {
                        *value = (base + i as f32 / (4 * plane) as f32).min(1.0);
                    }
                }
                samples.push(ReidSample {
                    source: ImageSource::Memory(image),
                    pid,
                    cam: instance % 2,
                });
            }
        }

        Self {
            name: name.to_string(),
            samples,
            num_ids,
            height,
            width,
            augmenter,
        }
    }

    /// Dataset name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of distinct identities
    pub fn num_ids(&self) -> usize {
        self.num_ids
    }

    /// Image height in pixels
    pub fn height(&self) -> usize {
        self.height
    }

    /// Image width in pixels
    pub fn width(&self) -> usize {
        self.width
    }

    /// Person-id label of each sample, in index order
    pub fn pids(&self) -> Vec<usize> {
        self.samples.iter().map(|s| s.pid).collect()
    }

    /// Load one sample as a (style-source, original) training pair
    pub fn item(&self, index: usize) -> Result<ReidItem> {
        let sample = self.samples.get(index).ok_or_else(|| {
            RehearserError::data_load(
                &self.name,
                format!("sample index {} out of range ({})", index, self.samples.len()),
            )
        })?;

        let target = match &sample.source {
            ImageSource::Memory(image) => image.clone(),
            ImageSource::File(path) => self.load_file(path)?,
        };
        let input = self.augmenter.apply(&target, self.height, self.width);

        Ok(ReidItem {
            input,
            target,
            pid: sample.pid,
            cam: sample.cam,
        })
    }

    fn load_file(&self, path: &Path) -> Result<Vec<f32>> {
        let img = ImageReader::open(path)
            .map_err(|e| RehearserError::data_load(&self.name, format!("{:?}: {}", path, e)))?
            .decode()
            .map_err(|e| RehearserError::data_load(&self.name, format!("{:?}: {}", path, e)))?
            .resize_exact(self.width as u32, self.height as u32, FilterType::Triangle)
            .to_rgb8();

        let plane = self.height * self.width;
        let mut image = vec![0.0f32; 3 * plane];
        for y in 0..self.height {
            for x in 0..self.width {
                let pixel = img.get_pixel(x as u32, y as u32);
                let i = y * self.width + x;
                image[i] = pixel[0] as f32 / 255.0;
                image[plane + i] = pixel[1] as f32 / 255.0;
                image[2 * plane + i] = pixel[2] as f32 / 255.0;
            }
        }
        Ok(image)
    }
}

impl Dataset<ReidItem> for ReidDataset {
    fn get(&self, index: usize) -> Option<ReidItem> {
        self.item(index).ok()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// Parse `(person_id, camera)` from a re-id file stem.
///
/// The person id is the leading `_`-separated token; the camera is taken
/// from a following `cN...` token when present.
fn parse_identity(stem: &str) -> Option<(i64, usize)> {
    let mut tokens = stem.split('_');
    let pid: i64 = tokens.next()?.parse().ok()?;

    let cam = tokens
        .find_map(|token| {
            let digits: String = token
                .strip_prefix('c')?
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            digits.parse::<usize>().ok()
        })
        .unwrap_or(0);

    Some((pid, cam))
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// A batch of (style-source, original) image pairs
#[derive(Clone, Debug)]
pub struct ReidBatch<B: Backend> {
    /// Style-source images, shape `[batch_size, 3, height, width]`
    pub inputs: Tensor<B, 4>,
    /// Original images the rehearser should reproduce, same shape
    pub targets: Tensor<B, 4>,
}

/// Builds tensors out of loader items
#[derive(Clone, Debug)]
pub struct ReidBatcher<B: Backend> {
    device: B::Device,
    height: usize,
    width: usize,
}

impl<B: Backend> ReidBatcher<B> {
    pub fn new(device: B::Device, height: usize, width: usize) -> Self {
        Self {
            device,
            height,
            width,
        }
    }

    /// Stack items into input/target tensors on the batcher's device
    pub fn batch(&self, items: &[ReidItem]) -> ReidBatch<B> {
        let batch_size = items.len();
        let shape = [batch_size, 3, self.height, self.width];

        let inputs_data: Vec<f32> = items.iter().flat_map(|item| item.input.clone()).collect();
        let targets_data: Vec<f32> = items.iter().flat_map(|item| item.target.clone()).collect();

        let inputs = Tensor::<B, 4>::from_floats(TensorData::new(inputs_data, shape), &self.device);
        let targets =
            Tensor::<B, 4>::from_floats(TensorData::new(targets_data, shape), &self.device);

        ReidBatch { inputs, targets }
    }
}
