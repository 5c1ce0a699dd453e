//! Face identity dataset for Burn training loops.
//!
//! [`FaceDataset`] serves augmented face crops with their identity labels.
//! Following Burn's convention the dataset returns raw `f32` data and
//! [`FaceBatcher`] builds the tensors on the target device.

use std::{marker::PhantomData, path::Path};

use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    prelude::*,
    tensor::{backend::Backend, Int, TensorData},
};
use image::imageops::{self, FilterType};
use rand::{rngs::StdRng, RngCore, SeedableRng};
use tracing::{error, info};

use crate::{
    augmentation::{Frame, PlanarImage, Pipeline, ToTensor, Transform},
    config::FaceDatasetConfig,
    error::{DatasetError, DatasetResult},
    identity::IdentityKey,
    index::{IdentityIndex, IndexBuilder},
};

/// One augmented sample.
#[derive(Debug, Clone)]
pub struct FaceItem {
    /// Normalized image data in `[C, H, W]` order.
    pub image: Vec<f32>,
    /// Number of channels (3).
    pub channels: usize,
    /// Image height in pixels.
    pub height: usize,
    /// Image width in pixels.
    pub width: usize,
    /// Identity label, offset by `cur_id`.
    pub label: usize,
}

/// A batch of samples.
#[derive(Debug, Clone)]
pub struct FaceBatch<B: Backend> {
    /// Images with shape `[N, 3, H, W]`.
    pub images: Tensor<B, 4>,
    /// Labels with shape `[N]`.
    pub targets: Tensor<B, 1, Int>,
}

/// Stacks [`FaceItem`]s into a [`FaceBatch`].
#[derive(Clone, Default)]
pub struct FaceBatcher<B: Backend> {
    _phantom: PhantomData<B>,
}

impl<B: Backend> FaceBatcher<B> {
    /// Create a new face batcher.
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<B: Backend> Batcher<B, FaceItem, FaceBatch<B>> for FaceBatcher<B> {
    fn batch(&self, items: Vec<FaceItem>, device: &B::Device) -> FaceBatch<B> {
        let batch_size = items.len();

        let mut images = Vec::with_capacity(batch_size);
        let mut targets = Vec::with_capacity(batch_size);

        for item in items {
            let image = Tensor::<B, 3>::from_data(
                TensorData::new(item.image, [item.channels, item.height, item.width]),
                device,
            );
            images.push(image);
            targets.push(item.label as i64);
        }

        let images = Tensor::stack(images, 0);
        let targets =
            Tensor::<B, 1, Int>::from_data(TensorData::new(targets, [batch_size]), device);

        FaceBatch { images, targets }
    }
}

/// Dataset over a root of per-identity image folders.
///
/// The index is built once at construction and never mutated, so the dataset
/// can be shared across data loader workers.
pub struct FaceDataset {
    index: IdentityIndex,
    pipeline: Pipeline,
    phase: String,
    image_size: u32,
}

impl FaceDataset {
    /// Index `config.image_root` and build the configured augmentation pipeline.
    ///
    /// # Errors
    ///
    /// Fails on a missing root, unreadable directories, malformed identity
    /// folder names or invalid augmentation parameters.
    pub fn new(config: &FaceDatasetConfig) -> DatasetResult<Self> {
        let pipeline = Pipeline::from_config(&config.augmentation, config.image_size)?;
        Self::with_pipeline(config, pipeline)
    }

    /// Like [`FaceDataset::new`], with a caller-supplied pipeline.
    pub fn with_pipeline(config: &FaceDatasetConfig, pipeline: Pipeline) -> DatasetResult<Self> {
        if config.annotation_folder.is_some() {
            info!("annotation_folder is set but not used by this dataset");
        }

        let index = IndexBuilder::from_config(config).build()?;

        Ok(Self {
            index,
            pipeline,
            phase: config.phase.clone(),
            image_size: config.image_size,
        })
    }

    /// Number of labelled identities.
    pub fn class_count(&self) -> usize {
        self.index.class_count()
    }

    /// Identity keys in label order.
    pub fn identities(&self) -> &[IdentityKey] {
        self.index.identities()
    }

    /// The underlying directory index.
    pub const fn index(&self) -> &IdentityIndex {
        &self.index
    }

    /// Phase tag given at construction.
    pub fn phase(&self) -> &str {
        &self.phase
    }

    /// Offset of the first label.
    pub const fn cur_id(&self) -> usize {
        self.index.cur_id()
    }

    /// Load sample `index` with thread-local randomness.
    ///
    /// # Errors
    ///
    /// `IndexOutOfBounds`, `UnregisteredIdentity` for junk images kept by
    /// `JunkPolicy::FailFast`, `ImageOpenFailed` for unreadable files.
    pub fn try_get(&self, index: usize) -> DatasetResult<FaceItem> {
        self.get_with_rng(index, &mut rand::rng())
    }

    /// Load sample `index` with a seeded rng; equal seeds give equal output.
    pub fn get_with_seed(&self, index: usize, seed: u64) -> DatasetResult<FaceItem> {
        self.get_with_rng(index, &mut StdRng::seed_from_u64(seed))
    }

    /// Load sample `index`, drawing augmentation randomness from `rng`.
    pub fn get_with_rng(&self, index: usize, rng: &mut dyn RngCore) -> DatasetResult<FaceItem> {
        let label = self.index.label_for_sample(index)?;
        let path = self
            .index
            .sample_path(index)
            .ok_or(DatasetError::IndexOutOfBounds {
                index,
                len: self.len(),
            })?;

        let frame = Frame::Pixels(self.load(path)?);
        let planar = match self.pipeline.apply(frame, rng)? {
            Frame::Planar(planar) => planar,
            pixels @ Frame::Pixels(_) => ToTensor.apply(pixels, rng)?.into_planar("FaceDataset")?,
        };

        let PlanarImage {
            data,
            channels,
            height,
            width,
        } = planar;
        Ok(FaceItem {
            image: data,
            channels,
            height,
            width,
            label,
        })
    }

    /// Decode as RGB and resize to the configured square.
    fn load(&self, path: &Path) -> DatasetResult<image::RgbImage> {
        let image = image::open(path).map_err(|source| DatasetError::ImageOpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(imageops::resize(
            &image.to_rgb8(),
            self.image_size,
            self.image_size,
            FilterType::Triangle,
        ))
    }
}

impl Dataset<FaceItem> for FaceDataset {
    /// Returns `None` past the end.
    ///
    /// # Panics
    ///
    /// Panics when the sample cannot be produced (unregistered identity,
    /// unreadable image); a broken sample is fatal rather than skipped.
    fn get(&self, index: usize) -> Option<FaceItem> {
        match self.try_get(index) {
            Ok(item) => Some(item),
            Err(DatasetError::IndexOutOfBounds { .. }) => None,
            Err(err) => {
                error!(index, error = %err, "Failed to load sample");
                panic!("failed to load sample {index}: {err}");
            }
        }
    }

    fn len(&self) -> usize {
        self.index.len()
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeSet, fs};

    use burn::data::dataloader::batcher::Batcher;
    use image::{ImageBuffer, Rgb, RgbImage};
    use tempfile::TempDir;

    use super::*;
    use crate::config::{AugmentationConfig, JunkPolicy};

    type TestBackend = burn::backend::ndarray::NdArray<f32>;

    fn face(width: u32, height: u32, seed: u8) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([
                (x as u8).wrapping_mul(3).wrapping_add(seed),
                (y as u8).wrapping_mul(5),
                seed.wrapping_mul(17),
            ])
        })
    }

    /// Write `count` JPEGs of the given size into each folder.
    fn dataset_root(folders: &[(&str, usize, (u32, u32))]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (i, (folder, count, (w, h))) in folders.iter().enumerate() {
            let folder_path = dir.path().join(folder);
            fs::create_dir_all(&folder_path).unwrap();
            for n in 0..*count {
                face(*w, *h, i as u8 * 40 + n as u8)
                    .save(folder_path.join(format!("{n:03}.jpg")))
                    .unwrap();
            }
        }
        dir
    }

    fn config(root: &TempDir) -> FaceDatasetConfig {
        FaceDatasetConfig::new().with_image_root(root.path().to_path_buf())
    }

    fn assert_face_shape(item: &FaceItem) {
        assert_eq!((item.channels, item.height, item.width), (3, 112, 112));
        assert_eq!(item.image.len(), 3 * 112 * 112);
    }

    #[test]
    fn junk_image_fails_fast_when_kept() {
        let root = dataset_root(&[
            ("id_0000_1", 1, (112, 112)),
            ("id_0001_2", 1, (112, 112)),
            ("id_0001_-1", 1, (112, 112)),
        ]);
        let dataset =
            FaceDataset::new(&config(&root).with_junk_policy(JunkPolicy::FailFast)).unwrap();

        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.class_count(), 2);

        let mut failures = 0;
        for i in 0..dataset.len() {
            match dataset.try_get(i) {
                Ok(item) => assert_face_shape(&item),
                Err(DatasetError::UnregisteredIdentity { .. }) => failures += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(failures, 1);
    }

    #[test]
    fn junk_image_is_dropped_by_default() {
        let root = dataset_root(&[
            ("id_0000_1", 1, (112, 112)),
            ("id_0001_2", 1, (112, 112)),
            ("id_0001_-1", 1, (112, 112)),
        ]);
        let dataset = FaceDataset::new(&config(&root)).unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.class_count(), 2);
        for i in 0..dataset.len() {
            assert!(dataset.get(i).is_some());
        }
    }

    #[test]
    fn samples_are_112_square_for_any_source_size() {
        let root = dataset_root(&[
            ("small_1", 1, (40, 60)),
            ("wide_2", 1, (250, 90)),
            ("exact_3", 1, (112, 112)),
        ]);
        let dataset = FaceDataset::new(&config(&root)).unwrap();

        for i in 0..dataset.len() {
            assert_face_shape(&dataset.try_get(i).unwrap());
        }
    }

    #[test]
    fn labels_are_dense_from_cur_id() {
        let root = dataset_root(&[
            ("p_10", 2, (64, 64)),
            ("p_20", 1, (64, 64)),
            ("p_30", 1, (64, 64)),
        ]);
        let dataset = FaceDataset::new(&config(&root).with_cur_id(1000)).unwrap();

        let labels: BTreeSet<usize> = (0..dataset.len())
            .map(|i| dataset.try_get(i).unwrap().label)
            .collect();
        assert_eq!(labels, (1000..1003).collect());
        assert_eq!(dataset.cur_id(), 1000);

        let keys: Vec<&str> = dataset.identities().iter().map(|k| k.as_str()).collect();
        assert_eq!(keys, ["GlintAsia_10", "GlintAsia_20", "GlintAsia_30"]);
    }

    #[test]
    fn same_seed_gives_identical_samples() {
        let root = dataset_root(&[("p_1", 1, (120, 120))]);
        let dataset = FaceDataset::new(&config(&root)).unwrap();

        let a = dataset.get_with_seed(0, 1234).unwrap();
        let b = dataset.get_with_seed(0, 1234).unwrap();
        assert_eq!(a.image, b.image);
        assert_eq!(a.label, b.label);
    }

    #[test]
    fn unseeded_calls_are_stochastic() {
        let root = dataset_root(&[("p_1", 1, (120, 120))]);
        let dataset = FaceDataset::new(&config(&root)).unwrap();

        let a = dataset.try_get(0).unwrap();
        let b = dataset.try_get(0).unwrap();
        assert_ne!(a.image, b.image);
    }

    #[test]
    fn evaluation_augmentation_is_deterministic() {
        let root = dataset_root(&[("p_1", 1, (80, 80))]);
        let dataset = FaceDataset::new(
            &config(&root).with_augmentation(AugmentationConfig::evaluation()),
        )
        .unwrap();

        let a = dataset.try_get(0).unwrap();
        let b = dataset.try_get(0).unwrap();
        assert_eq!(a.image, b.image);
        assert_face_shape(&a);
    }

    #[test]
    fn phase_is_stored() {
        let root = dataset_root(&[("p_1", 1, (32, 32))]);
        let dataset = FaceDataset::new(&config(&root).with_phase("val".to_string())).unwrap();
        assert_eq!(dataset.phase(), "val");
    }

    #[test]
    fn past_the_end_is_none() {
        let root = dataset_root(&[("p_1", 1, (32, 32))]);
        let dataset = FaceDataset::new(&config(&root)).unwrap();

        assert!(dataset.get(1).is_none());
        assert!(matches!(
            dataset.try_get(1),
            Err(DatasetError::IndexOutOfBounds { index: 1, len: 1 })
        ));
    }

    #[test]
    fn corrupt_image_is_an_open_error() {
        let root = dataset_root(&[("p_1", 0, (32, 32))]);
        fs::write(root.path().join("p_1").join("broken.jpg"), b"not a jpeg").unwrap();
        let dataset = FaceDataset::new(&config(&root)).unwrap();

        assert!(matches!(
            dataset.try_get(0),
            Err(DatasetError::ImageOpenFailed { .. })
        ));
    }

    #[test]
    #[should_panic(expected = "failed to load sample 0")]
    fn corrupt_image_is_fatal_through_dataset_trait() {
        let root = dataset_root(&[("p_1", 0, (32, 32))]);
        fs::write(root.path().join("p_1").join("broken.jpg"), b"not a jpeg").unwrap();
        let dataset = FaceDataset::new(&config(&root)).unwrap();

        let _ = dataset.get(0);
    }

    #[test]
    fn custom_pipeline_without_tensor_stage_still_yields_planar_data() {
        let root = dataset_root(&[("p_1", 1, (50, 50))]);
        let dataset = FaceDataset::with_pipeline(&config(&root), Pipeline::new()).unwrap();

        let item = dataset.try_get(0).unwrap();
        assert_face_shape(&item);
        assert!(item.image.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn batcher_stacks_images_and_labels() {
        let device = Default::default();
        let batcher = FaceBatcher::<TestBackend>::new();

        let items = (0..4)
            .map(|label| FaceItem {
                image: vec![0.25; 3 * 112 * 112],
                channels: 3,
                height: 112,
                width: 112,
                label,
            })
            .collect();
        let batch = batcher.batch(items, &device);

        assert_eq!(batch.images.dims(), [4, 3, 112, 112]);
        assert_eq!(batch.targets.dims(), [4]);
        let labels: Vec<i64> = batch.targets.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(labels, vec![0, 1, 2, 3]);
    }
}
