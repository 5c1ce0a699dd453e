//! Stochastic augmentation pipeline for face crops.
//!
//! Every stage is an independent [`Transform`] and a [`Pipeline`] runs them
//! in order. Stages before [`ToTensor`] work on 8-bit RGB pixels; later stages
//! work on a channel-first float [`PlanarImage`]. The default training
//! pipeline is:
//!
//! 1. [`RandomRotation`] (±30°)
//! 2. [`RandomResizedCrop`] (112×112, scale 0.8–1.0)
//! 3. [`ColorJitter`] (brightness 0.2, contrast 0.15, saturation 0.1)
//! 4. [`RandomHorizontalFlip`] (p = 0.5)
//! 5. [`ToTensor`]
//! 6. [`ColorAugmentation`] (PCA lighting noise)
//! 7. [`RandomErasing`] (2%–20% of the area)
//! 8. [`Normalize`]
//!
//! All randomness is drawn from the rng handed to [`Pipeline::apply`], so a
//! seeded rng reproduces the exact output.

mod geometric;
mod photometric;
mod tensor;

use image::RgbImage;
use rand::RngCore;

pub use geometric::{RandomHorizontalFlip, RandomResizedCrop, RandomRotation};
pub use photometric::ColorJitter;
pub use tensor::{ColorAugmentation, Normalize, RandomErasing, ToTensor};

use crate::{
    config::AugmentationConfig,
    error::{DatasetError, DatasetResult},
};

/// Channel-first float image, `data.len() == channels * height * width`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanarImage {
    /// Pixel values in `[C, H, W]` order.
    pub data: Vec<f32>,
    /// Number of channels.
    pub channels: usize,
    /// Height in pixels.
    pub height: usize,
    /// Width in pixels.
    pub width: usize,
}

impl PlanarImage {
    /// Index of `(channel, row, col)` in `data`.
    pub const fn offset(&self, channel: usize, row: usize, col: usize) -> usize {
        (channel * self.height + row) * self.width + col
    }

    /// Mutable view of one channel plane.
    pub fn plane_mut(&mut self, channel: usize) -> &mut [f32] {
        let plane = self.height * self.width;
        &mut self.data[channel * plane..(channel + 1) * plane]
    }
}

/// Image flowing through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Decoded 8-bit RGB image.
    Pixels(RgbImage),
    /// Float tensor data after [`ToTensor`].
    Planar(PlanarImage),
}

impl Frame {
    /// Unwrap the pixel representation for `transform`.
    pub fn into_pixels(self, transform: &'static str) -> DatasetResult<RgbImage> {
        match self {
            Self::Pixels(image) => Ok(image),
            Self::Planar(_) => Err(DatasetError::UnexpectedFrame {
                transform,
                expected: "pixel",
            }),
        }
    }

    /// Unwrap the planar representation for `transform`.
    pub fn into_planar(self, transform: &'static str) -> DatasetResult<PlanarImage> {
        match self {
            Self::Planar(planar) => Ok(planar),
            Self::Pixels(_) => Err(DatasetError::UnexpectedFrame {
                transform,
                expected: "planar",
            }),
        }
    }
}

/// One augmentation stage.
pub trait Transform: Send + Sync {
    /// Short name used in error messages.
    fn name(&self) -> &'static str;

    /// Transform `frame`, drawing any randomness from `rng`.
    fn apply(&self, frame: Frame, rng: &mut dyn RngCore) -> DatasetResult<Frame>;
}

/// Ordered list of transforms.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn Transform>>,
}

impl Pipeline {
    /// Empty pipeline; applying it returns the frame unchanged.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage.
    #[must_use]
    pub fn then(mut self, stage: impl Transform + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Build the pipeline described by `config`, cropping to `size`×`size`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransformParameter` for unusable ranges or a zero std.
    pub fn from_config(config: &AugmentationConfig, size: u32) -> DatasetResult<Self> {
        let pipeline = if config.random_stages {
            Self::new()
                .then(RandomRotation::new(config.rotation_degrees)?)
                .then(RandomResizedCrop::new(
                    size,
                    config.crop_scale,
                    config.crop_ratio,
                )?)
                .then(ColorJitter::new(
                    config.brightness,
                    config.contrast,
                    config.saturation,
                    config.hue,
                )?)
                .then(RandomHorizontalFlip::new(config.flip_probability)?)
                .then(ToTensor)
                .then(ColorAugmentation::new(config.lighting_std)?)
                .then(RandomErasing::new(
                    config.erasing_probability,
                    config.erasing_area,
                    config.erasing_min_aspect,
                    config.mean,
                )?)
                .then(Normalize::new(config.mean, config.std)?)
        } else {
            Self::new()
                .then(ToTensor)
                .then(Normalize::new(config.mean, config.std)?)
        };

        Ok(pipeline)
    }

    /// Run every stage in order.
    pub fn apply(&self, mut frame: Frame, rng: &mut dyn RngCore) -> DatasetResult<Frame> {
        for stage in &self.stages {
            frame = stage.apply(frame, rng)?;
        }
        Ok(frame)
    }

    /// Names of the stages, in order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the pipeline has no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Reject a `(low, high)` range that is inverted or outside `bounds`.
pub(crate) fn check_range(
    transform: &'static str,
    what: &str,
    (low, high): (f32, f32),
    bounds: (f32, f32),
) -> DatasetResult<()> {
    if low <= high && low >= bounds.0 && high <= bounds.1 {
        Ok(())
    } else {
        Err(DatasetError::InvalidTransformParameter {
            transform,
            reason: format!(
                "{what} range ({low}, {high}) must be ordered and within [{}, {}]",
                bounds.0, bounds.1
            ),
        })
    }
}

/// Reject a probability outside `[0, 1]`.
pub(crate) fn check_probability(transform: &'static str, p: f64) -> DatasetResult<()> {
    if (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(DatasetError::InvalidTransformParameter {
            transform,
            reason: format!("probability {p} outside [0, 1]"),
        })
    }
}

#[cfg(test)]
mod tests {
    use image::{ImageBuffer, Rgb};
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    pub(crate) fn gradient(width: u32, height: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 5 % 256) as u8, ((x + y) % 256) as u8])
        })
    }

    fn planar(frame: Frame) -> PlanarImage {
        frame.into_planar("test").unwrap()
    }

    #[test]
    fn default_pipeline_has_eight_ordered_stages() {
        let pipeline = Pipeline::from_config(&AugmentationConfig::new(), 112).unwrap();
        assert_eq!(
            pipeline.stage_names(),
            [
                "RandomRotation",
                "RandomResizedCrop",
                "ColorJitter",
                "RandomHorizontalFlip",
                "ToTensor",
                "ColorAugmentation",
                "RandomErasing",
                "Normalize",
            ]
        );
    }

    #[test]
    fn evaluation_pipeline_only_converts_and_normalizes() {
        let pipeline = Pipeline::from_config(&AugmentationConfig::evaluation(), 112).unwrap();
        assert_eq!(pipeline.stage_names(), ["ToTensor", "Normalize"]);
    }

    #[test]
    fn pipeline_output_is_three_by_crop_size() {
        let pipeline = Pipeline::from_config(&AugmentationConfig::new(), 112).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let out = planar(
            pipeline
                .apply(Frame::Pixels(gradient(112, 112)), &mut rng)
                .unwrap(),
        );
        assert_eq!((out.channels, out.height, out.width), (3, 112, 112));
        assert_eq!(out.data.len(), 3 * 112 * 112);
    }

    #[test]
    fn same_seed_reproduces_output() {
        let pipeline = Pipeline::from_config(&AugmentationConfig::new(), 112).unwrap();
        let image = gradient(112, 112);

        let a = pipeline
            .apply(Frame::Pixels(image.clone()), &mut StdRng::seed_from_u64(42))
            .unwrap();
        let b = pipeline
            .apply(Frame::Pixels(image), &mut StdRng::seed_from_u64(42))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_give_different_output() {
        let pipeline = Pipeline::from_config(&AugmentationConfig::new(), 112).unwrap();
        let image = gradient(112, 112);

        let a = pipeline
            .apply(Frame::Pixels(image.clone()), &mut StdRng::seed_from_u64(1))
            .unwrap();
        let b = pipeline
            .apply(Frame::Pixels(image), &mut StdRng::seed_from_u64(2))
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn empty_pipeline_is_identity() {
        let image = gradient(4, 4);
        let out = Pipeline::new()
            .apply(Frame::Pixels(image.clone()), &mut StdRng::seed_from_u64(0))
            .unwrap();
        assert_eq!(out, Frame::Pixels(image));
    }

    #[test]
    fn pixel_stage_after_tensor_conversion_is_rejected() {
        let pipeline = Pipeline::new()
            .then(ToTensor)
            .then(RandomHorizontalFlip::new(1.0).unwrap());
        let err = pipeline
            .apply(Frame::Pixels(gradient(4, 4)), &mut StdRng::seed_from_u64(0))
            .unwrap_err();
        assert!(matches!(
            err,
            DatasetError::UnexpectedFrame {
                transform: "RandomHorizontalFlip",
                expected: "pixel"
            }
        ));
    }

    #[test]
    fn inverted_crop_scale_is_rejected() {
        let config = AugmentationConfig::new().with_crop_scale((1.0, 0.5));
        assert!(matches!(
            Pipeline::from_config(&config, 112),
            Err(DatasetError::InvalidTransformParameter { .. })
        ));
    }

    #[test]
    fn plane_offset_is_channel_major() {
        let image = PlanarImage {
            data: vec![0.0; 2 * 3 * 4],
            channels: 2,
            height: 3,
            width: 4,
        };
        assert_eq!(image.offset(0, 0, 0), 0);
        assert_eq!(image.offset(0, 1, 0), 4);
        assert_eq!(image.offset(1, 0, 0), 12);
        assert_eq!(image.offset(1, 2, 3), 23);
    }
}
