//! Geometric transforms on RGB pixels: rotation, resized crop, flip.

use image::{
    imageops::{self, FilterType},
    Rgb, RgbImage,
};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use rand::{Rng, RngCore};

use super::{check_probability, check_range, Frame, Transform};
use crate::error::{DatasetError, DatasetResult};

/// Rotate about the image centre by a uniform angle in `[-degrees, degrees]`.
///
/// The canvas keeps its size; uncovered corners are filled with black.
#[derive(Debug, Clone)]
pub struct RandomRotation {
    degrees: f32,
}

impl RandomRotation {
    /// Rotation range `[-degrees, degrees]`; rejects negative or non-finite values.
    pub fn new(degrees: f32) -> DatasetResult<Self> {
        if !degrees.is_finite() || degrees < 0.0 {
            return Err(DatasetError::InvalidTransformParameter {
                transform: "RandomRotation",
                reason: format!("degrees must be finite and non-negative, got {degrees}"),
            });
        }
        Ok(Self { degrees })
    }
}

impl Transform for RandomRotation {
    fn name(&self) -> &'static str {
        "RandomRotation"
    }

    fn apply(&self, frame: Frame, rng: &mut dyn RngCore) -> DatasetResult<Frame> {
        let image = frame.into_pixels(self.name())?;
        let angle: f32 = rng.random_range(-self.degrees..=self.degrees);
        if angle == 0.0 {
            return Ok(Frame::Pixels(image));
        }

        let rotated = rotate_about_center(
            &image,
            angle.to_radians(),
            Interpolation::Bilinear,
            Rgb([0u8, 0u8, 0u8]),
        );
        Ok(Frame::Pixels(rotated))
    }
}

/// Crop a random region and resize it to `size`×`size`.
///
/// The region covers a uniform fraction of the source area drawn from `scale`
/// and has a log-uniform aspect ratio drawn from `ratio`. After ten failed
/// attempts the largest centred crop within `ratio` is used.
#[derive(Debug, Clone)]
pub struct RandomResizedCrop {
    size: u32,
    scale: (f32, f32),
    ratio: (f32, f32),
}

impl RandomResizedCrop {
    const ATTEMPTS: usize = 10;

    /// # Errors
    ///
    /// Rejects a zero `size` and inverted or non-positive `scale`/`ratio` ranges.
    pub fn new(size: u32, scale: (f32, f32), ratio: (f32, f32)) -> DatasetResult<Self> {
        if size == 0 {
            return Err(DatasetError::InvalidTransformParameter {
                transform: "RandomResizedCrop",
                reason: "output size must be positive".to_string(),
            });
        }
        check_range("RandomResizedCrop", "scale", scale, (f32::MIN_POSITIVE, 1.0))?;
        check_range("RandomResizedCrop", "ratio", ratio, (f32::MIN_POSITIVE, f32::MAX))?;
        Ok(Self { size, scale, ratio })
    }

    /// Pick `(x, y, width, height)` of the crop inside a `width`×`height` image.
    fn region(&self, width: u32, height: u32, rng: &mut dyn RngCore) -> (u32, u32, u32, u32) {
        let area = (width * height) as f32;
        let log_ratio = (self.ratio.0.ln(), self.ratio.1.ln());

        for _ in 0..Self::ATTEMPTS {
            let target_area = area * rng.random_range(self.scale.0..=self.scale.1);
            let aspect = rng.random_range(log_ratio.0..=log_ratio.1).exp();

            let crop_w = (target_area * aspect).sqrt().round() as u32;
            let crop_h = (target_area / aspect).sqrt().round() as u32;

            if crop_w > 0 && crop_h > 0 && crop_w <= width && crop_h <= height {
                let x = rng.random_range(0..=width - crop_w);
                let y = rng.random_range(0..=height - crop_h);
                return (x, y, crop_w, crop_h);
            }
        }

        let in_ratio = width as f32 / height as f32;
        let (crop_w, crop_h) = if in_ratio < self.ratio.0 {
            (width, ((width as f32 / self.ratio.0).round() as u32).clamp(1, height))
        } else if in_ratio > self.ratio.1 {
            (((height as f32 * self.ratio.1).round() as u32).clamp(1, width), height)
        } else {
            (width, height)
        };
        ((width - crop_w) / 2, (height - crop_h) / 2, crop_w, crop_h)
    }
}

impl Transform for RandomResizedCrop {
    fn name(&self) -> &'static str {
        "RandomResizedCrop"
    }

    fn apply(&self, frame: Frame, rng: &mut dyn RngCore) -> DatasetResult<Frame> {
        let image = frame.into_pixels(self.name())?;
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(DatasetError::InvalidTransformParameter {
                transform: self.name(),
                reason: "cannot crop an empty image".to_string(),
            });
        }

        let (x, y, crop_w, crop_h) = self.region(width, height, rng);
        let cropped = imageops::crop_imm(&image, x, y, crop_w, crop_h).to_image();
        let resized = imageops::resize(&cropped, self.size, self.size, FilterType::Triangle);
        Ok(Frame::Pixels(resized))
    }
}

/// Mirror the image left to right with probability `p`.
#[derive(Debug, Clone)]
pub struct RandomHorizontalFlip {
    p: f64,
}

impl RandomHorizontalFlip {
    /// Flip with probability `p` in `[0, 1]`.
    pub fn new(p: f64) -> DatasetResult<Self> {
        check_probability("RandomHorizontalFlip", p)?;
        Ok(Self { p })
    }
}

impl Transform for RandomHorizontalFlip {
    fn name(&self) -> &'static str {
        "RandomHorizontalFlip"
    }

    fn apply(&self, frame: Frame, rng: &mut dyn RngCore) -> DatasetResult<Frame> {
        let mut image: RgbImage = frame.into_pixels(self.name())?;
        if rng.random_bool(self.p) {
            imageops::flip_horizontal_in_place(&mut image);
        }
        Ok(Frame::Pixels(image))
    }
}
