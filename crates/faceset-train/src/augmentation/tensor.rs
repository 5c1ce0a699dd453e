//! Stages working on channel-first float data.

use rand::{Rng, RngCore};
use rand_distr::{Distribution, Normal};

use super::{check_probability, check_range, Frame, PlanarImage, Transform};
use crate::error::{DatasetError, DatasetResult};

/// Convert 8-bit HWC pixels into CHW floats in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToTensor;

impl Transform for ToTensor {
    fn name(&self) -> &'static str {
        "ToTensor"
    }

    fn apply(&self, frame: Frame, _rng: &mut dyn RngCore) -> DatasetResult<Frame> {
        let image = frame.into_pixels(self.name())?;
        let (width, height) = image.dimensions();
        let (width, height) = (width as usize, height as usize);

        let mut planar = PlanarImage {
            data: vec![0.0; 3 * height * width],
            channels: 3,
            height,
            width,
        };
        for (x, y, pixel) in image.enumerate_pixels() {
            for (channel, value) in pixel.0.iter().enumerate() {
                let offset = planar.offset(channel, y as usize, x as usize);
                planar.data[offset] = f32::from(*value) / 255.0;
            }
        }

        Ok(Frame::Planar(planar))
    }
}

/// PCA lighting noise over the ImageNet RGB covariance.
///
/// Draws `alpha ~ N(0, std)` per principal component and adds
/// `sum_k eigval[k] * alpha[k] * eigvec[k][c]` to every value of channel `c`.
#[derive(Debug, Clone)]
pub struct ColorAugmentation {
    alpha: Normal<f32>,
}

impl ColorAugmentation {
    const EIGVAL: [f32; 3] = [0.2175, 0.0188, 0.0045];
    const EIGVEC: [[f32; 3]; 3] = [
        [0.4009, 0.7192, -0.5675],
        [-0.8140, -0.0045, -0.5808],
        [0.4203, -0.6948, -0.5836],
    ];

    /// Lighting noise with coefficient standard deviation `std`.
    pub fn new(std: f32) -> DatasetResult<Self> {
        let alpha = Normal::new(0.0, std).map_err(|err| DatasetError::InvalidTransformParameter {
            transform: "ColorAugmentation",
            reason: err.to_string(),
        })?;
        Ok(Self { alpha })
    }

    /// Per-channel offset for the given component coefficients.
    fn offsets(alpha: [f32; 3]) -> [f32; 3] {
        let mut offsets = [0.0; 3];
        for (k, row) in Self::EIGVEC.iter().enumerate() {
            let weight = Self::EIGVAL[k] * alpha[k];
            for (offset, v) in offsets.iter_mut().zip(row) {
                *offset += weight * v;
            }
        }
        offsets
    }
}

impl Transform for ColorAugmentation {
    fn name(&self) -> &'static str {
        "ColorAugmentation"
    }

    fn apply(&self, frame: Frame, rng: &mut dyn RngCore) -> DatasetResult<Frame> {
        let mut planar = frame.into_planar(self.name())?;
        if planar.channels != 3 {
            return Err(DatasetError::UnexpectedFrame {
                transform: self.name(),
                expected: "three-channel planar",
            });
        }

        let alpha = [(); 3].map(|()| self.alpha.sample(rng));
        for (channel, offset) in Self::offsets(alpha).into_iter().enumerate() {
            for value in planar.plane_mut(channel) {
                *value += offset;
            }
        }

        Ok(Frame::Planar(planar))
    }
}

/// Fill a random rectangle with a per-channel constant.
///
/// With probability `p`, up to 100 attempts are made to place a rectangle
/// whose area is a uniform fraction `area` of the image and whose aspect ratio
/// lies in `[min_aspect, 1 / min_aspect]`. If none fits, the image is left
/// untouched.
#[derive(Debug, Clone)]
pub struct RandomErasing {
    p: f64,
    area: (f32, f32),
    min_aspect: f32,
    fill: [f32; 3],
}

impl RandomErasing {
    const ATTEMPTS: usize = 100;

    /// # Errors
    ///
    /// Rejects `p` outside `[0, 1]`, an area range outside `[0, 1]` and a
    /// `min_aspect` outside `(0, 1]`.
    pub fn new(p: f64, area: (f32, f32), min_aspect: f32, fill: [f32; 3]) -> DatasetResult<Self> {
        check_probability("RandomErasing", p)?;
        check_range("RandomErasing", "area", area, (0.0, 1.0))?;
        check_range("RandomErasing", "aspect", (min_aspect, 1.0), (f32::MIN_POSITIVE, 1.0))?;
        Ok(Self {
            p,
            area,
            min_aspect,
            fill,
        })
    }

    /// Pick `(row, col, height, width)` of the patch, if one fits.
    fn patch(
        &self,
        height: usize,
        width: usize,
        rng: &mut dyn RngCore,
    ) -> Option<(usize, usize, usize, usize)> {
        let area = (height * width) as f32;
        for _ in 0..Self::ATTEMPTS {
            let target_area = area * rng.random_range(self.area.0..=self.area.1);
            let aspect = rng.random_range(self.min_aspect..=1.0 / self.min_aspect);

            let patch_h = (target_area * aspect).sqrt().round() as usize;
            let patch_w = (target_area / aspect).sqrt().round() as usize;

            if patch_h < height && patch_w < width {
                let row = rng.random_range(0..=height - patch_h);
                let col = rng.random_range(0..=width - patch_w);
                return Some((row, col, patch_h, patch_w));
            }
        }
        None
    }
}

impl Transform for RandomErasing {
    fn name(&self) -> &'static str {
        "RandomErasing"
    }

    fn apply(&self, frame: Frame, rng: &mut dyn RngCore) -> DatasetResult<Frame> {
        let mut planar = frame.into_planar(self.name())?;
        if !rng.random_bool(self.p) {
            return Ok(Frame::Planar(planar));
        }

        if let Some((row, col, patch_h, patch_w)) = self.patch(planar.height, planar.width, rng) {
            for channel in 0..planar.channels {
                let fill = self.fill[channel.min(2)];
                for r in row..row + patch_h {
                    let start = planar.offset(channel, r, col);
                    planar.data[start..start + patch_w].fill(fill);
                }
            }
        }

        Ok(Frame::Planar(planar))
    }
}

/// Per-channel `(x - mean) / std`.
#[derive(Debug, Clone)]
pub struct Normalize {
    mean: [f32; 3],
    std: [f32; 3],
}

impl Normalize {
    /// Fails when any `std` entry is zero, negative or non-finite.
    pub fn new(mean: [f32; 3], std: [f32; 3]) -> DatasetResult<Self> {
        if std.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(DatasetError::InvalidTransformParameter {
                transform: "Normalize",
                reason: format!("std must be positive, got {std:?}"),
            });
        }
        Ok(Self { mean, std })
    }
}

impl Transform for Normalize {
    fn name(&self) -> &'static str {
        "Normalize"
    }

    fn apply(&self, frame: Frame, _rng: &mut dyn RngCore) -> DatasetResult<Frame> {
        let mut planar = frame.into_planar(self.name())?;
        if planar.channels != 3 {
            return Err(DatasetError::UnexpectedFrame {
                transform: self.name(),
                expected: "three-channel planar",
            });
        }

        for channel in 0..3 {
            let (mean, std) = (self.mean[channel], self.std[channel]);
            for value in planar.plane_mut(channel) {
                *value = (*value - mean) / std;
            }
        }

        Ok(Frame::Planar(planar))
    }
}
