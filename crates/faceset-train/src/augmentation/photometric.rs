//! Photometric jitter on RGB pixels.

use image::{imageops, RgbImage};
use rand::{seq::SliceRandom, Rng, RngCore};

use super::{check_range, Frame, Transform};
use crate::error::{DatasetError, DatasetResult};

/// Luma weights used for the contrast mean and the saturation blend.
const LUMA: [f32; 3] = [0.299, 0.587, 0.114];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Adjustment {
    Brightness,
    Contrast,
    Saturation,
    Hue,
}

/// Randomly change brightness, contrast, saturation and hue.
///
/// Each enabled adjustment draws a factor from `[max(0, 1 - x), 1 + x]` (hue:
/// a shift in `[-hue, hue]` of a full turn) and the adjustments run in a
/// random order. A zero strength disables that adjustment.
#[derive(Debug, Clone)]
pub struct ColorJitter {
    brightness: f32,
    contrast: f32,
    saturation: f32,
    hue: f32,
}

impl ColorJitter {
    /// Jitter strengths; brightness, contrast and saturation must be
    /// non-negative and hue must lie in `[0, 0.5]`.
    pub fn new(brightness: f32, contrast: f32, saturation: f32, hue: f32) -> DatasetResult<Self> {
        for (what, value) in [
            ("brightness", brightness),
            ("contrast", contrast),
            ("saturation", saturation),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(DatasetError::InvalidTransformParameter {
                    transform: "ColorJitter",
                    reason: format!("{what} must be finite and non-negative, got {value}"),
                });
            }
        }
        check_range("ColorJitter", "hue", (0.0, hue), (0.0, 0.5))?;

        Ok(Self {
            brightness,
            contrast,
            saturation,
            hue,
        })
    }

    fn factor(strength: f32, rng: &mut dyn RngCore) -> f32 {
        rng.random_range((1.0 - strength).max(0.0)..=1.0 + strength)
    }
}

impl Transform for ColorJitter {
    fn name(&self) -> &'static str {
        "ColorJitter"
    }

    fn apply(&self, frame: Frame, rng: &mut dyn RngCore) -> DatasetResult<Frame> {
        let mut image = frame.into_pixels(self.name())?;

        let mut order: Vec<Adjustment> = [
            (Adjustment::Brightness, self.brightness),
            (Adjustment::Contrast, self.contrast),
            (Adjustment::Saturation, self.saturation),
            (Adjustment::Hue, self.hue),
        ]
        .into_iter()
        .filter(|(_, strength)| *strength > 0.0)
        .map(|(adjustment, _)| adjustment)
        .collect();
        order.shuffle(rng);

        for adjustment in order {
            image = match adjustment {
                Adjustment::Brightness => {
                    adjust_brightness(image, Self::factor(self.brightness, rng))
                }
                Adjustment::Contrast => adjust_contrast(image, Self::factor(self.contrast, rng)),
                Adjustment::Saturation => {
                    adjust_saturation(image, Self::factor(self.saturation, rng))
                }
                Adjustment::Hue => {
                    let shift: f32 = rng.random_range(-self.hue..=self.hue);
                    imageops::huerotate(&image, (shift * 360.0).round() as i32)
                }
            };
        }

        Ok(Frame::Pixels(image))
    }
}

fn luma(rgb: [f32; 3]) -> f32 {
    rgb.iter().zip(LUMA).map(|(c, w)| c * w).sum()
}

/// Apply `f` to every pixel in float space and clamp back to `u8`.
fn map_pixels(mut image: RgbImage, f: impl Fn([f32; 3]) -> [f32; 3]) -> RgbImage {
    for pixel in image.pixels_mut() {
        let out = f(pixel.0.map(f32::from));
        pixel.0 = out.map(|c| c.round().clamp(0.0, 255.0) as u8);
    }
    image
}

fn adjust_brightness(image: RgbImage, factor: f32) -> RgbImage {
    map_pixels(image, |rgb| rgb.map(|c| c * factor))
}

fn adjust_contrast(image: RgbImage, factor: f32) -> RgbImage {
    let count = (image.width() * image.height()).max(1) as f32;
    let mean = image.pixels().map(|p| luma(p.0.map(f32::from))).sum::<f32>() / count;
    map_pixels(image, |rgb| rgb.map(|c| (c - mean).mul_add(factor, mean)))
}

fn adjust_saturation(image: RgbImage, factor: f32) -> RgbImage {
    map_pixels(image, |rgb| {
        let gray = luma(rgb);
        rgb.map(|c| (c - gray).mul_add(factor, gray))
    })
}

#[cfg(test)]
mod tests {
    use image::{ImageBuffer, Rgb};
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::augmentation::tests::gradient;

    fn uniform(rgb: [u8; 3]) -> RgbImage {
        ImageBuffer::from_pixel(4, 4, Rgb(rgb))
    }

    #[test]
    fn brightness_scales_channels() {
        let out = adjust_brightness(uniform([100, 50, 200]), 1.2);
        assert_eq!(out.get_pixel(0, 0).0, [120, 60, 240]);
    }

    #[test]
    fn brightness_saturates_at_white() {
        let out = adjust_brightness(uniform([250, 250, 250]), 1.2);
        assert_eq!(out.get_pixel(0, 0).0, [255, 255, 255]);
    }

    #[test]
    fn contrast_of_flat_image_is_unchanged() {
        let image = uniform([90, 90, 90]);
        assert_eq!(adjust_contrast(image.clone(), 1.15), image);
    }

    #[test]
    fn zero_saturation_gives_gray() {
        let out = adjust_saturation(uniform([200, 100, 50]), 0.0);
        let [r, g, b] = out.get_pixel(0, 0).0;
        assert_eq!(r, g);
        assert_eq!(g, b);
    }

    #[test]
    fn jitter_keeps_dimensions_and_changes_pixels() {
        let jitter = ColorJitter::new(0.2, 0.15, 0.1, 0.0).unwrap();
        let image = gradient(32, 32);
        let mut rng = StdRng::seed_from_u64(9);

        let changed = (0..8).any(|_| {
            let out = jitter
                .apply(Frame::Pixels(image.clone()), &mut rng)
                .unwrap()
                .into_pixels("test")
                .unwrap();
            assert_eq!(out.dimensions(), (32, 32));
            out != image
        });
        assert!(changed);
    }

    #[test]
    fn all_zero_strengths_are_identity() {
        let jitter = ColorJitter::new(0.0, 0.0, 0.0, 0.0).unwrap();
        let image = gradient(8, 8);
        let out = jitter
            .apply(Frame::Pixels(image.clone()), &mut StdRng::seed_from_u64(0))
            .unwrap();
        assert_eq!(out, Frame::Pixels(image));
    }

    #[test]
    fn hue_above_half_turn_is_rejected() {
        assert!(ColorJitter::new(0.2, 0.1, 0.1, 0.6).is_err());
    }
}
