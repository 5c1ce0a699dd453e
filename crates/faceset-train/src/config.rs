//! Configuration for the face dataset and its augmentation pipeline.
//!
//! Both structures derive Burn's `Config`, so they can be built with the
//! generated `with_*` setters or loaded from JSON via `Config::load`.

use std::path::PathBuf;

use burn::prelude::*;

/// What to do with images that live in a junk identity folder (`*_-1`).
#[derive(Config, Debug, PartialEq, Eq, Hash)]
pub enum JunkPolicy {
    /// Drop junk images from the sample list while indexing.
    Skip,
    /// Keep junk images indexed; fetching one fails with
    /// [`DatasetError::UnregisteredIdentity`](crate::DatasetError::UnregisteredIdentity).
    FailFast,
}

impl Default for JunkPolicy {
    fn default() -> Self {
        Self::Skip
    }
}

/// Parameters of the training augmentation pipeline.
///
/// Defaults reproduce the GlintAsia training recipe: rotation, resized crop,
/// color jitter, flip, tensor conversion, PCA lighting, random erasing and
/// normalization, in that order.
#[derive(Config, Debug)]
pub struct AugmentationConfig {
    /// Run the random stages. When false only tensor conversion and
    /// normalization are applied.
    #[config(default = "true")]
    pub random_stages: bool,
    /// Maximum rotation angle in degrees (applies ±rotation_degrees).
    #[config(default = "30.0")]
    pub rotation_degrees: f32,
    /// Area fraction range of the random resized crop.
    #[config(default = "(0.8, 1.0)")]
    pub crop_scale: (f32, f32),
    /// Aspect ratio range of the random resized crop.
    #[config(default = "(3.0 / 4.0, 4.0 / 3.0)")]
    pub crop_ratio: (f32, f32),
    /// Brightness jitter, factor drawn from `[max(0, 1 - b), 1 + b]`.
    #[config(default = "0.2")]
    pub brightness: f32,
    /// Contrast jitter.
    #[config(default = "0.15")]
    pub contrast: f32,
    /// Saturation jitter.
    #[config(default = "0.1")]
    pub saturation: f32,
    /// Hue jitter as a fraction of a full turn, in `[0, 0.5]`.
    #[config(default = "0.0")]
    pub hue: f32,
    /// Horizontal flip probability.
    #[config(default = "0.5")]
    pub flip_probability: f64,
    /// Standard deviation of the PCA lighting coefficients.
    #[config(default = "0.1")]
    pub lighting_std: f32,
    /// Probability that random erasing fires.
    #[config(default = "0.5")]
    pub erasing_probability: f64,
    /// Erased area as a fraction of the image.
    #[config(default = "(0.02, 0.2)")]
    pub erasing_area: (f32, f32),
    /// Minimum aspect ratio of the erased patch; the maximum is its inverse.
    #[config(default = "0.3")]
    pub erasing_min_aspect: f32,
    /// Per-channel normalization mean.
    #[config(default = "[0.4914, 0.4822, 0.4465]")]
    pub mean: [f32; 3],
    /// Per-channel normalization standard deviation.
    #[config(default = "[0.247, 0.243, 0.261]")]
    pub std: [f32; 3],
}

impl AugmentationConfig {
    /// Deterministic preprocessing only, for evaluation sets.
    pub fn evaluation() -> Self {
        Self::new().with_random_stages(false)
    }
}

/// Construction parameters of [`FaceDataset`](crate::FaceDataset).
#[derive(Config, Debug)]
pub struct FaceDatasetConfig {
    /// Directory holding one sub-folder per identity.
    #[config(default = "PathBuf::from(\"data\")")]
    pub image_root: PathBuf,
    /// Annotation folder. Accepted for compatibility, not read.
    #[config(default = "None")]
    pub annotation_folder: Option<PathBuf>,
    /// Phase tag such as "train". Stored, never branched on.
    #[config(default = "\"train\".to_string()")]
    pub phase: String,
    /// Offset added to every label so several datasets can share one label space.
    #[config(default = "0")]
    pub cur_id: usize,
    /// Prefix of every identity key.
    #[config(default = "\"GlintAsia\".to_string()")]
    pub database_name: String,
    /// Extension of indexed images, matched case-sensitively.
    #[config(default = "\"jpg\".to_string()")]
    pub image_extension: String,
    /// Side length of the square images handed to the pipeline.
    #[config(default = "112")]
    pub image_size: u32,
    /// Handling of images found in junk identity folders.
    #[config(default = "JunkPolicy::Skip")]
    pub junk_policy: JunkPolicy,
    /// Draw a progress bar while identity folders are indexed.
    #[config(default = "false")]
    pub show_progress: bool,
    /// Augmentation applied to every sample.
    #[config(default = "AugmentationConfig::new()")]
    pub augmentation: AugmentationConfig,
}
