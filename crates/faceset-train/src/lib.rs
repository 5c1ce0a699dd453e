//! Per-identity face image dataset for training face-recognition models with Burn.
//!
//! The dataset root holds one folder per identity, named `<name>_<id>`, each
//! containing that identity's `.jpg` crops:
//!
//! ```text
//! data/
//! ├── id_0000_1/   -> GlintAsia_1, label cur_id + 0
//! ├── id_0001_2/   -> GlintAsia_2, label cur_id + 1
//! └── id_0001_-1/  -> junk, no label
//! ```
//!
//! [`FaceDataset`] indexes the root once, assigns dense labels in sorted
//! folder order and serves augmented 3×112×112 samples through Burn's
//! [`Dataset`](burn::data::dataset::Dataset) trait.

pub mod augmentation;
pub mod config;
pub mod dataset;
pub mod error;
pub mod identity;
pub mod index;

// Re-export commonly used types
pub use augmentation::{Frame, PlanarImage, Pipeline, Transform};
pub use config::{AugmentationConfig, FaceDatasetConfig, JunkPolicy};
pub use dataset::{FaceBatch, FaceBatcher, FaceDataset, FaceItem};
pub use error::{DatasetError, DatasetResult};
pub use identity::{FolderIdentity, IdentityKey, JUNK_ID, MAX_IDENTITY_ID};
pub use index::{IdentityIndex, IndexBuilder};
