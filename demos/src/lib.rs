//! Faceset demos
//!
//! Example applications for the faceset dataset.
//!
//! ## Available Examples
//!
//! - `dataset_test`: index a dataset root, print its identities and the labels
//!   of the first batch
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin dataset_test -- --image-root /data/faces_glintasia_images
//! ```

pub mod backend;
pub mod loader;
pub mod logging;

pub use backend::{create_device, get_backend_name, SelectedBackend, SelectedDevice};
pub use loader::drop_last_loader;
pub use logging::init_logging;
