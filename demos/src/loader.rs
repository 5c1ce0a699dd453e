//! Data loader over a face dataset that drops the incomplete final batch.

use std::sync::Arc;

use anyhow::{ensure, Result};
use burn::{
    data::{
        dataloader::{DataLoader, DataLoaderBuilder},
        dataset::{transform::PartialDataset, Dataset},
    },
    tensor::backend::Backend,
};
use faceset_train::{FaceBatch, FaceBatcher, FaceDataset};
use tracing::debug;

/// Sequential loader yielding only full batches of `batch_size`.
///
/// No shuffling and no worker threads. A dataset shorter than one batch gives
/// a loader that yields nothing.
///
/// # Errors
///
/// Fails when `batch_size` is zero.
pub fn drop_last_loader<B: Backend>(
    dataset: FaceDataset,
    batch_size: usize,
    device: B::Device,
) -> Result<Arc<dyn DataLoader<B, FaceBatch<B>>>> {
    ensure!(batch_size > 0, "Batch size must be positive");

    let kept = dataset.len() / batch_size * batch_size;
    debug!(
        kept,
        dropped = dataset.len() - kept,
        batch_size,
        "Dropping incomplete final batch"
    );
    let dataset = PartialDataset::new(dataset, 0, kept);

    Ok(DataLoaderBuilder::new(FaceBatcher::<B>::new())
        .batch_size(batch_size)
        .set_device(device)
        .build(dataset))
}
