//! Slicing the source file list into batches.

use std::path::PathBuf;

use tracing::debug;

use crate::model::Batch;

/// Number of batches `partition` produces for `n` entries.
pub fn batch_count(n: usize, count: usize, batch_size: usize) -> usize {
    if batch_size == 0 {
        return 0;
    }
    n.min(count).div_ceil(batch_size)
}

/// Truncate `entries` to the first `count` items and cut them into
/// contiguous batches of `batch_size`; the last batch holds the remainder.
///
/// Pure: the same input always gives the same batches. A zero `batch_size`
/// yields no batches.
pub fn partition(mut entries: Vec<PathBuf>, count: usize, batch_size: usize) -> Vec<Batch> {
    if batch_size == 0 {
        return Vec::new();
    }

    entries.truncate(count);
    debug!(files = entries.len(), "Prepared files to copy");

    entries
        .chunks(batch_size)
        .enumerate()
        .map(|(index, files)| {
            let first_position = index * batch_size;
            debug!(
                batch = index,
                from = first_position,
                to = first_position + files.len(),
                "Get positions"
            );
            Batch {
                index,
                first_position,
                files: files.to_vec(),
            }
        })
        .collect()
}
