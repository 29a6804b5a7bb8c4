//! Sequential slicing of a work list into batches

use crate::{PipelineError, Result};

/// Split `items` into contiguous batches of `batch_size`; the last one may be
/// shorter. Concatenating the batches yields `items` unchanged.
pub fn partition<I>(items: Vec<I>, batch_size: usize) -> Result<Vec<Vec<I>>> {
    if batch_size == 0 {
        return Err(PipelineError::Configuration(
            "batch_size must be positive".to_string(),
        ));
    }

    let mut batches = Vec::with_capacity(batch_count(items.len(), batch_size));
    let mut iter = items.into_iter().peekable();
    while iter.peek().is_some() {
        batches.push(iter.by_ref().take(batch_size).collect());
    }

    Ok(batches)
}

/// Number of batches `partition` produces: `ceil(len / batch_size)`
pub fn batch_count(len: usize, batch_size: usize) -> usize {
    if batch_size == 0 {
        0
    } else {
        len.div_ceil(batch_size)
    }
}
