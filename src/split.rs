//! Positional train/test split.

use polars::prelude::DataFrame;

use crate::types::{check_percent, Result};

/// Number of training rows: `floor(n * percent / 100)`.
pub fn split_index(n_rows: usize, percent: f64) -> Result<usize> {
    check_percent(percent)?;
    let idx = (n_rows as f64 * percent / 100.0).floor() as usize;
    Ok(idx.min(n_rows))
}

/// Split into a training prefix and a test suffix, without shuffling.
///
/// # Errors
/// `InvalidConfig` if `percent` is outside [0, 100].
pub fn separation_data(data: &DataFrame, percent: f64) -> Result<(DataFrame, DataFrame)> {
    let n = data.height();
    let idx = split_index(n, percent)?;
    Ok((data.slice(0, idx), data.slice(idx as i64, n - idx)))
}
