use log::{debug, warn};
use ndarray::Array2;
use polars::prelude::*;

use crate::frame::{column, numeric_values, to_numeric};
use crate::types::{ForecastError, LagOrder, Result};

/// Name of the `n`-th lag of `column`.
pub fn lag_column_name(column: &str, n: usize) -> String {
    format!("{column}_lag_{n}")
}

/// Split a lag column name into its source column and lag order.
///
/// Accepts the collision-suffixed form `<source>_lag_<n>_<m>` as well.
pub fn parse_lag_column(name: &str) -> Option<(&str, usize)> {
    let (source, rest) = name.rsplit_once("_lag_")?;
    let n = match rest.split_once('_') {
        Some((n, m)) if m.parse::<usize>().is_ok() => n,
        Some(_) => return None,
        None => rest,
    };
    let n = n.parse::<usize>().ok().filter(|&n| n > 0)?;
    Some((source, n))
}

/// Shift a column down by `lag` rows.
///
/// Position i takes the numeric value at i - lag; the first `lag` positions and
/// non-numeric source cells become 0.
pub fn shift_column(series: &Series, lag: usize, name: &str) -> Result<Series> {
    let mut shifted = to_numeric(series)?
        .shift(lag as i64)
        .fill_null(FillNullStrategy::Zero)?;
    shifted.rename(name);
    Ok(shifted)
}

fn free_name(frame: &DataFrame, base: String) -> String {
    let taken = |name: &str| frame.get_column_names().contains(&name);
    if !taken(&base) {
        return base;
    }
    let mut m = 2;
    loop {
        let candidate = format!("{base}_{m}");
        if !taken(&candidate) {
            warn!("lag column '{base}' already exists; adding '{candidate}' instead");
            return candidate;
        }
        m += 1;
    }
}

/// Add lagged copies of `columns` and report the names that were added.
///
/// For each column (the target only when `lag_target` is set) lags 1..=`lag_order` are
/// appended after the existing columns, grouped by source column in ascending lag order.
/// Shifted-in positions are 0. If a lag name is already taken, for example when the
/// function runs twice on the same frame or a source column is itself called
/// `x_lag_1`, the new column gets the first free `_<m>` suffix.
///
/// # Arguments
/// * `frame` - Prepared frame
/// * `columns` - Columns to lag, in output order
/// * `lag_order` - Highest lag to add (at least 1)
/// * `target_column` - Target name, lagged only when `lag_target` is set
/// * `lag_target` - Whether the target gets lags of its own
///
/// # Returns
/// The extended frame and the added column names, in the order they were appended
///
/// # Errors
/// `ColumnNotFound` for an absent column, `InvalidConfig` when `lag_order` is 0.
pub fn create_lags_with_names(
    frame: &DataFrame,
    columns: &[String],
    lag_order: LagOrder,
    target_column: &str,
    lag_target: bool,
) -> Result<(DataFrame, Vec<String>)> {
    if lag_order == 0 {
        return Err(ForecastError::InvalidConfig(
            "lag order must be at least 1".to_string(),
        ));
    }

    let mut out = frame.clone();
    let mut added = Vec::new();
    for name in columns {
        if name == target_column && !lag_target {
            continue;
        }
        let source = column(frame, name)?;
        // Lags of one source stay together, lowest order first
        for n in 1..=lag_order {
            let lag_name = free_name(&out, lag_column_name(name, n));
            out.with_column(shift_column(source, n, &lag_name)?)?;
            added.push(lag_name);
        }
    }

    debug!(
        "lag construction: {} -> {} columns",
        frame.width(),
        out.width()
    );
    Ok((out, added))
}

/// Add lagged copies of `columns`; see [`create_lags_with_names`].
pub fn create_lags(
    frame: &DataFrame,
    columns: &[String],
    lag_order: LagOrder,
    target_column: &str,
    lag_target: bool,
) -> Result<DataFrame> {
    create_lags_with_names(frame, columns, lag_order, target_column, lag_target)
        .map(|(out, _)| out)
}

/// Regressors of the model, in design order.
///
/// Factors come first (the target itself is never a regressor), then the lag columns
/// exactly as [`create_lags_with_names`] named them. Repeated names are kept once.
pub fn regressor_columns(
    factors: &[String],
    lag_columns: &[String],
    target_column: &str,
) -> Vec<String> {
    let mut regressors: Vec<String> = Vec::with_capacity(factors.len() + lag_columns.len());
    for name in factors.iter().chain(lag_columns.iter()) {
        if name != target_column && !regressors.contains(name) {
            regressors.push(name.clone());
        }
    }
    regressors
}

/// Build the design matrix X (rows x regressors) from frame columns.
///
/// # Errors
/// Returns `ForecastError::ColumnNotFound` if a regressor is absent.
pub fn build_design(frame: &DataFrame, regressors: &[String]) -> Result<Array2<f64>> {
    let rows = frame.height();
    let mut x = Array2::<f64>::zeros((rows, regressors.len()));

    for (col, name) in regressors.iter().enumerate() {
        let values = numeric_values(frame, name)?;
        for (r, v) in values.into_iter().enumerate() {
            x[[r, col]] = v;
        }
    }

    Ok(x)
}
