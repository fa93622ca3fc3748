use chrono::NaiveDate;
use log::{debug, warn};
use polars::prelude::*;

use crate::frame::{column, date_series, date_values, to_numeric};
use crate::types::Result;

/// Parse the cells of a time column with `format`.
///
/// `Date` columns pass through; text is parsed after trimming. Any other dtype, and any
/// text that does not match `format`, yields `None`.
pub fn parse_dates(series: &Series, format: &str) -> Result<Vec<Option<NaiveDate>>> {
    match series.dtype() {
        DataType::Date => date_values(series),
        DataType::Utf8 => Ok(series
            .utf8()?
            .into_iter()
            .map(|v| v.and_then(|s| NaiveDate::parse_from_str(s.trim(), format).ok()))
            .collect()),
        _ => Ok(vec![None; series.len()]),
    }
}

/// Select and clean the columns of one analysis.
///
/// The result holds `[time, target, factors...]` in that order (the target is listed once
/// even when it is also a factor), with the time column parsed to dates using
/// `date_format` and the target and factors coerced to `Float64`. Rows whose time cell
/// does not parse are dropped and the remaining rows are renumbered from zero.
///
/// An entirely unparsable time column gives an empty frame, not an error.
///
/// # Arguments
/// * `source` - Raw frame as read from the workbook
/// * `time_column` - Column holding the observation dates
/// * `target_column` - Column to forecast
/// * `factor_columns` - Predictor columns (may include the target)
/// * `date_format` - chrono format for text dates
///
/// # Errors
/// Returns `ForecastError::ColumnNotFound` if any referenced column is absent from `source`.
pub fn prepare_data(
    source: &DataFrame,
    time_column: &str,
    target_column: &str,
    factor_columns: &[String],
    date_format: &str,
) -> Result<DataFrame> {
    let dates = parse_dates(column(source, time_column)?, date_format)?;

    let mut selected: Vec<&str> = vec![target_column];
    for factor in factor_columns {
        if !selected.contains(&factor.as_str()) {
            selected.push(factor.as_str());
        }
    }

    // Time first, then numeric columns in selection order
    let mut columns = Vec::with_capacity(selected.len() + 1);
    columns.push(date_series(time_column, &dates)?);
    for name in selected {
        columns.push(to_numeric(column(source, name)?)?);
    }
    let frame = DataFrame::new(columns)?;

    let keep: Vec<bool> = dates.iter().map(Option::is_some).collect();
    let dropped = keep.iter().filter(|k| !**k).count();
    if dropped > 0 {
        warn!(
            "dropped {dropped} of {} rows with unparsable '{time_column}' values",
            keep.len()
        );
    }

    let mask = BooleanChunked::from_slice("keep", &keep);
    let prepared = frame.filter(&mask)?;
    debug!(
        "prepared {} rows x {} columns",
        prepared.height(),
        prepared.width()
    );
    Ok(prepared)
}
