//! Column access and conversions on polars data frames.
//!
//! Tables travel through the crate as [`DataFrame`]s. Numeric columns are `Float64`, the
//! time column is `Date`, labels are `Utf8`; missing values are nulls.

use chrono::{Duration, NaiveDate};
use polars::prelude::*;

use crate::types::{ForecastError, Result};

fn unix_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Look up a column by exact name.
///
/// # Errors
/// `ColumnNotFound` if `df` has no column called `name`.
pub fn column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name).map_err(|_| ForecastError::ColumnNotFound {
        column: name.to_string(),
    })
}

/// Coerce a series to `Float64`.
///
/// Text is parsed after trimming; numbers and booleans are cast; anything else, and any
/// non-finite value, becomes null.
pub fn to_numeric(series: &Series) -> Result<Series> {
    let name = series.name();
    let values: Vec<Option<f64>> = match series.dtype() {
        DataType::Utf8 => series
            .utf8()?
            .into_iter()
            .map(|v| v.and_then(|s| s.trim().parse::<f64>().ok()))
            .collect(),
        DataType::Boolean => series.cast(&DataType::Float64)?.f64()?.into_iter().collect(),
        dtype if dtype.is_numeric() => series.cast(&DataType::Float64)?.f64()?.into_iter().collect(),
        _ => vec![None; series.len()],
    };
    let values: Vec<Option<f64>> = values
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect();
    Ok(Series::new(name, values))
}

/// Values of a column as `f64`, with nulls and non-numeric cells read as 0.
pub fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let numeric = to_numeric(column(df, name)?)?;
    let values = numeric.f64()?.into_iter().map(|v| v.unwrap_or(0.0)).collect();
    Ok(values)
}

/// Values of a `Date` series; any other dtype yields all `None`.
pub fn date_values(series: &Series) -> Result<Vec<Option<NaiveDate>>> {
    if series.dtype() != &DataType::Date {
        return Ok(vec![None; series.len()]);
    }
    let epoch = unix_epoch();
    let days = series.cast(&DataType::Int32)?;
    let dates = days
        .i32()?
        .into_iter()
        .map(|d| d.and_then(|d| epoch.checked_add_signed(Duration::days(d as i64))))
        .collect();
    Ok(dates)
}

/// Build a `Date` series from optional dates.
pub fn date_series(name: &str, dates: &[Option<NaiveDate>]) -> Result<Series> {
    let epoch = unix_epoch();
    let days: Vec<Option<i32>> = dates
        .iter()
        .map(|d| d.map(|d| (d - epoch).num_days() as i32))
        .collect();
    Ok(Series::new(name, days).cast(&DataType::Date)?)
}

/// Render every cell as text; dates use `date_format`, nulls stay `None`.
pub fn text_values(series: &Series, date_format: &str) -> Result<Vec<Option<String>>> {
    if series.dtype() == &DataType::Date {
        let dates = date_values(series)?;
        return Ok(dates
            .into_iter()
            .map(|d| d.map(|d| d.format(date_format).to_string()))
            .collect());
    }
    let text = series.cast(&DataType::Utf8)?;
    let values = text
        .utf8()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect();
    Ok(values)
}
