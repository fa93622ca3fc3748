//! Percentage-error scoring of forecasts.

use log::debug;
use polars::prelude::*;

use crate::frame::{column, numeric_values, to_numeric};
use crate::types::{Labels, MapeSummary, Result};

/// Absolute percentage error of one forecast, in percent.
///
/// Returns 0.0 when `actual` is zero; such rows pull the average down instead of
/// producing an infinite error.
pub fn percentage_error(actual: f64, forecast: f64) -> f64 {
    if actual == 0.0 {
        return 0.0;
    }
    ((actual - forecast) / actual).abs() * 100.0
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Append a per-row MAPE column and return the average over all rows.
///
/// Actual values come from `target`, forecasts from `labels.forecast_column(target)`.
/// Empty actual cells count as 0 and contribute 0.
///
/// # Arguments
/// * `frame` - Frame holding the target and its forecast column
/// * `target` - Target column name
/// * `labels` - Names of the forecast and MAPE columns
///
/// # Returns
/// The frame with the MAPE column added, and the average MAPE over all rows
///
/// # Errors
/// `ColumnNotFound` if the target or forecast column is absent.
pub fn calculate_mape(
    frame: &DataFrame,
    target: &str,
    labels: &Labels,
) -> Result<(DataFrame, f64)> {
    let actual = numeric_values(frame, target)?;
    let forecast = numeric_values(frame, &labels.forecast_column(target))?;

    let errors: Vec<f64> = actual
        .iter()
        .zip(forecast.iter())
        .map(|(&a, &f)| percentage_error(a, f))
        .collect();
    let average = mean(&errors);
    debug!("average MAPE over {} rows: {average:.4}", errors.len());

    let mut out = frame.clone();
    out.with_column(Series::new(&labels.mape_column, errors))?;
    Ok((out, average))
}

/// Average MAPE overall and for each side of the split at `split_index`.
///
/// Rows whose MAPE cell is empty (e.g. an appended step-ahead row) are skipped.
pub fn mape_summary(
    frame: &DataFrame,
    split_index: usize,
    labels: &Labels,
) -> Result<MapeSummary> {
    let mut overall = Vec::new();
    let mut train = Vec::new();
    let mut test = Vec::new();

    // Split by position; the step-ahead row has no MAPE and is skipped
    let values = to_numeric(column(frame, &labels.mape_column)?)?;
    for (i, value) in values.f64()?.into_iter().enumerate() {
        let Some(v) = value else {
            continue;
        };
        overall.push(v);
        if i < split_index {
            train.push(v);
        } else {
            test.push(v);
        }
    }

    Ok(MapeSummary {
        overall: mean(&overall),
        train: mean(&train),
        test: mean(&test),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn scored(actual: Vec<f64>, forecast: Vec<f64>) -> DataFrame {
        let labels = Labels::default();
        DataFrame::new(vec![
            Series::new("y", actual),
            Series::new(&labels.forecast_column("y"), forecast),
        ])
        .unwrap()
    }

    #[test]
    fn test_percentage_error() {
        assert_abs_diff_eq!(percentage_error(100.0, 90.0), 10.0, epsilon = 1e-12);
        assert_abs_diff_eq!(percentage_error(-50.0, -40.0), 20.0, epsilon = 1e-12);
        assert_eq!(percentage_error(0.0, 5.0), 0.0);
    }

    #[test]
    fn test_mape_column_and_average() {
        let labels = Labels::default();
        let frame = scored(vec![10.0, 20.0, 0.0, 40.0], vec![11.0, 18.0, 3.0, 40.0]);
        let (out, avg) = calculate_mape(&frame, "y", &labels).unwrap();

        let per_row = numeric_values(&out, "MAPE").unwrap();
        assert_abs_diff_eq!(per_row[0], 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(per_row[1], 10.0, epsilon = 1e-9);
        assert_eq!(per_row[2], 0.0);
        assert_eq!(per_row[3], 0.0);
        assert_abs_diff_eq!(avg, 5.0, epsilon = 1e-9);
        assert!(per_row.iter().all(|v| v.is_finite() && *v >= 0.0));
    }

    #[test]
    fn test_mape_zero_on_perfect_forecast() {
        let values = vec![3.0, -1.0, 0.0, 8.5];
        let frame = scored(values.clone(), values);
        let (_, avg) = calculate_mape(&frame, "y", &Labels::default()).unwrap();
        assert_eq!(avg, 0.0);
    }

    #[test]
    fn test_mape_missing_forecast_column() {
        let frame = df!("y" => &[1.0]).unwrap();
        assert!(calculate_mape(&frame, "y", &Labels::default()).is_err());
    }

    #[test]
    fn test_mape_summary_split_and_skip_empty() {
        let labels = Labels::default();
        let frame = df!("MAPE" => &[Some(10.0), Some(20.0), Some(30.0), None]).unwrap();
        let summary = mape_summary(&frame, 2, &labels).unwrap();
        assert_abs_diff_eq!(summary.overall, 20.0, epsilon = 1e-12);
        assert_abs_diff_eq!(summary.train, 15.0, epsilon = 1e-12);
        assert_abs_diff_eq!(summary.test, 30.0, epsilon = 1e-12);

        let none_tested = mape_summary(&frame, 3, &labels).unwrap();
        assert_eq!(none_tested.test, 0.0);
    }
}
