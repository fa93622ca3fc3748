use chrono::{Duration, NaiveDate};
use log::{debug, info};
use polars::prelude::*;

use crate::frame::{column, date_series, date_values, numeric_values};
use crate::lags::parse_lag_column;
use crate::split::split_index;
use crate::types::{ForecastError, Labels, OlsModel, Result, SplitKind};

fn regressor_values(frame: &DataFrame, model: &OlsModel) -> Result<Vec<Vec<f64>>> {
    model
        .regressors
        .iter()
        .map(|r| {
            numeric_values(frame, r).map_err(|_| ForecastError::MissingRegressor {
                regressor: r.clone(),
            })
        })
        .collect()
}

/// Apply the fitted coefficients to every row and label the split.
///
/// Adds the forecast column (`labels.forecast_column(target)`), with
/// `const + Σ coef_r · row[r]`, and the split column, where rows before
/// `floor(n · train_percent / 100)` are labelled train and the rest test.
///
/// # Arguments
/// * `frame` - Frame with every regressor column
/// * `model` - Fitted model
/// * `train_percent` - Same share as used for fitting
/// * `target` - Target column name, used to name the forecast column
/// * `labels` - Column names and split labels
///
/// # Errors
/// * `MissingRegressor` if a model regressor is absent from the frame
/// * `InvalidConfig` if `train_percent` is outside [0, 100]
pub fn predict_on_params(
    frame: &DataFrame,
    model: &OlsModel,
    train_percent: f64,
    target: &str,
    labels: &Labels,
) -> Result<DataFrame> {
    let n = frame.height();
    let split = split_index(n, train_percent)?;
    let columns = regressor_values(frame, model)?;

    // const + Σ coef · x, row by row
    let forecast: Vec<f64> = (0..n)
        .map(|i| {
            model
                .coeffs
                .iter()
                .zip(columns.iter())
                .fold(model.intercept, |acc, (coef, col)| acc + coef * col[i])
        })
        .collect();

    let kinds: Vec<&str> = (0..n)
        .map(|i| {
            let kind = if i < split {
                SplitKind::Train
            } else {
                SplitKind::Test
            };
            kind.label(labels)
        })
        .collect();

    debug!("forecast {n} rows, {split} labelled train");
    let mut out = frame.clone();
    out.with_column(Series::new(&labels.forecast_column(target), forecast))?;
    out.with_column(Series::new(&labels.split_column, kinds))?;
    Ok(out)
}

fn next_date(dates: &[Option<NaiveDate>]) -> Option<NaiveDate> {
    let n = dates.len();
    let last = (*dates.last()?)?;
    let step = n
        .checked_sub(2)
        .and_then(|i| dates[i])
        .map(|prev| last - prev)
        .filter(|d| *d > Duration::zero())
        .unwrap_or_else(|| Duration::days(1));
    last.checked_add_signed(step)
}

/// Append one row past the end of the data carrying a one-step-ahead forecast.
///
/// Lag regressors `<src>_lag_<k>` take the value of `src` k rows before the new row;
/// other regressors repeat their last known value. The time cell advances by the last
/// observed step (one day if unknown). The forecast column gets the model's prediction,
/// the split column `labels.forecast`; every other cell is null.
///
/// # Errors
/// * `EmptyInput` if the frame has no rows
/// * `MissingRegressor` if a model regressor is absent
/// * `ColumnNotFound` if the time column is absent
pub fn forecast_next(
    frame: &DataFrame,
    model: &OlsModel,
    time_column: &str,
    target: &str,
    labels: &Labels,
) -> Result<DataFrame> {
    let n = frame.height();
    if n == 0 {
        return Err(ForecastError::EmptyInput);
    }
    let columns = regressor_values(frame, model)?;

    let mut inputs = Vec::with_capacity(model.regressors.len());
    for (name, values) in model.regressors.iter().zip(columns.iter()) {
        let value = match parse_lag_column(name) {
            Some((source, k)) if frame.column(source).is_ok() => match n.checked_sub(k) {
                Some(idx) => numeric_values(frame, source)?[idx],
                None => 0.0,
            },
            _ => values[n - 1],
        };
        inputs.push(value);
    }

    let prediction = model
        .coeffs
        .iter()
        .zip(inputs.iter())
        .fold(model.intercept, |acc, (coef, x)| acc + coef * x);

    let forecast_column = labels.forecast_column(target);
    let next_time = next_date(&date_values(column(frame, time_column)?)?);

    // One-row frame with the same schema, then stacked under the data
    let mut row = Vec::with_capacity(frame.width());
    for series in frame.get_columns() {
        let name = series.name();
        let cell = if name == time_column {
            date_series(name, &[next_time])?
        } else if name == forecast_column {
            Series::new(name, &[prediction])
        } else if name == labels.split_column {
            Series::new(name, &[SplitKind::Forecast.label(labels)])
        } else if let Some(idx) = model.regressors.iter().position(|r| r == name) {
            Series::new(name, &[inputs[idx]])
        } else {
            Series::full_null(name, 1, series.dtype())
        };
        row.push(cell.cast(series.dtype())?);
    }
    let out = frame.vstack(&DataFrame::new(row)?)?;

    info!("one-step-ahead forecast for '{target}': {prediction:.4}");
    Ok(out)
}

/// Rename every regressor column used by `model` to `<name><suffix>`.
///
/// # Errors
/// `MissingRegressor` if a regressor column is absent.
pub fn mark_model_inputs(frame: &DataFrame, model: &OlsModel, suffix: &str) -> Result<DataFrame> {
    let mut out = frame.clone();
    for regressor in &model.regressors {
        out.rename(regressor, &format!("{regressor}{suffix}"))
            .map_err(|_| ForecastError::MissingRegressor {
                regressor: regressor.clone(),
            })?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::text_values;
    use approx::assert_abs_diff_eq;

    fn date(d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2024, 1, d)
    }

    fn frame() -> DataFrame {
        DataFrame::new(vec![
            date_series("t", &[date(1), date(2), date(3), date(4)]).unwrap(),
            Series::new("y", &[10.0, 12.0, 14.0, 16.0]),
            Series::new("x", &[5.0, 6.0, 7.0, 8.0]),
            Series::new("x_lag_1", &[0.0, 5.0, 6.0, 7.0]),
        ])
        .unwrap()
    }

    fn model() -> OlsModel {
        OlsModel {
            regressors: vec!["x".to_string(), "x_lag_1".to_string()],
            coeffs: vec![2.0, 0.5],
            intercept: 1.0,
            rmse: 0.0,
            r2: 1.0,
            n_rows: 2,
        }
    }

    fn labels_of(frame: &DataFrame, name: &str) -> Vec<Option<String>> {
        text_values(frame.column(name).unwrap(), "%d.%m.%Y").unwrap()
    }

    #[test]
    fn test_predict_on_params_values_and_labels() {
        let labels = Labels::default();
        let out = predict_on_params(&frame(), &model(), 50.0, "y", &labels).unwrap();

        let forecast = numeric_values(&out, "Прогноз y").unwrap();
        assert_abs_diff_eq!(forecast[0], 11.0, epsilon = 1e-12);
        assert_abs_diff_eq!(forecast[1], 15.5, epsilon = 1e-12);
        assert_abs_diff_eq!(forecast[3], 20.5, epsilon = 1e-12);

        let split = labels_of(&out, "split");
        assert_eq!(split[0].as_deref(), Some("train"));
        assert_eq!(split[1].as_deref(), Some("train"));
        assert_eq!(split[2].as_deref(), Some("test"));
        // input not mutated
        assert_eq!(frame().width(), 4);
    }

    #[test]
    fn test_predict_missing_regressor() {
        let mut model = model();
        model.regressors[1] = "z".to_string();
        let result = predict_on_params(&frame(), &model, 50.0, "y", &Labels::default());
        match result {
            Err(ForecastError::MissingRegressor { regressor }) => assert_eq!(regressor, "z"),
            other => panic!("expected MissingRegressor, got {other:?}"),
        }
    }

    #[test]
    fn test_forecast_next_row() {
        let labels = Labels::default();
        let predicted = predict_on_params(&frame(), &model(), 50.0, "y", &labels).unwrap();
        let out = forecast_next(&predicted, &model(), "t", "y", &labels).unwrap();

        assert_eq!(out.height(), 5);
        assert_eq!(date_values(out.column("t").unwrap()).unwrap()[4], date(5));
        let y: Vec<Option<f64>> = out.column("y").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(y[4], None);
        // x repeats its last value, x_lag_1 takes x at the last row
        assert_eq!(numeric_values(&out, "x").unwrap()[4], 8.0);
        assert_eq!(numeric_values(&out, "x_lag_1").unwrap()[4], 8.0);
        assert_abs_diff_eq!(
            numeric_values(&out, "Прогноз y").unwrap()[4],
            1.0 + 2.0 * 8.0 + 0.5 * 8.0,
            epsilon = 1e-12
        );
        assert_eq!(labels_of(&out, "split")[4].as_deref(), Some("forecast"));
    }

    #[test]
    fn test_forecast_next_suffixed_lag() {
        let frame = DataFrame::new(vec![
            date_series("t", &[date(1), date(2), date(3)]).unwrap(),
            Series::new("x", &[5.0, 6.0, 7.0]),
            Series::new("x_lag_1_2", &[0.0, 5.0, 6.0]),
        ])
        .unwrap();
        let model = OlsModel {
            regressors: vec!["x_lag_1_2".to_string()],
            coeffs: vec![1.0],
            intercept: 0.0,
            rmse: 0.0,
            r2: 1.0,
            n_rows: 3,
        };
        let out = forecast_next(&frame, &model, "t", "y", &Labels::default()).unwrap();
        assert_eq!(numeric_values(&out, "x_lag_1_2").unwrap()[3], 7.0);
    }

    #[test]
    fn test_forecast_next_empty_frame() {
        let empty = frame().slice(0, 0);
        assert!(matches!(
            forecast_next(&empty, &model(), "t", "y", &Labels::default()),
            Err(ForecastError::EmptyInput)
        ));
    }

    #[test]
    fn test_next_date_steps() {
        assert_eq!(next_date(&[date(1), date(8)]), date(15));
        assert_eq!(next_date(&[date(3)]), date(4));
        assert_eq!(next_date(&[date(3), None]), None);
    }

    #[test]
    fn test_mark_model_inputs() {
        let out = mark_model_inputs(&frame(), &model(), "_P").unwrap();
        let names = out.get_column_names();
        assert!(names.contains(&"x_P"));
        assert!(names.contains(&"x_lag_1_P"));
        assert!(names.contains(&"y"));
        assert!(!names.contains(&"x"));

        let mut model = model();
        model.regressors.push("absent".to_string());
        model.coeffs.push(1.0);
        assert!(matches!(
            mark_model_inputs(&frame(), &model, "_P"),
            Err(ForecastError::MissingRegressor { .. })
        ));
    }
}
