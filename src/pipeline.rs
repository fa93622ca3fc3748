//! End-to-end analysis: prepare, lag, split, fit, forecast, score, export.

use std::path::{Path, PathBuf};

use log::info;
use polars::prelude::*;

use crate::data::prepare_data;
use crate::export::{export_table, write_report, ModelReport};
use crate::forecast::{forecast_next, mark_model_inputs, predict_on_params};
use crate::io::read_table;
use crate::lags::{create_lags_with_names, regressor_columns};
use crate::metrics::{calculate_mape, mape_summary};
use crate::ols::fit_ols;
use crate::split::separation_data;
use crate::types::{ExportOptions, ForecastError, MapeSummary, OlsModel, PipelineConfig, Result};

/// Result of one analysis.
#[derive(Clone, Debug)]
pub struct PipelineOutput {
    /// Prepared data with lag, forecast, split and MAPE columns
    pub frame: DataFrame,
    pub model: OlsModel,
    pub mape: MapeSummary,
}

/// Run the whole analysis on an in-memory frame.
///
/// The model is fitted on the training prefix only; forecasts and per-row MAPE cover
/// every row. The regressors are the factors followed by the lag columns exactly as they
/// were added to the frame.
///
/// # Arguments
/// * `source` - Raw frame, e.g. from [`read_table`]
/// * `config` - Column names and model settings
///
/// # Returns
/// The augmented frame, the fitted model and the MAPE summary
///
/// # Errors
/// * `InvalidConfig` if `config` does not validate
/// * `ColumnNotFound` if a configured column is absent
/// * `NoParsableDates` if no time cell parses
/// * `UnderdeterminedModel` if the training slice is too short for the regressors
/// * `Linalg` if the training design is rank deficient
pub fn run_pipeline(source: &DataFrame, config: &PipelineConfig) -> Result<PipelineOutput> {
    // Reject bad settings before touching the data
    config.validate()?;
    let target = config.target_column.as_str();
    let labels = &config.labels;

    // Select, parse and clean the configured columns
    let prepared = prepare_data(
        source,
        &config.time_column,
        target,
        &config.factor_columns,
        &config.date_format,
    )?;
    if prepared.height() == 0 {
        return Err(ForecastError::NoParsableDates {
            column: config.time_column.clone(),
        });
    }

    // Lag the factors; the model uses the names the lags were actually given
    let (lagged, lag_names) = create_lags_with_names(
        &prepared,
        &config.factor_columns,
        config.lag_order,
        target,
        config.lag_target,
    )?;
    let regressors = regressor_columns(&config.factor_columns, &lag_names, target);

    // Fit on the training prefix only
    let (train, test) = separation_data(&lagged, config.train_percent)?;
    info!(
        "fitting '{target}' on {} rows ({} held out) with {} regressors",
        train.height(),
        test.height(),
        regressors.len()
    );
    let model = fit_ols(&train, target, &regressors)?;

    // Forecast and score every row
    let predicted = predict_on_params(&lagged, &model, config.train_percent, target, labels)?;
    let (mut frame, overall) = calculate_mape(&predicted, target, labels)?;
    let mape = mape_summary(&frame, train.height(), labels)?;
    info!(
        "MAPE {overall:.4} (train {:.4}, test {:.4})",
        mape.train, mape.test
    );

    if config.step_ahead {
        frame = forecast_next(&frame, &model, &config.time_column, target, labels)?;
    }
    if config.mark_inputs {
        frame = mark_model_inputs(&frame, &model, &labels.input_suffix)?;
    }

    Ok(PipelineOutput { frame, model, mape })
}

/// Result of [`run_file`].
#[derive(Clone, Debug)]
pub struct FileRunOutput {
    pub output: PipelineOutput,
    /// Exported frame
    pub table_path: PathBuf,
    /// Text report written next to the table
    pub report_path: PathBuf,
}

/// Read `path`, run the analysis, and export the table plus a text report.
///
/// An empty `export.name` falls back to the target column name.
pub fn run_file<P: AsRef<Path>>(
    path: P,
    sheet: Option<&str>,
    config: &PipelineConfig,
    export: &ExportOptions,
) -> Result<FileRunOutput> {
    let path = path.as_ref();
    info!("reading {}", path.display());
    let source = read_table(path, sheet)?;
    let output = run_pipeline(&source, config)?;

    let mut options = export.clone();
    if options.name.trim().is_empty() {
        options.name = config.target_column.clone();
    }
    if options.date_format.is_none() {
        options.date_format = Some(config.date_format.clone());
    }
    let table_path = export_table(&output.frame, &options)?;

    let report_path = table_path.with_extension("txt");
    let report = ModelReport {
        target: &config.target_column,
        model: &output.model,
        mape: output.mape,
    };
    write_report(&report, &report_path)?;

    Ok(FileRunOutput {
        output,
        table_path,
        report_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{numeric_values, text_values};
    use approx::assert_abs_diff_eq;

    fn volume(n: usize) -> Vec<f64> {
        (0..n).map(|i| ((i * 7) % 5) as f64 + i as f64).collect()
    }

    fn source(n: usize) -> DataFrame {
        let dates: Vec<String> = (0..n).map(|i| format!("{:02}.01.2024", i + 1)).collect();
        let x = volume(n);
        let y: Vec<f64> = (0..n)
            .map(|i| {
                let prev = if i == 0 { 0.0 } else { x[i - 1] };
                3.0 + 2.0 * x[i] - 0.5 * prev
            })
            .collect();
        df!(
            "Date" => dates,
            "Load" => y,
            "Volume" => x
        )
        .unwrap()
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            time_column: "Date".to_string(),
            target_column: "Load".to_string(),
            factor_columns: vec!["Volume".to_string()],
            train_percent: 70.0,
            ..Default::default()
        }
    }

    fn text_column(frame: &DataFrame, name: &str) -> Vec<Option<String>> {
        text_values(frame.column(name).unwrap(), "%d.%m.%Y").unwrap()
    }

    #[test]
    fn test_pipeline_recovers_coefficients() {
        let out = run_pipeline(&source(20), &config()).unwrap();

        assert_eq!(out.model.regressors, vec!["Volume", "Volume_lag_1"]);
        assert_abs_diff_eq!(out.model.intercept, 3.0, epsilon = 1e-6);
        assert_abs_diff_eq!(out.model.coeffs[0], 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(out.model.coeffs[1], -0.5, epsilon = 1e-6);
        assert!(out.mape.overall < 1e-6);

        let split = text_column(&out.frame, "split");
        let train = split.iter().filter(|s| s.as_deref() == Some("train")).count();
        assert_eq!(train, 14);
        assert!(out.frame.column("Прогноз Load").is_ok());
        assert!(out.frame.column("MAPE").is_ok());
    }

    #[test]
    fn test_pipeline_step_ahead_and_marking() {
        let config = PipelineConfig {
            step_ahead: true,
            mark_inputs: true,
            ..config()
        };
        let out = run_pipeline(&source(20), &config).unwrap();
        assert_eq!(out.frame.height(), 21);
        assert!(out.frame.column("Volume_P").is_ok());
        assert!(out.frame.column("Volume_lag_1_P").is_ok());
        assert_eq!(text_column(&out.frame, "split")[20].as_deref(), Some("forecast"));
        let mape: Vec<Option<f64>> = out
            .frame
            .column("MAPE")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(mape[20], None);
    }

    #[test]
    fn test_pipeline_no_parsable_dates() {
        let config = PipelineConfig {
            date_format: "%Y/%m/%d".to_string(),
            ..config()
        };
        assert!(matches!(
            run_pipeline(&source(5), &config),
            Err(ForecastError::NoParsableDates { .. })
        ));
    }

    #[test]
    fn test_pipeline_underdetermined() {
        let config = PipelineConfig {
            train_percent: 10.0,
            ..config()
        };
        assert!(matches!(
            run_pipeline(&source(10), &config),
            Err(ForecastError::UnderdeterminedModel { .. })
        ));
    }

    #[test]
    fn test_pipeline_rejects_bad_config() {
        let config = PipelineConfig {
            factor_columns: vec![],
            ..config()
        };
        assert!(matches!(
            run_pipeline(&source(5), &config),
            Err(ForecastError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_pipeline_rejects_duplicate_factors() {
        let config = PipelineConfig {
            factor_columns: vec!["Volume".to_string(), "Volume".to_string()],
            ..config()
        };
        assert!(matches!(
            run_pipeline(&source(20), &config),
            Err(ForecastError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_pipeline_constant_factor_is_rank_deficient() {
        let mut source = source(20);
        source.with_column(Series::new("Flat", vec![5.0; 20])).unwrap();
        let config = PipelineConfig {
            factor_columns: vec!["Volume".to_string(), "Flat".to_string()],
            ..config()
        };
        assert!(matches!(
            run_pipeline(&source, &config),
            Err(ForecastError::Linalg(_))
        ));
    }

    #[test]
    fn test_pipeline_uses_emitted_lag_names() {
        // a factor that is itself called Volume_lag_1
        let mut source = source(20);
        let other: Vec<f64> = (0..20).map(|i| ((i * i) % 7) as f64).collect();
        source
            .with_column(Series::new("Volume_lag_1", other.clone()))
            .unwrap();
        let config = PipelineConfig {
            factor_columns: vec!["Volume".to_string(), "Volume_lag_1".to_string()],
            ..config()
        };
        let out = run_pipeline(&source, &config).unwrap();

        assert_eq!(
            out.model.regressors,
            vec!["Volume", "Volume_lag_1", "Volume_lag_1_2", "Volume_lag_1_lag_1"]
        );
        for regressor in &out.model.regressors {
            assert!(out.frame.column(regressor).is_ok());
        }
        // the source column is untouched and the true lag lives under the suffix
        assert_eq!(numeric_values(&out.frame, "Volume_lag_1").unwrap(), other);
        assert_eq!(
            numeric_values(&out.frame, "Volume_lag_1_2").unwrap()[1],
            volume(20)[0]
        );
        assert_abs_diff_eq!(
            out.model.coefficient("Volume_lag_1_2").unwrap(),
            -0.5,
            epsilon = 1e-6
        );
        assert_abs_diff_eq!(
            out.model.coefficient("Volume_lag_1").unwrap(),
            0.0,
            epsilon = 1e-6
        );
    }
}
