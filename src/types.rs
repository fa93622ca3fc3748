use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::defaults::{
    DEFAULT_DATE_FORMAT, DEFAULT_FORECAST_LABEL, DEFAULT_FORECAST_PREFIX, DEFAULT_INPUT_SUFFIX,
    DEFAULT_LAG_ORDER, DEFAULT_MAPE_COLUMN, DEFAULT_SPLIT_COLUMN, DEFAULT_TEST_LABEL,
    DEFAULT_TRAIN_LABEL, DEFAULT_TRAIN_PERCENT, INTERCEPT_NAME, MAX_FACTORS,
};

/// Lag order (number of one-step shifts per column).
pub type LagOrder = usize;

/// Fitted OLS model: intercept plus one coefficient per regressor.
///
/// Invariant: `regressors.len() == coeffs.len()`; order matches the design matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct OlsModel {
    /// Regressor column names, in design-matrix order
    pub regressors: Vec<String>,
    /// Coefficient per regressor
    pub coeffs: Vec<f64>,
    /// Intercept ("const")
    pub intercept: f64,
    /// Root mean squared error on the training slice
    pub rmse: f64,
    /// R² (coefficient of determination) on the training slice
    pub r2: f64,
    /// Number of training rows used
    pub n_rows: usize,
}

impl OlsModel {
    /// Coefficient for a regressor; `"const"` returns the intercept.
    pub fn coefficient(&self, name: &str) -> Option<f64> {
        if name == INTERCEPT_NAME {
            return Some(self.intercept);
        }
        self.regressors
            .iter()
            .position(|r| r == name)
            .map(|idx| self.coeffs[idx])
    }

    /// All parameters as `(name, value)` pairs, intercept first.
    pub fn params(&self) -> Vec<(String, f64)> {
        let mut out = Vec::with_capacity(self.coeffs.len() + 1);
        out.push((INTERCEPT_NAME.to_string(), self.intercept));
        out.extend(
            self.regressors
                .iter()
                .cloned()
                .zip(self.coeffs.iter().copied()),
        );
        out
    }
}

/// Which part of the positional split a row belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplitKind {
    Train,
    Test,
    /// Row appended past the end of the known data
    Forecast,
}

impl SplitKind {
    pub fn label(self, labels: &Labels) -> &str {
        match self {
            SplitKind::Train => &labels.train,
            SplitKind::Test => &labels.test,
            SplitKind::Forecast => &labels.forecast,
        }
    }
}

/// Names of generated columns and split labels.
///
/// # Example
/// ```
/// use adl_forecast::Labels;
/// let labels = Labels {
///     forecast_prefix: "Forecast".to_string(),
///     ..Default::default()
/// };
/// assert_eq!(labels.forecast_column("Load"), "Forecast Load");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Labels {
    /// Forecast column is named `"<forecast_prefix> <target>"`.
    pub forecast_prefix: String,
    pub split_column: String,
    pub train: String,
    pub test: String,
    pub forecast: String,
    pub mape_column: String,
    /// Suffix appended to regressor columns used by the model.
    pub input_suffix: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            forecast_prefix: DEFAULT_FORECAST_PREFIX.to_string(),
            split_column: DEFAULT_SPLIT_COLUMN.to_string(),
            train: DEFAULT_TRAIN_LABEL.to_string(),
            test: DEFAULT_TEST_LABEL.to_string(),
            forecast: DEFAULT_FORECAST_LABEL.to_string(),
            mape_column: DEFAULT_MAPE_COLUMN.to_string(),
            input_suffix: DEFAULT_INPUT_SUFFIX.to_string(),
        }
    }
}

impl Labels {
    pub fn forecast_column(&self, target: &str) -> String {
        format!("{} {}", self.forecast_prefix, target)
    }
}

/// Average MAPE over the whole table and over each side of the split.
///
/// A side with no rows reports 0.0.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MapeSummary {
    pub overall: f64,
    pub train: f64,
    pub test: f64,
}

/// Everything the pipeline needs to know about one analysis.
///
/// # Example
/// ```
/// use adl_forecast::PipelineConfig;
/// let config = PipelineConfig {
///     time_column: "Date".to_string(),
///     target_column: "Load".to_string(),
///     factor_columns: vec!["Load".to_string(), "Volume".to_string()],
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub time_column: String,
    pub target_column: String,
    /// 1 to 3 factor columns; may include the target.
    pub factor_columns: Vec<String>,
    pub lag_order: LagOrder,
    /// Share of rows (by position) used for training, in [0, 100].
    pub train_percent: f64,
    /// Lag the target too when it is listed among the factors.
    pub lag_target: bool,
    /// chrono format string for the time column.
    pub date_format: String,
    /// Append one forecast row past the end of the data.
    pub step_ahead: bool,
    /// Rename regressor columns with `labels.input_suffix`.
    pub mark_inputs: bool,
    pub labels: Labels,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            time_column: String::new(),
            target_column: String::new(),
            factor_columns: Vec::new(),
            lag_order: DEFAULT_LAG_ORDER,
            train_percent: DEFAULT_TRAIN_PERCENT,
            lag_target: true,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            step_ahead: false,
            mark_inputs: false,
            labels: Labels::default(),
        }
    }
}

impl PipelineConfig {
    /// Check the configuration before any data is touched.
    pub fn validate(&self) -> Result<()> {
        if self.time_column.trim().is_empty() {
            return Err(ForecastError::InvalidConfig(
                "time column name is empty".to_string(),
            ));
        }
        if self.target_column.trim().is_empty() {
            return Err(ForecastError::InvalidConfig(
                "target column name is empty".to_string(),
            ));
        }
        if self.factor_columns.is_empty() || self.factor_columns.len() > MAX_FACTORS {
            return Err(ForecastError::InvalidConfig(format!(
                "expected 1 to {MAX_FACTORS} factor columns, got {}",
                self.factor_columns.len()
            )));
        }
        // Duplicated factors would enter the design twice
        for (i, factor) in self.factor_columns.iter().enumerate() {
            if self.factor_columns[..i].contains(factor) {
                return Err(ForecastError::InvalidConfig(format!(
                    "factor column '{factor}' is listed more than once"
                )));
            }
        }
        if self.lag_order == 0 {
            return Err(ForecastError::InvalidConfig(
                "lag order must be at least 1".to_string(),
            ));
        }
        check_percent(self.train_percent)?;
        Ok(())
    }
}

pub(crate) fn check_percent(percent: f64) -> Result<()> {
    if !(0.0..=100.0).contains(&percent) {
        return Err(ForecastError::InvalidConfig(format!(
            "train percent must be within [0, 100], got {percent}"
        )));
    }
    Ok(())
}

/// Output file format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Xlsx,
    Csv,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Csv => "csv",
        }
    }
}

/// Where and how to write the augmented table.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExportOptions {
    /// Base name; sanitized before use.
    pub name: String,
    /// Output directory; the current directory when `None`.
    pub directory: Option<PathBuf>,
    pub format: ExportFormat,
    /// Format used to render date cells.
    pub date_format: Option<String>,
}

/// Library error type.
#[derive(thiserror::Error, Debug)]
pub enum ForecastError {
    #[error("column not found: {column}")]
    ColumnNotFound { column: String },
    #[error("no row of time column '{column}' could be parsed as a date")]
    NoParsableDates { column: String },
    #[error("model is underdetermined: {rows} rows for {columns} unknowns")]
    UnderdeterminedModel { rows: usize, columns: usize },
    #[error("regressor '{regressor}' is missing from the data")]
    MissingRegressor { regressor: String },
    #[error("failed to export to {}: {cause}", path.display())]
    ExportFailure { path: PathBuf, cause: String },
    #[error("sheet not found: {sheet}")]
    SheetNotFound { sheet: String },
    #[error("failed to read {}: {cause}", path.display())]
    Read { path: PathBuf, cause: String },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("linear algebra failure: {0}")]
    Linalg(String),
    #[error("empty input")]
    EmptyInput,
    #[error("dataframe error: {0}")]
    Polars(String),
}

impl From<polars::prelude::PolarsError> for ForecastError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        ForecastError::Polars(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;
