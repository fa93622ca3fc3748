//! # adl_forecast
//!
//! Lagged OLS forecasting of spreadsheet time series.
//!
//! A run takes a table with a time column, a target and up to three factors, and:
//!
//! * **Prepares** the data: parses dates (`%d.%m.%Y` by default) and drops unparsable rows
//! * **Lags** the factors: `<col>_lag_1 ..= <col>_lag_n`, zero-filled at the start
//! * **Fits** `target ~ factors + lags + const` by OLS on a positional training prefix
//! * **Forecasts** every row, labels it train/test and scores it with MAPE
//! * **Exports** the augmented table to a timestamped xlsx or CSV file
//!
//! ## Example
//!
//! ```
//! use adl_forecast::{run_pipeline, PipelineConfig};
//! use polars::prelude::*;
//!
//! let dates: Vec<String> = (1..=12).map(|d| format!("{d:02}.03.2024")).collect();
//! let volume: Vec<f64> = (0..12).map(|i| 50.0 + 3.0 * i as f64 + (i % 4) as f64).collect();
//! let load: Vec<f64> = volume
//!     .iter()
//!     .enumerate()
//!     .map(|(i, &v)| {
//!         let prev = if i == 0 { 0.0 } else { volume[i - 1] };
//!         10.0 + 0.8 * v + 0.1 * prev
//!     })
//!     .collect();
//!
//! let source = df!(
//!     "Date" => dates,
//!     "Load" => load,
//!     "Volume" => volume
//! )
//! .unwrap();
//!
//! let config = PipelineConfig {
//!     time_column: "Date".to_string(),
//!     target_column: "Load".to_string(),
//!     factor_columns: vec!["Volume".to_string()],
//!     train_percent: 75.0,
//!     ..Default::default()
//! };
//!
//! let out = run_pipeline(&source, &config).unwrap();
//! println!("params: {:?}", out.model.params());
//! println!("MAPE train {:.4}  test {:.4}", out.mape.train, out.mape.test);
//! assert!(out.frame.column("Прогноз Load").is_ok());
//! ```

// Module declarations
pub mod data;
mod defaults;
pub mod export;
pub mod forecast;
pub mod frame;
pub mod io;
pub mod lags;
pub mod metrics;
pub mod ols;
pub mod pipeline;
pub mod split;
mod types;

// Re-export public types
pub use types::{
    ExportFormat, ExportOptions, ForecastError, LagOrder, Labels, MapeSummary, OlsModel,
    PipelineConfig, Result, SplitKind,
};

// Re-export main public functions
pub use data::{parse_dates, prepare_data};
pub use export::{
    export_table, export_table_at, sanitize_file_stem, sanitize_sheet_name, write_report,
    ModelReport,
};
pub use forecast::{forecast_next, mark_model_inputs, predict_on_params};
pub use frame::{date_series, date_values, numeric_values, text_values, to_numeric};
pub use io::{read_csv, read_excel, read_table, sheet_names};
pub use lags::{create_lags, create_lags_with_names, regressor_columns};
pub use metrics::{calculate_mape, mape_summary};
pub use ols::fit_ols;
pub use pipeline::{run_file, run_pipeline, FileRunOutput, PipelineOutput};
pub use split::separation_data;
