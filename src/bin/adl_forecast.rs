//! # adl-forecast
//!
//! Command-line front end: list workbook sheets, or run one lagged OLS analysis and
//! export the result.

use std::fs;
use std::path::PathBuf;

use adl_forecast::{run_file, sheet_names, ExportFormat, ExportOptions, LagOrder, PipelineConfig};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;

#[derive(Parser)]
#[command(name = "adl-forecast")]
#[command(about = "Lagged OLS forecasting of spreadsheet time series", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Xlsx,
    Csv,
}

impl From<Format> for ExportFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Xlsx => ExportFormat::Xlsx,
            Format::Csv => ExportFormat::Csv,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List the sheets of an xlsx workbook
    Sheets {
        /// Workbook path
        file: PathBuf,
    },

    /// Fit, forecast, score and export
    Run {
        /// Input file (xlsx or CSV)
        file: PathBuf,

        /// Sheet to read (default: first sheet)
        #[arg(short, long)]
        sheet: Option<String>,

        /// JSON file with a pipeline configuration; flags below override it
        #[arg(long)]
        config: Option<PathBuf>,

        /// Time column
        #[arg(long)]
        time: Option<String>,

        /// Target column
        #[arg(long)]
        target: Option<String>,

        /// Factor column (repeat for up to three)
        #[arg(short, long = "factor")]
        factors: Vec<String>,

        /// Lag order
        #[arg(short, long)]
        lags: Option<LagOrder>,

        /// Share of rows used for training, in percent
        #[arg(short = 'p', long)]
        train_percent: Option<f64>,

        /// Do not lag the target when it is listed as a factor
        #[arg(long)]
        no_target_lag: bool,

        /// Append a one-step-ahead forecast row
        #[arg(long)]
        step_ahead: bool,

        /// Suffix regressor columns with "_P"
        #[arg(long)]
        mark_inputs: bool,

        /// Output format
        #[arg(long, value_enum, default_value = "xlsx")]
        format: Format,

        /// Output directory (default: current directory)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Name used in the output file (default: target column)
        #[arg(short, long)]
        name: Option<String>,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Sheets { file } => {
            for name in sheet_names(&file)? {
                println!("{name}");
            }
        }
        Commands::Run {
            file,
            sheet,
            config,
            time,
            target,
            factors,
            lags,
            train_percent,
            no_target_lag,
            step_ahead,
            mark_inputs,
            format,
            out_dir,
            name,
        } => {
            let mut config = load_config(config.as_ref())?;
            if let Some(time) = time {
                config.time_column = time;
            }
            if let Some(target) = target {
                config.target_column = target;
            }
            if !factors.is_empty() {
                config.factor_columns = factors;
            }
            if let Some(lags) = lags {
                config.lag_order = lags;
            }
            if let Some(p) = train_percent {
                config.train_percent = p;
            }
            config.lag_target &= !no_target_lag;
            config.step_ahead |= step_ahead;
            config.mark_inputs |= mark_inputs;

            let export = ExportOptions {
                name: name.unwrap_or_default(),
                directory: out_dir,
                format: format.into(),
                date_format: None,
            };

            let result = run_file(&file, sheet.as_deref(), &config, &export)
                .with_context(|| format!("analysis of {} failed", file.display()))?;

            for (param, value) in result.output.model.params() {
                println!("{param:>24}  {value:.6}");
            }
            println!(
                "MAPE: {:.4} (train {:.4}, test {:.4})",
                result.output.mape.overall, result.output.mape.train, result.output.mape.test
            );
            info!("table:  {}", result.table_path.display());
            info!("report: {}", result.report_path.display());
        }
    }

    Ok(())
}
