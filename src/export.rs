//! Writing augmented tables and model reports.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use log::info;
use polars::prelude::*;
use simple_excel_writer::{Row, Workbook};

use crate::defaults::{
    DEFAULT_DATE_FORMAT, DEFAULT_SHEET_NAME, EXPORT_PREFIX, FILE_FORBIDDEN, MAX_FILE_STEM_LEN,
    MAX_SHEET_NAME_LEN, SHEET_FORBIDDEN, TIMESTAMP_FORMAT,
};
use crate::frame::{text_values, to_numeric};
use crate::types::{ExportFormat, ExportOptions, ForecastError, MapeSummary, OlsModel, Result};

fn export_error(path: &Path, cause: impl ToString) -> ForecastError {
    ForecastError::ExportFailure {
        path: path.to_path_buf(),
        cause: cause.to_string(),
    }
}

/// Make a name usable as a spreadsheet sheet name.
///
/// Each of `[ ] : * ? / \` becomes `_`. Names longer than 31 characters, or empty after
/// trimming, fall back to `"Prediction"`.
///
/// # Example
/// ```
/// use adl_forecast::sanitize_sheet_name;
/// assert_eq!(sanitize_sheet_name("A/B*C?D"), "A_B_C_D");
/// ```
pub fn sanitize_sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if SHEET_FORBIDDEN.contains(&c) { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned.chars().count() > MAX_SHEET_NAME_LEN {
        return DEFAULT_SHEET_NAME.to_string();
    }
    cleaned.to_string()
}

/// Make a name usable as a file stem: forbidden and control characters become `_`,
/// surrounding whitespace is trimmed and the result is capped in length.
pub fn sanitize_file_stem(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if FILE_FORBIDDEN.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    cleaned
        .trim()
        .chars()
        .take(MAX_FILE_STEM_LEN)
        .collect::<String>()
        .trim_end()
        .to_string()
}

/// `Prediction <name>_<YYYY-MM-DD_HH-MM-SS>.<ext>`
pub fn output_file_name(name: &str, timestamp: NaiveDateTime, format: ExportFormat) -> String {
    let stem = sanitize_file_stem(name);
    let stamp = timestamp.format(TIMESTAMP_FORMAT);
    if stem.is_empty() {
        format!("{EXPORT_PREFIX}_{stamp}.{}", format.extension())
    } else {
        format!("{EXPORT_PREFIX} {stem}_{stamp}.{}", format.extension())
    }
}

/// Sheet name used for an export named `name`.
pub fn output_sheet_name(name: &str) -> String {
    sanitize_sheet_name(&format!("{EXPORT_PREFIX} {}", name.trim()))
}

/// Write `frame` to a timestamped file and return its path.
///
/// # Arguments
/// * `frame` - Frame to write
/// * `options` - Name, directory, format and date format of the export
///
/// # Errors
/// `ExportFailure` if the directory cannot be created or the file cannot be written.
pub fn export_table(frame: &DataFrame, options: &ExportOptions) -> Result<PathBuf> {
    export_table_at(frame, options, Local::now().naive_local())
}

/// Same as [`export_table`] with an explicit timestamp.
pub fn export_table_at(
    frame: &DataFrame,
    options: &ExportOptions,
    timestamp: NaiveDateTime,
) -> Result<PathBuf> {
    // Resolve and create the output directory
    let directory = match &options.directory {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().map_err(|e| export_error(Path::new("."), e))?,
    };
    fs::create_dir_all(&directory).map_err(|e| export_error(&directory, e))?;

    let path = directory.join(output_file_name(&options.name, timestamp, options.format));
    let date_format = options.date_format.as_deref().unwrap_or(DEFAULT_DATE_FORMAT);
    match options.format {
        ExportFormat::Csv => write_csv(frame, &path, date_format)?,
        ExportFormat::Xlsx => {
            write_xlsx(frame, &path, &output_sheet_name(&options.name), date_format)?
        }
    }

    info!("wrote {} rows to {}", frame.height(), path.display());
    Ok(path)
}

/// Write `frame` as CSV with a header row; nulls are written as empty fields.
pub fn write_csv(frame: &DataFrame, path: &Path, date_format: &str) -> Result<()> {
    let mut file = fs::File::create(path).map_err(|e| export_error(path, e))?;
    let mut frame = frame.clone();
    CsvWriter::new(&mut file)
        .has_header(true)
        .with_date_format(Some(date_format.to_string()))
        .finish(&mut frame)
        .map_err(|e| export_error(path, e))?;
    Ok(())
}

/// One worksheet cell on the way out.
enum SheetCell {
    Number(f64),
    Text(String),
    Blank,
}

fn sheet_cells(series: &Series, date_format: &str) -> Result<Vec<SheetCell>> {
    // Numbers stay numeric in the workbook, everything else is written as text
    if series.dtype().is_numeric() {
        let numeric = to_numeric(series)?;
        let cells = numeric
            .f64()?
            .into_iter()
            .map(|v| v.map(SheetCell::Number).unwrap_or(SheetCell::Blank))
            .collect();
        return Ok(cells);
    }
    let cells = text_values(series, date_format)?
        .into_iter()
        .map(|v| v.map(SheetCell::Text).unwrap_or(SheetCell::Blank))
        .collect();
    Ok(cells)
}

/// Write `frame` to a single-sheet xlsx workbook.
///
/// # Arguments
/// * `frame` - Frame to write; the header row holds its column names
/// * `path` - Workbook path, must be valid UTF-8
/// * `sheet_name` - Name of the only sheet
/// * `date_format` - Format for `Date` cells, which are written as text
pub fn write_xlsx(frame: &DataFrame, path: &Path, sheet_name: &str, date_format: &str) -> Result<()> {
    let path_str = path
        .to_str()
        .ok_or_else(|| export_error(path, "path is not valid UTF-8"))?;
    let columns = frame
        .get_columns()
        .iter()
        .map(|s| sheet_cells(s, date_format))
        .collect::<Result<Vec<_>>>()?;

    let mut workbook = Workbook::create(path_str);
    let mut sheet = workbook.create_sheet(sheet_name);

    workbook
        .write_sheet(&mut sheet, |writer| {
            let mut header = Row::new();
            for name in frame.get_column_names() {
                header.add_cell(name.to_string());
            }
            writer.append_row(header)?;
            for idx in 0..frame.height() {
                let mut row = Row::new();
                for column in &columns {
                    match &column[idx] {
                        SheetCell::Number(v) => row.add_cell(*v),
                        SheetCell::Text(s) => row.add_cell(s.clone()),
                        SheetCell::Blank => row.add_cell(()),
                    }
                }
                writer.append_row(row)?;
            }
            Ok(())
        })
        .map_err(|e| export_error(path, e))?;

    workbook.close().map_err(|e| export_error(path, e))?;
    Ok(())
}

/// Plain-text summary of a fitted model and its accuracy.
#[derive(Clone, Debug)]
pub struct ModelReport<'a> {
    pub target: &'a str,
    pub model: &'a OlsModel,
    pub mape: MapeSummary,
}

impl fmt::Display for ModelReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Target: {}", self.target)?;
        writeln!(f)?;
        writeln!(f, "Parameters:")?;
        for (name, value) in self.model.params() {
            writeln!(f, "  {name}: {value}")?;
        }
        writeln!(f)?;
        writeln!(f, "Training rows: {}", self.model.n_rows)?;
        writeln!(f, "RMSE (train): {:.6}", self.model.rmse)?;
        writeln!(f, "R2 (train):   {:.6}", self.model.r2)?;
        writeln!(f)?;
        writeln!(f, "MAPE:         {:.4}", self.mape.overall)?;
        writeln!(f, "MAPE (train): {:.4}", self.mape.train)?;
        write!(f, "MAPE (test):  {:.4}", self.mape.test)
    }
}

/// Write a model report to `path`.
pub fn write_report(report: &ModelReport<'_>, path: &Path) -> Result<()> {
    fs::write(path, format!("{report}\n")).map_err(|e| export_error(path, e))
}
