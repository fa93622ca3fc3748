//! Reading source tables from xlsx workbooks and CSV files.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use calamine::{open_workbook, Data, Reader, Xlsx};
use chrono::{Duration, NaiveDate};
use log::debug;
use polars::prelude::*;

use crate::defaults::DEFAULT_DATE_FORMAT;
use crate::frame::date_series;
use crate::types::{ForecastError, Result};

fn read_error(path: &Path, cause: impl ToString) -> ForecastError {
    ForecastError::Read {
        path: path.to_path_buf(),
        cause: cause.to_string(),
    }
}

/// One worksheet cell after conversion.
#[derive(Clone, Debug, PartialEq)]
enum SheetValue {
    Number(f64),
    Text(String),
    Date(NaiveDate),
    Empty,
}

/// Convert an Excel serial day number (1900 date system) to a date.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.floor() as i64))
}

fn convert_cell(data: &Data) -> SheetValue {
    match data {
        Data::Int(v) => SheetValue::Number(*v as f64),
        Data::Float(v) => SheetValue::Number(*v),
        Data::Bool(b) => SheetValue::Number(if *b { 1.0 } else { 0.0 }),
        Data::String(s) if s.trim().is_empty() => SheetValue::Empty,
        Data::String(s) => SheetValue::Text(s.clone()),
        // Date-formatted cells hold the serial day number
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64())
            .map(SheetValue::Date)
            .unwrap_or(SheetValue::Empty),
        Data::DateTimeIso(s) => s
            .get(..10)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .map(SheetValue::Date)
            .unwrap_or_else(|| SheetValue::Text(s.clone())),
        _ => SheetValue::Empty,
    }
}

/// Build one typed series from converted cells.
///
/// All-number columns become `Float64`, all-date columns `Date`; anything mixed is kept
/// as `Utf8` with numbers and dates rendered as text (dates as `%d.%m.%Y`).
fn cells_to_series(name: &str, cells: &[SheetValue]) -> Result<Series> {
    let filled = cells.iter().filter(|c| **c != SheetValue::Empty);
    let all_numbers = filled.clone().all(|c| matches!(c, SheetValue::Number(_)));
    let all_dates =
        filled.clone().count() > 0 && filled.clone().all(|c| matches!(c, SheetValue::Date(_)));

    if all_dates {
        let dates: Vec<Option<NaiveDate>> = cells
            .iter()
            .map(|c| match c {
                SheetValue::Date(d) => Some(*d),
                _ => None,
            })
            .collect();
        return date_series(name, &dates);
    }
    if all_numbers {
        let values: Vec<Option<f64>> = cells
            .iter()
            .map(|c| match c {
                SheetValue::Number(v) => Some(*v),
                _ => None,
            })
            .collect();
        return Ok(Series::new(name, values));
    }
    let values: Vec<Option<String>> = cells
        .iter()
        .map(|c| match c {
            SheetValue::Number(v) => Some(v.to_string()),
            SheetValue::Text(s) => Some(s.clone()),
            SheetValue::Date(d) => Some(d.format(DEFAULT_DATE_FORMAT).to_string()),
            SheetValue::Empty => None,
        })
        .collect();
    Ok(Series::new(name, values))
}

/// Make header names unique the way spreadsheet tools do: `name`, `name.1`, `name.2`, ...
fn unique_headers(raw: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for (i, name) in raw.into_iter().enumerate() {
        let base = if name.trim().is_empty() {
            format!("Column{}", i + 1)
        } else {
            name
        };
        let mut candidate = base.clone();
        let mut k = 1;
        while out.contains(&candidate) {
            candidate = format!("{base}.{k}");
            k += 1;
        }
        out.push(candidate);
    }
    out
}

fn assemble(path: &Path, headers: Vec<String>, rows: Vec<Vec<SheetValue>>) -> Result<DataFrame> {
    let headers = unique_headers(headers);
    // Transpose rows into columns, padding short rows
    let mut columns: Vec<Vec<SheetValue>> = vec![Vec::with_capacity(rows.len()); headers.len()];
    for row in rows {
        let mut cells = row.into_iter();
        for column in columns.iter_mut() {
            column.push(cells.next().unwrap_or(SheetValue::Empty));
        }
    }
    let series = headers
        .iter()
        .zip(columns.iter())
        .map(|(name, cells)| cells_to_series(name, cells))
        .collect::<Result<Vec<_>>>()?;
    let frame = DataFrame::new(series)?;
    debug!(
        "read {} rows x {} columns from {}",
        frame.height(),
        frame.width(),
        path.display()
    );
    Ok(frame)
}

/// List the sheets of an xlsx workbook.
pub fn sheet_names<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let workbook: Xlsx<BufReader<File>> = open_workbook(path).map_err(|e| read_error(path, e))?;
    Ok(workbook.sheet_names())
}

/// Read one sheet of an xlsx workbook; the first row holds the column names.
///
/// Reads the first sheet when `sheet` is `None`.
///
/// # Errors
/// `Read` if the workbook cannot be opened or parsed, `SheetNotFound` for an unknown sheet.
pub fn read_excel<P: AsRef<Path>>(path: P, sheet: Option<&str>) -> Result<DataFrame> {
    let path = path.as_ref();
    let mut workbook: Xlsx<BufReader<File>> = open_workbook(path).map_err(|e| read_error(path, e))?;

    let names = workbook.sheet_names();
    let sheet = match sheet {
        Some(name) => name.to_string(),
        None => names.first().cloned().ok_or(ForecastError::EmptyInput)?,
    };
    if !names.contains(&sheet) {
        return Err(ForecastError::SheetNotFound { sheet });
    }

    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| read_error(path, e))?;

    // First row is the header, the rest is data
    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header) => header.iter().map(|c| c.to_string()).collect(),
        None => return Ok(DataFrame::default()),
    };
    let body = rows
        .map(|row| row.iter().map(convert_cell).collect())
        .collect();
    assemble(path, headers, body)
}

/// Read a CSV file with a header row.
///
/// Column types are inferred by polars; dates stay text until [`prepare_data`] parses
/// them with the configured format.
///
/// [`prepare_data`]: crate::data::prepare_data
pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
    let path = path.as_ref();
    let frame = CsvReader::from_path(path)
        .map_err(|e| read_error(path, e))?
        .has_header(true)
        .infer_schema(Some(100))
        .finish()
        .map_err(|e| read_error(path, e))?;
    debug!(
        "read {} rows x {} columns from {}",
        frame.height(),
        frame.width(),
        path.display()
    );
    Ok(frame)
}

/// Read a table, choosing the reader from the file extension (`.csv` or xlsx).
pub fn read_table<P: AsRef<Path>>(path: P, sheet: Option<&str>) -> Result<DataFrame> {
    let path = path.as_ref();
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    if is_csv {
        read_csv(path)
    } else {
        read_excel(path, sheet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_excel_serial_to_date() {
        assert_eq!(
            excel_serial_to_date(45292.0),
            NaiveDate::from_ymd_opt(2024, 1, 1)
        );
        assert_eq!(
            excel_serial_to_date(45292.75),
            NaiveDate::from_ymd_opt(2024, 1, 1)
        );
        assert_eq!(excel_serial_to_date(-1.0), None);
    }

    #[test]
    fn test_convert_cell() {
        use calamine::{ExcelDateTime, ExcelDateTimeType};

        assert_eq!(convert_cell(&Data::Int(3)), SheetValue::Number(3.0));
        assert_eq!(convert_cell(&Data::Bool(true)), SheetValue::Number(1.0));
        assert_eq!(convert_cell(&Data::String("  ".into())), SheetValue::Empty);
        assert_eq!(
            convert_cell(&Data::String("01.01.2024".into())),
            SheetValue::Text("01.01.2024".to_string())
        );
        assert_eq!(
            convert_cell(&Data::DateTimeIso("2024-01-02T00:00:00".into())),
            SheetValue::Date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())
        );
        // date-formatted cell
        let serial = ExcelDateTime::new(45292.0, ExcelDateTimeType::DateTime, false);
        assert_eq!(
            convert_cell(&Data::DateTime(serial)),
            SheetValue::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
        );
    }

    #[test]
    fn test_cells_to_series_types() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let dates = cells_to_series("t", &[SheetValue::Date(day), SheetValue::Empty]).unwrap();
        assert_eq!(dates.dtype(), &DataType::Date);
        assert_eq!(
            crate::frame::date_values(&dates).unwrap(),
            vec![Some(day), None]
        );

        let numbers =
            cells_to_series("v", &[SheetValue::Number(1.5), SheetValue::Empty]).unwrap();
        assert_eq!(numbers.dtype(), &DataType::Float64);

        let mixed = cells_to_series(
            "m",
            &[SheetValue::Date(day), SheetValue::Text("итого".to_string())],
        )
        .unwrap();
        let values: Vec<Option<&str>> = mixed.utf8().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some("01.01.2024"), Some("итого")]);
    }

    #[test]
    fn test_unique_headers() {
        let headers = unique_headers(vec![
            "Volume".to_string(),
            "Volume".to_string(),
            "".to_string(),
            "Volume".to_string(),
        ]);
        assert_eq!(headers, vec!["Volume", "Volume.1", "Column3", "Volume.2"]);
    }

    #[test]
    fn test_read_csv_infers_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "date,load,note").unwrap();
        writeln!(file, "01.01.2024,10.5,ok").unwrap();
        writeln!(file, "02.01.2024,,").unwrap();
        writeln!(file, "03.01.2024,12,done").unwrap();
        drop(file);

        let frame = read_table(&path, None).unwrap();
        assert_eq!(frame.height(), 3);
        let dates = crate::frame::text_values(frame.column("date").unwrap(), "%d.%m.%Y").unwrap();
        assert_eq!(dates[0].as_deref(), Some("01.01.2024"));
        let load: Vec<Option<f64>> = frame
            .column("load")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(load, vec![Some(10.5), None, Some(12.0)]);
    }

    #[test]
    fn test_read_missing_file() {
        let result = read_csv("/definitely/not/here.csv");
        assert!(matches!(result, Err(ForecastError::Read { .. })));
        let result = read_excel("/definitely/not/here.xlsx", None);
        assert!(matches!(result, Err(ForecastError::Read { .. })));
    }
}
