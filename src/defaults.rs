//! Default constants for data preparation, labelling and export.

pub const DEFAULT_DATE_FORMAT: &str = "%d.%m.%Y";
pub const DEFAULT_LAG_ORDER: usize = 1;
pub const DEFAULT_TRAIN_PERCENT: f64 = 66.0;
pub const MAX_FACTORS: usize = 3;

pub const DEFAULT_FORECAST_PREFIX: &str = "Прогноз";
pub const DEFAULT_SPLIT_COLUMN: &str = "split";
pub const DEFAULT_TRAIN_LABEL: &str = "train";
pub const DEFAULT_TEST_LABEL: &str = "test";
pub const DEFAULT_FORECAST_LABEL: &str = "forecast";
pub const DEFAULT_MAPE_COLUMN: &str = "MAPE";
pub const DEFAULT_INPUT_SUFFIX: &str = "_P";
pub const INTERCEPT_NAME: &str = "const";
/// Pivot threshold on the column-normalised, centred design.
pub const RANK_TOLERANCE: f64 = 1e-10;

pub const EXPORT_PREFIX: &str = "Prediction";
pub const DEFAULT_SHEET_NAME: &str = "Prediction";
pub const MAX_SHEET_NAME_LEN: usize = 31;
pub const MAX_FILE_STEM_LEN: usize = 120;
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
pub const SHEET_FORBIDDEN: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];
pub const FILE_FORBIDDEN: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
