use linfa::dataset::Dataset;
use linfa::traits::Fit;
use linfa_linear::LinearRegression;
use log::{debug, warn};
use ndarray::{Array1, Array2};
use polars::prelude::DataFrame;

use crate::defaults::RANK_TOLERANCE;
use crate::frame::numeric_values;
use crate::lags::build_design;
use crate::types::{ForecastError, OlsModel, Result};

/// Numerical rank of a design once the intercept is accounted for.
///
/// Columns are centred (the intercept absorbs their means) and scaled to unit norm, then
/// reduced by Gaussian elimination with partial pivoting. A constant column, or one that
/// is a linear combination of others, does not add to the rank.
///
/// # Arguments
/// * `x` - Design matrix (n x p) without an intercept column
///
/// # Returns
/// Number of linearly independent centred columns
fn design_rank(x: &Array2<f64>) -> usize {
    let mut m = x.clone();
    let (rows, cols) = m.dim();

    // Centre and normalise each column
    for mut col in m.columns_mut() {
        let mean = col.mean().unwrap_or(0.0);
        col.mapv_inplace(|v| v - mean);
        let norm = col.dot(&col).sqrt();
        if norm > 0.0 {
            col.mapv_inplace(|v| v / norm);
        }
    }

    let mut rank = 0;
    for c in 0..cols {
        if rank == rows {
            break;
        }
        // Partial pivoting over the rows not yet used
        let (pivot_row, pivot) = (rank..rows)
            .map(|r| (r, m[[r, c]].abs()))
            .fold((rank, 0.0), |best, cur| if cur.1 > best.1 { cur } else { best });
        if pivot <= RANK_TOLERANCE {
            continue;
        }
        if pivot_row != rank {
            for k in 0..cols {
                m.swap([rank, k], [pivot_row, k]);
            }
        }
        for r in (rank + 1)..rows {
            let factor = m[[r, c]] / m[[rank, c]];
            if factor != 0.0 {
                for k in c..cols {
                    m[[r, k]] -= factor * m[[rank, k]];
                }
            }
        }
        rank += 1;
    }
    rank
}

/// Fit `target ~ regressors + const` by ordinary least squares.
///
/// Builds the design matrix from the regressor columns of `train`, solves with Linfa's
/// `LinearRegression` (intercept enabled), and reports RMSE and R² on the same rows.
/// The target column is dropped from `regressors` if present.
///
/// # Errors
/// * `ColumnNotFound` if the target or a regressor is absent
/// * `EmptyInput` if no regressor remains
/// * `UnderdeterminedModel` if there are fewer rows than unknowns (regressors + intercept)
/// * `Linalg` on a rank-deficient design (e.g. a constant or duplicated regressor) or
///   when the solver fails
pub fn fit_ols(train: &DataFrame, target: &str, regressors: &[String]) -> Result<OlsModel> {
    let regressors: Vec<String> = regressors
        .iter()
        .filter(|r| {
            let is_target = r.as_str() == target;
            if is_target {
                warn!("target '{target}' removed from its own regressors");
            }
            !is_target
        })
        .cloned()
        .collect();

    if regressors.is_empty() {
        return Err(ForecastError::EmptyInput);
    }

    let y = Array1::from(numeric_values(train, target)?);
    let x = build_design(train, &regressors)?;
    let rows = x.nrows();
    let unknowns = regressors.len() + 1;
    if rows < unknowns {
        return Err(ForecastError::UnderdeterminedModel {
            rows,
            columns: unknowns,
        });
    }

    // Collinear columns make the normal equations singular
    let rank = design_rank(&x);
    if rank < regressors.len() {
        return Err(ForecastError::Linalg(format!(
            "design matrix is rank deficient: rank {rank} for {} regressors",
            regressors.len()
        )));
    }
    debug!("fitting OLS on {rows} rows, {unknowns} unknowns");

    // Create Linfa dataset and fit linear regression with intercept
    let dataset = Dataset::new(x.clone(), y.clone());
    let fitted = LinearRegression::new()
        .with_intercept(true)
        .fit(&dataset)
        .map_err(|e| ForecastError::Linalg(format!("{:?}", e)))?;

    let coeffs = fitted.params().to_vec();
    let intercept = fitted.intercept();
    if coeffs.iter().any(|c| !c.is_finite()) || !intercept.is_finite() {
        return Err(ForecastError::Linalg(
            "solver returned non-finite coefficients".to_string(),
        ));
    }

    // In-sample fit on the training rows
    let y_hat = x.dot(fitted.params()) + intercept;
    let (rmse, r2) = compute_metrics(&y, &y_hat);

    Ok(OlsModel {
        regressors,
        coeffs,
        intercept,
        rmse,
        r2,
        n_rows: rows,
    })
}

/// Compute RMSE and R² metrics.
///
/// # Arguments
/// * `y_actual` - Actual target values
/// * `y_pred` - Predicted values from the model
///
/// # Returns
/// Tuple of (RMSE, R²) fit quality metrics
pub(crate) fn compute_metrics(y_actual: &Array1<f64>, y_pred: &Array1<f64>) -> (f64, f64) {
    let n = y_actual.len().max(1) as f64;

    let ss_res: f64 = y_actual
        .iter()
        .zip(y_pred.iter())
        .map(|(a, b)| (a - b).powi(2))
        .sum();
    let rmse = (ss_res / n).sqrt();

    let y_mean = y_actual.mean().unwrap_or(0.0);
    let ss_tot: f64 = y_actual.iter().map(|&v| (v - y_mean).powi(2)).sum();
    let r2 = 1.0 - ss_res / ss_tot.max(1e-12);

    (rmse, r2)
}
