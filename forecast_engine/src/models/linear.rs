//! Ordinary least squares over the feature columns

use crate::error::{ForecastError, Result};
use crate::features::FeatureTable;
use crate::models::{dense, prediction_error, training_error, ForecastModel, ModelKind};
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::linear_regression::{
    LinearRegression, LinearRegressionParameters, LinearRegressionSolverName,
};
use std::fmt;

type Regression = LinearRegression<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Least-squares linear regression, solved by SVD so that collinear
/// calendar columns do not make the fit singular
#[derive(Serialize, Deserialize)]
pub struct LinearModel {
    feature_columns: Vec<String>,
    regression: Option<Regression>,
}

impl fmt::Debug for LinearModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinearModel")
            .field("feature_columns", &self.feature_columns)
            .field("fitted", &self.regression.is_some())
            .finish()
    }
}

impl Default for LinearModel {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearModel {
    pub fn new() -> Self {
        Self {
            feature_columns: Vec::new(),
            regression: None,
        }
    }
}

impl ForecastModel for LinearModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Linear
    }

    fn is_fitted(&self) -> bool {
        self.regression.is_some()
    }

    fn fit(&mut self, table: &FeatureTable) -> Result<()> {
        let columns = table.feature_columns().to_vec();
        if columns.is_empty() {
            return Err(training_error(self.kind(), "no feature columns"));
        }
        if table.len() <= columns.len() {
            return Err(training_error(
                self.kind(),
                format!(
                    "{} rows cannot determine {} coefficients and an intercept",
                    table.len(),
                    columns.len()
                ),
            ));
        }

        let rows = table.matrix(&columns, self.name())?;
        let x = dense(&rows, columns.len());
        let y = table.target().to_vec();
        let parameters =
            LinearRegressionParameters::default().with_solver(LinearRegressionSolverName::SVD);

        let regression =
            LinearRegression::fit(&x, &y, parameters).map_err(|e| training_error(self.kind(), e))?;

        self.feature_columns = columns;
        self.regression = Some(regression);
        Ok(())
    }

    fn predict(&self, features: &FeatureTable) -> Result<Vec<f64>> {
        let regression = self
            .regression
            .as_ref()
            .ok_or_else(|| ForecastError::NotFitted(self.name().to_string()))?;
        if features.is_empty() {
            return Ok(Vec::new());
        }

        let rows = features.matrix(&self.feature_columns, self.name())?;
        let predictions = regression
            .predict(&dense(&rows, self.feature_columns.len()))
            .map_err(|e| prediction_error(self.kind(), e))?;

        if predictions.iter().any(|p| !p.is_finite()) {
            return Err(prediction_error(self.kind(), "non-finite prediction"));
        }
        Ok(predictions)
    }

    fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    fn fresh(&self) -> Self {
        Self::new()
    }
}
