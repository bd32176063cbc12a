//! Classifier trait shared by every model

use crate::error::{FairfitError, Result};
use ndarray::{Array1, Array2};

/// Trait for binary classifiers over 0/1 labels
pub trait Classifier: Send + Sync + std::fmt::Debug {
    /// Short snake_case name of the model kind
    fn name(&self) -> &'static str;

    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Probability (or probability-like score in `[0, 1]`) of the positive class
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Hard 0/1 predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict_proba(x)?.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }

    /// Serialize the fitted state
    fn to_json(&self) -> Result<serde_json::Value>;
}

/// Validate a training pair: matching lengths, at least one row, 0/1 labels
pub(crate) fn check_training_data(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(FairfitError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 {
        return Err(FairfitError::TrainingError("Cannot fit on an empty dataset".to_string()));
    }
    if let Some(bad) = y.iter().find(|&&v| v != 0.0 && v != 1.0) {
        return Err(FairfitError::InvalidInput(format!(
            "Binary classifier requires 0/1 labels, found {}",
            bad
        )));
    }
    Ok(())
}

/// Fail when a fitted model sees a different feature count
pub(crate) fn check_features(expected: usize, x: &Array2<f64>) -> Result<()> {
    if x.ncols() != expected {
        return Err(FairfitError::ShapeError {
            expected: format!("{} features", expected),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

/// Logistic function
pub(crate) fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_check_training_data() {
        let x = array![[1.0], [2.0]];
        assert!(check_training_data(&x, &array![0.0, 1.0]).is_ok());
        assert!(matches!(
            check_training_data(&x, &array![0.0]),
            Err(FairfitError::ShapeError { .. })
        ));
        assert!(matches!(
            check_training_data(&x, &array![0.0, 2.0]),
            Err(FairfitError::InvalidInput(_))
        ));
        assert!(check_training_data(&Array2::zeros((0, 1)), &Array1::zeros(0)).is_err());
    }

    #[test]
    fn test_sigmoid_bounds() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(50.0) > 0.999);
        assert!(sigmoid(-50.0) < 0.001);
    }
}
