//! Support Vector Machine classifier
//!
//! Binary SVC trained with simplified SMO (Sequential Minimal Optimization)
//! over a precomputed kernel matrix.

use super::models::{check_features, check_training_data, sigmoid, Classifier};
use crate::error::{FairfitError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Maximum number of samples for eager kernel matrix computation.
/// Beyond this, training returns an error to prevent OOM.
const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// Kernel coefficient
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gamma {
    /// `1 / (n_features * var(X))`, resolved at fit time
    Scale,
    Value(f64),
}

/// Kernel function type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KernelType {
    /// Linear kernel: K(x, y) = x · y
    Linear,
    /// Polynomial kernel: K(x, y) = (γ * x · y + r)^d
    Polynomial { degree: u32, gamma: Gamma, coef0: f64 },
    /// Radial Basis Function (Gaussian): K(x, y) = exp(-γ * ||x - y||²)
    RBF { gamma: Gamma },
}

impl Default for KernelType {
    fn default() -> Self {
        KernelType::RBF { gamma: Gamma::Scale }
    }
}

/// Kernel with gamma resolved to a number
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
enum FittedKernel {
    Linear,
    Polynomial { degree: u32, gamma: f64, coef0: f64 },
    RBF { gamma: f64 },
}

impl FittedKernel {
    fn eval(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        match *self {
            FittedKernel::Linear => a.dot(&b),
            FittedKernel::Polynomial { degree, gamma, coef0 } => {
                (gamma * a.dot(&b) + coef0).powi(degree as i32)
            }
            FittedKernel::RBF { gamma } => {
                let norm_sq: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum();
                (-gamma * norm_sq).exp()
            }
        }
    }
}

/// SVM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMConfig {
    /// Regularization parameter (C)
    pub c: f64,
    /// Kernel function
    pub kernel: KernelType,
    /// Tolerance for stopping criterion
    pub tol: f64,
    /// Maximum number of passes over the data
    pub max_iter: usize,
    /// Random seed for SMO pair selection
    pub random_state: u64,
}

impl Default for SVMConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            kernel: KernelType::default(),
            tol: 1e-3,
            max_iter: 1000,
            random_state: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FittedSvm {
    kernel: FittedKernel,
    support_vectors: Array2<f64>,
    /// alpha_i * y_i per support vector
    dual_coef: Array1<f64>,
    bias: f64,
}

/// Support Vector Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMClassifier {
    config: SVMConfig,
    fitted: Option<FittedSvm>,
    n_features: usize,
}

impl SVMClassifier {
    pub fn new(config: SVMConfig) -> Self {
        Self {
            config,
            fitted: None,
            n_features: 0,
        }
    }

    fn resolve_kernel(&self, x: &Array2<f64>) -> FittedKernel {
        let scale = || {
            let var = x.var(0.0);
            if var > 0.0 {
                1.0 / (x.ncols() as f64 * var)
            } else {
                1.0
            }
        };
        let resolve = |g: Gamma| match g {
            Gamma::Scale => scale(),
            Gamma::Value(v) => v,
        };
        match &self.config.kernel {
            KernelType::Linear => FittedKernel::Linear,
            KernelType::Polynomial { degree, gamma, coef0 } => FittedKernel::Polynomial {
                degree: *degree,
                gamma: resolve(*gamma),
                coef0: *coef0,
            },
            KernelType::RBF { gamma } => FittedKernel::RBF { gamma: resolve(*gamma) },
        }
    }

    /// SMO training; `y` holds ±1 labels
    fn smo_train(&self, k: &Array2<f64>, y: &Array1<f64>) -> (Array1<f64>, f64) {
        let n = y.len();
        let c = self.config.c;
        let tol = self.config.tol;
        let mut alphas = Array1::<f64>::zeros(n);
        let mut bias = 0.0;
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);

        let decision = |alphas: &Array1<f64>, bias: f64, idx: usize| -> f64 {
            let mut sum = bias;
            for i in 0..n {
                if alphas[i] != 0.0 {
                    sum += alphas[i] * y[i] * k[[i, idx]];
                }
            }
            sum
        };

        let mut passes = 0;
        let max_passes = 5;
        let mut total_iter = 0;

        while passes < max_passes && total_iter < self.config.max_iter {
            let mut num_changed = 0;

            for i in 0..n {
                let e_i = decision(&alphas, bias, i) - y[i];

                // KKT violation check
                if !((y[i] * e_i < -tol && alphas[i] < c) || (y[i] * e_i > tol && alphas[i] > 0.0)) {
                    continue;
                }

                let j = loop {
                    let j = rng.gen_range(0..n);
                    if j != i {
                        break j;
                    }
                };
                let e_j = decision(&alphas, bias, j) - y[j];

                let alpha_i_old = alphas[i];
                let alpha_j_old = alphas[j];

                let (l, h) = if y[i] != y[j] {
                    ((alpha_j_old - alpha_i_old).max(0.0), (c + alpha_j_old - alpha_i_old).min(c))
                } else {
                    ((alpha_i_old + alpha_j_old - c).max(0.0), (alpha_i_old + alpha_j_old).min(c))
                };
                if (l - h).abs() < 1e-10 {
                    continue;
                }

                let eta = 2.0 * k[[i, j]] - k[[i, i]] - k[[j, j]];
                if eta >= 0.0 {
                    continue;
                }

                let alpha_j = (alpha_j_old - y[j] * (e_i - e_j) / eta).clamp(l, h);
                if (alpha_j - alpha_j_old).abs() < 1e-5 {
                    continue;
                }
                let alpha_i = alpha_i_old + y[i] * y[j] * (alpha_j_old - alpha_j);
                alphas[i] = alpha_i;
                alphas[j] = alpha_j;

                let b1 = bias
                    - e_i
                    - y[i] * (alpha_i - alpha_i_old) * k[[i, i]]
                    - y[j] * (alpha_j - alpha_j_old) * k[[i, j]];
                let b2 = bias
                    - e_j
                    - y[i] * (alpha_i - alpha_i_old) * k[[i, j]]
                    - y[j] * (alpha_j - alpha_j_old) * k[[j, j]];

                bias = if alpha_i > 0.0 && alpha_i < c {
                    b1
                } else if alpha_j > 0.0 && alpha_j < c {
                    b2
                } else {
                    (b1 + b2) / 2.0
                };

                num_changed += 1;
            }

            total_iter += 1;
            if num_changed == 0 {
                passes += 1;
            } else {
                passes = 0;
            }
        }

        (alphas, bias)
    }

    /// Signed distance to the separating surface
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let fitted = self.fitted.as_ref().ok_or(FairfitError::ModelNotFitted)?;
        check_features(self.n_features, x)?;

        let scores: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let sample = x.row(i);
                fitted
                    .support_vectors
                    .rows()
                    .into_iter()
                    .zip(fitted.dual_coef.iter())
                    .map(|(sv, coef)| coef * fitted.kernel.eval(sample, sv))
                    .sum::<f64>()
                    + fitted.bias
            })
            .collect();
        Ok(Array1::from_vec(scores))
    }

    pub fn n_support_vectors(&self) -> usize {
        self.fitted.as_ref().map_or(0, |f| f.support_vectors.nrows())
    }
}

impl Classifier for SVMClassifier {
    fn name(&self) -> &'static str {
        "svm"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_data(x, y)?;
        let n = x.nrows();
        if n > MAX_KERNEL_MATRIX_SAMPLES {
            return Err(FairfitError::TrainingError(format!(
                "Dataset has {} samples, exceeding the maximum {} for the SVM kernel matrix",
                n, MAX_KERNEL_MATRIX_SAMPLES
            )));
        }
        self.n_features = x.ncols();
        let kernel = self.resolve_kernel(x);

        let y_signed = y.mapv(|v| if v == 1.0 { 1.0 } else { -1.0 });
        let positives = y.iter().filter(|&&v| v == 1.0).count();

        // A single class has no margin: predict it everywhere
        if positives == 0 || positives == n {
            self.fitted = Some(FittedSvm {
                kernel,
                support_vectors: Array2::zeros((0, x.ncols())),
                dual_coef: Array1::zeros(0),
                bias: y_signed[0],
            });
            return Ok(());
        }

        // Kernel matrix, upper-triangle rows in parallel
        let rows: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| (i..n).map(|j| kernel.eval(x.row(i), x.row(j))).collect())
            .collect();
        let mut k = Array2::zeros((n, n));
        for (i, row) in rows.into_iter().enumerate() {
            for (offset, val) in row.into_iter().enumerate() {
                k[[i, i + offset]] = val;
                k[[i + offset, i]] = val;
            }
        }

        let (alphas, bias) = self.smo_train(&k, &y_signed);

        let support: Vec<usize> = (0..n).filter(|&i| alphas[i] > 1e-8).collect();
        let support_vectors = x.select(ndarray::Axis(0), &support);
        let dual_coef: Array1<f64> = support.iter().map(|&i| alphas[i] * y_signed[i]).collect();

        self.fitted = Some(FittedSvm {
            kernel,
            support_vectors,
            dual_coef,
            bias,
        });
        Ok(())
    }

    /// Logistic squashing of the decision function
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(sigmoid))
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(|d| if d >= 0.0 { 1.0 } else { 0.0 }))
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn create_linear_separable_data() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [1.0, 2.0],
            [2.0, 3.0],
            [3.0, 3.0],
            [2.0, 1.0],
            [6.0, 5.0],
            [7.0, 8.0],
            [8.0, 7.0],
            [7.0, 6.0],
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_svm_classifier_linear() {
        let (x, y) = create_linear_separable_data();
        let mut svm = SVMClassifier::new(SVMConfig {
            kernel: KernelType::Linear,
            ..Default::default()
        });
        svm.fit(&x, &y).unwrap();

        let predictions = svm.predict(&x).unwrap();
        let correct = predictions.iter().zip(y.iter()).filter(|(p, a)| p == a).count();
        assert!(correct >= 7, "Linear SVM got {}/8", correct);
        assert!(svm.n_support_vectors() > 0);
    }

    #[test]
    fn test_svm_classifier_rbf_scale() {
        let (x, y) = create_linear_separable_data();
        let mut svm = SVMClassifier::new(SVMConfig::default());
        svm.fit(&x, &y).unwrap();

        let predictions = svm.predict(&x).unwrap();
        let correct = predictions.iter().zip(y.iter()).filter(|(p, a)| p == a).count();
        assert!(correct >= 7, "RBF SVM got {}/8", correct);

        let proba = svm.predict_proba(&x).unwrap();
        assert!(proba.iter().all(|&p| p > 0.0 && p < 1.0));
    }

    #[test]
    fn test_single_class_training() {
        let x = array![[1.0], [2.0]];
        let mut svm = SVMClassifier::new(SVMConfig::default());
        svm.fit(&x, &array![0.0, 0.0]).unwrap();
        assert_eq!(svm.predict(&array![[5.0]]).unwrap(), array![0.0]);
    }

    #[test]
    fn test_gamma_serde() {
        let json = serde_json::to_string(&KernelType::RBF { gamma: Gamma::Scale }).unwrap();
        assert_eq!(json, r#"{"RBF":{"gamma":"scale"}}"#);
    }
}
