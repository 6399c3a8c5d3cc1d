//! Gaussian Mixture Model clustering.
//!
//! # The Probabilistic Model
//!
//! GMM assumes data is generated from K Gaussian distributions:
//!
//! ```text
//! P(x) = Σₖ πₖ × N(x | μₖ, Σₖ)
//! ```
//!
//! Where:
//! - πₖ = mixing weight (probability of cluster k)
//! - μₖ = mean of cluster k
//! - Σₖ = covariance matrix of cluster k
//!
//! # Covariance Structures
//!
//! | Type | Σₖ | Free covariance parameters |
//! |------|----|----------------------------|
//! | Spherical | σₖ² I | k |
//! | Diag | diag(σₖ₁², …, σₖd²) | k·d |
//! | Tied | Σ (shared) | d(d+1)/2 |
//! | Full | Σₖ | k·d(d+1)/2 |
//!
//! # The EM Algorithm
//!
//! **E-step**: Compute "responsibilities" (soft assignments):
//! ```text
//! γₙₖ = P(z=k | xₙ) = πₖ × N(xₙ | μₖ, Σₖ) / Σⱼ πⱼ × N(xₙ | μⱼ, Σⱼ)
//! ```
//!
//! **M-step**: Update parameters using responsibilities:
//! - μₖ = Σₙ γₙₖ xₙ / Σₙ γₙₖ  (weighted mean)
//! - Σₖ = Σₙ γₙₖ (xₙ − μₖ)(xₙ − μₖ)ᵀ / Σₙ γₙₖ + reg_covar · I
//! - πₖ = (1/N) Σₙ γₙₖ  (fraction of responsibility)
//!
//! EM stops once the mean per-sample log-likelihood changes by less than `tol`.
//!
//! # Initialization
//!
//! The starting responsibilities are a one-hot encoding of a hard partition:
//! either supplied labels (e.g. from agglomerative clustering) or a seeded
//! k-means++ run. Parameters are estimated from that matrix before the first
//! E-step.
//!
//! # Failure Modes
//!
//! - **Singular covariance**: collapsed components make Σₖ non positive
//!   definite; surfaced as [`Error::SingularCovariance`]. Raise `reg_covar`.
//! - **Local optima**: EM converges to local maxima; initialization matters.

use super::kmeans::Kmeans;
use super::traits::{one_hot, Clustering, SoftClustering};
use crate::error::{Error, Result};
use faer::prelude::*;
use faer::{Mat, Side};
use ndarray::{s, Array1, Array2, Array3, ArrayView1, ArrayView2, Axis};
use std::fmt;
use std::str::FromStr;

/// Regularization used when estimating the starting parameters.
const INIT_REG_COVAR: f64 = 1e-6;

const LN_2PI: f64 = 1.837_877_066_409_345_5;

/// Structure of the component covariance matrices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CovarianceType {
    /// One variance per component.
    Spherical,
    /// One variance per component and dimension.
    Diag,
    /// One full matrix shared by all components.
    Tied,
    /// One full matrix per component.
    Full,
}

impl CovarianceType {
    /// All covariance types, in grid enumeration order.
    pub const ALL: [CovarianceType; 4] = [
        CovarianceType::Spherical,
        CovarianceType::Diag,
        CovarianceType::Tied,
        CovarianceType::Full,
    ];

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            CovarianceType::Spherical => "spherical",
            CovarianceType::Diag => "diag",
            CovarianceType::Tied => "tied",
            CovarianceType::Full => "full",
        }
    }

    /// Free covariance parameters for `k` components in `d` dimensions.
    pub fn n_covariance_parameters(&self, k: usize, d: usize) -> usize {
        match self {
            CovarianceType::Spherical => k,
            CovarianceType::Diag => k * d,
            CovarianceType::Tied => d * (d + 1) / 2,
            CovarianceType::Full => k * d * (d + 1) / 2,
        }
    }
}

impl fmt::Display for CovarianceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CovarianceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "spherical" => Ok(CovarianceType::Spherical),
            "diag" => Ok(CovarianceType::Diag),
            "tied" => Ok(CovarianceType::Tied),
            "full" => Ok(CovarianceType::Full),
            other => Err(Error::config(
                "covariance_type",
                format!("unknown covariance type '{other}'"),
            )),
        }
    }
}

/// Fitted covariances; the shape depends on the covariance type.
#[derive(Debug, Clone, PartialEq)]
pub enum Covariances {
    /// `(k,)` variances.
    Spherical(Array1<f64>),
    /// `(k, d)` per-dimension variances.
    Diag(Array2<f64>),
    /// `(d, d)` shared matrix.
    Tied(Array2<f64>),
    /// `(k, d, d)` per-component matrices.
    Full(Array3<f64>),
}

/// How EM picks its starting responsibilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Init {
    /// Partition from a seeded k-means++ run.
    KMeans,
    /// One-hot responsibilities from hard labels, one per row.
    Labels(Vec<usize>),
    /// Hard labels for a subset of rows; starting parameters are estimated
    /// from those rows only.
    SubsetLabels {
        /// Row indices into the data.
        rows: Vec<usize>,
        /// One label per entry of `rows`.
        labels: Vec<usize>,
    },
}

/// Gaussian Mixture Model estimator.
#[derive(Debug, Clone)]
pub struct Gmm {
    /// Number of components (clusters).
    n_components: usize,
    /// Covariance structure.
    covariance_type: CovarianceType,
    /// Maximum EM iterations.
    max_iter: usize,
    /// Convergence tolerance on the mean log-likelihood.
    tol: f64,
    /// Random seed for the k-means start.
    seed: Option<u64>,
    /// Regularization added to the covariance diagonal.
    reg_covar: f64,
}

impl Gmm {
    /// Create a new GMM with one full-covariance component.
    pub fn new() -> Self {
        Self {
            n_components: 1,
            covariance_type: CovarianceType::Full,
            max_iter: 100,
            tol: 1e-3,
            seed: None,
            reg_covar: 1e-6,
        }
    }

    /// Set number of components.
    pub fn with_n_components(mut self, n: usize) -> Self {
        self.n_components = n;
        self
    }

    /// Set covariance structure.
    pub fn with_covariance_type(mut self, covariance_type: CovarianceType) -> Self {
        self.covariance_type = covariance_type;
        self
    }

    /// Set maximum iterations.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set convergence tolerance.
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Set covariance regularization.
    pub fn with_reg_covar(mut self, reg_covar: f64) -> Self {
        self.reg_covar = reg_covar;
        self
    }

    /// Set random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Run EM on `data` starting from `init`.
    pub fn fit(&self, data: ArrayView2<'_, f64>, init: &Init) -> Result<GmmModel> {
        let n = data.nrows();
        let k = self.n_components;
        if n == 0 || data.ncols() == 0 {
            return Err(Error::EmptyInput);
        }
        if k == 0 || k > n {
            return Err(Error::InvalidClusterCount {
                requested: k,
                n_items: n,
            });
        }
        if self.max_iter == 0 {
            return Err(Error::config("max_iter", "must be >= 1"));
        }
        if self.reg_covar < 0.0 || !self.reg_covar.is_finite() {
            return Err(Error::config("reg_covar", "must be finite and non-negative"));
        }

        let init_reg = self.reg_covar.max(INIT_REG_COVAR);
        let mut model = match init {
            Init::KMeans => {
                let mut kmeans = Kmeans::new(k);
                if let Some(seed) = self.seed {
                    kmeans = kmeans.with_seed(seed);
                }
                let labels = kmeans.fit_predict(data)?;
                self.estimate(data, &one_hot(&labels, k), init_reg)?
            }
            Init::Labels(labels) => {
                if labels.len() != n {
                    return Err(Error::DimensionMismatch {
                        expected: n,
                        found: labels.len(),
                    });
                }
                self.estimate(data, &one_hot(labels, k), init_reg)?
            }
            Init::SubsetLabels { rows, labels } => {
                if rows.len() != labels.len() {
                    return Err(Error::DimensionMismatch {
                        expected: rows.len(),
                        found: labels.len(),
                    });
                }
                if let Some(&bad) = rows.iter().find(|&&r| r >= n) {
                    return Err(Error::config("rows", format!("row index {bad} out of bounds")));
                }
                let subset = data.select(Axis(0), rows);
                self.estimate(subset.view(), &one_hot(labels, k), init_reg)?
            }
        };

        let mut lower_bound = f64::NEG_INFINITY;
        for iter in 1..=self.max_iter {
            let prev = lower_bound;
            let (log_prob_norm, log_resp) = model.e_step(data);
            let resp = log_resp.mapv(f64::exp);
            let next = self.estimate(data, &resp, self.reg_covar)?;
            model.weights = next.weights;
            model.means = next.means;
            model.covariances = next.covariances;
            model.precisions = next.precisions;
            model.n_iter = iter;
            lower_bound = log_prob_norm;
            if (lower_bound - prev).abs() < self.tol {
                model.converged = true;
                break;
            }
        }
        model.lower_bound = lower_bound;
        model.reg_covar = self.reg_covar;

        Ok(model)
    }

    /// M-step: parameters from a responsibility matrix.
    fn estimate(&self, x: ArrayView2<'_, f64>, resp: &Array2<f64>, reg: f64) -> Result<GmmModel> {
        let (n, d) = x.dim();
        let k = resp.ncols();
        let nk = resp.sum_axis(Axis(0)).mapv(|v| v + 10.0 * f64::EPSILON);
        let mut means = resp.t().dot(&x);
        for c in 0..k {
            means.row_mut(c).mapv_inplace(|v| v / nk[c]);
        }

        let (covariances, precisions) = match self.covariance_type {
            CovarianceType::Full => {
                let mut covs = Array3::zeros((k, d, d));
                let mut factors = Vec::with_capacity(k);
                for c in 0..k {
                    let mut cov = Array2::zeros((d, d));
                    for i in 0..n {
                        let r = resp[[i, c]];
                        if r == 0.0 {
                            continue;
                        }
                        for a in 0..d {
                            let da = x[[i, a]] - means[[c, a]];
                            for b in 0..=a {
                                cov[[a, b]] += r * da * (x[[i, b]] - means[[c, b]]);
                            }
                        }
                    }
                    for a in 0..d {
                        for b in 0..=a {
                            let v = cov[[a, b]] / nk[c];
                            cov[[a, b]] = v;
                            cov[[b, a]] = v;
                        }
                        cov[[a, a]] += reg;
                    }
                    let factor = Precision::factorize(&cov)
                        .ok_or(Error::SingularCovariance { component: c })?;
                    factors.push(factor);
                    covs.slice_mut(s![c, .., ..]).assign(&cov);
                }
                (Covariances::Full(covs), factors)
            }
            CovarianceType::Tied => {
                let avg_x2 = x.t().dot(&x);
                let mut weighted_means = means.clone();
                for c in 0..k {
                    weighted_means.row_mut(c).mapv_inplace(|v| v * nk[c]);
                }
                let avg_means2 = weighted_means.t().dot(&means);
                let mut cov = (avg_x2 - avg_means2) / nk.sum();
                for a in 0..d {
                    cov[[a, a]] += reg;
                }
                let factor = Precision::factorize(&cov)
                    .ok_or(Error::SingularCovariance { component: 0 })?;
                (Covariances::Tied(cov), vec![factor])
            }
            CovarianceType::Diag | CovarianceType::Spherical => {
                let mut avg_x2 = resp.t().dot(&x.mapv(|v| v * v));
                for c in 0..k {
                    avg_x2.row_mut(c).mapv_inplace(|v| v / nk[c]);
                }
                let var = avg_x2 - means.mapv(|m| m * m) + reg;
                if self.covariance_type == CovarianceType::Diag {
                    if let Some(c) = first_non_positive_row(&var) {
                        return Err(Error::SingularCovariance { component: c });
                    }
                    (Covariances::Diag(var), Vec::new())
                } else {
                    let sph = var.mean_axis(Axis(1)).ok_or(Error::EmptyInput)?;
                    if let Some(c) = sph.iter().position(|&v| !(v > 0.0)) {
                        return Err(Error::SingularCovariance { component: c });
                    }
                    (Covariances::Spherical(sph), Vec::new())
                }
            }
        };

        Ok(GmmModel {
            covariance_type: self.covariance_type,
            weights: &nk / nk.sum(),
            means,
            covariances,
            precisions,
            converged: false,
            n_iter: 0,
            lower_bound: f64::NEG_INFINITY,
            reg_covar: reg,
        })
    }
}

impl Default for Gmm {
    fn default() -> Self {
        Self::new()
    }
}

impl Clustering for Gmm {
    fn fit_predict(&self, data: ArrayView2<'_, f64>) -> Result<Vec<usize>> {
        self.fit(data, &Init::KMeans)?.predict(data)
    }

    fn n_clusters(&self) -> usize {
        self.n_components
    }
}

impl SoftClustering for Gmm {
    fn fit_predict_proba(&self, data: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        self.fit(data, &Init::KMeans)?.predict_proba(data)
    }
}

/// A fitted Gaussian mixture.
#[derive(Debug, Clone)]
pub struct GmmModel {
    covariance_type: CovarianceType,
    weights: Array1<f64>,
    means: Array2<f64>,
    covariances: Covariances,
    /// One per component (full) or one shared (tied).
    precisions: Vec<Precision>,
    converged: bool,
    n_iter: usize,
    lower_bound: f64,
    reg_covar: f64,
}

impl GmmModel {
    /// Number of components.
    pub fn n_components(&self) -> usize {
        self.weights.len()
    }

    /// Covariance structure.
    pub fn covariance_type(&self) -> CovarianceType {
        self.covariance_type
    }

    /// Mixing weights, shape `(k,)`.
    pub fn weights(&self) -> &Array1<f64> {
        &self.weights
    }

    /// Component means, shape `(k, d)`.
    pub fn means(&self) -> &Array2<f64> {
        &self.means
    }

    /// Component covariances.
    pub fn covariances(&self) -> &Covariances {
        &self.covariances
    }

    /// Whether EM met the tolerance before `max_iter`.
    pub fn converged(&self) -> bool {
        self.converged
    }

    /// EM iterations run.
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Mean log-likelihood at the last EM iteration.
    pub fn lower_bound(&self) -> f64 {
        self.lower_bound
    }

    /// Covariance regularization used during EM.
    pub fn reg_covar(&self) -> f64 {
        self.reg_covar
    }

    /// Number of free parameters.
    pub fn n_parameters(&self) -> usize {
        let (k, d) = self.means.dim();
        self.covariance_type.n_covariance_parameters(k, d) + k * d + k - 1
    }

    /// Per-sample log-likelihood `log p(x)`.
    pub fn score_samples(&self, data: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        self.check_dim(data)?;
        Ok(self.log_prob_norm(data))
    }

    /// Mean per-sample log-likelihood.
    pub fn score(&self, data: ArrayView2<'_, f64>) -> Result<f64> {
        self.check_dim(data)?;
        self.log_prob_norm(data).mean().ok_or(Error::EmptyInput)
    }

    /// Bayesian information criterion on `data`; lower is better.
    pub fn bic(&self, data: ArrayView2<'_, f64>) -> Result<f64> {
        let n = data.nrows() as f64;
        Ok(-2.0 * self.score(data)? * n + self.n_parameters() as f64 * n.ln())
    }

    /// Akaike information criterion on `data`; lower is better.
    pub fn aic(&self, data: ArrayView2<'_, f64>) -> Result<f64> {
        let n = data.nrows() as f64;
        Ok(-2.0 * self.score(data)? * n + 2.0 * self.n_parameters() as f64)
    }

    /// Hard assignment: most responsible component per row.
    pub fn predict(&self, data: ArrayView2<'_, f64>) -> Result<Vec<usize>> {
        self.check_dim(data)?;
        let weighted = self.weighted_log_prob(data);
        Ok(weighted.rows().into_iter().map(argmax).collect())
    }

    /// Posterior probability of each component, shape `(n, k)`.
    pub fn predict_proba(&self, data: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        self.check_dim(data)?;
        Ok(self.e_step(data).1.mapv(f64::exp))
    }

    fn check_dim(&self, data: ArrayView2<'_, f64>) -> Result<()> {
        if data.nrows() == 0 {
            return Err(Error::EmptyInput);
        }
        if data.ncols() != self.means.ncols() {
            return Err(Error::DimensionMismatch {
                expected: self.means.ncols(),
                found: data.ncols(),
            });
        }
        Ok(())
    }

    /// Mean log-normalizer and log responsibilities.
    fn e_step(&self, data: ArrayView2<'_, f64>) -> (f64, Array2<f64>) {
        let mut weighted = self.weighted_log_prob(data);
        let mut total = 0.0;
        for mut row in weighted.rows_mut() {
            let norm = logsumexp(row.view());
            total += norm;
            row.mapv_inplace(|v| v - norm);
        }
        (total / data.nrows() as f64, weighted)
    }

    fn log_prob_norm(&self, data: ArrayView2<'_, f64>) -> Array1<f64> {
        let weighted = self.weighted_log_prob(data);
        weighted.rows().into_iter().map(logsumexp).collect()
    }

    /// `log πₖ + log N(xₙ | μₖ, Σₖ)`, shape `(n, k)`.
    fn weighted_log_prob(&self, data: ArrayView2<'_, f64>) -> Array2<f64> {
        let (n, d) = data.dim();
        let k = self.n_components();
        let base = -0.5 * d as f64 * LN_2PI;
        let mut out = Array2::zeros((n, k));

        for c in 0..k {
            let log_w = self.weights[c].ln();
            let mean = self.means.row(c);
            let precision = match &self.covariances {
                Covariances::Full(_) => Some(&self.precisions[c]),
                Covariances::Tied(_) => Some(&self.precisions[0]),
                Covariances::Diag(_) | Covariances::Spherical(_) => None,
            };

            if let Some(p) = precision {
                let diff = Mat::from_fn(n, d, |i, j| data[[i, j]] - mean[j]);
                let proj = &diff * &p.inverse;
                for i in 0..n {
                    let maha: f64 = (0..d).map(|j| proj[(i, j)] * diff[(i, j)]).sum();
                    out[[i, c]] = log_w + base - p.log_det_half - 0.5 * maha;
                }
                continue;
            }

            let var: Array1<f64> = match &self.covariances {
                Covariances::Diag(var) => var.row(c).to_owned(),
                Covariances::Spherical(var) => Array1::from_elem(d, var[c]),
                Covariances::Full(_) | Covariances::Tied(_) => continue,
            };
            let log_det_half = 0.5 * var.mapv(f64::ln).sum();
            for (i, row) in data.rows().into_iter().enumerate() {
                let maha: f64 = row
                    .iter()
                    .zip(mean.iter())
                    .zip(var.iter())
                    .map(|((x, m), v)| (x - m) * (x - m) / v)
                    .sum();
                out[[i, c]] = log_w + base - log_det_half - 0.5 * maha;
            }
        }
        out
    }
}

/// Inverse of a full covariance and `½ log |Σ|`, from its Cholesky factor.
#[derive(Debug, Clone)]
struct Precision {
    inverse: Mat<f64>,
    log_det_half: f64,
}

impl Precision {
    /// `None` when `cov` is not positive definite.
    fn factorize(cov: &Array2<f64>) -> Option<Self> {
        let d = cov.nrows();
        let sigma = Mat::from_fn(d, d, |i, j| cov[[i, j]]);
        let llt = sigma.llt(Side::Lower).ok()?;
        let l = llt.L();
        let log_det_half: f64 = (0..d).map(|j| l[(j, j)].ln()).sum();
        if !log_det_half.is_finite() {
            return None;
        }
        let inverse = llt.solve(&Mat::<f64>::identity(d, d));
        Some(Self {
            inverse,
            log_det_half,
        })
    }
}

fn first_non_positive_row(var: &Array2<f64>) -> Option<usize> {
    var.rows()
        .into_iter()
        .position(|row| row.iter().any(|&v| !(v > 0.0)))
}

/// Log-sum-exp for numerical stability.
fn logsumexp(values: ArrayView1<'_, f64>) -> f64 {
    let max_val = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max_val.is_infinite() {
        return max_val;
    }
    max_val + values.iter().map(|&v| (v - max_val).exp()).sum::<f64>().ln()
}

fn argmax(row: ArrayView1<'_, f64>) -> usize {
    let mut best = 0;
    for (i, &v) in row.iter().enumerate() {
        if v > row[best] {
            best = i;
        }
    }
    best
}
