//! Fitting one candidate, with regularization escalation.
//!
//! EM is first run without covariance regularization. When that fails
//! (a covariance is not positive definite) or leaves a component with at most
//! one sample, the fit is retried with `reg_covar = 1e-6`, then ten times
//! larger on each attempt up to `1.0`.

use super::criterion::Criterion;
use super::grid::Candidate;
use super::outcome::{CandidateFailure, FitResult};
use crate::cluster::{Gmm, GmmModel, Init};
use crate::error::{Error, Result};
use crate::metrics::ari;
use ndarray::ArrayView2;
use tracing::debug;

/// Shared by every candidate of one `fit` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitSettings {
    /// EM iteration cap.
    pub max_iter: usize,
    /// EM convergence tolerance.
    pub tol: f64,
    /// Seed for the k-means start.
    pub seed: u64,
    /// Score to minimize.
    pub criterion: Criterion,
}

/// `0`, then `1e-6, 1e-5, …, 1`.
pub(crate) fn reg_covar_ladder() -> impl Iterator<Item = f64> {
    std::iter::once(0.0).chain((-6..=0).map(|e| 10f64.powi(e)))
}

/// Fit `candidate` on `x`, escalating `reg_covar` until a usable model appears.
pub fn fit_candidate(
    x: ArrayView2<'_, f64>,
    y: Option<&[usize]>,
    candidate: &Candidate,
    init: &Init,
    settings: &FitSettings,
) -> std::result::Result<FitResult, CandidateFailure> {
    let mut last_err = Error::FittingFailure("no regularization level attempted".into());

    for reg_covar in reg_covar_ladder() {
        match attempt(x, candidate, init, settings, reg_covar) {
            Ok((model, labels, criterion)) => {
                if !model.converged() {
                    debug!(
                        %candidate,
                        reg_covar,
                        n_iter = model.n_iter(),
                        "EM did not converge"
                    );
                }
                let score = y.map(|truth| ari(&labels, truth));
                debug!(%candidate, reg_covar, criterion, "candidate fitted");
                return Ok(FitResult::new(*candidate, model, labels, criterion, score));
            }
            Err(e) => {
                debug!(%candidate, reg_covar, error = %e, "fit attempt failed");
                last_err = e;
            }
        }
    }

    Err(CandidateFailure {
        candidate: *candidate,
        reason: last_err.to_string(),
    })
}

fn attempt(
    x: ArrayView2<'_, f64>,
    candidate: &Candidate,
    init: &Init,
    settings: &FitSettings,
    reg_covar: f64,
) -> Result<(GmmModel, Vec<usize>, f64)> {
    let k = candidate.n_components;
    let model = Gmm::new()
        .with_n_components(k)
        .with_covariance_type(candidate.covariance_type)
        .with_max_iter(settings.max_iter)
        .with_tol(settings.tol)
        .with_reg_covar(reg_covar)
        .with_seed(settings.seed)
        .fit(x, init)?;

    let labels = model.predict(x)?;
    let mut counts = vec![0usize; k];
    for &l in &labels {
        counts[l] += 1;
    }
    if let Some(c) = counts.iter().position(|&n| n <= 1) {
        return Err(Error::FittingFailure(format!(
            "component {c} has {} assigned samples",
            counts[c]
        )));
    }

    let criterion = settings.criterion.score(&model, x)?;
    if !criterion.is_finite() {
        return Err(Error::FittingFailure(format!(
            "{} is not finite",
            settings.criterion
        )));
    }
    Ok((model, labels, criterion))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{Affinity, CovarianceType, Linkage};
    use crate::selection::grid::InitStrategy;
    use ndarray::{array, Array2};

    fn settings() -> FitSettings {
        FitSettings {
            max_iter: 100,
            tol: 1e-3,
            seed: 0,
            criterion: Criterion::Bic,
        }
    }

    fn candidate(k: usize, covariance_type: CovarianceType) -> Candidate {
        Candidate {
            n_components: k,
            covariance_type,
            init: InitStrategy::Agglomerative {
                affinity: Affinity::Euclidean,
                linkage: Linkage::Ward,
            },
        }
    }

    #[test]
    fn test_ladder() {
        let ladder: Vec<f64> = reg_covar_ladder().collect();
        assert_eq!(ladder.len(), 8);
        assert_eq!(ladder[0], 0.0);
        assert!((ladder[1] - 1e-6).abs() < 1e-18);
        assert_eq!(ladder[7], 1.0);
    }

    #[test]
    fn test_unregularized_fit_is_kept() {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| {
            let base = if i < 20 { 0.0 } else { 10.0 };
            base + ((i * 7 + j * 3) % 5) as f64 * 0.3
        });
        let labels: Vec<usize> = (0..40).map(|i| usize::from(i >= 20)).collect();
        let result = fit_candidate(
            x.view(),
            Some(&labels),
            &candidate(2, CovarianceType::Diag),
            &Init::Labels(labels.clone()),
            &settings(),
        )
        .unwrap();
        assert_eq!(result.reg_covar(), Some(0.0));
        assert!((result.ari().unwrap() - 1.0).abs() < 1e-12);
        assert!(result.criterion().is_finite());
    }

    #[test]
    fn test_duplicated_points_escalate() {
        // Each cluster is one repeated point: zero variance without regularization.
        let x = array![
            [0.0, 0.0],
            [0.0, 0.0],
            [0.0, 0.0],
            [5.0, 5.0],
            [5.0, 5.0],
            [5.0, 5.0]
        ];
        let labels = vec![0, 0, 0, 1, 1, 1];
        let result = fit_candidate(
            x.view(),
            None,
            &candidate(2, CovarianceType::Full),
            &Init::Labels(labels),
            &settings(),
        )
        .unwrap();
        assert!(result.reg_covar().unwrap() > 0.0);
        assert_eq!(result.ari(), None);
        let labels = result.labels().unwrap();
        assert_eq!(labels[0], labels[2]);
        assert_ne!(labels[0], labels[3]);
    }

    #[test]
    fn test_singleton_component_fails_every_level() {
        // Three components on three points: every component holds one sample.
        let x = array![[0.0], [10.0], [20.0]];
        let failure = fit_candidate(
            x.view(),
            None,
            &candidate(3, CovarianceType::Spherical),
            &Init::Labels(vec![0, 1, 2]),
            &settings(),
        )
        .unwrap_err();
        assert_eq!(failure.candidate.n_components, 3);
        assert!(failure.reason.contains("assigned samples"));
    }
}
