//! Per-candidate records and best-model selection.

use super::criterion::Criterion;
use super::grid::Candidate;
use crate::cluster::{Affinity, CovarianceType, GmmModel, Linkage};

/// The record of one grid candidate: a fitted mixture, or the reason every
/// attempt failed. Immutable once built.
#[derive(Debug, Clone)]
pub struct FitResult {
    candidate: Candidate,
    criterion: f64,
    fit: std::result::Result<FittedMixture, String>,
}

#[derive(Debug, Clone)]
struct FittedMixture {
    model: GmmModel,
    labels: Vec<usize>,
    reg_covar: f64,
    ari: Option<f64>,
}

impl FitResult {
    pub(crate) fn new(
        candidate: Candidate,
        model: GmmModel,
        labels: Vec<usize>,
        criterion: f64,
        ari: Option<f64>,
    ) -> Self {
        let reg_covar = model.reg_covar();
        Self {
            candidate,
            criterion,
            fit: Ok(FittedMixture {
                model,
                labels,
                reg_covar,
                ari,
            }),
        }
    }

    pub(crate) fn failed(failure: &CandidateFailure) -> Self {
        Self {
            candidate: failure.candidate,
            criterion: f64::INFINITY,
            fit: Err(failure.reason.clone()),
        }
    }

    /// The grid point this record belongs to.
    pub fn candidate(&self) -> &Candidate {
        &self.candidate
    }

    /// Whether a mixture was fitted.
    pub fn is_fitted(&self) -> bool {
        self.fit.is_ok()
    }

    /// Fitted mixture.
    pub fn model(&self) -> Option<&GmmModel> {
        self.fit.as_ref().ok().map(|f| &f.model)
    }

    /// Hard labels of the training data.
    pub fn labels(&self) -> Option<&[usize]> {
        self.fit.as_ref().ok().map(|f| f.labels.as_slice())
    }

    /// BIC or AIC value; lower is better. `+∞` when fitting failed.
    pub fn criterion(&self) -> f64 {
        self.criterion
    }

    /// Covariance regularization that produced this fit.
    pub fn reg_covar(&self) -> Option<f64> {
        self.fit.as_ref().ok().map(|f| f.reg_covar)
    }

    /// Adjusted Rand Index against the labels passed to `fit`, if any.
    pub fn ari(&self) -> Option<f64> {
        self.fit.as_ref().ok().and_then(|f| f.ari)
    }

    /// Last error seen, when every attempt failed.
    pub fn failure_reason(&self) -> Option<&str> {
        self.fit.as_ref().err().map(String::as_str)
    }
}

/// A candidate that failed at every regularization level.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateFailure {
    /// The grid point.
    pub candidate: Candidate,
    /// Last error seen.
    pub reason: String,
}

/// Outcome of one `fit` call.
#[derive(Debug, Clone)]
pub struct SelectionOutcome {
    criterion: Criterion,
    /// One record per grid candidate, in grid order.
    results: Vec<FitResult>,
    failures: Vec<CandidateFailure>,
    best: usize,
    warnings: Vec<String>,
}

impl SelectionOutcome {
    /// Record per-candidate outcomes (in grid order) and pick the best.
    ///
    /// Returns the failures when no candidate produced a finite criterion.
    pub(crate) fn collect(
        criterion: Criterion,
        fits: Vec<std::result::Result<FitResult, CandidateFailure>>,
        warnings: Vec<String>,
    ) -> std::result::Result<Self, Vec<CandidateFailure>> {
        let mut results = Vec::with_capacity(fits.len());
        let mut failures = Vec::new();
        for fit in fits {
            match fit {
                Ok(r) => results.push(r),
                Err(f) => {
                    results.push(FitResult::failed(&f));
                    failures.push(f);
                }
            }
        }

        let scores = results
            .iter()
            .map(|r| if r.is_fitted() { r.criterion() } else { f64::INFINITY });
        match select_best(scores) {
            Some(best) => Ok(Self {
                criterion,
                results,
                failures,
                best,
                warnings,
            }),
            None => Err(failures),
        }
    }

    /// Criterion used for selection.
    pub fn criterion(&self) -> Criterion {
        self.criterion
    }

    /// Size of the candidate grid.
    pub fn n_candidates(&self) -> usize {
        self.results.len()
    }

    /// One record per grid candidate, in grid order, failures included.
    pub fn results(&self) -> &[FitResult] {
        &self.results
    }

    /// Candidates excluded because fitting failed, in grid order.
    pub fn failures(&self) -> &[CandidateFailure] {
        &self.failures
    }

    /// Grid position of the selected candidate.
    pub fn best_index(&self) -> usize {
        self.best
    }

    /// The selected record; always fitted.
    pub fn best(&self) -> &FitResult {
        &self.results[self.best]
    }

    /// Criterion value per grid candidate; failed candidates are `+∞`.
    pub fn criterion_values(&self) -> Vec<f64> {
        self.results.iter().map(FitResult::criterion).collect()
    }

    /// Component count of the selected model.
    pub fn n_components(&self) -> usize {
        self.best().candidate().n_components
    }

    /// Covariance structure of the selected model.
    pub fn covariance_type(&self) -> CovarianceType {
        self.best().candidate().covariance_type
    }

    /// Affinity of the selected model's initialization; `None` unless agglomerative.
    pub fn affinity(&self) -> Option<Affinity> {
        self.best().candidate().affinity()
    }

    /// Linkage of the selected model's initialization; `None` unless agglomerative.
    pub fn linkage(&self) -> Option<Linkage> {
        self.best().candidate().linkage()
    }

    /// Training labels of the selected model.
    pub fn labels(&self) -> &[usize] {
        self.best().labels().unwrap_or_default()
    }

    /// Non-fatal issues raised during the run.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

/// Position of the smallest finite value; ties go to the earliest.
pub(crate) fn select_best(values: impl IntoIterator<Item = f64>) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in values.into_iter().enumerate() {
        if !v.is_finite() {
            continue;
        }
        match best {
            Some((_, b)) if v >= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{Gmm, Init};
    use crate::selection::grid::InitStrategy;
    use ndarray::array;
    use proptest::prelude::*;

    fn candidate(k: usize) -> Candidate {
        Candidate {
            n_components: k,
            covariance_type: CovarianceType::Spherical,
            init: InitStrategy::KMeans,
        }
    }

    fn fitted(k: usize, criterion: f64) -> FitResult {
        let x = array![[0.0, 0.0], [1.0, 0.5], [5.0, 5.0], [6.0, 5.5]];
        let labels = vec![0, 0, k - 1, k - 1];
        let model = Gmm::new()
            .with_n_components(k)
            .with_covariance_type(CovarianceType::Spherical)
            .fit(x.view(), &Init::Labels(labels.clone()))
            .unwrap();
        FitResult::new(candidate(k), model, labels, criterion, None)
    }

    fn failure(k: usize) -> CandidateFailure {
        CandidateFailure {
            candidate: candidate(k),
            reason: "singular covariance".into(),
        }
    }

    #[test]
    fn test_collect_keeps_one_record_per_candidate() {
        let fits = vec![Err(failure(1)), Ok(fitted(2, 10.0)), Err(failure(3))];
        let outcome = SelectionOutcome::collect(Criterion::Bic, fits, Vec::new()).unwrap();

        assert_eq!(outcome.n_candidates(), 3);
        assert_eq!(outcome.results().len(), outcome.n_candidates());
        assert_eq!(outcome.failures().len(), 2);
        assert_eq!(outcome.best_index(), 1);
        assert_eq!(outcome.n_components(), 2);
        assert_eq!(outcome.labels(), &[0, 0, 1, 1]);

        let first = &outcome.results()[0];
        assert!(!first.is_fitted());
        assert!(first.model().is_none());
        assert_eq!(first.criterion(), f64::INFINITY);
        assert_eq!(first.failure_reason(), Some("singular covariance"));
        assert_eq!(first.candidate().n_components, 1);
        assert_eq!(outcome.criterion_values(), vec![f64::INFINITY, 10.0, f64::INFINITY]);
    }

    #[test]
    fn test_collect_all_failed() {
        let fits = vec![Err(failure(1)), Err(failure(2))];
        let failures = SelectionOutcome::collect(Criterion::Aic, fits, Vec::new()).unwrap_err();
        assert_eq!(failures, vec![failure(1), failure(2)]);
    }

    #[test]
    fn test_select_best_first_tie_wins() {
        assert_eq!(select_best([3.0, 1.0, 2.0, 1.0]), Some(1));
        assert_eq!(select_best([f64::NAN, 5.0, f64::INFINITY]), Some(1));
        assert_eq!(select_best([f64::NAN, f64::INFINITY]), None);
        assert_eq!(select_best(Vec::new()), None);
    }

    proptest! {
        #[test]
        fn select_best_is_first_minimum(values in proptest::collection::vec(-1e6f64..1e6, 1..40)) {
            let best = select_best(values.iter().copied()).unwrap();
            let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
            prop_assert_eq!(values[best], min);
            prop_assert!(values[..best].iter().all(|&v| v > min));
        }
    }
}
