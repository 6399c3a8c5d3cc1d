//! The model-selection estimator.
//!
//! ```text
//! unfitted ──fit──▶ fitting ──ok──▶ fitted
//!     ▲                │               │
//!     └────── err ─────┘◀──── fit ─────┘
//! ```
//!
//! Every `fit` re-validates the configuration, rebuilds the grid and replaces
//! the previous outcome. Inference before a successful fit is an error.

use super::criterion::Criterion;
use super::fitter::{fit_candidate, FitSettings};
use super::grid::{Candidate, Choice, GridParams, InitAffinity, InitStrategy};
use super::outcome::{CandidateFailure, FitResult, SelectionOutcome};
use crate::cluster::{
    Affinity, CovarianceType, Dendrogram, GmmModel, HierarchicalClustering, Init, Linkage,
};
use crate::data::Samples;
use crate::error::{Error, Result};
use ndarray::{Array2, ArrayView2, Axis};
use rand::prelude::*;
use tracing::{debug, info, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Default cap on the number of rows clustered agglomeratively.
pub const DEFAULT_MAX_AGGLOM_SIZE: usize = 2000;

/// Lifecycle of a [`GaussianMixtureIc`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitState {
    /// No successful fit yet, or the last fit failed.
    Unfitted,
    /// A fit is in progress.
    Fitting,
    /// The last fit succeeded.
    Fitted,
}

/// Gaussian mixture selection by information criterion.
///
/// Fits one mixture per grid point (component count × covariance type ×
/// initialization) and keeps the one with the lowest BIC or AIC.
///
/// # Example
///
/// ```rust
/// use gmm_ic::{Choice, GaussianMixtureIc};
///
/// let x: Vec<Vec<f64>> = (0..40)
///     .map(|i| {
///         let c = if i < 20 { 0.0 } else { 8.0 };
///         vec![c + (i % 5) as f64 * 0.2, c + (i % 7) as f64 * 0.2]
///     })
///     .collect();
///
/// let mut est = GaussianMixtureIc::new()
///     .with_min_components(1)
///     .with_max_components(3)
///     .with_covariance_type(Choice::All)
///     .with_random_state(0);
/// est.fit(&x, None).unwrap();
/// assert_eq!(est.labels().unwrap().len(), 40);
/// ```
#[derive(Debug, Clone)]
pub struct GaussianMixtureIc {
    grid: GridParams,
    criterion: Criterion,
    max_iter: usize,
    tol: f64,
    n_jobs: usize,
    random_state: Option<u64>,
    max_agglom_size: Option<usize>,
    state: FitState,
    outcome: Option<SelectionOutcome>,
}

impl Default for GaussianMixtureIc {
    fn default() -> Self {
        Self::new()
    }
}

impl GaussianMixtureIc {
    /// Two full-covariance components, euclidean/ward start, BIC.
    pub fn new() -> Self {
        Self {
            grid: GridParams::default(),
            criterion: Criterion::Bic,
            max_iter: 100,
            tol: 1e-3,
            n_jobs: 1,
            random_state: None,
            max_agglom_size: Some(DEFAULT_MAX_AGGLOM_SIZE),
            state: FitState::Unfitted,
            outcome: None,
        }
    }

    /// Smallest component count to try.
    pub fn with_min_components(mut self, min_components: usize) -> Self {
        self.grid.min_components = min_components;
        self
    }

    /// Largest component count to try. Defaults to `min_components`.
    pub fn with_max_components(mut self, max_components: usize) -> Self {
        self.grid.max_components = Some(max_components);
        self
    }

    /// Covariance structures to try.
    pub fn with_covariance_type(mut self, covariance_type: impl Into<Choice<CovarianceType>>) -> Self {
        self.grid.covariance_type = covariance_type.into();
        self
    }

    /// Affinities for the agglomerative start (`none` for k-means).
    pub fn with_affinity(mut self, affinity: impl Into<Choice<InitAffinity>>) -> Self {
        self.grid.affinity = affinity.into();
        self
    }

    /// Linkages for the agglomerative start.
    pub fn with_linkage(mut self, linkage: impl Into<Choice<Linkage>>) -> Self {
        self.grid.linkage = linkage.into();
        self
    }

    /// Fixed starting labels; replaces the agglomerative start.
    pub fn with_label_init(mut self, label_init: Vec<usize>) -> Self {
        self.grid.label_init = Some(label_init);
        self
    }

    /// Selection criterion.
    pub fn with_selection_criteria(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// EM iteration cap per candidate.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// EM convergence tolerance.
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Worker threads for candidate fits.
    pub fn with_n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = n_jobs;
        self
    }

    /// Seed shared by every candidate.
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Row cap for agglomerative clustering; `None` clusters every row.
    pub fn with_max_agglom_size(mut self, max_agglom_size: Option<usize>) -> Self {
        self.max_agglom_size = max_agglom_size;
        self
    }

    /// Grid options.
    pub fn grid_params(&self) -> &GridParams {
        &self.grid
    }

    /// Current lifecycle state.
    pub fn state(&self) -> FitState {
        self.state
    }

    /// Whether the last `fit` succeeded.
    pub fn is_fitted(&self) -> bool {
        self.state == FitState::Fitted
    }

    /// Fit every candidate and select the best.
    ///
    /// `y`, when given, is only used to report each candidate's ARI.
    pub fn fit<X: Samples + ?Sized>(&mut self, x: &X, y: Option<&[usize]>) -> Result<&mut Self> {
        self.state = FitState::Fitting;
        self.outcome = None;
        match self.run(x, y) {
            Ok(outcome) => {
                self.outcome = Some(outcome);
                self.state = FitState::Fitted;
                Ok(self)
            }
            Err(e) => {
                self.state = FitState::Unfitted;
                Err(e)
            }
        }
    }

    /// `fit`, then the selected model's training labels.
    pub fn fit_predict<X: Samples + ?Sized>(
        &mut self,
        x: &X,
        y: Option<&[usize]>,
    ) -> Result<Vec<usize>> {
        self.fit(x, y)?;
        Ok(self.labels()?.to_vec())
    }

    /// Hard labels from the selected model.
    pub fn predict<X: Samples + ?Sized>(&self, x: &X) -> Result<Vec<usize>> {
        let model = self.best_model()?;
        model.predict(x.to_matrix()?.view())
    }

    /// Component probabilities from the selected model.
    pub fn predict_proba<X: Samples + ?Sized>(&self, x: &X) -> Result<Array2<f64>> {
        let model = self.best_model()?;
        model.predict_proba(x.to_matrix()?.view())
    }

    /// Mean log-likelihood under the selected model.
    pub fn score<X: Samples + ?Sized>(&self, x: &X) -> Result<f64> {
        let model = self.best_model()?;
        model.score(x.to_matrix()?.view())
    }

    /// Outcome of the last successful fit.
    pub fn outcome(&self) -> Result<&SelectionOutcome> {
        match (&self.state, &self.outcome) {
            (FitState::Fitted, Some(outcome)) => Ok(outcome),
            _ => Err(Error::NotFitted),
        }
    }

    /// One record per grid candidate, in grid order, failures included.
    pub fn results(&self) -> Result<&[FitResult]> {
        Ok(self.outcome()?.results())
    }

    /// Candidates excluded because every fit attempt failed.
    pub fn failures(&self) -> Result<&[CandidateFailure]> {
        Ok(self.outcome()?.failures())
    }

    /// Selected component count.
    pub fn n_components(&self) -> Result<usize> {
        Ok(self.outcome()?.n_components())
    }

    /// Selected covariance structure.
    pub fn covariance_type(&self) -> Result<CovarianceType> {
        Ok(self.outcome()?.covariance_type())
    }

    /// Selected affinity; `None` unless the winner started agglomeratively.
    pub fn affinity(&self) -> Result<Option<Affinity>> {
        Ok(self.outcome()?.affinity())
    }

    /// Selected linkage; `None` unless the winner started agglomeratively.
    pub fn linkage(&self) -> Result<Option<Linkage>> {
        Ok(self.outcome()?.linkage())
    }

    /// Training labels of the selected model.
    pub fn labels(&self) -> Result<&[usize]> {
        Ok(self.outcome()?.labels())
    }

    /// The selected mixture.
    pub fn best_model(&self) -> Result<&GmmModel> {
        self.outcome()?.best().model().ok_or(Error::NotFitted)
    }

    /// Criterion per grid candidate; `+∞` for failures.
    pub fn criterion_values(&self) -> Result<Vec<f64>> {
        Ok(self.outcome()?.criterion_values())
    }

    /// `reg_covar` of the selected fit.
    pub fn reg_covar(&self) -> Result<f64> {
        self.outcome()?.best().reg_covar().ok_or(Error::NotFitted)
    }

    /// Warnings raised during the last fit.
    pub fn warnings(&self) -> Result<&[String]> {
        Ok(self.outcome()?.warnings())
    }

    fn run<X: Samples + ?Sized>(&self, x: &X, y: Option<&[usize]>) -> Result<SelectionOutcome> {
        self.validate()?;
        let x = x.to_matrix()?;
        let n = x.nrows();
        if let Some(y) = y {
            if y.len() != n {
                return Err(Error::config(
                    "y",
                    format!("length must equal n_samples ({n}), got {}", y.len()),
                ));
            }
        }

        let grid = self.grid.build(x.view())?;
        let mut warnings = grid.warnings;

        let seed = self.random_state.unwrap_or_else(|| rand::rng().random());
        let subset = self.agglomerative_rows(n, &grid.candidates, seed)?;
        let dendrograms = build_dendrograms(x.view(), &grid.candidates, subset.as_deref())?;

        let mut jobs = Vec::with_capacity(grid.candidates.len());
        for candidate in &grid.candidates {
            let init = match candidate.init {
                InitStrategy::KMeans => Init::KMeans,
                InitStrategy::Provided => match &grid.label_init {
                    Some(labels) => Init::Labels(labels.clone()),
                    None => return Err(Error::config("label_init", "missing labels")),
                },
                InitStrategy::Agglomerative { affinity, linkage } => {
                    let tree = dendrograms
                        .iter()
                        .find(|(key, _)| *key == (affinity, linkage))
                        .map(|(_, tree)| tree)
                        .ok_or_else(|| {
                            Error::FittingFailure(format!("no dendrogram for {affinity}/{linkage}"))
                        })?;
                    let labels = tree.cut_to_k(candidate.n_components)?;
                    match &subset {
                        Some(rows) => Init::SubsetLabels {
                            rows: rows.clone(),
                            labels,
                        },
                        None => Init::Labels(labels),
                    }
                }
            };
            jobs.push((*candidate, init));
        }

        let settings = FitSettings {
            max_iter: self.max_iter,
            tol: self.tol,
            seed,
            criterion: self.criterion,
        };
        debug!(
            n_candidates = jobs.len(),
            n_jobs = self.n_jobs,
            seed,
            "fitting candidate grid"
        );
        let fits = dispatch(x.view(), y, &jobs, &settings, self.n_jobs)?;

        for failure in fits.iter().filter_map(|f| f.as_ref().err()) {
            let msg = format!("excluded {}: {}", failure.candidate, failure.reason);
            warn!("{msg}");
            warnings.push(msg);
        }

        let outcome = SelectionOutcome::collect(self.criterion, fits, warnings).map_err(
            |failures| Error::AllCandidatesFailed {
                attempted: failures.len(),
            },
        )?;

        let best = outcome.best();
        info!(
            candidate = %best.candidate(),
            criterion = best.criterion(),
            reg_covar = ?best.reg_covar(),
            n_failures = outcome.failures().len(),
            "selected mixture"
        );
        Ok(outcome)
    }

    fn validate(&self) -> Result<()> {
        if self.n_jobs == 0 {
            return Err(Error::config("n_jobs", "must be >= 1"));
        }
        if self.max_iter == 0 {
            return Err(Error::config("max_iter", "must be >= 1"));
        }
        if !self.tol.is_finite() || self.tol < 0.0 {
            return Err(Error::config("tol", "must be finite and non-negative"));
        }
        if let Some(m) = self.max_agglom_size {
            if m < 2 {
                return Err(Error::config("max_agglom_size", format!("must be >= 2, got {m}")));
            }
        }
        Ok(())
    }

    /// Sorted row subset for agglomerative clustering, when `n` exceeds the cap.
    fn agglomerative_rows(
        &self,
        n: usize,
        candidates: &[Candidate],
        seed: u64,
    ) -> Result<Option<Vec<usize>>> {
        let Some(m) = self.max_agglom_size else {
            return Ok(None);
        };
        if n <= m {
            return Ok(None);
        }
        let max_k = candidates
            .iter()
            .filter(|c| c.affinity().is_some())
            .map(|c| c.n_components)
            .max();
        let Some(max_k) = max_k else {
            return Ok(None);
        };
        if max_k > m {
            return Err(Error::config(
                "max_agglom_size",
                format!("must be >= max_components ({max_k}), got {m}"),
            ));
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let mut rows = rand::seq::index::sample(&mut rng, n, m).into_vec();
        rows.sort_unstable();
        debug!(n, subset = m, "agglomerative start on a random subset");
        Ok(Some(rows))
    }
}

/// One dendrogram per distinct (affinity, linkage) pair, in grid order.
fn build_dendrograms(
    x: ArrayView2<'_, f64>,
    candidates: &[Candidate],
    rows: Option<&[usize]>,
) -> Result<Vec<((Affinity, Linkage), Dendrogram)>> {
    let subset = rows.map(|r| x.select(Axis(0), r));
    let data = match &subset {
        Some(s) => s.view(),
        None => x.view(),
    };

    let mut trees: Vec<((Affinity, Linkage), Dendrogram)> = Vec::new();
    for candidate in candidates {
        let InitStrategy::Agglomerative { affinity, linkage } = candidate.init else {
            continue;
        };
        if trees.iter().any(|(key, _)| *key == (affinity, linkage)) {
            continue;
        }
        let tree = HierarchicalClustering::new(candidate.n_components)
            .with_affinity(affinity)
            .with_linkage(linkage)
            .fit_dendrogram(data)?;
        trees.push(((affinity, linkage), tree));
    }
    Ok(trees)
}

/// Fit every job; results come back in job order.
fn dispatch(
    x: ArrayView2<'_, f64>,
    y: Option<&[usize]>,
    jobs: &[(Candidate, Init)],
    settings: &FitSettings,
    n_jobs: usize,
) -> Result<Vec<std::result::Result<FitResult, CandidateFailure>>> {
    let fit_one = |job: &(Candidate, Init)| fit_candidate(x, y, &job.0, &job.1, settings);

    #[cfg(feature = "parallel")]
    if n_jobs > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(n_jobs)
            .build()
            .map_err(|e| Error::FittingFailure(format!("cannot start worker pool: {e}")))?;
        return Ok(pool.install(|| jobs.par_iter().map(&fit_one).collect()));
    }

    #[cfg(not(feature = "parallel"))]
    if n_jobs > 1 {
        debug!(n_jobs, "built without the parallel feature; fitting sequentially");
    }

    Ok(jobs.iter().map(&fit_one).collect())
}
