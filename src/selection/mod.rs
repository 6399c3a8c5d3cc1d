//! Model selection over a grid of Gaussian mixtures.
//!
//! ```text
//! GridParams ──build──▶ [Candidate]        (affinity × covariance × linkage × k)
//!                          │
//!             dendrogram cut / k-means / label_init
//!                          │
//!                 fit_candidate (EM, reg_covar ladder)
//!                          │
//!                   BIC / AIC per fit
//!                          │
//!              SelectionOutcome (argmin, first wins)
//! ```
//!
//! [`GaussianMixtureIc`] drives the pipeline. Candidates are independent; with
//! `n_jobs > 1` they are fitted on a dedicated rayon pool, and results are
//! always gathered in grid order so the selection does not depend on which
//! fit finishes first.

mod config;
mod criterion;
mod estimator;
mod fitter;
mod grid;
mod outcome;

pub use config::IcConfig;
pub use criterion::Criterion;
pub use estimator::{FitState, GaussianMixtureIc, DEFAULT_MAX_AGGLOM_SIZE};
pub use fitter::{fit_candidate, FitSettings};
pub use grid::{Candidate, Choice, Grid, GridParams, InitAffinity, InitStrategy};
pub use outcome::{CandidateFailure, FitResult, SelectionOutcome};
