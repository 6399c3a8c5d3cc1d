//! # gmm-ic
//!
//! Gaussian mixture model selection by information criterion.
//!
//! [`GaussianMixtureIc`] fits one Gaussian mixture per point of a
//! hyperparameter grid (component count × covariance structure × starting
//! partition), scores each fit with BIC or AIC, and keeps the lowest. Starting
//! partitions come from agglomerative clustering under a chosen affinity and
//! linkage, from k-means, or from user-supplied labels.
//!
//! ```rust
//! use gmm_ic::{Choice, GaussianMixtureIc, InitAffinity};
//!
//! let x: Vec<Vec<f64>> = (0..60)
//!     .map(|i| {
//!         let c = (i / 20) as f64 * 10.0;
//!         vec![c + (i % 4) as f64 * 0.3, (i % 5) as f64 * 0.3]
//!     })
//!     .collect();
//!
//! let mut est = GaussianMixtureIc::new()
//!     .with_min_components(2)
//!     .with_max_components(4)
//!     .with_affinity(Choice::Many(vec![InitAffinity::Euclidean, InitAffinity::None]))
//!     .with_random_state(0);
//! let labels = est.fit_predict(&x, None).unwrap();
//! assert_eq!(labels.len(), 60);
//! ```
//!
//! Parallel candidate fitting is behind the default `parallel` feature.

pub mod cluster;
pub mod data;
/// Error types used across `gmm-ic`.
pub mod error;
pub mod metrics;
pub mod selection;

#[cfg(test)]
mod selection_tests;

pub use cluster::{Affinity, CovarianceType, Gmm, GmmModel, HierarchicalClustering, Linkage};
pub use data::Samples;
pub use error::{Error, ErrorKind, Result};
pub use metrics::ari;
pub use selection::{
    Candidate, CandidateFailure, Choice, Criterion, FitResult, FitState, GaussianMixtureIc,
    IcConfig, InitAffinity, InitStrategy, SelectionOutcome,
};
