//! Candidate grid construction.
//!
//! The grid is the cartesian product of affinity × covariance type × linkage
//! × component count, in that nesting order (component count varies fastest).
//! `all` is expanded once here into a closed list, invalid affinity/linkage
//! pairs are pruned, and duplicates are dropped keeping the first occurrence.
//!
//! Two pairings collapse:
//! - affinity `none` means "no agglomerative start", so every linkage maps to
//!   the same k-means candidate;
//! - a user-supplied `label_init` replaces the agglomerative start altogether,
//!   leaving one candidate per covariance type.

use crate::cluster::{relabel_by_appearance, Affinity, CovarianceType, Linkage};
use crate::error::{Error, Result};
use ndarray::ArrayView2;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// One value, an explicit list, or every recognized value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice<T> {
    /// A single value.
    One(T),
    /// An explicit list; duplicates are ignored.
    Many(Vec<T>),
    /// The full vocabulary.
    All,
}

impl<T: Copy + PartialEq> Choice<T> {
    /// Expand into a deduplicated list.
    ///
    /// `all` lists every value of the vocabulary in its canonical order.
    pub fn expand(&self, all: &[T], name: &'static str) -> Result<Vec<T>> {
        let raw: Vec<T> = match self {
            Choice::One(v) => vec![*v],
            Choice::Many(vs) => vs.clone(),
            Choice::All => all.to_vec(),
        };
        if raw.is_empty() {
            return Err(Error::config(name, "at least one value is required"));
        }
        let mut out = Vec::with_capacity(raw.len());
        for v in raw {
            if !out.contains(&v) {
                out.push(v);
            }
        }
        Ok(out)
    }

    /// Whether this choice is the `all` sentinel.
    pub fn is_all(&self) -> bool {
        matches!(self, Choice::All)
    }
}

macro_rules! impl_choice_from {
    ($($t:ty),*) => {$(
        impl From<$t> for Choice<$t> {
            fn from(value: $t) -> Self {
                Choice::One(value)
            }
        }

        impl From<Vec<$t>> for Choice<$t> {
            fn from(values: Vec<$t>) -> Self {
                Choice::Many(values)
            }
        }
    )*};
}

impl_choice_from!(CovarianceType, InitAffinity, Linkage);

impl From<Affinity> for Choice<InitAffinity> {
    fn from(value: Affinity) -> Self {
        Choice::One(value.into())
    }
}

impl<T: FromStr<Err = Error>> FromStr for Choice<T> {
    type Err = Error;

    /// `"all"` or a single recognized name.
    fn from_str(s: &str) -> Result<Self> {
        if s == "all" {
            Ok(Choice::All)
        } else {
            s.parse().map(Choice::One)
        }
    }
}

impl<T: fmt::Display> fmt::Display for Choice<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Choice::One(v) => write!(f, "{v}"),
            Choice::Many(vs) => {
                let names: Vec<String> = vs.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", names.join(", "))
            }
            Choice::All => f.write_str("all"),
        }
    }
}

/// Affinity option for the initial partition.
///
/// `None` skips agglomerative clustering and starts EM from k-means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InitAffinity {
    /// Agglomerate with L2 distance.
    Euclidean,
    /// Agglomerate with L1 distance.
    Manhattan,
    /// Agglomerate with cosine distance.
    Cosine,
    /// No agglomerative start.
    None,
}

impl InitAffinity {
    /// All options, in grid enumeration order.
    pub const ALL: [InitAffinity; 4] = [
        InitAffinity::Euclidean,
        InitAffinity::Manhattan,
        InitAffinity::Cosine,
        InitAffinity::None,
    ];

    /// The distance metric, if any.
    pub fn metric(&self) -> Option<Affinity> {
        match self {
            InitAffinity::Euclidean => Some(Affinity::Euclidean),
            InitAffinity::Manhattan => Some(Affinity::Manhattan),
            InitAffinity::Cosine => Some(Affinity::Cosine),
            InitAffinity::None => None,
        }
    }

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self.metric() {
            Some(a) => a.as_str(),
            None => "none",
        }
    }
}

impl From<Affinity> for InitAffinity {
    fn from(a: Affinity) -> Self {
        match a {
            Affinity::Euclidean => InitAffinity::Euclidean,
            Affinity::Manhattan => InitAffinity::Manhattan,
            Affinity::Cosine => InitAffinity::Cosine,
        }
    }
}

impl fmt::Display for InitAffinity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InitAffinity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s == "none" {
            return Ok(InitAffinity::None);
        }
        s.parse::<Affinity>().map(InitAffinity::from)
    }
}

/// How EM is started for a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InitStrategy {
    /// Seeded k-means partition (affinity `none`).
    KMeans,
    /// Agglomerative partition.
    Agglomerative {
        /// Distance metric.
        affinity: Affinity,
        /// Merge rule.
        linkage: Linkage,
    },
    /// The user-supplied `label_init`.
    Provided,
}

/// One concrete point of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Candidate {
    /// Number of mixture components.
    pub n_components: usize,
    /// Covariance structure.
    pub covariance_type: CovarianceType,
    /// Starting partition.
    pub init: InitStrategy,
}

impl Candidate {
    /// Agglomerative affinity, if this candidate uses one.
    pub fn affinity(&self) -> Option<Affinity> {
        match self.init {
            InitStrategy::Agglomerative { affinity, .. } => Some(affinity),
            _ => None,
        }
    }

    /// Agglomerative linkage, if this candidate uses one.
    pub fn linkage(&self) -> Option<Linkage> {
        match self.init {
            InitStrategy::Agglomerative { linkage, .. } => Some(linkage),
            _ => None,
        }
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "k={} covariance={}", self.n_components, self.covariance_type)?;
        match self.init {
            InitStrategy::KMeans => write!(f, " init=kmeans"),
            InitStrategy::Agglomerative { affinity, linkage } => {
                write!(f, " affinity={affinity} linkage={linkage}")
            }
            InitStrategy::Provided => write!(f, " init=label_init"),
        }
    }
}

/// User-facing grid options.
#[derive(Debug, Clone, PartialEq)]
pub struct GridParams {
    /// Smallest component count.
    pub min_components: usize,
    /// Largest component count; `None` means `min_components`.
    pub max_components: Option<usize>,
    /// Covariance structures to try.
    pub covariance_type: Choice<CovarianceType>,
    /// Affinities for the agglomerative start.
    pub affinity: Choice<InitAffinity>,
    /// Linkages for the agglomerative start.
    pub linkage: Choice<Linkage>,
    /// Fixed starting labels, one per sample.
    pub label_init: Option<Vec<usize>>,
}

impl Default for GridParams {
    fn default() -> Self {
        Self {
            min_components: 2,
            max_components: None,
            covariance_type: Choice::One(CovarianceType::Full),
            affinity: Choice::One(InitAffinity::Euclidean),
            linkage: Choice::One(Linkage::Ward),
            label_init: None,
        }
    }
}

/// The expanded, pruned, deduplicated grid.
#[derive(Debug, Clone)]
pub struct Grid {
    /// Candidates in enumeration order.
    pub candidates: Vec<Candidate>,
    /// `label_init` renumbered to `0..k`, when supplied.
    pub label_init: Option<Vec<usize>>,
    /// Non-fatal issues found while building.
    pub warnings: Vec<String>,
}

impl GridParams {
    /// Validate against the data and expand into candidates.
    pub fn build(&self, x: ArrayView2<'_, f64>) -> Result<Grid> {
        let n = x.nrows();
        let (min_k, max_k) = self.component_bounds(n)?;

        let covariances = self
            .covariance_type
            .expand(&CovarianceType::ALL, "covariance_type")?;
        let affinities = self.affinity.expand(&InitAffinity::ALL, "affinity")?;
        let linkages = self.linkage.expand(&Linkage::ALL, "linkage")?;

        let mut warnings = Vec::new();

        if let Some(labels) = &self.label_init {
            return self.provided_grid(labels, n, min_k, max_k, covariances, warnings);
        }

        let metrics: Vec<Affinity> = affinities.iter().filter_map(|a| a.metric()).collect();
        if linkages.contains(&Linkage::Ward)
            && !metrics.is_empty()
            && !metrics.contains(&Affinity::Euclidean)
        {
            return Err(Error::config(
                "affinity",
                "ward linkage requires euclidean affinity; add 'euclidean' or drop 'ward'",
            ));
        }

        if metrics.contains(&Affinity::Cosine) && has_zero_row(x) {
            let msg = "X contains a zero vector; cosine distances involving it are set to the \
                       maximum (2.0)"
                .to_string();
            warn!("{msg}");
            warnings.push(msg);
        }

        let mut candidates: Vec<Candidate> = Vec::new();
        let mut pruned = 0usize;
        for affinity in &affinities {
            for &covariance_type in &covariances {
                for &linkage in &linkages {
                    let init = match affinity.metric() {
                        None => InitStrategy::KMeans,
                        Some(metric) if linkage.requires_euclidean() && metric != Affinity::Euclidean => {
                            pruned += 1;
                            continue;
                        }
                        Some(metric) => InitStrategy::Agglomerative {
                            affinity: metric,
                            linkage,
                        },
                    };
                    for n_components in min_k..=max_k {
                        let candidate = Candidate {
                            n_components,
                            covariance_type,
                            init,
                        };
                        if !candidates.contains(&candidate) {
                            candidates.push(candidate);
                        }
                    }
                }
            }
        }

        if pruned > 0 {
            let msg = format!(
                "skipped {pruned} affinity/linkage combinations: ward linkage is only \
                 defined for euclidean affinity"
            );
            if self.affinity.is_all() || self.linkage.is_all() {
                warn!("{msg}");
                warnings.push(msg);
            } else {
                debug!("{msg}");
            }
        }

        if candidates.is_empty() {
            return Err(Error::config(
                "affinity",
                "no valid affinity/linkage combination remains",
            ));
        }

        Ok(Grid {
            candidates,
            label_init: None,
            warnings,
        })
    }

    fn component_bounds(&self, n: usize) -> Result<(usize, usize)> {
        let min_k = self.min_components;
        if min_k < 1 {
            return Err(Error::config("min_components", format!("must be >= 1, got {min_k}")));
        }
        let max_k = self.max_components.unwrap_or(min_k);
        if max_k < min_k {
            return Err(Error::config(
                "max_components",
                format!("must be >= min_components ({min_k}), got {max_k}"),
            ));
        }
        if min_k > n {
            return Err(Error::config(
                "min_components",
                format!("must be <= n_samples ({n}), got {min_k}"),
            ));
        }
        if max_k > n {
            return Err(Error::config(
                "max_components",
                format!("must be <= n_samples ({n}), got {max_k}"),
            ));
        }
        Ok((min_k, max_k))
    }

    fn provided_grid(
        &self,
        labels: &[usize],
        n: usize,
        min_k: usize,
        max_k: usize,
        covariances: Vec<CovarianceType>,
        warnings: Vec<String>,
    ) -> Result<Grid> {
        if labels.len() != n {
            return Err(Error::config(
                "label_init",
                format!("length must equal n_samples ({n}), got {}", labels.len()),
            ));
        }
        let relabeled = relabel_by_appearance(labels);
        let k = relabeled.iter().max().map_or(0, |m| m + 1);
        if k < min_k || k > max_k {
            return Err(Error::config(
                "label_init",
                format!(
                    "has {k} distinct labels, outside [min_components, max_components] = [{min_k}, {max_k}]"
                ),
            ));
        }
        let candidates = covariances
            .into_iter()
            .map(|covariance_type| Candidate {
                n_components: k,
                covariance_type,
                init: InitStrategy::Provided,
            })
            .collect();
        Ok(Grid {
            candidates,
            label_init: Some(relabeled),
            warnings,
        })
    }
}

fn has_zero_row(x: ArrayView2<'_, f64>) -> bool {
    x.rows().into_iter().any(|row| row.iter().all(|&v| v == 0.0))
}
