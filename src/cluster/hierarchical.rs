//! Hierarchical (agglomerative) clustering.
//!
//! Bottom-up clustering that builds a **dendrogram** by iteratively
//! merging the closest clusters. Model selection uses it to produce a
//! deterministic starting partition for expectation-maximization.
//!
//! # Affinities
//!
//! | Affinity | d(a, b) |
//! |----------|---------|
//! | Euclidean | ‖a − b‖₂ |
//! | Manhattan | ‖a − b‖₁ |
//! | Cosine | 1 − a·b / (‖a‖ ‖b‖) |
//!
//! Cosine distance is undefined for a zero vector. Any pair involving a zero
//! vector (including a zero vector with itself) gets [`ZERO_VECTOR_COSINE_DISTANCE`],
//! the largest value cosine distance can take.
//!
//! # Linkage Methods
//!
//! | Linkage | Formula | Effect |
//! |---------|---------|--------|
//! | Single | min(d(a,b)) for a∈A, b∈B | Chaining; elongated clusters |
//! | Complete | max(d(a,b)) | Compact, spherical clusters |
//! | Average | mean(d(a,b)) | Balanced compromise |
//! | Ward | Δ variance | Minimizes within-cluster variance |
//!
//! Ward's update is only meaningful on Euclidean distances:
//!
//! ```text
//! Δ(A,B) = (nₐ × nᵦ)/(nₐ + nᵦ) × ||μₐ - μᵦ||²
//! ```

use super::dendrogram::Dendrogram;
use super::traits::Clustering;
use crate::error::{Error, Result};
use kodama::{linkage as kodama_linkage, Method as KodamaMethod};
use ndarray::{ArrayView1, ArrayView2};
use std::fmt;
use std::str::FromStr;

/// Cosine distance assigned to any pair that involves a zero vector.
pub const ZERO_VECTOR_COSINE_DISTANCE: f64 = 2.0;

/// Distance metric between observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Affinity {
    /// L2 distance.
    Euclidean,
    /// L1 distance.
    Manhattan,
    /// One minus cosine similarity.
    Cosine,
}

impl Affinity {
    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Affinity::Euclidean => "euclidean",
            Affinity::Manhattan => "manhattan",
            Affinity::Cosine => "cosine",
        }
    }

    /// Distance between two observations under this metric.
    pub fn distance(&self, a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
        match self {
            Affinity::Euclidean => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f64>()
                .sqrt(),
            Affinity::Manhattan => a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum(),
            Affinity::Cosine => {
                let norm_a = a.dot(&a).sqrt();
                let norm_b = b.dot(&b).sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    return ZERO_VECTOR_COSINE_DISTANCE;
                }
                // Clamp rounding noise so the result stays in [0, 2].
                (1.0 - a.dot(&b) / (norm_a * norm_b)).clamp(0.0, 2.0)
            }
        }
    }
}

impl fmt::Display for Affinity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Affinity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "euclidean" => Ok(Affinity::Euclidean),
            "manhattan" => Ok(Affinity::Manhattan),
            "cosine" => Ok(Affinity::Cosine),
            other => Err(Error::config(
                "affinity",
                format!("unknown affinity '{other}'"),
            )),
        }
    }
}

/// Linkage method for hierarchical clustering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Linkage {
    /// Ward's method: minimize within-cluster variance.
    Ward,
    /// Complete linkage: maximum distance between clusters.
    Complete,
    /// Average linkage: mean distance between clusters.
    Average,
    /// Single linkage: minimum distance between clusters.
    Single,
}

impl Linkage {
    /// All linkages, in grid enumeration order.
    pub const ALL: [Linkage; 4] = [
        Linkage::Ward,
        Linkage::Complete,
        Linkage::Average,
        Linkage::Single,
    ];

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Linkage::Ward => "ward",
            Linkage::Complete => "complete",
            Linkage::Average => "average",
            Linkage::Single => "single",
        }
    }

    /// Whether this linkage is only defined for Euclidean distances.
    pub fn requires_euclidean(&self) -> bool {
        matches!(self, Linkage::Ward)
    }

    fn method(&self) -> KodamaMethod {
        match self {
            Linkage::Single => KodamaMethod::Single,
            Linkage::Complete => KodamaMethod::Complete,
            Linkage::Average => KodamaMethod::Average,
            Linkage::Ward => KodamaMethod::Ward,
        }
    }
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Linkage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ward" => Ok(Linkage::Ward),
            "complete" => Ok(Linkage::Complete),
            "average" => Ok(Linkage::Average),
            "single" => Ok(Linkage::Single),
            other => Err(Error::config("linkage", format!("unknown linkage '{other}'"))),
        }
    }
}

/// Hierarchical (agglomerative) clustering.
#[derive(Debug, Clone)]
pub struct HierarchicalClustering {
    /// Number of clusters to produce.
    n_clusters: usize,
    /// Distance between observations.
    affinity: Affinity,
    /// Linkage method.
    linkage: Linkage,
}

impl HierarchicalClustering {
    /// Create a new hierarchical clusterer (Euclidean, Ward).
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            affinity: Affinity::Euclidean,
            linkage: Linkage::Ward,
        }
    }

    /// Set the distance metric.
    pub fn with_affinity(mut self, affinity: Affinity) -> Self {
        self.affinity = affinity;
        self
    }

    /// Set linkage method.
    pub fn with_linkage(mut self, linkage: Linkage) -> Self {
        self.linkage = linkage;
        self
    }

    /// Fit and return the full dendrogram.
    pub fn fit_dendrogram(&self, data: ArrayView2<'_, f64>) -> Result<Dendrogram> {
        let n = data.nrows();
        if n == 0 {
            return Err(Error::EmptyInput);
        }
        if self.linkage.requires_euclidean() && self.affinity != Affinity::Euclidean {
            return Err(Error::config(
                "linkage",
                format!("{} linkage requires euclidean affinity, got {}", self.linkage, self.affinity),
            ));
        }
        if n == 1 {
            return Ok(Dendrogram::new(1));
        }

        // Condensed dissimilarity matrix (upper triangle, row-major), length N-choose-2.
        let mut condensed = Vec::with_capacity((n * (n - 1)) / 2);
        for row in 0..(n - 1) {
            for col in (row + 1)..n {
                condensed.push(self.affinity.distance(data.row(row), data.row(col)));
            }
        }

        // kodama labels leaves 0..n-1 and step i creates cluster n+i.
        let dend = kodama_linkage(&mut condensed, n, self.linkage.method());

        let mut dendro = Dendrogram::new(n);
        for step in dend.steps() {
            dendro.add_merge(step.cluster1, step.cluster2, step.dissimilarity, step.size);
        }

        Ok(dendro)
    }
}

impl Clustering for HierarchicalClustering {
    fn fit_predict(&self, data: ArrayView2<'_, f64>) -> Result<Vec<usize>> {
        if self.n_clusters == 0 || self.n_clusters > data.nrows() {
            return Err(Error::InvalidClusterCount {
                requested: self.n_clusters,
                n_items: data.nrows(),
            });
        }
        self.fit_dendrogram(data)?.cut_to_k(self.n_clusters)
    }

    fn n_clusters(&self) -> usize {
        self.n_clusters
    }
}
