//! Dendrogram produced by agglomerative clustering.
//!
//! Records the merge history so one tree can be cut into any number of
//! groups. Model selection builds a single dendrogram per (affinity, linkage)
//! pair and cuts it once per candidate component count.

use crate::cluster::traits::relabel_by_appearance;
use crate::error::{Error, Result};

/// A dendrogram representing hierarchical cluster merges.
///
/// Cluster ids follow the SciPy convention: leaves are `0..n`, and merge `i`
/// creates cluster `n + i`.
#[derive(Debug, Clone)]
pub struct Dendrogram {
    merges: Vec<Merge>,
    n_items: usize,
}

/// A single merge operation in the dendrogram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Merge {
    /// First cluster being merged (index).
    pub cluster_a: usize,
    /// Second cluster being merged (index).
    pub cluster_b: usize,
    /// Distance/dissimilarity at which merge occurred.
    pub distance: f64,
    /// Size of resulting cluster.
    pub size: usize,
}

impl Dendrogram {
    /// Create a new dendrogram for n items.
    pub fn new(n_items: usize) -> Self {
        Self {
            merges: Vec::with_capacity(n_items.saturating_sub(1)),
            n_items,
        }
    }

    /// Record a merge operation.
    pub fn add_merge(&mut self, cluster_a: usize, cluster_b: usize, distance: f64, size: usize) {
        self.merges.push(Merge {
            cluster_a,
            cluster_b,
            distance,
            size,
        });
    }

    /// Cluster assignments for exactly `k` clusters.
    ///
    /// Applies the first `n - k` merges. Labels are numbered `0..k` in order
    /// of first appearance, so the result is deterministic for a given tree.
    pub fn cut_to_k(&self, k: usize) -> Result<Vec<usize>> {
        if k == 0 || k > self.n_items {
            return Err(Error::InvalidClusterCount {
                requested: k,
                n_items: self.n_items,
            });
        }
        let n_merges = self.n_items - k;
        if n_merges > self.merges.len() {
            return Err(Error::InvalidClusterCount {
                requested: k,
                n_items: self.merges.len() + 1,
            });
        }

        // parent[c] = id of the cluster c was merged into, if applied
        let total = self.n_items + n_merges;
        let mut parent: Vec<usize> = (0..total).collect();
        for (i, merge) in self.merges.iter().take(n_merges).enumerate() {
            let new_id = self.n_items + i;
            if merge.cluster_a >= new_id || merge.cluster_b >= new_id {
                return Err(Error::FittingFailure(format!(
                    "malformed dendrogram: merge {i} references a future cluster"
                )));
            }
            parent[merge.cluster_a] = new_id;
            parent[merge.cluster_b] = new_id;
        }

        let roots: Vec<usize> = (0..self.n_items)
            .map(|leaf| {
                let mut c = leaf;
                while parent[c] != c {
                    c = parent[c];
                }
                c
            })
            .collect();

        Ok(relabel_by_appearance(&roots))
    }

    /// Number of original items.
    pub fn n_items(&self) -> usize {
        self.n_items
    }

    /// Number of merges recorded.
    pub fn n_merges(&self) -> usize {
        self.merges.len()
    }

    /// Iterate over merges.
    pub fn merges(&self) -> impl Iterator<Item = &Merge> {
        self.merges.iter()
    }
}
