//! Clustering traits.

use crate::error::Result;
use ndarray::{Array2, ArrayView2};

/// Trait for hard clustering algorithms.
pub trait Clustering {
    /// Fit the model to data and return cluster assignments.
    ///
    /// Returns a vector of cluster labels, one per row of `data`.
    fn fit_predict(&self, data: ArrayView2<'_, f64>) -> Result<Vec<usize>>;

    /// Get the number of clusters.
    fn n_clusters(&self) -> usize;
}

/// Trait for soft clustering algorithms that return probabilities.
pub trait SoftClustering: Clustering {
    /// Fit and return soft cluster assignments (probabilities).
    ///
    /// Returns a matrix where entry \[i, k\] is the probability that
    /// row i belongs to cluster k.
    fn fit_predict_proba(&self, data: ArrayView2<'_, f64>) -> Result<Array2<f64>>;
}

/// One-hot encode hard labels into an n-by-k responsibility matrix.
///
/// Labels `>= k` are ignored (their row stays all zero).
pub fn one_hot(labels: &[usize], k: usize) -> Array2<f64> {
    let mut resp = Array2::zeros((labels.len(), k));
    for (i, &l) in labels.iter().enumerate() {
        if l < k {
            resp[[i, l]] = 1.0;
        }
    }
    resp
}

/// Relabel so labels are `0..m` in order of first appearance.
pub fn relabel_by_appearance(labels: &[usize]) -> Vec<usize> {
    let mut seen: Vec<usize> = Vec::new();
    labels
        .iter()
        .map(|l| match seen.iter().position(|s| s == l) {
            Some(p) => p,
            None => {
                seen.push(*l);
                seen.len() - 1
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_hot() {
        let resp = one_hot(&[1, 0, 1], 2);
        assert_eq!(resp.row(0).to_vec(), vec![0.0, 1.0]);
        assert_eq!(resp.row(1).to_vec(), vec![1.0, 0.0]);
        assert_eq!(resp.sum(), 3.0);
    }

    #[test]
    fn test_relabel() {
        assert_eq!(relabel_by_appearance(&[7, 7, 3, 9, 3]), vec![0, 0, 1, 2, 1]);
    }
}
