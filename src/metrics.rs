//! Clustering agreement metrics.
//!
//! When ground-truth labels are passed to `fit`, each candidate's labels are
//! scored against them with the Adjusted Rand Index. The score is diagnostic
//! only; it never influences selection.
//!
//! # References
//!
//! - Hubert & Arabie (1985). "Comparing partitions" (ARI)

use std::collections::HashMap;

/// Adjusted Rand Index between two clusterings.
///
/// ARI is the corrected-for-chance version of the Rand Index.
/// A value of 0 indicates random clustering, 1 indicates perfect agreement.
/// Invariant to label permutation.
///
/// # Returns
///
/// ARI score in [-1, 1]. Higher is better. 0 = random, 1 = perfect.
/// Mismatched or empty inputs score 0.
///
/// # Example
///
/// ```rust
/// use gmm_ic::metrics::ari;
///
/// let pred = [1, 1, 0, 0];
/// let truth = [0, 0, 1, 1];
/// assert!((ari(&pred, &truth) - 1.0).abs() < 1e-12);
/// ```
pub fn ari(pred: &[usize], truth: &[usize]) -> f64 {
    if pred.len() != truth.len() || pred.is_empty() {
        return 0.0;
    }

    let (joint, n) = build_contingency_table(pred, truth);

    // Row sums (a_i) and column sums (b_j)
    let mut row_sums = HashMap::new();
    let mut col_sums = HashMap::new();

    for (&(p, t), &count) in &joint {
        *row_sums.entry(p).or_insert(0usize) += count;
        *col_sums.entry(t).or_insert(0usize) += count;
    }

    let sum_comb_ij: f64 = joint.values().map(|&c| comb2(c) as f64).sum();
    let sum_comb_a: f64 = row_sums.values().map(|&a| comb2(a) as f64).sum();
    let sum_comb_b: f64 = col_sums.values().map(|&b| comb2(b) as f64).sum();

    let comb_n = comb2(n) as f64;
    if comb_n == 0.0 {
        return 1.0;
    }

    // ARI = (index - expected) / (max - expected)
    let expected = sum_comb_a * sum_comb_b / comb_n;
    let max_index = (sum_comb_a + sum_comb_b) / 2.0;

    let denom = max_index - expected;
    if denom.abs() < 1e-10 {
        // Both partitions trivial (all-in-one or all singletons).
        return 1.0;
    }

    (sum_comb_ij - expected) / denom
}

fn build_contingency_table(
    pred: &[usize],
    truth: &[usize],
) -> (HashMap<(usize, usize), usize>, usize) {
    let mut table = HashMap::new();
    for (&p, &t) in pred.iter().zip(truth.iter()) {
        *table.entry((p, t)).or_insert(0) += 1;
    }
    (table, pred.len())
}

fn comb2(n: usize) -> usize {
    if n < 2 {
        0
    } else {
        n * (n - 1) / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_ari_perfect() {
        let pred = [0, 0, 1, 1];
        let truth = [0, 0, 1, 1];
        assert!((ari(&pred, &truth) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ari_permuted() {
        let pred = [2, 2, 0, 0, 1, 1];
        let truth = [0, 0, 1, 1, 2, 2];
        assert!((ari(&pred, &truth) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ari_disagreement_is_low() {
        let pred = [0, 1, 0, 1];
        let truth = [0, 0, 1, 1];
        assert!(ari(&pred, &truth) < 0.0);
    }

    #[test]
    fn test_ari_mismatched_lengths() {
        assert_eq!(ari(&[0, 1], &[0]), 0.0);
        assert_eq!(ari(&[], &[]), 0.0);
    }

    proptest! {
        #[test]
        fn ari_is_symmetric_and_bounded(
            labels in proptest::collection::vec((0usize..4, 0usize..4), 2..60)
        ) {
            let (a, b): (Vec<usize>, Vec<usize>) = labels.into_iter().unzip();
            let ab = ari(&a, &b);
            let ba = ari(&b, &a);
            prop_assert!((ab - ba).abs() < 1e-9);
            prop_assert!(ab <= 1.0 + 1e-9);
            prop_assert!((ari(&a, &a) - 1.0).abs() < 1e-9);
        }
    }
}
