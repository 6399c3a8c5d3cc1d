#[cfg(test)]
mod tests {
    use crate::cluster::{Affinity, CovarianceType, Linkage};
    use crate::error::{Error, ErrorKind};
    use crate::metrics::ari;
    use crate::selection::{Choice, Criterion, GaussianMixtureIc, InitAffinity, InitStrategy};
    use crate::Result;
    use ndarray::{array, concatenate, Array2, Axis};
    use rand::prelude::*;
    use rand_distr::StandardNormal;

    /// `n` draws from N(mean, L Lᵀ) for a lower-triangular `l`.
    fn gaussian(rng: &mut StdRng, n: usize, mean: &[f64], l: &Array2<f64>) -> Array2<f64> {
        let d = mean.len();
        let mut x = Array2::zeros((n, d));
        for i in 0..n {
            let z: Vec<f64> = (0..d).map(|_| rng.sample(StandardNormal)).collect();
            for a in 0..d {
                let mut v = mean[a];
                for b in 0..=a {
                    v += l[[a, b]] * z[b];
                }
                x[[i, a]] = v;
            }
        }
        x
    }

    fn scaled_identity(d: usize, std: f64) -> Array2<f64> {
        Array2::eye(d) * std
    }

    /// Lower Cholesky factor of a 2×2 SPD matrix.
    fn chol2(c: [[f64; 2]; 2]) -> Array2<f64> {
        let l00 = c[0][0].sqrt();
        let l10 = c[1][0] / l00;
        let l11 = (c[1][1] - l10 * l10).sqrt();
        array![[l00, 0.0], [l10, l11]]
    }

    fn two_class() -> (Array2<f64>, Vec<usize>) {
        let mut rng = StdRng::seed_from_u64(1);
        let l = scaled_identity(3, 0.5);
        let x1 = gaussian(&mut rng, 100, &[2.0, 2.0, 2.0], &l);
        let x2 = gaussian(&mut rng, 100, &[-2.0, -2.0, -2.0], &l);
        let x = concatenate(Axis(0), &[x1.view(), x2.view()]).unwrap();
        let y = (0..200).map(|i| usize::from(i >= 100)).collect();
        (x, y)
    }

    fn five_class() -> Array2<f64> {
        let mut rng = StdRng::seed_from_u64(1);
        let l = Array2::eye(2);
        let blobs: Vec<Array2<f64>> = (0..5)
            .map(|i| gaussian(&mut rng, 100, &[i as f64 * 5.0, 0.0], &l))
            .collect();
        let views: Vec<_> = blobs.iter().map(|b| b.view()).collect();
        concatenate(Axis(0), &views).unwrap()
    }

    fn pair(seed: u64, cov1: [[f64; 2]; 2], cov2: [[f64; 2]; 2]) -> Array2<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let x1 = gaussian(&mut rng, 100, &[-10.0, 0.0], &chol2(cov1));
        let x2 = gaussian(&mut rng, 100, &[10.0, 0.0], &chol2(cov2));
        concatenate(Axis(0), &[x1.view(), x2.view()]).unwrap()
    }

    fn random_data(n: usize, seed: u64) -> Array2<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        gaussian(&mut rng, n, &[0.0, 0.0, 0.0], &Array2::eye(3))
    }

    #[test]
    fn test_two_class() -> Result<()> {
        let (x, y) = two_class();
        let mut est = GaussianMixtureIc::new()
            .with_max_components(5)
            .with_random_state(0);
        est.fit(&x, Some(&y))?;
        assert_eq!(est.n_components()?, 2);

        let labels = est.fit_predict(&x, None)?;
        assert!((ari(&labels, &y) - 1.0).abs() < 1e-12);

        // ARI is recorded when labels are supplied, and never otherwise.
        est.fit(&x, Some(&y))?;
        assert!(est
            .results()?
            .iter()
            .filter(|r| r.is_fitted())
            .all(|r| r.ari().is_some()));
        est.fit(&x, None)?;
        assert!(est.results()?.iter().all(|r| r.ari().is_none()));
        Ok(())
    }

    #[test]
    fn test_two_class_parallel() -> Result<()> {
        let (x, y) = two_class();
        let mut sequential = GaussianMixtureIc::new()
            .with_max_components(5)
            .with_random_state(0);
        let mut parallel = sequential.clone().with_n_jobs(2);

        sequential.fit(&x, None)?;
        parallel.fit(&x, None)?;
        assert_eq!(parallel.n_components()?, 2);
        assert!((ari(parallel.labels()?, &y) - 1.0).abs() < 1e-12);
        assert_eq!(parallel.labels()?, sequential.labels()?);
        assert_eq!(parallel.criterion_values()?, sequential.criterion_values()?);
        Ok(())
    }

    #[test]
    fn test_two_class_aic() -> Result<()> {
        let (x, _) = two_class();
        let mut est = GaussianMixtureIc::new()
            .with_max_components(5)
            .with_selection_criteria(Criterion::Aic)
            .with_random_state(0);
        est.fit(&x, None)?;
        let k = est.n_components()?;
        assert!((2..=5).contains(&k));
        assert_eq!(est.outcome()?.criterion(), Criterion::Aic);
        Ok(())
    }

    #[test]
    fn test_five_class() -> Result<()> {
        let x = five_class();
        let mut est = GaussianMixtureIc::new()
            .with_min_components(3)
            .with_max_components(10)
            .with_covariance_type(Choice::All)
            .with_random_state(0);
        est.fit(&x, None)?;
        assert_eq!(est.n_components()?, 5);
        Ok(())
    }

    #[test]
    fn test_five_class_aic() -> Result<()> {
        let x = five_class();
        let mut est = GaussianMixtureIc::new()
            .with_min_components(3)
            .with_max_components(10)
            .with_covariance_type(Choice::All)
            .with_selection_criteria(Criterion::Aic)
            .with_random_state(0);
        est.fit(&x, None)?;
        assert!((3..=10).contains(&est.n_components()?));
        Ok(())
    }

    #[test]
    fn test_covariance_structure_is_recovered() -> Result<()> {
        let cases = [
            (pair(1, [[1.0, 0.0], [0.0, 1.0]], [[4.0, 0.0], [0.0, 4.0]]), CovarianceType::Spherical),
            (pair(10, [[4.0, 0.0], [0.0, 0.5]], [[0.5, 0.0], [0.0, 4.0]]), CovarianceType::Diag),
            (pair(11, [[2.0, 1.0], [1.0, 2.0]], [[2.0, 1.0], [1.0, 2.0]]), CovarianceType::Tied),
            (pair(12, [[2.0, -1.0], [-1.0, 2.0]], [[2.0, 1.0], [1.0, 2.0]]), CovarianceType::Full),
        ];
        for (x, expected) in cases {
            let mut est = GaussianMixtureIc::new()
                .with_covariance_type(Choice::All)
                .with_random_state(0);
            est.fit(&x, None)?;
            assert_eq!(est.covariance_type()?, expected);
            assert_eq!(est.n_components()?, 2);
        }
        Ok(())
    }

    #[test]
    fn test_fit_predict_equals_fit_then_labels() -> Result<()> {
        let (x, _) = two_class();
        let build = || {
            GaussianMixtureIc::new()
                .with_min_components(1)
                .with_max_components(4)
                .with_affinity(Choice::All)
                .with_linkage(Choice::All)
                .with_random_state(3)
        };
        let mut a = build();
        let from_fit_predict = a.fit_predict(&x, None)?;
        let mut b = build();
        b.fit(&x, None)?;
        assert_eq!(from_fit_predict, b.labels()?);
        Ok(())
    }

    #[test]
    fn test_array_and_nested_lists_agree() -> Result<()> {
        let x = random_data(100, 5);
        let rows: Vec<Vec<f64>> = x.rows().into_iter().map(|r| r.to_vec()).collect();
        let build = || {
            GaussianMixtureIc::new()
                .with_min_components(1)
                .with_max_components(4)
                .with_affinity(Choice::Many(vec![InitAffinity::Euclidean, InitAffinity::None]))
                .with_covariance_type(Choice::All)
                .with_random_state(11)
        };
        let mut from_array = build();
        from_array.fit(&x, None)?;
        let mut from_rows = build();
        from_rows.fit(&rows, None)?;

        assert_eq!(from_array.labels()?, from_rows.labels()?);
        assert_eq!(from_array.n_components()?, from_rows.n_components()?);
        assert_eq!(from_array.criterion_values()?, from_rows.criterion_values()?);

        // Refitting with the same seed is reproducible.
        let before = from_array.criterion_values()?;
        from_array.fit(&x, None)?;
        assert_eq!(from_array.criterion_values()?, before);
        Ok(())
    }

    #[test]
    fn test_results_cover_the_grid() -> Result<()> {
        let (x, _) = two_class();
        let mut est = GaussianMixtureIc::new()
            .with_min_components(1)
            .with_max_components(3)
            .with_covariance_type(Choice::Many(vec![CovarianceType::Diag, CovarianceType::Full]))
            .with_affinity(Choice::Many(vec![InitAffinity::Euclidean, InitAffinity::Cosine]))
            .with_linkage(Choice::Many(vec![Linkage::Ward, Linkage::Average]))
            .with_random_state(0);
        est.fit(&x, None)?;
        let outcome = est.outcome()?;

        // euclidean × {ward, average} + cosine × {average}, times 2 covariances × 3 k
        assert_eq!(outcome.n_candidates(), 18);
        assert_eq!(est.results()?.len(), 18);
        assert!(est.failures()?.len() < 18);
        assert_eq!(est.criterion_values()?.len(), 18);

        let k = est.n_components()?;
        assert!((1..=3).contains(&k));
        assert!([CovarianceType::Diag, CovarianceType::Full].contains(&est.covariance_type()?));
        assert!(matches!(est.affinity()?, Some(Affinity::Euclidean | Affinity::Cosine)));

        let best = outcome.best().criterion();
        let min = est
            .criterion_values()?
            .into_iter()
            .fold(f64::INFINITY, f64::min);
        assert_eq!(best, min);
        Ok(())
    }

    #[test]
    fn test_n_components_bounds() {
        let x = random_data(100, 0);
        let fails = |est: GaussianMixtureIc| {
            let mut est = est;
            est.fit(&x, None).unwrap_err().kind()
        };
        assert_eq!(fails(GaussianMixtureIc::new().with_min_components(0)), ErrorKind::Value);
        assert_eq!(fails(GaussianMixtureIc::new().with_max_components(0)), ErrorKind::Value);
        assert_eq!(fails(GaussianMixtureIc::new().with_min_components(1000)), ErrorKind::Value);
        assert_eq!(
            fails(GaussianMixtureIc::new().with_min_components(10).with_max_components(101)),
            ErrorKind::Value
        );
        assert_eq!(
            fails(GaussianMixtureIc::new().with_min_components(1000).with_max_components(1001)),
            ErrorKind::Value
        );

        let mut est = GaussianMixtureIc::new()
            .with_min_components(10)
            .with_max_components(1001);
        assert!(matches!(
            est.fit_predict(&x, None),
            Err(Error::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_ward_requires_euclidean() {
        let x = random_data(100, 0);
        let mut est = GaussianMixtureIc::new()
            .with_affinity(Affinity::Manhattan)
            .with_linkage(Linkage::Ward);
        let err = est.fit(&x, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Value);
    }

    #[test]
    fn test_label_init() -> Result<()> {
        let (x, y) = two_class();

        let mut short = GaussianMixtureIc::new().with_label_init(vec![0; 50]);
        assert_eq!(short.fit(&x, None).unwrap_err().kind(), ErrorKind::Value);

        let mut one_label = GaussianMixtureIc::new()
            .with_min_components(2)
            .with_max_components(3)
            .with_label_init(vec![0; 200]);
        assert_eq!(one_label.fit(&x, None).unwrap_err().kind(), ErrorKind::Value);

        let mut est = GaussianMixtureIc::new()
            .with_min_components(1)
            .with_max_components(3)
            .with_covariance_type(Choice::All)
            .with_label_init(y.iter().map(|&l| l + 5).collect());
        est.fit(&x, Some(&y))?;
        assert_eq!(est.results()?.len(), 4);
        assert!(est
            .results()?
            .iter()
            .all(|r| r.candidate().init == InitStrategy::Provided && r.candidate().n_components == 2));
        assert_eq!(est.affinity()?, None);
        assert_eq!(est.linkage()?, None);
        assert!((ari(est.labels()?, &y) - 1.0).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_predict_without_fit() {
        let x = random_data(100, 0);
        let est = GaussianMixtureIc::new().with_min_components(2);
        assert!(matches!(est.predict(&x), Err(Error::NotFitted)));
    }

    fn binary_with_zero_row() -> Array2<f64> {
        array![
            [0.0, 1.0, 0.0],
            [1.0, 0.0, 1.0],
            [0.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [0.0, 1.0, 1.0],
            [1.0, 1.0, 1.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 1.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0]
        ]
    }

    #[test]
    fn test_cosine_with_zero_row_warns() -> Result<()> {
        let x = binary_with_zero_row();
        let mut est = GaussianMixtureIc::new()
            .with_min_components(2)
            .with_affinity(Choice::All)
            .with_random_state(0);
        est.fit(&x, None)?;
        assert!(est.warnings()?.iter().any(|w| w.contains("zero vector")));

        let mut est = GaussianMixtureIc::new()
            .with_min_components(2)
            .with_affinity(Choice::All)
            .with_linkage(Choice::All)
            .with_random_state(0);
        est.fit(&x, None)?;
        assert!(est.warnings()?.iter().any(|w| w.contains("zero vector")));
        assert!(est.warnings()?.iter().any(|w| w.contains("ward")));
        Ok(())
    }

    #[test]
    fn test_regularization_escalates_on_duplicates() -> Result<()> {
        let mut x = Array2::zeros((20, 2));
        x.slice_mut(ndarray::s![10.., ..]).fill(5.0);
        let mut est = GaussianMixtureIc::new().with_random_state(0);
        est.fit(&x, None)?;
        let reg = est.reg_covar()?;
        assert!(reg > 0.0 && reg <= 1.0);
        let labels = est.labels()?;
        assert!(labels[..10].iter().all(|&l| l == labels[0]));
        assert!(labels[10..].iter().all(|&l| l == labels[10]));
        assert_ne!(labels[0], labels[10]);
        Ok(())
    }

    #[test]
    fn test_results_match_grid_with_failures() -> Result<()> {
        let mut x = Array2::zeros((20, 2));
        x.slice_mut(ndarray::s![10.., ..]).fill(5.0);
        let mut est = GaussianMixtureIc::new()
            .with_min_components(1)
            .with_max_components(6)
            .with_covariance_type(Choice::All)
            .with_random_state(0);
        est.fit(&x, None)?;

        let outcome = est.outcome()?;
        assert_eq!(outcome.n_candidates(), 24);
        assert_eq!(est.results()?.len(), outcome.n_candidates());
        assert!(!est.failures()?.is_empty());
        let failed = est.results()?.iter().filter(|r| !r.is_fitted()).count();
        assert_eq!(failed, est.failures()?.len());
        assert_eq!(est.criterion_values()?.len(), 24);
        Ok(())
    }
}
