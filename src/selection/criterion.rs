//! Information criteria.
//!
//! ```text
//! BIC = −2 log L + p ln n
//! AIC = −2 log L + 2p
//! ```
//!
//! where `log L` is the total log-likelihood of the data and `p` the number of
//! free parameters (see [`GmmModel::n_parameters`]). Lower is better for both.
//! BIC penalizes extra components more heavily once `n > e²`.

use crate::cluster::GmmModel;
use crate::error::{Error, Result};
use ndarray::ArrayView2;
use std::fmt;
use std::str::FromStr;

/// Selection criterion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Criterion {
    /// Bayesian information criterion.
    #[default]
    Bic,
    /// Akaike information criterion.
    Aic,
}

impl Criterion {
    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Criterion::Bic => "bic",
            Criterion::Aic => "aic",
        }
    }

    /// Score `model` on `data`.
    pub fn score(&self, model: &GmmModel, data: ArrayView2<'_, f64>) -> Result<f64> {
        match self {
            Criterion::Bic => model.bic(data),
            Criterion::Aic => model.aic(data),
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Criterion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "bic" => Ok(Criterion::Bic),
            "aic" => Ok(Criterion::Aic),
            other => Err(Error::config(
                "selection_criteria",
                format!("expected 'bic' or 'aic', got '{other}'"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{Gmm, Init};
    use ndarray::Array2;

    #[test]
    fn test_parse() {
        assert_eq!("bic".parse::<Criterion>().unwrap(), Criterion::Bic);
        assert_eq!("aic".parse::<Criterion>().unwrap(), Criterion::Aic);
        let err = "cic".parse::<Criterion>().unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration { name: "selection_criteria", .. }));
    }

    #[test]
    fn test_bic_penalizes_more_than_aic() {
        let x = Array2::from_shape_fn((50, 2), |(i, j)| ((i * 13 + j * 7) % 17) as f64);
        let model = Gmm::new()
            .with_n_components(2)
            .with_seed(0)
            .fit(x.view(), &Init::KMeans)
            .unwrap();
        let bic = Criterion::Bic.score(&model, x.view()).unwrap();
        let aic = Criterion::Aic.score(&model, x.view()).unwrap();
        // ln(50) > 2, so the BIC penalty term dominates.
        let p = model.n_parameters() as f64;
        assert!((bic - aic - p * (50f64.ln() - 2.0)).abs() < 1e-6);
        assert!(bic > aic);
    }
}
