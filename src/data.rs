//! Input conversion.
//!
//! Estimators accept either an `ndarray` matrix or a nested `Vec<Vec<f64>>`.
//! Both are materialized into the same owned `Array2<f64>`, so the two forms
//! give bit-identical results.

use crate::error::{Error, Result};
use ndarray::{Array2, ArrayView2};

/// Anything that can be viewed as an n-by-d sample matrix.
pub trait Samples {
    /// Materialize as an owned, validated matrix.
    fn to_matrix(&self) -> Result<Array2<f64>>;
}

impl Samples for Array2<f64> {
    fn to_matrix(&self) -> Result<Array2<f64>> {
        check(self.view())?;
        Ok(self.to_owned())
    }
}

impl Samples for ArrayView2<'_, f64> {
    fn to_matrix(&self) -> Result<Array2<f64>> {
        check(self.view())?;
        Ok(self.to_owned())
    }
}

impl Samples for [Vec<f64>] {
    fn to_matrix(&self) -> Result<Array2<f64>> {
        if self.is_empty() {
            return Err(Error::EmptyInput);
        }
        let n = self.len();
        let d = self[0].len();
        let mut flat = Vec::with_capacity(n * d);
        for row in self {
            if row.len() != d {
                return Err(Error::DimensionMismatch {
                    expected: d,
                    found: row.len(),
                });
            }
            flat.extend_from_slice(row);
        }
        let arr = Array2::from_shape_vec((n, d), flat)
            .map_err(|e| Error::config("X", e.to_string()))?;
        check(arr.view())?;
        Ok(arr)
    }
}

impl Samples for Vec<Vec<f64>> {
    fn to_matrix(&self) -> Result<Array2<f64>> {
        self.as_slice().to_matrix()
    }
}

impl<T: Samples + ?Sized> Samples for &T {
    fn to_matrix(&self) -> Result<Array2<f64>> {
        (**self).to_matrix()
    }
}

fn check(x: ArrayView2<'_, f64>) -> Result<()> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(Error::EmptyInput);
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(Error::config("X", "input contains NaN or infinity"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_nested_and_array_agree() {
        let nested = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        let arr = array![[1.0, 2.0], [3.0, 4.0]];
        assert_eq!(nested.to_matrix().unwrap(), arr.to_matrix().unwrap());
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let nested = vec![vec![1.0, 2.0], vec![3.0]];
        assert_eq!(
            nested.to_matrix(),
            Err(Error::DimensionMismatch {
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn test_empty_and_nan_rejected() {
        let empty: Vec<Vec<f64>> = vec![];
        assert_eq!(empty.to_matrix(), Err(Error::EmptyInput));
        let bad = array![[1.0, f64::NAN]];
        assert!(bad.to_matrix().is_err());
    }
}
