//! Random Matrix Generator
//!
//! A single helper, unrelated to the chat: builds a square matrix of
//! uniformly distributed samples.

use rand::Rng;
use tracing::debug;

/// Row-major square matrix.
pub type Matrix = Vec<Vec<f64>>;

/// Generates a `size`×`size` matrix of uniform floats in `[0, 1)`.
///
/// # Errors
///
/// Returns [`MatrixError::InvalidSize`] unless `size` is a positive integer.
///
/// # Example
/// ```
/// use peerchat::matrix::generate;
///
/// let m = generate(3).unwrap();
/// assert_eq!(m.len(), 3);
/// assert!(generate(0).is_err());
/// ```
pub fn generate(size: i64) -> Result<Matrix, MatrixError> {
    generate_with(size, &mut rand::thread_rng())
}

/// Like [`generate`], drawing samples from the given generator.
pub fn generate_with<R: Rng + ?Sized>(size: i64, rng: &mut R) -> Result<Matrix, MatrixError> {
    if size <= 0 {
        return Err(MatrixError::InvalidSize(size));
    }
    let n = usize::try_from(size).map_err(|_| MatrixError::InvalidSize(size))?;

    debug!(size = n, "Generating a {}x{} matrix", n, n);
    Ok((0..n)
        .map(|_| (0..n).map(|_| rng.gen::<f64>()).collect())
        .collect())
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatrixError {
    #[error("Size must be a positive integer, got {0}")]
    InvalidSize(i64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generate_shape_and_range() {
        let m = generate(5).unwrap();

        assert_eq!(m.len(), 5);
        for row in &m {
            assert_eq!(row.len(), 5);
            for &v in row {
                assert!((0.0..1.0).contains(&v), "{} out of range", v);
            }
        }
    }

    #[test]
    fn test_generate_rejects_non_positive() {
        assert_eq!(generate(0), Err(MatrixError::InvalidSize(0)));
        assert_eq!(generate(-1), Err(MatrixError::InvalidSize(-1)));
    }

    #[test]
    fn test_seeded_generation_is_reproducible() {
        let a = generate_with(4, &mut StdRng::seed_from_u64(7)).unwrap();
        let b = generate_with(4, &mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_single_element() {
        let m = generate(1).unwrap();
        assert_eq!(m.len(), 1);
        assert_eq!(m[0].len(), 1);
    }
}
