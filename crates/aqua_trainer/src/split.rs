//! Seeded holdout split

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::errors::CvError;

/// Shuffle `0..n` with `seed` and hold out `ceil(n·test_size)` rows.
/// Both index lists are returned sorted.
pub fn train_test_split(
    n: usize,
    test_size: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>), CvError> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(CvError::InvalidSplit(format!(
            "test_size must be in (0, 1), got {test_size}"
        )));
    }
    let n_test = (n as f64 * test_size).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(CvError::InvalidSplit(format!(
            "test_size {test_size} leaves no training or test rows out of {n}"
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    let mut test = indices[..n_test].to_vec();
    let mut train = indices[n_test..].to_vec();
    test.sort_unstable();
    train.sort_unstable();
    Ok((train, test))
}
