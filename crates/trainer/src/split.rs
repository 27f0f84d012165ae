use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use tastebud_domain::{Result, TasteError};

/// Stratified train/test split over the label column.
///
/// Rows are pooled per class in encounter order, each pool is shuffled
/// with the seeded generator, and `round(pool * test_fraction)` rows go
/// to the test side. Deterministic for a fixed seed and input. Returned
/// index lists are sorted ascending.
pub fn stratified_split(
    labels: &[String],
    test_fraction: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(TasteError::configuration(
            "test fraction must be strictly between 0 and 1",
        ));
    }
    if labels.is_empty() {
        return Err(TasteError::schema("cannot split an empty dataset"));
    }

    let mut pools: Vec<(&str, Vec<usize>)> = Vec::new();
    for (index, label) in labels.iter().enumerate() {
        match pools.iter_mut().find(|(name, _)| *name == label.as_str()) {
            Some((_, pool)) => pool.push(index),
            None => pools.push((label.as_str(), vec![index])),
        }
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();
    for (_, mut pool) in pools {
        pool.shuffle(&mut rng);
        let mut n_test = (pool.len() as f64 * test_fraction).round() as usize;
        if pool.len() >= 2 {
            // every class keeps at least one row on each side
            n_test = n_test.clamp(1, pool.len() - 1);
        }
        test.extend_from_slice(&pool[..n_test]);
        train.extend_from_slice(&pool[n_test..]);
    }
    train.sort_unstable();
    test.sort_unstable();
    Ok((train, test))
}
