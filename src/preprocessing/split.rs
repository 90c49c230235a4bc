//! Stratified train/test partitioning

use crate::error::{PipelineError, Result};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

/// Split row indices into (train, test) preserving class proportions.
///
/// The test partition holds `ceil(n * test_ratio)` rows. Each class gets the
/// floor of its proportional share and leftover slots go to the classes with
/// the largest remainders, so neither partition's class rate drifts from the
/// full rate by more than one row. Both index lists come back sorted.
pub fn stratified_train_test_split(
    y: &Array1<f64>,
    test_ratio: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    let n = y.len();
    if !(test_ratio > 0.0 && test_ratio < 1.0) {
        return Err(PipelineError::ValidationError(format!(
            "test_ratio must be in (0, 1), got {}",
            test_ratio
        )));
    }
    // Guard against 0.2 * 1000 landing a hair above 200
    let n_test = ((n as f64 * test_ratio) - 1e-9).ceil().max(0.0) as usize;
    if n_test == 0 || n_test >= n {
        return Err(PipelineError::ValidationError(format!(
            "test_ratio {} leaves an empty partition for {} rows",
            test_ratio, n
        )));
    }

    let mut by_class: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (idx, &val) in y.iter().enumerate() {
        by_class.entry(val.round() as i64).or_default().push(idx);
    }

    let mut quotas: Vec<(i64, usize, usize)> = by_class
        .iter()
        .map(|(&class, rows)| {
            let scaled = rows.len() * n_test;
            (class, scaled / n, scaled % n)
        })
        .collect();

    let assigned: usize = quotas.iter().map(|(_, q, _)| q).sum();
    let mut order: Vec<usize> = (0..quotas.len()).collect();
    order.sort_by(|&a, &b| quotas[b].2.cmp(&quotas[a].2));
    for &i in order.iter().take(n_test - assigned) {
        quotas[i].1 += 1;
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n - n_test);
    let mut test = Vec::with_capacity(n_test);
    for (class, quota, _) in quotas {
        let Some(rows) = by_class.get_mut(&class) else {
            continue;
        };
        rows.shuffle(&mut rng);
        test.extend_from_slice(&rows[..quota]);
        train.extend_from_slice(&rows[quota..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok((train, test))
}
