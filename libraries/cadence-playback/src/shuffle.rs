//! Shuffle permutation generation

use rand::seq::SliceRandom;
use rand::Rng;

/// Uniformly random permutation of `0..len` (Fisher-Yates)
///
/// Entry `i` is the physical track index played at logical position `i`.
pub fn shuffled_order<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    order.shuffle(rng);
    order
}
