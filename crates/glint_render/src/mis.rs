//! Multiple importance sampling weights.

/// Smallest pdf sum a weight is computed for.
pub const MIS_EPSILON: f32 = 1e-7;

/// Balance heuristic weight of the strategy with density `pdf` against
/// `other`. Both densities must be in the same measure.
///
/// Degenerate pairs (sum below [`MIS_EPSILON`] or not finite) get zero weight.
#[inline]
pub fn balance_heuristic(pdf: f32, other: f32) -> f32 {
    let sum = pdf + other;
    if sum > MIS_EPSILON && sum.is_finite() {
        pdf / sum
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_weights_sum_to_one() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..1000 {
            let a: f32 = rng.gen_range(1e-3..100.0);
            let b: f32 = rng.gen_range(1e-3..100.0);
            let sum = balance_heuristic(a, b) + balance_heuristic(b, a);
            assert!((sum - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_degenerate_pdfs() {
        assert_eq!(balance_heuristic(0.0, 0.0), 0.0);
        assert_eq!(balance_heuristic(1.0, f32::INFINITY), 0.0);
        assert_eq!(balance_heuristic(2.0, 0.0), 1.0);
    }
}
