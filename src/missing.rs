// src/missing.rs

//! Pairwise-complete reductions over vectors that may contain missing cells.
//!
//! Every reduction skips a position as soon as one operand is missing there and
//! reports [`EmptyOverlap`] when nothing is left to reduce over. Missingness is
//! always an explicit branch on `Option`; NaN has no special meaning here.

use crate::error::EmptyOverlap;
use ndarray::ArrayView1;

/// A value that is either observed or missing.
///
/// Implemented for `f64` (always observed, used for score and loading vectors)
/// and `Option<f64>` (data cells), so both can flow through the same reductions.
pub trait MaybeObserved: Copy + Send + Sync {
    fn observed(self) -> Option<f64>;
}

impl MaybeObserved for f64 {
    #[inline]
    fn observed(self) -> Option<f64> {
        Some(self)
    }
}

impl MaybeObserved for Option<f64> {
    #[inline]
    fn observed(self) -> Option<f64> {
        self
    }
}

/// Sums accumulated over the positions where both operands are observed.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PairwiseSums {
    /// Σ a·b
    pub cross: f64,
    /// Σ a²
    pub left_squares: f64,
    /// Σ b²
    pub right_squares: f64,
    /// Number of positions that contributed.
    pub count: usize,
}

/// Iterates the jointly observed pairs of two aligned vectors. Callers pass
/// reborrowed views so both share one lifetime.
fn joint_pairs<'a, A: MaybeObserved, B: MaybeObserved>(
    a: ArrayView1<'a, A>,
    b: ArrayView1<'a, B>,
) -> impl Iterator<Item = (f64, f64)> + 'a {
    debug_assert_eq!(a.len(), b.len(), "pairwise reduction over vectors of different length");
    a.into_iter()
        .zip(b)
        .filter_map(|(x, y)| match (x.observed(), y.observed()) {
            (Some(x), Some(y)) => Some((x, y)),
            _ => None,
        })
}

/// Sum of squares over the observed entries of `v`.
pub fn pairwise_sum_of_squares<A: MaybeObserved>(v: ArrayView1<'_, A>) -> Result<f64, EmptyOverlap> {
    let mut count = 0usize;
    let mut total = 0.0;
    for x in v.iter().filter_map(|x| x.observed()) {
        total += x * x;
        count += 1;
    }
    if count == 0 {
        return Err(EmptyOverlap);
    }
    Ok(total)
}

/// Σ a[i]·b[i] over indices where both are observed. No normalisation is applied.
pub fn pairwise_dot_excluding_missing<A: MaybeObserved, B: MaybeObserved>(
    a: ArrayView1<'_, A>,
    b: ArrayView1<'_, B>,
) -> Result<f64, EmptyOverlap> {
    pairwise_sums(a, b).map(|sums| sums.cross)
}

/// Mean of the observed entries, divided by the number of observed entries.
pub fn mean_excluding_missing<A: MaybeObserved>(v: ArrayView1<'_, A>) -> Result<f64, EmptyOverlap> {
    let mut count = 0usize;
    let mut total = 0.0;
    for x in v.iter().filter_map(|x| x.observed()) {
        total += x;
        count += 1;
    }
    if count == 0 {
        return Err(EmptyOverlap);
    }
    Ok(total / count as f64)
}

/// Cross product and both sums of squares in one pass over the joint support.
///
/// The NIPALS ratio updates need numerator and denominator restricted to the
/// same positions, which is why they are accumulated together.
pub fn pairwise_sums<A: MaybeObserved, B: MaybeObserved>(
    a: ArrayView1<'_, A>,
    b: ArrayView1<'_, B>,
) -> Result<PairwiseSums, EmptyOverlap> {
    let mut sums = PairwiseSums::default();
    for (x, y) in joint_pairs(a.view(), b.view()) {
        sums.cross += x * y;
        sums.left_squares += x * x;
        sums.right_squares += y * y;
        sums.count += 1;
    }
    if sums.count == 0 {
        return Err(EmptyOverlap);
    }
    Ok(sums)
}

/// Pearson-style centred sums over the joint support: both means are taken
/// over the jointly observed subset only, then the cross product and the two
/// sums of squared deviations are accumulated.
pub fn centered_pairwise_sums<A: MaybeObserved, B: MaybeObserved>(
    a: ArrayView1<'_, A>,
    b: ArrayView1<'_, B>,
) -> Result<PairwiseSums, EmptyOverlap> {
    let mut count = 0usize;
    let (mut sum_a, mut sum_b) = (0.0, 0.0);
    for (x, y) in joint_pairs(a.view(), b.view()) {
        sum_a += x;
        sum_b += y;
        count += 1;
    }
    if count == 0 {
        return Err(EmptyOverlap);
    }
    let mean_a = sum_a / count as f64;
    let mean_b = sum_b / count as f64;

    let mut sums = PairwiseSums {
        count,
        ..PairwiseSums::default()
    };
    for (x, y) in joint_pairs(a.view(), b.view()) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        sums.cross += dx * dy;
        sums.left_squares += dx * dx;
        sums.right_squares += dy * dy;
    }
    Ok(sums)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn views_with_unrelated_lifetimes_combine() {
        let scores = array![2.0, -1.0, 0.5];
        let (plain, centered) = {
            let column = array![Some(1.0), None, Some(4.0)];
            (
                pairwise_sums(column.view(), scores.view()).unwrap(),
                centered_pairwise_sums(column.view(), scores.view()).unwrap(),
            )
        };
        assert_eq!(plain.count, 2);
        assert_abs_diff_eq!(plain.cross, 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(plain.right_squares, 4.25, epsilon = 1e-12);
        // Joint means are 2.5 and 1.25 over rows 0 and 2.
        assert_abs_diff_eq!(centered.cross, -2.25, epsilon = 1e-12);
        assert_abs_diff_eq!(centered.left_squares, 4.5, epsilon = 1e-12);
    }

    #[test]
    fn dot_matches_plain_dot_without_missing() {
        let a = array![1.0, -2.0, 3.5, 0.25];
        let b = array![4.0, 0.5, -1.0, 8.0];
        let plain = a.dot(&b);
        let pairwise = pairwise_dot_excluding_missing(a.view(), b.view()).unwrap();
        assert_abs_diff_eq!(plain, pairwise, epsilon = 1e-12);

        let wrapped = a.mapv(Some);
        let mixed = pairwise_dot_excluding_missing(wrapped.view(), b.view()).unwrap();
        assert_abs_diff_eq!(plain, mixed, epsilon = 1e-12);
    }

    #[test]
    fn disjoint_support_is_empty_overlap() {
        let a = array![None, Some(1.0), None];
        let b = array![Some(2.0), None, None];
        assert_eq!(pairwise_dot_excluding_missing(a.view(), b.view()), Err(EmptyOverlap));
        assert_eq!(pairwise_sums(a.view(), b.view()), Err(EmptyOverlap));
        assert_eq!(centered_pairwise_sums(a.view(), b.view()), Err(EmptyOverlap));
    }

    #[test]
    fn missing_positions_are_skipped_in_both_parts() {
        let column = array![Some(1.0), None, Some(3.0)];
        let scores = array![2.0, 100.0, 1.0];
        let sums = pairwise_sums(column.view(), scores.view()).unwrap();
        assert_eq!(sums.count, 2);
        assert_abs_diff_eq!(sums.cross, 5.0);
        assert_abs_diff_eq!(sums.left_squares, 10.0);
        // The score at the missing row must not leak into the denominator.
        assert_abs_diff_eq!(sums.right_squares, 5.0);
    }

    #[test]
    fn mean_divides_by_observed_count() {
        let v = array![Some(2.0), None, Some(4.0), None];
        assert_abs_diff_eq!(mean_excluding_missing(v.view()).unwrap(), 3.0);
        let all_missing: ndarray::Array1<Option<f64>> = array![None, None];
        assert_eq!(mean_excluding_missing(all_missing.view()), Err(EmptyOverlap));
    }

    #[test]
    fn sum_of_squares_ignores_missing() {
        let v = array![Some(3.0), None, Some(-4.0)];
        assert_abs_diff_eq!(pairwise_sum_of_squares(v.view()).unwrap(), 25.0);
        let empty: ndarray::Array1<f64> = ndarray::Array1::zeros(0);
        assert_eq!(pairwise_sum_of_squares(empty.view()), Err(EmptyOverlap));
    }

    #[test]
    fn centered_sums_use_joint_means() {
        let x = array![Some(1.0), Some(2.0), None, Some(3.0)];
        let z = array![10.0, 20.0, -500.0, 30.0];
        let sums = centered_pairwise_sums(x.view(), z.view()).unwrap();
        assert_eq!(sums.count, 3);
        assert_abs_diff_eq!(sums.cross, 20.0, epsilon = 1e-12);
        assert_abs_diff_eq!(sums.left_squares, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(sums.right_squares, 200.0, epsilon = 1e-12);
    }
}
