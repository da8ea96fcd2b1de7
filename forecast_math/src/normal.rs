//! Standard-normal quantiles for symmetric prediction intervals

use crate::{MathError, Result};
use statrs::distribution::{ContinuousCDF, Normal};

/// Two-sided z-scores keyed by upper-tail probability
pub const Z_TABLE: [(f64, f64); 4] = [(0.025, 1.96), (0.05, 1.645), (0.1, 1.282), (0.25, 0.674)];

const TABLE_TOLERANCE: f64 = 1e-9;

/// Tabulated z-score for an upper-tail probability, if the table has it
pub fn tabulated_z(tail: f64) -> Option<f64> {
    Z_TABLE
        .iter()
        .find(|(p, _)| (p - tail).abs() < TABLE_TOLERANCE)
        .map(|&(_, z)| z)
}

/// Quantile of the standard normal distribution at probability `p`
pub fn standard_normal_quantile(p: f64) -> Result<f64> {
    if !(p > 0.0 && p < 1.0) {
        return Err(MathError::InvalidInput(format!(
            "Probability must lie strictly between 0 and 1, got {}",
            p
        )));
    }

    let normal =
        Normal::new(0.0, 1.0).map_err(|e| MathError::CalculationError(e.to_string()))?;
    Ok(normal.inverse_cdf(p))
}

/// z-score leaving `tail` probability above it.
///
/// Uses the fixed table where it has an entry and the exact quantile elsewhere,
/// so the result never decreases as `tail` shrinks.
pub fn two_sided_z(tail: f64) -> Result<f64> {
    if !(tail > 0.0 && tail < 0.5) {
        return Err(MathError::InvalidInput(format!(
            "Tail probability must lie in (0, 0.5), got {}",
            tail
        )));
    }

    if let Some(z) = tabulated_z(tail) {
        return Ok(z);
    }

    // Keep z ordered against the rounded table entries on either side.
    let exact = standard_normal_quantile(1.0 - tail)?;
    Ok(Z_TABLE.iter().fold(exact, |z, &(p, table_z)| {
        if tail < p {
            z.max(table_z)
        } else {
            z.min(table_z)
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0.95, 1.96)]
    #[case(0.90, 1.645)]
    #[case(0.80, 1.282)]
    #[case(0.50, 0.674)]
    fn test_table_hits_despite_rounding(#[case] confidence: f64, #[case] expected: f64) {
        let tail = (1.0 - confidence) / 2.0;
        assert_eq!(two_sided_z(tail).unwrap(), expected);
    }

    #[test]
    fn test_exact_quantile_off_table() {
        assert_abs_diff_eq!(two_sided_z(0.005).unwrap(), 2.5758, epsilon = 1e-3);
        assert_abs_diff_eq!(two_sided_z(0.45).unwrap(), 0.1257, epsilon = 1e-3);
    }

    #[test]
    fn test_monotonic_around_table_entries() {
        let tails = [0.3, 0.25, 0.2499999, 0.1000001, 0.1, 0.05, 0.0499999, 0.025, 0.01];
        let zs: Vec<f64> = tails.iter().map(|&t| two_sided_z(t).unwrap()).collect();
        assert!(zs.windows(2).all(|w| w[0] <= w[1]), "{:?}", zs);
    }

    #[test]
    fn test_invalid_tails() {
        assert!(two_sided_z(0.0).is_err());
        assert!(two_sided_z(0.5).is_err());
        assert!(standard_normal_quantile(1.0).is_err());
    }
}
