//! Numeric pre- and post-processing for model inputs and outputs.
//!
//! Training applied a Box-Cox power transform to selected features and then
//! min-max scaled every feature to `[0, 1]`. These functions reproduce that
//! mapping and its inverse. They hold no state and never fail: domain
//! violations (e.g. the log of a non-positive value) come back as NaN.

/// Box-Cox transform.
///
/// `(x^λ - 1) / λ` for `λ != 0`, `ln(x)` otherwise. Evaluated as
/// `expm1(λ·ln x) / λ` so that `x^λ` close to 1 keeps its precision.
pub fn power_transform(value: f64, lambda: f64) -> f64 {
    if lambda == 0.0 {
        value.ln()
    } else {
        (lambda * value.ln()).exp_m1() / lambda
    }
}

/// Inverse Box-Cox transform.
///
/// `exp(ln(y·λ + 1) / λ)` for `λ != 0`, `exp(y)` otherwise.
pub fn inverse_power_transform(value: f64, lambda: f64) -> f64 {
    if lambda == 0.0 {
        value.exp()
    } else {
        ((value * lambda).ln_1p() / lambda).exp()
    }
}

/// Min-max scale into the training range. Values outside `[min, max]`
/// extrapolate linearly.
pub fn scale(value: f64, min: f64, max: f64) -> f64 {
    (value - min) / (max - min)
}

/// Inverse of [`scale`].
pub fn unscale(value: f64, min: f64, max: f64) -> f64 {
    value * (max - min) + min
}

/// Return a copy of `values` where position `indices[k]` is replaced by
/// `f(values[indices[k]], lambdas[k])`. Every other position is copied as is.
///
/// `indices` and `lambdas` are paired by position and must be the same
/// length; indices must be in bounds. Both are guaranteed when they come
/// from a resolved [`IndexMap`](crate::models::IndexMap).
pub fn apply_masked_transform<F>(values: &[f64], indices: &[usize], lambdas: &[f64], f: F) -> Vec<f64>
where
    F: Fn(f64, f64) -> f64,
{
    debug_assert_eq!(indices.len(), lambdas.len());

    let mut out = values.to_vec();
    for (&idx, &lambda) in indices.iter().zip(lambdas) {
        out[idx] = f(values[idx], lambda);
    }
    out
}

/// Scale every element with its own bounds.
pub fn scale_all(values: &[f64], min: &[f64], max: &[f64]) -> Vec<f64> {
    values
        .iter()
        .zip(min.iter().zip(max))
        .map(|(&v, (&lo, &hi))| scale(v, lo, hi))
        .collect()
}

/// Unscale every element with its own bounds.
pub fn unscale_all(values: &[f64], min: &[f64], max: &[f64]) -> Vec<f64> {
    values
        .iter()
        .zip(min.iter().zip(max))
        .map(|(&v, (&lo, &hi))| unscale(v, lo, hi))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        let tolerance = 1e-5 * expected.abs().max(1.0);
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_scale_round_trip() {
        let cases = [
            (0.0, -1.0, 1.0),
            (3.5, 0.0, 10.0),
            (-250.0, -300.0, 120.0),
            (42.0, 0.0, 1.0), // outside the range
            (1.0e-3, 1.0e-4, 2.0e-3),
        ];
        for (v, min, max) in cases {
            assert_close(unscale(scale(v, min, max), min, max), v);
        }
    }

    #[test]
    fn test_scale_maps_bounds_to_unit_interval() {
        assert_eq!(scale(2.0, 2.0, 6.0), 0.0);
        assert_eq!(scale(6.0, 2.0, 6.0), 1.0);
        assert_eq!(scale(4.0, 2.0, 6.0), 0.5);
        // no clamping
        assert_eq!(scale(10.0, 2.0, 6.0), 2.0);
    }

    #[test]
    fn test_power_transform_round_trip() {
        let lambdas = [-2.0, -1.5, -1.0, -0.5, 0.0, 0.25, 0.5, 1.0, 2.0, 3.0];
        let values = [1.0e-3, 1.0e-2, 0.1, 0.5, 1.0, 3.0, 12.5, 1.0e3, 1.0e5];
        for lambda in lambdas {
            for v in values {
                let transformed = power_transform(v, lambda);
                let restored = inverse_power_transform(transformed, lambda);
                let rel = ((restored - v) / v).abs();
                assert!(rel <= 1e-5, "lambda={lambda} v={v} -> {restored} (rel {rel})");
            }
        }
    }

    #[test]
    fn test_power_transform_keeps_precision_near_one() {
        // x^λ - 1 cancels badly when computed directly
        let v = 1.0 + 1.0e-12;
        let d = v - 1.0;
        let transformed = power_transform(v, 2.0);
        assert!(((transformed - d) / d).abs() < 1e-9, "{transformed} vs {d}");

        let restored = inverse_power_transform(transformed, 2.0);
        assert!((restored - v).abs() <= 4.0 * f64::EPSILON, "{restored} vs {v}");
    }

    #[test]
    fn test_power_transform_of_zero() {
        // (0^λ - 1) / λ = -1/λ for positive λ
        assert_close(power_transform(0.0, 0.5), -2.0);
        assert_eq!(inverse_power_transform(-2.0, 0.5), 0.0);
    }

    #[test]
    fn test_power_transform_lambda_zero_is_log() {
        assert_close(power_transform(std::f64::consts::E, 0.0), 1.0);
        assert_close(inverse_power_transform(1.0, 0.0), std::f64::consts::E);
    }

    #[test]
    fn test_power_transform_known_values() {
        // (4^0.5 - 1) / 0.5 = 2
        assert_close(power_transform(4.0, 0.5), 2.0);
        // (3^2 - 1) / 2 = 4
        assert_close(power_transform(3.0, 2.0), 4.0);
    }

    #[test]
    fn test_domain_violations_are_nan() {
        assert!(power_transform(-1.0, 0.0).is_nan());
        assert!(power_transform(-2.0, 0.5).is_nan());
        // y·λ + 1 < 0
        assert!(inverse_power_transform(-4.0, 0.5).is_nan());
    }

    #[test]
    fn test_masked_transform_empty_mask_is_identity() {
        let values = vec![1.0, -2.0, f64::NAN, 4.0];
        let out = apply_masked_transform(&values, &[], &[], power_transform);

        assert_eq!(out.len(), values.len());
        for (a, b) in out.iter().zip(&values) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_masked_transform_only_touches_masked_positions() {
        let values = vec![1.0, 4.0, 9.0, 16.0, 25.0];
        let out = apply_masked_transform(&values, &[3, 1], &[0.5, 0.0], power_transform);

        assert_close(out[3], power_transform(16.0, 0.5));
        assert_close(out[1], 4.0_f64.ln());
        for i in [0, 2, 4] {
            assert_eq!(out[i].to_bits(), values[i].to_bits());
        }
    }

    #[test]
    fn test_masked_transform_does_not_mutate_input() {
        let values = vec![2.0, 3.0];
        let _ = apply_masked_transform(&values, &[0], &[1.0], power_transform);
        assert_eq!(values, vec![2.0, 3.0]);
    }

    #[test]
    fn test_scale_all_uses_per_feature_bounds() {
        let scaled = scale_all(&[5.0, 5.0], &[0.0, 4.0], &[10.0, 6.0]);
        assert_eq!(scaled, vec![0.5, 0.5]);

        let restored = unscale_all(&scaled, &[0.0, 4.0], &[10.0, 6.0]);
        assert_eq!(restored, vec![5.0, 5.0]);
    }
}
