use itertools::Itertools;

/// Composite trapezoid rule over (possibly non-uniformly spaced) samples.
pub fn trapezoid(x: &[f64], y: &[f64]) -> f64 {
    x.iter()
        .zip(y)
        .tuple_windows()
        .map(|((x0, y0), (x1, y1))| 0.5 * (x1 - x0) * (y0 + y1))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrates_linear_functions_exactly_on_uneven_spacing() {
        let x = [0.0, 0.1, 0.5, 0.6, 2.0];
        let y: Vec<f64> = x.iter().map(|x| 3.0 * x + 1.0).collect();
        assert!((trapezoid(&x, &y) - 8.0).abs() < 1e-12);
    }

    #[test]
    fn degenerate_inputs_integrate_to_zero() {
        assert_eq!(trapezoid(&[], &[]), 0.0);
        assert_eq!(trapezoid(&[1.0], &[5.0]), 0.0);
    }
}
