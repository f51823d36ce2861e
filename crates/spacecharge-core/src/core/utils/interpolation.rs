/// Piecewise-linear interpolation on strictly increasing `xs`, held constant beyond the ends.
///
/// Returns `None` when there are no samples.
pub fn interpolate_linear(xs: &[f64], ys: &[f64], x: f64) -> Option<f64> {
    let (&first, &last) = (xs.first()?, xs.last()?);
    if x <= first {
        return ys.first().copied();
    }
    if x >= last {
        return ys.last().copied();
    }
    let upper = xs.partition_point(|&v| v <= x);
    let (x0, x1) = (xs[upper - 1], xs[upper]);
    let (y0, y1) = (ys[upper - 1], ys[upper]);
    Some(y0 + (y1 - y0) * (x - x0) / (x1 - x0))
}
