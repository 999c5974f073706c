//! Distance kernels.
//!
//! Every function returns a *distance*: smaller is better. Inner-product
//! similarity is negated so all metrics sort the same way.

use quiver_core::types::MetricType;

#[inline]
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[inline]
pub fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Distance under `metric`
#[inline]
pub fn distance(metric: MetricType, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        MetricType::L2 => l2_squared(a, b),
        MetricType::InnerProduct => -dot_product(a, b),
    }
}

#[inline]
pub fn norm(v: &[f32]) -> f32 {
    dot_product(v, v).sqrt()
}

/// Normalize vector in-place
#[inline]
pub fn normalize(v: &mut [f32]) {
    let n = norm(v);
    if n > 0.0 {
        let inv_n = 1.0 / n;
        for x in v.iter_mut() {
            *x *= inv_n;
        }
    }
}

// ============================================================================
// Scalar quantization (SQ8): per-vector affine mapping onto i8
// ============================================================================

/// Quantize one vector. Returns the codes plus the (min, range) pair needed
/// to reconstruct values.
pub fn quantize_sq8(v: &[f32]) -> (Vec<i8>, f32, f32) {
    let mut min = f32::MAX;
    let mut max = f32::MIN;
    for &x in v {
        min = min.min(x);
        max = max.max(x);
    }
    if v.is_empty() {
        return (Vec::new(), 0.0, 0.0);
    }
    let range = max - min;
    if range <= 0.0 {
        return (vec![-128i8; v.len()], min, 0.0);
    }
    let codes = v
        .iter()
        .map(|&x| (((x - min) / range) * 255.0 - 128.0).round().clamp(-128.0, 127.0) as i8)
        .collect();
    (codes, min, range)
}

#[inline]
pub fn dequantize_sq8(code: i8, min: f32, range: f32) -> f32 {
    min + (code as f32 + 128.0) / 255.0 * range
}

/// Distance between an f32 query and an SQ8-coded vector
#[inline]
pub fn distance_sq8(metric: MetricType, query: &[f32], codes: &[i8], min: f32, range: f32) -> f32 {
    debug_assert_eq!(query.len(), codes.len());
    match metric {
        MetricType::L2 => query
            .iter()
            .zip(codes.iter())
            .map(|(&q, &c)| {
                let d = q - dequantize_sq8(c, min, range);
                d * d
            })
            .sum(),
        MetricType::InnerProduct => -query
            .iter()
            .zip(codes.iter())
            .map(|(&q, &c)| q * dequantize_sq8(c, min, range))
            .sum::<f32>(),
    }
}
