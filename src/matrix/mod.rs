//! Dense linear algebra on flat row-major buffers.

/// δ·I as a row-major d×d buffer
pub fn scaled_identity(d: usize, scale: f64) -> Vec<f64> {
    let mut m = vec![0.0; d * d];
    for i in 0..d {
        m[i * d + i] = scale;
    }
    m
}

/// A·x for a row-major d×d `a`
pub fn mat_vec_mul(a: &[f64], x: &[f64], d: usize) -> Vec<f64> {
    if d == 0 {
        return Vec::new();
    }
    a.chunks_exact(d).take(d).map(|row| dot_product(row, x)).collect()
}

/// 点积
pub fn dot_product(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// 向量加法: a += scale * b
pub fn vec_add_scaled(a: &mut [f64], b: &[f64], scale: f64) {
    for (ai, &bi) in a.iter_mut().zip(b.iter()) {
        *ai += scale * bi;
    }
}

/// 向量缩放: a * scale
pub fn vec_scaled(a: &[f64], scale: f64) -> Vec<f64> {
    a.iter().map(|&v| v * scale).collect()
}

/// In-place forgetting downdate: A ← (A − u·vᵀ) / λ
pub fn rank1_downdate_scaled(a: &mut [f64], u: &[f64], v: &[f64], d: usize, lambda: f64) {
    let inv_lambda = 1.0 / lambda;
    for i in 0..d {
        let ui = u[i];
        let row = &mut a[i * d..(i + 1) * d];
        for (aij, &vj) in row.iter_mut().zip(v.iter()) {
            *aij = (*aij - ui * vj) * inv_lambda;
        }
    }
}

/// Sum consecutive chunks of `width` entries: an S×B grid folded to S totals.
pub fn row_sums(flat: &[f64], width: usize) -> Vec<f64> {
    if width == 0 {
        return Vec::new();
    }
    flat.chunks(width).map(|row| row.iter().sum()).collect()
}
