//! SU(3) and SU(2) matrix helpers on top of `nalgebra`.

use nalgebra::{Complex, Matrix2, Matrix3};

pub type CMatrix3 = Matrix3<Complex<f64>>;
pub type CMatrix2 = Matrix2<Complex<f64>>;

/// Index pairs of the three SU(2) subgroups used by heatbath and by random
/// SU(3) composition.
pub const SUBGROUPS: [(usize, usize); 3] = [(0, 1), (0, 2), (1, 2)];

const NORM_GUARD: f64 = 1e-300;

/// SU(2) matrix from unit quaternion coefficients `[x0, x1, x2, x3]`:
/// `[[x0 + i x3, x2 + i x1], [-x2 + i x1, x0 - i x3]]`.
pub fn su2_from_coefficients(x: [f64; 4]) -> CMatrix2 {
    CMatrix2::new(
        Complex::new(x[0], x[3]),
        Complex::new(x[2], x[1]),
        Complex::new(-x[2], x[1]),
        Complex::new(x[0], -x[3]),
    )
}

/// Coefficients of the SU(2)-proportional part of the `(i, j)` block of `w`.
///
/// For any SU(2) matrix `R` embedded at `(i, j)`,
/// `Re Tr(embed(R) · w) = Re Tr(R · su2_from_coefficients(v))` up to the
/// untouched diagonal entry.
pub fn su2_projection(w: &CMatrix3, i: usize, j: usize) -> [f64; 4] {
    let (a, b, c, d) = (w[(i, i)], w[(i, j)], w[(j, i)], w[(j, j)]);
    [
        0.5 * (a.re + d.re),
        0.5 * (b.im + c.im),
        0.5 * (b.re - c.re),
        0.5 * (a.im - d.im),
    ]
}

/// Embed a 2×2 matrix in rows/columns `(i, j)` of the 3×3 identity.
pub fn embed(r: &CMatrix2, i: usize, j: usize) -> CMatrix3 {
    let mut m = CMatrix3::identity();
    m[(i, i)] = r[(0, 0)];
    m[(i, j)] = r[(0, 1)];
    m[(j, i)] = r[(1, 0)];
    m[(j, j)] = r[(1, 1)];
    m
}

/// Project onto SU(3) by Gram-Schmidt on the first two rows; the third row
/// is the conjugated cross product, which fixes `det = 1`.
pub fn reunitarize(u: &CMatrix3) -> CMatrix3 {
    let mut r0 = [u[(0, 0)], u[(0, 1)], u[(0, 2)]];
    let mut r1 = [u[(1, 0)], u[(1, 1)], u[(1, 2)]];

    let n0 = row_norm(&r0);
    if n0 > NORM_GUARD {
        r0.iter_mut().for_each(|z| *z /= n0);
    }
    let dot: Complex<f64> = (0..3).map(|k| r0[k].conj() * r1[k]).sum();
    for k in 0..3 {
        r1[k] -= r0[k] * dot;
    }
    let n1 = row_norm(&r1);
    if n1 > NORM_GUARD {
        r1.iter_mut().for_each(|z| *z /= n1);
    }
    let r2 = [
        (r0[1] * r1[2] - r0[2] * r1[1]).conj(),
        (r0[2] * r1[0] - r0[0] * r1[2]).conj(),
        (r0[0] * r1[1] - r0[1] * r1[0]).conj(),
    ];
    CMatrix3::new(
        r0[0], r0[1], r0[2], r1[0], r1[1], r1[2], r2[0], r2[1], r2[2],
    )
}

fn row_norm(row: &[Complex<f64>; 3]) -> f64 {
    row.iter().map(|z| z.norm_sqr()).sum::<f64>().sqrt()
}

/// Distance from SU(3): the larger of `‖U U† - 1‖` (Frobenius) and `|det U - 1|`.
pub fn unitarity_deviation(u: &CMatrix3) -> f64 {
    let off = (u * u.adjoint() - CMatrix3::identity()).norm();
    let det = (u.determinant() - Complex::new(1.0, 0.0)).norm();
    off.max(det)
}

#[inline]
pub fn re_trace(u: &CMatrix3) -> f64 {
    u.trace().re
}
