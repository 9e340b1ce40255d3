//! Prolate spheroidal gridding kernel and its image-domain correction.

use ndarray::prelude::*;

/// Half-width of the gridding kernel in grid cells.
pub const KERNEL_SUPPORT: usize = 3;

/// Number of taps per axis.
pub const KERNEL_WIDTH: usize = 2 * KERNEL_SUPPORT + 1;

const P: [[f64; 5]; 2] = [
    [8.203343e-2, -3.644705e-1, 6.278660e-1, -5.335581e-1, 2.312756e-1],
    [4.028559e-3, -3.697768e-2, 1.021332e-1, -1.201436e-1, 6.412774e-2],
];
const Q: [[f64; 3]; 2] = [[1.0, 8.212018e-1, 2.078043e-1], [1.0, 9.599102e-1, 2.918724e-1]];

/// Rational approximation to the zero-order prolate spheroidal wave
/// function (Schwab 1984, m = 6, alpha = 1), defined on `|nu| <= 1`.
pub fn grdsf(nu: f64) -> f64 {
    let nu = nu.abs();
    if nu > 1.0 {
        return 0.0;
    }
    let (part, nuend) = if nu < 0.75 { (0, 0.75) } else { (1, 1.0) };
    let delnusq = nu * nu - nuend * nuend;

    let mut top = P[part][0];
    let mut term = 1.0;
    for &p in &P[part][1..] {
        term *= delnusq;
        top += p * term;
    }
    let mut bot = Q[part][0];
    term = 1.0;
    for &q in &Q[part][1..] {
        term *= delnusq;
        bot += q * term;
    }
    if bot > 0.0 {
        top / bot
    } else {
        0.0
    }
}

/// Gridding kernel value at `offset` cells from the sample.
#[inline]
pub fn kernel_value(offset: f64) -> f64 {
    let nu = offset.abs() / KERNEL_SUPPORT as f64;
    (1.0 - nu * nu) * grdsf(nu)
}

/// Kernel taps for cells `round(x) - 3 ..= round(x) + 3` around a sample at
/// fractional grid coordinate `x`, normalised to unit sum.
///
/// Returns the first cell index and the taps.
pub fn kernel_taps(x: f64) -> (isize, [f64; KERNEL_WIDTH]) {
    let centre = x.round();
    let frac = x - centre;
    let mut taps = [0.0; KERNEL_WIDTH];
    for (k, tap) in taps.iter_mut().enumerate() {
        let offset = k as f64 - KERNEL_SUPPORT as f64 - frac;
        *tap = kernel_value(offset);
    }
    let sum: f64 = taps.iter().sum();
    if sum > 0.0 {
        taps.iter_mut().for_each(|t| *t /= sum);
    }
    (centre as isize - KERNEL_SUPPORT as isize, taps)
}

/// One-dimensional grid correction for an `n` pixel axis.
///
/// The reciprocal of the kernel's transform, scaled to 1 at the centre
/// pixel `n / 2`.
pub fn grid_correction_1d(n: usize) -> Array1<f64> {
    let centre = (n / 2) as f64;
    let gcf = Array1::from_shape_fn(n, |i| {
        let coord = (i as f64 - centre) / n as f64;
        grdsf(2.0 * coord)
    });
    let peak = gcf.fold(0.0_f64, |m, &v| m.max(v));
    gcf.mapv(|g| if g > 0.0 { peak / g } else { 0.0 })
}

/// Separable grid correction for an `ny` by `nx` plane.
pub fn grid_correction(ny: usize, nx: usize) -> Array2<f64> {
    let gy = grid_correction_1d(ny);
    let gx = grid_correction_1d(nx);
    Array2::from_shape_fn((ny, nx), |(y, x)| gy[y] * gx[x])
}
