//! Convolutional gridding and degridding of single samples.

use ndarray::prelude::*;
use num_complex::Complex64;

use super::kernel::{kernel_taps, KERNEL_WIDTH};

/// Continuous grid coordinate of spatial frequency `u` (wavelengths) on an
/// `n` cell axis whose image has pixels of `cellsize` radians.
#[inline]
pub fn uv_to_grid(u: f64, n: usize, cellsize: f64) -> f64 {
    u * n as f64 * cellsize + (n / 2) as f64
}

/// Whether a sample centred at `(gx, gy)` lies on an `(ny, nx)` grid.
#[inline]
pub fn on_grid(gx: f64, gy: f64, ny: usize, nx: usize) -> bool {
    let x = gx.round();
    let y = gy.round();
    x >= 0.0 && y >= 0.0 && x < nx as f64 && y < ny as f64
}

/// Add `value` to `grid`, spread by the kernel around `(gx, gy)`.
///
/// Taps falling off the grid are dropped.
pub fn grid_sample(grid: &mut ArrayViewMut2<Complex64>, gx: f64, gy: f64, value: Complex64) {
    let (ny, nx) = grid.dim();
    let (x0, wx) = kernel_taps(gx);
    let (y0, wy) = kernel_taps(gy);
    for j in 0..KERNEL_WIDTH {
        let y = y0 + j as isize;
        if y < 0 || y >= ny as isize {
            continue;
        }
        let vy = value * wy[j];
        for i in 0..KERNEL_WIDTH {
            let x = x0 + i as isize;
            if x < 0 || x >= nx as isize {
                continue;
            }
            grid[[y as usize, x as usize]] += vy * wx[i];
        }
    }
}

/// Interpolate `grid` at `(gx, gy)` with the kernel.
pub fn degrid_sample(grid: &ArrayView2<Complex64>, gx: f64, gy: f64) -> Complex64 {
    let (ny, nx) = grid.dim();
    let (x0, wx) = kernel_taps(gx);
    let (y0, wy) = kernel_taps(gy);
    let mut sum = Complex64::new(0.0, 0.0);
    for j in 0..KERNEL_WIDTH {
        let y = y0 + j as isize;
        if y < 0 || y >= ny as isize {
            continue;
        }
        let mut row = Complex64::new(0.0, 0.0);
        for i in 0..KERNEL_WIDTH {
            let x = x0 + i as isize;
            if x < 0 || x >= nx as isize {
                continue;
            }
            row += grid[[y as usize, x as usize]] * wx[i];
        }
        sum += row * wy[j];
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_grid_conserves_flux() {
        let mut grid = Array2::<Complex64>::zeros((32, 32));
        grid_sample(&mut grid.view_mut(), 12.3, 20.7, Complex64::new(2.0, -1.0));
        let total: Complex64 = grid.iter().sum();
        assert_abs_diff_eq!(total.re, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(total.im, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_degrid_constant_grid() {
        let grid = Array2::from_elem((32, 32), Complex64::new(1.5, 0.5));
        let v = degrid_sample(&grid.view(), 15.4, 9.9);
        assert_abs_diff_eq!(v.re, 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(v.im, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_uv_mapping() {
        assert_eq!(uv_to_grid(0.0, 64, 1e-3), 32.0);
        assert_abs_diff_eq!(uv_to_grid(100.0, 64, 1e-3), 38.4, epsilon = 1e-12);
        assert!(on_grid(0.2, 63.4, 64, 64));
        assert!(!on_grid(-0.6, 10.0, 64, 64));
    }
}
