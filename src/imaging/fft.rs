//! Centred two-dimensional FFTs.
//!
//! Grids and images are centred on pixel `n / 2`, so every transform is
//! wrapped in the usual shifts: `fftshift(fft(ifftshift(a)))`.

use ndarray::prelude::*;
use num_complex::Complex64;
use rustfft::{FftDirection, FftPlanner};

/// Circularly shift both axes so index `n / 2` moves to 0.
pub fn ifftshift(a: &Array2<Complex64>) -> Array2<Complex64> {
    let (ny, nx) = a.dim();
    Array2::from_shape_fn((ny, nx), |(y, x)| a[[(y + ny / 2) % ny, (x + nx / 2) % nx]])
}

/// Circularly shift both axes so index 0 moves to `n / 2`.
pub fn fftshift(a: &Array2<Complex64>) -> Array2<Complex64> {
    let (ny, nx) = a.dim();
    Array2::from_shape_fn((ny, nx), |(y, x)| {
        a[[(y + ny - ny / 2) % ny, (x + nx - nx / 2) % nx]]
    })
}

/// Unnormalised in-place 2D transform.
fn fft2_in_place(a: &mut Array2<Complex64>, direction: FftDirection) {
    let (ny, nx) = a.dim();
    let mut planner = FftPlanner::<f64>::new();

    let row_fft = planner.plan_fft(nx, direction);
    let mut buf = vec![Complex64::new(0.0, 0.0); nx.max(ny)];
    for mut row in a.rows_mut() {
        let line = &mut buf[..nx];
        line.iter_mut().zip(row.iter()).for_each(|(b, v)| *b = *v);
        row_fft.process(line);
        row.iter_mut().zip(line.iter()).for_each(|(v, b)| *v = *b);
    }

    let col_fft = planner.plan_fft(ny, direction);
    for mut col in a.columns_mut() {
        let line = &mut buf[..ny];
        line.iter_mut().zip(col.iter()).for_each(|(b, v)| *b = *v);
        col_fft.process(line);
        col.iter_mut().zip(line.iter()).for_each(|(v, b)| *v = *b);
    }
}

/// Image to grid: `G(u) = sum_l I(l) exp(-2 pi i u l)`.
pub fn image_to_grid(image: &Array2<Complex64>) -> Array2<Complex64> {
    let mut a = ifftshift(image);
    fft2_in_place(&mut a, FftDirection::Forward);
    fftshift(&a)
}

/// Grid to image: `I(l) = sum_u G(u) exp(+2 pi i u l)`, unnormalised.
pub fn grid_to_image(grid: &Array2<Complex64>) -> Array2<Complex64> {
    let mut a = ifftshift(grid);
    fft2_in_place(&mut a, FftDirection::Inverse);
    fftshift(&a)
}

/// Circular convolution of `image` with `kernel`, whose origin is at pixel
/// `(ny / 2, nx / 2)`. Both must have the same shape.
pub fn convolve(image: &Array2<f64>, kernel: &Array2<f64>) -> Array2<f64> {
    let (ny, nx) = image.dim();
    let to_complex = |a: &Array2<f64>| a.mapv(|v| Complex64::new(v, 0.0));
    let mut product = image_to_grid(&to_complex(image));
    product.zip_mut_with(&image_to_grid(&to_complex(kernel)), |a, b| *a *= *b);
    let scale = (ny * nx) as f64;
    grid_to_image(&product).mapv(|v| v.re / scale)
}
