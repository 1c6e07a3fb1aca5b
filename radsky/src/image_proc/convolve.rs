//! 2D convolution for image smoothing
//!
//! Sequential "same"-size correlation with zero-valued borders, which is what
//! detection smoothing needs: output has the input's shape and flux near the
//! edge is not reflected back in.

use ndarray::{Array2, ArrayView2};

/// Controls how pixels outside the image are treated
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EdgeMode {
    /// Constant value beyond the border
    Constant(f64),
    /// Nearest edge pixel
    Extend,
}

impl Default for EdgeMode {
    fn default() -> Self {
        EdgeMode::Constant(0.0)
    }
}

/// Correlate `input` with `kernel`, producing an array of the input's shape.
///
/// The kernel is centred at `(rows / 2, cols / 2)`. Symmetric kernels such as
/// [`gaussian_kernel`] make this identical to convolution. NaN inputs
/// propagate to every output pixel they touch.
pub fn convolve2d(
    input: &ArrayView2<f64>,
    kernel: &ArrayView2<f64>,
    edge_mode: EdgeMode,
) -> Array2<f64> {
    let (rows, cols) = input.dim();
    let (kernel_rows, kernel_cols) = kernel.dim();
    let kr = (kernel_rows / 2) as isize;
    let kc = (kernel_cols / 2) as isize;

    Array2::from_shape_fn((rows, cols), |(i, j)| {
        let mut sum = 0.0;
        for ((ki, kj), &weight) in kernel.indexed_iter() {
            if weight == 0.0 {
                continue;
            }
            let ii = i as isize + ki as isize - kr;
            let jj = j as isize + kj as isize - kc;
            sum += weight * pixel_at(input, ii, jj, edge_mode);
        }
        sum
    })
}

fn pixel_at(input: &ArrayView2<f64>, i: isize, j: isize, edge_mode: EdgeMode) -> f64 {
    let (rows, cols) = input.dim();
    if i >= 0 && i < rows as isize && j >= 0 && j < cols as isize {
        return input[[i as usize, j as usize]];
    }
    match edge_mode {
        EdgeMode::Constant(value) => value,
        EdgeMode::Extend => {
            let ci = i.clamp(0, rows as isize - 1) as usize;
            let cj = j.clamp(0, cols as isize - 1) as usize;
            input[[ci, cj]]
        }
    }
}

/// Square Gaussian kernel of side `size` normalized to unit sum.
///
/// `size` is rounded up to the next odd number so the kernel has a centre.
pub fn gaussian_kernel(size: usize, sigma: f64) -> Array2<f64> {
    let size = if size % 2 == 0 { size + 1 } else { size };
    let center = (size / 2) as f64;

    let mut kernel = Array2::from_shape_fn((size, size), |(i, j)| {
        let dy = i as f64 - center;
        let dx = j as f64 - center;
        (-(dx * dx + dy * dy) / (2.0 * sigma * sigma)).exp()
    });

    let sum = kernel.sum();
    if sum > 0.0 {
        kernel.mapv_inplace(|v| v / sum);
    }
    kernel
}
