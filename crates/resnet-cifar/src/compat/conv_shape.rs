//! # Convolution Shape Arithmetic
//!
//! Predicts the spatial resolution produced by the square, undilated
//! convolutions used throughout the residual families.

/// Predict the output size of one spatial axis of a convolution.
///
/// ```text
/// out_size = floor((in_size + 2*padding - kernel_size) / stride) + 1
/// ```
///
/// # Arguments
///
/// - `input_size`: the input axis size, must be > 0.
/// - `kernel_size`: the kernel size, must be > 0.
/// - `stride`: the stride, must be > 0.
/// - `padding`: padding added to both ends of the axis.
///
/// # Returns
///
/// `None` when the kernel does not fit the padded input.
pub fn maybe_conv_output_size(
    input_size: usize,
    kernel_size: usize,
    stride: usize,
    padding: usize,
) -> Option<usize> {
    assert!(kernel_size > 0);
    assert!(stride > 0);
    if input_size == 0 {
        return None;
    }

    let padded = input_size + 2 * padding;
    if padded < kernel_size {
        return None;
    }
    Some((padded - kernel_size) / stride + 1)
}

/// Predict the ``[height, width]`` output of a square convolution.
///
/// # Panics
///
/// If either axis would collapse to zero.
pub fn expect_conv_output_resolution(
    input_resolution: [usize; 2],
    kernel_size: usize,
    stride: usize,
    padding: usize,
) -> [usize; 2] {
    let [height, width] = input_resolution;
    match (
        maybe_conv_output_size(height, kernel_size, stride, padding),
        maybe_conv_output_size(width, kernel_size, stride, padding),
    ) {
        (Some(h), Some(w)) => [h, w],
        _ => panic!(
            "No legal output size for conv with:\n input_resolution:{input_resolution:?}\n kernel_size:{kernel_size}\n stride:{stride}\n padding:{padding}",
        ),
    }
}

/// Output resolution of a "same"-padded odd kernel under `stride`.
///
/// Both the 3x3/padding-1 convolutions and the 1x1/padding-0 projections of
/// a block reduce to ``(size - 1) / stride + 1``, which is why the two paths
/// of a residual block always agree.
pub fn strided_output_resolution(
    input_resolution: [usize; 2],
    stride: usize,
) -> [usize; 2] {
    expect_conv_output_resolution(input_resolution, 1, stride, 0)
}
