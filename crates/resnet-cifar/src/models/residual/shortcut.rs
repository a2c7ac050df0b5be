//! # Residual Shortcut Projection
//!
//! The shortcut path of a residual block is the identity when the block
//! preserves both channel count and resolution; otherwise it is a
//! [`ShortcutProjection`]: a bias-free 1x1 conv carrying the block stride.
//!
//! Blocks hold an `Option<ShortcutProjection<B>>`, where `None` is identity.

use crate::compat::conv_shape::strided_output_resolution;
use crate::layers::init::InitMode;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{Initializer, PaddingConfig2d};
use burn::prelude::{Backend, Config, Module, Tensor};

/// Is a projection required to merge `in_planes` into `out_planes` at `stride`?
pub fn needs_projection(
    in_planes: usize,
    out_planes: usize,
    stride: usize,
) -> bool {
    stride != 1 || in_planes != out_planes
}

/// [`ShortcutProjection`] Meta trait.
pub trait ShortcutProjectionMeta {
    /// The size of the in channels dimension.
    fn in_planes(&self) -> usize;

    /// The size of the out channels dimension.
    fn out_planes(&self) -> usize;

    /// The stride of the projection.
    fn stride(&self) -> usize;

    /// Get the output resolution for a given input resolution.
    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        strided_output_resolution(input_resolution, self.stride())
    }
}

/// [`ShortcutProjection`] configuration.
#[derive(Config, Debug)]
pub struct ShortcutProjectionConfig {
    /// The size of the in channels dimension.
    pub in_planes: usize,

    /// The size of the out channels dimension.
    pub out_planes: usize,

    /// The stride of the projection.
    #[config(default = 1)]
    pub stride: usize,

    /// The conv weight initializer.
    #[config(default = "InitMode::default().conv_initializer()")]
    pub initializer: Initializer,
}

impl ShortcutProjectionMeta for ShortcutProjectionConfig {
    fn in_planes(&self) -> usize {
        self.in_planes
    }

    fn out_planes(&self) -> usize {
        self.out_planes
    }

    fn stride(&self) -> usize {
        self.stride
    }
}

impl ShortcutProjectionConfig {
    /// Initialize a [`ShortcutProjection`] `Module`.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ShortcutProjection<B> {
        ShortcutProjection {
            conv: Conv2dConfig::new([self.in_planes, self.out_planes], [1, 1])
                .with_stride([self.stride, self.stride])
                .with_padding(PaddingConfig2d::Explicit(0, 0))
                .with_initializer(self.initializer.clone())
                .with_bias(false)
                .init(device),
        }
    }
}

/// Shortcut projection; a 1x1 conv that adjusts channels and resolution.
///
/// Maps ``[batch, in_planes, in_height, in_width]`` to
/// ``[batch, out_planes, out_height, out_width]`` tensors.
#[derive(Module, Debug)]
pub struct ShortcutProjection<B: Backend> {
    /// The 1x1 projection conv.
    pub conv: Conv2d<B>,
}

impl<B: Backend> ShortcutProjectionMeta for ShortcutProjection<B> {
    fn in_planes(&self) -> usize {
        self.conv.weight.shape().dims[1]
    }

    fn out_planes(&self) -> usize {
        self.conv.weight.shape().dims[0]
    }

    fn stride(&self) -> usize {
        self.conv.stride[0]
    }
}

impl<B: Backend> ShortcutProjection<B> {
    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// - `input`: a ``[batch, in_planes, in_height, in_width]`` tensor.
    ///
    /// # Returns
    ///
    /// A ``[batch, out_planes, out_height, out_width]`` tensor.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch, in_height, in_width] = unpack_shape_contract!(
            ["batch", "in_planes", "in_height", "in_width"],
            &input,
            &["batch", "in_height", "in_width"],
            &[("in_planes", self.in_planes())]
        );
        let [out_height, out_width] = self.output_resolution([in_height, in_width]);

        let out = self.conv.forward(input);

        assert_shape_contract_periodically!(
            ["batch", "out_planes", "out_height", "out_width"],
            &out,
            &[
                ("batch", batch),
                ("out_planes", self.out_planes()),
                ("out_height", out_height),
                ("out_width", out_width)
            ]
        );

        out
    }
}
