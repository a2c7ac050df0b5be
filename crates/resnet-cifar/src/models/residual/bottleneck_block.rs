//! # Pre-Activation Bottleneck Block
//!
//! [`BottleneckBlock`] is the three-convolution residual unit: a 1x1 reduce
//! to ``out_planes / 4``, a strided 3x3 at the reduced width, and a 1x1
//! expand back to `out_planes`.
//!
//! [`BottleneckBlockMeta`] defines a common meta-API for [`BottleneckBlock`]
//! and [`BottleneckBlockConfig`].
//!
//! [`BottleneckBlockConfig`] implements [`Config`] and provides
//! [`BottleneckBlockConfig::init`] to initialize a [`BottleneckBlock`].
//!
//! [`BottleneckBlock`] implements [`Module`] and provides
//! [`BottleneckBlock::forward`].

use crate::compat::conv_shape::strided_output_resolution;
use crate::errors::{ConfigError, ConfigResult};
use crate::layers::blocks::norm_act::{NormAct2d, NormAct2dConfig};
use crate::layers::init::InitMode;
use crate::models::residual::shortcut::{
    ShortcutProjection, ShortcutProjectionConfig, needs_projection,
};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, Initializer, PaddingConfig2d};
use burn::prelude::{Backend, Config, Module, Tensor};

/// Ratio of `out_planes` to the reduced bottleneck width.
pub const BOTTLENECK_EXPANSION: usize = 4;

/// [`BottleneckBlock`] Meta trait.
pub trait BottleneckBlockMeta {
    /// The number of input feature planes.
    fn in_planes(&self) -> usize;

    /// The number of output feature planes.
    fn out_planes(&self) -> usize;

    /// The reduced width of the inner convs.
    ///
    /// ``bottleneck_planes = out_planes / 4``
    fn bottleneck_planes(&self) -> usize {
        self.out_planes() / BOTTLENECK_EXPANSION
    }

    /// The stride of the 3x3 conv, and of the shortcut.
    fn stride(&self) -> usize;

    /// Is the first norm/act shared with the shortcut path?
    fn preact(&self) -> bool;

    /// Does the block end with an extra norm?
    fn add_last_bn(&self) -> bool;

    /// Does the shortcut need a projection?
    fn has_projection(&self) -> bool {
        needs_projection(self.in_planes(), self.out_planes(), self.stride())
    }

    /// Get the output resolution for a given input resolution.
    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        strided_output_resolution(input_resolution, self.stride())
    }
}

/// [`BottleneckBlock`] Config.
///
/// Implements [`BottleneckBlockMeta`].
#[derive(Config, Debug)]
pub struct BottleneckBlockConfig {
    /// The size of the in channels dimension.
    pub in_planes: usize,

    /// The size of the out channels dimension.
    pub out_planes: usize,

    /// The stride of the 3x3 conv.
    #[config(default = 1)]
    pub stride: usize,

    /// Share the first norm/act between the residual and shortcut paths.
    #[config(default = false)]
    pub preact: bool,

    /// Skip the first relu; only consulted when `preact` is false.
    #[config(default = false)]
    pub remove_first_relu: bool,

    /// Append a norm after the last conv.
    #[config(default = false)]
    pub add_last_bn: bool,

    /// Conv weight initializer.
    #[config(default = "InitMode::default().conv_initializer()")]
    pub initializer: Initializer,
}

impl BottleneckBlockMeta for BottleneckBlockConfig {
    fn in_planes(&self) -> usize {
        self.in_planes
    }

    fn out_planes(&self) -> usize {
        self.out_planes
    }

    fn stride(&self) -> usize {
        self.stride
    }

    fn preact(&self) -> bool {
        self.preact
    }

    fn add_last_bn(&self) -> bool {
        self.add_last_bn
    }
}

impl BottleneckBlockConfig {
    /// Check the config.
    pub fn try_validate(&self) -> ConfigResult<()> {
        if self.in_planes == 0 || self.out_planes < BOTTLENECK_EXPANSION {
            return Err(ConfigError::InvalidChannels(format!(
                "bottleneck block needs in_planes > 0 and out_planes >= {BOTTLENECK_EXPANSION}: {} -> {}",
                self.in_planes, self.out_planes
            )));
        }
        if self.stride == 0 {
            return Err(ConfigError::InvalidStride("bottleneck"));
        }
        Ok(())
    }

    /// Initialize a [`BottleneckBlock`].
    ///
    /// # Panics
    ///
    /// If the config is invalid.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> BottleneckBlock<B> {
        if let Err(err) = self.try_validate() {
            panic!("{err}");
        }

        let in_planes = self.in_planes;
        let out_planes = self.out_planes;
        let width = self.bottleneck_planes();
        let stride = self.stride;

        let conv = |channels: [usize; 2], kernel: usize, stride: usize| {
            let padding = kernel / 2;
            Conv2dConfig::new(channels, [kernel, kernel])
                .with_stride([stride, stride])
                .with_padding(PaddingConfig2d::Explicit(padding, padding))
                .with_initializer(self.initializer.clone())
                .with_bias(false)
        };

        let projection = if self.has_projection() {
            Some(
                ShortcutProjectionConfig::new(in_planes, out_planes)
                    .with_stride(stride)
                    .with_initializer(self.initializer.clone()),
            )
        } else {
            None
        };

        BottleneckBlock {
            preact: self.preact,
            pre: NormAct2dConfig::new(in_planes)
                .with_act(self.preact || !self.remove_first_relu)
                .init(device),
            conv1: conv([in_planes, width], 1, 1).init(device),
            mid1: NormAct2dConfig::new(width).init(device),
            conv2: conv([width, width], 3, stride).init(device),
            mid2: NormAct2dConfig::new(width).init(device),
            conv3: conv([width, out_planes], 1, 1).init(device),
            last_norm: if self.add_last_bn {
                Some(BatchNormConfig::new(out_planes).init(device))
            } else {
                None
            },
            projection: projection.map(|cfg| cfg.init(device)),
        }
    }
}

/// Pre-activation bottleneck residual block.
///
/// Implements [`BottleneckBlockMeta`].
#[derive(Module, Debug)]
pub struct BottleneckBlock<B: Backend> {
    /// Share `pre` with the shortcut path.
    pub preact: bool,

    /// First norm, with or without relu.
    pub pre: NormAct2d<B>,

    /// 1x1 reduce conv.
    pub conv1: Conv2d<B>,

    /// Norm/relu after the reduce.
    pub mid1: NormAct2d<B>,

    /// 3x3 conv; carries the stride.
    pub conv2: Conv2d<B>,

    /// Norm/relu after the 3x3.
    pub mid2: NormAct2d<B>,

    /// 1x1 expand conv.
    pub conv3: Conv2d<B>,

    /// Optional trailing norm.
    pub last_norm: Option<BatchNorm<B, 2>>,

    /// Optional shortcut projection; identity when `None`.
    pub projection: Option<ShortcutProjection<B>>,
}

impl<B: Backend> BottleneckBlockMeta for BottleneckBlock<B> {
    fn in_planes(&self) -> usize {
        self.conv1.weight.shape().dims[1]
    }

    fn out_planes(&self) -> usize {
        self.conv3.weight.shape().dims[0]
    }

    fn bottleneck_planes(&self) -> usize {
        self.conv2.weight.shape().dims[0]
    }

    fn stride(&self) -> usize {
        self.conv2.stride[0]
    }

    fn preact(&self) -> bool {
        self.preact
    }

    fn add_last_bn(&self) -> bool {
        self.last_norm.is_some()
    }
}

impl<B: Backend> BottleneckBlock<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_planes, in_height, in_width]``.
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

        let (shortcut, x) = if self.preact {
            let x = self.pre.forward(input);
            (x.clone(), x)
        } else {
            (input.clone(), self.pre.forward(input))
        };

        let x = self.conv1.forward(x);
        let x = self.mid1.forward(x);
        let x = self.conv2.forward(x);

        assert_shape_contract_periodically!(
            ["batch", "bottleneck_planes", "out_height", "out_width"],
            &x,
            &[
                ("batch", batch),
                ("bottleneck_planes", self.bottleneck_planes()),
                ("out_height", out_height),
                ("out_width", out_width)
            ]
        );

        let x = self.mid2.forward(x);
        let x = self.conv3.forward(x);
        let x = match &self.last_norm {
            Some(norm) => norm.forward(x),
            None => x,
        };

        let identity = match &self.projection {
            Some(projection) => projection.forward(shortcut),
            None => shortcut,
        };

        let out_bindings = [
            ("batch", batch),
            ("out_planes", self.out_planes()),
            ("out_height", out_height),
            ("out_width", out_width),
        ];
        assert_shape_contract_periodically!(
            ["batch", "out_planes", "out_height", "out_width"],
            &identity,
            &out_bindings
        );

        let x = x + identity;

        assert_shape_contract_periodically!(
            ["batch", "out_planes", "out_height", "out_width"],
            &x,
            &out_bindings
        );

        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bimm_contracts::assert_shape_contract;
    use burn::backend::{Autodiff, NdArray};
    use burn::tensor::Distribution;

    #[test]
    fn test_bottleneck_config() {
        let config = BottleneckBlockConfig::new(16, 64);
        assert_eq!(config.in_planes(), 16);
        assert_eq!(config.out_planes(), 64);
        assert_eq!(config.bottleneck_planes(), 16);
        assert_eq!(config.stride(), 1);
        assert!(config.has_projection());

        let config = BottleneckBlockConfig::new(64, 64);
        assert!(!config.has_projection());
        assert!(config.with_stride(2).has_projection());
    }

    #[test]
    fn test_bottleneck_validate() {
        assert!(BottleneckBlockConfig::new(16, 16).try_validate().is_ok());
        assert!(matches!(
            BottleneckBlockConfig::new(16, 3).try_validate(),
            Err(ConfigError::InvalidChannels(_))
        ));
        assert_eq!(
            BottleneckBlockConfig::new(16, 16).with_stride(0).try_validate(),
            Err(ConfigError::InvalidStride("bottleneck"))
        );
    }

    #[test]
    fn test_bottleneck_meta() {
        type B = NdArray<f32>;
        let device = Default::default();

        let block: BottleneckBlock<B> = BottleneckBlockConfig::new(16, 128)
            .with_stride(2)
            .with_add_last_bn(true)
            .init(&device);

        assert_eq!(block.in_planes(), 16);
        assert_eq!(block.out_planes(), 128);
        assert_eq!(block.bottleneck_planes(), 32);
        assert_eq!(block.stride(), 2);
        assert!(block.add_last_bn());
        assert!(!block.preact());
        assert!(block.projection.is_some());
        assert_eq!(block.conv1.kernel_size, [1, 1]);
        assert_eq!(block.conv2.kernel_size, [3, 3]);
        assert_eq!(block.conv3.kernel_size, [1, 1]);
        assert_eq!(block.conv1.stride, [1, 1]);
        assert_eq!(block.conv3.stride, [1, 1]);
    }

    #[test]
    fn test_bottleneck_identity_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        let block: BottleneckBlock<B> = BottleneckBlockConfig::new(8, 8)
            .with_remove_first_relu(true)
            .init(&device);
        assert!(block.projection.is_none());
        assert!(block.pre.act.is_none());

        let input: Tensor<B, 4> = Tensor::random([2, 8, 5, 5], Distribution::Default, &device);
        let output = block.forward(input.clone());

        let expected = {
            let y = block.pre.forward(input.clone());
            let y = block.conv1.forward(y);
            let y = block.mid1.forward(y);
            let y = block.conv2.forward(y);
            let y = block.mid2.forward(y);
            let y = block.conv3.forward(y);
            y + input
        };
        output.to_data().assert_eq(&expected.to_data(), true);
    }

    #[test]
    fn test_bottleneck_projection_forward_autodiff() {
        type B = Autodiff<NdArray<f32>>;
        let device = Default::default();

        let block: BottleneckBlock<B> = BottleneckBlockConfig::new(4, 16)
            .with_stride(2)
            .with_preact(true)
            .init(&device);

        let input = Tensor::ones([2, 4, 9, 9], &device);
        let output = block.forward(input);

        assert_shape_contract!(
            ["batch", "out_planes", "out_height", "out_width"],
            &output,
            &[
                ("batch", 2),
                ("out_planes", 16),
                ("out_height", 5),
                ("out_width", 5)
            ],
        );
    }
}
