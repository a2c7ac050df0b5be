//! # Pre-Activation Basic Block
//!
//! [`BasicBlock`] is the two-convolution residual unit shared by the
//! pre-activation `ResNet` and the wide `ResNet` families.
//!
//! [`BasicBlockMeta`] defines a common meta API for [`BasicBlock`]
//! and [`BasicBlockConfig`].
//!
//! [`BasicBlockConfig`] implements [`Config`], and provides
//! [`BasicBlockConfig::init`] to initialize a [`BasicBlock`].
//!
//! [`BasicBlock`] implements [`Module`], and provides
//! [`BasicBlock::forward`].
//!
//! ```text
//! preact:      x -> bn1 -> relu -+-> conv3x3/s -> [drop] -> bn2 -> relu -> conv3x3 -> [bn3] -> (+)
//!                                +-> shortcut -------------------------------------------------^
//!
//! not preact:  x -+-> bn1 -> [relu] -> conv3x3/s -> [drop] -> bn2 -> relu -> conv3x3 -> [bn3] -> (+)
//!                 +-> shortcut ----------------------------------------------------------------^
//! ```

use crate::compat::conv_shape::strided_output_resolution;
use crate::errors::{ConfigError, ConfigResult};
use crate::layers::blocks::norm_act::{NormAct2d, NormAct2dConfig};
use crate::layers::init::InitMode;
use crate::models::residual::shortcut::{
    ShortcutProjection, ShortcutProjectionConfig, needs_projection,
};
use crate::utility::probability::try_probability;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Initializer, PaddingConfig2d};
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`BasicBlock`] Meta trait.
pub trait BasicBlockMeta {
    /// The size of the in channels dimension.
    fn in_planes(&self) -> usize;

    /// The size of the out channels dimension.
    fn out_planes(&self) -> usize;

    /// The stride of the first conv, and of the shortcut.
    fn stride(&self) -> usize;

    /// Is the first norm/act shared with the shortcut path?
    fn preact(&self) -> bool;

    /// Does the block end with an extra norm?
    fn add_last_bn(&self) -> bool;

    /// Dropout probability between the convs.
    fn drop_rate(&self) -> f64;

    /// Does the shortcut need a projection?
    fn has_projection(&self) -> bool {
        needs_projection(self.in_planes(), self.out_planes(), self.stride())
    }

    /// Get the output resolution for a given input resolution.
    ///
    /// # Arguments
    ///
    /// - `input_resolution`: ``[in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[(in_height - 1) / stride + 1, (in_width - 1) / stride + 1]``
    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        strided_output_resolution(input_resolution, self.stride())
    }
}

/// [`BasicBlock`] Config.
///
/// Implements [`BasicBlockMeta`].
#[derive(Config, Debug)]
pub struct BasicBlockConfig {
    /// The size of the in channels dimension.
    pub in_planes: usize,

    /// The size of the out channels dimension.
    pub out_planes: usize,

    /// The stride of the first conv.
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

    /// Dropout probability after the first conv.
    #[config(default = 0.0)]
    pub drop_rate: f64,

    /// Conv weight initializer.
    #[config(default = "InitMode::default().conv_initializer()")]
    pub initializer: Initializer,
}

impl BasicBlockMeta for BasicBlockConfig {
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

    fn drop_rate(&self) -> f64 {
        self.drop_rate
    }
}

impl BasicBlockConfig {
    /// Check the config.
    pub fn try_validate(&self) -> ConfigResult<()> {
        if self.in_planes == 0 || self.out_planes == 0 {
            return Err(ConfigError::InvalidChannels(format!(
                "basic block planes must be > 0: {} -> {}",
                self.in_planes, self.out_planes
            )));
        }
        if self.stride == 0 {
            return Err(ConfigError::InvalidStride("basic"));
        }
        try_probability("drop_rate", self.drop_rate)?;
        Ok(())
    }

    /// Initialize a [`BasicBlock`].
    ///
    /// # Panics
    ///
    /// If the config is invalid.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> BasicBlock<B> {
        if let Err(err) = self.try_validate() {
            panic!("{err}");
        }
        let drop_rate = self.drop_rate;

        let in_planes = self.in_planes;
        let out_planes = self.out_planes;
        let stride = self.stride;

        let projection = if self.has_projection() {
            Some(
                ShortcutProjectionConfig::new(in_planes, out_planes)
                    .with_stride(stride)
                    .with_initializer(self.initializer.clone()),
            )
        } else {
            None
        };

        let conv3x3 = |channels: [usize; 2], stride: usize| {
            Conv2dConfig::new(channels, [3, 3])
                .with_stride([stride, stride])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .with_initializer(self.initializer.clone())
                .with_bias(false)
        };

        BasicBlock {
            preact: self.preact,
            pre: NormAct2dConfig::new(in_planes)
                .with_act(self.preact || !self.remove_first_relu)
                .init(device),
            conv1: conv3x3([in_planes, out_planes], stride).init(device),
            drop: if drop_rate > 0.0 {
                Some(DropoutConfig::new(drop_rate).init())
            } else {
                None
            },
            mid: NormAct2dConfig::new(out_planes).init(device),
            conv2: conv3x3([out_planes, out_planes], 1).init(device),
            last_norm: if self.add_last_bn {
                Some(BatchNormConfig::new(out_planes).init(device))
            } else {
                None
            },
            projection: projection.map(|cfg| cfg.init(device)),
        }
    }
}

/// Pre-activation basic residual block.
///
/// Implements [`BasicBlockMeta`].
#[derive(Module, Debug)]
pub struct BasicBlock<B: Backend> {
    /// Share `pre` with the shortcut path.
    pub preact: bool,

    /// First norm, with or without relu.
    pub pre: NormAct2d<B>,

    /// First 3x3 conv; carries the stride.
    pub conv1: Conv2d<B>,

    /// Optional dropout after `conv1`.
    pub drop: Option<Dropout>,

    /// Second norm/relu.
    pub mid: NormAct2d<B>,

    /// Second 3x3 conv.
    pub conv2: Conv2d<B>,

    /// Optional trailing norm.
    pub last_norm: Option<BatchNorm<B, 2>>,

    /// Optional shortcut projection; identity when `None`.
    pub projection: Option<ShortcutProjection<B>>,
}

impl<B: Backend> BasicBlockMeta for BasicBlock<B> {
    fn in_planes(&self) -> usize {
        self.conv1.weight.shape().dims[1]
    }

    fn out_planes(&self) -> usize {
        self.conv2.weight.shape().dims[0]
    }

    fn stride(&self) -> usize {
        self.conv1.stride[0]
    }

    fn preact(&self) -> bool {
        self.preact
    }

    fn add_last_bn(&self) -> bool {
        self.last_norm.is_some()
    }

    fn drop_rate(&self) -> f64 {
        self.drop.as_ref().map(|d| d.prob).unwrap_or(0.0)
    }
}

impl<B: Backend> BasicBlock<B> {
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
        let x = match &self.drop {
            Some(drop) => drop.forward(x),
            None => x,
        };
        let x = self.mid.forward(x);
        let x = self.conv2.forward(x);
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
    fn test_basic_block_config() {
        let config = BasicBlockConfig::new(16, 32);
        assert_eq!(config.in_planes(), 16);
        assert_eq!(config.out_planes(), 32);
        assert_eq!(config.stride(), 1);
        assert!(!config.preact());
        assert!(!config.add_last_bn());
        assert_eq!(config.drop_rate(), 0.0);
        assert!(config.has_projection());
        assert_eq!(config.output_resolution([16, 16]), [16, 16]);

        let config = config.with_stride(2);
        assert_eq!(config.output_resolution([16, 16]), [8, 8]);
        assert_eq!(config.output_resolution([15, 15]), [8, 8]);

        assert!(!BasicBlockConfig::new(8, 8).has_projection());
        assert!(BasicBlockConfig::new(8, 8).with_stride(2).has_projection());
    }

    #[test]
    fn test_basic_block_validate() {
        assert!(BasicBlockConfig::new(8, 8).try_validate().is_ok());
        assert!(matches!(
            BasicBlockConfig::new(0, 8).try_validate(),
            Err(ConfigError::InvalidChannels(_))
        ));
        assert_eq!(
            BasicBlockConfig::new(8, 16).with_stride(0).try_validate(),
            Err(ConfigError::InvalidStride("basic"))
        );
        assert_eq!(
            BasicBlockConfig::new(8, 8)
                .with_drop_rate(1.0)
                .try_validate(),
            Err(ConfigError::InvalidProbability {
                name: "drop_rate",
                value: 1.0
            })
        );
    }

    #[test]
    fn test_basic_block_meta() {
        type B = NdArray<f32>;
        let device = Default::default();

        let block: BasicBlock<B> = BasicBlockConfig::new(4, 8)
            .with_stride(2)
            .with_preact(true)
            .with_add_last_bn(true)
            .with_drop_rate(0.25)
            .init(&device);

        assert_eq!(block.in_planes(), 4);
        assert_eq!(block.out_planes(), 8);
        assert_eq!(block.stride(), 2);
        assert!(block.preact());
        assert!(block.add_last_bn());
        assert_eq!(block.drop_rate(), 0.25);
        assert!(block.projection.is_some());
        assert!(block.conv1.bias.is_none());
        assert!(block.conv2.bias.is_none());
    }

    #[test]
    fn test_first_relu_placement() {
        type B = NdArray<f32>;
        let device = Default::default();

        let block: BasicBlock<B> = BasicBlockConfig::new(4, 4).init(&device);
        assert!(block.pre.act.is_some());

        let block: BasicBlock<B> = BasicBlockConfig::new(4, 4)
            .with_remove_first_relu(true)
            .init(&device);
        assert!(block.pre.act.is_none());

        // Under preact the first relu is always applied.
        let block: BasicBlock<B> = BasicBlockConfig::new(4, 4)
            .with_remove_first_relu(true)
            .with_preact(true)
            .init(&device);
        assert!(block.pre.act.is_some());
    }

    #[test]
    fn test_identity_shortcut_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        let block: BasicBlock<B> = BasicBlockConfig::new(4, 4).init(&device);
        assert!(block.projection.is_none());

        let input: Tensor<B, 4> = Tensor::random([2, 4, 6, 6], Distribution::Default, &device);
        let output = block.forward(input.clone());

        let expected = {
            let y = block.pre.forward(input.clone());
            let y = block.conv1.forward(y);
            let y = block.mid.forward(y);
            let y = block.conv2.forward(y);
            y + input
        };
        output.to_data().assert_eq(&expected.to_data(), true);
    }

    #[test]
    fn test_preact_shortcut_sees_activation() {
        type B = NdArray<f32>;
        let device = Default::default();

        let block: BasicBlock<B> = BasicBlockConfig::new(4, 4)
            .with_preact(true)
            .init(&device);

        let input: Tensor<B, 4> = Tensor::random([2, 4, 6, 6], Distribution::Default, &device);
        let output = block.forward(input.clone());

        let expected = {
            let x = block.pre.forward(input);
            let y = block.conv1.forward(x.clone());
            let y = block.mid.forward(y);
            let y = block.conv2.forward(y);
            y + x
        };
        output.to_data().assert_eq(&expected.to_data(), true);
    }

    #[test]
    fn test_projection_forward_autodiff() {
        type B = Autodiff<NdArray<f32>>;
        let device = Default::default();

        let batch_size = 2;
        let block: BasicBlock<B> = BasicBlockConfig::new(3, 6)
            .with_stride(2)
            .with_add_last_bn(true)
            .with_drop_rate(0.3)
            .init(&device);

        let [out_height, out_width] = block.output_resolution([7, 7]);
        assert_eq!([out_height, out_width], [4, 4]);

        let input = Tensor::ones([batch_size, 3, 7, 7], &device);
        let output = block.forward(input);

        assert_shape_contract!(
            ["batch", "out_planes", "out_height", "out_width"],
            &output,
            &[
                ("batch", batch_size),
                ("out_planes", 6),
                ("out_height", out_height),
                ("out_width", out_width)
            ],
        );
    }
}
