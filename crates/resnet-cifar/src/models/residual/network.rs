//! # Residual Network Assembler
//!
//! [`ResidualNetworkConfig`] is the structure config shared by both CIFAR
//! families: a 3x3 stem, a list of [`StageConfig`]s, a norm/relu head, global
//! average pooling and a linear classifier.
//!
//! [`ResidualNetworkConfig::try_init`] builds the [`ResidualNetwork`]; the
//! classifier input size is measured by running a zero image through a
//! discarded copy of the trunk, and must agree with the last stage width.
//!
//! ```text
//! x -> stem conv3x3 -> stage* -> bn -> relu -> avgpool(1x1) -> flatten -> fc
//! ```

use crate::errors::{ConfigError, ConfigResult};
use crate::layers::blocks::norm_act::{NormAct2d, NormAct2dConfig};
use crate::layers::init::{InitMode, zero_linear_bias};
use crate::models::residual::stage::{Stage, StageConfig, StageMeta};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig};
use burn::nn::{Linear, LinearConfig, PaddingConfig2d};
use burn::prelude::{Backend, Config, Tensor};
use tracing::debug;

/// [`ResidualNetwork`] Structure Config.
///
/// Stages are explicit; the family configs
/// ([`crate::models::resnet_preact::PreActResNetAbstractConfig`],
/// [`crate::models::wrn::WideResNetAbstractConfig`]) derive them from a depth.
#[derive(Config, Debug)]
pub struct ResidualNetworkConfig {
    /// Output planes of the stem conv.
    pub stem_planes: usize,

    /// The stages, in forward order.
    pub stages: Vec<StageConfig>,

    /// Input image channels.
    #[config(default = 3)]
    pub in_channels: usize,

    /// Square input resolution used by the feature probe.
    #[config(default = 32)]
    pub image_size: usize,

    /// Number of classifier outputs.
    #[config(default = 10)]
    pub num_classes: usize,

    /// Conv weight initialization scheme.
    #[config(default = "InitMode::KaimingFanOut")]
    pub init_mode: InitMode,
}

impl ResidualNetworkConfig {
    /// Output planes of the last stage; the classifier input size.
    pub fn feature_planes(&self) -> usize {
        self.stages
            .last()
            .map_or(self.stem_planes, |stage| stage.out_planes())
    }

    /// Product of every stage stride.
    pub fn total_stride(&self) -> usize {
        self.stages
            .iter()
            .fold(1, |acc, stage| acc * stage.stride())
    }

    /// Total number of residual blocks.
    pub fn num_blocks(&self) -> usize {
        self.stages.iter().map(|stage| stage.len()).sum()
    }

    /// Check the config.
    pub fn try_validate(&self) -> ConfigResult<()> {
        if self.in_channels == 0 || self.stem_planes == 0 || self.num_classes == 0 {
            return Err(ConfigError::InvalidChannels(format!(
                "in_channels({}), stem_planes({}) and num_classes({}) must be > 0",
                self.in_channels, self.stem_planes, self.num_classes
            )));
        }
        if self.stages.is_empty() {
            return Err(ConfigError::EmptyStage);
        }

        let mut planes = self.stem_planes;
        for (idx, stage) in self.stages.iter().enumerate() {
            stage.try_validate()?;
            if stage.in_planes() != planes {
                return Err(ConfigError::InvalidChannels(format!(
                    "stage[{idx}].in_planes({}) != incoming planes({planes})",
                    stage.in_planes()
                )));
            }
            planes = stage.out_planes();
        }

        if self.image_size == 0 {
            return Err(ConfigError::EmptyInput);
        }
        Ok(())
    }

    /// Panic if `try_validate` returns an error.
    pub fn expect_valid(&self) {
        if let Err(err) = self.try_validate() {
            panic!("{err}");
        }
    }

    /// Build the trunk with the configured initializer applied to every conv.
    fn trunk_config(&self) -> ResidualTrunkConfig {
        let initializer = self.init_mode.conv_initializer();
        ResidualTrunkConfig {
            stem: Conv2dConfig::new([self.in_channels, self.stem_planes], [3, 3])
                .with_stride([1, 1])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .with_initializer(initializer.clone())
                .with_bias(false),
            stages: self
                .stages
                .iter()
                .cloned()
                .map(|stage| {
                    stage.map_blocks(&mut |_, block| block.with_initializer(initializer.clone()))
                })
                .collect(),
            head: NormAct2dConfig::new(self.feature_planes()),
        }
    }

    /// Initialize a [`ResidualNetwork`].
    ///
    /// # Returns
    ///
    /// The network, or the first configuration error; no network is
    /// returned on error.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(
            stages = self.stages.len(),
            blocks = self.num_blocks(),
            init_mode = %self.init_mode,
        )
    )]
    pub fn try_init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ConfigResult<ResidualNetwork<B>> {
        self.try_validate()?;

        for (idx, stage) in self.stages.iter().enumerate() {
            debug!(
                stage = idx,
                blocks = stage.len(),
                in_planes = stage.in_planes(),
                out_planes = stage.out_planes(),
                stride = stage.stride(),
                "stage"
            );
        }

        let trunk_config = self.trunk_config();

        let expected = self.feature_planes();
        let probed = probe_feature_size(
            trunk_config.init::<B>(device),
            self.in_channels,
            self.image_size,
            device,
        );
        debug!(probed, expected, "feature probe");
        if probed != expected {
            return Err(ConfigError::FeatureSizeMismatch { probed, expected });
        }

        Ok(ResidualNetwork {
            trunk: trunk_config.init(device),
            pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc: zero_linear_bias(LinearConfig::new(probed, self.num_classes).init(device)),
        })
    }

    /// Initialize a [`ResidualNetwork`].
    ///
    /// # Panics
    ///
    /// If the config is invalid.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ResidualNetwork<B> {
        match self.try_init(device) {
            Ok(network) => network,
            Err(err) => panic!("{err}"),
        }
    }
}

/// Run a zero image through `trunk` and pooling, and return the flattened size.
///
/// Consumes `trunk`; batch-norm running statistics of the probed instance
/// may be updated, so it must not be the instance that is kept.
pub fn probe_feature_size<B: Backend>(
    trunk: ResidualTrunk<B>,
    in_channels: usize,
    image_size: usize,
    device: &B::Device,
) -> usize {
    let trunk = trunk.no_grad();
    let input = Tensor::<B, 4>::zeros([1, in_channels, image_size, image_size], device);
    let x = trunk.forward(input);
    let x = AdaptiveAvgPool2dConfig::new([1, 1]).init().forward(x);
    let x: Tensor<B, 2> = x.flatten(1, 3);
    x.dims()[1]
}

/// [`ResidualTrunk`] Config.
#[derive(Config, Debug)]
pub struct ResidualTrunkConfig {
    /// The stem conv.
    pub stem: Conv2dConfig,

    /// The stages.
    pub stages: Vec<StageConfig>,

    /// The trailing norm/relu.
    pub head: NormAct2dConfig,
}

impl ResidualTrunkConfig {
    /// Initialize a [`ResidualTrunk`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ResidualTrunk<B> {
        ResidualTrunk {
            stem: self.stem.init(device),
            stages: self
                .stages
                .iter()
                .cloned()
                .map(|stage| stage.init(device))
                .collect(),
            head: self.head.init(device),
        }
    }
}

/// Feature extractor: stem, stages, and the final norm/relu.
#[derive(Module, Debug)]
pub struct ResidualTrunk<B: Backend> {
    /// Stem conv.
    pub stem: Conv2d<B>,

    /// Residual stages.
    pub stages: Vec<Stage<B>>,

    /// Final norm/relu.
    pub head: NormAct2d<B>,
}

impl<B: Backend> ResidualTrunk<B> {
    /// Input channels.
    pub fn in_channels(&self) -> usize {
        self.stem.weight.dims()[1]
    }

    /// Output feature planes.
    pub fn out_planes(&self) -> usize {
        self.stages
            .last()
            .map_or(self.stem.weight.dims()[0], |stage| stage.out_planes())
    }

    /// Map ``[batch, in_channels, height, width]`` to
    /// ``[batch, out_planes, out_height, out_width]``.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let x = self.stem.forward(input);
        let x = self.stages.iter().fold(x, |x, stage| stage.forward(x));
        self.head.forward(x)
    }
}

/// Residual CIFAR classifier.
#[derive(Module, Debug)]
pub struct ResidualNetwork<B: Backend> {
    /// Feature extractor.
    pub trunk: ResidualTrunk<B>,

    /// Global average pool.
    pub pool: AdaptiveAvgPool2d,

    /// Classifier.
    pub fc: Linear<B>,
}

impl<B: Backend> ResidualNetwork<B> {
    /// Classifier input size.
    pub fn feature_size(&self) -> usize {
        self.fc.weight.dims()[0]
    }

    /// Number of classifier outputs.
    pub fn num_classes(&self) -> usize {
        self.fc.weight.dims()[1]
    }

    /// Pooled, flattened features.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, height, width]``.
    ///
    /// # Returns
    ///
    /// A ``[batch, feature_size]`` tensor.
    pub fn forward_features(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 2> {
        let [batch] = unpack_shape_contract!(
            ["batch", "in_channels", "height", "width"],
            &input,
            &["batch"],
            &[("in_channels", self.trunk.in_channels())]
        );

        let x = self.trunk.forward(input);
        let x = self.pool.forward(x);
        // [B, C, 1, 1] -> [B, C]
        let x = x.flatten(1, 3);

        assert_shape_contract_periodically!(
            ["batch", "features"],
            &x,
            &[("batch", batch), ("features", self.feature_size())]
        );
        x
    }

    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, height, width]``.
    ///
    /// # Returns
    ///
    /// Unnormalized class scores, ``[batch, num_classes]``.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 2> {
        self.fc.forward(self.forward_features(input))
    }
}
