//! # Pre-Activation `ResNet` for CIFAR
//!
//! [`PreActResNetAbstractConfig`] implements [`Config`], and provides
//! a high-level configuration interface: a depth, a block type, and
//! per-stage pre-activation flags.
//!
//! It provides [`PreActResNetAbstractConfig::to_structure`] to convert
//! to a [`ResidualNetworkConfig`].

use crate::errors::{ConfigError, ConfigResult};
use crate::layers::init::InitMode;
use crate::models::residual::depth::{blocks_per_stage, depth_for_blocks};
use crate::models::residual::network::{ResidualNetwork, ResidualNetworkConfig};
use crate::models::residual::residual_block::{BlockPolicy, BlockType};
use crate::models::residual::stage::StageConfig;
use burn::config::Config;
use burn::prelude::Backend;
use tracing::debug;

/// Family name used in errors and logs.
pub const RESNET_PREACT_FAMILY: &str = "resnet_preact";

/// Layers outside the blocks: the stem conv and the classifier.
pub const RESNET_PREACT_FIXED_LAYERS: usize = 2;

/// Number of stages.
pub const RESNET_PREACT_STAGES: usize = 3;

/// High-level pre-activation `ResNet` configuration.
#[derive(Config, Debug)]
pub struct PreActResNetAbstractConfig {
    /// Total weight-layer depth; ``6n + 2`` (basic) or ``9n + 2`` (bottleneck).
    #[config(default = 110)]
    pub depth: usize,

    /// Stem width, and base width of the first stage.
    #[config(default = 16)]
    pub initial_channels: usize,

    /// Residual block topology.
    #[config(default = "BlockType::Basic")]
    pub block_type: BlockType,

    /// Pre-activation flag for the first block of each stage.
    #[config(default = "[true, true, true]")]
    pub preact_stage: [bool; 3],

    /// Skip the first relu in non-preact blocks.
    #[config(default = false)]
    pub remove_first_relu: bool,

    /// Append a norm after each block's last conv.
    #[config(default = false)]
    pub add_last_bn: bool,

    /// Input image channels.
    #[config(default = 3)]
    pub in_channels: usize,

    /// Square input image resolution.
    #[config(default = 32)]
    pub image_size: usize,

    /// Number of classes.
    #[config(default = 10)]
    pub num_classes: usize,

    /// Conv weight initialization scheme.
    #[config(default = "InitMode::KaimingFanOut")]
    pub init_mode: InitMode,
}

impl Default for PreActResNetAbstractConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PreActResNetAbstractConfig {
    /// Weight layers added to the depth by one more block per stage.
    pub fn layers_per_stage_block(&self) -> usize {
        RESNET_PREACT_STAGES * self.block_type.layers_per_block()
    }

    /// Blocks in each stage, derived from the depth.
    pub fn blocks_per_stage(&self) -> ConfigResult<usize> {
        blocks_per_stage(
            RESNET_PREACT_FAMILY,
            self.depth,
            self.layers_per_stage_block(),
            RESNET_PREACT_FIXED_LAYERS,
        )
    }

    /// Config with the depth that yields `num_blocks` blocks per stage.
    pub fn with_blocks_per_stage(
        self,
        num_blocks: usize,
    ) -> Self {
        let depth = depth_for_blocks(
            num_blocks,
            self.layers_per_stage_block(),
            RESNET_PREACT_FIXED_LAYERS,
        );
        self.with_depth(depth)
    }

    /// Output planes of the stem and each stage: ``[c, 2ce, 4ce]``.
    pub fn channel_widths(&self) -> [usize; 3] {
        let c = self.initial_channels;
        let e = self.block_type.expansion();
        [c, 2 * c * e, 4 * c * e]
    }

    /// Convert to a [`ResidualNetworkConfig`].
    pub fn to_structure(&self) -> ConfigResult<ResidualNetworkConfig> {
        let num_blocks = self.blocks_per_stage()?;
        if self.initial_channels == 0 {
            return Err(ConfigError::InvalidChannels(
                "initial_channels must be > 0".to_string(),
            ));
        }

        let policy = BlockPolicy::new()
            .with_remove_first_relu(self.remove_first_relu)
            .with_add_last_bn(self.add_last_bn);
        policy.try_validate_for(self.block_type)?;

        let widths = self.channel_widths();
        debug!(
            family = RESNET_PREACT_FAMILY,
            depth = self.depth,
            block_type = %self.block_type,
            num_blocks,
            ?widths,
            "structure"
        );

        let stage = |in_planes: usize, out_planes: usize, stride: usize, preact: bool| {
            StageConfig::build(
                self.block_type,
                num_blocks,
                in_planes,
                out_planes,
                stride,
                preact,
                &policy,
            )
        };

        let stages = vec![
            stage(widths[0], widths[0], 1, self.preact_stage[0])?,
            stage(widths[0], widths[1], 2, self.preact_stage[1])?,
            stage(widths[1], widths[2], 2, self.preact_stage[2])?,
        ];

        Ok(ResidualNetworkConfig::new(widths[0], stages)
            .with_in_channels(self.in_channels)
            .with_image_size(self.image_size)
            .with_num_classes(self.num_classes)
            .with_init_mode(self.init_mode))
    }

    /// Build the structure and initialize the network.
    pub fn try_init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ConfigResult<ResidualNetwork<B>> {
        self.to_structure()?.try_init(device)
    }

    /// Build the structure and initialize the network.
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
