//! # Wide `ResNet` for CIFAR
//!
//! [`WideResNetAbstractConfig`] implements [`Config`], and provides
//! a high-level configuration interface: a depth, a widening factor,
//! and a dropout rate.
//!
//! It provides [`WideResNetAbstractConfig::to_structure`] to convert
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
pub const WRN_FAMILY: &str = "wrn";

/// Layers outside the blocks: stem conv, classifier, and two stage projections.
pub const WRN_FIXED_LAYERS: usize = 4;

/// Weight layers added to the depth by one more block per stage.
pub const WRN_LAYERS_PER_STAGE_BLOCK: usize = 6;

/// High-level wide `ResNet` configuration.
#[derive(Config, Debug)]
pub struct WideResNetAbstractConfig {
    /// Total depth; ``6n + 4``.
    #[config(default = 28)]
    pub depth: usize,

    /// Stem width.
    #[config(default = 16)]
    pub initial_channels: usize,

    /// Stage width multiplier, `k`.
    #[config(default = 10)]
    pub widening_factor: usize,

    /// Dropout probability between the two convs of each block.
    #[config(default = 0.0)]
    pub drop_rate: f64,

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

impl Default for WideResNetAbstractConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl WideResNetAbstractConfig {
    /// Blocks in each stage, derived from the depth.
    pub fn blocks_per_stage(&self) -> ConfigResult<usize> {
        blocks_per_stage(
            WRN_FAMILY,
            self.depth,
            WRN_LAYERS_PER_STAGE_BLOCK,
            WRN_FIXED_LAYERS,
        )
    }

    /// Config with the depth that yields `num_blocks` blocks per stage.
    pub fn with_blocks_per_stage(
        self,
        num_blocks: usize,
    ) -> Self {
        let depth = depth_for_blocks(num_blocks, WRN_LAYERS_PER_STAGE_BLOCK, WRN_FIXED_LAYERS);
        self.with_depth(depth)
    }

    /// Output planes of the stem and each stage: ``[c, ck, 2ck, 4ck]``.
    pub fn channel_widths(&self) -> [usize; 4] {
        let c = self.initial_channels;
        let k = self.widening_factor;
        [c, c * k, 2 * c * k, 4 * c * k]
    }

    /// Convert to a [`ResidualNetworkConfig`].
    ///
    /// The first block of a stage pre-activates both paths iff it changes
    /// the channel count; every block carries `drop_rate`.
    pub fn to_structure(&self) -> ConfigResult<ResidualNetworkConfig> {
        let num_blocks = self.blocks_per_stage()?;
        if self.initial_channels == 0 || self.widening_factor == 0 {
            return Err(ConfigError::InvalidChannels(format!(
                "initial_channels({}) and widening_factor({}) must be > 0",
                self.initial_channels, self.widening_factor
            )));
        }

        let policy = BlockPolicy::new().with_drop_rate(self.drop_rate);
        policy.try_validate_for(BlockType::Basic)?;

        let widths = self.channel_widths();
        debug!(
            family = WRN_FAMILY,
            depth = self.depth,
            widening_factor = self.widening_factor,
            drop_rate = self.drop_rate,
            num_blocks,
            ?widths,
            "structure"
        );

        let stage = |in_planes: usize, out_planes: usize, stride: usize| {
            StageConfig::build_preact_on_widen(
                BlockType::Basic,
                num_blocks,
                in_planes,
                out_planes,
                stride,
                &policy,
            )
        };

        let stages = vec![
            stage(widths[0], widths[1], 1)?,
            stage(widths[1], widths[2], 2)?,
            stage(widths[2], widths[3], 2)?,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::residual::basic_block::BasicBlockMeta;
    use crate::models::residual::residual_block::{ResidualBlock, ResidualBlockMeta};
    use crate::models::residual::stage::StageMeta;
    use bimm_contracts::assert_shape_contract;
    use burn::backend::{Autodiff, NdArray};
    use burn::prelude::Tensor;
    use burn::tensor::Distribution;

    #[test]
    fn test_defaults() {
        let config = WideResNetAbstractConfig::new();
        assert_eq!(config.depth, 28);
        assert_eq!(config.initial_channels, 16);
        assert_eq!(config.widening_factor, 10);
        assert_eq!(config.drop_rate, 0.0);
        assert_eq!(config.init_mode, InitMode::KaimingFanOut);
        assert_eq!(config.blocks_per_stage(), Ok(4));
        assert_eq!(config.channel_widths(), [16, 160, 320, 640]);
    }

    #[test]
    fn test_depth_rule() {
        assert_eq!(
            WideResNetAbstractConfig::new()
                .with_depth(16)
                .blocks_per_stage(),
            Ok(2)
        );
        assert!(matches!(
            WideResNetAbstractConfig::new()
                .with_depth(20)
                .to_structure(),
            Err(ConfigError::InvalidDepth {
                family: "wrn",
                below: Some(16),
                above: Some(22),
                ..
            })
        ));
        assert_eq!(
            WideResNetAbstractConfig::new()
                .with_blocks_per_stage(6)
                .depth,
            40
        );
    }

    #[test]
    fn test_invalid_drop_rate() {
        assert_eq!(
            WideResNetAbstractConfig::new()
                .with_drop_rate(1.5)
                .to_structure()
                .unwrap_err(),
            ConfigError::InvalidProbability {
                name: "drop_rate",
                value: 1.5
            }
        );
    }

    #[test]
    fn test_structure() {
        let config = WideResNetAbstractConfig::new()
            .with_depth(16)
            .with_widening_factor(4)
            .with_drop_rate(0.3);
        let structure = config.to_structure().unwrap();
        assert_eq!(structure.stem_planes, 16);
        assert_eq!(structure.feature_planes(), 256);

        let expected = [(16, 64, 1), (64, 128, 2), (128, 256, 2)];
        for (stage, (in_planes, out_planes, stride)) in structure.stages.iter().zip(expected) {
            assert_eq!(stage.len(), 2);
            assert_eq!(stage.in_planes(), in_planes);
            assert_eq!(stage.out_planes(), out_planes);
            assert_eq!(stage.stride(), stride);
            assert!(stage.blocks[0].preact());
            assert!(stage.blocks[0].has_projection());
            assert!(!stage.blocks[1].preact());
            assert!(!stage.blocks[1].has_projection());
        }

        // k = 1 keeps the first stage width, so its first block is not preact.
        let structure = config.with_widening_factor(1).to_structure().unwrap();
        assert!(!structure.stages[0].blocks[0].preact());
        assert!(structure.stages[1].blocks[0].preact());
    }

    #[test]
    fn test_wrn_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        let network: ResidualNetwork<B> = WideResNetAbstractConfig::new()
            .with_depth(10)
            .with_widening_factor(2)
            .with_drop_rate(0.3)
            .with_num_classes(100)
            .init(&device);
        assert_eq!(network.feature_size(), 128);
        assert_eq!(network.num_classes(), 100);

        for stage in &network.trunk.stages {
            for block in &stage.blocks {
                match block {
                    ResidualBlock::Basic(inner) => {
                        assert_eq!(inner.drop_rate(), 0.3);
                        assert!(inner.pre.act.is_some());
                        assert!(inner.last_norm.is_none());
                    }
                    _ => panic!("expected basic blocks"),
                }
            }
        }

        let input: Tensor<B, 4> = Tensor::random([2, 3, 32, 32], Distribution::Default, &device);
        // Dropout is inactive without autodiff; inference is repeatable.
        let a = network.forward(input.clone());
        let b = network.forward(input);
        assert_shape_contract!(
            ["batch", "classes"],
            &a,
            &[("batch", 2), ("classes", 100)]
        );
        a.to_data().assert_eq(&b.to_data(), true);
    }

    #[test]
    fn test_wrn_autodiff_forward() {
        type B = Autodiff<NdArray<f32>>;
        let device = Default::default();

        let network: ResidualNetwork<B> = WideResNetAbstractConfig::new()
            .with_depth(10)
            .with_widening_factor(1)
            .with_drop_rate(0.5)
            .init(&device);

        let output = network.forward(Tensor::ones([2, 3, 16, 16], &device));
        assert_eq!(output.dims(), [2, 10]);
    }
}
