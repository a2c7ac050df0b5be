//! # Residual Stage
//!
//! A [`Stage`] is a sequence of [`ResidualBlock`]s; only the first block
//! may change channel count or resolution.
//!
//! [`StageMeta`] defines a common meta API for [`Stage`]
//! and [`StageConfig`].
//!
//! [`StageConfig`] implements [`Config`], and provides
//! [`StageConfig::init`] to initialize a [`Stage`].

use crate::errors::{ConfigError, ConfigResult};
use crate::models::residual::residual_block::{
    BlockPolicy, BlockType, ResidualBlock, ResidualBlockConfig, ResidualBlockMeta,
};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::prelude::{Backend, Module, Tensor};

/// [`Stage`] Meta API.
pub trait StageMeta {
    /// The number of blocks.
    fn len(&self) -> usize;

    /// Check if the stage is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The number of input feature planes.
    fn in_planes(&self) -> usize;

    /// The number of output feature planes.
    fn out_planes(&self) -> usize;

    /// The product of the block strides.
    fn stride(&self) -> usize;

    /// Get the output resolution for a given input resolution.
    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2];
}

/// [`Stage`] Configuration.
#[derive(Config, Debug)]
pub struct StageConfig {
    /// The component blocks.
    pub blocks: Vec<ResidualBlockConfig>,
}

impl From<Vec<ResidualBlockConfig>> for StageConfig {
    fn from(blocks: Vec<ResidualBlockConfig>) -> Self {
        Self { blocks }
    }
}

impl StageMeta for StageConfig {
    fn len(&self) -> usize {
        self.blocks.len()
    }

    fn in_planes(&self) -> usize {
        self.blocks.first().map_or(0, |b| b.in_planes())
    }

    fn out_planes(&self) -> usize {
        self.blocks.last().map_or(0, |b| b.out_planes())
    }

    fn stride(&self) -> usize {
        self.blocks
            .iter()
            .fold(1, |acc, block| acc * block.stride())
    }

    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        self.blocks
            .iter()
            .fold(input_resolution, |res, block| block.output_resolution(res))
    }
}

impl StageConfig {
    /// Build a stage config.
    ///
    /// The first block maps `in_planes -> out_planes` at `stride`, and carries
    /// `preact`; the rest map `out_planes -> out_planes` at stride 1, without preact.
    pub fn build(
        block_type: BlockType,
        num_blocks: usize,
        in_planes: usize,
        out_planes: usize,
        stride: usize,
        preact: bool,
        policy: &BlockPolicy,
    ) -> ConfigResult<Self> {
        if num_blocks == 0 {
            return Err(ConfigError::EmptyStage);
        }
        let blocks = (0..num_blocks)
            .map(|b| {
                if b == 0 {
                    ResidualBlockConfig::build(
                        block_type, in_planes, out_planes, stride, preact, policy,
                    )
                } else {
                    ResidualBlockConfig::build(block_type, out_planes, out_planes, 1, false, policy)
                }
            })
            .collect();

        Ok(Self { blocks })
    }

    /// Build a stage whose blocks decide preact from their own channel change.
    ///
    /// Every block gets `preact = in_planes != out_planes`; after the first
    /// block planes are constant, so only the first can be preact.
    pub fn build_preact_on_widen(
        block_type: BlockType,
        num_blocks: usize,
        in_planes: usize,
        out_planes: usize,
        stride: usize,
        policy: &BlockPolicy,
    ) -> ConfigResult<Self> {
        Self::build(
            block_type,
            num_blocks,
            in_planes,
            out_planes,
            stride,
            in_planes != out_planes,
            policy,
        )
    }

    /// Check if the config is valid.
    pub fn try_validate(&self) -> ConfigResult<()> {
        if self.is_empty() {
            return Err(ConfigError::EmptyStage);
        }

        for block in &self.blocks {
            block.try_validate()?;
        }

        for idx in 1..self.blocks.len() {
            let prev = &self.blocks[idx - 1];
            let curr = &self.blocks[idx];
            if prev.out_planes() != curr.in_planes() {
                return Err(ConfigError::StageChannelMismatch {
                    prev: idx - 1,
                    prev_out: prev.out_planes(),
                    next: idx,
                    next_in: curr.in_planes(),
                });
            }
        }
        Ok(())
    }

    /// Panic if `try_validate` returns an error.
    pub fn expect_valid(&self) {
        if let Err(err) = self.try_validate() {
            panic!("{err}");
        }
    }

    /// Initialize a new [`Stage`].
    ///
    /// # Panics
    ///
    /// If the config is invalid.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> Stage<B> {
        self.expect_valid();

        Stage {
            blocks: self
                .blocks
                .into_iter()
                .map(|block| block.init(device))
                .collect(),
        }
    }

    /// Apply a mapping over the blocks.
    pub fn map_blocks<F>(
        self,
        f: &mut F,
    ) -> Self
    where
        F: FnMut(usize, ResidualBlockConfig) -> ResidualBlockConfig,
    {
        Self {
            blocks: self
                .blocks
                .into_iter()
                .enumerate()
                .map(|(idx, block)| f(idx, block))
                .collect(),
        }
    }
}

/// Residual stage.
#[derive(Module, Debug)]
pub struct Stage<B: Backend> {
    /// Internal blocks.
    pub blocks: Vec<ResidualBlock<B>>,
}

impl<B: Backend> StageMeta for Stage<B> {
    fn len(&self) -> usize {
        self.blocks.len()
    }

    fn in_planes(&self) -> usize {
        self.blocks.first().map_or(0, |b| b.in_planes())
    }

    fn out_planes(&self) -> usize {
        self.blocks.last().map_or(0, |b| b.out_planes())
    }

    fn stride(&self) -> usize {
        self.blocks
            .iter()
            .fold(1, |acc, block| acc * block.stride())
    }

    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        self.blocks
            .iter()
            .fold(input_resolution, |res, block| block.output_resolution(res))
    }
}

impl<B: Backend> Stage<B> {
    /// Apply the stage.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch, in_height, in_width] = unpack_shape_contract!(
            ["batch", "in_planes", "in_height", "in_width"],
            &input,
            &["batch", "in_height", "in_width"],
            &[("in_planes", self.in_planes())],
        );
        let [out_height, out_width] = self.output_resolution([in_height, in_width]);

        let x = self.blocks.iter().fold(input, |x, block| block.forward(x));

        assert_shape_contract_periodically!(
            ["batch", "out_planes", "out_height", "out_width"],
            &x,
            &[
                ("batch", batch),
                ("out_planes", self.out_planes()),
                ("out_height", out_height),
                ("out_width", out_width)
            ],
        );

        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::residual::basic_block::BasicBlockConfig;
    use bimm_contracts::assert_shape_contract;
    use burn::backend::NdArray;

    #[test]
    fn test_stage_config_build() {
        let policy = BlockPolicy::new();
        let config =
            StageConfig::build(BlockType::Basic, 3, 16, 32, 2, true, &policy).unwrap();
        config.expect_valid();
        assert_eq!(config.len(), 3);
        assert_eq!(config.in_planes(), 16);
        assert_eq!(config.out_planes(), 32);
        assert_eq!(config.stride(), 2);
        assert_eq!(config.output_resolution([32, 32]), [16, 16]);
        assert_eq!(config.output_resolution([33, 33]), [17, 17]);

        let first = &config.blocks[0];
        assert_eq!(first.in_planes(), 16);
        assert_eq!(first.stride(), 2);
        assert!(first.preact());
        assert!(first.has_projection());

        for block in &config.blocks[1..] {
            assert_eq!(block.in_planes(), 32);
            assert_eq!(block.out_planes(), 32);
            assert_eq!(block.stride(), 1);
            assert!(!block.preact());
            assert!(!block.has_projection());
        }
    }

    #[test]
    fn test_stage_empty() {
        assert_eq!(
            StageConfig::build(BlockType::Basic, 0, 16, 16, 1, false, &BlockPolicy::new())
                .unwrap_err(),
            ConfigError::EmptyStage
        );
        assert_eq!(
            StageConfig::new(vec![]).try_validate(),
            Err(ConfigError::EmptyStage)
        );
    }

    #[test]
    fn test_stage_channel_mismatch() {
        let config = StageConfig::from(vec![
            BasicBlockConfig::new(16, 32).into(),
            BasicBlockConfig::new(16, 32).into(),
        ]);
        assert_eq!(
            config.try_validate(),
            Err(ConfigError::StageChannelMismatch {
                prev: 0,
                prev_out: 32,
                next: 1,
                next_in: 16,
            })
        );
    }

    #[test]
    fn test_preact_on_widen() {
        let policy = BlockPolicy::new();
        let config =
            StageConfig::build_preact_on_widen(BlockType::Basic, 2, 16, 160, 1, &policy).unwrap();
        assert!(config.blocks[0].preact());
        assert!(!config.blocks[1].preact());

        let config =
            StageConfig::build_preact_on_widen(BlockType::Basic, 2, 160, 160, 1, &policy).unwrap();
        assert!(!config.blocks[0].preact());
        assert!(!config.blocks[0].has_projection());
    }

    #[test]
    fn test_map_blocks() {
        let config =
            StageConfig::build(BlockType::Basic, 2, 8, 8, 1, false, &BlockPolicy::new()).unwrap();
        let mut seen = vec![];
        let config = config.map_blocks(&mut |idx, block| {
            seen.push(idx);
            block
        });
        assert_eq!(seen, vec![0, 1]);
        assert_eq!(config.len(), 2);
    }

    #[test]
    fn test_stage_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        let config = StageConfig::build(
            BlockType::Bottleneck,
            2,
            16,
            32,
            2,
            false,
            &BlockPolicy::new(),
        )
        .unwrap();
        let stage: Stage<B> = config.init(&device);

        assert_eq!(stage.len(), 2);
        assert_eq!(stage.in_planes(), 16);
        assert_eq!(stage.out_planes(), 32);
        assert_eq!(stage.stride(), 2);

        let input = Tensor::ones([2, 16, 9, 9], &device);
        let output = stage.forward(input);

        assert_shape_contract!(
            ["batch", "out_planes", "out_height", "out_width"],
            &output,
            &[
                ("batch", 2),
                ("out_planes", 32),
                ("out_height", 5),
                ("out_width", 5)
            ],
        );
    }
}
