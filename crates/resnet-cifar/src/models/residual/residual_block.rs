//! # Residual Block Wrapper
//!
//! [`ResidualBlock`] erases the difference between [`BasicBlock`] and
//! [`BottleneckBlock`] so that a stage is a plain `Vec` of blocks.

use crate::compat::conv_shape::strided_output_resolution;
use crate::errors::{ConfigError, ConfigResult};
use crate::models::residual::basic_block::{BasicBlock, BasicBlockConfig, BasicBlockMeta};
use crate::models::residual::bottleneck_block::{
    BOTTLENECK_EXPANSION, BottleneckBlock, BottleneckBlockConfig, BottleneckBlockMeta,
};
use crate::utility::probability::try_probability;
use burn::config::Config;
use burn::nn::Initializer;
use burn::prelude::{Backend, Module, Tensor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The residual block topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    /// Two 3x3 convs; see [`BasicBlock`].
    #[default]
    Basic,

    /// 1x1 / 3x3 / 1x1 convs; see [`BottleneckBlock`].
    Bottleneck,
}

impl BlockType {
    /// The config-file name of the block type.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Bottleneck => "bottleneck",
        }
    }

    /// Channel expansion of the block relative to the stage base width.
    pub fn expansion(&self) -> usize {
        match self {
            Self::Basic => 1,
            Self::Bottleneck => BOTTLENECK_EXPANSION,
        }
    }

    /// Number of weight layers inside one block.
    pub fn layers_per_block(&self) -> usize {
        match self {
            Self::Basic => 2,
            Self::Bottleneck => 3,
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BlockType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(Self::Basic),
            "bottleneck" => Ok(Self::Bottleneck),
            _ => Err(ConfigError::UnknownBlockType(s.to_string())),
        }
    }
}

/// Micro-architecture flags shared by every block of a network.
#[derive(Config, Debug, PartialEq)]
pub struct BlockPolicy {
    /// Skip the first relu of non-preact blocks.
    #[config(default = false)]
    pub remove_first_relu: bool,

    /// Append a norm after each block's last conv.
    #[config(default = false)]
    pub add_last_bn: bool,

    /// Dropout probability inside basic blocks.
    #[config(default = 0.0)]
    pub drop_rate: f64,
}

impl Default for BlockPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockPolicy {
    /// Check the policy against a block type.
    pub fn try_validate_for(
        &self,
        block_type: BlockType,
    ) -> ConfigResult<()> {
        try_probability("drop_rate", self.drop_rate)?;
        if block_type == BlockType::Bottleneck && self.drop_rate > 0.0 {
            return Err(ConfigError::UnsupportedDropout(block_type.name()));
        }
        Ok(())
    }
}

/// [`ResidualBlock`] Meta API.
pub trait ResidualBlockMeta {
    /// The number of input feature planes.
    fn in_planes(&self) -> usize;

    /// The number of output feature planes.
    fn out_planes(&self) -> usize;

    /// The stride of the block.
    fn stride(&self) -> usize;

    /// Is the first norm/act shared with the shortcut path?
    fn preact(&self) -> bool;

    /// Does the shortcut carry a projection?
    fn has_projection(&self) -> bool;

    /// Get the output resolution for a given input resolution.
    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        strided_output_resolution(input_resolution, self.stride())
    }
}

/// [`ResidualBlock`] Config.
#[derive(Config, Debug)]
pub enum ResidualBlockConfig {
    /// A [`BasicBlock`].
    Basic(BasicBlockConfig),

    /// A [`BottleneckBlock`].
    Bottleneck(BottleneckBlockConfig),
}

impl From<BasicBlockConfig> for ResidualBlockConfig {
    fn from(config: BasicBlockConfig) -> Self {
        Self::Basic(config)
    }
}

impl From<BottleneckBlockConfig> for ResidualBlockConfig {
    fn from(config: BottleneckBlockConfig) -> Self {
        Self::Bottleneck(config)
    }
}

impl ResidualBlockMeta for ResidualBlockConfig {
    fn in_planes(&self) -> usize {
        match self {
            Self::Basic(config) => config.in_planes(),
            Self::Bottleneck(config) => config.in_planes(),
        }
    }

    fn out_planes(&self) -> usize {
        match self {
            Self::Basic(config) => config.out_planes(),
            Self::Bottleneck(config) => config.out_planes(),
        }
    }

    fn stride(&self) -> usize {
        match self {
            Self::Basic(config) => config.stride(),
            Self::Bottleneck(config) => config.stride(),
        }
    }

    fn preact(&self) -> bool {
        match self {
            Self::Basic(config) => config.preact(),
            Self::Bottleneck(config) => config.preact(),
        }
    }

    fn has_projection(&self) -> bool {
        match self {
            Self::Basic(config) => config.has_projection(),
            Self::Bottleneck(config) => config.has_projection(),
        }
    }
}

impl ResidualBlockConfig {
    /// Build a block config.
    ///
    /// `drop_rate` only reaches basic blocks; see [`BlockPolicy::try_validate_for`].
    pub fn build(
        block_type: BlockType,
        in_planes: usize,
        out_planes: usize,
        stride: usize,
        preact: bool,
        policy: &BlockPolicy,
    ) -> Self {
        match block_type {
            BlockType::Basic => BasicBlockConfig::new(in_planes, out_planes)
                .with_stride(stride)
                .with_preact(preact)
                .with_remove_first_relu(policy.remove_first_relu)
                .with_add_last_bn(policy.add_last_bn)
                .with_drop_rate(policy.drop_rate)
                .into(),
            BlockType::Bottleneck => BottleneckBlockConfig::new(in_planes, out_planes)
                .with_stride(stride)
                .with_preact(preact)
                .with_remove_first_relu(policy.remove_first_relu)
                .with_add_last_bn(policy.add_last_bn)
                .into(),
        }
    }

    /// The block type.
    pub fn block_type(&self) -> BlockType {
        match self {
            Self::Basic(_) => BlockType::Basic,
            Self::Bottleneck(_) => BlockType::Bottleneck,
        }
    }

    /// Check the config.
    pub fn try_validate(&self) -> ConfigResult<()> {
        match self {
            Self::Basic(config) => config.try_validate(),
            Self::Bottleneck(config) => config.try_validate(),
        }
    }

    /// Replace the conv initializer.
    pub fn with_initializer(
        self,
        initializer: Initializer,
    ) -> Self {
        match self {
            Self::Basic(config) => config.with_initializer(initializer).into(),
            Self::Bottleneck(config) => config.with_initializer(initializer).into(),
        }
    }

    /// Initialize a [`ResidualBlock`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> ResidualBlock<B> {
        match self {
            Self::Basic(config) => config.init(device).into(),
            Self::Bottleneck(config) => config.init(device).into(),
        }
    }
}

/// Residual block wrapper.
#[derive(Module, Debug)]
pub enum ResidualBlock<B: Backend> {
    /// A [`BasicBlock`].
    Basic(BasicBlock<B>),

    /// A [`BottleneckBlock`].
    Bottleneck(BottleneckBlock<B>),
}

impl<B: Backend> From<BasicBlock<B>> for ResidualBlock<B> {
    fn from(block: BasicBlock<B>) -> Self {
        Self::Basic(block)
    }
}

impl<B: Backend> From<BottleneckBlock<B>> for ResidualBlock<B> {
    fn from(block: BottleneckBlock<B>) -> Self {
        Self::Bottleneck(block)
    }
}

impl<B: Backend> ResidualBlockMeta for ResidualBlock<B> {
    fn in_planes(&self) -> usize {
        match self {
            Self::Basic(block) => block.in_planes(),
            Self::Bottleneck(block) => block.in_planes(),
        }
    }

    fn out_planes(&self) -> usize {
        match self {
            Self::Basic(block) => block.out_planes(),
            Self::Bottleneck(block) => block.out_planes(),
        }
    }

    fn stride(&self) -> usize {
        match self {
            Self::Basic(block) => block.stride(),
            Self::Bottleneck(block) => block.stride(),
        }
    }

    fn preact(&self) -> bool {
        match self {
            Self::Basic(block) => block.preact(),
            Self::Bottleneck(block) => block.preact(),
        }
    }

    fn has_projection(&self) -> bool {
        match self {
            Self::Basic(block) => block.projection.is_some(),
            Self::Bottleneck(block) => block.projection.is_some(),
        }
    }
}

impl<B: Backend> ResidualBlock<B> {
    /// Forward Pass.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        match self {
            Self::Basic(block) => block.forward(input),
            Self::Bottleneck(block) => block.forward(input),
        }
    }
}
