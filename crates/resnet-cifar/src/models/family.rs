//! # Model Family Selection
//!
//! [`CifarModelConfig`] wraps the abstract config of either family, so one
//! JSON file or prefab name can select the whole network.

use crate::errors::ConfigResult;
use crate::models::residual::network::{ResidualNetwork, ResidualNetworkConfig};
use crate::models::resnet_preact::{PreActResNetAbstractConfig, RESNET_PREACT_FAMILY};
use crate::models::wrn::{WRN_FAMILY, WideResNetAbstractConfig};
use burn::config::Config;
use burn::prelude::Backend;

/// Abstract config of either CIFAR family.
#[derive(Config, Debug)]
pub enum CifarModelConfig {
    /// A pre-activation `ResNet`.
    ResNetPreAct(PreActResNetAbstractConfig),

    /// A wide `ResNet`.
    WideResNet(WideResNetAbstractConfig),
}

impl From<PreActResNetAbstractConfig> for CifarModelConfig {
    fn from(config: PreActResNetAbstractConfig) -> Self {
        Self::ResNetPreAct(config)
    }
}

impl From<WideResNetAbstractConfig> for CifarModelConfig {
    fn from(config: WideResNetAbstractConfig) -> Self {
        Self::WideResNet(config)
    }
}

impl CifarModelConfig {
    /// The family name.
    pub fn family(&self) -> &'static str {
        match self {
            Self::ResNetPreAct(_) => RESNET_PREACT_FAMILY,
            Self::WideResNet(_) => WRN_FAMILY,
        }
    }

    /// Convert to a [`ResidualNetworkConfig`].
    pub fn to_structure(&self) -> ConfigResult<ResidualNetworkConfig> {
        match self {
            Self::ResNetPreAct(config) => config.to_structure(),
            Self::WideResNet(config) => config.to_structure(),
        }
    }

    /// Build the structure and initialize the network.
    pub fn try_init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ConfigResult<ResidualNetwork<B>> {
        self.to_structure()?.try_init(device)
    }
}
