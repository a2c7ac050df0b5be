//! # Pre-Activation `ResNet` Prefabs

use crate::models::residual::residual_block::BlockType;
use crate::models::resnet_preact::PreActResNetAbstractConfig;
use crate::prefabs::StaticPreFabConfig;

/// Static builder for [`PreActResNetAbstractConfig`] prefabs.
pub type StaticPreActResNetPreFab = StaticPreFabConfig<PreActResNetAbstractConfig>;

/// `resnet_preact-20`; 3 basic blocks per stage.
pub static RESNET_PREACT_20: StaticPreActResNetPreFab = StaticPreActResNetPreFab {
    name: "resnet_preact-20",
    description: "Pre-activation ResNet-20, basic blocks, CIFAR-10",
    builder: || PreActResNetAbstractConfig::new().with_depth(20),
};

/// `resnet_preact-56`; 9 basic blocks per stage.
pub static RESNET_PREACT_56: StaticPreActResNetPreFab = StaticPreActResNetPreFab {
    name: "resnet_preact-56",
    description: "Pre-activation ResNet-56, basic blocks, CIFAR-10",
    builder: || PreActResNetAbstractConfig::new().with_depth(56),
};

/// `resnet_preact-110`; 18 basic blocks per stage.
pub static RESNET_PREACT_110: StaticPreActResNetPreFab = StaticPreActResNetPreFab {
    name: "resnet_preact-110",
    description: "Pre-activation ResNet-110, basic blocks, CIFAR-10",
    builder: || PreActResNetAbstractConfig::new().with_depth(110),
};

/// `resnet_preact-164`; 18 bottleneck blocks per stage.
pub static RESNET_PREACT_164: StaticPreActResNetPreFab = StaticPreActResNetPreFab {
    name: "resnet_preact-164",
    description: "Pre-activation ResNet-164, bottleneck blocks, CIFAR-10",
    builder: || {
        PreActResNetAbstractConfig::new()
            .with_depth(164)
            .with_block_type(BlockType::Bottleneck)
    },
};

/// Every `resnet_preact` prefab.
pub static PREFABS: &[&StaticPreActResNetPreFab] = &[
    &RESNET_PREACT_20,
    &RESNET_PREACT_56,
    &RESNET_PREACT_110,
    &RESNET_PREACT_164,
];
