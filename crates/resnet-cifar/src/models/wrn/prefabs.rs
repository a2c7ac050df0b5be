//! # Wide `ResNet` Prefabs

use crate::models::wrn::WideResNetAbstractConfig;
use crate::prefabs::StaticPreFabConfig;

/// Static builder for [`WideResNetAbstractConfig`] prefabs.
pub type StaticWideResNetPreFab = StaticPreFabConfig<WideResNetAbstractConfig>;

/// `wrn-16-8`.
pub static WRN_16_8: StaticWideResNetPreFab = StaticWideResNetPreFab {
    name: "wrn-16-8",
    description: "Wide ResNet, depth 16, widening factor 8, CIFAR-10",
    builder: || {
        WideResNetAbstractConfig::new()
            .with_depth(16)
            .with_widening_factor(8)
    },
};

/// `wrn-28-10`.
pub static WRN_28_10: StaticWideResNetPreFab = StaticWideResNetPreFab {
    name: "wrn-28-10",
    description: "Wide ResNet, depth 28, widening factor 10, CIFAR-10",
    builder: || {
        WideResNetAbstractConfig::new()
            .with_depth(28)
            .with_widening_factor(10)
    },
};

/// `wrn-40-4`.
pub static WRN_40_4: StaticWideResNetPreFab = StaticWideResNetPreFab {
    name: "wrn-40-4",
    description: "Wide ResNet, depth 40, widening factor 4, CIFAR-10",
    builder: || {
        WideResNetAbstractConfig::new()
            .with_depth(40)
            .with_widening_factor(4)
    },
};

/// Every `wrn` prefab.
pub static PREFABS: &[&StaticWideResNetPreFab] = &[&WRN_16_8, &WRN_28_10, &WRN_40_4];
