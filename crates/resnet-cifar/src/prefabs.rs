//! # Config Prefabs for Well-Known Model Configurations
//!
//! Each family publishes a table of [`StaticPreFabConfig`]s over its own
//! abstract config; [`lookup_prefab`] resolves a name across every family
//! into a [`PreFab`] carrying a [`CifarModelConfig`].

use crate::errors::{ConfigError, ConfigResult};
use crate::models::family::CifarModelConfig;
use crate::models::{resnet_preact, wrn};

/// A named family config, built on demand.
pub struct StaticPreFabConfig<C> {
    /// Registry name, e.g. ``wrn-28-10``.
    pub name: &'static str,

    /// One-line summary.
    pub description: &'static str,

    /// Builds the config.
    pub builder: fn() -> C,
}

impl<C: Into<CifarModelConfig>> StaticPreFabConfig<C> {
    /// Build the family config.
    pub fn new_config(&self) -> C {
        (self.builder)()
    }

    /// Registry entry for this prefab.
    pub fn to_prefab(&self) -> PreFab {
        PreFab {
            name: self.name,
            description: self.description,
            config: self.new_config().into(),
        }
    }
}

/// A registry entry: a prefab resolved to a [`CifarModelConfig`].
#[derive(Debug, Clone)]
pub struct PreFab {
    /// Registry name.
    pub name: &'static str,

    /// One-line summary.
    pub description: &'static str,

    /// The selected family and its config.
    pub config: CifarModelConfig,
}

impl PreFab {
    /// A fresh copy of the config.
    pub fn new_config(&self) -> CifarModelConfig {
        self.config.clone()
    }
}

/// Every registered prefab, across families.
pub fn all_prefabs() -> Vec<PreFab> {
    let preact = resnet_preact::prefabs::PREFABS
        .iter()
        .map(|p| p.to_prefab());
    let wide = wrn::prefabs::PREFABS
        .iter()
        .map(|p| p.to_prefab());
    preact.chain(wide).collect()
}

/// Names of every registered prefab.
pub fn prefab_names() -> Vec<&'static str> {
    resnet_preact::prefabs::PREFABS
        .iter()
        .map(|p| p.name)
        .chain(wrn::prefabs::PREFABS.iter().map(|p| p.name))
        .collect()
}

/// Look up a prefab by name.
pub fn lookup_prefab(name: &str) -> ConfigResult<PreFab> {
    all_prefabs()
        .into_iter()
        .find(|p| p.name == name)
        .ok_or_else(|| ConfigError::UnknownPrefab {
            name: name.to_string(),
            available: prefab_names(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::residual::residual_block::BlockType;
    use std::collections::HashSet;

    #[test]
    fn test_names_unique() {
        let names = prefab_names();
        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(names.len(), unique.len());
        assert!(names.contains(&"resnet_preact-110"));
        assert!(names.contains(&"wrn-28-10"));
    }

    #[test]
    fn test_every_prefab_has_valid_structure() {
        for prefab in all_prefabs() {
            let structure = prefab.new_config().to_structure();
            assert!(structure.is_ok(), "{}: {:?}", prefab.name, structure);
            assert!(structure.unwrap().try_validate().is_ok());
        }
    }

    #[test]
    fn test_lookup() {
        let prefab = lookup_prefab("resnet_preact-164").unwrap();
        match prefab.new_config() {
            CifarModelConfig::ResNetPreAct(config) => {
                assert_eq!(config.depth, 164);
                assert_eq!(config.block_type, BlockType::Bottleneck);
            }
            other => panic!("unexpected config: {other:?}"),
        }

        let prefab = lookup_prefab("wrn-40-4").unwrap();
        match prefab.new_config() {
            CifarModelConfig::WideResNet(config) => {
                assert_eq!(config.depth, 40);
                assert_eq!(config.widening_factor, 4);
            }
            other => panic!("unexpected config: {other:?}"),
        }
    }

    #[test]
    fn test_lookup_unknown() {
        match lookup_prefab("resnet_preact-19") {
            Err(ConfigError::UnknownPrefab { name, available }) => {
                assert_eq!(name, "resnet_preact-19");
                assert_eq!(available, prefab_names());
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_static_prefab() {
        let prefab = &wrn::prefabs::WRN_16_8;
        assert_eq!(prefab.new_config().widening_factor, 8);

        let entry = prefab.to_prefab();
        assert_eq!(entry.name, "wrn-16-8");
        assert_eq!(entry.config.family(), "wrn");
        assert!(format!("{entry:?}").contains("widening_factor: 8"));
    }
}
