//! # Pre-Activation `ResNet`
//!
//! `resnet_preact` CIFAR networks; depth ``6n + 2`` with basic blocks,
//! ``9n + 2`` with bottleneck blocks.

pub mod model;
pub mod prefabs;

pub use model::*;
