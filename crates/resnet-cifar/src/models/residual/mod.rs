//! # Residual Building Blocks
//!
//! Blocks, stages, and the network assembler shared by
//! [`crate::models::resnet_preact`] and [`crate::models::wrn`].

pub mod basic_block;
pub mod bottleneck_block;
pub mod depth;
pub mod network;
pub mod residual_block;
pub mod shortcut;
pub mod stage;
