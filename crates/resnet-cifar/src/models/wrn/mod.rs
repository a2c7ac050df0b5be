//! # Wide `ResNet`
//!
//! `wrn` CIFAR networks; depth ``6n + 4``, widening factor `k`.

pub mod model;
pub mod prefabs;

pub use model::*;
