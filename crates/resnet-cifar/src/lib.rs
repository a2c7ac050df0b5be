#![warn(missing_docs)]
//!# resnet-cifar - Residual CIFAR Classifiers for Burn
//!
//! Pre-activation `ResNet` and Wide `ResNet` families for 32x32 image
//! classification, built from depth-derived configs.
//!
//! ## Notable Components
//!
//! * [`compat`] - shape arithmetic for ``burn`` convs.
//! * [`errors`] - [`errors::ConfigError`], the configuration error type.
//! * [`layers`] - reusable neural network modules.
//!   * [`layers::blocks::norm_act`] - ``BatchNorm2d + ReLU`` block.
//!   * [`layers::init`] - weight initialization schemes.
//! * [`models`] - complete model families.
//!   * [`models::residual`] - blocks, stages and the network assembler.
//!   * [`models::resnet_preact`] - pre-activation `ResNet`.
//!   * [`models::wrn`] - wide `ResNet`.
//!   * [`models::family`] - either family, by config.
//! * [`prefabs`] - named well-known configs.
//!
//! ## Example
//!
//! ```rust,no_run
//! use burn::backend::NdArray;
//! use resnet_cifar::models::resnet_preact::PreActResNetAbstractConfig;
//!
//! let device = Default::default();
//! let network = PreActResNetAbstractConfig::new()
//!     .with_depth(20)
//!     .try_init::<NdArray<f32>>(&device)
//!     .unwrap();
//! assert_eq!(network.feature_size(), 64);
//! ```

/// Test-only macro import.
#[cfg(test)]
#[allow(unused_imports)]
#[macro_use]
extern crate hamcrest;

pub mod compat;
pub mod errors;
pub mod layers;
pub mod models;
pub mod prefabs;
pub mod utility;
