//! # Weight Initialization Modes
//!
//! [`InitMode`] selects how every parameterized layer of a network is
//! initialized:
//!
//! | layer        | `kaiming_fan_in` / `kaiming_fan_out`  | `xavier`          |
//! |--------------|---------------------------------------|-------------------|
//! | `Conv2d`     | Kaiming normal, relu gain             | Xavier normal     |
//! | `BatchNorm`  | `gamma = 1`, `beta = 0`               | same              |
//! | `Linear`     | default weight, zero bias             | same              |

use crate::errors::ConfigError;
use burn::nn::{Initializer, Linear};
use burn::prelude::{Backend, Tensor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Weight initialization policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitMode {
    /// Kaiming normal, scaled by fan-in.
    KaimingFanIn,

    /// Kaiming normal, scaled by fan-out.
    #[default]
    KaimingFanOut,

    /// Xavier (Glorot) normal.
    Xavier,
}

impl InitMode {
    /// All modes, in declaration order.
    pub const ALL: [InitMode; 3] = [Self::KaimingFanIn, Self::KaimingFanOut, Self::Xavier];

    /// The config-file name of the mode.
    pub fn name(&self) -> &'static str {
        match self {
            Self::KaimingFanIn => "kaiming_fan_in",
            Self::KaimingFanOut => "kaiming_fan_out",
            Self::Xavier => "xavier",
        }
    }

    /// The [`Initializer`] for `Conv2d` weights feeding a relu.
    pub fn conv_initializer(&self) -> Initializer {
        match self {
            Self::KaimingFanIn => Initializer::KaimingNormal {
                gain: std::f64::consts::SQRT_2,
                fan_out_only: false,
            },
            Self::KaimingFanOut => Initializer::KaimingNormal {
                gain: std::f64::consts::SQRT_2,
                fan_out_only: true,
            },
            Self::Xavier => Initializer::XavierNormal { gain: 1.0 },
        }
    }
}

impl fmt::Display for InitMode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for InitMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.name() == s)
            .ok_or_else(|| ConfigError::UnknownInitMode(s.to_string()))
    }
}

/// Zero the bias of a classifier layer.
///
/// The weight keeps the `LinearConfig` default.
pub fn zero_linear_bias<B: Backend>(mut linear: Linear<B>) -> Linear<B> {
    linear.bias = linear
        .bias
        .map(|bias| bias.map(|tensor: Tensor<B, 1>| tensor.zeros_like()));
    linear
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::nn::LinearConfig;

    #[test]
    fn test_parse_and_display() {
        for mode in InitMode::ALL {
            assert_eq!(mode.to_string().parse::<InitMode>(), Ok(mode));
        }
        assert_eq!(
            "orthogonal".parse::<InitMode>(),
            Err(ConfigError::UnknownInitMode("orthogonal".to_string()))
        );
        assert_eq!(InitMode::default(), InitMode::KaimingFanOut);
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&InitMode::KaimingFanIn).unwrap();
        assert_eq!(json, "\"kaiming_fan_in\"");
        let mode: InitMode = serde_json::from_str("\"xavier\"").unwrap();
        assert_eq!(mode, InitMode::Xavier);
    }

    #[test]
    fn test_conv_initializer() {
        assert!(matches!(
            InitMode::KaimingFanOut.conv_initializer(),
            Initializer::KaimingNormal {
                fan_out_only: true,
                ..
            }
        ));
        assert!(matches!(
            InitMode::KaimingFanIn.conv_initializer(),
            Initializer::KaimingNormal {
                fan_out_only: false,
                ..
            }
        ));
        assert!(matches!(
            InitMode::Xavier.conv_initializer(),
            Initializer::XavierNormal { .. }
        ));
    }

    #[test]
    fn test_zero_linear_bias() {
        type B = NdArray<f32>;
        let device = Default::default();

        let linear = LinearConfig::new(8, 3)
            .with_initializer(Initializer::Constant { value: 0.5 })
            .init::<B>(&device);
        let linear = zero_linear_bias(linear);

        let bias = linear.bias.as_ref().unwrap().val();
        bias.to_data()
            .assert_eq(&Tensor::<B, 1>::zeros([3], &device).to_data(), true);

        // The weight is untouched.
        let weight_sum: f32 = linear.weight.val().sum().into_scalar();
        assert_eq!(weight_sum, 0.5 * 8.0 * 3.0);
    }
}
