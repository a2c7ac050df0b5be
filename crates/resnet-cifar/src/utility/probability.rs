//! # Probability Checks

use crate::errors::{ConfigError, ConfigResult};

/// Check that `value` is a usable drop probability, ``0 <= value < 1``.
pub fn try_probability(
    name: &'static str,
    value: f64,
) -> ConfigResult<f64> {
    if (0.0..1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::InvalidProbability { name, value })
    }
}
