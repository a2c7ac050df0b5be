//! Shape arithmetic helpers for `burn` layers.
pub mod conv_shape;
