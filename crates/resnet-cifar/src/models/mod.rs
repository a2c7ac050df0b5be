//! # Complete Model Families

pub mod family;
pub mod residual;
pub mod resnet_preact;
pub mod wrn;
