//! # `NormAct2d` - norm/activation block.
//!
//! A [`NormAct2d`] module is:
//! * a [`BatchNorm`] layer,
//! * an optional [`Relu`] layer.
//!
//! This is the pre-activation unit placed in front of each convolution of
//! the residual blocks, and at the head of the networks.

use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::module::Module;
use burn::nn::{BatchNorm, BatchNormConfig, Relu};
use burn::prelude::{Backend, Tensor};

/// [`NormAct2d`] Meta.
pub trait NormAct2dMeta {
    /// Number of input (and output) channels.
    fn num_features(&self) -> usize;

    /// Is the activation applied?
    fn has_act(&self) -> bool;
}

/// [`NormAct2d`] Config.
///
/// Implements [`NormAct2dMeta`].
#[derive(Config, Debug)]
pub struct NormAct2dConfig {
    /// Number of channels.
    pub num_features: usize,

    /// Apply a relu after the norm.
    #[config(default = true)]
    pub act: bool,
}

impl NormAct2dMeta for NormAct2dConfig {
    fn num_features(&self) -> usize {
        self.num_features
    }

    fn has_act(&self) -> bool {
        self.act
    }
}

impl NormAct2dConfig {
    /// Initialize a [`NormAct2d`].
    ///
    /// The norm starts at ``gamma = 1, beta = 0``.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> NormAct2d<B> {
        NormAct2d {
            norm: BatchNormConfig::new(self.num_features).init(device),
            act: if self.act { Some(Relu::new()) } else { None },
        }
    }
}

/// Sequenced norm/activation block.
///
/// Implements [`NormAct2dMeta`].
#[derive(Module, Debug)]
pub struct NormAct2d<B: Backend> {
    /// Internal norm layer.
    pub norm: BatchNorm<B, 2>,

    /// Optional activation layer.
    pub act: Option<Relu>,
}

impl<B: Backend> NormAct2dMeta for NormAct2d<B> {
    fn num_features(&self) -> usize {
        self.norm.gamma.shape().dims[0]
    }

    fn has_act(&self) -> bool {
        self.act.is_some()
    }
}

impl<B: Backend> NormAct2d<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, num_features, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, num_features, height, width]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch, height, width] = unpack_shape_contract!(
            ["batch", "num_features", "height", "width"],
            &input,
            &["batch", "height", "width"],
            &[("num_features", self.num_features())]
        );

        let x = self.norm.forward(input);
        let x = match &self.act {
            Some(act) => act.forward(x),
            None => x,
        };

        assert_shape_contract_periodically!(
            ["batch", "num_features", "height", "width"],
            &x,
            &[
                ("batch", batch),
                ("num_features", self.num_features()),
                ("height", height),
                ("width", width)
            ]
        );

        x
    }
}
