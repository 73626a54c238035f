//! Code for loading and running the trained TorchScript classifier

use crate::preprocess::InputTensor;
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fmt::Debug;
use std::path::Path;
use tch::{no_grad, Device, Kind, Tensor};
use tracing::info;

/// Anything that scores an `InputTensor` against a fixed, ordered set of
/// classes. Implementations are shared read-only across all requests
pub trait Classifier: Debug + Send + Sync {
    /// One score per class, in the model's output order
    fn scores(&self, input: &InputTensor) -> Result<Vec<f32>>;

    /// Number of classes the model scores, found by running it once on an
    /// all-zero input
    fn output_width(&self) -> Result<usize> {
        Ok(self.scores(&InputTensor::zeros())?.len())
    }
}

/// How the NHWC `InputTensor` is laid out when handed to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TensorLayout {
    /// `(1, 224, 224, 3)`, as exported from Keras
    ChannelsLast,

    /// `(1, 3, 224, 224)`, as exported from PyTorch
    ChannelsFirst,
}

/// A loaded TorchScript model
#[derive(Debug)]
pub struct TorchModel {
    /// The loaded torch model
    model: tch::CModule,

    layout: TensorLayout,
}

impl TorchModel {
    /// Load a TorchScript file onto the CPU
    pub fn new(filename: impl AsRef<Path>, layout: TensorLayout) -> Result<Self> {
        let filename = filename.as_ref();
        let mut model = tch::CModule::load_on_device(filename, Device::Cpu)
            .with_context(|| format!("failed to load model {}", filename.display()))?;
        model.set_eval();

        info!("loaded model {} ({layout:?})", filename.display());
        Ok(TorchModel { model, layout })
    }

    fn to_tensor(&self, input: &InputTensor) -> Tensor {
        let shape = input.shape().map(|d| d as i64);
        let tensor = Tensor::from_slice(input.as_slice()).view(shape);
        match self.layout {
            TensorLayout::ChannelsLast => tensor,
            TensorLayout::ChannelsFirst => tensor.permute([0, 3, 1, 2]).contiguous(),
        }
    }
}

impl Classifier for TorchModel {
    fn scores(&self, input: &InputTensor) -> Result<Vec<f32>> {
        let tensor = self.to_tensor(input);
        let output = no_grad(|| self.model.forward_ts(&[tensor]))?;

        let size = output.size();
        if size.first() != Some(&1) {
            return Err(anyhow!("expected a batch of one prediction, got shape {size:?}"));
        }

        let scores = output
            .to_device(Device::Cpu)
            .to_kind(Kind::Float)
            .flatten(0, -1);
        Ok(Vec::<f32>::try_from(scores)?)
    }
}
