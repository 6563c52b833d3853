use tch::{kind::Kind, CModule, Device, Tensor};

use crate::classifier::BinaryClassifier;
use crate::error::{InferenceError, StartupError};

/// TorchScript classifier. The module takes `[1, in_dim]` and returns either
/// `[1, 2]` class logits or a single `[1, 1]` class-1 logit.
pub struct TorchClassifier {
    model: CModule,
    device: Device,
    in_dim: usize,
    n_out: i64,
}

impl TorchClassifier {
    pub fn load(model_path: &str, in_dim: usize) -> Result<Self, StartupError> {
        let device = Device::Cpu;
        let model = CModule::load_on_device(model_path, device).map_err(|source| {
            StartupError::Torch {
                path: model_path.to_string(),
                source,
            }
        })?;

        // Check output shape with a dummy forward
        let dummy = Tensor::zeros([1, in_dim as i64], (Kind::Float, device));
        let t = model.forward_ts(&[dummy]).map_err(InferenceError::from)?;
        let sz = t.size();
        if sz.len() != 2 || sz[0] != 1 || !(sz[1] == 1 || sz[1] == 2) {
            return Err(StartupError::invalid(
                "classifier",
                format!("unexpected TorchScript output size: {:?}", sz),
            ));
        }

        Ok(Self {
            model,
            device,
            in_dim,
            n_out: sz[1],
        })
    }
}

impl BinaryClassifier for TorchClassifier {
    fn n_features(&self) -> usize {
        self.in_dim
    }

    fn predict_proba(&self, x: &[f64]) -> Result<[f64; 2], InferenceError> {
        if x.len() != self.in_dim {
            return Err(InferenceError::DimensionMismatch {
                got: x.len(),
                expected: self.in_dim,
            });
        }
        let row: Vec<f32> = x.iter().map(|v| *v as f32).collect();
        let input = Tensor::from_slice(&row)
            .reshape([1, self.in_dim as i64])
            .to_device(self.device);

        let t = self.model.forward_ts(&[input])?;
        let p1 = if self.n_out == 2 {
            t.softmax(-1, Kind::Double).double_value(&[0, 1])
        } else {
            t.sigmoid().double_value(&[0, 0])
        };
        if !(0.0..=1.0).contains(&p1) {
            return Err(InferenceError::BadOutput(format!("probability {}", p1)));
        }
        Ok([1.0 - p1, p1])
    }
}
