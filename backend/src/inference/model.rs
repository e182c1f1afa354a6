use image::RgbImage;
use ndarray::Array4;
use std::path::Path;
use std::sync::Arc;

use crate::inference::preprocess::preprocess;

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Model not available")]
    Unavailable,
    #[cfg_attr(not(any(feature = "torch", test)), allow(dead_code))]
    #[error("Model error: {0}")]
    Model(String),
    #[error("Classifier returned an empty distribution")]
    EmptyOutput,
    #[error("Classifier returned class {index} but only {known} classes are known")]
    UnknownClass { index: usize, known: usize },
}

/// A loaded image classifier: one preprocessed batch in, one probability per class out.
pub trait Classifier: Send + Sync {
    fn classify(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError>;
}

/// Process-wide classifier handle. Loaded once at startup, never reloaded.
#[derive(Clone)]
pub struct Model {
    classifier: Option<Arc<dyn Classifier>>,
}

impl Model {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self {
            classifier: Some(classifier),
        }
    }

    pub fn unavailable() -> Self {
        Self { classifier: None }
    }

    /// Loads the TorchScript model, falling back to an unavailable handle on failure.
    pub fn load(model_path: &Path, apply_softmax: bool) -> Self {
        #[cfg(feature = "torch")]
        {
            match torch::TorchClassifier::load(model_path, apply_softmax) {
                Ok(classifier) => {
                    log::info!("Model loaded from {}", model_path.display());
                    Self::new(Arc::new(classifier))
                }
                Err(e) => {
                    log::error!("Error loading model {}: {}", model_path.display(), e);
                    Self::unavailable()
                }
            }
        }

        #[cfg(not(feature = "torch"))]
        {
            let _ = apply_softmax;
            log::error!(
                "Built without the `torch` feature, {} was not loaded; predictions are unavailable",
                model_path.display()
            );
            Self::unavailable()
        }
    }

    pub fn is_available(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn inference(&self, image: &RgbImage) -> Result<Vec<f32>, InferenceError> {
        let classifier = self.classifier.as_ref().ok_or(InferenceError::Unavailable)?;
        let tensor = preprocess(image);
        classifier.classify(&tensor)
    }
}

#[cfg(feature = "torch")]
mod torch {
    use super::{Classifier, InferenceError};
    use ndarray::Array4;
    use std::path::Path;
    use std::sync::Mutex;
    use tch::{CModule, Device, Kind, Tensor};

    pub struct TorchClassifier {
        module: Mutex<CModule>,
        device: Device,
        apply_softmax: bool,
    }

    impl TorchClassifier {
        pub fn load(model_path: &Path, apply_softmax: bool) -> Result<Self, tch::TchError> {
            let device = Device::cuda_if_available();
            let mut module = CModule::load_on_device(model_path, device)?;
            module.set_eval();
            Ok(Self {
                module: Mutex::new(module),
                device,
                apply_softmax,
            })
        }
    }

    impl Classifier for TorchClassifier {
        fn classify(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
            let shape: Vec<i64> = input.shape().iter().map(|d| *d as i64).collect();
            let data = input
                .as_slice()
                .ok_or_else(|| InferenceError::Model("input tensor is not contiguous".into()))?;
            let tensor = Tensor::from_slice(data)
                .view(shape.as_slice())
                .to_device(self.device);

            let module = self
                .module
                .lock()
                .map_err(|_| InferenceError::Model("model lock poisoned".into()))?;
            let output = tch::no_grad(|| module.forward_ts(&[tensor]))
                .map_err(|e| InferenceError::Model(e.to_string()))?;
            drop(module);

            let output = if self.apply_softmax {
                output.softmax(-1, Kind::Float)
            } else {
                output
            };
            let output_flat = output.to_kind(Kind::Float).to_device(Device::Cpu).view([-1]);
            let num_elements = output_flat.size()[0] as usize;
            let mut output_vec = vec![0.0f32; num_elements];
            output_flat.copy_data(&mut output_vec, num_elements);
            Ok(output_vec)
        }
    }
}
