use crate::domain::errors::ModelError;

/// Classifier output for one feature vector
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Index of the most probable class
    pub label: usize,
    /// Probability of `label`
    pub confidence: f64,
    pub probabilities: Vec<f64>,
}

impl Prediction {
    /// Picks the most probable class. Ties resolve to the lowest label.
    pub fn from_probabilities(probabilities: Vec<f64>) -> Option<Self> {
        let (label, confidence) = probabilities
            .iter()
            .copied()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (i, p)| match best {
                Some((_, bp)) if bp >= p => best,
                _ => Some((i, p)),
            })?;

        Some(Self {
            label,
            confidence,
            probabilities,
        })
    }
}

/// Interface for direction classifiers
pub trait SignalClassifier: Send + Sync {
    /// Width of the input vector the model was trained on
    fn num_features(&self) -> usize;

    /// Column names stored with the model, when the trainer recorded them
    fn feature_names(&self) -> Option<&[String]> {
        None
    }

    /// Probability per class label
    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>, ModelError>;

    fn predict(&self, features: &[f64]) -> Result<Prediction, ModelError> {
        let probabilities = self.predict_proba(features)?;
        Prediction::from_probabilities(probabilities)
            .ok_or_else(|| ModelError::Parse("model produced no class probabilities".to_string()))
    }

    /// Get model name/type
    fn name(&self) -> &str;

    /// Get model version/id
    fn version(&self) -> &str;
}
