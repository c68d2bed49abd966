pub mod labeling;
pub mod predictor;
pub mod xgboost_predictor;

pub use predictor::{Prediction, SignalClassifier};
pub use xgboost_predictor::XgboostClassifier;
