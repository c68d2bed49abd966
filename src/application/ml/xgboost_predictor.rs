//! Gradient-boosted tree classifier loaded from XGBoost's JSON model format
//! (`Booster.save_model("model.json")`).
//!
//! Only inference is implemented. Supported objectives are `binary:logistic`,
//! `reg:logistic`, `multi:softprob` and `multi:softmax`; the latter two both
//! yield softmax probabilities.

use super::predictor::SignalClassifier;
use crate::domain::errors::ModelError;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use tracing::info;

#[derive(Debug, Deserialize)]
struct ModelDocument {
    learner: Learner,
    #[serde(default)]
    version: Vec<u32>,
}

#[derive(Debug, Deserialize)]
struct Learner {
    learner_model_param: LearnerModelParam,
    gradient_booster: GradientBooster,
    objective: Objective,
    #[serde(default)]
    feature_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LearnerModelParam {
    #[serde(deserialize_with = "number_like")]
    base_score: f64,
    #[serde(deserialize_with = "number_like")]
    num_class: f64,
    #[serde(deserialize_with = "number_like")]
    num_feature: f64,
}

#[derive(Debug, Deserialize)]
struct GradientBooster {
    name: String,
    model: Option<BoosterModel>,
}

#[derive(Debug, Deserialize)]
struct BoosterModel {
    trees: Vec<RawTree>,
    tree_info: Vec<usize>,
}

#[derive(Debug, Deserialize)]
struct Objective {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawTree {
    left_children: Vec<i64>,
    right_children: Vec<i64>,
    split_indices: Vec<usize>,
    split_conditions: Vec<f32>,
    #[serde(deserialize_with = "bool_like_vec")]
    default_left: Vec<bool>,
}

/// XGBoost writes scalars as strings (`"5E-1"`) and, since 2.0, sometimes as
/// bracketed strings (`"[5E-1]"`) or arrays.
fn number_like<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    fn parse(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s
                .trim()
                .trim_start_matches('[')
                .trim_end_matches(']')
                .split(',')
                .next()?
                .trim()
                .parse::<f64>()
                .ok(),
            Value::Array(items) => items.first().and_then(parse),
            _ => None,
        }
    }

    let value = Value::deserialize(deserializer)?;
    parse(&value).ok_or_else(|| de::Error::custom(format!("expected a number, got {}", value)))
}

fn bool_like_vec<'de, D>(deserializer: D) -> Result<Vec<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Vec::<Value>::deserialize(deserializer)?;
    values
        .iter()
        .map(|v| match v {
            Value::Bool(b) => Ok(*b),
            Value::Number(n) => Ok(n.as_f64().unwrap_or(0.0) != 0.0),
            other => Err(de::Error::custom(format!("expected a boolean, got {}", other))),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Sigmoid,
    Softmax,
}

#[derive(Debug, Clone)]
struct Node {
    /// `None` for leaves
    children: Option<(usize, usize)>,
    feature: usize,
    /// Split threshold for internal nodes, output value for leaves. XGBoost
    /// keeps both in single precision.
    value: f32,
    default_left: bool,
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
    group: usize,
}

impl Tree {
    fn from_raw(raw: RawTree, group: usize, num_feature: usize) -> Result<Self, ModelError> {
        let n = raw.left_children.len();
        if raw.right_children.len() != n
            || raw.split_indices.len() != n
            || raw.split_conditions.len() != n
            || raw.default_left.len() != n
        {
            return Err(ModelError::Parse(
                "tree arrays have inconsistent lengths".to_string(),
            ));
        }
        if n == 0 {
            return Err(ModelError::Parse("tree has no nodes".to_string()));
        }

        let mut nodes = Vec::with_capacity(n);
        for i in 0..n {
            let (left, right) = (raw.left_children[i], raw.right_children[i]);
            let children = if left < 0 {
                None
            } else {
                // Children always follow their parent, which also rules out cycles.
                let (l, r) = (left as usize, right as usize);
                if right < 0 || l <= i || r <= i || l >= n || r >= n {
                    return Err(ModelError::Parse(format!(
                        "node {} has invalid children ({}, {})",
                        i, left, right
                    )));
                }
                if raw.split_indices[i] >= num_feature {
                    return Err(ModelError::Parse(format!(
                        "node {} splits on feature {} but the model has {} features",
                        i, raw.split_indices[i], num_feature
                    )));
                }
                Some((l, r))
            };

            nodes.push(Node {
                children,
                feature: raw.split_indices[i],
                value: raw.split_conditions[i],
                default_left: raw.default_left[i],
            });
        }

        Ok(Self { nodes, group })
    }

    fn leaf_value(&self, features: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            let node = &self.nodes[idx];
            match node.children {
                None => return f64::from(node.value),
                Some((left, right)) => {
                    let x = features[node.feature];
                    // Inputs are compared in single precision, as XGBoost does
                    idx = if x.is_nan() {
                        if node.default_left { left } else { right }
                    } else if (x as f32) < node.value {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn logit(p: f64) -> f64 {
    let p = p.clamp(1e-15, 1.0 - 1e-15);
    (p / (1.0 - p)).ln()
}

fn softmax(margins: &[f64]) -> Vec<f64> {
    let max = margins.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = margins.iter().map(|m| (m - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

pub struct XgboostClassifier {
    trees: Vec<Tree>,
    num_feature: usize,
    num_groups: usize,
    base_margin: f64,
    link: Link,
    feature_names: Vec<String>,
    objective: String,
    version: String,
}

impl XgboostClassifier {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let model = Self::from_json(&raw)?;

        info!(
            "Loaded {} model from {:?}: {} trees, {} features, objective {}",
            model.name(),
            path,
            model.trees.len(),
            model.num_feature,
            model.objective
        );
        Ok(model)
    }

    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let doc: ModelDocument =
            serde_json::from_str(json).map_err(|e| ModelError::Parse(e.to_string()))?;
        let learner = doc.learner;

        let booster = match learner.gradient_booster.name.as_str() {
            "gbtree" => learner.gradient_booster.model.ok_or_else(|| {
                ModelError::Parse("gbtree booster has no model".to_string())
            })?,
            other => {
                return Err(ModelError::Parse(format!("unsupported booster: {}", other)));
            }
        };

        let num_feature = learner.learner_model_param.num_feature as usize;
        let num_class = learner.learner_model_param.num_class as usize;
        let base_score = learner.learner_model_param.base_score;

        let (link, num_groups, base_margin) = match learner.objective.name.as_str() {
            "binary:logistic" | "reg:logistic" => (Link::Sigmoid, 1, logit(base_score)),
            "multi:softprob" | "multi:softmax" => {
                if num_class < 2 {
                    return Err(ModelError::Parse(format!(
                        "multi-class objective with num_class = {}",
                        num_class
                    )));
                }
                (Link::Softmax, num_class, base_score)
            }
            other => return Err(ModelError::UnsupportedObjective(other.to_string())),
        };

        if num_feature == 0 {
            return Err(ModelError::Parse("model declares zero features".to_string()));
        }
        if booster.tree_info.len() != booster.trees.len() {
            return Err(ModelError::Parse(format!(
                "tree_info has {} entries for {} trees",
                booster.tree_info.len(),
                booster.trees.len()
            )));
        }
        if !learner.feature_names.is_empty() && learner.feature_names.len() != num_feature {
            return Err(ModelError::Parse(format!(
                "{} feature names for {} features",
                learner.feature_names.len(),
                num_feature
            )));
        }

        let trees = booster
            .trees
            .into_iter()
            .zip(booster.tree_info)
            .map(|(raw, group)| {
                if group >= num_groups {
                    return Err(ModelError::Parse(format!(
                        "tree assigned to class {} but the model has {} output groups",
                        group, num_groups
                    )));
                }
                Tree::from_raw(raw, group, num_feature)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let version = if doc.version.is_empty() {
            "unknown".to_string()
        } else {
            doc.version
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(".")
        };

        Ok(Self {
            trees,
            num_feature,
            num_groups,
            base_margin,
            link,
            feature_names: learner.feature_names,
            objective: learner.objective.name,
            version,
        })
    }

    /// Raw per-group margins (sum of leaf values plus the base margin)
    fn margins(&self, features: &[f64]) -> Vec<f64> {
        let mut margins = vec![self.base_margin; self.num_groups];
        for tree in &self.trees {
            margins[tree.group] += tree.leaf_value(features);
        }
        margins
    }
}

impl SignalClassifier for XgboostClassifier {
    fn num_features(&self) -> usize {
        self.num_feature
    }

    fn feature_names(&self) -> Option<&[String]> {
        if self.feature_names.is_empty() {
            None
        } else {
            Some(&self.feature_names)
        }
    }

    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>, ModelError> {
        if features.len() != self.num_feature {
            return Err(ModelError::FeatureWidthMismatch {
                expected: self.num_feature,
                actual: features.len(),
            });
        }

        let margins = self.margins(features);
        Ok(match self.link {
            Link::Sigmoid => {
                let p = sigmoid(margins[0]);
                vec![1.0 - p, p]
            }
            Link::Softmax => softmax(&margins),
        })
    }

    fn name(&self) -> &str {
        "XGBoost"
    }

    fn version(&self) -> &str {
        &self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BINARY_STUMP: &str = r#"{
        "learner": {
            "feature_names": ["rsi", "close"],
            "gradient_booster": {
                "name": "gbtree",
                "model": {
                    "tree_info": [0],
                    "trees": [{
                        "left_children": [1, -1, -1],
                        "right_children": [2, -1, -1],
                        "split_indices": [0, 0, 0],
                        "split_conditions": [50.0, -1.5, 1.5],
                        "default_left": [1, 0, 0]
                    }]
                }
            },
            "learner_model_param": {
                "base_score": "[5E-1]",
                "num_class": "0",
                "num_feature": "2"
            },
            "objective": { "name": "binary:logistic" }
        },
        "version": [2, 0, 3]
    }"#;

    const THREE_CLASS: &str = include_str!("../../../tests/fixtures/direction_model.json");

    #[test]
    fn test_binary_stump() {
        let model = XgboostClassifier::from_json(BINARY_STUMP).unwrap();
        assert_eq!(model.num_features(), 2);
        assert_eq!(model.version(), "2.0.3");
        assert_eq!(
            model.feature_names().unwrap(),
            &["rsi".to_string(), "close".to_string()]
        );

        let low = model.predict(&[30.0, 100.0]).unwrap();
        assert_eq!(low.label, 0);
        assert!((low.confidence - (1.0 - sigmoid(-1.5))).abs() < 1e-12);

        let high = model.predict(&[70.0, 100.0]).unwrap();
        assert_eq!(high.label, 1);
        assert!((high.confidence - sigmoid(1.5)).abs() < 1e-12);
    }

    #[test]
    fn test_split_goes_right_on_equality() {
        let model = XgboostClassifier::from_json(BINARY_STUMP).unwrap();
        let p = model.predict(&[50.0, 0.0]).unwrap();
        assert_eq!(p.label, 1);
    }

    #[test]
    fn test_split_compares_in_single_precision() {
        // XGBoost prints the f32 nearest to 0.1 as 1.00000001E-1
        let json = BINARY_STUMP.replace("[50.0, -1.5, 1.5]", "[1.00000001E-1, -1.5, 1.5]");
        let model = XgboostClassifier::from_json(&json).unwrap();

        assert_eq!(model.predict(&[0.1, 0.0]).unwrap().label, 1);
        assert_eq!(model.predict(&[0.0999999, 0.0]).unwrap().label, 0);
    }

    #[test]
    fn test_missing_value_follows_default_direction() {
        let model = XgboostClassifier::from_json(BINARY_STUMP).unwrap();
        let p = model.predict(&[f64::NAN, 0.0]).unwrap();
        assert_eq!(p.label, 0);
    }

    #[test]
    fn test_width_mismatch_is_rejected() {
        let model = XgboostClassifier::from_json(BINARY_STUMP).unwrap();
        let err = model.predict_proba(&[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(
            err,
            ModelError::FeatureWidthMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_multiclass_softmax() {
        let model = XgboostClassifier::from_json(THREE_CLASS).unwrap();
        assert_eq!(model.num_features(), 10);

        // rsi = 75, volatility low: long tree scores 2 + 1
        let mut x = vec![0.0; 10];
        x[0] = 75.0;
        x[7] = 0.001;
        let probs = model.predict_proba(&x).unwrap();
        assert_eq!(probs.len(), 3);
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-12);

        let expected = softmax(&[-1.0, 3.0, 0.5]);
        for (p, e) in probs.iter().zip(expected.iter()) {
            assert!((p - e).abs() < 1e-12);
        }

        // rsi = 50, volatility high: neutral class wins
        x[0] = 50.0;
        x[7] = 0.02;
        let p = model.predict(&x).unwrap();
        assert_eq!(p.label, 2);
    }

    #[test]
    fn test_rejects_unknown_objective() {
        let json = BINARY_STUMP.replace("binary:logistic", "reg:squarederror");
        assert!(matches!(
            XgboostClassifier::from_json(&json),
            Err(ModelError::UnsupportedObjective(_))
        ));
    }

    #[test]
    fn test_rejects_out_of_range_split_feature() {
        let json = BINARY_STUMP.replace(r#""split_indices": [0, 0, 0]"#, r#""split_indices": [5, 0, 0]"#);
        assert!(matches!(
            XgboostClassifier::from_json(&json),
            Err(ModelError::Parse(_))
        ));
    }

    #[test]
    fn test_rejects_backward_child_reference() {
        let json = BINARY_STUMP.replace(r#""left_children": [1, -1, -1]"#, r#""left_children": [0, -1, -1]"#);
        assert!(XgboostClassifier::from_json(&json).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = XgboostClassifier::load(Path::new("/nonexistent/model.json")).err().unwrap();
        assert!(matches!(err, ModelError::Io { .. }));
    }
}
