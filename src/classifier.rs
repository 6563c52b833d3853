//! Binary classifiers that can be loaded from exported artifacts.

use serde::Deserialize;

use crate::error::{InferenceError, StartupError};

/// A pre-fitted two-class model. Implementations are immutable after load
/// and shared across request tasks.
pub trait BinaryClassifier: Send + Sync {
    fn n_features(&self) -> usize;

    /// `[P(class 0), P(class 1)]` for one already-scaled row.
    fn predict_proba(&self, x: &[f64]) -> Result<[f64; 2], InferenceError>;

    /// Most probable class; ties go to class 0.
    fn predict(&self, x: &[f64]) -> Result<u8, InferenceError> {
        let p = self.predict_proba(x)?;
        Ok(label_of(&p))
    }
}

pub fn label_of(p: &[f64; 2]) -> u8 {
    if p[1] > p[0] {
        1
    } else {
        0
    }
}

fn check_dim(x: &[f64], expected: usize) -> Result<(), InferenceError> {
    if x.len() != expected {
        return Err(InferenceError::DimensionMismatch {
            got: x.len(),
            expected,
        });
    }
    Ok(())
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogisticRegression {
    pub coef: Vec<f64>,
    pub intercept: f64,
}

impl BinaryClassifier for LogisticRegression {
    fn n_features(&self) -> usize {
        self.coef.len()
    }

    fn predict_proba(&self, x: &[f64]) -> Result<[f64; 2], InferenceError> {
        check_dim(x, self.coef.len())?;
        let z: f64 = self.intercept + self.coef.iter().zip(x).map(|(w, v)| w * v).sum::<f64>();
        let p1 = sigmoid(z);
        Ok([1.0 - p1, p1])
    }
}

/// One fitted tree in the array layout of `sklearn.tree._tree.Tree`.
/// A node is a leaf when its left child is -1.
#[derive(Debug, Clone, Deserialize)]
pub struct Tree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    /// Per-node class counts (or fractions) for classes 0 and 1.
    pub value: Vec<[f64; 2]>,
}

impl Tree {
    fn check(&self, n_features: usize) -> Result<(), String> {
        let n = self.children_left.len();
        if n == 0 {
            return Err("tree has no nodes".into());
        }
        if [
            self.children_right.len(),
            self.feature.len(),
            self.threshold.len(),
            self.value.len(),
        ]
        .iter()
        .any(|&len| len != n)
        {
            return Err("tree arrays differ in length".into());
        }
        for i in 0..n {
            let (l, r) = (self.children_left[i], self.children_right[i]);
            if l == -1 {
                let [c0, c1] = self.value[i];
                if !(c0 >= 0.0 && c1 >= 0.0 && c0 + c1 > 0.0) {
                    return Err(format!("leaf {} has no class mass", i));
                }
                continue;
            }
            // Children are stored after their parent; this also rules out cycles.
            for child in [l, r] {
                if child <= i as i64 || child >= n as i64 {
                    return Err(format!("node {} has child {} out of range", i, child));
                }
            }
            let f = self.feature[i];
            if f < 0 || f as usize >= n_features {
                return Err(format!("node {} splits on feature {}", i, f));
            }
            if !self.threshold[i].is_finite() {
                return Err(format!("node {} has a non-finite threshold", i));
            }
        }
        Ok(())
    }

    fn leaf_distribution(&self, x: &[f64]) -> [f64; 2] {
        let mut node = 0usize;
        while self.children_left[node] != -1 {
            let f = self.feature[node] as usize;
            node = if x[f] <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        let [c0, c1] = self.value[node];
        let total = c0 + c1;
        [c0 / total, c1 / total]
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RandomForest {
    pub n_features: usize,
    pub trees: Vec<Tree>,
}

impl BinaryClassifier for RandomForest {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, x: &[f64]) -> Result<[f64; 2], InferenceError> {
        check_dim(x, self.n_features)?;
        let mut acc = [0.0f64; 2];
        for tree in &self.trees {
            let [p0, p1] = tree.leaf_distribution(x);
            acc[0] += p0;
            acc[1] += p1;
        }
        let n = self.trees.len() as f64;
        Ok([acc[0] / n, acc[1] / n])
    }
}

/// On-disk classifier description, tagged by `kind`.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierArtifact {
    Logistic(LogisticRegression),
    RandomForest(RandomForest),
    /// TorchScript module on disk; needs the `torch` feature.
    Torchscript { path: String, n_features: usize },
}

impl ClassifierArtifact {
    pub fn build(self) -> Result<Box<dyn BinaryClassifier>, StartupError> {
        match self {
            ClassifierArtifact::Logistic(lr) => {
                if lr.coef.is_empty() {
                    return Err(StartupError::invalid("classifier", "logistic coef is empty"));
                }
                if !lr.intercept.is_finite() || lr.coef.iter().any(|w| !w.is_finite()) {
                    return Err(StartupError::invalid("classifier", "non-finite logistic weight"));
                }
                Ok(Box::new(lr))
            }
            ClassifierArtifact::RandomForest(rf) => {
                if rf.trees.is_empty() {
                    return Err(StartupError::invalid("classifier", "forest has no trees"));
                }
                for (i, tree) in rf.trees.iter().enumerate() {
                    tree.check(rf.n_features)
                        .map_err(|reason| StartupError::invalid("classifier", format!("tree {}: {}", i, reason)))?;
                }
                Ok(Box::new(rf))
            }
            ClassifierArtifact::Torchscript { path, n_features } => {
                build_torch(path, n_features)
            }
        }
    }
}

#[cfg(feature = "torch")]
fn build_torch(path: String, n_features: usize) -> Result<Box<dyn BinaryClassifier>, StartupError> {
    Ok(Box::new(crate::torch::TorchClassifier::load(&path, n_features)?))
}

#[cfg(not(feature = "torch"))]
fn build_torch(path: String, _n_features: usize) -> Result<Box<dyn BinaryClassifier>, StartupError> {
    Err(StartupError::invalid(
        "classifier",
        format!("{} is a TorchScript model but this build lacks the `torch` feature", path),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    // x[0] <= 0.5 -> leaf (3 neg, 1 pos), else x[1] <= 0 -> (0, 2) / (4, 0)
    fn stump_tree() -> Tree {
        Tree {
            children_left: vec![1, -1, 3, -1, -1],
            children_right: vec![2, -1, 4, -1, -1],
            feature: vec![0, -2, 1, -2, -2],
            threshold: vec![0.5, -2.0, 0.0, -2.0, -2.0],
            value: vec![[7.0, 3.0], [3.0, 1.0], [4.0, 2.0], [0.0, 2.0], [4.0, 0.0]],
        }
    }

    #[test]
    fn tree_routes_left_on_less_or_equal() {
        let t = stump_tree();
        assert_eq!(t.leaf_distribution(&[0.5, 9.0]), [0.75, 0.25]);
        assert_eq!(t.leaf_distribution(&[0.6, 0.0]), [0.0, 1.0]);
        assert_eq!(t.leaf_distribution(&[0.6, 0.1]), [1.0, 0.0]);
    }

    #[test]
    fn forest_averages_tree_distributions() {
        let single_leaf = Tree {
            children_left: vec![-1],
            children_right: vec![-1],
            feature: vec![-2],
            threshold: vec![-2.0],
            value: vec![[1.0, 1.0]],
        };
        let rf = RandomForest {
            n_features: 2,
            trees: vec![stump_tree(), single_leaf],
        };
        let p = rf.predict_proba(&[0.6, 0.0]).unwrap();
        assert_eq!(p, [0.25, 0.75]);
        assert_eq!(rf.predict(&[0.6, 0.0]).unwrap(), 1);
        assert_eq!(rf.predict(&[0.6, 1.0]).unwrap(), 0);
    }

    #[test]
    fn logistic_is_sigmoid_of_margin() {
        let lr = LogisticRegression {
            coef: vec![1.0, -2.0],
            intercept: 0.5,
        };
        let p = lr.predict_proba(&[1.0, 0.75]).unwrap();
        assert!((p[1] - 0.5).abs() < 1e-12);
        // exact 0.5 is a tie and stays negative
        assert_eq!(lr.predict(&[1.0, 0.75]).unwrap(), 0);
        assert_eq!(lr.predict(&[3.0, 0.0]).unwrap(), 1);
        let far = lr.predict_proba(&[-800.0, 0.0]).unwrap();
        assert!(far[1] >= 0.0 && far[1] < 1e-300);
    }

    #[test]
    fn wrong_width_is_rejected() {
        let lr = LogisticRegression {
            coef: vec![1.0; 3],
            intercept: 0.0,
        };
        assert!(matches!(
            lr.predict_proba(&[1.0]),
            Err(InferenceError::DimensionMismatch { got: 1, expected: 3 })
        ));
    }

    #[test]
    fn artifact_kinds_deserialize() {
        let a: ClassifierArtifact =
            serde_json::from_str(r#"{"kind": "logistic", "coef": [0.1, 0.2], "intercept": -1.0}"#)
                .unwrap();
        assert_eq!(a.build().unwrap().n_features(), 2);

        let a: ClassifierArtifact = serde_json::from_str(
            r#"{"kind": "random_forest", "n_features": 1, "trees": [{
                "children_left": [-1], "children_right": [-1], "feature": [-2],
                "threshold": [-2.0], "value": [[2.0, 6.0]]}]}"#,
        )
        .unwrap();
        let clf = a.build().unwrap();
        assert_eq!(clf.predict_proba(&[123.0]).unwrap(), [0.25, 0.75]);
    }

    #[test]
    fn malformed_trees_fail_to_build() {
        let mut cyclic = stump_tree();
        cyclic.children_left[2] = 0;
        let rf = ClassifierArtifact::RandomForest(RandomForest {
            n_features: 2,
            trees: vec![cyclic],
        });
        assert!(rf.build().is_err());

        let rf = ClassifierArtifact::RandomForest(RandomForest {
            n_features: 1,
            trees: vec![stump_tree()],
        });
        assert!(rf.build().is_err(), "feature 1 is outside a 1-wide input");

        let rf = ClassifierArtifact::RandomForest(RandomForest {
            n_features: 2,
            trees: vec![],
        });
        assert!(rf.build().is_err());
    }

    #[cfg(not(feature = "torch"))]
    #[test]
    fn torchscript_needs_the_feature() {
        let a = ClassifierArtifact::Torchscript {
            path: "model.pt".into(),
            n_features: 11,
        };
        assert!(a.build().is_err());
    }
}
