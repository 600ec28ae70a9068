// src/classifier.rs - k-nearest-neighbour gesture classifier
use crate::error::{GameError, GameResult};
use nalgebra::{DMatrix, DVector};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub label: String,
    pub class_index: usize,
    /// Vote share of every label, in class order.
    pub confidences: Vec<(String, f64)>,
}

impl Classification {
    pub fn confidence(&self) -> f64 {
        self.confidences
            .get(self.class_index)
            .map(|(_, c)| *c)
            .unwrap_or(0.0)
    }
}

/// Stored examples are kept L2-normalised, one row per example, grouped by
/// class so that class `i` owns the rows `offsets[i]..offsets[i + 1]`.
#[derive(Debug)]
pub struct KnnClassifier {
    labels: Vec<String>,
    offsets: Vec<usize>,
    examples: DMatrix<f64>,
}

#[derive(Deserialize)]
struct SavedModel {
    dataset: HashMap<String, SavedClass>,
    tensors: Vec<Option<Value>>,
}

#[derive(Deserialize)]
struct SavedClass {
    #[serde(default)]
    label: Option<Value>,
    shape: Vec<usize>,
}

impl KnnClassifier {
    pub fn from_examples(classes: Vec<(String, Vec<Vec<f64>>)>) -> GameResult<Self> {
        let dimension = classes
            .iter()
            .flat_map(|(_, rows)| rows.first())
            .map(|row| row.len())
            .next()
            .ok_or(GameError::EmptyModel)?;

        let mut labels = Vec::with_capacity(classes.len());
        let mut offsets = vec![0];
        let mut data = Vec::new();
        for (label, rows) in classes {
            for row in &rows {
                if row.len() != dimension {
                    return Err(GameError::InvalidModel(format!(
                        "class {} has an example of length {}, expected {}",
                        label,
                        row.len(),
                        dimension
                    )));
                }
                data.extend(normalized(row));
            }
            offsets.push(offsets.last().copied().unwrap_or(0) + rows.len());
            labels.push(label);
        }

        let count = offsets.last().copied().unwrap_or(0);
        Ok(Self {
            labels,
            offsets,
            examples: DMatrix::from_row_slice(count, dimension, &data),
        })
    }

    /// Reads a model saved by the ml5 KNN classifier: a `dataset` of class
    /// shapes and labels keyed by class index, and a parallel `tensors` list
    /// holding each class's examples flattened row by row.
    pub fn from_json(raw: &str) -> GameResult<Self> {
        let saved: SavedModel =
            serde_json::from_str(raw).map_err(|e| GameError::InvalidModel(e.to_string()))?;

        let mut keys: Vec<(usize, String)> = saved
            .dataset
            .keys()
            .map(|key| {
                key.parse::<usize>()
                    .map(|index| (index, key.clone()))
                    .map_err(|_| GameError::InvalidModel(format!("class key {} is not an index", key)))
            })
            .collect::<GameResult<_>>()?;
        keys.sort();

        let mut classes = Vec::with_capacity(keys.len());
        for (index, key) in keys {
            let class = &saved.dataset[&key];
            let label = match &class.label {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => key.clone(),
            };
            let (rows, cols) = match class.shape.as_slice() {
                [rows, cols] => (*rows, *cols),
                other => {
                    return Err(GameError::InvalidModel(format!(
                        "class {} has shape {:?}, expected two dimensions",
                        label, other
                    )))
                }
            };
            let values = match saved.tensors.get(index) {
                Some(Some(tensor)) => tensor_values(tensor)?,
                _ => {
                    tracing::warn!("Class {} has no tensor data, skipping", label);
                    continue;
                }
            };
            if values.len() != rows * cols {
                return Err(GameError::InvalidModel(format!(
                    "class {} holds {} values, shape needs {}",
                    label,
                    values.len(),
                    rows * cols
                )));
            }
            let examples = values.chunks(cols.max(1)).map(|row| row.to_vec()).collect();
            classes.push((label, examples));
        }

        Self::from_examples(classes)
    }

    pub fn load(path: &Path) -> GameResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| GameError::ModelLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let classifier = Self::from_json(&raw).map_err(|e| GameError::ModelLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        tracing::info!(
            "Loaded {} examples over {} classes ({} features)",
            classifier.example_count(),
            classifier.labels().len(),
            classifier.dimension()
        );
        Ok(classifier)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn dimension(&self) -> usize {
        self.examples.ncols()
    }

    pub fn example_count(&self) -> usize {
        self.examples.nrows()
    }

    /// Cosine-similarity vote over the `k` closest examples. `k` is clamped
    /// to the number of stored examples; ties go to the lower class index.
    pub fn classify(&self, query: &[f64], k: usize) -> GameResult<Classification> {
        if self.example_count() == 0 {
            return Err(GameError::EmptyModel);
        }
        if query.len() != self.dimension() {
            return Err(GameError::DimensionMismatch {
                expected: self.dimension(),
                actual: query.len(),
            });
        }

        let query = DVector::from_vec(normalized(query));
        let similarities = &self.examples * query;

        let mut ranked: Vec<usize> = (0..similarities.len()).collect();
        ranked.sort_by(|&a, &b| similarities[b].total_cmp(&similarities[a]));

        let k = k.clamp(1, ranked.len());
        let mut votes = vec![0usize; self.labels.len()];
        for &row in &ranked[..k] {
            if let Some(class) = self.class_of(row) {
                votes[class] += 1;
            }
        }

        let mut class_index = 0;
        for (class, &count) in votes.iter().enumerate() {
            if count > votes[class_index] {
                class_index = class;
            }
        }

        let confidences = self
            .labels
            .iter()
            .zip(&votes)
            .map(|(label, &count)| (label.clone(), count as f64 / k as f64))
            .collect();

        Ok(Classification {
            label: self.labels[class_index].clone(),
            class_index,
            confidences,
        })
    }

    fn class_of(&self, row: usize) -> Option<usize> {
        self.offsets.windows(2).position(|w| row >= w[0] && row < w[1])
    }
}

fn normalized(row: &[f64]) -> Vec<f64> {
    let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm == 0.0 {
        return vec![0.0; row.len()];
    }
    row.iter().map(|v| v / norm).collect()
}

// Typed arrays are saved either as JSON arrays or as objects keyed "0", "1", ...
fn tensor_values(tensor: &Value) -> GameResult<Vec<f64>> {
    let as_number = |v: &Value| {
        v.as_f64()
            .ok_or_else(|| GameError::InvalidModel(format!("non-numeric tensor value {}", v)))
    };
    match tensor {
        Value::Array(items) => items.iter().map(as_number).collect(),
        Value::Object(map) => {
            let mut entries = map
                .iter()
                .map(|(k, v)| {
                    let index = k
                        .parse::<usize>()
                        .map_err(|_| GameError::InvalidModel(format!("tensor key {} is not an index", k)))?;
                    Ok((index, as_number(v)?))
                })
                .collect::<GameResult<Vec<_>>>()?;
            entries.sort_by_key(|(index, _)| *index);
            Ok(entries.into_iter().map(|(_, v)| v).collect())
        }
        other => Err(GameError::InvalidModel(format!("unexpected tensor {}", other))),
    }
}
