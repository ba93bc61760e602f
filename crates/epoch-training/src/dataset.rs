//! Built-in datasets and environments.
//!
//! Datasets are resolved by tag from a single registry instead of branching
//! per dataset id at the call site. Generation is deterministic (seeded) so
//! repeated runs against the same tag see the same data.

use crate::error::{TrainingError, TrainingResult};
use crate::model::TaskType;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

/// In-memory tabular dataset with a held-out test split.
#[derive(Debug, Clone)]
pub struct TabularDataset {
    pub label: String,
    pub task_type: TaskType,
    pub x_train: Vec<Vec<f64>>,
    pub y_train: Vec<f64>,
    pub x_test: Vec<Vec<f64>>,
    pub y_test: Vec<f64>,
}

impl TabularDataset {
    #[must_use]
    pub fn num_features(&self) -> usize {
        self.x_train.first().map_or(0, Vec::len)
    }

    /// Mean of the training targets; the regression percent formula scales
    /// against this.
    #[must_use]
    pub fn target_mean(&self) -> f64 {
        if self.y_train.is_empty() {
            return 0.0;
        }
        self.y_train.iter().sum::<f64>() / self.y_train.len() as f64
    }
}

/// A resolved reinforcement-learning environment tag.
#[derive(Debug, Clone)]
pub struct EnvironmentSpec {
    pub name: String,
}

/// What a dataset tag resolves to.
#[derive(Debug, Clone)]
pub enum DatasetKind {
    Tabular(TabularDataset),
    Environment(EnvironmentSpec),
}

impl DatasetKind {
    #[must_use]
    pub fn task_type(&self) -> TaskType {
        match self {
            Self::Tabular(d) => d.task_type,
            Self::Environment(_) => TaskType::Reinforcement,
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Tabular(d) => &d.label,
            Self::Environment(e) => &e.name,
        }
    }
}

/// Known environment tags.
const ENVIRONMENTS: &[&str] = &["cartpole-demo"];

/// Tags the registry can resolve, with a short description for listings.
#[must_use]
pub fn available() -> Vec<(&'static str, &'static str)> {
    vec![
        ("classification-demo", "two-class clustered tabular data (classification)"),
        ("regression-demo", "linear tabular data with noise (regression)"),
        ("timeseries-demo", "windowed series, predict next value (regression)"),
        ("cartpole-demo", "pole-balance environment (reinforcement learning)"),
    ]
}

/// Resolves a dataset tag.
///
/// Unknown tags are an error: a session trained against a dataset that does
/// not exist must fail, not silently train on fallback data.
pub fn load(tag: &str) -> TrainingResult<DatasetKind> {
    match tag {
        "classification-demo" => Ok(DatasetKind::Tabular(classification_demo())),
        "regression-demo" => Ok(DatasetKind::Tabular(regression_demo())),
        "timeseries-demo" => Ok(DatasetKind::Tabular(timeseries_demo())),
        tag if ENVIRONMENTS.contains(&tag) => {
            Ok(DatasetKind::Environment(EnvironmentSpec { name: tag.to_string() }))
        }
        other => Err(TrainingError::UnknownDataset(other.to_string())),
    }
}

/// Resolves an environment override from the hyperparameters.
///
/// An unknown override falls back to the dataset's own environment with a
/// logged substitution rather than failing the run.
#[must_use]
pub fn resolve_environment(spec: &EnvironmentSpec, requested: Option<&str>) -> EnvironmentSpec {
    match requested {
        Some(name) if ENVIRONMENTS.contains(&name) => EnvironmentSpec { name: name.to_string() },
        Some(name) => {
            warn!(
                requested = name,
                fallback = %spec.name,
                "environment not found; using fallback"
            );
            spec.clone()
        }
        None => spec.clone(),
    }
}

/// Column-wise standardization fitted on the training split and applied to
/// both splits.
fn standardize(x_train: &mut [Vec<f64>], x_test: &mut [Vec<f64>]) {
    let features = x_train.first().map_or(0, Vec::len);
    let n = x_train.len() as f64;
    for col in 0..features {
        let mean = x_train.iter().map(|row| row[col]).sum::<f64>() / n;
        let var = x_train.iter().map(|row| (row[col] - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt().max(1e-12);
        for row in x_train.iter_mut().chain(x_test.iter_mut()) {
            row[col] = (row[col] - mean) / std;
        }
    }
}

fn seed_for(tag: &str) -> u64 {
    // Stable per-tag seed so every run of a tag sees identical data.
    tag.bytes().fold(0x45_50_4f_43u64, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)))
}

fn split(
    x: Vec<Vec<f64>>,
    y: Vec<f64>,
) -> (Vec<Vec<f64>>, Vec<f64>, Vec<Vec<f64>>, Vec<f64>) {
    let train_size = x.len() * 4 / 5;
    let (x_train, x_test) = {
        let mut x = x;
        let x_test = x.split_off(train_size);
        (x, x_test)
    };
    let (y_train, y_test) = {
        let mut y = y;
        let y_test = y.split_off(train_size);
        (y, y_test)
    };
    (x_train, y_train, x_test, y_test)
}

/// Two clusters of points around opposite centers, one per class.
fn classification_demo() -> TabularDataset {
    let mut rng = StdRng::seed_from_u64(seed_for("classification-demo"));
    let (samples, features) = (240, 8);

    let mut x = Vec::with_capacity(samples);
    let mut y = Vec::with_capacity(samples);
    for i in 0..samples {
        let class = f64::from(u8::from(i % 2 == 1));
        let center = if class > 0.5 { 1.0 } else { -1.0 };
        let row: Vec<f64> =
            (0..features).map(|_| center + rng.gen_range(-1.2..1.2)).collect();
        x.push(row);
        y.push(class);
    }

    let (x_train, y_train, x_test, y_test) = split(x, y);
    TabularDataset {
        label: "Classification Demo".to_string(),
        task_type: TaskType::Classification,
        x_train,
        y_train,
        x_test,
        y_test,
    }
}

/// Linear combination of standardized features plus noise. Targets carry a
/// positive offset so they resemble price-like data with a nonzero mean.
fn regression_demo() -> TabularDataset {
    let mut rng = StdRng::seed_from_u64(seed_for("regression-demo"));
    let (samples, features) = (240, 8);

    let weights: Vec<f64> = (0..features).map(|_| rng.gen_range(-2.0..2.0)).collect();
    let mut x = Vec::with_capacity(samples);
    let mut y = Vec::with_capacity(samples);
    for _ in 0..samples {
        let row: Vec<f64> = (0..features).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let target = row.iter().zip(&weights).map(|(a, b)| a * b).sum::<f64>()
            + 50.0
            + rng.gen_range(-1.0..1.0);
        x.push(row);
        y.push(target);
    }

    let (x_train, y_train, x_test, y_test) = split(x, y);
    TabularDataset {
        label: "Regression Demo".to_string(),
        task_type: TaskType::Regression,
        x_train,
        y_train,
        x_test,
        y_test,
    }
}

/// Sliding windows over a noisy trending sine wave; the target is the next
/// value after each window. Window features are standardized against the
/// training split; targets stay in their raw scale.
fn timeseries_demo() -> TabularDataset {
    let mut rng = StdRng::seed_from_u64(seed_for("timeseries-demo"));
    let (length, window) = (300, 12);

    let series: Vec<f64> = (0..length)
        .map(|i| {
            let t = i as f64;
            50.0 + t * 0.05 + 10.0 * (t / 20.0).sin() + rng.gen_range(-0.5..0.5)
        })
        .collect();

    let mut x = Vec::new();
    let mut y = Vec::new();
    for start in 0..length - window {
        x.push(series[start..start + window].to_vec());
        y.push(series[start + window]);
    }

    let (mut x_train, y_train, mut x_test, y_test) = split(x, y);
    standardize(&mut x_train, &mut x_test);
    TabularDataset {
        label: "Timeseries Demo".to_string(),
        task_type: TaskType::Regression,
        x_train,
        y_train,
        x_test,
        y_test,
    }
}
