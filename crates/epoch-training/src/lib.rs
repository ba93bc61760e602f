//! Epoch Training
//!
//! Training-job orchestration for the Epoch platform:
//! - Resolving architecture tags to trainer implementations (`registry`)
//! - Driving a run to a guaranteed terminal state (`runner`)
//! - Normalizing backend metrics into the session record shape (`metrics`)
//! - Monotonic, best-effort progress reporting (`progress`)
//! - Built-in datasets/environments and baseline backends (`dataset`,
//!   `trainers`)

pub mod artifacts;
pub mod dataset;
pub mod error;
pub mod metrics;
pub mod model;
pub mod params;
pub mod progress;
pub mod registry;
pub mod runner;
pub mod trainer;
pub mod trainers;

pub use artifacts::{ArtifactKind, ArtifactStore, ModelArtifact, SavedModel};
pub use dataset::{DatasetKind, EnvironmentSpec, TabularDataset};
pub use error::{TrainingError, TrainingResult};
pub use metrics::{MetricName, MetricNormalizer, NormalizedMetrics, RawMetrics};
pub use model::{ModelDescriptor, TaskType};
pub use params::TrainingParams;
pub use progress::{ProgressEmitter, ProgressEvent, ProgressSink, StdoutMarkerSink};
pub use registry::{Resolution, TrainerRegistry};
pub use runner::{JobRequest, JobRunner};
pub use trainer::{TrainContext, Trainer, TrainingOutcome};
pub use trainers::{EnsembleTrainer, IterativeTrainer, ReinforcementTrainer};
