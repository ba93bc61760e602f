//! Progress emission.
//!
//! The emitter decouples trainers from the session store: trainers report
//! units of work (epochs, step chunks) and the emitter turns them into
//! monotonic, best-effort partial writes plus events for any attached sinks.
//! A failed store write is logged and training continues; reporting is never
//! allowed to take a run down.

use crate::metrics::{MetricName, MetricNormalizer, NormalizedMetrics, RawMetrics};
use epoch_core::{SessionStore, SessionUpdate};
use std::io::Write;
use tracing::warn;

/// Smallest step block a reinforcement run reports on. Bounds update
/// frequency together with the 1%-of-total floor.
pub const MIN_STEP_CHUNK: u64 = 1000;

/// One progress emission, as seen by sinks.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Started { session_id: String },
    Epoch { session_id: String, current_epoch: u32, total_epochs: u32, percent: u8 },
    Steps { session_id: String, step: u64, total_steps: u64, percent: u8 },
    Finished { session_id: String },
}

impl ProgressEvent {
    #[must_use]
    pub fn percent(&self) -> Option<u8> {
        match self {
            Self::Epoch { percent, .. } | Self::Steps { percent, .. } => Some(*percent),
            Self::Started { .. } | Self::Finished { .. } => None,
        }
    }
}

/// Receives progress events alongside the store writes.
pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}

/// Legacy real-time channel: `PROGRESS:<0-100>` lines on stdout, flushed
/// immediately so a supervising process can follow along.
#[derive(Debug, Default)]
pub struct StdoutMarkerSink;

impl ProgressSink for StdoutMarkerSink {
    fn on_event(&self, event: &ProgressEvent) {
        if let Some(percent) = event.percent() {
            println!("PROGRESS:{percent}");
            let _ = std::io::stdout().flush();
        }
    }
}

/// Per-run progress reporter handed to the trainer.
pub struct ProgressEmitter<'a> {
    store: &'a SessionStore,
    session_id: String,
    normalizer: MetricNormalizer,
    sinks: &'a [Box<dyn ProgressSink>],
    last_percent: f64,
}

impl<'a> ProgressEmitter<'a> {
    #[must_use]
    pub fn new(
        store: &'a SessionStore,
        session_id: impl Into<String>,
        normalizer: MetricNormalizer,
        sinks: &'a [Box<dyn ProgressSink>],
    ) -> Self {
        Self { store, session_id: session_id.into(), normalizer, sinks, last_percent: 0.0 }
    }

    /// Step block size for a run of `total_steps`: 1% of the total work or
    /// [`MIN_STEP_CHUNK`], whichever is larger.
    #[must_use]
    pub fn chunk_size(total_steps: u64) -> u64 {
        (total_steps / 100).max(MIN_STEP_CHUNK)
    }

    #[must_use]
    pub fn metric_name(&self) -> MetricName {
        self.normalizer.metric_name()
    }

    pub fn started(&self) {
        self.broadcast(&ProgressEvent::Started { session_id: self.session_id.clone() });
    }

    /// Reports a completed epoch with its raw metric snapshot.
    ///
    /// Returns the normalized snapshot so trainers can keep the latest one
    /// as their final result.
    pub fn epoch_completed(
        &mut self,
        current_epoch: u32,
        total_epochs: u32,
        raw: RawMetrics,
    ) -> NormalizedMetrics {
        let current = current_epoch.min(total_epochs);
        let metrics = self.normalizer.normalize(raw);
        let percent = self.clamped_percent(f64::from(current), f64::from(total_epochs.max(1)));

        self.write(SessionUpdate {
            progress: Some(percent),
            current_epoch: Some(current),
            total_epochs: Some(total_epochs),
            metric_name: Some(metrics.metric_name.as_str().to_string()),
            accuracy: Some(metrics.accuracy),
            loss: Some(metrics.loss),
            accuracy_percent: Some(metrics.accuracy_percent),
            loss_percent: Some(metrics.loss_percent),
        });
        self.broadcast(&ProgressEvent::Epoch {
            session_id: self.session_id.clone(),
            current_epoch: current,
            total_epochs,
            percent: percent.round() as u8,
        });
        metrics
    }

    /// Reports elapsed environment steps; no metric snapshot is attached
    /// (reinforcement metrics exist only after the evaluation rollout).
    pub fn steps_completed(&mut self, step: u64, total_steps: u64) {
        let step = step.min(total_steps);
        let percent = self.clamped_percent(step as f64, total_steps.max(1) as f64);

        self.write(SessionUpdate::progress(percent));
        self.broadcast(&ProgressEvent::Steps {
            session_id: self.session_id.clone(),
            step,
            total_steps,
            percent: percent.round() as u8,
        });
    }

    /// Normalizes a final snapshot without writing; the runner persists it
    /// together with the terminal status.
    pub fn final_metrics(&mut self, raw: RawMetrics) -> NormalizedMetrics {
        self.normalizer.normalize(raw)
    }

    pub fn finished(&self) {
        self.broadcast(&ProgressEvent::Finished { session_id: self.session_id.clone() });
    }

    fn clamped_percent(&mut self, done: f64, total: f64) -> f64 {
        let percent = (done / total * 100.0).clamp(0.0, 100.0);
        let percent = percent.max(self.last_percent);
        self.last_percent = percent;
        percent
    }

    fn write(&self, update: SessionUpdate) {
        if let Err(e) = self.store.report_progress(&self.session_id, &update) {
            warn!(
                session_id = %self.session_id,
                error = %e,
                "failed to persist progress update; training continues"
            );
        }
    }

    fn broadcast(&self, event: &ProgressEvent) {
        for sink in self.sinks {
            sink.on_event(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TaskType;
    use epoch_core::{Database, SessionStore, TrainingSession};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingSink(Arc<Mutex<Vec<ProgressEvent>>>);

    impl ProgressSink for RecordingSink {
        fn on_event(&self, event: &ProgressEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    fn running_store(id: &str) -> SessionStore {
        let store = SessionStore::new(Database::open_in_memory().unwrap());
        store.create(&TrainingSession::new(id, "model-1", "classification-demo")).unwrap();
        store.start(id, "classification-demo", None).unwrap();
        store
    }

    #[test]
    fn test_chunk_size_floor() {
        assert_eq!(ProgressEmitter::chunk_size(10_000), 1000);
        assert_eq!(ProgressEmitter::chunk_size(1_000_000), 10_000);
        // Tiny totals still get the floor: a single chunk covers the run
        assert_eq!(ProgressEmitter::chunk_size(500), 1000);
    }

    #[test]
    fn test_epoch_completed_persists_snapshot() {
        let store = running_store("sess-1");
        let sinks: Vec<Box<dyn ProgressSink>> = vec![];
        let mut emitter = ProgressEmitter::new(
            &store,
            "sess-1",
            MetricNormalizer::new(TaskType::Classification),
            &sinks,
        );

        emitter.epoch_completed(2, 5, RawMetrics { accuracy: Some(0.8), loss: Some(0.6) });

        let session = store.get("sess-1").unwrap();
        assert_eq!(session.progress, 40.0);
        assert_eq!(session.current_epoch, Some(2));
        assert_eq!(session.total_epochs, Some(5));
        assert_eq!(session.metric_name.as_deref(), Some("Accuracy"));
        assert_eq!(session.accuracy, Some(0.8));
    }

    #[test]
    fn test_emitter_clamps_backwards_progress() {
        let store = running_store("sess-1");
        let sinks: Vec<Box<dyn ProgressSink>> = vec![];
        let mut emitter = ProgressEmitter::new(
            &store,
            "sess-1",
            MetricNormalizer::new(TaskType::Reinforcement),
            &sinks,
        );

        emitter.steps_completed(6000, 10_000);
        emitter.steps_completed(4000, 10_000);

        assert_eq!(store.get("sess-1").unwrap().progress, 60.0);
    }

    #[test]
    fn test_current_epoch_capped_at_total() {
        let store = running_store("sess-1");
        let sinks: Vec<Box<dyn ProgressSink>> = vec![];
        let mut emitter = ProgressEmitter::new(
            &store,
            "sess-1",
            MetricNormalizer::new(TaskType::Classification),
            &sinks,
        );

        emitter.epoch_completed(7, 5, RawMetrics::default());
        let session = store.get("sess-1").unwrap();
        assert_eq!(session.current_epoch, Some(5));
        assert_eq!(session.total_epochs, Some(5));
    }

    #[test]
    fn test_sinks_see_events_in_order() {
        let store = running_store("sess-1");
        let recorder = RecordingSink::default();
        let sinks: Vec<Box<dyn ProgressSink>> = vec![Box::new(recorder.clone())];
        let mut emitter = ProgressEmitter::new(
            &store,
            "sess-1",
            MetricNormalizer::new(TaskType::Reinforcement),
            &sinks,
        );

        emitter.started();
        emitter.steps_completed(0, 10_000);
        emitter.steps_completed(10_000, 10_000);
        emitter.finished();

        let events = recorder.0.lock().unwrap().clone();
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], ProgressEvent::Started { .. }));
        assert_eq!(events[1].percent(), Some(0));
        assert_eq!(events[2].percent(), Some(100));
        assert!(matches!(events[3], ProgressEvent::Finished { .. }));
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        // Session never claimed: every store write is rejected, the emitter
        // must keep going regardless.
        let store = SessionStore::new(Database::open_in_memory().unwrap());
        store.create(&TrainingSession::new("sess-1", "m", "classification-demo")).unwrap();
        let sinks: Vec<Box<dyn ProgressSink>> = vec![];
        let mut emitter = ProgressEmitter::new(
            &store,
            "sess-1",
            MetricNormalizer::new(TaskType::Classification),
            &sinks,
        );

        emitter.epoch_completed(1, 5, RawMetrics::default());
        emitter.steps_completed(1, 5);
        // Still pending, nothing written
        assert_eq!(store.get("sess-1").unwrap().progress, 0.0);
    }
}
