//! The `train` and `start` commands.

use anyhow::Context;
use epoch_core::{EpochConfig, SessionStatus, SessionStore, SessionUpdate, TrainingSession};
use epoch_training::{JobRequest, JobRunner, TrainingParams};
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

/// Runs a training job for an existing (or implicitly pending) session.
pub async fn run(
    config: &EpochConfig,
    session_id: &str,
    dataset_id: &str,
    params_json: &str,
) -> anyhow::Result<()> {
    let store = open_store(config)?;

    let params = match TrainingParams::parse(params_json) {
        Ok(params) => params,
        Err(e) => {
            // Input fault before any training ran. The session id did parse,
            // so record the failure for the caller watching the store, then
            // exit non-zero.
            error!(session_id, error = %e, "invalid training parameters");
            if let Err(write_err) =
                store.finish(session_id, SessionStatus::Failed, &SessionUpdate::default())
            {
                warn!(session_id, error = %write_err, "could not record the failure");
            }
            anyhow::bail!("invalid training parameters: {e}");
        }
    };

    let request = JobRequest {
        session_id: session_id.to_string(),
        dataset_id: dataset_id.to_string(),
        params,
    };
    execute(config, &store, &request).await
}

/// Creates a pending session and runs it in the same process.
pub async fn start(
    config: &EpochConfig,
    model_id: &str,
    dataset_id: &str,
    params_json: &str,
) -> anyhow::Result<()> {
    // No session exists yet, so a parameter fault has nothing to record
    let params = TrainingParams::parse(params_json)
        .map_err(|e| anyhow::anyhow!("invalid training parameters: {e}"))?;

    let store = open_store(config)?;
    let session_id = Uuid::new_v4().to_string();
    store
        .create(&TrainingSession::new(session_id.as_str(), model_id, dataset_id))
        .context("failed to create session")?;
    println!("created session {session_id}");

    let request = JobRequest {
        session_id,
        dataset_id: dataset_id.to_string(),
        params,
    };
    execute(config, &store, &request).await
}

async fn execute(
    config: &EpochConfig,
    store: &Arc<SessionStore>,
    request: &JobRequest,
) -> anyhow::Result<()> {
    let runner = JobRunner::new(config.clone(), Arc::clone(store));
    let status = runner
        .run(request)
        .await
        .with_context(|| format!("could not run session {}", request.session_id))?;

    let session = store.get(&request.session_id)?;
    println!("session {} finished: {status}", request.session_id);
    if let (Some(metric), Some(percent)) = (&session.metric_name, session.accuracy_percent) {
        println!("{metric}: {percent:.1}%");
    }
    Ok(())
}

fn open_store(config: &EpochConfig) -> anyhow::Result<Arc<SessionStore>> {
    let path = config
        .db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("invalid db path: {}", config.db_path.display()))?;
    Ok(Arc::new(SessionStore::open(path).context("failed to open session store")?))
}
