//! The `sessions` command: training history inspection.

use anyhow::Context;
use clap::Subcommand;
use epoch_core::{EpochConfig, SessionStore};

#[derive(Subcommand, Debug)]
pub enum SessionsCommand {
    /// List all sessions, most recently started first
    List,
    /// Show one session as JSON
    Show { session_id: String },
    /// Delete a session record
    Delete { session_id: String },
}

pub fn run(config: &EpochConfig, command: &SessionsCommand) -> anyhow::Result<()> {
    let path = config
        .db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("invalid db path: {}", config.db_path.display()))?;
    let store = SessionStore::open(path).context("failed to open session store")?;

    match command {
        SessionsCommand::List => {
            let sessions = store.list()?;
            if sessions.is_empty() {
                println!("no training sessions recorded");
                return Ok(());
            }
            println!(
                "{:<38} {:<10} {:>8}  {:<8} {:>8}  {}",
                "SESSION", "STATUS", "PROGRESS", "METRIC", "PERCENT", "MODEL"
            );
            for session in sessions {
                let metric = session.metric_name.as_deref().unwrap_or("-");
                let percent = session
                    .accuracy_percent
                    .map_or_else(|| "-".to_string(), |p| format!("{p:.1}"));
                println!(
                    "{:<38} {:<10} {:>7.0}%  {:<8} {:>8}  {}",
                    session.id,
                    session.status.as_str(),
                    session.progress,
                    metric,
                    percent,
                    session.model_id
                );
            }
        }
        SessionsCommand::Show { session_id } => {
            let session = store.get(session_id)?;
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
        SessionsCommand::Delete { session_id } => {
            store.delete(session_id)?;
            println!("deleted session {session_id}");
        }
    }
    Ok(())
}
