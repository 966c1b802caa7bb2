//! `replayguard session list|show` (spec §6.3).

use crate::cli::{SessionAction, SessionArgs};
use anyhow::{Context, Result};
use replayguard_core::{list_sessions, session_summary, Session};

/// Run `replayguard session`.
pub async fn run(args: SessionArgs) -> Result<i32> {
    match args.action {
        SessionAction::List { directory } => {
            let sessions = list_sessions(&directory)
                .await
                .with_context(|| format!("failed to list sessions under {}", directory.display()))?;
            if sessions.is_empty() {
                println!("no sessions found under {}", directory.display());
            }
            for session in &sessions {
                println!("{}", session_summary(session));
            }
            Ok(0)
        }
        SessionAction::Show { session_file } => {
            let session = Session::load(&session_file)
                .await
                .with_context(|| format!("failed to load session {}", session_file.display()))?;
            println!("{}", session_summary(&session));
            for (index, interaction) in session.interactions.iter().enumerate() {
                println!(
                    "  [{index}] {} {} -> {} (tags: {})",
                    interaction.request.method,
                    interaction.request.path,
                    interaction.response.status_code,
                    interaction.tags.join(", ")
                );
            }
            Ok(0)
        }
    }
}
