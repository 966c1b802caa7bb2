//! `replayguard tag` (spec §6.3): attach tags to every interaction in a
//! session file.

use crate::cli::TagArgs;
use anyhow::{Context, Result};
use replayguard_core::Session;

/// Run `replayguard tag`. Always exits 0 unless the session fails to load
/// or write.
pub async fn run(args: TagArgs) -> Result<i32> {
    let mut session = Session::load(&args.session_file)
        .await
        .with_context(|| format!("failed to load session {}", args.session_file.display()))?;

    for interaction in &mut session.interactions {
        for tag in &args.add {
            if !interaction.tags.contains(tag) {
                interaction.tags.push(tag.clone());
            }
        }
    }

    let target = args.output.as_ref().unwrap_or(&args.session_file);
    let serialized = serde_json::to_string_pretty(&session)?;
    tokio::fs::write(target, serialized)
        .await
        .with_context(|| format!("failed to write {}", target.display()))?;

    println!("tagged {} interactions in {}", session.interactions.len(), target.display());
    Ok(0)
}
