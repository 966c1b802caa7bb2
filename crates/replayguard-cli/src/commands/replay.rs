//! `replayguard replay` (spec §6.3).

use crate::cli::{OutputFormat, ReplayArgs};
use crate::reporter::render_text;
use anyhow::{Context, Result};
use replayguard_core::{
    ComparisonMode, ContractImporter, ReplayConfig, ReplayEngine, ReplayFilter, RouteResolver, Session,
};
use tracing::{info, warn};

/// Run `replayguard replay`. Returns the process exit code (spec §6.3
/// exit-code table: 0 success, 1 on load failure, strict-mode deviation, or
/// threshold failure).
pub async fn run(args: ReplayArgs) -> Result<i32> {
    let session = Session::load(&args.session_file)
        .await
        .with_context(|| format!("failed to load session {}", args.session_file.display()))?;

    let mut config = match &args.config {
        Some(path) => ReplayConfig::from_file(path).with_context(|| format!("failed to load config {}", path.display()))?,
        None => ReplayConfig::default(),
    };
    if args.no_dynamic {
        config.use_dynamic_responses = false;
    }
    config.preload_templates = config.preload_templates || args.preload_templates;

    let comparison_mode = if args.strict {
        ComparisonMode::Strict
    } else if args.tolerant {
        ComparisonMode::Tolerant
    } else {
        ComparisonMode::Default
    };

    let mut resolver = RouteResolver::new();
    if let Some(contract_path) = &args.contract {
        let document = replayguard_core::contract::load_document(contract_path)
            .with_context(|| format!("failed to load contract {}", contract_path.display()))?;
        let importer = ContractImporter::new(&config.contract);
        let imported = importer.import(&document, &mut resolver)?;
        info!(imported, "imported routes from contract");
    }

    let engine = ReplayEngine::new(config, comparison_mode, resolver)?;

    let filter = ReplayFilter {
        methods: args.filter_methods.clone(),
        routes: args.filter_routes.clone(),
        interaction_tags: args.filter_tags.clone(),
        session_tags: args.filter_session_tags.clone(),
    };

    let result = engine.replay(&session, &filter, args.performance).await;
    emit(&args, &result)?;

    if comparison_mode == ComparisonMode::Strict && result.summary.incompatible > 0 {
        warn!("strict mode found incompatibilities");
        return Ok(1);
    }

    if args.fail_on_threshold {
        if let Some(threshold) = args.threshold {
            if result.summary.compatibility_score < threshold {
                warn!(threshold, score = result.summary.compatibility_score, "compatibility score below threshold");
                return Ok(1);
            }
        }
    }

    Ok(0)
}

fn emit(args: &ReplayArgs, result: &replayguard_core::SessionResult) -> Result<()> {
    let rendered = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(result)?,
        OutputFormat::Text => render_text(result),
    };

    match &args.output {
        Some(path) => std::fs::write(path, rendered).with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{rendered}"),
    }
    Ok(())
}
