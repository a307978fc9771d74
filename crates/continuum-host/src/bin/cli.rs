//! `clap`-based command-line surface (§6): stats, search, lookup, prune,
//! checkpoint, backfill-decay, extract-daily.

use clap::{Parser, Subcommand};
use colored::Colorize;
use continuum_host::config::Config;
use continuum_host::facade::{CheckpointPayload, MemoryFacade};

#[derive(Parser)]
#[command(name = "continuum-cli", about = "Inspect and manage the continuum memory store")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print memory counts grouped by decay class.
    Stats,
    /// Run a hybrid recall query.
    Search {
        query: String,
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// Look up memories by entity, optionally narrowed to an exact key.
    Lookup {
        entity: String,
        #[arg(long)]
        key: Option<String>,
    },
    /// Hard-delete expired memories and apply soft confidence decay.
    Prune,
    /// Save or restore a checkpoint.
    Checkpoint {
        #[arg(long)]
        intent: Option<String>,
        #[arg(long)]
        state: Option<String>,
        #[arg(long)]
        restore: Option<Option<String>>,
    },
    /// Re-run the decay classifier against every stored row.
    BackfillDecay,
    /// Ingest a markdown file's non-heading, non-code lines as candidate memories.
    ExtractDaily { path: std::path::PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let cli = Cli::parse();
    let config = Config::from_env();
    let facade = MemoryFacade::new(config).await?;

    match cli.command {
        Command::Stats => cmd_stats(&facade).await?,
        Command::Search { query, limit } => cmd_search(&facade, &query, limit).await?,
        Command::Lookup { entity, key } => cmd_lookup(&facade, &entity, key.as_deref()).await?,
        Command::Prune => cmd_prune(&facade).await?,
        Command::Checkpoint { intent, state, restore } => {
            cmd_checkpoint(&facade, intent, state, restore).await?
        }
        Command::BackfillDecay => cmd_backfill_decay(&facade).await?,
        Command::ExtractDaily { path } => cmd_extract_daily(&facade, &path).await?,
    }
    Ok(())
}

async fn cmd_stats(facade: &MemoryFacade) -> anyhow::Result<()> {
    let breakdown = facade.stats().await?;
    println!("{}", "memory stats by decay class".bold());
    let mut classes: Vec<_> = breakdown.into_iter().collect();
    classes.sort_by(|a, b| a.0.cmp(&b.0));
    for (class, count) in classes {
        println!("  {:<12} {}", class.cyan(), count);
    }
    Ok(())
}

async fn cmd_search(facade: &MemoryFacade, query: &str, limit: usize) -> anyhow::Result<()> {
    let hits = facade.recall(query, None, Some(limit)).await?;
    if hits.is_empty() {
        println!("{}", "no matches".dimmed());
        return Ok(());
    }
    for hit in hits {
        println!(
            "{:>6.3}  {}  {}",
            hit.score,
            format!("[{}]", hit.decay_class).cyan(),
            hit.text
        );
    }
    Ok(())
}

async fn cmd_lookup(facade: &MemoryFacade, entity: &str, key: Option<&str>) -> anyhow::Result<()> {
    let entries = facade.lookup(entity, key).await?;
    if entries.is_empty() {
        println!("{}", "not found".red());
        return Ok(());
    }
    for entry in entries {
        println!(
            "{} = {}",
            entry.key.as_deref().unwrap_or("-").green(),
            entry.value.as_deref().unwrap_or_default()
        );
    }
    Ok(())
}

async fn cmd_prune(facade: &MemoryFacade) -> anyhow::Result<()> {
    let report = facade.prune().await?;
    println!(
        "pruned {} expired, decayed confidence on {}",
        report.pruned.to_string().yellow(),
        report.confidence_decayed.to_string().yellow()
    );
    Ok(())
}

async fn cmd_checkpoint(
    facade: &MemoryFacade,
    intent: Option<String>,
    state: Option<String>,
    restore: Option<Option<String>>,
) -> anyhow::Result<()> {
    if let Some(label) = restore {
        let restored = match label {
            Some(label) => facade.restore_checkpoint(&label).await?,
            None => facade.restore_latest_checkpoint().await?,
        };
        match restored {
            Some(payload) => println!("{}", serde_json::to_string_pretty(&payload)?),
            None => println!("{}", "no checkpoint found".dimmed()),
        }
        return Ok(());
    }
    let intent = intent.unwrap_or_else(|| "unspecified".to_string());
    let state = state.unwrap_or_default();
    let saved_at = facade.clock_now();
    let entry = facade
        .checkpoint(CheckpointPayload {
            intent,
            state,
            expected_outcome: None,
            working_files: None,
            saved_at,
        })
        .await?;
    println!("saved checkpoint {}", entry.id.green());
    Ok(())
}

async fn cmd_backfill_decay(facade: &MemoryFacade) -> anyhow::Result<()> {
    let updated = facade.backfill_decay_classes().await?;
    println!("reclassified {} memories", updated.to_string().yellow());
    Ok(())
}

async fn cmd_extract_daily(facade: &MemoryFacade, path: &std::path::Path) -> anyhow::Result<()> {
    let candidates = continuum_host::markdown::scan_file(path)?;
    let stored = facade.ingest_markdown(candidates).await?;
    println!("captured {} memories from {}", stored.to_string().green(), path.display());
    Ok(())
}
