//! newsdesk-dispatch — Binary Entrypoint
//! Runs one pipeline pass over a JSON item file and prints the run summary.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use newsdesk_dispatch::config::PipelineConfig;
use newsdesk_dispatch::metrics::install_prometheus;
use newsdesk_dispatch::quota::JsonFileQuotaStore;
use newsdesk_dispatch::roster::Roster;
use newsdesk_dispatch::services::mock::{DisabledClassifier, TemplateGenerator};
use newsdesk_dispatch::services::openai::{OpenAiClassifier, OpenAiClient, OpenAiGenerator};
use newsdesk_dispatch::services::{DynClassifier, DynGenerator};
use newsdesk_dispatch::source_tiers::SourceTierTable;
use newsdesk_dispatch::store::{ItemStore, MemoryItemStore};
use newsdesk_dispatch::{Orchestrator, SelectionMode, Services};

#[derive(Debug, Parser)]
#[command(name = "newsdesk-dispatch")]
#[command(about = "Select, dedupe and dispatch candidate news items to the production lanes")]
struct Cli {
    /// Operating mode (freshness window and item cap).
    #[arg(long, value_enum, default_value = "hourly-update")]
    mode: SelectionMode,

    /// Pipeline config (TOML). Defaults to $NEWSDESK_CONFIG_PATH or config/newsdesk.toml.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Candidate items (JSON list or a previous output document).
    #[arg(long, default_value = "state/items.json")]
    items: PathBuf,

    /// Where to write items + outcomes. Defaults to the items file.
    #[arg(long)]
    output: Option<PathBuf>,

    /// No network: classifier disabled, template generator.
    #[arg(long, env = "NEWSDESK_OFFLINE")]
    offline: bool,

    /// Print Prometheus exposition text after the summary.
    #[arg(long)]
    print_metrics: bool,
}

/// Compact logs on stderr; JSON lines when NEWSDESK_LOG_FORMAT=json.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("newsdesk_dispatch=info,warn"));
    let json = std::env::var("NEWSDESK_LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

fn offline_services() -> (DynClassifier, DynGenerator) {
    let classifier: DynClassifier = Arc::new(DisabledClassifier);
    let generator: DynGenerator = Arc::new(TemplateGenerator);
    (classifier, generator)
}

fn build_services(cfg: &PipelineConfig, offline: bool) -> (DynClassifier, DynGenerator) {
    if offline {
        return offline_services();
    }
    let timeout = cfg.lanes.call_timeout();
    let clients = OpenAiClient::new(cfg.openai.clone(), timeout)
        .and_then(|c| Ok((c, OpenAiClient::new(cfg.openai.clone(), timeout)?)));
    match clients {
        Ok((for_classify, for_generate)) => {
            let classifier: DynClassifier = Arc::new(OpenAiClassifier::new(for_classify));
            let generator: DynGenerator = Arc::new(OpenAiGenerator::new(for_generate));
            (classifier, generator)
        }
        Err(e) => {
            let (classifier, generator) = offline_services();
            warn!(
                error = %e,
                classifier = classifier.name(),
                generator = generator.name(),
                "OpenAI unavailable, running offline"
            );
            (classifier, generator)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();

    let cfg = match &cli.config {
        Some(p) => PipelineConfig::load_from_file(p)?,
        None => PipelineConfig::load_default()?,
    };

    let prometheus = if cli.print_metrics {
        Some(install_prometheus()?)
    } else {
        None
    };

    let tiers = SourceTierTable::load_from_file(&cfg.paths.source_tiers);
    let roster = Roster::load_or_seed(&cfg.paths.roster)?;
    let store = Arc::new(MemoryItemStore::load_json(&cli.items)?);
    let items: Arc<dyn ItemStore> = store.clone();
    let (classifier, generator) = build_services(&cfg, cli.offline);

    let services = Services {
        classifier,
        generator,
        items,
        quota_store: Arc::new(JsonFileQuotaStore::new(&cfg.paths.quota_state)),
    };
    let orchestrator = Orchestrator::new(cfg, tiers, roster, services)?;
    let summary = orchestrator.run(cli.mode).await?;

    let out = cli.output.as_ref().unwrap_or(&cli.items);
    store
        .flush_json(out)
        .with_context(|| format!("writing outcomes to {}", out.display()))?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    if let Some(handle) = prometheus {
        println!("{}", handle.render());
    }
    Ok(())
}
