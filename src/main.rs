use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flowlog::core::{Column, DataType};
use flowlog::migration::store_updates::{FLOW_TABLE, USER_TABLE};
use flowlog::storage::TableSchema;
use flowlog::{
    Database, ListLimit, Migrator, NewTransaction, Settings, TransactionLog, to_read_model,
};
use serde_json::json;
use std::num::NonZeroUsize;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "flowlog")]
#[command(about = "Retention-bounded transaction log for flow executions")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Append sample transactions to one flow and print what is kept
    Demo {
        /// Flow to log into; a random one when omitted
        #[arg(long)]
        flow: Option<Uuid>,
        #[arg(long, default_value_t = 5)]
        count: usize,
        /// Overrides FLOWLOG_MAX_TRANSACTIONS_TO_KEEP
        #[arg(long)]
        max_entries: Option<NonZeroUsize>,
        #[arg(long, conflicts_with = "unbounded")]
        limit: Option<usize>,
        #[arg(long)]
        unbounded: bool,
    },
    /// Run schema migrations on a fresh engine and print the outcomes
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Demo {
            flow,
            count,
            max_entries,
            limit,
            unbounded,
        } => {
            let limit = match (limit, unbounded) {
                (_, true) => ListLimit::Unbounded,
                (Some(limit), false) => ListLimit::Max(limit),
                (None, false) => ListLimit::default(),
            };
            run_demo(flow.unwrap_or_else(Uuid::new_v4), count, max_entries, limit).await
        }
        Command::Migrate => run_migrate().await,
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn bootstrap() -> Result<Database> {
    let db = Database::new();
    db.create_table(TableSchema::new(
        FLOW_TABLE,
        vec![
            Column::new("id", DataType::Uuid).primary_key(),
            Column::new("name", DataType::Text),
        ],
    ))
    .await
    .context("failed to create flow table")?;
    db.create_table(TableSchema::new(
        USER_TABLE,
        vec![
            Column::new("id", DataType::Uuid).primary_key(),
            Column::new("username", DataType::Text),
        ],
    ))
    .await
    .context("failed to create user table")?;
    Ok(db)
}

async fn run_demo(
    flow_id: Uuid,
    count: usize,
    max_entries: Option<NonZeroUsize>,
    limit: ListLimit,
) -> Result<()> {
    let db = bootstrap().await?;
    Migrator::with_defaults()
        .upgrade(&db)
        .await
        .context("schema migration failed")?;

    let mut settings = Settings::from_env().context("invalid settings")?;
    if let Some(max) = max_entries {
        settings = settings.with_max_transactions_to_keep(max);
    }

    let log = TransactionLog::new(db, settings);
    log.init().await.context("failed to create transaction table")?;

    for step in 0..count {
        let transaction = NewTransaction::new(format!("Vertex-{step}"), "success")
            .flow_id(flow_id)
            .inputs(json!({ "step": step }))
            .outputs(json!({ "text": format!("output {step}") }));
        log.append(transaction)
            .await
            .with_context(|| format!("append {step} failed"))?;
    }

    let kept = log.count_by_flow(flow_id).await?;
    info!(
        flow_id = %flow_id,
        appended = count,
        kept,
        max_entries = log.settings().max_transactions_to_keep.get(),
        "demo finished"
    );

    let records = log.list_by_flow(flow_id, limit).await?;
    println!("{}", serde_json::to_string_pretty(&to_read_model(records))?);
    Ok(())
}

async fn run_migrate() -> Result<()> {
    let db = bootstrap().await?;
    let report = Migrator::with_defaults()
        .upgrade(&db)
        .await
        .context("schema migration failed")?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
