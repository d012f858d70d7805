//! CLI entry point for the graphgate query gateway.
//!
//! Results go to stdout as JSON or text; logs go to stderr as JSON lines.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{Map, Value};
use tracing_subscriber::{fmt, EnvFilter};

use graphgate_core::{GatewaySettings, ScanId, TenantId};
use graphgate_query::{prepare_parameters, render_as_text, QueryCatalog, QueryService, SerializedGraph};

#[derive(Parser)]
#[command(name = "graphgate")]
#[command(about = "Read-only, provider-scoped queries against tenant graph databases")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file prefix (default: graphgate).
    #[arg(short, long, default_value = "graphgate", global = true)]
    config: String,

    /// Target database by name.
    #[arg(long, global = true, conflicts_with_all = ["tenant_id", "scan_id"])]
    database: Option<String>,

    /// Target the tenant's database.
    #[arg(long, global = true, conflicts_with = "scan_id")]
    tenant_id: Option<String>,

    /// Target a temporary scan database.
    #[arg(long, global = true)]
    scan_id: Option<String>,

    /// Provider whose subgraph is queried.
    #[arg(long, global = true)]
    provider_id: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Run caller-written Cypher (result capped at the configured node limit).
    Custom {
        #[arg(long)]
        cypher: String,
        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },
    /// Run a predefined query from a catalog file.
    Run {
        /// JSON file with query definitions.
        #[arg(long)]
        catalog: PathBuf,
        #[arg(long)]
        query_id: String,
        /// Cloud account identifier of the provider.
        #[arg(long)]
        provider_uid: String,
        /// Query parameter as key=value. Values are parsed as JSON when possible.
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, Value)>,
        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },
    /// Show the ingestion schema of the provider's subgraph.
    Schema,
    /// Delete every node of the provider from the database.
    DropSubgraph,
    /// Clear the database's query plan cache.
    ClearCache,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Text,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = GatewaySettings::load(&cli.config)?;
    let service = QueryService::from_settings(&settings);

    let result = tokio::select! {
        result = run(&cli, &service) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted");
            Err(anyhow::anyhow!("interrupted"))
        }
    };

    if let Err(e) = service.client().close().await {
        tracing::warn!(error = %e, "Failed to close Neo4j driver");
    }
    result
}

async fn run(cli: &Cli, service: &QueryService) -> anyhow::Result<()> {
    let database = resolve_database(cli)?;

    match &cli.command {
        Command::Custom { cypher, format } => {
            let provider_id = require_provider(cli)?;
            let graph = service.execute_adhoc_query(&database, cypher, provider_id).await?;
            print_graph(&graph, *format)?;
        }
        Command::Run {
            catalog,
            query_id,
            provider_uid,
            params,
            format,
        } => {
            let provider_id = require_provider(cli)?;
            let catalog = QueryCatalog::load(catalog)?;
            let definition = catalog.get(query_id)?;
            let provided: Map<String, Value> = params.iter().cloned().collect();
            let parameters = prepare_parameters(definition, &provided, provider_uid, provider_id)?;
            let graph = service
                .execute_defined_query(&database, definition, parameters, provider_id)
                .await?;
            print_graph(&graph, *format)?;
        }
        Command::Schema => {
            let provider_id = require_provider(cli)?;
            let schema = service.ingestion_schema(&database, provider_id).await?;
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
        Command::DropSubgraph => {
            let provider_id = require_provider(cli)?;
            let deleted = service.client().drop_subgraph(&database, provider_id).await?;
            println!("{}", serde_json::json!({ "deleted_nodes": deleted }));
        }
        Command::ClearCache => {
            service.client().clear_query_cache(&database).await;
        }
    }

    Ok(())
}

fn print_graph(graph: &SerializedGraph, format: Format) -> anyhow::Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(graph)?),
        Format::Text => println!("{}", render_as_text(graph)),
    }
    Ok(())
}

fn resolve_database(cli: &Cli) -> anyhow::Result<String> {
    if let Some(name) = &cli.database {
        return Ok(name.clone());
    }
    if let Some(raw) = &cli.tenant_id {
        return Ok(TenantId::parse(raw)?.database_name());
    }
    if let Some(raw) = &cli.scan_id {
        return Ok(ScanId::parse(raw)?.database_name());
    }
    anyhow::bail!("one of --database, --tenant-id or --scan-id is required")
}

fn require_provider(cli: &Cli) -> anyhow::Result<&str> {
    cli.provider_id
        .as_deref()
        .context("--provider-id is required for this command")
}

fn parse_param(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}
