//! chainingest CLI — emit, validate, and run ingestion configs.
//!
//! Usage:
//! ```bash
//! chainingest emit [PATH]        # write the config.json artifact (default: config.json)
//! chainingest validate <PATH>    # parse and validate an artifact
//! chainingest run <PATH>         # run the ingestion engine from an artifact
//! chainingest info
//! ```

use std::env;
use std::fs;
use std::process;
use std::sync::Arc;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chainingest_core::{resolve_env, IngestConfig, IngestError, Integration, IntegrationRouter, Source};
use chainingest_evm::{EngineOptions, HttpRpcClient, IngestEngine, TransfersIntegration};
use chainingest_storage::postgres::PostgresSink;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    match args[1].as_str() {
        "emit" => cmd_emit(args.get(2).map(String::as_str).unwrap_or("config.json")),
        "validate" => match args.get(2) {
            Some(path) => cmd_validate(path),
            None => {
                eprintln!("validate: missing PATH argument");
                process::exit(1);
            }
        },
        "run" => match args.get(2) {
            Some(path) => cmd_run(path),
            None => {
                eprintln!("run: missing PATH argument");
                process::exit(1);
            }
        },
        "info" => cmd_info(),
        "version" | "--version" | "-V" => {
            println!("chainingest {}", env!("CARGO_PKG_VERSION"));
        }
        "help" | "--help" | "-h" => print_usage(),
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    }
}

fn print_usage() {
    println!("chainingest {}", env!("CARGO_PKG_VERSION"));
    println!("Declarative multi-chain log-ingestion engine\n");
    println!("USAGE:");
    println!("    chainingest <COMMAND>\n");
    println!("COMMANDS:");
    println!("    emit [PATH]      Write the config.json artifact (default: config.json)");
    println!("    validate <PATH>  Parse and validate an artifact");
    println!("    run <PATH>       Run the ingestion engine from an artifact");
    println!("    info             Show ChainIngest configuration info");
    println!("    version          Print version");
    println!("    help             Print this help");
}

fn cmd_info() {
    println!("ChainIngest v{}", env!("CARGO_PKG_VERSION"));
    println!("  Default batch size: 100 blocks/call");
    println!("  Default concurrency: 4 in-flight range fetches per source");
    println!("  Default checkpoint interval: every 100 blocks");
    println!("  Storage backends: memory, Postgres (feature: postgres)");
    println!("  Integrations: transfers (ERC-20 Transfer)");
    println!("  Chains: EVM (Ethereum, Base, Arbitrum, Polygon, Optimism, ...)");
}

/// The stock configuration: mainnet + Base, transfers only, with every
/// endpoint left as a `$VAR` placeholder for the runtime environment.
fn default_config() -> IngestConfig {
    IngestConfig::new("$DATABASE_URL")
        .source(Source::new("base", 8453, "$BASE_RPC_URL"))
        .source(Source::new("mainnet", 1, "$MAINNET_RPC_URL"))
        .integration(TransfersIntegration::new().spec())
}

fn cmd_emit(path: &str) {
    match default_config().write_artifact(path) {
        Ok(()) => println!("✔ wrote ingest config to {path}"),
        Err(e) => {
            eprintln!("emit failed: {e}");
            process::exit(1);
        }
    }
}

fn cmd_validate(path: &str) {
    let config = match load_config(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{path}: {e}");
            process::exit(1);
        }
    };
    println!(
        "✔ {path} is valid ({} sources, {} integrations)",
        config.sources.len(),
        config.integrations.len()
    );
}

fn cmd_run(path: &str) {
    init_tracing();
    let config = match load_config(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{path}: {e}");
            process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start runtime: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run_engine(config)) {
        eprintln!("ingestion failed: {e}");
        process::exit(1);
    }
}

fn load_config(path: &str) -> Result<IngestConfig, IngestError> {
    let json = fs::read_to_string(path)
        .map_err(|e| IngestError::Other(format!("read config: {e}")))?;
    let config = IngestConfig::from_json(&json)?;
    config.validate()?;
    Ok(config)
}

async fn run_engine(config: IngestConfig) -> Result<(), IngestError> {
    let pg_url = resolve_env(&config.pg_url)?;
    let sink = Arc::new(PostgresSink::connect(&pg_url).await?);

    let mut router = IntegrationRouter::new();
    for spec in &config.integrations {
        if !spec.enabled {
            continue;
        }
        match spec.name.as_str() {
            "transfers" => router.register(Arc::new(TransfersIntegration::new())),
            other => {
                tracing::warn!(integration = other, "no decoder registered; skipping");
            }
        }
    }

    let mut engine = IngestEngine::new(
        Arc::new(router),
        sink.clone(),
        sink.clone(),
        EngineOptions::default(),
    );
    for source in &config.sources {
        let url = resolve_env(&source.url)?;
        let client = Arc::new(HttpRpcClient::default_for(url)?);
        engine.add_source(source.clone(), client);
    }
    engine.run().await
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}
