mod cli;

use convertd::{
    clock::SystemClock,
    config,
    executor::CommandExecutor,
    queue::QueueManager,
    server::{self, AppContext},
};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::sync::Arc;

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    workers: Option<usize>,
    config_path: Option<&std::path::Path>,
) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    // CLI flags win over the config file
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(workers) = workers {
        config.queue.workers = workers;
    }
    config::validate_config(&config)?;

    tracing::info!("Starting convertd");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    let executor = CommandExecutor::new(&config.tools, config.storage.output_dir.clone());
    tracing::info!(
        tools = ?executor.tool_names(),
        output_dir = ?executor.output_dir(),
        "Conversion tools loaded"
    );

    let queue = QueueManager::new(&config.queue, Arc::new(executor), Arc::new(SystemClock));
    queue.start();
    tracing::info!(workers = queue.workers(), "Conversion queue started");

    let ctx = AppContext::new(queue.clone(), config);
    let server_result = server::start_server(ctx).await;

    tracing::info!("Shutting down...");
    queue.shutdown().await;

    server_result
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "convertd=trace,convertd_common=debug,tower_http=debug".to_string()
        } else {
            "convertd=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start {
            host,
            port,
            workers,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, workers, cli.config.as_deref()))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Tools => list_tools(cli.config.as_deref()),
        Commands::Version => {
            println!("convertd {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn validate_config(path: Option<&std::path::Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Workers: {}", config.queue.workers);
    println!("  Max queued: {}", config.queue.max_queued);
    match config.queue.retention() {
        Some(retention) => println!("  Retention: {}s", retention.as_secs()),
        None => println!("  Retention: forever"),
    }
    println!("  Output dir: {}", config.storage.output_dir.display());
    println!("  Tools: {}", config.tools.len());

    Ok(())
}

fn list_tools(config_path: Option<&std::path::Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    if config.tools.is_empty() {
        println!("No conversion tools configured.");
        return Ok(());
    }

    for tool in &config.tools {
        let timeout = tool
            .timeout_secs
            .unwrap_or(config.queue.default_timeout_secs);
        println!(
            "{} -> .{} ({} {}) [timeout {}s]",
            tool.name,
            tool.output_extension.trim_start_matches('.'),
            tool.program.display(),
            tool.args.join(" "),
            timeout
        );
    }

    Ok(())
}
