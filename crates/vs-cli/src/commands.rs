use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use serde_json::json;
use vs_server::{ServerConfig, StorageBackend, VsServer};
use vs_types::ContentHash;

use crate::cli::{Cli, Command, ConfigArgs, ConfigSource, HashArgs, OutputFormat, ServeArgs};

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args),
        Command::Hash(args) => cmd_hash(args, cli.format),
        Command::Config(args) => cmd_config(args),
    }
}

fn load_config(source: &ConfigSource) -> anyhow::Result<ServerConfig> {
    match &source.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(ServerConfig::default()),
    }
}

fn serve_config(args: &ServeArgs) -> anyhow::Result<ServerConfig> {
    let mut config = load_config(&args.source)?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(dir) = &args.data_dir {
        config.storage.backend = StorageBackend::Fs;
        config.storage.data_dir = dir.clone();
    }
    if args.memory {
        config.storage.backend = StorageBackend::Memory;
    }
    Ok(config)
}

fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = serve_config(&args)?;
    let backend = match config.storage.backend {
        StorageBackend::Memory => "memory".to_string(),
        StorageBackend::Fs => config.storage.data_dir.display().to_string(),
    };
    println!(
        "{} VicShield on {} (storage: {})",
        "▶".green().bold(),
        config.bind_addr.to_string().bold(),
        backend.cyan()
    );

    let server = VsServer::new(config).context("failed to initialize server")?;
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(server.serve())?;
    Ok(())
}

fn hash_file(path: &Path) -> anyhow::Result<(ContentHash, usize)> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok((ContentHash::of(&bytes), bytes.len()))
}

fn cmd_hash(args: HashArgs, format: OutputFormat) -> anyhow::Result<()> {
    if args.files.is_empty() {
        anyhow::bail!("no files given");
    }
    for path in &args.files {
        let (hash, size) = hash_file(path)?;
        match format {
            OutputFormat::Text => {
                println!("{}  {} {}", hash.to_hex().yellow(), path.display(), format!("({size} bytes)").dimmed());
            }
            OutputFormat::Json => {
                println!("{}", json!({ "hash": hash, "size": size, "path": path.display().to_string() }));
            }
        }
    }
    Ok(())
}

fn cmd_config(args: ConfigArgs) -> anyhow::Result<()> {
    let config = load_config(&args.source)?;
    print!("{}", config.to_toml()?);
    Ok(())
}
