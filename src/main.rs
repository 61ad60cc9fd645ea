//! hotpatch channel utilities
//!
//! Developer-facing driver for the patch channel: watch patch traffic going
//! to a target process, or push a hand-built delta at one. The project
//! model, edit classifier and delta compiler are embedding-time
//! collaborators, so the full producer session is a library surface; this
//! binary covers the wire side of the pipeline.

use anyhow::Context;
use clap::{Arg, ArgMatches, Command};
use hotpatch::applier::{FrameSource, WebSocketFrameSource};
use hotpatch::core::Config;
use hotpatch::transport::{wire, PatchSender, WebSocketChannel};
use hotpatch::types::ModuleDelta;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let matches = Command::new("hotpatch")
        .version(hotpatch::VERSION)
        .about("Channel utilities for the live patch pipeline.")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .global(true),
        )
        .arg(
            Arg::new("channel")
                .long("channel")
                .value_name("URL")
                .help("Channel endpoint (ws:// or wss://)")
                .global(true),
        )
        .subcommand(
            Command::new("monitor")
                .about("Connect to the patch channel and log patch traffic"),
        )
        .subcommand(
            Command::new("send")
                .about("Encode a delta from files and push it onto the channel")
                .arg(
                    Arg::new("module")
                        .long("module")
                        .value_name("NAME")
                        .required(true)
                        .help("Target module file name"),
                )
                .arg(
                    Arg::new("meta")
                        .long("meta")
                        .value_name("FILE")
                        .required(true)
                        .help("File holding the metadata bytes"),
                )
                .arg(
                    Arg::new("il")
                        .long("il")
                        .value_name("FILE")
                        .required(true)
                        .help("File holding the instruction bytes"),
                )
                .arg(
                    Arg::new("pdb")
                        .long("pdb")
                        .value_name("FILE")
                        .help("File holding the debug-info bytes"),
                ),
        )
        .subcommand_required(true)
        .get_matches();

    // Initialize logging and metrics
    hotpatch::init()?;

    // Load configuration
    let mut config = if let Some(config_path) = matches.get_one::<String>("config") {
        Config::from_file(config_path)?
    } else {
        Config::load()?
    };

    // Apply CLI overrides
    if let Some(endpoint) = matches.get_one::<String>("channel") {
        config.channel.endpoint = endpoint.clone();
    }
    config.validate()?;

    match matches.subcommand() {
        Some(("monitor", _)) => monitor(&config).await,
        Some(("send", sub_matches)) => send(&config, sub_matches).await,
        _ => Ok(()),
    }
}

/// Subscribe to the channel and print a JSON line per patch message.
async fn monitor(config: &Config) -> anyhow::Result<()> {
    let (socket, _) = tokio_tungstenite::connect_async(&config.channel.endpoint)
        .await
        .context("failed to connect to patch channel")?;
    info!(endpoint = %config.channel.endpoint, "monitoring patch channel");

    let mut source = WebSocketFrameSource::new(socket);
    while let Some(next) = source.next_frame().await {
        let frame = next.context("channel error")?;

        if frame.len() > config.channel.max_frame_bytes {
            warn!(bytes = frame.len(), "oversized frame");
            continue;
        }

        match wire::decode(&frame) {
            Ok(message) if message.is_patch() => {
                println!(
                    "{}",
                    serde_json::json!({
                        "type": message.message_type,
                        "modulePath": message.module_path,
                        "metaBytes": message.meta.len(),
                        "ilBytes": message.il.len(),
                        "pdbBytes": message.pdb.len(),
                    })
                );
            }
            Ok(message) => debug!(tag = %message.message_type, "non-patch message"),
            Err(_) => debug!(bytes = frame.len(), "undecodable frame"),
        }
    }

    info!("channel closed");
    Ok(())
}

/// Build a delta from byte files and push it at the target process.
async fn send(config: &Config, matches: &ArgMatches) -> anyhow::Result<()> {
    let module = matches
        .get_one::<String>("module")
        .context("--module is required")?;
    let meta = read_bytes(matches, "meta")?.context("--meta is required")?;
    let il = read_bytes(matches, "il")?.context("--il is required")?;
    let pdb = read_bytes(matches, "pdb")?.unwrap_or_default();

    let delta = ModuleDelta::new(module.clone(), meta, il, pdb);

    let channel = WebSocketChannel::connect(&config.channel.endpoint)
        .await
        .context("failed to connect to patch channel")?;
    let mut sender = PatchSender::new(channel);
    sender.send(&delta).await?;

    println!(
        "sent delta {} for {} ({} bytes)",
        delta.digest(),
        delta.module_name,
        delta.total_len()
    );
    Ok(())
}

fn read_bytes(matches: &ArgMatches, arg: &str) -> anyhow::Result<Option<Vec<u8>>> {
    matches
        .get_one::<String>(arg)
        .map(|path| std::fs::read(path).with_context(|| format!("failed to read --{} file", arg)))
        .transpose()
}
