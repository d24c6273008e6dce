//! # craftstudio
//!
//! Headless front end for the studio client layer.
//!
//! ## Commands
//!
//! - `watch` - connect to instances and log connection changes and pushed events
//! - `call` - send one JSON-RPC call to an instance and print the result
//! - `instances` - list, add, remove, or activate configured instances

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use shared_types::InstanceId;
use studio_client::endpoint::{parse_ws_url, redact};
use studio_client::{RpcClient, ServerEvent, Subscription};
use studio_runtime::{FileApiKeySource, InstanceBinding, InstanceConfig, StudioConfig};
use studio_telemetry::{init_logging, TelemetryConfig};
use tracing::{info, warn};

/// CraftStudio daemon client
#[derive(Parser, Debug)]
#[command(name = "craftstudio")]
#[command(about = "Talk to CraftOBJ daemons over JSON-RPC/WebSocket")]
struct Cli {
    /// Config file (default: $CS_CONFIG or ~/.craftstudio/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect and log connection changes and events until Ctrl+C
    Watch {
        /// Instances to watch (default: the auto-connect ones)
        #[arg(short, long = "instance")]
        instances: Vec<InstanceId>,
    },

    /// Call a method on one instance
    Call {
        instance: InstanceId,
        method: String,
        /// JSON params, e.g. '{"cid":"..."}'
        params: Option<String>,
        /// Deadline for connecting and for the response
        #[arg(short, long, default_value = "30s", value_parser = parse_duration)]
        timeout: Duration,
    },

    /// Manage configured instances
    Instances {
        #[command(subcommand)]
        action: Option<InstancesCommand>,
    },
}

#[derive(Subcommand, Debug)]
enum InstancesCommand {
    /// Print configured instances
    List,
    /// Add an instance
    Add {
        id: InstanceId,
        url: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        auto_connect: bool,
        /// Daemon data directory holding its api_key file
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Remove an instance
    Remove { id: InstanceId },
    /// Make an instance the active one
    Use { id: InstanceId },
}

fn parse_duration(input: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(input).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut telemetry = TelemetryConfig::from_env();
    if cli.verbose {
        telemetry = telemetry.with_log_level("debug");
    }
    let _guard = init_logging(&telemetry).context("Failed to initialise logging")?;

    let path = match cli.config {
        Some(path) => path,
        None => StudioConfig::default_path()?,
    };
    let config = StudioConfig::load_from(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;

    match cli.command {
        Command::Watch { instances } => watch(config, instances).await,
        Command::Call {
            instance,
            method,
            params,
            timeout,
        } => call(config, instance, &method, params.as_deref(), timeout).await,
        Command::Instances { action } => {
            manage_instances(config, &path, action.unwrap_or(InstancesCommand::List))
        }
    }
}

async fn watch(mut config: StudioConfig, only: Vec<InstanceId>) -> Result<()> {
    if !only.is_empty() {
        for id in &only {
            if config.instance(id).is_none() {
                bail!("Unknown instance '{id}'");
            }
        }
        config.instances.retain(|instance| only.contains(&instance.id));
        config.active = None;
        for instance in &mut config.instances {
            instance.auto_connect = true;
        }
    }

    let binding = InstanceBinding::load(&config, Arc::new(FileApiKeySource))?;
    let mut subscriptions: Vec<Subscription> = Vec::new();
    for instance in binding.instances().iter().filter(|i| i.auto_connect) {
        let client = binding.client(&instance.id)?;
        subscriptions.extend(log_activity(&client));
    }

    info!(instances = binding.registry().len(), "Watching. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    drop(subscriptions);
    binding.shutdown();
    Ok(())
}

fn log_activity(client: &RpcClient) -> [Subscription; 2] {
    let id = client.instance_id().clone();
    let url = redact(client.url());
    let connection = client.on_connection(move |connected| {
        if connected {
            info!(instance = %id, %url, "Connected");
        } else {
            warn!(instance = %id, %url, "Disconnected");
        }
    });

    let id = client.instance_id().clone();
    let events = client.on_event(move |event: &ServerEvent| {
        info!(instance = %id, method = %event.method, params = %event.params, "Event");
    });
    [connection, events]
}

async fn call(
    config: StudioConfig,
    id: InstanceId,
    method: &str,
    params: Option<&str>,
    timeout: Duration,
) -> Result<()> {
    let instance = config
        .instance(&id)
        .cloned()
        .with_context(|| format!("Unknown instance '{id}'"))?;
    let params: Option<Value> = params
        .map(serde_json::from_str)
        .transpose()
        .context("Params must be valid JSON")?;

    let binding = InstanceBinding::new(config.client.clone(), Arc::new(FileApiKeySource))?;
    let client = binding.add_instance(InstanceConfig {
        auto_connect: true,
        ..instance
    })?;

    let outcome = call_connected(&client, method, params, timeout).await;
    binding.shutdown();
    outcome
}

async fn call_connected(
    client: &RpcClient,
    method: &str,
    params: Option<Value>,
    timeout: Duration,
) -> Result<()> {
    wait_connected(client, timeout).await?;
    let result: Value = client
        .call_with_timeout(method, params, Some(timeout))
        .await
        .with_context(|| format!("{method} failed"))?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn wait_connected(client: &RpcClient, within: Duration) -> Result<()> {
    let (tx, mut rx) = tokio::sync::watch::channel(false);
    let _subscription = client.on_connection(move |connected| {
        let _ = tx.send(connected);
    });

    tokio::time::timeout(within, rx.wait_for(|connected| *connected))
        .await
        .with_context(|| format!("Could not connect to {} within {within:?}", redact(client.url())))?
        .context("Client was destroyed while connecting")?;
    Ok(())
}

fn manage_instances(
    mut config: StudioConfig,
    path: &Path,
    action: InstancesCommand,
) -> Result<()> {
    match action {
        InstancesCommand::List => {
            for instance in &config.instances {
                let marker = if config.active.as_ref() == Some(&instance.id) {
                    "*"
                } else {
                    " "
                };
                let url = parse_ws_url(&instance.url)
                    .map(|url| redact(&url))
                    .unwrap_or_else(|_| instance.url.clone());
                println!(
                    "{marker} {:<16} {:<24} {} {}",
                    instance.id,
                    instance.name,
                    url,
                    if instance.auto_connect { "(auto)" } else { "" }
                );
            }
            return Ok(());
        }
        InstancesCommand::Add {
            id,
            url,
            name,
            auto_connect,
            data_dir,
        } => {
            if config.instance(&id).is_some() {
                bail!("Instance '{id}' already exists");
            }
            let mut instance = InstanceConfig::new(id, url);
            if let Some(name) = name {
                instance.name = name;
            }
            instance.auto_connect = auto_connect;
            instance.data_dir = data_dir;
            config.instances.push(instance);
        }
        InstancesCommand::Remove { id } => {
            let before = config.instances.len();
            config.instances.retain(|instance| instance.id != id);
            if config.instances.len() == before {
                bail!("Unknown instance '{id}'");
            }
            if config.active.as_ref() == Some(&id) {
                config.active = None;
            }
        }
        InstancesCommand::Use { id } => {
            if config.instance(&id).is_none() {
                bail!("Unknown instance '{id}'");
            }
            config.active = Some(id);
        }
    }

    config.validate()?;
    config
        .save_to(path)
        .with_context(|| format!("Failed to save config to {}", path.display()))
}
