use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use cloudsfu_controller::{ControllerApi, ControllerClient, RouterConfig};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "cloudsfu-ctl")]
#[command(about = "Inspect and manage resources on a CloudSFU controller", long_about = None)]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, env = "CLOUDSFU_CONFIG")]
    pub config: Option<String>,

    /// Controller base URL, overrides the configuration
    #[arg(long, env = "CLOUDSFU_CONTROLLER_URL")]
    pub controller_url: Option<String>,

    /// Log every controller request and response
    #[arg(long)]
    pub debug_requests: bool,

    /// Log level, overrides the configuration
    #[arg(long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Routers
    #[command(subcommand)]
    Routers(RouterCommand),
    /// WebRTC transports of a router
    #[command(subcommand)]
    Transports(ResourceCommand),
    /// Media producers of a router
    #[command(subcommand)]
    Producers(ProducerCommand),
    /// Media consumers of a router
    #[command(subcommand)]
    Consumers(ResourceCommand),
    /// SFU instances registered with the controller
    #[command(subcommand)]
    Sfus(SfuCommand),
}

#[derive(Subcommand, Debug)]
pub enum RouterCommand {
    List,
    Get { router_id: String },
    Create {
        /// Region to place the router in
        #[arg(long)]
        region: Option<String>,
        /// Routers to pipe-connect the new one with
        #[arg(long = "peer")]
        peers: Vec<String>,
    },
    Delete { router_id: String },
    Stats { router_id: String },
    /// Pipe-connect two routers
    Connect {
        router_id: String,
        remote_router_id: String,
    },
    Disconnect {
        router_id: String,
        remote_router_id: String,
    },
}

#[derive(Args, Debug)]
pub struct Target {
    pub router_id: String,
    pub id: String,
}

#[derive(Subcommand, Debug)]
pub enum ResourceCommand {
    List { router_id: String },
    Get(Target),
    Delete(Target),
}

#[derive(Subcommand, Debug)]
pub enum ProducerCommand {
    List { router_id: String },
    Get(Target),
    Delete(Target),
    Pause(Target),
    Resume(Target),
}

#[derive(Subcommand, Debug)]
pub enum SfuCommand {
    List,
    Get { sfu_id: String },
    /// Stop placing new routers on an SFU (`host:port`)
    Drain { endpoint: String },
    Undrain { endpoint: String },
    Config { endpoint: String },
    /// Prometheus metrics of an SFU, as text
    Metrics { endpoint: String },
}

/// Result of one command, printed to stdout
#[derive(Debug, PartialEq)]
pub enum Output {
    Json(Value),
    Text(String),
}

fn to_json(value: impl Serialize) -> Result<Output> {
    Ok(Output::Json(serde_json::to_value(value)?))
}

fn done(action: &str, id: &str) -> Output {
    Output::Json(json!({ "ok": true, "action": action, "id": id }))
}

pub async fn run(client: &ControllerClient, command: Command) -> Result<Output> {
    match command {
        Command::Routers(cmd) => routers(client, cmd).await,
        Command::Transports(cmd) => transports(client, cmd).await,
        Command::Producers(cmd) => producers(client, cmd).await,
        Command::Consumers(cmd) => consumers(client, cmd).await,
        Command::Sfus(cmd) => sfus(client, cmd).await,
    }
}

async fn routers(client: &ControllerClient, cmd: RouterCommand) -> Result<Output> {
    match cmd {
        RouterCommand::List => to_json(client.list_router_ids().await?),
        RouterCommand::Get { router_id } => to_json(client.get_router(&router_id).await?),
        RouterCommand::Create { region, peers } => {
            let config = RouterConfig {
                preferred_region: region,
                media_codecs: None,
                peer_router_ids: (!peers.is_empty()).then_some(peers),
            };
            let router = client.create_router(&config).await?;
            info!(router_id = %router.id, region = %router.region, "Router created");
            to_json(router)
        }
        RouterCommand::Delete { router_id } => {
            client.delete_router(&router_id).await?;
            Ok(done("delete", &router_id))
        }
        RouterCommand::Stats { router_id } => {
            Ok(Output::Json(client.get_router_stats(&router_id).await?))
        }
        RouterCommand::Connect {
            router_id,
            remote_router_id,
        } => {
            client.connect_routers(&router_id, &remote_router_id).await?;
            Ok(done("connect", &router_id))
        }
        RouterCommand::Disconnect {
            router_id,
            remote_router_id,
        } => {
            client
                .disconnect_routers(&router_id, &remote_router_id)
                .await?;
            Ok(done("disconnect", &router_id))
        }
    }
}

async fn transports(client: &ControllerClient, cmd: ResourceCommand) -> Result<Output> {
    match cmd {
        ResourceCommand::List { router_id } => {
            to_json(client.list_webrtc_transport_ids(&router_id).await?)
        }
        ResourceCommand::Get(t) => to_json(client.get_webrtc_transport(&t.router_id, &t.id).await?),
        ResourceCommand::Delete(t) => {
            client.delete_webrtc_transport(&t.router_id, &t.id).await?;
            Ok(done("delete", &t.id))
        }
    }
}

async fn producers(client: &ControllerClient, cmd: ProducerCommand) -> Result<Output> {
    match cmd {
        ProducerCommand::List { router_id } => {
            to_json(client.list_media_producer_ids(&router_id).await?)
        }
        ProducerCommand::Get(t) => to_json(client.get_media_producer(&t.router_id, &t.id).await?),
        ProducerCommand::Delete(t) => {
            client.delete_media_producer(&t.router_id, &t.id).await?;
            Ok(done("delete", &t.id))
        }
        ProducerCommand::Pause(t) => {
            client.pause_media_producer(&t.router_id, &t.id).await?;
            Ok(done("pause", &t.id))
        }
        ProducerCommand::Resume(t) => {
            client.resume_media_producer(&t.router_id, &t.id).await?;
            Ok(done("resume", &t.id))
        }
    }
}

async fn consumers(client: &ControllerClient, cmd: ResourceCommand) -> Result<Output> {
    match cmd {
        ResourceCommand::List { router_id } => {
            to_json(client.list_media_consumer_ids(&router_id).await?)
        }
        ResourceCommand::Get(t) => to_json(client.get_media_consumer(&t.router_id, &t.id).await?),
        ResourceCommand::Delete(t) => {
            client.delete_media_consumer(&t.router_id, &t.id).await?;
            Ok(done("delete", &t.id))
        }
    }
}

async fn sfus(client: &ControllerClient, cmd: SfuCommand) -> Result<Output> {
    match cmd {
        SfuCommand::List => to_json(client.list_sfus().await?),
        SfuCommand::Get { sfu_id } => {
            let sfu = client
                .get_sfu(&sfu_id)
                .await?
                .with_context(|| format!("SFU {sfu_id} is not registered"))?;
            to_json(sfu)
        }
        SfuCommand::Drain { endpoint } => {
            client.drain_sfu(&endpoint).await?;
            Ok(done("drain", &endpoint))
        }
        SfuCommand::Undrain { endpoint } => {
            client.undrain_sfu(&endpoint).await?;
            Ok(done("undrain", &endpoint))
        }
        SfuCommand::Config { endpoint } => Ok(Output::Json(client.get_sfu_config(&endpoint).await?)),
        SfuCommand::Metrics { endpoint } => Ok(Output::Text(client.get_sfu_metrics(&endpoint).await?)),
    }
}
