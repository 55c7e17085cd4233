mod dial;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use loopback_core::IceServerConfig;
use loopback_server::{AudioCodec, DEFAULT_STUN_SERVER, ServerConfig, SessionConfig, TransportConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "loopback", version, about = "WebRTC audio loopback server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the signaling server and echo every received audio packet.
    Serve(ServeArgs),
    /// Negotiate with a running server over `POST /offer` and count echoes.
    Dial(dial::DialArgs),
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Codec {
    Pcmu,
    Opus,
}

impl From<Codec> for AudioCodec {
    fn from(codec: Codec) -> Self {
        match codec {
            Codec::Pcmu => AudioCodec::pcmu(),
            Codec::Opus => AudioCodec::opus(),
        }
    }
}

#[derive(clap::Args)]
pub struct IceArgs {
    /// STUN/TURN URLs; pass an empty value for host candidates only.
    #[arg(
        long = "ice-server",
        env = "LOOPBACK_ICE_SERVERS",
        value_delimiter = ',',
        default_value = DEFAULT_STUN_SERVER
    )]
    ice_servers: Vec<String>,

    #[arg(long, env = "LOOPBACK_ICE_USERNAME")]
    ice_username: Option<String>,

    #[arg(long, env = "LOOPBACK_ICE_CREDENTIAL")]
    ice_credential: Option<String>,
}

impl IceArgs {
    pub fn to_config(&self) -> Vec<IceServerConfig> {
        let urls: Vec<String> = self
            .ice_servers
            .iter()
            .map(|url| url.trim().to_owned())
            .filter(|url| !url.is_empty())
            .collect();

        if urls.is_empty() {
            return vec![];
        }
        vec![IceServerConfig {
            urls,
            username: self.ice_username.clone(),
            credential: self.ice_credential.clone(),
        }]
    }
}

#[derive(clap::Args)]
struct ServeArgs {
    #[arg(long, env = "LOOPBACK_BIND", default_value = "0.0.0.0:3000")]
    bind: SocketAddr,

    #[arg(long, env = "LOOPBACK_STATIC_DIR", default_value = "./public")]
    static_dir: PathBuf,

    /// Do not serve static files.
    #[arg(long)]
    no_static: bool,

    #[command(flatten)]
    ice: IceArgs,

    #[arg(long, value_enum, default_value_t = Codec::Pcmu)]
    codec: Codec,

    /// Keep the session alive after the peer's end-of-candidates marker.
    #[arg(long)]
    keep_open_after_candidates: bool,
}

impl ServeArgs {
    fn into_config(self) -> ServerConfig {
        let defaults = ServerConfig::default();

        ServerConfig {
            bind: self.bind,
            static_dir: (!self.no_static).then_some(self.static_dir),
            transport: TransportConfig {
                ice_servers: self.ice.to_config(),
                codec: self.codec.into(),
                ..defaults.transport
            },
            session: SessionConfig {
                close_on_end_of_candidates: !self.keep_open_after_candidates,
                ..defaults.session
            },
        }
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Ctrl-C received, shutting down");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Commands::Serve(args) => {
            let config = args.into_config();
            info!(
                "Starting loopback server ({} ICE servers, codec {})",
                config.transport.ice_servers.len(),
                config.transport.codec.mime_type
            );
            loopback_server::serve(config, shutdown_signal()).await
        }
        Commands::Dial(args) => dial::run(args).await,
    }
}
