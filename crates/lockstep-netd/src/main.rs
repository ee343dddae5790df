use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

use lockstep_netd::{ServerConfig, ServerControl, ServerHub, run_server};
use lockstep_sim::{DemoWorld, StaticCredentials};

/// Lockstep multiplayer authority
#[derive(Parser, Debug)]
#[command(name = "lockstep-netd")]
#[command(about = "Deterministic lockstep game server", long_about = None)]
struct Args {
    /// TCP bind address
    #[arg(short, long, default_value = "0.0.0.0:3979")]
    bind: String,

    /// Server name reported to game info queries
    #[arg(long, default_value = "Unnamed Server")]
    name: String,

    #[arg(long, default_value_t = 10)]
    max_clients: usize,

    /// Ticks the command ceiling advances by
    #[arg(long, default_value_t = 1)]
    frame_freq: u32,

    /// Ticks between fingerprint syncs
    #[arg(long, default_value_t = 100)]
    sync_freq: u32,

    /// Attach the fingerprint to every frame
    #[arg(long)]
    sync_every_frame: bool,

    /// Ticks a joining client may lag before it is dropped
    #[arg(long, default_value_t = 500)]
    max_join_time: u32,

    /// Game password (empty for none)
    #[arg(long, default_value = "")]
    password: String,

    /// Milliseconds per tick
    #[arg(long, default_value_t = 30)]
    tick_ms: u64,

    /// World seed (random when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Number of playable roles in the demo world
    #[arg(long, default_value_t = 4)]
    roles: u8,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: Level,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let bind: SocketAddr = args.bind.parse()?;
    let config = ServerConfig {
        bind,
        server_name: args.name,
        max_clients: args.max_clients,
        frame_freq: args.frame_freq,
        sync_freq: args.sync_freq,
        sync_every_frame: args.sync_every_frame,
        max_join_time: args.max_join_time,
        tick_interval: Duration::from_millis(args.tick_ms),
        ..ServerConfig::default()
    };

    let seed = args.seed.unwrap_or_else(rand::random);
    let world = DemoWorld::new(seed, args.roles);
    let creds = StaticCredentials::new().with_game_password(args.password);
    let hub = ServerHub::new(config, world, creds);

    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(async move {
        if let Err(e) = lockstep_netd::net::tcp::run_tcp_listener(bind, tx).await {
            error!(error = %e, "TCP listener failed");
        }
    });

    let (control_tx, control_rx) = mpsc::channel(64);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, shutting down");
            let _ = control_tx.send(ServerControl::Shutdown).await;
        }
    });

    info!("Lockstep server started on {} (seed {})", args.bind, seed);
    info!("Log level: {}", args.log_level);

    run_server(rx, control_rx, hub, None).await
}
