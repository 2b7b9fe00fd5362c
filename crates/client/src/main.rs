mod app;
mod debug;
mod game;
pub mod net;
mod tui;

use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use env_logger::{Env, Target};

use app::SyncEngine;
use net::config::DEFAULT_SERVER_URL;
use net::{ClientConfig, WsTransport};

#[derive(Parser)]
#[command(name = "rally")]
#[command(about = "Two-player rally game client")]
struct Args {
    #[arg(short, long, default_value = DEFAULT_SERVER_URL, help = "Game server WebSocket URL")]
    server: String,

    #[arg(short, long, env = "RALLY_TOKEN", help = "Session credential issued by the lobby")]
    token: Option<String>,

    #[arg(long, default_value_t = 60, help = "Target frames per second")]
    fps: u32,

    #[arg(
        long,
        default_value_t = 10,
        help = "Seconds without a connection before giving up"
    )]
    timeout_secs: u64,

    #[arg(long, default_value = "rally-client.log", help = "Log output file")]
    log_file: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // The terminal belongs to the renderer, so logs go to a file.
    let log_file = File::create(&args.log_file)?;
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Pipe(Box::new(log_file)))
        .init();

    let config = ClientConfig {
        server_url: args.server,
        token: args.token,
        frame_rate: args.fps.max(1),
        disconnect_timeout: Duration::from_secs(args.timeout_secs),
        ..ClientConfig::default()
    };
    log::info!("Connecting to {}", config.server_url);

    let transport = WsTransport::new()?;
    let mut engine = SyncEngine::new(transport, config);
    engine.start()?;

    if let Err(e) = tui::run(&mut engine) {
        eprintln!("TUI error: {}", e);
        return Err(e.into());
    }

    log::info!("Client exited");
    Ok(())
}
