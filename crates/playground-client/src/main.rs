//! Playground spectator binary.
//!
//! # Usage
//!
//! ```bash
//! # List open lobbies as a guest
//! playground-spectate --guest --list
//!
//! # Follow a room live
//! playground-spectate --email alice@example.com --password hunter2 --room R1
//! ```

use std::sync::Arc;

use clap::Parser;
use playground_client::{
    ClientConfig, HttpApi, RoomDriver, RoomNotice, SessionManager, SystemEnv, WebSocketChannel,
    core::{SessionState, proto::{RoomId, RoomStatus}},
    credential_channel,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Playground spectator client
#[derive(Parser, Debug)]
#[command(name = "playground-spectate")]
#[command(about = "Follow playground game rooms from the terminal")]
#[command(version)]
struct Args {
    /// Request/response API base URL
    #[arg(long, default_value = playground_client::DEFAULT_API_BASE_URL)]
    api: String,

    /// Push channel URL
    #[arg(long, default_value = playground_client::DEFAULT_PUSH_URL)]
    push: String,

    /// Room to follow
    #[arg(short, long)]
    room: Option<String>,

    /// Account email
    #[arg(short, long, requires = "password")]
    email: Option<String>,

    /// Account password
    #[arg(short, long, requires = "email")]
    password: Option<String>,

    /// Log in as a guest when the silent refresh fails
    #[arg(long, conflicts_with = "email")]
    guest: bool,

    /// List lobby rooms
    #[arg(long)]
    list: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let config = ClientConfig::new(args.api, args.push);
    tracing::info!("Playground client starting against {}", config.api_base_url);

    let (writer, reader) = credential_channel();
    let api = HttpApi::new(&config, reader)?;
    let mut session = SessionManager::new(api, SystemEnv::new(), writer);
    session.start().await;

    if session.state() == SessionState::AuthRequired {
        if args.guest {
            session.guest_login().await?;
        } else if let (Some(email), Some(password)) = (&args.email, &args.password) {
            session.login(email, password).await?;
        }
    }
    if session.state() != SessionState::Authenticated {
        tracing::error!(notice = ?session.notice(), "Not authenticated");
        return Err("login required".into());
    }
    tracing::info!(name = %session.identity().display_name, "Authenticated");

    if args.list {
        for room in session.list_rooms(Some(RoomStatus::Lobby)).await? {
            tracing::info!(
                id = %room.id,
                name = %room.name,
                game = %room.game_kind,
                players = room.players.len(),
                capacity = room.capacity,
                "lobby room"
            );
        }
    }

    let Some(room) = args.room else {
        return Ok(());
    };

    let push = Arc::new(WebSocketChannel::connect(&config, SystemEnv::new())?);
    let mut driver = RoomDriver::new(RoomId::new(room), push);

    let notices = driver.open(&mut session).await?;
    if !report(&driver, &notices) {
        return Ok(());
    }

    loop {
        tokio::select! {
            notices = driver.next_update() => {
                report(&driver, &notices);
                if let Some(status) = driver.banner() {
                    tracing::warn!(?status, "Live updates stopped");
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            },
        }
    }

    driver.close();
    Ok(())
}

/// Log notices; returns false if the room view should be left.
fn report(driver: &RoomDriver<WebSocketChannel>, notices: &[RoomNotice]) -> bool {
    let mut stay = true;
    for notice in notices {
        match notice {
            RoomNotice::NavigateAway { room_id } => {
                tracing::warn!(%room_id, "Room not found");
                stay = false;
            },
            RoomNotice::FetchFailed { room_id, kind, retryable } => {
                tracing::error!(%room_id, %kind, retryable, "Room unavailable");
                stay = false;
            },
            RoomNotice::Updated { epoch, following: true } => {
                let controller = driver.controller();
                let turn = controller.current_snapshot().and_then(|s| s.turn.as_deref());
                tracing::info!(epoch, turn, "Game state");
            },
            RoomNotice::Updated { epoch, following: false } => {
                let pending = driver.controller().pending_updates();
                tracing::info!(epoch, pending, "Newer game state available");
            },
        }
    }
    if let Some(outcome) = driver.controller().outcome() {
        tracing::info!(normal = outcome.normal, reason = ?outcome.reason, scores = ?outcome.scores, "Game finished");
    }
    stay
}
