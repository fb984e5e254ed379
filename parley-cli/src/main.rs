use std::net::SocketAddr;
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use parley_core::{RoomLocator, features};
use parley_engine::{
    EngineConfig, Session, SessionHandle, SessionNotice, TrackInfo, TrackKind,
    WebRtcEndpointFactory, WsRelay,
};
use parley_relay::{DEFAULT_BIND_ADDR, RelayConfig};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::LocalSet;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "parley", about = "Two-party calls over a websocket relay")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the room relay.
    Relay {
        #[arg(long, default_value = DEFAULT_BIND_ADDR)]
        bind: SocketAddr,
    },
    /// Join a room. Without a room id a new one is created.
    Join {
        /// `<relay>#<room>` or a bare 7-digit room id.
        locator: Option<String>,

        #[arg(long, default_value = "ws://127.0.0.1:3000")]
        relay: String,

        #[arg(long)]
        no_video: bool,

        #[arg(long)]
        audio: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Commands::Relay { bind } => {
            println!("{}", format!("Relay listening on ws://{}", bind).green().bold());
            parley_relay::run(RelayConfig {
                bind,
                ..Default::default()
            })
            .await
        }
        Commands::Join {
            locator,
            relay,
            no_video,
            audio,
        } => {
            let raw = match locator {
                Some(l) if l.contains('#') => l,
                Some(room) => format!("{}#{}", relay, room),
                None => relay,
            };
            let (locator, generated) = RoomLocator::resolve(&raw);
            if generated {
                println!("{}", "Created a new room".yellow());
            }
            println!("Share this address: {}", locator.to_string().cyan().bold());

            let mut config = EngineConfig::default();
            if no_video {
                config.local_tracks.clear();
            }
            if audio {
                config
                    .local_tracks
                    .push(TrackInfo::local(TrackKind::Audio, "microphone"));
                config.initial_features.insert(features::AUDIO.to_owned(), true);
            }

            LocalSet::new().run_until(join(locator, config)).await
        }
    }
}

async fn join(locator: RoomLocator, config: EngineConfig) -> Result<()> {
    let (relay, relay_rx) = WsRelay::new(&locator);
    let factory = WebRtcEndpointFactory::new(config.ice_servers.clone());

    let (session, handle, mut notices) =
        Session::start(config, Rc::new(relay), relay_rx, Rc::new(factory))
            .await
            .context("failed to start session")?;
    tokio::task::spawn_local(session.run());
    handle.join();

    println!(
        "{}",
        "Type to chat. Commands: /mute /unmute /filter /leave /join /quit".dimmed()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("failed to read stdin")? {
                    Some(line) => {
                        if !dispatch(&handle, line.trim()) {
                            break;
                        }
                    }
                    None => break,
                }
            }

            Some(notice) = notices.recv() => print_notice(notice),
        }
    }

    println!("{}", "Bye".green());
    Ok(())
}

/// Returns false when the user asked to quit.
fn dispatch(handle: &SessionHandle, line: &str) -> bool {
    match line {
        "" => {}
        "/quit" => return false,
        "/leave" => {
            handle.leave();
        }
        "/join" => {
            handle.join();
        }
        "/mute" => {
            handle.set_feature(features::AUDIO, false);
        }
        "/unmute" => {
            handle.set_feature(features::AUDIO, true);
        }
        "/filter" => {
            handle.cycle_filter();
        }
        text => {
            handle.send_chat(text);
        }
    }
    true
}

fn print_notice(notice: SessionNotice) {
    match notice {
        SessionNotice::RoleAssigned(role) => {
            println!("{}", format!("Peer joined, acting {:?}", role).yellow());
        }
        SessionNotice::ChatReceived { text, .. } => {
            println!("{} {}", "peer>".blue().bold(), text);
        }
        SessionNotice::ChatDelivered { delayed, .. } => {
            if delayed {
                println!("{}", "(delivered late)".red().dimmed());
            } else {
                println!("{}", "(delivered)".green().dimmed());
            }
        }
        SessionNotice::PeerFeatureChanged { name, enabled } => {
            let state = if enabled { "on" } else { "off" };
            println!("{}", format!("Peer {} {}", name, state).cyan());
        }
        SessionNotice::ConnectionStateChanged(state) => {
            println!("{}", format!("Connection {:?}", state).dimmed());
        }
        SessionNotice::PeerFilterChanged(filter) => {
            println!("{}", format!("Peer switched filter to {}", filter).magenta());
        }
        SessionNotice::RemoteTrackAdded(track) => {
            println!("{}", format!("Receiving {:?} from peer", track.kind).cyan());
        }
        SessionNotice::RemoteMediaDetached => {
            println!("{}", "Peer left".yellow());
        }
    }
}
