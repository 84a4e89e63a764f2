//! Queue Tester CLI Tool
//!
//! Command-line tool for exercising the matchmaking queue, either against a
//! running duel-room service over HTTP or against an in-process coordinator.
//!
//! Usage:
//!   cargo run --bin queue-tester -- --help
//!   cargo run --bin queue-tester join --id "0xabc" --username "alice"
//!   cargo run --bin queue-tester size
//!   cargo run --bin queue-tester watch --duration 30
//!   cargo run --bin queue-tester simulate --players 50

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use duel_room::bot::PairingFallbackPolicy;
use duel_room::events::MockEventPublisher;
use duel_room::store::MemoryQueueStore;
use duel_room::types::{JoinRequest, MatchResult, QueueUpdate};
use duel_room::QueueCoordinator;

#[derive(Parser)]
#[command(name = "queue-tester")]
#[command(about = "Queue testing tool for the duel-room matchmaking service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Base URL of a running duel-room service
    #[arg(long, default_value = "http://localhost:8080")]
    url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a player through the HTTP API
    Join {
        /// Player ID
        #[arg(short, long)]
        id: String,
        /// Display name
        #[arg(short, long)]
        username: Option<String>,
    },
    /// Show the current pool size
    Size,
    /// Print events from the live event stream
    Watch {
        /// Duration to watch in seconds
        #[arg(short, long, default_value = "10")]
        duration: u64,
    },
    /// Enroll many players concurrently against an in-process coordinator
    Simulate {
        /// Number of players to enroll
        #[arg(short, long, default_value = "20")]
        players: usize,
        /// Pair a lone player with a mock opponent
        #[arg(long)]
        mock_opponent: bool,
    },
}

async fn join(client: &reqwest::Client, base: &str, id: String, username: Option<String>) -> Result<()> {
    let response = client
        .post(format!("{}/matchmaking/join", base))
        .json(&JoinRequest::new(id.clone(), username))
        .send()
        .await
        .context("Failed to reach matchmaking service")?;

    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        bail!("Join for '{}' rejected with {}: {}", id, status, body);
    }

    let result: MatchResult = serde_json::from_str(&body)?;
    match &result {
        MatchResult::Waiting => println!("⏳ {} is waiting for an opponent", id),
        MatchResult::Matched {
            room_id,
            players,
            is_mock,
        } => {
            println!(
                "🎯 {} matched in room {}{}",
                id,
                room_id,
                if *is_mock { " (mock opponent)" } else { "" }
            );
            for player in players {
                println!(
                    "   - {} ({})",
                    player.id,
                    player.username.as_deref().unwrap_or("anonymous")
                );
            }
        }
    }
    Ok(())
}

async fn size(client: &reqwest::Client, base: &str) -> Result<()> {
    let update: QueueUpdate = client
        .get(format!("{}/matchmaking/queue", base))
        .send()
        .await
        .context("Failed to reach matchmaking service")?
        .error_for_status()?
        .json()
        .await?;

    println!("📊 Players waiting: {}", update.total);
    Ok(())
}

async fn watch(client: &reqwest::Client, base: &str, duration: Duration) -> Result<()> {
    let mut response = client
        .get(format!("{}/matchmaking/events", base))
        .send()
        .await
        .context("Failed to reach matchmaking service")?
        .error_for_status()?;

    println!("👀 Watching events for {}s...", duration.as_secs());
    let deadline = tokio::time::Instant::now() + duration;
    let mut buffer = String::new();

    loop {
        let chunk = match tokio::time::timeout_at(deadline, response.chunk()).await {
            Ok(chunk) => chunk?,
            Err(_) => break,
        };
        let Some(chunk) = chunk else {
            println!("Event stream closed by server");
            break;
        };

        buffer.push_str(&String::from_utf8_lossy(&chunk));
        while let Some(end) = buffer.find("\n\n") {
            let frame: String = buffer.drain(..end + 2).collect();
            let mut event = None;
            let mut data = None;
            for line in frame.lines() {
                if let Some(name) = line.strip_prefix("event:") {
                    event = Some(name.trim().to_string());
                } else if let Some(payload) = line.strip_prefix("data:") {
                    data = Some(payload.trim().to_string());
                }
            }
            if let (Some(event), Some(data)) = (event, data) {
                println!("📨 {} {}", event, data);
            }
        }
    }

    Ok(())
}

async fn simulate(players: usize, mock_opponent: bool) -> Result<()> {
    let store = Arc::new(MemoryQueueStore::new());
    let publisher = Arc::new(MockEventPublisher::new());
    let fallback = if mock_opponent {
        PairingFallbackPolicy::mock_opponent()
    } else {
        PairingFallbackPolicy::None
    };
    let coordinator = QueueCoordinator::new(store, publisher.clone()).with_fallback(fallback);

    println!("🚀 Enrolling {} players concurrently...", players);
    let started = Instant::now();

    let mut handles = Vec::with_capacity(players);
    for index in 0..players {
        let coordinator = coordinator.clone();
        handles.push(tokio::spawn(async move {
            let request = JoinRequest::new(format!("sim-player-{}", index), None);
            coordinator.enroll(request).await
        }));
    }

    let mut waiting = 0usize;
    let mut mock = 0usize;
    let mut failed = 0usize;
    let mut paired: HashSet<String> = HashSet::new();
    let mut rooms = 0usize;

    for handle in handles {
        match handle.await? {
            Ok(MatchResult::Waiting) => waiting += 1,
            Ok(MatchResult::Matched { is_mock: true, .. }) => mock += 1,
            Ok(MatchResult::Matched { players, .. }) => {
                rooms += 1;
                for player in players {
                    if !paired.insert(player.id.clone()) {
                        bail!("Player '{}' was paired more than once", player.id);
                    }
                }
            }
            Err(e) => {
                eprintln!("❌ Enrollment failed: {}", e);
                failed += 1;
            }
        }
    }

    let elapsed = started.elapsed();
    let remaining = coordinator.pool_size().await?;

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("   Rooms formed: {}", rooms);
    println!("   Players paired: {}", paired.len());
    println!("   Mock matches: {}", mock);
    println!("   Waiting responses: {}", waiting);
    println!("   Failures: {}", failed);
    println!("   Left in pool: {}", remaining);
    println!(
        "   matchFound events: {}",
        publisher.match_found_events().len()
    );
    println!("   Elapsed: {:?}", elapsed);

    if paired.len() + mock + remaining as usize != players {
        bail!(
            "Player accounting mismatch: {} paired, {} mock, {} waiting, {} enrolled",
            paired.len(),
            mock,
            remaining,
            players
        );
    }

    println!("✅ Every player is either paired exactly once or still waiting");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let base = cli.url.trim_end_matches('/').to_string();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Join { id, username } => join(&client, &base, id, username).await,
        Commands::Size => size(&client, &base).await,
        Commands::Watch { duration } => watch(&client, &base, Duration::from_secs(duration)).await,
        Commands::Simulate {
            players,
            mock_opponent,
        } => simulate(players, mock_opponent).await,
    }
}
