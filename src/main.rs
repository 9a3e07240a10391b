use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use voice_room::{create_router, AppState, Config, ConversationTurn, SessionError, Speaker, VoiceClient};

#[derive(Parser)]
#[command(name = "voice-room", about = "Talk to the voice assistant over a real-time room")]
struct Cli {
    /// Config file (extension optional)
    #[arg(long, default_value = "config/voice-room")]
    config: String,

    /// Participant identity, random `user-N` if omitted
    #[arg(long)]
    identity: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Join the room and print the conversation
    Talk,
    /// Serve the HTTP control API
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("{} starting", cfg.service.name);
    info!("Room: {} via {}", cfg.room.name, cfg.room.nats_url);
    info!("Token service: {}", cfg.token.endpoint);

    let identity = cli.identity.unwrap_or_else(random_identity);
    let client = Arc::new(VoiceClient::from_config(&cfg)?);

    match cli.command {
        Command::Talk => talk(client, &identity).await,
        Command::Serve => serve(client, identity, &cfg).await,
    }
}

fn random_identity() -> String {
    format!("user-{}", uuid::Uuid::new_v4().as_u128() % 10000)
}

fn print_turn(turn: &ConversationTurn) {
    let who = match turn.speaker {
        Speaker::User => "you",
        Speaker::Assistant => "assistant",
    };
    println!("{} > {}", who, turn.text);
}

async fn talk(client: Arc<VoiceClient>, identity: &str) -> Result<()> {
    let session = client.session();

    session.on_connection_state_changed(|state| println!("[{}]", state));
    session.on_agent_presence(|present| {
        if present {
            println!("Voice assistant connected");
        } else {
            println!("Voice assistant disconnected");
        }
    });

    let mut turns = client.conversation().subscribe();

    match session.connect(identity).await {
        Ok(()) => {}
        Err(SessionError::Device(e)) => warn!("Connected without microphone: {}", e),
        Err(e) => return Err(e).context("Failed to connect to voice assistant room"),
    }

    println!("Connected as {}. Type 'mute', 'unmute' or 'quit'.", identity);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            turn = turns.recv() => match turn {
                Ok(turn) => print_turn(&turn),
                Err(RecvError::Lagged(n)) => warn!("Skipped {} turns", n),
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line() => match line?.as_deref().map(str::trim) {
                Some("mute") => {
                    if let Err(e) = session.disable_audio().await {
                        error!("Failed to mute: {}", e);
                    }
                }
                Some("unmute") => {
                    if let Err(e) = session.enable_audio().await {
                        error!("Failed to enable microphone: {}", e);
                    }
                }
                Some("quit") | None => break,
                Some("") => {}
                Some(other) => println!("Unknown command '{}'", other),
            },
        }
    }

    session.disconnect().await;
    Ok(())
}

async fn serve(client: Arc<VoiceClient>, identity: String, cfg: &Config) -> Result<()> {
    let app = create_router(AppState::new(Arc::clone(&client), identity));

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Control API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    client.session().disconnect().await;
    Ok(())
}
