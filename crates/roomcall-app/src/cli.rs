use clap::Parser;

/// roomcall — join a video room as a headless console participant.
#[derive(Parser, Debug)]
#[command(name = "roomcall", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long)]
    pub config: Option<String>,

    /// Signaling server URL (ws:// or wss://).
    #[arg(short, long)]
    pub server: Option<String>,

    /// Room to join.
    #[arg(short, long)]
    pub room: Option<String>,

    /// Display name shown to other participants.
    #[arg(short, long)]
    pub name: Option<String>,

    /// Join without a camera.
    #[arg(long)]
    pub audio_only: bool,

    /// Log level override (debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}

pub fn parse() -> Args {
    Args::parse()
}
