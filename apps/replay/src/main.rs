mod commands;
mod config;
mod logging;
mod session;
mod view;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use iox::{FileTripSource, TripSource};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use commands::{Command, ParseError, Reply};
use session::AppSession;

/// Replay a completed collection trip against a headless map view.
#[derive(Parser, Debug)]
#[command(name = "geocoleta-replay", version)]
struct Cli {
    /// Trip file (.json, .ndjson/.jsonl or .csv)
    trip: PathBuf,

    /// Config file; defaults to <config dir>/geocoleta/replay.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Initial speed slider value (higher is faster)
    #[arg(long)]
    speed: Option<u64>,

    /// Play once to the end and exit instead of reading commands
    #[arg(long)]
    autoplay: bool,

    /// Write the static map layers as GeoJSON
    #[arg(long)]
    geojson: Option<PathBuf>,

    /// Also log to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_file.as_deref())?;
    let cfg = config::load_config(cli.config.as_deref())?;

    let trip = FileTripSource::new(&cli.trip).load().await?;
    let session = AppSession::new(trip, &cfg)?;

    if let Some(v) = cli.speed {
        session.set_speed(v);
    }
    if let Some(out) = &cli.geojson {
        iox::write_json(&session.map().to_geojson(), out)?;
        info!(path = %out.display(), "map layers written");
    }

    if cli.autoplay || cfg.autoplay {
        session.run_to_end().await?;
        println!("{}", commands::status(&session));
        return Ok(());
    }
    repl(&session).await
}

async fn repl(session: &AppSession) -> Result<()> {
    println!("{}", commands::HELP);
    println!("{}", commands::status(session));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.parse::<Command>() {
            Ok(cmd) => match commands::run(session, cmd) {
                Reply::Text(t) => println!("{}", t),
                Reply::Quit => break,
            },
            Err(ParseError::Empty) => {}
            Err(e) => {
                warn!(%line, "bad command");
                println!("{}", e);
            }
        }
    }
    session.clock.pause();
    Ok(())
}
