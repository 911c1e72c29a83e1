//! chess-overlay - board with engine analysis, driven from the terminal.

mod app;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use chess_overlay::config::{self, DEFAULT_CONFIG_FILE};

/// Chess board with background engine analysis
#[derive(Parser, Debug)]
#[command(name = "chess-overlay")]
#[command(about = "Play a position while an engine suggests the best move", long_about = None)]
#[command(version)]
struct Cli {
    /// Settings file (JSON)
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// UCI engine executable, overrides the settings file
    #[arg(long)]
    engine: Option<PathBuf>,

    /// Polyglot opening book, overrides the settings file
    #[arg(long)]
    book: Option<PathBuf>,

    /// Engine strength, overrides the settings file
    #[arg(long)]
    elo: Option<u32>,

    /// Print the JSON Schema of the settings file and exit
    #[arg(long)]
    print_schema: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.print_schema {
        println!("{}", config::schema()?);
        return Ok(());
    }

    // stdout carries the board, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut settings = config::load(&cli.config);
    if let Some(engine) = cli.engine {
        settings.engine_path = Some(engine);
    }
    if let Some(book) = cli.book {
        settings.book_path = Some(book);
    }
    if let Some(elo) = cli.elo {
        settings.elo = elo;
    }

    app::run(settings, &cli.config)
}
