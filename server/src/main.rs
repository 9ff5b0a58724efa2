use anyhow::Result;
use clap::{Parser, Subcommand};

use phenocam_server::config::ServeArgs;
use phenocam_server::inspect::{self, GalleryArgs, ResolveArgs, SeriesArgs};
use phenocam_server::serve;

#[derive(Parser, Debug)]
#[command(name = "phenocam-server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the dashboard API
    Serve(ServeArgs),
    /// Print the image catalog, newest first
    Gallery(GalleryArgs),
    /// Resolve a date to its data file
    Resolve(ResolveArgs),
    /// Print the reshaped NDVI series
    Series(SeriesArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve(args) => serve::run(args),
        Command::Gallery(args) => inspect::gallery(args),
        Command::Resolve(args) => inspect::resolve(args),
        Command::Series(args) => inspect::series(args),
    }
}
