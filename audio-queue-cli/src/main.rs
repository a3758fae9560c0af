//! audio-queue: record the microphone into one PCM file, play it back
//! (optionally pitch shifted), and chart its amplitude as a paginated PDF.

mod cli;
mod commands;

use clap::Parser;
use log::info;

use cli::Command;

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();
    cli::init_logging(&args);

    info!("audio-queue {}", env!("CARGO_PKG_VERSION"));

    match &args.command {
        Command::Record {
            seconds,
            device,
            report,
        } => commands::record(&args, *seconds, device.as_deref(), *report),
        Command::Play {
            pitch,
            seconds,
            device,
        } => commands::play(&args, pitch.offset_cents(), *seconds, device.as_deref()),
        Command::Report { out, json, window } => commands::report(&args, out.clone(), *json, *window),
        Command::Devices => commands::devices(&args),
    }
}
