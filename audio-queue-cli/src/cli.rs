//! Argument parsing and logging setup.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use log::LevelFilter;

use audio_queue_core::models::config::DEFAULT_FILE_NAME;
use audio_queue_core::PitchMode;

/// Record the microphone to one PCM file, play it back, and chart its amplitude.
#[derive(Parser, Debug)]
#[command(name = "audio-queue")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Increase logging verbosity
    /// -v = info, -vv = debug, -vvv = trace
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Recording file (default: <documents>/recordedAudio.wav)
    #[arg(long, global = true)]
    pub file: Option<PathBuf>,

    /// Use the software device instead of audio hardware
    #[arg(long = "virtual", global = true)]
    pub use_virtual: bool,

    /// Buffers in each ring
    #[arg(long, default_value_t = 3, global = true)]
    pub buffers: usize,

    /// Bytes per buffer
    #[arg(long, default_value_t = 1024, global = true)]
    pub buffer_size: usize,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Record from the input device, overwriting the file
    Record {
        /// Stop after this many seconds instead of waiting for Enter
        #[arg(long)]
        seconds: Option<f64>,

        /// Input device name (default: system default)
        #[arg(long)]
        device: Option<String>,

        /// Also write the amplitude report PDF next to the file
        #[arg(long)]
        report: bool,
    },

    /// Play the file on the output device
    Play {
        #[command(flatten)]
        pitch: PitchArgs,

        /// Stop after this many seconds instead of at end of file
        #[arg(long)]
        seconds: Option<f64>,

        /// Output device name (default: system default)
        #[arg(long)]
        device: Option<String>,
    },

    /// Render the amplitude report from the file's metadata sidecar
    Report {
        /// Output path (default: the recording path with a .pdf or .json extension)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Write the document model as JSON instead of PDF
        #[arg(long)]
        json: bool,

        /// Seconds of audio per chart panel
        #[arg(long, default_value_t = 10.0)]
        window: f64,
    },

    /// List input and output devices
    Devices,
}

#[derive(ClapArgs, Debug, Default)]
#[group(multiple = false)]
pub struct PitchArgs {
    /// Pitch offset in cents (-600..=600)
    #[arg(long, allow_hyphen_values = true)]
    pub pitch: Option<f32>,

    /// Play two semitones up
    #[arg(long)]
    pub high: bool,

    /// Play two semitones down
    #[arg(long)]
    pub low: bool,
}

impl PitchArgs {
    pub fn offset_cents(&self) -> Option<f32> {
        if self.high {
            PitchMode::High.cents()
        } else if self.low {
            PitchMode::Low.cents()
        } else {
            self.pitch
        }
    }
}

impl Args {
    /// Get the log level filter based on verbosity flags
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            LevelFilter::Error
        } else {
            match self.verbose {
                0 => LevelFilter::Warn,
                1 => LevelFilter::Info,
                2 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }

    pub fn recording_path(&self) -> PathBuf {
        match &self.file {
            Some(path) => path.clone(),
            None => dirs_next::document_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(DEFAULT_FILE_NAME),
        }
    }
}

/// Initialize the logging system based on CLI arguments
pub fn init_logging(args: &Args) {
    let mut builder = env_logger::Builder::new();

    // Dependencies stay at warn; cpal backends can be chatty.
    builder.filter_level(LevelFilter::Warn);

    builder.filter_module("audio_queue", args.log_level());
    builder.filter_module("audio_queue_core", args.log_level());
    builder.filter_module("audio_queue_cpal", args.log_level());

    if args.verbose >= 4 {
        builder.filter_module("cpal", args.log_level());
    }

    builder.format_timestamp_millis().init();
}
