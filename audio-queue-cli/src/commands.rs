//! Subcommand implementations.

use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use log::{info, warn};

use audio_queue_core::report::pdf;
use audio_queue_core::storage::metadata;
use audio_queue_core::{
    event_channel, AudioSession, Document, EngineConfiguration, EngineEvent, EngineState,
    PaginatedReportBuilder, QueueDevice, QueueDirection, ReportConfiguration,
    SessionConfiguration, VirtualQueueDevice, VirtualSignal,
};
use audio_queue_cpal::{check_microphone_permission, check_output_available, CpalQueueDevice, DeviceEnumerator};

use crate::cli::Args;

type DynDevice = Box<dyn QueueDevice>;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Tone the software capture device records.
const VIRTUAL_SIGNAL: VirtualSignal = VirtualSignal::Sine {
    frequency: 440.0,
    amplitude: 8_000,
};

fn session_config(args: &Args) -> SessionConfiguration {
    SessionConfiguration {
        engine: EngineConfiguration {
            file_path: args.recording_path(),
            buffer_count: args.buffers,
            buffer_size_bytes: args.buffer_size,
            ..Default::default()
        },
        report: ReportConfiguration::default(),
        write_metadata: true,
    }
}

/// Build a device for one direction. The idle direction of a session is
/// never created, so its device costs nothing.
fn open_device(args: &Args, direction: QueueDirection, name: Option<&str>) -> Result<DynDevice> {
    if args.use_virtual {
        let config = EngineConfiguration::default();
        let period = Duration::from_secs_f64(config.format.bytes_to_secs(args.buffer_size as u64));
        let device = VirtualQueueDevice::paced(period);
        return Ok(match direction {
            QueueDirection::Capture => Box::new(device.with_signal(VIRTUAL_SIGNAL)),
            QueueDirection::Playback => Box::new(device),
        });
    }
    let device = match name {
        Some(name) => CpalQueueDevice::by_name(direction, name)?,
        None => CpalQueueDevice::system_default(),
    };
    Ok(Box::new(device))
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    Ok(())
}

/// Lines typed on stdin, read on a helper thread.
fn enter_presses() -> Receiver<()> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = io::stdin();
        let mut line = String::new();
        while stdin.lock().read_line(&mut line).map(|n| n > 0).unwrap_or(false) {
            if tx.send(()).is_err() {
                break;
            }
            line.clear();
        }
    });
    rx
}

enum WaitOutcome {
    /// Deadline passed or the user pressed Enter.
    Requested,
    /// The engine went idle on its own.
    Finished,
    Failed(String),
}

fn wait(events: &Receiver<EngineEvent>, deadline: Option<Instant>, enter: Option<&Receiver<()>>) -> WaitOutcome {
    loop {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return WaitOutcome::Requested;
        }
        if enter.is_some_and(|rx| rx.try_recv().is_ok()) {
            return WaitOutcome::Requested;
        }
        match events.recv_timeout(POLL_INTERVAL) {
            Ok(EngineEvent::StateChanged(EngineState::Idle)) => return WaitOutcome::Finished,
            Ok(EngineEvent::Error(e)) => return WaitOutcome::Failed(e.to_string()),
            Ok(event) => info!("{:?}", event),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return WaitOutcome::Finished,
        }
    }
}

fn deadline(seconds: Option<f64>) -> Result<Option<Instant>> {
    match seconds {
        Some(s) if !(s.is_finite() && s > 0.0) => bail!("--seconds must be positive, got {}", s),
        Some(s) => Ok(Some(Instant::now() + Duration::from_secs_f64(s))),
        None => Ok(None),
    }
}

pub fn record(args: &Args, seconds: Option<f64>, device: Option<&str>, with_report: bool) -> Result<()> {
    if !args.use_virtual && device.is_none() && !check_microphone_permission()? {
        bail!("no usable microphone: check that an input device exists and access is allowed");
    }

    let config = session_config(args);
    ensure_parent(&config.engine.file_path)?;
    let capture = open_device(args, QueueDirection::Capture, device)?;
    let playback = open_device(args, QueueDirection::Playback, None)?;
    let mut session = AudioSession::new(capture, playback, config);
    let (delegate, events) = event_channel();
    session.set_delegate(delegate);

    if !session.record_start() {
        bail!("recording did not start (see log for the cause)");
    }
    let deadline = deadline(seconds)?;
    let enter = if deadline.is_none() {
        println!("Recording to {}. Press Enter to stop.", session.config().engine.file_path.display());
        Some(enter_presses())
    } else {
        None
    };

    let outcome = wait(&events, deadline, enter.as_ref());
    let summary = session.record_stop();
    if let WaitOutcome::Failed(e) = outcome {
        warn!("recording ended early: {}", e);
    }
    let Some(summary) = summary else {
        bail!("recording stopped before any audio was written");
    };

    println!(
        "{}: {} bytes, {} amplitude samples, {}",
        summary.file_path.display(),
        summary.bytes_written,
        summary.amplitude_count,
        match summary.duration_secs {
            Some(d) => format!("{:.2} s", d),
            None => "duration unknown".to_string(),
        }
    );

    if with_report {
        match session.request_report() {
            Some(document) => {
                let out = summary.file_path.with_extension("pdf");
                write_document(&document, &out, false)?;
                println!("report: {} ({} pages)", out.display(), document.page_count());
            }
            None => warn!("no report: recording too short or duration unknown"),
        }
    }
    Ok(())
}

pub fn play(args: &Args, pitch: Option<f32>, seconds: Option<f64>, device: Option<&str>) -> Result<()> {
    let config = session_config(args);
    if !config.engine.file_path.exists() {
        bail!("{} does not exist; record something first", config.engine.file_path.display());
    }
    if !args.use_virtual && device.is_none() && !check_output_available() {
        bail!("no output device available");
    }
    let capture = open_device(args, QueueDirection::Capture, None)?;
    let playback = open_device(args, QueueDirection::Playback, device)?;
    let mut session = AudioSession::new(capture, playback, config);
    let (delegate, events) = event_channel();
    session.set_delegate(delegate);

    if !session.play_start(pitch) {
        bail!("playback did not start (see log for the cause)");
    }
    println!("Playing {} ({:?})", session.config().engine.file_path.display(), session.state());

    match wait(&events, deadline(seconds)?, None) {
        WaitOutcome::Failed(e) => warn!("playback ended early: {}", e),
        WaitOutcome::Finished => info!("end of file"),
        WaitOutcome::Requested => {}
    }
    session.play_stop();
    Ok(())
}

pub fn report(args: &Args, out: Option<PathBuf>, json: bool, window: f64) -> Result<()> {
    let recording = args.recording_path();
    let meta = metadata::read_metadata(&recording)
        .with_context(|| format!("no metadata for {}; record with this tool first", recording.display()))?;

    let config = ReportConfiguration {
        seconds_per_window: window,
        ..Default::default()
    };
    if let Err(e) = config.validate() {
        bail!(e);
    }
    let builder = PaginatedReportBuilder::new(config);
    let Some(document) = builder.build_report(&meta.amplitudes, meta.duration_secs) else {
        bail!("nothing to chart: {} samples, duration {:?}", meta.amplitudes.len(), meta.duration_secs);
    };

    let out = out.unwrap_or_else(|| recording.with_extension(if json { "json" } else { "pdf" }));
    write_document(&document, &out, json)?;
    println!("{} ({} pages)", out.display(), document.page_count());
    Ok(())
}

fn write_document(document: &Document, out: &Path, json: bool) -> Result<()> {
    ensure_parent(out)?;
    let file = File::create(out).with_context(|| format!("creating {}", out.display()))?;
    let mut writer = BufWriter::new(file);
    if json {
        writer.write_all(document.to_json()?.as_bytes())?;
        writer.flush()?;
    } else {
        pdf::write_pdf(document, writer)?;
    }
    Ok(())
}

pub fn devices(args: &Args) -> Result<()> {
    let enumerator = DeviceEnumerator::new();
    let format = EngineConfiguration::default().format;
    println!("host: {}", enumerator.host_name());

    for (label, list) in [
        ("input", enumerator.list_input_devices(&format)?),
        ("output", enumerator.list_output_devices(&format)?),
    ] {
        println!("{} devices:", label);
        if list.is_empty() {
            println!("  (none)");
        }
        for device in list {
            println!(
                "  {} {}{}{}",
                if device.is_default { "*" } else { " " },
                device.name,
                match (device.default_sample_rate, device.default_channels) {
                    (Some(rate), Some(ch)) => format!(" [{} Hz, {} ch]", rate, ch),
                    _ => String::new(),
                },
                if device.supports_format {
                    String::new()
                } else {
                    format!(" (no {} Hz support)", format.sample_rate)
                }
            );
        }
    }

    if !check_output_available() {
        println!("output: no default device");
    }
    match check_microphone_permission() {
        Ok(true) => println!("microphone: available"),
        Ok(false) => println!("microphone: unavailable"),
        Err(e) => println!("microphone: {}", e),
    }
    if args.use_virtual {
        println!("(--virtual set: record and play use the software device)");
    }
    Ok(())
}
