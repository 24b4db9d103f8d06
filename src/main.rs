// src/main.rs
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use handi::config::HandiConfig;
use handi::midi::{self, ControlSink, LogSink, MidiSink};

#[derive(Parser, Debug)]
#[command(name = "handi", version, about = "Turns tracked hand poses into MIDI control changes")]
struct Cli {
    /// JSON configuration file (default: platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// First controller of the right hand (0-88)
    #[arg(long)]
    base: Option<u8>,

    /// MIDI channel (0-15)
    #[arg(long)]
    channel: Option<u8>,

    /// Use the first MIDI output whose name contains this text
    #[arg(long)]
    port: Option<String>,

    /// Camera index
    #[arg(long)]
    camera: Option<u32>,

    /// Stop after N frames
    #[arg(long)]
    frames: Option<u64>,

    /// Write emitted changes as CSV into a session directory under this path
    #[arg(long)]
    record: Option<PathBuf>,

    /// Log control changes instead of sending them
    #[arg(long)]
    dry_run: bool,

    /// Print available MIDI outputs and exit
    #[arg(long)]
    list_ports: bool,
}

impl Cli {
    fn apply(&self, config: &mut HandiConfig) {
        if let Some(base) = self.base {
            config.controller_base = base;
        }
        if let Some(channel) = self.channel {
            config.midi_channel = channel;
        }
        if let Some(port) = &self.port {
            config.midi_port = Some(port.clone());
        }
        if let Some(camera) = self.camera {
            config.camera_index = camera;
        }
        if let Some(frames) = self.frames {
            config.max_frames = Some(frames);
        }
        if let Some(dir) = &self.record {
            config.record_dir = Some(dir.clone());
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "handi=info".into()),
        )
        .init();

    if cli.list_ports {
        let ports = midi::list_ports().context("failed to query MIDI outputs")?;
        if ports.is_empty() {
            println!("No MIDI outputs found");
        }
        for (i, name) in ports.iter().enumerate() {
            println!("[{i}] {name}");
        }
        return Ok(());
    }

    let mut config = HandiConfig::load_or_default(cli.config.as_deref())
        .context("failed to load configuration")?;
    cli.apply(&mut config);
    config.validate().context("invalid configuration")?;

    info!("handi v{} starting", env!("CARGO_PKG_VERSION"));

    let sink: Box<dyn ControlSink> = if cli.dry_run {
        info!("Dry run: control changes are logged, not sent");
        Box::new(LogSink::default())
    } else {
        let sink = MidiSink::open(config.midi_port.as_deref(), config.midi_channel)
            .context("failed to open MIDI output")?;
        info!("Sending on {} channel {}", sink.port_name(), config.midi_channel);
        Box::new(sink)
    };

    handi::app::run(&config, sink)?;
    Ok(())
}
