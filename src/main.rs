//! ltcsync - send and receive SMPTE linear timecode
//!
//! Entry point for the command-line tool.

use anyhow::Result;
use chrono::Timelike;
use ltcsync::cli::{self, CliAction, Mode, RunOptions};
use ltcsync::{AppConfig, AudioStreams, Receiver, Sender, SystemClock, Timecode, TimecodeFields};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Capacity of the channel carrying decoded timecodes to the main thread
const RECEIVE_CHANNEL_CAPACITY: usize = 64;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ltcsync=info".parse()?)
                .add_directive("ltcsync_core=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let opts = match cli::parse_args(&args) {
        Ok(CliAction::Run(opts)) => opts,
        Ok(CliAction::ListDevices) => return list_devices(),
        Ok(CliAction::Version) => {
            println!("ltcsync {}", ltcsync::VERSION);
            return Ok(());
        }
        Ok(CliAction::Help) => {
            print_help();
            return Ok(());
        }
        Err(msg) => {
            eprintln!("Error: {}", msg);
            print_help();
            return Ok(());
        }
    };

    let Some(mode) = opts.mode else {
        print_help();
        return Ok(());
    };

    let config_path = opts.config_path.clone().unwrap_or_else(AppConfig::path);
    let mut config = AppConfig::load_from(&config_path);
    opts.apply(&mut config);
    if opts.save_config {
        config.save(&config_path)?;
    }

    run(mode, &opts, &config)
}

fn print_help() {
    println!("Usage: ltcsync <send|receive|loopback> [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -l, --list               List available audio devices");
    println!("  -d, --device NAME        Audio device (default: host default)");
    println!("  -r, --sample-rate RATE   Sample rate in Hz (default: 48000)");
    println!("  -f, --fps FPS            Frame rate (default: 30)");
    println!("      --drop-frame         Set the drop-frame flag");
    println!("  -c, --channel N          LTC channel, 0-based (default: 0)");
    println!("      --start HH:MM:SS:FF  Start timecode (default: time of day)");
    println!("      --config PATH        Config file (default: data dir)");
    println!("      --save-config        Write the effective config back to disk");
    println!("  -v, --version            Show version");
    println!("  -h, --help               Show this help");
    println!();
    println!("Examples:");
    println!("  ltcsync send -f 25 --start 10:00:00:00");
    println!("  ltcsync receive -d \"Line In\" -c 1");
}

fn list_devices() -> Result<()> {
    let devices = AudioStreams::list_devices()?;
    if devices.is_empty() {
        println!("No audio devices found.");
        return Ok(());
    }
    println!("Found {} device(s):", devices.len());
    println!();
    for (i, device) in devices.iter().enumerate() {
        let default_marker = if device.is_default { " [DEFAULT]" } else { "" };
        println!("  {}. {}{}", i + 1, device.name, default_marker);
        println!(
            "     Channels: {} in, {} out",
            device.input_channels, device.output_channels
        );
    }
    Ok(())
}

/// Start timecode from the command line, or the local time of day
fn start_fields(opts: &RunOptions, config: &AppConfig) -> TimecodeFields {
    let fields = opts.start.clone().unwrap_or_else(|| {
        let now = chrono::Local::now();
        TimecodeFields::new(now.hour() as u8, now.minute() as u8, now.second() as u8, 0)
    });
    let drop_frame = fields.drop_frame || config.drop_frame;
    fields
        .with_timezone(config.timezone.clone())
        .with_drop_frame(drop_frame)
}

fn run(mode: Mode, opts: &RunOptions, config: &AppConfig) -> Result<()> {
    let clock = SystemClock::shared();
    let audio = config.audio_config();
    let mut streams = AudioStreams::new();

    let sender = if matches!(mode, Mode::Send | Mode::Loopback) {
        let sender = Arc::new(Sender::with_queue_capacity(
            Arc::clone(&clock),
            config.queue_capacity,
        ));
        sender.set_timecode(start_fields(opts, config));
        sender.setup(&audio, &config.sender_settings())?;
        streams.output(&audio, Arc::clone(&sender))?;
        sender.start();
        Some(sender)
    } else {
        None
    };

    let decoded: Option<crossbeam_channel::Receiver<Timecode>> = if matches!(
        mode,
        Mode::Receive | Mode::Loopback
    ) {
        let mut receiver = Receiver::new(Arc::clone(&clock));
        receiver.setup(&audio, config.channel)?;
        let rx = receiver.subscribe(RECEIVE_CHANNEL_CAPACITY);
        streams.input(&audio, receiver)?;
        Some(rx)
    } else {
        None
    };

    println!("Running ({:?}). Press Ctrl+C to stop.", mode);
    println!("────────────────────────────────────────");

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl+C handler");
    }

    let mut last_sent = String::new();
    let mut last_underruns = 0u64;
    let mut iteration = 0u32;
    while running.load(Ordering::SeqCst) {
        if let Some(sender) = &sender {
            let line = sender.timecode().to_display_string();
            if line != last_sent {
                println!("TX {}", line);
                last_sent = line;
            }

            // Once a second, report new underruns
            if iteration % 10 == 0 {
                let underruns = sender.queue().underruns();
                if underruns > last_underruns {
                    warn!(
                        new = underruns - last_underruns,
                        total = underruns,
                        "Output underruns"
                    );
                    last_underruns = underruns;
                }
            }
        }

        if let Some(rx) = &decoded {
            for tc in rx.try_iter() {
                let direction = if tc.reverse { " (reverse)" } else { "" };
                println!("RX {}{}", tc, direction);
            }
        }

        iteration = iteration.wrapping_add(1);
        std::thread::sleep(Duration::from_millis(100));
    }

    println!();
    println!("Stopping...");
    if let Some(sender) = &sender {
        sender.stop();
    }
    if let Err(e) = streams.pause() {
        error!(error = %e, "Failed to pause audio streams");
    }
    drop(streams);
    if let Some(sender) = sender {
        sender.teardown();
    }
    info!("Shutdown complete");
    println!("Done.");

    Ok(())
}
