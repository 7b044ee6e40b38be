mod audio;
mod capture;
mod cli;
mod config;
mod render;
mod signal;

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;

use audio::source::{list_input_devices, DeviceSource};
use capture::CaptureLoop;
use cli::Cli;
use config::{Settings, DEFAULT_FPS, DEFAULT_UPPER_FREQUENCY};
use render::terminal::TerminalSurface;
use signal::Cancellation;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .init();

    // help and usage errors both exit 1
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return ExitCode::FAILURE;
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if cli.list_devices {
        let devices = list_input_devices()?;
        println!("Available input devices:");
        for device in &devices {
            let marker = if device.is_default { "*" } else { " " };
            println!("  {} {}", marker, device.name);
        }
        return Ok(());
    }

    let settings = resolve_settings(&cli)?;
    settings.validate().context("Invalid configuration")?;

    log::info!("barscope - terminal spectrum analyzer");
    log::info!(
        "Device: {}",
        settings.device.as_deref().unwrap_or("(system default)")
    );

    let source = DeviceSource::open(settings.device.as_deref(), settings.sample_rate)
        .context("Failed to open audio device")?;
    log::info!("Capturing from {}", source.name());

    let cancel = Cancellation::new();
    cancel.install_interrupt_handler()?;

    let surface = TerminalSurface::open().context("Failed to open terminal")?;
    let capture = CaptureLoop::new(&settings, source, surface)?;
    capture.run(&cancel)?;
    Ok(())
}

/// Config file values, overridden by any CLI flag that differs from its default.
fn resolve_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = match config::find_config(cli.config.as_deref()) {
        Some(path) => match config::load_config(&path) {
            Some(cfg) => {
                log::info!("Loaded config from {}", path.display());
                Settings::from_config(cfg)
                    .with_context(|| format!("Invalid config {}", path.display()))?
            }
            None if cli.config.is_some() => {
                anyhow::bail!("Failed to load config from {}", path.display())
            }
            None => {
                log::warn!("Failed to load config from {}", path.display());
                Settings::default()
            }
        },
        None => Settings::default(),
    };

    if cli.fps != DEFAULT_FPS {
        settings.frames_per_second = cli.fps;
    }
    if cli.upper_frequency != DEFAULT_UPPER_FREQUENCY {
        settings.upper_frequency_hz = cli.upper_frequency;
    }
    if cli.device.is_some() {
        settings.device = cli.device.clone();
    }
    Ok(settings)
}
