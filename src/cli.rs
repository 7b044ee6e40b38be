use clap::Parser;
use std::path::PathBuf;

use crate::config::{DEFAULT_FPS, DEFAULT_UPPER_FREQUENCY, SAMPLE_RATE_HZ};

#[derive(Parser, Debug)]
#[command(name = "barscope", about = "Real-time terminal audio spectrum analyzer")]
pub struct Cli {
    /// Input device name (defaults to the system input device)
    pub device: Option<String>,

    /// Frames per second
    #[arg(
        short = 'r',
        long = "rate",
        default_value_t = DEFAULT_FPS,
        value_parser = clap::value_parser!(u32).range(1..=(SAMPLE_RATE_HZ / 2) as i64)
    )]
    pub fps: u32,

    /// Upper frequency bound in Hz used to size the bars
    #[arg(short = 'f', long = "frequency", default_value_t = DEFAULT_UPPER_FREQUENCY)]
    pub upper_frequency: f64,

    /// Config file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// List available input devices and exit
    #[arg(long)]
    pub list_devices: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["barscope"]).unwrap();
        assert_eq!(cli.fps, 30);
        assert_eq!(cli.upper_frequency, 3520.0);
        assert!(cli.device.is_none());
        assert!(!cli.list_devices);
    }

    #[test]
    fn short_flags_and_device() {
        let cli = Cli::try_parse_from(["barscope", "-r", "60", "-f", "8000", "alsa_input.usb"])
            .unwrap();
        assert_eq!(cli.fps, 60);
        assert_eq!(cli.upper_frequency, 8000.0);
        assert_eq!(cli.device.as_deref(), Some("alsa_input.usb"));
    }

    #[test]
    fn rejects_non_numeric_rate() {
        assert!(Cli::try_parse_from(["barscope", "-r", "fast"]).is_err());
    }

    #[test]
    fn rejects_zero_rate() {
        assert!(Cli::try_parse_from(["barscope", "-r", "0"]).is_err());
    }

    #[test]
    fn rejects_unknown_flag() {
        assert!(Cli::try_parse_from(["barscope", "-x"]).is_err());
    }
}
