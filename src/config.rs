use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const SAMPLE_RATE_HZ: u32 = 44_100;
pub const DEFAULT_FPS: u32 = 30;
/// A7
pub const DEFAULT_UPPER_FREQUENCY: f64 = 3520.0;
pub const DEFAULT_GLYPH: char = '│';

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("frames per second must be positive")]
    ZeroFps,
    #[error("frame size {frame_size} ({sample_rate} Hz / {fps} fps) is below 2 samples")]
    FrameTooSmall {
        frame_size: usize,
        sample_rate: u32,
        fps: u32,
    },
    #[error("window needs at least 2 samples, got {0}")]
    WindowTooShort(usize),
    #[error("upper frequency must be a positive number of Hz, got {0}")]
    InvalidUpperFrequency(f64),
    #[error("bar glyph must be exactly one character, got {0:?}")]
    InvalidGlyph(String),
}

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub audio: AudioConfig,
}

#[derive(Debug, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_upper_frequency")]
    pub upper_frequency: f64,
    #[serde(default = "default_glyph")]
    pub glyph: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AudioConfig {
    pub device: Option<String>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            upper_frequency: default_upper_frequency(),
            glyph: default_glyph(),
        }
    }
}

fn default_fps() -> u32 { DEFAULT_FPS }
fn default_upper_frequency() -> f64 { DEFAULT_UPPER_FREQUENCY }
fn default_glyph() -> String { DEFAULT_GLYPH.to_string() }

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(cfg) => Some(cfg),
        Err(err) => {
            log::warn!("Invalid config {}: {}", path.display(), err);
            None
        }
    }
}

/// Explicit path first, then `./barscope.toml`, then the per-user config.
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("barscope.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("barscope").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("barscope").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

/// Runtime parameters, fixed once the loop starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub sample_rate: u32,
    pub frames_per_second: u32,
    pub upper_frequency_hz: f64,
    pub bar_glyph: char,
    pub device: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE_HZ,
            frames_per_second: DEFAULT_FPS,
            upper_frequency_hz: DEFAULT_UPPER_FREQUENCY,
            bar_glyph: DEFAULT_GLYPH,
            device: None,
        }
    }
}

impl Settings {
    /// Samples per frame. Integer division: 44100 / 30 == 1470.
    pub fn frame_size(&self) -> usize {
        if self.frames_per_second == 0 {
            return 0;
        }
        (self.sample_rate / self.frames_per_second) as usize
    }

    /// Compensates for the one-sided spectrum and window normalization.
    pub fn scale(&self) -> f64 {
        2.0 / self.frame_size() as f64
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frames_per_second == 0 {
            return Err(ConfigError::ZeroFps);
        }
        let frame_size = self.frame_size();
        if frame_size < 2 {
            return Err(ConfigError::FrameTooSmall {
                frame_size,
                sample_rate: self.sample_rate,
                fps: self.frames_per_second,
            });
        }
        if !self.upper_frequency_hz.is_finite() || self.upper_frequency_hz <= 0.0 {
            return Err(ConfigError::InvalidUpperFrequency(self.upper_frequency_hz));
        }
        Ok(())
    }

    /// Overlay a config file onto the defaults.
    pub fn from_config(cfg: Config) -> Result<Self, ConfigError> {
        let mut chars = cfg.display.glyph.chars();
        let glyph = match (chars.next(), chars.next()) {
            (Some(c), None) => c,
            _ => return Err(ConfigError::InvalidGlyph(cfg.display.glyph)),
        };
        Ok(Self {
            frames_per_second: cfg.display.fps,
            upper_frequency_hz: cfg.display.upper_frequency,
            bar_glyph: glyph,
            device: cfg.audio.device,
            ..Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_size_uses_integer_division() {
        let settings = Settings::default();
        assert_eq!(settings.frame_size(), 1470);
        assert!((settings.scale() - 2.0 / 1470.0).abs() < 1e-15);

        let settings = Settings { frames_per_second: 60, ..Settings::default() };
        assert_eq!(settings.frame_size(), 735);
        let settings = Settings { frames_per_second: 7, ..Settings::default() };
        assert_eq!(settings.frame_size(), 6300);
    }

    #[test]
    fn rejects_tiny_frames() {
        let settings = Settings { frames_per_second: 30_000, ..Settings::default() };
        assert_eq!(
            settings.validate(),
            Err(ConfigError::FrameTooSmall { frame_size: 1, sample_rate: 44_100, fps: 30_000 })
        );
        let settings = Settings { frames_per_second: 22_050, ..Settings::default() };
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn rejects_zero_fps() {
        let settings = Settings { frames_per_second: 0, ..Settings::default() };
        assert_eq!(settings.validate(), Err(ConfigError::ZeroFps));
    }

    #[test]
    fn rejects_bad_upper_frequency() {
        for bad in [0.0, -10.0, f64::NAN, f64::INFINITY] {
            let settings = Settings { upper_frequency_hz: bad, ..Settings::default() };
            assert!(settings.validate().is_err(), "{bad} accepted");
        }
    }

    #[test]
    fn parses_config_file() {
        let cfg: Config = toml::from_str(
            r##"
            [display]
            fps = 60
            glyph = "#"

            [audio]
            device = "USB Mic"
            "##,
        )
        .unwrap();
        let settings = Settings::from_config(cfg).unwrap();
        assert_eq!(settings.frames_per_second, 60);
        assert_eq!(settings.upper_frequency_hz, DEFAULT_UPPER_FREQUENCY);
        assert_eq!(settings.bar_glyph, '#');
        assert_eq!(settings.device.as_deref(), Some("USB Mic"));
    }

    #[test]
    fn empty_config_is_default() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(Settings::from_config(cfg).unwrap(), Settings::default());
    }

    #[test]
    fn rejects_multi_char_glyph() {
        let cfg: Config = toml::from_str("[display]\nglyph = \"##\"").unwrap();
        assert_eq!(
            Settings::from_config(cfg),
            Err(ConfigError::InvalidGlyph("##".into()))
        );
    }
}
