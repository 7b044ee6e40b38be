use rustfft::num_complex::Complex;

use crate::config::Settings;

/// Averaged power never goes below this, so `log10` stays finite on silence.
pub const POWER_FLOOR: f64 = 1e-15;

/// One terminal column's bar.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bar {
    pub column: u16,
    /// Height in rows, `0..=rows`.
    pub height: u16,
}

/// Groups spectrum bins into per-column bar heights.
#[derive(Clone, Debug)]
pub struct SpectrumAggregator {
    scale: f64,
    upper_frequency_hz: f64,
    frames_per_second: u32,
}

impl SpectrumAggregator {
    pub fn new(settings: &Settings) -> Self {
        Self {
            scale: settings.scale(),
            upper_frequency_hz: settings.upper_frequency_hz,
            frames_per_second: settings.frames_per_second,
        }
    }

    /// Number of adjacent bins averaged into each column, never below 1.
    pub fn bar_width(&self, cols: u16) -> usize {
        let width = (self.upper_frequency_hz / self.frames_per_second as f64) / cols as f64;
        let width = width.ceil();
        // NaN and non-positive widths fall through to 1
        if width >= 1.0 {
            width as usize
        } else {
            1
        }
    }

    /// Refills `out` with at most `cols` bars. `out` keeps its capacity
    /// between frames.
    pub fn aggregate_into(
        &self,
        bins: &[Complex<f64>],
        cols: u16,
        rows: u16,
        out: &mut Vec<Bar>,
    ) {
        out.clear();
        if cols == 0 {
            return;
        }
        let width = self.bar_width(cols);
        for (column, group) in (0..cols).zip(bins.chunks(width)) {
            let sum: f64 = group
                .iter()
                .map(|c| {
                    let re = c.re * self.scale;
                    let im = c.im * self.scale;
                    re * re + im * im
                })
                .sum();
            let power = sum / group.len() as f64;
            out.push(Bar {
                column,
                height: power_to_rows(power, rows),
            });
        }
    }
}

/// `rows + floor(10 * log10(power))`, clamped to `[0, rows]`.
pub fn power_to_rows(power: f64, rows: u16) -> u16 {
    let power = if power < POWER_FLOOR || power.is_nan() {
        POWER_FLOOR
    } else {
        power
    };
    let db = rows as f64 + (10.0 * power.log10()).floor();
    db.clamp(0.0, rows as f64) as u16
}
