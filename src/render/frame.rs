use std::io;

use crate::audio::aggregate::Bar;

/// Character-cell drawing target.
pub trait Surface {
    /// Current size as `(cols, rows)`. Queried every frame.
    fn size(&self) -> io::Result<(u16, u16)>;
    fn clear(&mut self) -> io::Result<()>;
    /// Draws `height` copies of `glyph` downwards from `(row, col)`.
    fn vline(&mut self, row: u16, col: u16, height: u16, glyph: char) -> io::Result<()>;
    fn refresh(&mut self) -> io::Result<()>;
}

pub struct FrameRenderer {
    glyph: char,
}

impl FrameRenderer {
    pub fn new(glyph: char) -> Self {
        Self { glyph }
    }

    /// Clears, draws every non-empty bar bottom-aligned, then refreshes once.
    pub fn render<S: Surface + ?Sized>(
        &self,
        surface: &mut S,
        bars: &[Bar],
        rows: u16,
    ) -> io::Result<()> {
        surface.clear()?;
        for bar in bars {
            let height = bar.height.min(rows);
            if height == 0 {
                continue;
            }
            surface.vline(rows - height, bar.column, height, self.glyph)?;
        }
        surface.refresh()
    }
}
