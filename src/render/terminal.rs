use crossterm::{cursor, execute, queue, style, terminal};
use std::io::{self, BufWriter, Stdout, Write};

use super::frame::Surface;

/// The controlling terminal, drawn on an alternate screen.
///
/// Raw mode stays off so Ctrl-C keeps raising SIGINT.
pub struct TerminalSurface {
    out: BufWriter<Stdout>,
}

impl TerminalSurface {
    pub fn open() -> io::Result<Self> {
        let mut out = BufWriter::new(io::stdout());
        execute!(out, terminal::EnterAlternateScreen, cursor::Hide)?;
        log::debug!("Terminal surface opened");
        Ok(Self { out })
    }
}

impl Surface for TerminalSurface {
    fn size(&self) -> io::Result<(u16, u16)> {
        terminal::size()
    }

    fn clear(&mut self) -> io::Result<()> {
        queue!(self.out, terminal::Clear(terminal::ClearType::All))
    }

    fn vline(&mut self, row: u16, col: u16, height: u16, glyph: char) -> io::Result<()> {
        for r in row..row.saturating_add(height) {
            queue!(self.out, cursor::MoveTo(col, r), style::Print(glyph))?;
        }
        Ok(())
    }

    fn refresh(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

impl Drop for TerminalSurface {
    fn drop(&mut self) {
        if let Err(err) = execute!(self.out, cursor::Show, terminal::LeaveAlternateScreen) {
            log::warn!("Failed to restore terminal: {}", err);
        }
        log::debug!("Terminal surface closed");
    }
}
