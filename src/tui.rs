/*!
Interactive frontend: renders the four panes with ratatui and feeds
crossterm key events into the simulator.

The session owns the host terminal: raw mode plus the alternate screen, both
restored on drop so a host-fatal error can still print its post-mortem to a
sane terminal. Key polling is non-blocking (zero timeout), matching the
simulator's rule that nothing may block inside a tick; Ctrl-C arrives as a
key event in raw mode and is surfaced as `KeyPress::Interrupt`.
*/

use std::io::{self, Stdout};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal as TuiTerminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use ratatui::widgets::{Block, Paragraph};

use crate::terminal::{PaneId, Terminal};

/// A keystroke as the simulator sees it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KeyPress {
    Char(char),
    /// Ctrl-C: shut the host down.
    Interrupt,
}

pub struct Session {
    tui: TuiTerminal<CrosstermBackend<Stdout>>,
}

impl Session {
    /// Enter raw mode and the alternate screen.
    pub fn new() -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let tui = TuiTerminal::new(CrosstermBackend::new(stdout))?;
        Ok(Self { tui })
    }

    /// Host terminal size in cells.
    pub fn size() -> io::Result<(u16, u16)> {
        crossterm::terminal::size()
    }

    /// Non-blocking poll for the next relevant keystroke.
    pub fn poll_key(&mut self) -> io::Result<Option<KeyPress>> {
        while event::poll(Duration::ZERO)? {
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
                return Ok(Some(KeyPress::Interrupt));
            }
            let mapped = match key.code {
                KeyCode::Char(c) => Some(c),
                KeyCode::Enter => Some('\n'),
                KeyCode::Backspace => Some('\u{8}'),
                _ => None,
            };
            if let Some(c) = mapped {
                return Ok(Some(KeyPress::Char(c)));
            }
        }
        Ok(None)
    }

    /// Draw all four panes at the geometry the simulator terminal computed.
    pub fn draw(&mut self, term: &Terminal) -> io::Result<()> {
        self.tui.draw(|frame| {
            for id in PaneId::ALL {
                let pane = term.pane(id);
                let rect = term.rect(id);
                let text: Vec<String> = (0..pane.rows()).map(|r| pane.row_text(r)).collect();
                let widget =
                    Paragraph::new(text.join("\n")).block(Block::bordered().title(id.title()));
                frame.render_widget(widget, Rect::new(rect.x, rect.y, rect.w, rect.h));
            }
        })?;
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Best-effort restore; the process may be on its way out.
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}
