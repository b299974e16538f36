/*!
Command-pane line editing and shell command parsing.

The editor consumes one keystroke at a time: printable characters are echoed
to the Command pane and appended to the buffer, backspace removes the last
character (a no-op on an empty buffer), and a newline completes the line.
Redrawing after backspace uses the pane's `'\r'` clear-line semantics.

Commands start with a slash; anything else is reported back as unknown.
*/

use crate::terminal::{PaneId, Terminal};

/// A completed command line, parsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShellCommand {
    /// `/load <name>`: create a process from `<name>.bin`.
    Load(String),
    /// `/kill`: destroy the current process.
    Kill,
    /// `/status`: process ring summary.
    Status,
    /// `/syscall <n>`: invoke the syscall handler with r0 = n.
    Syscall(u16),
    /// `/exit`: shut the machine down.
    Exit,
    /// Empty line; ignored.
    Empty,
    /// Anything else, echoed back verbatim.
    Unknown(String),
}

pub fn parse(line: &str) -> ShellCommand {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ShellCommand::Empty;
    }
    let mut parts = trimmed.split_whitespace();
    let head = parts.next().unwrap_or("");
    match (head, parts.next()) {
        ("/load", Some(name)) if parts.next().is_none() => ShellCommand::Load(name.to_string()),
        ("/kill", None) => ShellCommand::Kill,
        ("/status", None) => ShellCommand::Status,
        ("/syscall", Some(arg)) if parts.next().is_none() => match arg.parse::<u16>() {
            Ok(n) => ShellCommand::Syscall(n),
            Err(_) => ShellCommand::Unknown(trimmed.to_string()),
        },
        ("/exit", None) => ShellCommand::Exit,
        _ => ShellCommand::Unknown(trimmed.to_string()),
    }
}

#[inline]
pub fn is_backspace(c: char) -> bool {
    c == '\u{8}' || c == '\u{7f}'
}

#[inline]
pub fn is_return(c: char) -> bool {
    c == '\n' || c == '\r'
}

#[derive(Default)]
pub struct LineEditor {
    buf: String,
}

impl LineEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer(&self) -> &str {
        &self.buf
    }

    /// Feed one keystroke. Returns the completed line when the key was a
    /// line terminator.
    pub fn input(&mut self, c: char, term: &mut Terminal) -> Option<String> {
        if is_return(c) {
            term.print(PaneId::Command, "\n");
            return Some(std::mem::take(&mut self.buf));
        }
        if is_backspace(c) {
            if !self.buf.is_empty() {
                self.buf.pop();
                term.print(PaneId::Command, "\r");
                let line = self.buf.clone();
                term.print(PaneId::Command, &line);
            }
            return None;
        }
        if c.is_ascii_graphic() || c == ' ' {
            self.buf.push(c);
            let mut echo = [0u8; 4];
            term.print(PaneId::Command, c.encode_utf8(&mut echo));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(parse("/load hello"), ShellCommand::Load("hello".into()));
        assert_eq!(parse("/kill"), ShellCommand::Kill);
        assert_eq!(parse("/status"), ShellCommand::Status);
        assert_eq!(parse("/syscall 3"), ShellCommand::Syscall(3));
        assert_eq!(parse("/exit"), ShellCommand::Exit);
        assert_eq!(parse("  "), ShellCommand::Empty);
    }

    #[test]
    fn rejects_malformed_commands() {
        assert_eq!(parse("hello"), ShellCommand::Unknown("hello".into()));
        assert_eq!(parse("/load"), ShellCommand::Unknown("/load".into()));
        assert_eq!(
            parse("/load a b"),
            ShellCommand::Unknown("/load a b".into())
        );
        assert_eq!(
            parse("/syscall many"),
            ShellCommand::Unknown("/syscall many".into())
        );
        assert_eq!(parse("/nope"), ShellCommand::Unknown("/nope".into()));
    }

    #[test]
    fn editor_collects_a_line() {
        let mut term = Terminal::new(96, 28);
        let mut ed = LineEditor::new();
        for c in "/kill".chars() {
            assert_eq!(ed.input(c, &mut term), None);
        }
        assert_eq!(ed.buffer(), "/kill");
        assert_eq!(ed.input('\n', &mut term), Some("/kill".to_string()));
        assert_eq!(ed.buffer(), "", "buffer is empty after completion");
    }

    #[test]
    fn backspace_edits_and_noops_when_empty() {
        let mut term = Terminal::new(96, 28);
        let mut ed = LineEditor::new();

        // No-op on an empty buffer.
        assert_eq!(ed.input('\u{8}', &mut term), None);
        assert_eq!(ed.buffer(), "");

        ed.input('a', &mut term);
        ed.input('b', &mut term);
        ed.input('\u{7f}', &mut term);
        assert_eq!(ed.buffer(), "a");
        assert_eq!(term.pane(PaneId::Command).row_text(0), "a");
    }

    #[test]
    fn editor_ignores_control_noise() {
        let mut term = Terminal::new(96, 28);
        let mut ed = LineEditor::new();
        ed.input('\u{1b}', &mut term); // escape
        ed.input('\t', &mut term);
        assert_eq!(ed.buffer(), "");
    }
}
