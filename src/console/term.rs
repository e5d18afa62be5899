//! Terminal console over crossterm

use std::collections::VecDeque;
use std::fs;
use std::io::{self, Stdout, Write};
use std::time::Duration;

use crossterm::cursor;
use crossterm::event::{self, Event, KeyCode};
use crossterm::style::{Attribute, Color, SetAttribute, SetBackgroundColor, SetForegroundColor};
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::QueueableCommand;

use crate::console::{Attr, Colour, Console, FontStyle, Input};
use crate::options::Options;

/// Real terminal device in raw mode.
///
/// Keystrokes can be replayed from a file (`--input`) before falling back
/// to the keyboard; the playback handle lives here, not in process-global
/// state. Arrow and function keys are delivered using the 0x81..0x9A range.
pub struct TermConsole {
    out: Stdout,
    lines: u16,
    cols: u16,
    playback: VecDeque<u8>,
}

impl TermConsole {
    /// Enter raw mode and size the screen, honouring a width override.
    pub fn new(options: &Options) -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let (mut cols, lines) = terminal::size()?;
        if let Some(width) = options.width {
            cols = cols.min(width);
        }

        let playback = match &options.input {
            Some(path) => fs::read(path)?.into(),
            None => VecDeque::new(),
        };

        Ok(Self {
            out: io::stdout(),
            lines,
            cols,
            playback,
        })
    }

    fn flush(&mut self) {
        let _ = self.out.flush();
    }

    fn read_key(&mut self, timeout_ms: u32) -> Input {
        self.flush();
        loop {
            if timeout_ms != 0 {
                match event::poll(Duration::from_millis(u64::from(timeout_ms))) {
                    Ok(true) => {}
                    Ok(false) => return Input::Timeout,
                    Err(_) => return Input::Eof,
                }
            }
            let Ok(event) = event::read() else {
                return Input::Eof;
            };
            if let Event::Key(key) = event {
                if let Some(ch) = map_key(key.code) {
                    return Input::Char(ch);
                }
            }
        }
    }
}

impl Drop for TermConsole {
    fn drop(&mut self) {
        let _ = self.out.queue(SetAttribute(Attribute::Reset));
        self.flush();
        let _ = terminal::disable_raw_mode();
    }
}

fn map_key(code: KeyCode) -> Option<u8> {
    match code {
        KeyCode::Char(ch) if ch.is_ascii() => {
            let byte = ch as u8;
            // Normalise DEL to backspace.
            Some(if byte == 0x7F { 0x08 } else { byte })
        }
        KeyCode::Enter => Some(b'\n'),
        KeyCode::Backspace | KeyCode::Delete => Some(0x08),
        KeyCode::Esc => Some(27),
        KeyCode::Up => Some(0x81),
        KeyCode::Down => Some(0x82),
        KeyCode::Left => Some(0x83),
        KeyCode::Right => Some(0x84),
        KeyCode::F(n @ 1..=12) => Some(0x84 + n),
        _ => None,
    }
}

fn map_colour(colour: Colour) -> Color {
    match colour {
        Colour::Black => Color::Black,
        Colour::Red => Color::DarkRed,
        Colour::Green => Color::DarkGreen,
        Colour::Yellow => Color::DarkYellow,
        Colour::Blue => Color::DarkBlue,
        Colour::Magenta => Color::DarkMagenta,
        Colour::Cyan => Color::DarkCyan,
        Colour::White => Color::White,
        Colour::Default => Color::Reset,
        Colour::LightGrey => Color::Grey,
        Colour::MediumGrey => Color::DarkGrey,
        Colour::DarkGrey => Color::Black,
    }
}

impl Console for TermConsole {
    fn attr(&self, attr: Attr) -> u32 {
        match attr {
            Attr::Lines => u32::from(self.lines),
            Attr::Cols => u32::from(self.cols),
            Attr::Colours | Attr::Bold | Attr::Italic | Attr::FixedFont | Attr::ReadTimeout => 1,
            Attr::FontHeight | Attr::FontWidth => 1,
            Attr::GraphicFont => 0,
        }
    }

    fn cursor(&self) -> (u32, u32) {
        match cursor::position() {
            Ok((col, row)) => (u32::from(row) + 1, u32::from(col) + 1),
            Err(_) => (1, 1),
        }
    }

    fn move_cursor(&mut self, line: u32, col: u32) {
        let _ = self
            .out
            .queue(cursor::MoveTo(col.saturating_sub(1) as u16, line.saturating_sub(1) as u16));
    }

    fn set_font(&mut self, font: u32) -> bool {
        // Only the normal font exists on a character terminal.
        font == 1
    }

    fn set_font_style(&mut self, style: FontStyle) {
        let _ = self.out.queue(SetAttribute(Attribute::Reset));
        if style.contains(FontStyle::REVERSE) {
            let _ = self.out.queue(SetAttribute(Attribute::Reverse));
        }
        if style.contains(FontStyle::BOLD) {
            let _ = self.out.queue(SetAttribute(Attribute::Bold));
        }
        if style.contains(FontStyle::ITALIC) {
            let _ = self.out.queue(SetAttribute(Attribute::Italic));
        }
    }

    fn set_foreground(&mut self, colour: Colour) {
        let _ = self.out.queue(SetForegroundColor(map_colour(colour)));
    }

    fn set_background(&mut self, colour: Colour) {
        let _ = self.out.queue(SetBackgroundColor(map_colour(colour)));
    }

    fn set_cursor_visible(&mut self, visible: bool) {
        let _ = if visible {
            self.out.queue(cursor::Show)
        } else {
            self.out.queue(cursor::Hide)
        };
    }

    fn set_scroll_region(&mut self, top: u32, bottom: u32) {
        // DECSTBM; crossterm has no command for scroll regions.
        let _ = write!(self.out, "\x1B[{top};{bottom}r");
    }

    fn erase_line(&mut self) {
        let _ = self.out.queue(Clear(ClearType::UntilNewLine));
    }

    fn clear_lines(&mut self, first: u32, n: u32) {
        for line in first..first + n {
            self.move_cursor(line, 1);
            let _ = self.out.queue(Clear(ClearType::CurrentLine));
        }
    }

    fn clear(&mut self) {
        let _ = self.out.queue(Clear(ClearType::All));
        self.move_cursor(1, 1);
    }

    fn read(&mut self, timeout_ms: u32) -> Input {
        if let Some(ch) = self.playback.pop_front() {
            return Input::Char(if ch == 0x7F { 0x08 } else { ch });
        }
        self.read_key(timeout_ms)
    }

    fn write(&mut self, ch: u8) {
        let _ = if ch == b'\n' {
            // Raw mode: newline needs an explicit carriage return.
            self.out.write_all(b"\r\n")
        } else {
            self.out.write_all(&[ch])
        };
    }

    fn wait_for_key(&mut self) {
        let _ = self.read_key(0);
    }
}
