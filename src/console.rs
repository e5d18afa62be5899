//! Character-cell terminal contract and the batch implementation

use std::collections::VecDeque;

mod term;

pub use term::TermConsole;

bitflags::bitflags! {
    /// Text style bitmap understood by a console.
    pub struct FontStyle: u8 {
        /// Inverse video.
        const REVERSE = 1 << 0;
        /// Bold face.
        const BOLD = 1 << 1;
        /// Italic face.
        const ITALIC = 1 << 2;
        /// Fixed-pitch font.
        const FIXED = 1 << 3;
    }
}

/// Queryable console attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attr {
    /// Screen height in lines.
    Lines,
    /// Screen width in columns.
    Cols,
    /// Colour support.
    Colours,
    /// Bold support.
    Bold,
    /// Italic support.
    Italic,
    /// Font height in units.
    FontHeight,
    /// Font width in units.
    FontWidth,
    /// Graphic font available.
    GraphicFont,
    /// Fixed-pitch font is the default.
    FixedFont,
    /// Timed reads supported.
    ReadTimeout,
}

/// Colour constants a console must render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colour {
    /// Black.
    Black,
    /// Red.
    Red,
    /// Green.
    Green,
    /// Yellow.
    Yellow,
    /// Blue.
    Blue,
    /// Magenta.
    Magenta,
    /// Cyan.
    Cyan,
    /// White.
    White,
    /// The terminal's default.
    Default,
    /// Light grey (v6).
    LightGrey,
    /// Medium grey (v6).
    MediumGrey,
    /// Dark grey (v6).
    DarkGrey,
}

/// Outcome of a console read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// A character arrived. Function and arrow keys use 0x81..=0x9A.
    Char(u8),
    /// The timeout expired before a character arrived.
    Timeout,
    /// The input source is exhausted.
    Eof,
}

/// Character-cell terminal device required by the interpreter.
///
/// Rows and columns are 1-based. Implementations own any playback or
/// recording handles; the interpreter never touches process-global state.
pub trait Console {
    /// Query a device attribute; boolean attributes report 0 or 1.
    fn attr(&self, attr: Attr) -> u32;

    /// Current cursor position as (line, column).
    fn cursor(&self) -> (u32, u32);

    /// Move the cursor.
    fn move_cursor(&mut self, line: u32, col: u32);

    /// Select a font; returns whether the device accepted it.
    fn set_font(&mut self, font: u32) -> bool;

    /// Set the text style bitmap.
    fn set_font_style(&mut self, style: FontStyle);

    /// Set the foreground colour.
    fn set_foreground(&mut self, colour: Colour);

    /// Set the background colour.
    fn set_background(&mut self, colour: Colour);

    /// Show or hide the cursor.
    fn set_cursor_visible(&mut self, visible: bool);

    /// Set the scrolling region to the given rows.
    fn set_scroll_region(&mut self, top: u32, bottom: u32);

    /// Erase from the cursor to the end of the current line.
    fn erase_line(&mut self);

    /// Clear `n` whole lines starting at `first`.
    fn clear_lines(&mut self, first: u32, n: u32);

    /// Clear the whole screen.
    fn clear(&mut self);

    /// Read one character, waiting at most `timeout_ms` (zero waits forever).
    fn read(&mut self, timeout_ms: u32) -> Input;

    /// Write one character at the cursor.
    fn write(&mut self, ch: u8);

    /// Block until any key is pressed.
    fn wait_for_key(&mut self);
}

/// Console with no terminal behind it.
///
/// Backs `--batch` runs and the test suite: geometry is fixed, output is
/// collected in memory and input is served from a queue until it runs dry.
#[derive(Debug, Clone)]
pub struct BatchConsole {
    lines: u32,
    cols: u32,
    cursor: (u32, u32),
    output: Vec<u8>,
    input: VecDeque<u8>,
}

impl Default for BatchConsole {
    fn default() -> Self {
        Self::new(24, 80)
    }
}

impl BatchConsole {
    /// Create a console with the given geometry.
    pub fn new(lines: u32, cols: u32) -> Self {
        Self {
            lines,
            cols,
            cursor: (1, 1),
            output: Vec::new(),
            input: VecDeque::new(),
        }
    }

    /// Queue bytes to be served by subsequent reads.
    pub fn feed(&mut self, input: &[u8]) {
        self.input.extend(input.iter().copied());
    }

    /// Everything written so far.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Everything written so far, lossily decoded for assertions.
    pub fn output_text(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

impl Console for BatchConsole {
    fn attr(&self, attr: Attr) -> u32 {
        match attr {
            Attr::Lines => self.lines,
            Attr::Cols => self.cols,
            Attr::FontHeight | Attr::FontWidth => 1,
            Attr::ReadTimeout => 1,
            Attr::Colours | Attr::Bold | Attr::Italic | Attr::GraphicFont | Attr::FixedFont => 0,
        }
    }

    fn cursor(&self) -> (u32, u32) {
        self.cursor
    }

    fn move_cursor(&mut self, line: u32, col: u32) {
        self.cursor = (line.clamp(1, self.lines), col.clamp(1, self.cols));
    }

    fn set_font(&mut self, font: u32) -> bool {
        font == 1
    }

    fn set_font_style(&mut self, _style: FontStyle) {}

    fn set_foreground(&mut self, _colour: Colour) {}

    fn set_background(&mut self, _colour: Colour) {}

    fn set_cursor_visible(&mut self, _visible: bool) {}

    fn set_scroll_region(&mut self, _top: u32, _bottom: u32) {}

    fn erase_line(&mut self) {}

    fn clear_lines(&mut self, _first: u32, _n: u32) {}

    fn clear(&mut self) {
        self.cursor = (1, 1);
    }

    fn read(&mut self, _timeout_ms: u32) -> Input {
        match self.input.pop_front() {
            Some(ch) => Input::Char(ch),
            None => Input::Eof,
        }
    }

    fn write(&mut self, ch: u8) {
        self.output.push(ch);
        if ch == b'\n' {
            self.cursor.0 = (self.cursor.0 + 1).min(self.lines);
            self.cursor.1 = 1;
        } else {
            self.cursor.1 = (self.cursor.1 + 1).min(self.cols);
        }
    }

    fn wait_for_key(&mut self) {
        let _ = self.read(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_console_serves_fed_input_then_eof() {
        let mut console = BatchConsole::default();
        console.feed(b"ab");
        assert_eq!(console.read(0), Input::Char(b'a'));
        assert_eq!(console.read(0), Input::Char(b'b'));
        assert_eq!(console.read(0), Input::Eof);
    }

    #[test]
    fn batch_console_tracks_the_cursor() {
        let mut console = BatchConsole::new(24, 4);
        console.write(b'x');
        console.write(b'y');
        assert_eq!(console.cursor(), (1, 3));
        console.write(b'\n');
        assert_eq!(console.cursor(), (2, 1));
        assert_eq!(console.output_text(), "xy\n");
    }
}
